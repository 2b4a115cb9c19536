use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use folio_sync::chat::{ResumeChat, ScriptedCompletion};
use folio_sync::contact::{ContactService, ContactSettings, MemoryEmailRelay, StaticCaptcha};
use folio_sync::web::{AppState, build_router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

struct Harness {
    router: axum::Router,
    completion: ScriptedCompletion,
    relay: Arc<MemoryEmailRelay>,
}

fn harness(completion: ScriptedCompletion, captcha: StaticCaptcha) -> Harness {
    let relay = Arc::new(MemoryEmailRelay::new());
    let chat = ResumeChat::new(
        Arc::new(completion.clone()),
        "Rust engineer. Built live-sync data layers.",
    );
    let contact = ContactService::new(
        Arc::new(captcha),
        relay.clone(),
        ContactSettings {
            mail_from: "Portfolio <noreply@example.com>".into(),
            owner_email: "owner@example.com".into(),
            resume_attachment: None,
        },
    );
    Harness {
        router: build_router(AppState::new(Arc::new(chat), Arc::new(contact))),
        completion,
        relay,
    }
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

async fn decode_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_reports_ok() {
    let h = harness(ScriptedCompletion::new(), StaticCaptcha::pass());

    let response = h
        .router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("health response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(decode_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn chat_answers_with_resume_context() {
    let h = harness(
        ScriptedCompletion::new().reply("Mostly Rust and TypeScript."),
        StaticCaptcha::pass(),
    );

    let response = h
        .router
        .oneshot(json_request(
            Method::POST,
            "/api/chat",
            json!({
                "messages": [
                    {"role": "user", "content": "Hi"},
                    {"role": "assistant", "content": "Hello!"}
                ],
                "question": "Which languages?"
            }),
        ))
        .await
        .expect("chat response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        decode_json(response).await,
        json!({"reply": "Mostly Rust and TypeScript."})
    );

    let requests = h.completion.requests();
    assert_eq!(requests.len(), 1);
    let sent = &requests[0];
    assert!(sent[0].content.contains("live-sync data layers"));
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[3].content, "Which languages?");
}

#[tokio::test]
async fn empty_question_is_unprocessable() {
    let h = harness(ScriptedCompletion::new().reply("unused"), StaticCaptcha::pass());

    let response = h
        .router
        .oneshot(json_request(
            Method::POST,
            "/api/chat",
            json!({"question": "   "}),
        ))
        .await
        .expect("chat response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = decode_json(response).await;
    assert_eq!(body["code"], "validation_error");
    assert!(h.completion.requests().is_empty());
}

#[tokio::test]
async fn completion_failure_is_bad_gateway() {
    let h = harness(ScriptedCompletion::new().fail("quota exceeded"), StaticCaptcha::pass());

    let response = h
        .router
        .oneshot(json_request(
            Method::POST,
            "/api/chat",
            json!({"question": "Where do you live?"}),
        ))
        .await
        .expect("chat response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(decode_json(response).await["code"], "upstream_error");
}

#[tokio::test]
async fn contact_sends_notification_and_auto_reply() {
    let h = harness(ScriptedCompletion::new(), StaticCaptcha::pass());

    let response = h
        .router
        .oneshot(json_request(
            Method::POST,
            "/api/contact",
            json!({
                "name": "Ada",
                "email": "ada@example.com",
                "message": "Are you open to contract work?",
                "captchaToken": "token"
            }),
        ))
        .await
        .expect("contact response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(decode_json(response).await, json!({"status": "sent"}));

    let sent = h.relay.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, "owner@example.com");
    assert_eq!(sent[0].reply_to.as_deref(), Some("ada@example.com"));
    assert_eq!(sent[1].to, "ada@example.com");
}

#[tokio::test]
async fn rejected_captcha_is_forbidden_and_sends_nothing() {
    let h = harness(ScriptedCompletion::new(), StaticCaptcha::reject());

    let response = h
        .router
        .oneshot(json_request(
            Method::POST,
            "/api/contact",
            json!({
                "name": "Bot",
                "email": "bot@example.com",
                "message": "Buy now",
                "captchaToken": "forged"
            }),
        ))
        .await
        .expect("contact response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(decode_json(response).await["code"], "captcha_failed");
    assert!(h.relay.sent().is_empty());
}

#[tokio::test]
async fn malformed_contact_body_is_unprocessable() {
    let h = harness(ScriptedCompletion::new(), StaticCaptcha::pass());

    let response = h
        .router
        .oneshot(json_request(
            Method::POST,
            "/api/contact",
            json!({"name": "No email"}),
        ))
        .await
        .expect("contact response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(decode_json(response).await["code"], "input_error");
}

#[tokio::test]
async fn unreadable_resume_attachment_is_internal_error_and_sends_nothing() {
    let relay = Arc::new(MemoryEmailRelay::new());
    let contact = ContactService::new(
        Arc::new(StaticCaptcha::pass()),
        relay.clone(),
        ContactSettings {
            mail_from: "Portfolio <noreply@example.com>".into(),
            owner_email: "owner@example.com".into(),
            resume_attachment: Some("/nonexistent/folio-sync/resume.pdf".into()),
        },
    );
    let chat = ResumeChat::new(Arc::new(ScriptedCompletion::new()), "");
    let router = build_router(AppState::new(Arc::new(chat), Arc::new(contact)));

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/contact",
            json!({
                "name": "Ada",
                "email": "ada@example.com",
                "message": "Hello again",
                "captchaToken": "token"
            }),
        ))
        .await
        .expect("contact response");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(decode_json(response).await["code"], "internal_error");
    assert!(relay.sent().is_empty());
}
