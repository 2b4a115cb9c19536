use super::{Result, WebError};
use crate::chat::{ChatMessage, ResumeChat};
use crate::contact::{ContactForm, ContactService};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ResumeChat>,
    pub contact: Arc<ContactService>,
}

impl AppState {
    pub fn new(chat: Arc<ResumeChat>, contact: Arc<ContactService>) -> Self {
        Self { chat, contact }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusReply {
    pub status: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/api/chat", post(chat))
        .route("/api/contact", post(contact))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthcheck() -> Json<StatusReply> {
    Json(StatusReply {
        status: "ok".to_string(),
    })
}

async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>> {
    let Json(request) = payload.map_err(|e| WebError::Input(e.body_text()))?;
    let turn = state.chat.ask(&request.messages, &request.question).await?;
    Ok(Json(ChatReply { reply: turn.reply }))
}

async fn contact(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ContactForm>, JsonRejection>,
) -> Result<Json<StatusReply>> {
    let Json(form) = payload.map_err(|e| WebError::Input(e.body_text()))?;
    state.contact.submit(&form).await?;
    Ok(Json(StatusReply {
        status: "sent".to_string(),
    }))
}

/// Serves the router on `addr` until `shutdown` resolves.
pub async fn serve<F>(addr: &str, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    use anyhow::Context;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    info!(address = %addr, "portfolio backend started");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")?;
    Ok(())
}
