// ============================================================================
// Contact Form
// ============================================================================
//
// Visitor message -> captcha check -> notification to the site owner ->
// auto-reply to the visitor (with the resume attached when one is
// configured). Each external step is a collaborator trait with an HTTP
// implementation and an in-memory one for tests.
//
// ============================================================================

use crate::core::{Result, SyncError};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub const MAX_MESSAGE_CHARS: usize = 5000;

const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

lazy_static! {
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
    #[serde(default)]
    pub captcha_token: String,
}

impl ContactForm {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SyncError::validation("Name is required"));
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(SyncError::validation("Email is required"));
        }
        if !EMAIL_PATTERN.is_match(email) {
            return Err(SyncError::validation(format!(
                "'{}' is not a valid email address",
                email
            )));
        }
        let message = self.message.trim();
        if message.is_empty() {
            return Err(SyncError::validation("Message is required"));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(SyncError::validation(format!(
                "Message is longer than {} characters",
                MAX_MESSAGE_CHARS
            )));
        }
        Ok(())
    }

    pub fn subject_line(&self) -> String {
        match self.subject.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(subject) => subject.to_string(),
            None => format!("New message from {}", self.name.trim()),
        }
    }
}

// ----- captcha -----

#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// `Err(SyncError::Captcha)` when the token is rejected
    async fn verify(&self, token: &str) -> Result<()>;
}

/// Accepts or rejects every token.
#[derive(Debug, Clone, Copy)]
pub struct StaticCaptcha {
    pass: bool,
}

impl StaticCaptcha {
    pub fn pass() -> Self {
        Self { pass: true }
    }

    pub fn reject() -> Self {
        Self { pass: false }
    }
}

#[async_trait]
impl CaptchaVerifier for StaticCaptcha {
    async fn verify(&self, _token: &str) -> Result<()> {
        if self.pass {
            Ok(())
        } else {
            Err(SyncError::Captcha("token rejected".into()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

impl SiteVerifyResponse {
    fn check(&self, min_score: f64) -> Result<()> {
        if !self.success {
            return Err(SyncError::Captcha(if self.error_codes.is_empty() {
                "verification failed".to_string()
            } else {
                self.error_codes.join(", ")
            }));
        }
        match self.score {
            Some(score) if score < min_score => Err(SyncError::Captcha(format!(
                "score {:.2} below {:.2}",
                score, min_score
            ))),
            _ => Ok(()),
        }
    }
}

/// reCAPTCHA site verification.
pub struct RecaptchaVerifier {
    secret: String,
    min_score: f64,
    endpoint: String,
    client: reqwest::Client,
}

impl RecaptchaVerifier {
    pub fn new(secret: impl Into<String>, min_score: f64) -> Self {
        Self {
            secret: secret.into(),
            min_score,
            endpoint: RECAPTCHA_VERIFY_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl CaptchaVerifier for RecaptchaVerifier {
    async fn verify(&self, token: &str) -> Result<()> {
        if token.trim().is_empty() {
            return Err(SyncError::Captcha("missing token".into()));
        }
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("secret", self.secret.as_str()), ("response", token)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::upstream(format!(
                "captcha service returned {}",
                response.status()
            )));
        }
        let body: SiteVerifyResponse = response.json().await?;
        body.check(self.min_score)
    }
}

// ----- email -----

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait EmailRelay: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct RelayAttachment<'a> {
    filename: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<RelayAttachment<'a>>,
}

impl<'a> RelayRequest<'a> {
    fn from_message(message: &'a EmailMessage) -> Self {
        Self {
            from: &message.from,
            to: &message.to,
            reply_to: message.reply_to.as_deref(),
            subject: &message.subject,
            html: &message.html,
            attachments: message
                .attachments
                .iter()
                .map(|a| RelayAttachment {
                    filename: &a.filename,
                    content: STANDARD.encode(&a.content),
                })
                .collect(),
        }
    }
}

/// Transactional mail API reached over HTTP with a bearer key.
pub struct HttpEmailRelay {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpEmailRelay {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailRelay for HttpEmailRelay {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&RelayRequest::from_message(message));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::upstream(format!(
                "email relay returned {}: {}",
                status, body
            )));
        }
        debug!(to = %message.to, "email handed to relay");
        Ok(())
    }
}

/// Keeps sent mail in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryEmailRelay {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MemoryEmailRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Every send fails with `message` from now on
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(message.into());
        }
    }
}

#[async_trait]
impl EmailRelay for MemoryEmailRelay {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if let Some(reason) = self.failure.lock()?.clone() {
            return Err(SyncError::upstream(reason));
        }
        self.sent.lock()?.push(message.clone());
        Ok(())
    }
}

// ----- service -----

/// Addresses and files the contact service works with.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactSettings {
    pub mail_from: String,
    pub owner_email: String,
    pub resume_attachment: Option<PathBuf>,
}

pub struct ContactService {
    captcha: Arc<dyn CaptchaVerifier>,
    relay: Arc<dyn EmailRelay>,
    settings: ContactSettings,
}

impl ContactService {
    pub fn new(
        captcha: Arc<dyn CaptchaVerifier>,
        relay: Arc<dyn EmailRelay>,
        settings: ContactSettings,
    ) -> Self {
        Self {
            captcha,
            relay,
            settings,
        }
    }

    /// Validates, verifies the captcha, notifies the owner, then replies to
    /// the visitor.
    ///
    /// Nothing is sent when validation, the captcha or the resume attachment
    /// fails. Once the owner has the message the submission counts as
    /// delivered; a failed auto-reply is only logged.
    pub async fn submit(&self, form: &ContactForm) -> Result<()> {
        form.validate()?;
        self.captcha.verify(&form.captcha_token).await?;
        let reply = self.auto_reply(form).await?;

        self.relay.send(&self.owner_notification(form)).await?;
        info!(from = %form.email.trim(), "contact message delivered");

        match self.relay.send(&reply).await {
            Ok(()) => debug!(to = %reply.to, attachments = reply.attachments.len(), "auto-reply sent"),
            Err(err) => warn!(to = %reply.to, error = %err, "auto-reply not sent"),
        }
        Ok(())
    }

    pub fn owner_notification(&self, form: &ContactForm) -> EmailMessage {
        let html = format!(
            "<h2>New contact message</h2>\
             <p><strong>Name:</strong> {}</p>\
             <p><strong>Email:</strong> {}</p>\
             <p><strong>Subject:</strong> {}</p>\
             <p>{}</p>",
            escape_html(form.name.trim()),
            escape_html(form.email.trim()),
            escape_html(&form.subject_line()),
            escape_html(form.message.trim()).replace('\n', "<br>"),
        );
        EmailMessage {
            from: self.settings.mail_from.clone(),
            to: self.settings.owner_email.clone(),
            reply_to: Some(form.email.trim().to_string()),
            subject: format!("Portfolio contact: {}", form.subject_line()),
            html,
            attachments: Vec::new(),
        }
    }

    async fn auto_reply(&self, form: &ContactForm) -> Result<EmailMessage> {
        let html = format!(
            "<p>Hi {},</p>\
             <p>Thanks for getting in touch. I received your message and will reply soon.</p>",
            escape_html(form.name.trim()),
        );

        let mut attachments = Vec::new();
        if let Some(path) = &self.settings.resume_attachment {
            match tokio::fs::read(path).await {
                Ok(content) => attachments.push(Attachment {
                    filename: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "resume.pdf".to_string()),
                    content,
                }),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "resume attachment unreadable");
                    return Err(SyncError::Config(format!(
                        "cannot read resume attachment {}: {}",
                        path.display(),
                        err
                    )));
                }
            }
        }

        Ok(EmailMessage {
            from: self.settings.mail_from.clone(),
            to: form.email.trim().to_string(),
            reply_to: Some(self.settings.owner_email.clone()),
            subject: "Thanks for your message".to_string(),
            html,
            attachments,
        })
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn form() -> ContactForm {
        ContactForm {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            subject: None,
            message: "Hello <b>there</b>".into(),
            captcha_token: "tok".into(),
        }
    }

    fn settings(attachment: Option<PathBuf>) -> ContactSettings {
        ContactSettings {
            mail_from: "site@example.com".into(),
            owner_email: "owner@example.com".into(),
            resume_attachment: attachment,
        }
    }

    #[test]
    fn form_validation() {
        assert!(form().validate().is_ok());
        let mut bad = form();
        bad.email = "not-an-email".into();
        assert!(bad.validate().unwrap_err().is_validation());
        let mut bad = form();
        bad.message = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn site_verify_checks_score() {
        let low = SiteVerifyResponse {
            success: true,
            score: Some(0.2),
            error_codes: vec![],
        };
        assert!(matches!(low.check(0.5), Err(SyncError::Captcha(_))));
        let ok = SiteVerifyResponse {
            success: true,
            score: None,
            error_codes: vec![],
        };
        assert!(ok.check(0.5).is_ok());
    }

    #[tokio::test]
    async fn failed_captcha_sends_nothing() {
        let relay = MemoryEmailRelay::new();
        let service = ContactService::new(Arc::new(StaticCaptcha::reject()), Arc::new(relay.clone()), settings(None));

        let err = service.submit(&form()).await.unwrap_err();
        assert!(matches!(err, SyncError::Captcha(_)));
        assert!(relay.sent().is_empty());
    }

    #[tokio::test]
    async fn sends_notification_then_reply_with_attachment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.4").unwrap();

        let relay = MemoryEmailRelay::new();
        let service = ContactService::new(
            Arc::new(StaticCaptcha::pass()),
            Arc::new(relay.clone()),
            settings(Some(file.path().to_path_buf())),
        );
        service.submit(&form()).await.unwrap();

        let sent = relay.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "owner@example.com");
        assert!(sent[0].html.contains("Hello &lt;b&gt;there&lt;/b&gt;"));
        assert_eq!(sent[1].to, "ada@example.com");
        assert_eq!(sent[1].attachments[0].content, b"%PDF-1.4".to_vec());
    }

    #[tokio::test]
    async fn unreadable_attachment_fails_before_any_mail() {
        let dir = tempfile::tempdir().unwrap();
        let relay = MemoryEmailRelay::new();
        let service = ContactService::new(
            Arc::new(StaticCaptcha::pass()),
            Arc::new(relay.clone()),
            settings(Some(dir.path().join("missing.pdf"))),
        );

        let err = service.submit(&form()).await.unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
        assert!(relay.sent().is_empty());
    }

    #[test]
    fn relay_payload_base64_encodes_attachments() {
        let message = EmailMessage {
            from: "a@x.io".into(),
            to: "b@x.io".into(),
            reply_to: None,
            subject: "s".into(),
            html: "<p>h</p>".into(),
            attachments: vec![Attachment {
                filename: "cv.pdf".into(),
                content: b"hi".to_vec(),
            }],
        };
        let json = serde_json::to_value(RelayRequest::from_message(&message)).unwrap();
        assert_eq!(json["attachments"][0]["content"], "aGk=");
        assert!(json.get("reply_to").is_none());
    }
}
