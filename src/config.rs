use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Settings shared by the task and CRM workspaces.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Namespace prepended to every collection path (`artifacts/{app_id}`)
    pub app_id: Option<String>,

    /// Explicit path root; wins over `app_id`
    pub root: Option<String>,

    /// Pre-issued auth token tried before anonymous sign-in
    pub auth_token: Option<String>,

    /// Buffered notices per subscriber before the oldest are dropped
    pub notice_capacity: usize,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self {
            app_id: None,
            root: None,
            auth_token: None,
            notice_capacity: 64,
        }
    }

    /// Set the application id
    pub fn app_id(mut self, app_id: &str) -> Self {
        self.app_id = Some(app_id.to_string());
        self
    }

    /// Set the collection path root
    pub fn root(mut self, root: &str) -> Self {
        self.root = Some(root.to_string());
        self
    }

    /// Set the pre-issued auth token
    pub fn auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
    }

    /// Set notice channel capacity
    pub fn notice_capacity(mut self, capacity: usize) -> Self {
        self.notice_capacity = capacity;
        self
    }

    /// Root the collection paths live under, if any
    pub fn path_root(&self) -> Option<String> {
        if let Some(root) = self.root.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            return Some(root.to_string());
        }
        self.app_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| format!("artifacts/{}", id))
    }

    /// Reads `FOLIO_APP_ID`, `FOLIO_ROOT`, `FOLIO_AUTH_TOKEN` and
    /// `FOLIO_NOTICE_CAPACITY`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();
        config.app_id = lookup("FOLIO_APP_ID");
        config.root = lookup("FOLIO_ROOT");
        config.auth_token = lookup("FOLIO_AUTH_TOKEN");
        if let Some(raw) = lookup("FOLIO_NOTICE_CAPACITY") {
            config.notice_capacity = raw
                .parse::<usize>()
                .context("FOLIO_NOTICE_CAPACITY must be a valid usize")?;
        }
        Ok(config)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP surface settings, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    pub completion_endpoint: String,
    pub completion_api_key: Option<String>,
    pub completion_model: String,

    pub relay_endpoint: String,
    pub relay_api_key: Option<String>,
    /// Sender address on outgoing mail
    pub mail_from: String,
    /// Where contact-form notifications go
    pub owner_email: String,

    /// No captcha secret means captcha checks always pass
    pub captcha_secret: Option<String>,
    pub captcha_min_score: f64,

    /// Plain-text resume the chat answers from
    pub resume_text_path: Option<PathBuf>,
    /// File attached to the contact auto-reply
    pub resume_attachment_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = var("FOLIO_HOST", "0.0.0.0");
        let port = var("FOLIO_PORT", "8080")
            .parse::<u16>()
            .context("FOLIO_PORT must be a valid u16")?;

        let captcha_min_score = var("FOLIO_CAPTCHA_MIN_SCORE", "0.5")
            .parse::<f64>()
            .context("FOLIO_CAPTCHA_MIN_SCORE must be a number")?;
        if !(0.0..=1.0).contains(&captcha_min_score) {
            anyhow::bail!("FOLIO_CAPTCHA_MIN_SCORE must be between 0 and 1");
        }

        Ok(Self {
            host,
            port,
            completion_endpoint: var(
                "FOLIO_COMPLETION_ENDPOINT",
                "http://localhost:8787/v1/complete",
            ),
            completion_api_key: lookup("FOLIO_COMPLETION_API_KEY"),
            completion_model: var("FOLIO_COMPLETION_MODEL", "default"),
            relay_endpoint: var("FOLIO_RELAY_ENDPOINT", "http://localhost:8025/send"),
            relay_api_key: lookup("FOLIO_RELAY_API_KEY"),
            mail_from: var("FOLIO_MAIL_FROM", "portfolio@localhost"),
            owner_email: var("FOLIO_OWNER_EMAIL", "owner@localhost"),
            captcha_secret: lookup("FOLIO_CAPTCHA_SECRET").filter(|s| !s.trim().is_empty()),
            captcha_min_score,
            resume_text_path: lookup("FOLIO_RESUME_TEXT").map(PathBuf::from),
            resume_attachment_path: lookup("FOLIO_RESUME_ATTACHMENT").map(PathBuf::from),
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
