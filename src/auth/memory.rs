use super::AuthProvider;
use crate::core::{Identity, Result, SyncError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, watch};
use tracing::{debug, info};
use uuid::Uuid;

/// Credentialed account
#[derive(Debug, Clone)]
struct Account {
    uid: String,
    password_hash: String,
}

/// In-process authentication backend
///
/// Keeps email/password accounts (bcrypt hashed), pre-issued sign-in tokens
/// and the current actor. Used by tests and the demo binary.
pub struct MemoryAuthProvider {
    accounts: RwLock<HashMap<String, Account>>,
    tokens: RwLock<HashMap<String, String>>,
    current: watch::Sender<Option<Identity>>,
    anonymous_enabled: AtomicBool,
    hash_cost: u32,
}

impl MemoryAuthProvider {
    /// Creates a provider with nobody signed in
    pub fn new() -> Self {
        Self::with_hash_cost(bcrypt::DEFAULT_COST)
    }

    /// Creates a provider using a custom bcrypt cost (tests use the minimum)
    pub fn with_hash_cost(cost: u32) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            accounts: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
            current,
            anonymous_enabled: AtomicBool::new(true),
            hash_cost: cost,
        }
    }

    /// Creates a provider that already holds a signed-in actor (a persisted
    /// session from an earlier visit)
    pub fn with_session(identity: Identity) -> Self {
        let provider = Self::new();
        provider.current.send_replace(Some(identity));
        provider
    }

    /// Registers an email/password account and returns its identity
    pub async fn register(&self, email: &str, password: &str) -> Result<Identity> {
        let email = Self::normalize_email(email);
        Self::validate_email(&email)?;
        Self::validate_password(password)?; // before hashing

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(SyncError::Identity(format!(
                "Account '{}' already exists",
                email
            )));
        }

        let password_hash = bcrypt::hash(password, self.hash_cost)
            .map_err(|e| SyncError::Identity(format!("Failed to hash password: {}", e)))?;
        let uid = Uuid::new_v4().to_string();

        accounts.insert(
            email,
            Account {
                uid: uid.clone(),
                password_hash,
            },
        );

        Ok(Identity::new(uid))
    }

    /// Issues a single sign-in token for `uid`
    pub async fn issue_token(&self, uid: &str) -> String {
        let token = format!("tok_{}", Uuid::new_v4().simple());
        self.tokens
            .write()
            .await
            .insert(token.clone(), uid.to_string());
        token
    }

    pub async fn revoke_token(&self, token: &str) -> bool {
        self.tokens.write().await.remove(token).is_some()
    }

    /// Disables anonymous sign-in (the backend has it switched off)
    pub fn set_anonymous_enabled(&self, enabled: bool) {
        self.anonymous_enabled.store(enabled, Ordering::SeqCst);
    }

    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }

    fn set_current(&self, identity: Option<Identity>) {
        self.current.send_replace(identity);
    }

    fn normalize_email(email: &str) -> String {
        email.trim().to_ascii_lowercase()
    }

    /// Validates the account email
    fn validate_email(email: &str) -> Result<()> {
        if email.is_empty() {
            return Err(SyncError::validation("Email cannot be empty"));
        }

        if !email.contains('@') || email.len() > 254 {
            return Err(SyncError::validation(format!(
                "'{}' is not a valid email address",
                email
            )));
        }

        Ok(())
    }

    /// Validates password complexity
    ///
    /// Enforces the following rules:
    /// - Minimum 8 characters
    /// - Cannot be empty
    fn validate_password(password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(SyncError::validation("Password cannot be empty"));
        }

        if password.len() < 8 {
            return Err(SyncError::validation(
                "Password must be at least 8 characters long",
            ));
        }

        Ok(())
    }
}

impl Default for MemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    fn current(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    async fn sign_in_anonymously(&self) -> Result<Identity> {
        if !self.anonymous_enabled.load(Ordering::SeqCst) {
            return Err(SyncError::Identity(
                "Anonymous sign-in is disabled".into(),
            ));
        }

        let identity = Identity::anonymous(format!("anon-{}", Uuid::new_v4().simple()));
        debug!(identity = %identity, "anonymous sign-in");
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_with_token(&self, token: &str) -> Result<Identity> {
        let uid = self
            .tokens
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or_else(|| SyncError::Identity("Invalid or expired sign-in token".into()))?;

        let identity = Identity::new(uid);
        debug!(identity = %identity, "token sign-in");
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity> {
        let email = Self::normalize_email(email);
        let account = self
            .accounts
            .read()
            .await
            .get(&email)
            .cloned()
            .ok_or_else(|| SyncError::Identity("Invalid email or password".into()))?;

        if !bcrypt::verify(password, &account.password_hash).unwrap_or(false) {
            return Err(SyncError::Identity("Invalid email or password".into()));
        }

        let identity = Identity::new(account.uid);
        info!(identity = %identity, "password sign-in");
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<()> {
        self.set_current(None);
        Ok(())
    }
}
