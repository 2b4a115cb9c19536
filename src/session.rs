//! Session resolution: obtain an [`Identity`] before any collection work.
//!
//! Order of preference on [`SessionResolver::resolve`]:
//! 1. an actor the auth backend already holds,
//! 2. the configured pre-issued token,
//! 3. a fresh anonymous identity.
//!
//! A failed token exchange is reported and falls through to (3); it is never
//! retried. Every transition (`SignedIn` / `SignedOut`) is announced exactly
//! once, however many times the backend repeats itself.

use crate::auth::AuthProvider;
use crate::core::{Identity, Result, SyncError};
use crate::notice::Notifier;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Identity),
    SignedOut,
}

pub struct SessionResolver {
    auth: Arc<dyn AuthProvider>,
    token: Option<String>,
    notifier: Notifier,
    auth_rx: Mutex<watch::Receiver<Option<Identity>>>,
    identity: watch::Sender<Option<Identity>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionResolver {
    /// Registers the auth listener. Nothing is resolved until `resolve`.
    pub fn new(auth: Arc<dyn AuthProvider>, token: Option<String>, notifier: Notifier) -> Self {
        let auth_rx = auth.watch();
        let (identity, _) = watch::channel(None);
        let (events, _) = broadcast::channel(16);

        Self {
            auth,
            token: token.filter(|t| !t.trim().is_empty()),
            notifier,
            auth_rx: Mutex::new(auth_rx),
            identity,
            events,
        }
    }

    /// The resolved identity, `None` before resolution or after logout
    pub fn identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.identity.borrow().is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    pub async fn resolve(&self) -> Result<Identity> {
        if let Some(identity) = self.identity() {
            return Ok(identity);
        }

        if let Some(existing) = self.auth.current() {
            debug!(identity = %existing, "reusing authenticated actor");
            self.transition(Some(existing.clone()));
            return Ok(existing);
        }

        if let Some(token) = &self.token {
            match self.auth.sign_in_with_token(token).await {
                Ok(identity) => {
                    self.transition(Some(identity.clone()));
                    return Ok(identity);
                }
                Err(err) => {
                    warn!(error = %err, "token sign-in failed, falling back to anonymous");
                    self.notifier.report(&err);
                }
            }
        }

        match self.auth.sign_in_anonymously().await {
            Ok(identity) => {
                self.transition(Some(identity.clone()));
                Ok(identity)
            }
            Err(err) => {
                warn!(error = %err, "anonymous sign-in failed");
                self.notifier.report(&err);
                Err(err)
            }
        }
    }

    /// Credentialed sign-in; replaces any current (e.g. anonymous) identity
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        match self.auth.sign_in_with_password(email, password).await {
            Ok(identity) => {
                info!(identity = %identity, "signed in");
                self.transition(Some(identity.clone()));
                Ok(identity)
            }
            Err(err) => {
                self.notifier.report(&err);
                Err(err)
            }
        }
    }

    pub async fn logout(&self) -> Result<()> {
        if let Err(err) = self.auth.sign_out().await {
            self.notifier.report(&err);
            return Err(err);
        }
        self.transition(None);
        Ok(())
    }

    /// Waits for the auth backend to report a change that is a real
    /// transition for this session. Returns `None` once the backend is gone.
    pub async fn next_auth_change(&self) -> Option<SessionEvent> {
        let mut rx = self.auth_rx.lock().await;
        loop {
            if rx.changed().await.is_err() {
                return None;
            }
            let next = rx.borrow_and_update().clone();
            if let Some(event) = self.transition(next) {
                return Some(event);
            }
        }
    }

    /// Records `next` and announces it when it differs from the current
    /// identity.
    fn transition(&self, next: Option<Identity>) -> Option<SessionEvent> {
        let changed = self.identity.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
        if !changed {
            return None;
        }

        let event = match next {
            Some(identity) => SessionEvent::SignedIn(identity),
            None => SessionEvent::SignedOut,
        };
        debug!(?event, "session transition");
        let _ = self.events.send(event.clone());
        Some(event)
    }
}

/// Convenience for callers that need an identity or a typed refusal.
pub fn require_identity(identity: Option<Identity>) -> Result<Identity> {
    identity.ok_or_else(|| SyncError::Unauthenticated("no identity resolved yet".into()))
}
