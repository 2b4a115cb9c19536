// ============================================================================
// Authentication Collaborator
// ============================================================================
//
// The data layer never talks to an identity backend directly: it consumes
// this contract. A listener (`watch`) delivers the current actor or `None`;
// sign-in calls resolve to an `Identity`.
//
// ============================================================================

pub mod memory;

use crate::core::{Identity, Result};
use async_trait::async_trait;
use tokio::sync::watch;

pub use memory::MemoryAuthProvider;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Registers a listener for auth changes. The receiver's current value
    /// is the actor known at registration time.
    fn watch(&self) -> watch::Receiver<Option<Identity>>;

    /// The currently signed-in actor, if any
    fn current(&self) -> Option<Identity>;

    async fn sign_in_anonymously(&self) -> Result<Identity>;

    /// Exchanges a pre-issued token for an identity
    async fn sign_in_with_token(&self, token: &str) -> Result<Identity>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity>;

    async fn sign_out(&self) -> Result<()>;
}
