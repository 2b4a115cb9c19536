// ============================================================================
// Mutation Gateway
// ============================================================================
//
// Create / update / delete against the identity's collections. Every write
// is validated locally first, and every failure is logged, published as a
// notice and handed back to the caller as a `SyncError`. Nothing here
// retries.
//
// ============================================================================

pub mod crm;
pub mod form;
pub mod sale_status;
pub mod task;

use crate::confirm::{Confirm, Prompt};
use crate::core::{CollectionPath, Document, Fields, Identity, Result, SyncError};
use crate::notice::Notifier;
use crate::session::require_identity;
use crate::store::DocumentStore;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, warn};
use uuid::Uuid;

pub use crm::CrmGateway;
pub use form::{FormEvent, FormState};
pub use sale_status::{CarStatusChange, SaleEvent, apply_sale_event, with_changes};
pub use task::TaskGateway;

/// Result of a task add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Written; carries the store-assigned id
    Created(String),
    /// No identity yet; held by the reconciler under a temporary id
    Buffered(Uuid),
}

impl AddOutcome {
    pub fn id(&self) -> Option<&str> {
        match self {
            AddOutcome::Created(id) => Some(id),
            AddOutcome::Buffered(_) => None,
        }
    }
}

/// Store access shared by the gateways: path scoping, identity checks and
/// failure reporting.
#[derive(Clone)]
pub(crate) struct Writer {
    store: Arc<dyn DocumentStore>,
    root: Option<String>,
    identity: watch::Receiver<Option<Identity>>,
    notifier: Notifier,
}

impl Writer {
    pub(crate) fn new(
        store: Arc<dyn DocumentStore>,
        root: Option<String>,
        identity: watch::Receiver<Option<Identity>>,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            root,
            identity,
            notifier,
        }
    }

    pub(crate) fn identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    pub(crate) fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    fn path(&self, collection: &str) -> Result<CollectionPath> {
        let identity = require_identity(self.identity())?;
        Ok(CollectionPath::scoped(self.root.as_deref(), &identity, collection))
    }

    pub(crate) async fn create(&self, collection: &str, fields: Fields) -> Result<String> {
        let path = self.path(collection)?;
        let id = self.store.create(&path, fields).await?;
        debug!(path = %path, id = %id, "document created");
        Ok(id)
    }

    pub(crate) async fn merge(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        require_id(collection, id)?;
        let path = self.path(collection)?;
        self.store.merge(&path, id, fields).await?;
        debug!(path = %path, id = %id, "document merged");
        Ok(())
    }

    pub(crate) async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let path = self.path(collection)?;
        self.store.delete(&path, id).await?;
        debug!(path = %path, id = %id, "document deleted");
        Ok(())
    }

    pub(crate) async fn fetch(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let path = self.path(collection)?;
        self.store.get(&path, id).await
    }

    pub(crate) async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        let path = self.path(collection)?;
        self.store.list(&path).await
    }

    /// Asks before a destructive delete. `false` means the user declined.
    pub(crate) async fn confirm_delete(&self, confirm: &dyn Confirm, collection: &str, id: &str) -> Result<bool> {
        require_id(collection, id)?;
        let prompt = Prompt::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        };
        let accepted = confirm.confirm(&prompt).await;
        if !accepted {
            debug!(collection, id, "delete declined");
        }
        Ok(accepted)
    }

    /// Logs and publishes a failure before returning it unchanged.
    pub(crate) fn surface<T>(&self, action: &str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            match err {
                SyncError::Validation(_) | SyncError::Unauthenticated(_) => {
                    warn!(action, error = %err, "write rejected")
                }
                _ => error!(action, error = %err, "write failed"),
            }
            self.notifier.report(err);
        }
        result
    }
}

fn require_id(collection: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(SyncError::validation(format!(
            "an existing {} identifier is required",
            collection
        )));
    }
    Ok(())
}
