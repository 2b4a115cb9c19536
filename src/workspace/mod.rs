// ============================================================================
// Workspaces
// ============================================================================
//
// Application-state containers, one per demo. A workspace owns the session
// resolver, the synchronizer with its mirrors, the gateway and the notice
// channel for one domain, and is passed around by reference.
//
// Session transitions drive the subscriptions:
//   SignedIn(id) -> open every collection for id (closing the old ones)
//   SignedOut    -> close every subscription and clear every mirror
//
// ============================================================================

pub mod crm;
pub mod tasks;

use crate::core::Result;
use crate::gateway::{FormEvent, FormState};
use std::future::Future;
use std::sync::Mutex;
use tracing::trace;

pub use crm::CrmWorkspace;
pub use tasks::TaskWorkspace;

/// The form a workspace currently shows, advanced by write outcomes.
#[derive(Debug, Default)]
pub struct FormSlot {
    state: Mutex<FormState>,
}

impl FormSlot {
    pub fn state(&self) -> FormState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn apply(&self, event: FormEvent) -> FormState {
        match self.state.lock() {
            Ok(mut state) => {
                let next = std::mem::take(&mut *state).apply(event);
                trace!(?next, "form state");
                *state = next.clone();
                next
            }
            Err(_) => FormState::Closed,
        }
    }

    /// Runs a create/update and closes the form when it succeeds.
    pub async fn submit<T, F>(&self, write: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = write.await;
        self.apply(match result {
            Ok(_) => FormEvent::Saved,
            Err(_) => FormEvent::Failed,
        });
        result
    }

    /// Runs a delete of `id`; an edit of that record is abandoned when the
    /// delete goes through.
    pub async fn submit_delete<F>(&self, id: &str, delete: F) -> Result<bool>
    where
        F: Future<Output = Result<bool>>,
    {
        let result = delete.await;
        if matches!(result, Ok(true)) {
            self.apply(FormEvent::Deleted(id.to_string()));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SyncError;

    #[tokio::test]
    async fn submit_moves_form() {
        let slot = FormSlot::default();
        slot.apply(FormEvent::OpenNew);

        let failed: Result<()> = slot.submit(async { Err(SyncError::validation("title")) }).await;
        assert!(failed.is_err());
        assert_eq!(slot.state(), FormState::Creating);

        slot.submit(async { Ok(()) }).await.unwrap();
        assert_eq!(slot.state(), FormState::Closed);
    }

    #[tokio::test]
    async fn declined_delete_keeps_edit_target() {
        let slot = FormSlot::default();
        slot.apply(FormEvent::OpenEdit("t1".into()));

        slot.submit_delete("t1", async { Ok(false) }).await.unwrap();
        assert_eq!(slot.state().edit_target(), Some("t1"));

        slot.submit_delete("t1", async { Ok(true) }).await.unwrap();
        assert_eq!(slot.state(), FormState::Closed);
    }
}
