use super::{AddOutcome, Writer};
use crate::confirm::Confirm;
use crate::core::{Identity, Result, SyncError};
use crate::domain::{Entity, Persisted, Task, TaskDraft, TaskPatch};
use crate::notice::Notifier;
use crate::reconcile::PendingReconciler;
use crate::store::DocumentStore;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Writes for the task list.
///
/// Adds made before sign-in are handed to the [`PendingReconciler`] instead
/// of failing.
pub struct TaskGateway {
    writer: Writer,
    pending: Arc<PendingReconciler>,
    confirm: Arc<dyn Confirm>,
}

impl TaskGateway {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        root: Option<String>,
        identity: watch::Receiver<Option<Identity>>,
        pending: Arc<PendingReconciler>,
        confirm: Arc<dyn Confirm>,
        notifier: Notifier,
    ) -> Self {
        Self {
            writer: Writer::new(store, root, identity, notifier),
            pending,
            confirm,
        }
    }

    pub fn identity(&self) -> Option<Identity> {
        self.writer.identity()
    }

    pub async fn add(&self, draft: TaskDraft) -> Result<AddOutcome> {
        let result = self.try_add(draft).await;
        self.writer.surface("add task", result)
    }

    async fn try_add(&self, draft: TaskDraft) -> Result<AddOutcome> {
        draft.validate()?;

        if self.identity().is_none() {
            let temp_id = self.pending.buffer(draft)?;
            self.writer
                .notifier()
                .warn("Not signed in yet: the task is kept locally until you sign in");
            return Ok(AddOutcome::Buffered(temp_id));
        }

        let id = self.writer.create(Task::COLLECTION, draft.into_fields()).await?;
        info!(id = %id, "task added");
        Ok(AddOutcome::Created(id))
    }

    /// Merges the supplied fields into task `id`.
    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<()> {
        let result = self.try_update(id, patch).await;
        self.writer.surface("update task", result)
    }

    async fn try_update(&self, id: &str, patch: TaskPatch) -> Result<()> {
        patch.validate()?;
        if patch.is_empty() {
            debug!(id, "empty task patch, nothing to write");
            return Ok(());
        }
        self.writer.merge(Task::COLLECTION, id, patch.into_fields()).await
    }

    pub async fn toggle_completed(&self, task: &Persisted<Task>) -> Result<()> {
        self.update(&task.id, TaskPatch::completed(!task.value.completed))
            .await
    }

    /// Deletes task `id` after confirmation. `Ok(false)` when declined.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = self.try_delete(id).await;
        self.writer.surface("delete task", result)
    }

    async fn try_delete(&self, id: &str) -> Result<bool> {
        if self.identity().is_none() {
            return Err(SyncError::Unauthenticated("sign in to delete tasks".into()));
        }
        if !self
            .writer
            .confirm_delete(self.confirm.as_ref(), Task::COLLECTION, id)
            .await?
        {
            return Ok(false);
        }
        self.writer.delete(Task::COLLECTION, id).await?;
        info!(id, "task deleted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::AutoConfirm;
    use crate::core::CollectionPath;
    use crate::store::MemoryDocumentStore;
    use chrono::NaiveDate;
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryDocumentStore>,
        identity: watch::Sender<Option<Identity>>,
        pending: Arc<PendingReconciler>,
        gateway: TaskGateway,
    }

    fn fixture(confirm: AutoConfirm) -> Fixture {
        let store = Arc::new(MemoryDocumentStore::new());
        let (identity, rx) = watch::channel(None);
        let notifier = Notifier::default();
        let pending = Arc::new(PendingReconciler::new(notifier.clone()));
        let gateway = TaskGateway::new(
            store.clone(),
            None,
            rx,
            pending.clone(),
            Arc::new(confirm),
            notifier,
        );
        Fixture {
            store,
            identity,
            pending,
            gateway,
        }
    }

    fn tasks_path(uid: &str) -> CollectionPath {
        CollectionPath::scoped(None, &Identity::anonymous(uid), "tasks")
    }

    #[tokio::test]
    async fn add_writes_defaults() {
        let f = fixture(AutoConfirm::accept());
        f.identity.send_replace(Some(Identity::anonymous("u1")));

        let due = NaiveDate::from_ymd_opt(2024, 7, 4);
        let outcome = f.gateway.add(TaskDraft::new(" Buy milk ", due)).await.unwrap();
        let id = outcome.id().unwrap().to_string();

        let doc = f.store.get(&tasks_path("u1"), &id).await.unwrap().unwrap();
        assert_eq!(doc.get_str("title"), Some("Buy milk"));
        assert_eq!(doc.get("completed"), Some(&json!(false)));
        assert_eq!(doc.get_str("dueDate"), Some("2024-07-04"));
        assert!(doc.get_str("createdAt").is_some());
    }

    #[tokio::test]
    async fn add_without_identity_buffers() {
        let f = fixture(AutoConfirm::accept());
        let outcome = f.gateway.add(TaskDraft::new("later", None)).await.unwrap();

        assert!(matches!(outcome, AddOutcome::Buffered(_)));
        assert_eq!(f.pending.len(), 1);
        assert_eq!(f.store.write_count(), 0);
    }

    #[tokio::test]
    async fn blank_title_never_reaches_store() {
        let f = fixture(AutoConfirm::accept());
        f.identity.send_replace(Some(Identity::anonymous("u1")));

        let err = f.gateway.add(TaskDraft::new("  ", None)).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(f.store.write_count(), 0);
        assert!(f.pending.is_empty());
    }

    #[tokio::test]
    async fn toggle_merges_only_completion() {
        let f = fixture(AutoConfirm::accept());
        f.identity.send_replace(Some(Identity::anonymous("u1")));
        let id = f
            .gateway
            .add(TaskDraft::new("a", None))
            .await
            .unwrap()
            .id()
            .unwrap()
            .to_string();

        let task = Persisted {
            id: id.clone(),
            value: TaskDraft::new("a", None).to_task(),
        };
        f.gateway.toggle_completed(&task).await.unwrap();

        let doc = f.store.get(&tasks_path("u1"), &id).await.unwrap().unwrap();
        assert_eq!(doc.get("completed"), Some(&json!(true)));
        assert_eq!(doc.get_str("title"), Some("a"));
    }

    #[tokio::test]
    async fn update_requires_identifier() {
        let f = fixture(AutoConfirm::accept());
        f.identity.send_replace(Some(Identity::anonymous("u1")));
        let err = f.gateway.update(" ", TaskPatch::completed(true)).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn declined_delete_issues_no_write() {
        let confirm = AutoConfirm::decline();
        let f = fixture(confirm.clone());
        f.identity.send_replace(Some(Identity::anonymous("u1")));
        let id = f
            .gateway
            .add(TaskDraft::new("keep me", None))
            .await
            .unwrap()
            .id()
            .unwrap()
            .to_string();

        assert!(!f.gateway.delete(&id).await.unwrap());
        assert_eq!(f.store.write_count(), 1);
        assert_eq!(confirm.prompts().len(), 1);
        assert!(f.store.get(&tasks_path("u1"), &id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn store_failure_is_reported() {
        let f = fixture(AutoConfirm::accept());
        let mut notices = f.gateway.writer.notifier().subscribe();
        f.identity.send_replace(Some(Identity::anonymous("u1")));
        f.store.fail_next_write("quota exceeded");

        let err = f.gateway.add(TaskDraft::new("a", None)).await.unwrap_err();
        assert_eq!(err, SyncError::Store("quota exceeded".into()));
        let notice = notices.try_recv().unwrap();
        assert!(notice.message.contains("quota exceeded"));
    }
}
