use super::FormSlot;
use crate::auth::AuthProvider;
use crate::config::SyncConfig;
use crate::confirm::Confirm;
use crate::core::{Identity, Result};
use crate::domain::{Persisted, Record, Task, TaskDraft, TaskPatch};
use crate::gateway::{AddOutcome, TaskGateway};
use crate::notice::{Notice, Notifier};
use crate::reconcile::{PendingReconciler, ReconcileState, ReplayReport};
use crate::session::{SessionEvent, SessionResolver};
use crate::store::DocumentStore;
use crate::sync::{CollectionSynchronizer, Mirror};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Task manager state: one `tasks` collection plus the pending buffer.
pub struct TaskWorkspace {
    notifier: Notifier,
    session: SessionResolver,
    tasks: Mirror<Task>,
    sync: CollectionSynchronizer,
    pending: Arc<PendingReconciler>,
    gateway: TaskGateway,
    confirm: Arc<dyn Confirm>,
    form: FormSlot,
}

impl TaskWorkspace {
    pub fn new(
        config: &SyncConfig,
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        let notifier = Notifier::new(config.notice_capacity);
        let root = config.path_root();
        let session = SessionResolver::new(auth, config.auth_token.clone(), notifier.clone());

        let tasks = Mirror::new();
        let sync = CollectionSynchronizer::new(store.clone(), root.clone(), notifier.clone())
            .register(&tasks);
        let pending = Arc::new(PendingReconciler::new(notifier.clone()));
        let gateway = TaskGateway::new(
            store,
            root,
            session.watch_identity(),
            pending.clone(),
            confirm.clone(),
            notifier.clone(),
        );

        Self {
            notifier,
            session,
            tasks,
            sync,
            pending,
            gateway,
            confirm,
            form: FormSlot::default(),
        }
    }

    // ----- session -----

    /// Resolves an identity and opens the task subscription.
    pub async fn start(&self) -> Result<Identity> {
        let identity = self.session.resolve().await?;
        self.signed_in(&identity).await?;
        Ok(identity)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Identity> {
        let identity = self.session.login(email, password).await?;
        self.signed_in(&identity).await?;
        Ok(identity)
    }

    pub async fn logout(&self) -> Result<()> {
        self.session.logout().await?;
        self.signed_out()
    }

    /// Follows auth changes made outside this workspace until the auth
    /// backend goes away.
    pub async fn run(&self) -> Result<()> {
        while let Some(event) = self.session.next_auth_change().await {
            self.handle(event).await?;
        }
        debug!("auth listener closed");
        Ok(())
    }

    pub async fn handle(&self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::SignedIn(identity) => self.signed_in(&identity).await,
            SessionEvent::SignedOut => self.signed_out(),
        }
    }

    async fn signed_in(&self, identity: &Identity) -> Result<()> {
        self.sync.open(identity).await?;
        if !self.pending.is_empty() {
            self.reconcile().await?;
        }
        Ok(())
    }

    fn signed_out(&self) -> Result<()> {
        self.sync.close()?;
        info!("signed out, task mirror cleared");
        Ok(())
    }

    /// Offers to save tasks added before sign-in.
    pub async fn reconcile(&self) -> Result<ReplayReport> {
        self.pending
            .reconcile(&self.gateway, self.confirm.as_ref())
            .await
    }

    // ----- reads -----

    pub fn identity(&self) -> Option<Identity> {
        self.session.identity()
    }

    pub fn session(&self) -> &SessionResolver {
        &self.session
    }

    pub fn mirror(&self) -> &Mirror<Task> {
        &self.tasks
    }

    pub fn synchronizer(&self) -> &CollectionSynchronizer {
        &self.sync
    }

    pub fn pending_state(&self) -> ReconcileState {
        self.pending.state()
    }

    /// Unsaved tasks first, then stored tasks in arrival order.
    pub fn tasks(&self) -> Vec<Record<Task>> {
        let mut listed = self.pending.pending();
        listed.extend(self.tasks.current().iter().cloned().map(Record::from));
        listed
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    pub fn form(&self) -> &FormSlot {
        &self.form
    }

    // ----- writes -----

    /// Adds a task, or buffers it while nobody is signed in.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use folio_sync::{AutoConfirm, MemoryAuthProvider, MemoryDocumentStore, SyncConfig};
    /// use folio_sync::{TaskDraft, TaskWorkspace};
    /// use std::sync::Arc;
    ///
    /// # tokio_test::block_on(async {
    /// let workspace = TaskWorkspace::new(
    ///     &SyncConfig::new().app_id("demo"),
    ///     Arc::new(MemoryAuthProvider::new()),
    ///     Arc::new(MemoryDocumentStore::new()),
    ///     Arc::new(AutoConfirm::accept()),
    /// );
    /// workspace.start().await.unwrap();
    /// workspace.add(TaskDraft::new("Update resume", None)).await.unwrap();
    /// # });
    /// ```
    pub async fn add(&self, draft: TaskDraft) -> Result<AddOutcome> {
        self.form.submit(self.gateway.add(draft)).await
    }

    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<()> {
        self.form.submit(self.gateway.update(id, patch)).await
    }

    pub async fn toggle_completed(&self, task: &Persisted<Task>) -> Result<()> {
        self.gateway.toggle_completed(task).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.form.submit_delete(id, self.gateway.delete(id)).await
    }
}
