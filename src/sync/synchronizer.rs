use super::mirror::Mirror;
use crate::core::{CollectionPath, Document, Identity, Result};
use crate::domain::Entity;
use crate::notice::Notifier;
use crate::store::{DocumentStore, SnapshotStream};
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A mirror the synchronizer can feed without knowing its entity type.
pub trait SyncTarget: Send + Sync {
    fn collection(&self) -> &'static str;

    /// Epoch a new subscription tags its deliveries with
    fn epoch(&self) -> u64;

    /// Replaces the mirror with a delivered snapshot. Returns `false` when
    /// the mirror was cleared after `epoch` and the snapshot was dropped.
    fn apply(&self, epoch: u64, docs: &[Document]) -> bool;

    /// Empties the mirror and invalidates every earlier epoch
    fn clear(&self);
}

impl<T: Entity> SyncTarget for Mirror<T> {
    fn collection(&self) -> &'static str {
        T::COLLECTION
    }

    fn epoch(&self) -> u64 {
        Mirror::epoch(self)
    }

    fn apply(&self, epoch: u64, docs: &[Document]) -> bool {
        self.apply_documents_at(epoch, docs)
    }

    fn clear(&self) {
        Mirror::clear(self);
    }
}

/// One open listener. Dropping it invalidates the handle.
struct Subscription {
    path: CollectionPath,
    join_handle: Option<JoinHandle<()>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.abort();
        }
    }
}

/// Keeps one live mirror per registered collection, scoped to an identity.
///
/// `open` replaces every previous subscription; `close` tears them all down
/// and empties the mirrors. Collections update independently of each other.
pub struct CollectionSynchronizer {
    store: Arc<dyn DocumentStore>,
    root: Option<String>,
    notifier: Notifier,
    targets: Vec<Arc<dyn SyncTarget>>,
    open: Mutex<Vec<Subscription>>,
}

impl CollectionSynchronizer {
    pub fn new(store: Arc<dyn DocumentStore>, root: Option<String>, notifier: Notifier) -> Self {
        Self {
            store,
            root,
            notifier,
            targets: Vec::new(),
            open: Mutex::new(Vec::new()),
        }
    }

    /// Registers a mirror to be fed on the next `open`.
    pub fn register<T: Entity>(mut self, mirror: &Mirror<T>) -> Self {
        self.targets.push(Arc::new(mirror.clone()));
        self
    }

    pub fn collections(&self) -> Vec<&'static str> {
        self.targets.iter().map(|t| t.collection()).collect()
    }

    pub fn path_for(&self, identity: &Identity, collection: &str) -> CollectionPath {
        CollectionPath::scoped(self.root.as_deref(), identity, collection)
    }

    /// Number of live subscriptions
    pub fn open_count(&self) -> usize {
        self.open.lock().map(|open| open.len()).unwrap_or(0)
    }

    pub fn is_open(&self) -> bool {
        self.open_count() > 0
    }

    /// Paths currently subscribed to
    pub fn open_paths(&self) -> Vec<CollectionPath> {
        self.open
            .lock()
            .map(|open| open.iter().map(|s| s.path.clone()).collect())
            .unwrap_or_default()
    }

    /// Subscribes every registered collection for `identity`.
    ///
    /// Prior subscriptions are closed first. Each mirror holds the store's
    /// current state by the time this returns; later snapshots are applied
    /// by a background task per collection. Returns how many collections
    /// were opened; failures are reported and leave that mirror empty.
    pub async fn open(&self, identity: &Identity) -> Result<usize> {
        self.close()?;

        let mut opened = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let path = self.path_for(identity, target.collection());
            let epoch = target.epoch();
            match self.store.subscribe(&path).await {
                Ok(mut stream) => {
                    if let Some(first) = stream.next().await {
                        self.deliver(target.as_ref(), epoch, first);
                    }
                    let join_handle = self.spawn_listener(Arc::clone(target), epoch, stream);
                    debug!(path = %path, "subscription opened");
                    opened.push(Subscription {
                        path,
                        join_handle: Some(join_handle),
                    });
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "subscription could not be opened");
                    self.notifier.report(&err);
                }
            }
        }

        let count = opened.len();
        self.open.lock()?.extend(opened);
        info!(identity = %identity, collections = count, "collections synchronized");
        Ok(count)
    }

    /// Aborts every listener and clears every mirror.
    ///
    /// A listener already applying a snapshot on another worker finishes
    /// after its abort, but the clear has moved the mirror to a new epoch
    /// and that snapshot is dropped.
    pub fn close(&self) -> Result<()> {
        let closed: Vec<Subscription> = self.open.lock()?.drain(..).collect();
        if !closed.is_empty() {
            debug!(count = closed.len(), "closing subscriptions");
        }
        drop(closed);

        for target in &self.targets {
            target.clear();
        }
        Ok(())
    }

    fn deliver(&self, target: &dyn SyncTarget, epoch: u64, item: Result<Vec<Document>>) {
        apply_delivery(target, epoch, &self.notifier, item);
    }

    fn spawn_listener(&self, target: Arc<dyn SyncTarget>, epoch: u64, mut stream: SnapshotStream) -> JoinHandle<()> {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                apply_delivery(target.as_ref(), epoch, &notifier, item);
            }
            debug!(collection = target.collection(), "subscription stream ended");
        })
    }
}

impl Drop for CollectionSynchronizer {
    fn drop(&mut self) {
        if let Ok(mut open) = self.open.lock() {
            open.clear();
        }
    }
}

/// Snapshots replace the mirror; errors leave it at its last good state.
/// Anything from a closed subscription is ignored.
fn apply_delivery(target: &dyn SyncTarget, epoch: u64, notifier: &Notifier, item: Result<Vec<Document>>) {
    match item {
        Ok(docs) => {
            if !target.apply(epoch, &docs) {
                debug!(collection = target.collection(), "delivery after close dropped");
            }
        }
        Err(_) if target.epoch() != epoch => {
            debug!(collection = target.collection(), "error after close dropped");
        }
        Err(err) => {
            warn!(collection = target.collection(), error = %err, "subscription error, keeping last snapshot");
            notifier.report(&err);
        }
    }
}
