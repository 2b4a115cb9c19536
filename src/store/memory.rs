use super::{DocumentStore, SnapshotStream};
use crate::core::{CollectionPath, Document, Fields, Result, SyncError, is_server_timestamp};
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{RwLock, watch};
use tracing::debug;
use uuid::Uuid;

/// What subscribers of one collection see: the latest snapshot, or the
/// error the listener reported last.
type Feed = std::result::Result<Arc<Vec<Document>>, String>;

struct Collection {
    /// Documents in arrival order
    docs: Vec<Document>,
    feed: watch::Sender<Feed>,
}

impl Collection {
    fn new() -> Self {
        let (feed, _) = watch::channel(Ok(Arc::new(Vec::new())));
        Self {
            docs: Vec::new(),
            feed,
        }
    }

    fn publish(&self) {
        self.feed.send_replace(Ok(Arc::new(self.docs.clone())));
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.docs.iter().position(|d| d.id == id)
    }

    /// Nothing stored and nobody listening
    fn is_idle(&self) -> bool {
        self.docs.is_empty() && self.feed.receiver_count() == 0
    }
}

/// In-process live-query document store
///
/// Every successful write republishes the whole collection to its
/// subscribers. Failure injection hooks let tests exercise the error paths.
pub struct MemoryDocumentStore {
    /// Collections keyed by full path
    collections: RwLock<HashMap<String, Collection>>,
    /// Message for the next write to fail with
    write_failure: std::sync::Mutex<Option<String>>,
    writes: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            write_failure: std::sync::Mutex::new(None),
            writes: AtomicUsize::new(0),
        }
    }

    /// Makes the next create/merge/delete fail with `message`
    pub fn fail_next_write(&self, message: impl Into<String>) {
        if let Ok(mut slot) = self.write_failure.lock() {
            *slot = Some(message.into());
        }
    }

    /// Reports a listener failure to every subscriber of `path`
    pub async fn fail_subscription(&self, path: &CollectionPath, message: impl Into<String>) {
        let collections = self.collections.read().await;
        match collections.get(path.as_str()) {
            Some(collection) => {
                collection.feed.send_replace(Err(message.into()));
            }
            None => debug!(path = %path, "no subscribers to fail"),
        }
    }

    /// Successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Documents currently stored at `path`, in arrival order
    pub async fn documents(&self, path: &CollectionPath) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(path.as_str())
            .map(|c| c.docs.clone())
            .unwrap_or_default()
    }

    /// Number of live subscribers on `path`
    pub async fn subscriber_count(&self, path: &CollectionPath) -> usize {
        self.collections
            .read()
            .await
            .get(path.as_str())
            .map(|c| c.feed.receiver_count())
            .unwrap_or(0)
    }

    /// Paths with documents or live subscribers
    pub async fn tracked_paths(&self) -> usize {
        self.collections.read().await.len()
    }

    /// Drops entries left behind by unsubscribed, empty collections
    fn prune(collections: &mut HashMap<String, Collection>) {
        collections.retain(|_, collection| !collection.is_idle());
    }

    fn take_write_failure(&self) -> Result<()> {
        let mut slot = self.write_failure.lock()?;
        match slot.take() {
            Some(message) => Err(SyncError::Store(message)),
            None => Ok(()),
        }
    }

    /// Replaces server-timestamp sentinels with the write's time
    fn resolve_sentinels(fields: &mut Fields) {
        let now = Utc::now().to_rfc3339();
        for value in fields.values_mut() {
            if is_server_timestamp(value) {
                *value = Value::String(now.clone());
            }
        }
    }

    fn new_id() -> String {
        Uuid::new_v4().simple().to_string()[..20].to_string()
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn subscribe(&self, path: &CollectionPath) -> Result<SnapshotStream> {
        let rx = {
            let mut collections = self.collections.write().await;
            Self::prune(&mut collections);
            collections
                .entry(path.as_str().to_string())
                .or_insert_with(Collection::new)
                .feed
                .subscribe()
        };

        let collection = path.collection().to_string();
        let snapshots = stream::unfold((rx, true), move |(mut rx, first)| {
            let collection = collection.clone();
            async move {
                if !first && rx.changed().await.is_err() {
                    return None;
                }
                let item = match &*rx.borrow_and_update() {
                    Ok(docs) => Ok(docs.as_ref().clone()),
                    Err(message) => Err(SyncError::Subscription {
                        collection,
                        message: message.clone(),
                    }),
                };
                Some((item, (rx, false)))
            }
        });

        Ok(snapshots.boxed())
    }

    async fn create(&self, path: &CollectionPath, mut fields: Fields) -> Result<String> {
        self.take_write_failure()?;
        if fields.remove("id").is_some() {
            debug!(path = %path, "dropped client-supplied id from create payload");
        }
        Self::resolve_sentinels(&mut fields);

        let id = Self::new_id();
        let mut collections = self.collections.write().await;
        let collection = collections
            .entry(path.as_str().to_string())
            .or_insert_with(Collection::new);
        collection.docs.push(Document::new(id.clone(), fields));
        collection.publish();
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(id)
    }

    async fn merge(&self, path: &CollectionPath, id: &str, mut partial: Fields) -> Result<()> {
        self.take_write_failure()?;
        partial.remove("id");
        Self::resolve_sentinels(&mut partial);

        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(path.as_str())
            .ok_or_else(|| SyncError::not_found(path.collection(), id))?;
        let index = collection
            .position(id)
            .ok_or_else(|| SyncError::not_found(path.collection(), id))?;

        collection.docs[index].fields.extend(partial);
        collection.publish();
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<()> {
        self.take_write_failure()?;

        let mut collections = self.collections.write().await;
        if let Some(collection) = collections.get_mut(path.as_str()) {
            if let Some(index) = collection.position(id) {
                collection.docs.remove(index);
                collection.publish();
            }
        }
        Self::prune(&mut collections);
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    async fn get(&self, path: &CollectionPath, id: &str) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(path.as_str())
            .and_then(|c| c.docs.iter().find(|d| d.id == id).cloned()))
    }

    async fn list(&self, path: &CollectionPath) -> Result<Vec<Document>> {
        Ok(self.documents(path).await)
    }
}
