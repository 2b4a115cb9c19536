use crate::core::Document;
use crate::domain::{Entity, Persisted};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{trace, warn};

/// Immutable point-in-time view of one collection.
///
/// Items keep the order the store delivered them in; `index` maps an
/// identifier to its position.
#[derive(Debug)]
pub struct MirrorSnapshot<T> {
    items: Vec<Persisted<T>>,
    index: HashMap<String, usize>,
    version: u64,
    /// Number of clears so far
    epoch: u64,
}

impl<T> MirrorSnapshot<T> {
    fn empty(version: u64, epoch: u64) -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
            version,
            epoch,
        }
    }

    fn build(items: Vec<Persisted<T>>, version: u64, epoch: u64) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(pos, item)| (item.id.clone(), pos))
            .collect();
        Self {
            items,
            index,
            version,
            epoch,
        }
    }

    pub fn items(&self) -> &[Persisted<T>] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &Persisted<T>> {
        self.items.iter()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&pos| &self.items[pos].value)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }

    /// Bumped on every replacement, including clears
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// In-memory read replica of one collection.
///
/// Every delivery swaps in a whole new [`MirrorSnapshot`], so a reader
/// holding an `Arc` from [`Mirror::current`] never sees a half-applied
/// update. Clones share the same underlying channel.
///
/// Each [`Mirror::clear`] starts a new epoch. Deliveries tagged with an
/// earlier epoch are dropped, so a listener that was already applying a
/// snapshot when its subscription closed cannot repopulate the mirror.
pub struct Mirror<T> {
    tx: Arc<watch::Sender<Arc<MirrorSnapshot<T>>>>,
}

impl<T> Clone for Mirror<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T: Entity> Mirror<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(MirrorSnapshot::empty(0, 0)));
        Self { tx: Arc::new(tx) }
    }

    pub fn collection(&self) -> &'static str {
        T::COLLECTION
    }

    pub fn current(&self) -> Arc<MirrorSnapshot<T>> {
        self.tx.borrow().clone()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.tx.borrow().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    pub fn epoch(&self) -> u64 {
        self.tx.borrow().epoch
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<MirrorSnapshot<T>>> {
        self.tx.subscribe()
    }

    /// Resolves once a snapshot satisfying `pred` has been published.
    pub async fn wait_for<F>(&self, mut pred: F) -> Arc<MirrorSnapshot<T>>
    where
        F: FnMut(&MirrorSnapshot<T>) -> bool,
    {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(|snap| pred(snap.as_ref())).await {
            Ok(snap) => snap.clone(),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => self.current(),
        }
    }

    /// Replaces the whole mirror with `items`.
    pub fn replace(&self, items: Vec<Persisted<T>>) {
        self.tx.send_modify(|current| {
            *current = Arc::new(MirrorSnapshot::build(items, current.version + 1, current.epoch));
        });
        trace!(collection = T::COLLECTION, len = self.len(), "mirror replaced");
    }

    /// Replaces the mirror with `items` unless it was cleared after `epoch`.
    /// The check and the swap happen under the channel's write lock.
    pub fn replace_at(&self, epoch: u64, items: Vec<Persisted<T>>) -> bool {
        let applied = self.tx.send_if_modified(|current| {
            if current.epoch != epoch {
                return false;
            }
            *current = Arc::new(MirrorSnapshot::build(items, current.version + 1, epoch));
            true
        });
        if applied {
            trace!(collection = T::COLLECTION, len = self.len(), "mirror replaced");
        } else {
            trace!(collection = T::COLLECTION, epoch, "stale delivery dropped");
        }
        applied
    }

    /// Decodes a delivered snapshot and replaces the mirror with it.
    /// Documents that do not decode are skipped.
    pub fn apply_documents(&self, docs: &[Document]) -> usize {
        let (items, skipped) = Self::decode(docs);
        self.replace(items);
        skipped
    }

    /// [`Mirror::apply_documents`] guarded by [`Mirror::replace_at`].
    pub fn apply_documents_at(&self, epoch: u64, docs: &[Document]) -> bool {
        let (items, _) = Self::decode(docs);
        self.replace_at(epoch, items)
    }

    fn decode(docs: &[Document]) -> (Vec<Persisted<T>>, usize) {
        let mut skipped = 0;
        let items = docs
            .iter()
            .filter_map(|doc| match T::from_document(doc) {
                Ok(item) => Some(item),
                Err(err) => {
                    skipped += 1;
                    warn!(collection = T::COLLECTION, id = %doc.id, error = %err, "skipping undecodable document");
                    None
                }
            })
            .collect();
        (items, skipped)
    }

    /// Empties the mirror and starts a new epoch.
    pub fn clear(&self) {
        self.tx.send_modify(|current| {
            *current = Arc::new(MirrorSnapshot::empty(current.version + 1, current.epoch + 1));
        });
    }
}

impl<T: Entity> Default for Mirror<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;
    use serde_json::json;

    fn doc(id: &str, title: &str) -> Document {
        Document::new(id, json!({"title": title}).as_object().cloned().unwrap())
    }

    #[test]
    fn mirror_equals_latest_snapshot() {
        let mirror: Mirror<Task> = Mirror::new();
        mirror.apply_documents(&[doc("a", "one"), doc("b", "two")]);
        assert_eq!(mirror.current().ids(), vec!["a", "b"]);

        mirror.apply_documents(&[doc("c", "three")]);
        let snap = mirror.current();
        assert_eq!(snap.ids(), vec!["c"]);
        assert!(snap.get("a").is_none());
        assert_eq!(snap.get("c").map(|t| t.title.as_str()), Some("three"));
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let mirror: Mirror<Task> = Mirror::new();
        mirror.apply_documents(&[doc("a", "one")]);
        let held = mirror.current();

        mirror.apply_documents(&[doc("b", "two"), doc("c", "three")]);
        assert_eq!(held.len(), 1);
        assert_eq!(mirror.len(), 2);
        assert!(mirror.current().version() > held.version());
    }

    #[test]
    fn undecodable_documents_are_skipped() {
        let mirror: Mirror<Task> = Mirror::new();
        let broken = Document::new("x", json!({"title": 5}).as_object().cloned().unwrap());
        let skipped = mirror.apply_documents(&[doc("a", "one"), broken]);
        assert_eq!(skipped, 1);
        assert_eq!(mirror.current().ids(), vec!["a"]);
    }

    #[test]
    fn deliveries_from_before_a_clear_are_dropped() {
        let mirror: Mirror<Task> = Mirror::new();
        let epoch = mirror.epoch();
        assert!(mirror.apply_documents_at(epoch, &[doc("a", "one")]));

        mirror.clear();
        let version = mirror.current().version();
        assert!(!mirror.apply_documents_at(epoch, &[doc("a", "one"), doc("b", "two")]));
        assert!(mirror.is_empty());
        assert_eq!(mirror.current().version(), version);

        assert!(mirror.apply_documents_at(mirror.epoch(), &[doc("c", "three")]));
        assert_eq!(mirror.current().ids(), vec!["c"]);
    }

    #[test]
    fn clear_empties_and_notifies() {
        let mirror: Mirror<Task> = Mirror::new();
        let mut rx = mirror.subscribe();
        mirror.apply_documents(&[doc("a", "one")]);
        mirror.clear();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_empty());
    }
}
