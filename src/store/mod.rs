// ============================================================================
// Document Store Collaborator
// ============================================================================
//
// Live-query document database contract. Subscriptions are streams of full
// collection snapshots; the first item is the state at subscription time.
// Dropping the stream unsubscribes.
//
// ============================================================================

pub mod memory;

use crate::core::{CollectionPath, Document, Fields, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;

pub use memory::MemoryDocumentStore;

/// Stream of complete point-in-time collection payloads
pub type SnapshotStream = BoxStream<'static, Result<Vec<Document>>>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn subscribe(&self, path: &CollectionPath) -> Result<SnapshotStream>;

    /// Creates a document and returns its store-assigned identifier
    async fn create(&self, path: &CollectionPath, fields: Fields) -> Result<String>;

    /// Merges `partial` into an existing document, leaving other fields alone
    async fn merge(&self, path: &CollectionPath, id: &str, partial: Fields) -> Result<()>;

    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<()>;

    async fn get(&self, path: &CollectionPath, id: &str) -> Result<Option<Document>>;

    /// One-shot read of every document at `path`
    async fn list(&self, path: &CollectionPath) -> Result<Vec<Document>>;
}
