//! Typed views over stored documents.
//!
//! Each entity names its collection and validates itself before a write.
//! Documents that do not decode into the entity are skipped by mirrors.

pub mod crm;
pub mod task;

use crate::core::{Document, Fields, Result, SyncError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

pub use crm::{Car, CarPatch, CarStatus, Customer, CustomerPatch, Sale, SalePatch};
pub use task::{Task, TaskDraft, TaskPatch};

pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name under the identity's namespace (e.g. "sales")
    const COLLECTION: &'static str;

    /// Shape checks run before any network call
    fn validate(&self) -> Result<()>;

    fn to_fields(&self) -> Result<Fields> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            other => Err(SyncError::Decode(format!(
                "{} did not serialize to an object: {}",
                Self::COLLECTION,
                other
            ))),
        }
    }

    fn from_document(doc: &Document) -> Result<Persisted<Self>> {
        Ok(Persisted {
            id: doc.id.clone(),
            value: doc.decode()?,
        })
    }
}

/// A record read back from the store, tagged with its identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Persisted<T> {
    pub id: String,
    pub value: T,
}

/// Either a stored record or a local one that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub enum Record<T> {
    Persisted { id: String, value: T },
    Pending { temp_id: Uuid, value: T },
}

impl<T> Record<T> {
    pub fn pending(value: T) -> Self {
        Record::Pending {
            temp_id: Uuid::new_v4(),
            value,
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Record::Persisted { value, .. } | Record::Pending { value, .. } => value,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Record::Pending { .. })
    }

    /// Display key: the store id, or the temporary id for pending records
    pub fn key(&self) -> String {
        match self {
            Record::Persisted { id, .. } => id.clone(),
            Record::Pending { temp_id, .. } => temp_id.to_string(),
        }
    }
}

impl<T> From<Persisted<T>> for Record<T> {
    fn from(p: Persisted<T>) -> Self {
        Record::Persisted {
            id: p.id,
            value: p.value,
        }
    }
}

/// Trims `value` and rejects it when nothing is left.
pub(crate) fn required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SyncError::validation(format!("{} is required", field)));
    }
    Ok(())
}

pub(crate) fn non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(SyncError::validation(format!(
            "{} must be a non-negative amount",
            field
        )));
    }
    Ok(())
}
