use super::{Result, SyncError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Field map of a stored document (field name -> JSON value).
pub type Fields = Map<String, Value>;

/// Key of the sentinel object that asks the store to stamp its own clock.
pub const SERVER_TIMESTAMP_KEY: &str = "$serverTimestamp";

/// Sentinel value resolved by the store to the write's server time.
pub fn server_timestamp() -> Value {
    json!({ SERVER_TIMESTAMP_KEY: true })
}

pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.len() == 1 && obj.get(SERVER_TIMESTAMP_KEY) == Some(&Value::Bool(true)))
}

/// Opaque handle for the current actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    uid: String,
    anonymous: bool,
}

impl Identity {
    /// Identity obtained through a credential (token or password)
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            anonymous: false,
        }
    }

    /// Identity created by an anonymous sign-in
    pub fn anonymous(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            anonymous: true,
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uid)
    }
}

/// A stored document: field map plus the store-assigned identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Deserializes the field map into a typed view.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|e| {
            SyncError::Decode(format!("document '{}': {}", self.id, e))
        })
    }
}

/// Path of a collection namespaced per identity:
/// `[root/]users/{identity}/{collection}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    path: String,
    collection: String,
}

impl CollectionPath {
    pub fn scoped(root: Option<&str>, identity: &Identity, collection: &str) -> Self {
        let path = match root.map(|r| r.trim_matches('/')).filter(|r| !r.is_empty()) {
            Some(root) => format!("{}/users/{}/{}", root, identity.uid(), collection),
            None => format!("users/{}/{}", identity.uid(), collection),
        };

        Self {
            path,
            collection: collection.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Trailing collection name (e.g. `sales`)
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
