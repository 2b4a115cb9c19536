pub mod error;
pub mod types;

pub use error::{Result, SyncError};
pub use types::{
    CollectionPath, Document, Fields, Identity, SERVER_TIMESTAMP_KEY, is_server_timestamp,
    server_timestamp,
};
