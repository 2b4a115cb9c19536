// ============================================================================
// folio-sync Library
// ============================================================================
//
// Data layer behind the portfolio's demo apps (task manager, car-sales CRM)
// and the small backend services next to them (resume chat, contact form).
//
// Session Resolver -> Collection Synchronizer -> mirrors -> Mutation Gateway
// writes -> store delivers the new snapshot -> Derived Aggregator recomputes
//
// ============================================================================

pub mod auth;
pub mod chat;
pub mod config;
pub mod confirm;
pub mod contact;
pub mod core;
pub mod dashboard;
pub mod domain;
pub mod gateway;
pub mod notice;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod sync;
pub mod web;
pub mod workspace;

// Re-export main types for convenience
pub use core::{CollectionPath, Document, Fields, Identity, Result, SyncError};

pub use auth::{AuthProvider, MemoryAuthProvider};
pub use config::{ServerConfig, SyncConfig};
pub use confirm::{AutoConfirm, ChannelConfirm, Confirm, Prompt};
pub use dashboard::{DashboardStats, DashboardWatcher, SaleDetail};
pub use domain::{
    Car, CarPatch, CarStatus, Customer, CustomerPatch, Entity, Persisted, Record, Sale, SalePatch,
    Task, TaskDraft, TaskPatch,
};
pub use gateway::{
    AddOutcome, CarStatusChange, CrmGateway, FormEvent, FormState, SaleEvent, TaskGateway,
    apply_sale_event,
};
pub use notice::{Notice, NoticeKind, Notifier, Severity};
pub use reconcile::{PendingReconciler, ReconcileState, ReplayReport};
pub use session::{SessionEvent, SessionResolver};
pub use store::{DocumentStore, MemoryDocumentStore, SnapshotStream};
pub use sync::{CollectionSynchronizer, Mirror, MirrorSnapshot};
pub use workspace::{CrmWorkspace, TaskWorkspace};
