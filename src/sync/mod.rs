// ============================================================================
// Collection Synchronizer
// ============================================================================
//
// Live mirrors of the identity's collections. Each store subscription is
// drained by its own task, and every snapshot it delivers replaces the
// mirror wholesale ("last snapshot wins").
//
// ============================================================================

pub mod mirror;
pub mod synchronizer;

pub use mirror::{Mirror, MirrorSnapshot};
pub use synchronizer::{CollectionSynchronizer, SyncTarget};
