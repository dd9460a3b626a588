//! Edit history for versioned content items (entries and comments).
//!
//! - [`recorder`] decides which edits deserve a snapshot, merges bursts of
//!   edits by one actor, and drops snapshots the actor reverted.
//! - [`status`] derives delete / hard-delete / undelete actions from two
//!   status snapshots.
//! - [`reconstruct`] turns the stored snapshots plus the live item into a
//!   revision timeline of text, attribute and status changes.
//!
//! This crate has no database access; persistence is provided through the
//! [`snapshot::SnapshotStore`] trait.

pub mod content;
pub mod diff;
pub mod error;
pub mod memory_store;
pub mod reconstruct;
pub mod recorder;
pub mod snapshot;
pub mod status;
pub mod types;

pub use error::{CoreError, HistoryError};
pub use reconstruct::{HistoryReconstructor, RevisionEntry};
pub use recorder::{Change, Decision, HistoryConfig, HistoryRecorder, RecordOutcome};
pub use snapshot::SnapshotStore;
