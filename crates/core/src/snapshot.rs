//! History snapshots and the store collaborator that persists them.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::content::{EditRole, ItemRef, TrackedFields};
use crate::types::{DbId, SnapshotId, Timestamp};

/// The tracked fields of an item as they were immediately before one
/// accepted edit, plus who made that edit and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub id: SnapshotId,
    pub item: ItemRef,
    pub user_id: DbId,
    pub role: EditRole,
    pub created_at: Timestamp,
    pub ip: String,
    pub fields: TrackedFields,
}

/// A snapshot that has not been assigned a sequence id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSnapshot {
    pub item: ItemRef,
    pub user_id: DbId,
    pub role: EditRole,
    pub created_at: Timestamp,
    pub ip: String,
    pub fields: TrackedFields,
}

/// One snapshot mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOp {
    Append(NewSnapshot),
    Remove { item: ItemRef, id: SnapshotId },
}

/// New edit statistics for a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTouch {
    pub item: ItemRef,
    pub edit_count: i64,
    pub last_edited_at: Timestamp,
}

/// Everything one `record` call writes. Stores must apply it atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryBatch {
    pub ops: Vec<SnapshotOp>,
    pub touches: Vec<ItemTouch>,
}

impl HistoryBatch {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.touches.is_empty()
    }

    pub fn appends(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SnapshotOp::Append(_)))
            .count()
    }

    pub fn removals(&self) -> usize {
        self.ops.len() - self.appends()
    }
}

/// Ordered, append/remove-capable snapshot storage indexed by item.
///
/// Within one item, reads must observe every previously applied batch.
pub trait SnapshotStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The newest snapshot of `item`, if any.
    fn latest(
        &self,
        item: ItemRef,
    ) -> impl Future<Output = Result<Option<HistorySnapshot>, Self::Error>> + Send;

    /// Number of snapshots stored for `item`.
    fn count(&self, item: ItemRef) -> impl Future<Output = Result<i64, Self::Error>> + Send;

    /// All snapshots of `item`, oldest first.
    fn list_ordered(
        &self,
        item: ItemRef,
    ) -> impl Future<Output = Result<Vec<HistorySnapshot>, Self::Error>> + Send;

    /// Apply every op and item touch in `batch`, or none of them.
    fn apply(&self, batch: &HistoryBatch) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
