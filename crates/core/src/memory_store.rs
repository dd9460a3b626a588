//! In-process [`SnapshotStore`] backed by a lock-protected map.
//!
//! Batches are validated before anything is written, so a failing batch
//! leaves the store untouched.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::content::ItemRef;
use crate::snapshot::{HistoryBatch, HistorySnapshot, ItemTouch, SnapshotOp, SnapshotStore};
use crate::types::SnapshotId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryStoreError {
    #[error("Snapshot {id} of {item} does not exist")]
    MissingSnapshot { item: ItemRef, id: SnapshotId },

    #[error("Store unavailable")]
    Unavailable,
}

#[derive(Debug, Default)]
struct Inner {
    last_id: SnapshotId,
    snapshots: BTreeMap<SnapshotId, HistorySnapshot>,
    items: HashMap<ItemRef, ItemTouch>,
}

/// Snapshot store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    inner: RwLock<Inner>,
    fail_next_apply: AtomicBool,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next [`apply`](SnapshotStore::apply) fail with
    /// [`MemoryStoreError::Unavailable`] without writing anything.
    pub fn fail_next_apply(&self) {
        self.fail_next_apply.store(true, Ordering::SeqCst);
    }

    /// The edit statistics last written for `item`.
    pub async fn item_touch(&self, item: ItemRef) -> Option<ItemTouch> {
        self.inner.read().await.items.get(&item).copied()
    }

    /// Total number of snapshots across all items.
    pub async fn len(&self) -> usize {
        self.inner.read().await.snapshots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    type Error = MemoryStoreError;

    async fn latest(&self, item: ItemRef) -> Result<Option<HistorySnapshot>, MemoryStoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .snapshots
            .values()
            .rev()
            .find(|s| s.item == item)
            .cloned())
    }

    async fn count(&self, item: ItemRef) -> Result<i64, MemoryStoreError> {
        let inner = self.inner.read().await;
        Ok(inner.snapshots.values().filter(|s| s.item == item).count() as i64)
    }

    async fn list_ordered(&self, item: ItemRef) -> Result<Vec<HistorySnapshot>, MemoryStoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .snapshots
            .values()
            .filter(|s| s.item == item)
            .cloned()
            .collect())
    }

    async fn apply(&self, batch: &HistoryBatch) -> Result<(), MemoryStoreError> {
        if self.fail_next_apply.swap(false, Ordering::SeqCst) {
            return Err(MemoryStoreError::Unavailable);
        }

        let mut inner = self.inner.write().await;

        for op in &batch.ops {
            if let SnapshotOp::Remove { item, id } = op {
                let present = inner.snapshots.get(id).is_some_and(|s| s.item == *item);
                if !present {
                    return Err(MemoryStoreError::MissingSnapshot {
                        item: *item,
                        id: *id,
                    });
                }
            }
        }

        for op in &batch.ops {
            match op {
                SnapshotOp::Append(new) => {
                    inner.last_id += 1;
                    let id = inner.last_id;
                    inner.snapshots.insert(
                        id,
                        HistorySnapshot {
                            id,
                            item: new.item,
                            user_id: new.user_id,
                            role: new.role,
                            created_at: new.created_at,
                            ip: new.ip.clone(),
                            fields: new.fields.clone(),
                        },
                    );
                }
                SnapshotOp::Remove { id, .. } => {
                    inner.snapshots.remove(id);
                }
            }
        }

        for touch in &batch.touches {
            inner.items.insert(touch.item, *touch);
        }
        Ok(())
    }
}
