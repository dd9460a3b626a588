//! [`SnapshotStore`] implementation on PostgreSQL.
//!
//! Reads go straight to the pool. [`PgSnapshotStore::apply`] writes a whole
//! history batch in one transaction; any missing row aborts it so readers
//! never observe half a batch.

use quire_core::content::ItemRef;
use quire_core::snapshot::{HistoryBatch, HistorySnapshot, SnapshotOp, SnapshotStore};

use crate::repositories::{ContentItemRepo, SnapshotRepo};
use crate::DbPool;

/// Snapshot store backed by the `history_snapshots` table.
#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: DbPool,
}

impl PgSnapshotStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl SnapshotStore for PgSnapshotStore {
    type Error = sqlx::Error;

    async fn latest(&self, item: ItemRef) -> Result<Option<HistorySnapshot>, sqlx::Error> {
        SnapshotRepo::latest(&self.pool, item).await
    }

    async fn count(&self, item: ItemRef) -> Result<i64, sqlx::Error> {
        SnapshotRepo::count_by_item(&self.pool, item).await
    }

    async fn list_ordered(&self, item: ItemRef) -> Result<Vec<HistorySnapshot>, sqlx::Error> {
        SnapshotRepo::list_by_item(&self.pool, item).await
    }

    async fn apply(&self, batch: &HistoryBatch) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for op in &batch.ops {
            match op {
                SnapshotOp::Append(snapshot) => {
                    SnapshotRepo::insert(&mut tx, snapshot).await?;
                }
                SnapshotOp::Remove { item, id } => {
                    if !SnapshotRepo::delete(&mut tx, *item, *id).await? {
                        tracing::warn!(item = %item, snapshot_id = id, "Snapshot to remove is gone");
                        return Err(sqlx::Error::RowNotFound);
                    }
                }
            }
        }

        for touch in &batch.touches {
            if !ContentItemRepo::update_edit_stats(&mut tx, touch).await? {
                tracing::warn!(item = %touch.item, "Edited item does not exist");
                return Err(sqlx::Error::RowNotFound);
            }
        }

        tx.commit().await?;
        tracing::debug!(
            appended = batch.appends(),
            removed = batch.removals(),
            items = batch.touches.len(),
            "History batch committed"
        );
        Ok(())
    }
}
