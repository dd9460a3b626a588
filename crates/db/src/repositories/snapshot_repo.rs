//! Repository for the `history_snapshots` table.
//!
//! Rows are never updated: the recorder only appends and deletes.

use quire_core::content::ItemRef;
use quire_core::snapshot::{HistorySnapshot, NewSnapshot};
use quire_core::types::SnapshotId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::snapshot::SnapshotRow;

/// Column list for history_snapshots queries.
const COLUMNS: &str = "id, item_kind, item_id, user_id, role, ip, created_at, \
    body, title, tags, status, attachments, parse_options_id";

/// Provides ordered reads, appends and removals of history snapshots.
pub struct SnapshotRepo;

impl SnapshotRepo {
    /// List all snapshots of an item, oldest first.
    pub async fn list_by_item(
        pool: &PgPool,
        item: ItemRef,
    ) -> Result<Vec<HistorySnapshot>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM history_snapshots
             WHERE item_kind = $1 AND item_id = $2
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, SnapshotRow>(&query)
            .bind(item.kind.as_str())
            .bind(item.id)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(HistorySnapshot::try_from)
            .collect()
    }

    /// Find the newest snapshot of an item.
    pub async fn latest(
        pool: &PgPool,
        item: ItemRef,
    ) -> Result<Option<HistorySnapshot>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM history_snapshots
             WHERE item_kind = $1 AND item_id = $2
             ORDER BY id DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, SnapshotRow>(&query)
            .bind(item.kind.as_str())
            .bind(item.id)
            .fetch_optional(pool)
            .await?
            .map(HistorySnapshot::try_from)
            .transpose()
    }

    /// Count the snapshots of an item.
    pub async fn count_by_item(pool: &PgPool, item: ItemRef) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM history_snapshots WHERE item_kind = $1 AND item_id = $2",
        )
        .bind(item.kind.as_str())
        .bind(item.id)
        .fetch_one(pool)
        .await
    }

    /// Append a snapshot within an existing transaction, returning its
    /// sequence id.
    pub async fn insert(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        snapshot: &NewSnapshot,
    ) -> Result<SnapshotId, sqlx::Error> {
        let fields = &snapshot.fields;
        sqlx::query_scalar(
            "INSERT INTO history_snapshots
                (item_kind, item_id, user_id, role, ip, created_at,
                 body, title, tags, status, attachments, parse_options_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING id",
        )
        .bind(snapshot.item.kind.as_str())
        .bind(snapshot.item.id)
        .bind(snapshot.user_id)
        .bind(snapshot.role.as_str())
        .bind(&snapshot.ip)
        .bind(snapshot.created_at)
        .bind(&fields.body)
        .bind(&fields.title)
        .bind(&fields.tags)
        .bind(Json(&fields.status))
        .bind(Json(&fields.attachments))
        .bind(fields.parse_options_id)
        .fetch_one(&mut **tx)
        .await
    }

    /// Delete one snapshot of an item within an existing transaction.
    /// Returns `true` if a row was removed.
    pub async fn delete(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        item: ItemRef,
        id: SnapshotId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM history_snapshots WHERE id = $1 AND item_kind = $2 AND item_id = $3",
        )
        .bind(id)
        .bind(item.kind.as_str())
        .bind(item.id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
