//! Repository for the `edit_batches` outbox table.

use quire_core::content::EditMeta;
use quire_core::recorder::Change;
use quire_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::edit_batch::EditBatch;

/// Column list for edit_batches queries.
const COLUMNS: &str =
    "id, user_id, role, ip, edited_at, changes, submitted_at, processed_at, error";

/// Provides enqueue and drain operations for submitted edit batches.
pub struct EditBatchRepo;

impl EditBatchRepo {
    /// Enqueue a batch of changes made by one actor, returning its id.
    pub async fn enqueue(
        pool: &PgPool,
        meta: &EditMeta,
        changes: &[Change],
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO edit_batches (user_id, role, ip, edited_at, changes) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(meta.user_id)
        .bind(meta.role.as_str())
        .bind(&meta.ip)
        .bind(meta.ts)
        .bind(Json(changes))
        .fetch_one(pool)
        .await
    }

    /// List unprocessed batches, oldest first.
    pub async fn list_pending(pool: &PgPool, limit: i64) -> Result<Vec<EditBatch>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM edit_batches
             WHERE processed_at IS NULL
             ORDER BY id ASC
             LIMIT $1"
        );
        sqlx::query_as::<_, EditBatch>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Find a batch by id.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<EditBatch>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM edit_batches WHERE id = $1");
        sqlx::query_as::<_, EditBatch>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Mark a batch processed. Returns `true` if it was still pending.
    pub async fn mark_processed(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE edit_batches SET processed_at = NOW(), error = NULL \
             WHERE id = $1 AND processed_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a batch processed with an error so it is not retried.
    pub async fn mark_failed(pool: &PgPool, id: DbId, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE edit_batches SET processed_at = NOW(), error = $2 \
             WHERE id = $1 AND processed_at IS NULL",
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
