//! Repository for the `content_items` table.
//!
//! The history subsystem only reads items and writes their edit statistics;
//! field updates belong to the edit-submission flow.

use quire_core::content::{ContentItem, ItemRef, TrackedFields};
use quire_core::snapshot::ItemTouch;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::content_item::ContentItemRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "kind, id, owner_id, created_at, edit_count, last_edited_at, \
    body, title, tags, status, attachments, parse_options_id";

/// Provides read and edit-statistics operations for content items.
pub struct ContentItemRepo;

impl ContentItemRepo {
    /// Insert a content item exactly as given.
    pub async fn create(pool: &PgPool, item: &ContentItem) -> Result<ContentItem, sqlx::Error> {
        let query = format!(
            "INSERT INTO content_items
                (kind, id, owner_id, created_at, edit_count, last_edited_at,
                 body, title, tags, status, attachments, parse_options_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {COLUMNS}"
        );
        let fields = &item.fields;
        sqlx::query_as::<_, ContentItemRow>(&query)
            .bind(item.item.kind.as_str())
            .bind(item.item.id)
            .bind(item.owner_id)
            .bind(item.created_at)
            .bind(item.edit_count)
            .bind(item.last_edited_at)
            .bind(&fields.body)
            .bind(&fields.title)
            .bind(&fields.tags)
            .bind(Json(&fields.status))
            .bind(Json(&fields.attachments))
            .bind(fields.parse_options_id)
            .fetch_one(pool)
            .await?
            .try_into()
    }

    /// Find a content item by identity.
    pub async fn find(pool: &PgPool, item: ItemRef) -> Result<Option<ContentItem>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM content_items WHERE kind = $1 AND id = $2");
        sqlx::query_as::<_, ContentItemRow>(&query)
            .bind(item.kind.as_str())
            .bind(item.id)
            .fetch_optional(pool)
            .await?
            .map(ContentItem::try_from)
            .transpose()
    }

    /// Overwrite the tracked fields of an item. Returns `true` if it exists.
    pub async fn update_fields(
        pool: &PgPool,
        item: ItemRef,
        fields: &TrackedFields,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE content_items SET
                body = $3, title = $4, tags = $5, status = $6,
                attachments = $7, parse_options_id = $8
             WHERE kind = $1 AND id = $2",
        )
        .bind(item.kind.as_str())
        .bind(item.id)
        .bind(&fields.body)
        .bind(&fields.title)
        .bind(&fields.tags)
        .bind(Json(&fields.status))
        .bind(Json(&fields.attachments))
        .bind(fields.parse_options_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Write the edit counter and last-edit time within an existing
    /// transaction. Returns `true` if the item exists.
    pub async fn update_edit_stats(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        touch: &ItemTouch,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE content_items SET edit_count = $3, last_edited_at = $4 \
             WHERE kind = $1 AND id = $2",
        )
        .bind(touch.item.kind.as_str())
        .bind(touch.item.id)
        .bind(touch.edit_count)
        .bind(touch.last_edited_at)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
