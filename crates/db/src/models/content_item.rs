//! Content item model.

use quire_core::content::{Attachment, ContentItem, ItemKind, ItemRef, TrackedFields};
use quire_core::status::StatusFields;
use quire_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

use super::unknown_value;

/// A row from the `content_items` table.
#[derive(Debug, Clone, FromRow)]
pub struct ContentItemRow {
    pub kind: String,
    pub id: DbId,
    pub owner_id: DbId,
    pub created_at: Timestamp,
    pub edit_count: i64,
    pub last_edited_at: Option<Timestamp>,
    pub body: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub status: Json<StatusFields>,
    pub attachments: Json<Vec<Attachment>>,
    pub parse_options_id: Option<DbId>,
}

impl TryFrom<ContentItemRow> for ContentItem {
    type Error = sqlx::Error;

    fn try_from(row: ContentItemRow) -> Result<Self, Self::Error> {
        let kind = ItemKind::parse(&row.kind).ok_or_else(|| unknown_value("kind", &row.kind))?;
        Ok(ContentItem {
            item: ItemRef { kind, id: row.id },
            owner_id: row.owner_id,
            created_at: row.created_at,
            edit_count: row.edit_count,
            last_edited_at: row.last_edited_at,
            fields: TrackedFields {
                body: row.body,
                title: row.title,
                tags: row.tags,
                status: row.status.0,
                attachments: row.attachments.0,
                parse_options_id: row.parse_options_id,
            },
        })
    }
}
