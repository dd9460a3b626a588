//! History snapshot model.
//!
//! Snapshots are immutable once written; they are only ever removed.

use quire_core::content::{Attachment, EditRole, ItemKind, ItemRef, TrackedFields};
use quire_core::snapshot::HistorySnapshot;
use quire_core::status::StatusFields;
use quire_core::types::{DbId, SnapshotId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

use super::unknown_value;

/// A row from the `history_snapshots` table.
#[derive(Debug, Clone, FromRow)]
pub struct SnapshotRow {
    pub id: SnapshotId,
    pub item_kind: String,
    pub item_id: DbId,
    pub user_id: DbId,
    pub role: String,
    pub ip: String,
    pub created_at: Timestamp,
    pub body: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub status: Json<StatusFields>,
    pub attachments: Json<Vec<Attachment>>,
    pub parse_options_id: Option<DbId>,
}

impl TryFrom<SnapshotRow> for HistorySnapshot {
    type Error = sqlx::Error;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let kind =
            ItemKind::parse(&row.item_kind).ok_or_else(|| unknown_value("item_kind", &row.item_kind))?;
        let role = EditRole::parse(&row.role).ok_or_else(|| unknown_value("role", &row.role))?;
        Ok(HistorySnapshot {
            id: row.id,
            item: ItemRef {
                kind,
                id: row.item_id,
            },
            user_id: row.user_id,
            role,
            created_at: row.created_at,
            ip: row.ip,
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
