//! Edit batch outbox model.
//!
//! The edit-submission flow writes one row per submitted batch; the worker
//! feeds each pending row through the history recorder.

use quire_core::content::{EditMeta, EditRole};
use quire_core::error::CoreError;
use quire_core::recorder::Change;
use quire_core::types::{DbId, Timestamp};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `edit_batches` table.
#[derive(Debug, Clone, FromRow)]
pub struct EditBatch {
    pub id: DbId,
    pub user_id: Option<DbId>,
    pub role: String,
    pub ip: Option<String>,
    pub edited_at: Option<Timestamp>,
    /// Raw payload; decoded per batch by [`EditBatch::decode_changes`].
    pub changes: Json<serde_json::Value>,
    pub submitted_at: Timestamp,
    pub processed_at: Option<Timestamp>,
    pub error: Option<String>,
}

impl EditBatch {
    /// Decode the submitted changes. A payload that does not decode fails
    /// only this batch.
    pub fn decode_changes(&self) -> Result<Vec<Change>, serde_json::Error> {
        Vec::<Change>::deserialize(&self.changes.0)
    }

    /// Actor metadata of the batch. An unknown role is invalid metadata.
    pub fn meta(&self) -> Result<EditMeta, CoreError> {
        let role = EditRole::parse(&self.role)
            .ok_or_else(|| CoreError::InvalidMetadata(format!("unknown role '{}'", self.role)))?;
        Ok(EditMeta {
            user_id: self.user_id,
            role,
            ts: self.edited_at,
            ip: self.ip.clone(),
        })
    }
}
