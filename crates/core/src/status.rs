//! Item status fields and status-action derivation.
//!
//! A status carries the apparent state (`st`), the true state when the
//! apparent one is a hidden state (`ste`), and, once an item has been
//! deleted, the `{st, ste}` pair it held before that deletion (`prev_st`).
//! Comparing two statuses always goes through [`StatusFields::unwrap_deleted`]
//! first so the buried pre-deletion state is compared, not the tombstone.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Status constants
// ---------------------------------------------------------------------------

/// Apparent or true status of a content item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Visible,
    Closed,
    /// Visible to its author only (hellbanned); the true status is in `ste`.
    Hidden,
    Deleted,
    DeletedHard,
}

impl Status {
    /// Return the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Closed => "closed",
            Self::Hidden => "hidden",
            Self::Deleted => "deleted",
            Self::DeletedHard => "deleted_hard",
        }
    }

    /// Which kind of deletion this status represents, if any.
    pub fn deletion(&self) -> Option<Deletion> {
        match self {
            Self::Deleted => Some(Deletion::Soft),
            Self::DeletedHard => Some(Deletion::Hard),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Soft (restorable) or hard deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Soft,
    Hard,
}

// ---------------------------------------------------------------------------
// Status fields
// ---------------------------------------------------------------------------

/// An apparent/true status pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPair {
    pub st: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ste: Option<Status>,
}

impl StatusPair {
    pub fn new(st: Status) -> Self {
        Self { st, ste: None }
    }
}

/// The status-related tracked fields of a content item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFields {
    pub st: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ste: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub del_reason: Option<String>,
    /// The pair held immediately before the most recent deletion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_st: Option<StatusPair>,
}

/// A status with any deletion peeled off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnwrappedStatus {
    /// The live pair, or the pre-deletion pair when deleted.
    pub pair: StatusPair,
    pub deletion: Option<Deletion>,
}

impl StatusFields {
    pub fn visible() -> Self {
        Self::default()
    }

    /// A deleted status burying `prev`.
    pub fn deleted(kind: Deletion, prev: StatusPair, reason: Option<&str>) -> Self {
        Self {
            st: match kind {
                Deletion::Soft => Status::Deleted,
                Deletion::Hard => Status::DeletedHard,
            },
            ste: None,
            del_reason: reason.map(str::to_string),
            prev_st: Some(prev),
        }
    }

    pub fn pair(&self) -> StatusPair {
        StatusPair {
            st: self.st,
            ste: self.ste,
        }
    }

    /// Resolve the pair to compare: when `st` is a deleted constant, the
    /// pre-deletion pair from `prev_st` replaces it.
    ///
    /// A deleted status without `prev_st`, or whose `prev_st` is itself a
    /// deletion, is rejected as [`CoreError::MalformedStatus`].
    pub fn unwrap_deleted(&self) -> Result<UnwrappedStatus, CoreError> {
        let Some(deletion) = self.st.deletion() else {
            return Ok(UnwrappedStatus {
                pair: self.pair(),
                deletion: None,
            });
        };

        let prev = self.prev_st.ok_or_else(|| {
            CoreError::MalformedStatus(format!("status '{}' has no prev_st", self.st))
        })?;
        if prev.st.deletion().is_some() {
            return Err(CoreError::MalformedStatus(format!(
                "prev_st of '{}' is itself '{}'",
                self.st, prev.st
            )));
        }

        Ok(UnwrappedStatus {
            pair: prev,
            deletion: Some(deletion),
        })
    }
}

// ---------------------------------------------------------------------------
// Status actions
// ---------------------------------------------------------------------------

/// A semantic status change shown in the history viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Undelete,
    Delete,
    HardDelete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undelete => "undelete",
            Self::Delete => "delete",
            Self::HardDelete => "hard_delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusAction {
    pub kind: ActionKind,
    pub reason: Option<String>,
}

impl StatusAction {
    pub fn undelete() -> Self {
        Self {
            kind: ActionKind::Undelete,
            reason: None,
        }
    }

    fn deletion(deletion: Deletion, reason: Option<String>) -> Self {
        let kind = match deletion {
            Deletion::Soft => ActionKind::Delete,
            Deletion::Hard => ActionKind::HardDelete,
        };
        Self { kind, reason }
    }
}

/// Derive the ordered actions that turn `old` into `new`.
///
/// `old = None` is the empty baseline before the first known version. The
/// result has at most two entries and an undelete always precedes a
/// (hard) delete: "restored, edited, deleted again" collapses into one step.
/// Transitions between non-deleted statuses produce no actions.
pub fn derive_actions(
    new: &StatusFields,
    old: Option<&StatusFields>,
) -> Result<Vec<StatusAction>, CoreError> {
    let new_unwrapped = new.unwrap_deleted()?;
    let old_unwrapped = old.map(StatusFields::unwrap_deleted).transpose()?;

    let old_deleted = old_unwrapped.is_some_and(|u| u.deletion.is_some());
    if !old_deleted && new_unwrapped.deletion.is_none() {
        return Ok(Vec::new());
    }

    let st_changed = old.map(|o| o.st) != Some(new.st);
    let reason_changed = old.and_then(|o| o.del_reason.as_deref()) != new.del_reason.as_deref();
    let buried_changed = old_unwrapped.map(|u| u.pair) != Some(new_unwrapped.pair);
    if !(st_changed || reason_changed || buried_changed) {
        return Ok(Vec::new());
    }

    let mut actions = Vec::with_capacity(2);
    if old_deleted {
        actions.push(StatusAction::undelete());
    }
    if let Some(deletion) = new_unwrapped.deletion {
        actions.push(StatusAction::deletion(deletion, new.del_reason.clone()));
    }
    Ok(actions)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
