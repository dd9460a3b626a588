//! Content item model as seen by the history subsystem.
//!
//! Only the fields history cares about are modelled here: identity, owner,
//! creation time, the edit counters, and the set of *tracked* fields whose
//! prior values are copied into every history snapshot.

use std::fmt;
use std::net::IpAddr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::StatusFields;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Origin address recorded when an edit carries no IP (automated tasks).
pub const UNKNOWN_IP: &str = "0.0.0.0";

// ---------------------------------------------------------------------------
// Item identity
// ---------------------------------------------------------------------------

/// The kind of versioned content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Entry,
    Comment,
}

impl ItemKind {
    /// Return the kind name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Comment => "comment",
        }
    }

    /// Parse a kind string. Returns `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "entry" => Some(Self::Entry),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a content item: entries and comments have separate id spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemRef {
    pub kind: ItemKind,
    pub id: DbId,
}

impl ItemRef {
    pub fn entry(id: DbId) -> Self {
        Self {
            kind: ItemKind::Entry,
            id,
        }
    }

    pub fn comment(id: DbId) -> Self {
        Self {
            kind: ItemKind::Comment,
            id,
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

// ---------------------------------------------------------------------------
// Edit role
// ---------------------------------------------------------------------------

/// The capacity in which a user performed an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditRole {
    Author,
    Moderator,
    Task,
}

impl EditRole {
    /// Return the role name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Moderator => "moderator",
            Self::Task => "task",
        }
    }

    /// Parse a role string. Returns `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "author" => Some(Self::Author),
            "moderator" => Some(Self::Moderator),
            "task" => Some(Self::Task),
            _ => None,
        }
    }
}

impl fmt::Display for EditRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tracked fields
// ---------------------------------------------------------------------------

/// One file attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub size_bytes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Every field whose prior value is preserved in a history snapshot.
///
/// Two states are considered the same version exactly when their tracked
/// fields are equal; everything else on the item is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFields {
    pub body: String,
    /// Entries only.
    #[serde(default)]
    pub title: Option<String>,
    /// Entries only.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: StatusFields,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Reference to the stored markup parse options in effect.
    #[serde(default)]
    pub parse_options_id: Option<DbId>,
}

impl TrackedFields {
    /// Body text followed by a deterministic rendering of the attachment
    /// manifest, so attachment-only edits show up in a text diff.
    pub fn normalized_body(&self) -> String {
        if self.attachments.is_empty() {
            return self.body.clone();
        }

        let mut manifest: Vec<&Attachment> = self.attachments.iter().collect();
        manifest.sort_by(|a, b| a.name.cmp(&b.name).then(a.size_bytes.cmp(&b.size_bytes)));

        let mut out = self.body.clone();
        out.push_str("\n\n[attachments]");
        for attachment in manifest {
            out.push_str(&format!("\n{} ({} bytes)", attachment.name, attachment.size_bytes));
            if let Some(sha) = &attachment.sha256 {
                out.push_str(&format!(" sha256:{sha}"));
            }
        }
        out
    }

    /// Tag list flattened for attribute diffs.
    pub fn serialized_tags(&self) -> String {
        self.tags.join(", ")
    }
}

// ---------------------------------------------------------------------------
// Content item
// ---------------------------------------------------------------------------

/// A content item's state at one point in time: the live row, or either side
/// of an edit handed to the recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub item: ItemRef,
    pub owner_id: DbId,
    pub created_at: Timestamp,
    #[serde(default)]
    pub edit_count: i64,
    #[serde(default)]
    pub last_edited_at: Option<Timestamp>,
    pub fields: TrackedFields,
}

// ---------------------------------------------------------------------------
// Edit metadata
// ---------------------------------------------------------------------------

/// Actor metadata supplied with a batch of edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditMeta {
    pub user_id: Option<DbId>,
    pub role: EditRole,
    #[serde(default)]
    pub ts: Option<Timestamp>,
    #[serde(default)]
    pub ip: Option<String>,
}

impl EditMeta {
    pub fn new(user_id: DbId, role: EditRole) -> Self {
        Self {
            user_id: Some(user_id),
            role,
            ts: None,
            ip: None,
        }
    }

    pub fn at(mut self, ts: Timestamp) -> Self {
        self.ts = Some(ts);
        self
    }

    pub fn from_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Validate the metadata and fill in defaults (`ts` = now, `ip` =
    /// [`UNKNOWN_IP`]).
    pub fn resolve(&self) -> Result<ResolvedMeta, CoreError> {
        let user_id = self
            .user_id
            .ok_or_else(|| CoreError::InvalidMetadata("user is required".into()))?;
        if user_id <= 0 {
            return Err(CoreError::InvalidMetadata(format!(
                "user id must be positive, got {user_id}"
            )));
        }

        let ip = match self.ip.as_deref().map(str::trim) {
            None | Some("") => UNKNOWN_IP.to_string(),
            Some(raw) => raw
                .parse::<IpAddr>()
                .map_err(|_| CoreError::InvalidMetadata(format!("invalid ip address '{raw}'")))?
                .to_string(),
        };

        Ok(ResolvedMeta {
            user_id,
            role: self.role,
            ts: self.ts.unwrap_or_else(Utc::now),
            ip,
        })
    }
}

/// [`EditMeta`] after validation, with every default applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMeta {
    pub user_id: DbId,
    pub role: EditRole,
    pub ts: Timestamp,
    pub ip: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
