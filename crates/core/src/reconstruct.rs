//! Revision timeline reconstruction.
//!
//! Snapshots hold the state *before* each edit, so the full version sequence
//! of an item is its snapshots in order followed by its current state.
//! Version 0 is attributed to the owner at creation time; version `k` to
//! whoever made edit `k - 1`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::content::{ContentItem, EditRole, TrackedFields};
use crate::diff::{Attribute, AttributeDiff, LineDiffer, TextDiffer};
use crate::error::{CoreError, HistoryError};
use crate::snapshot::{HistorySnapshot, SnapshotStore};
use crate::status::{derive_actions, StatusAction};
use crate::types::{DbId, Timestamp};

/// One step of an item's timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionEntry<D> {
    pub version: usize,
    pub user_id: DbId,
    /// `None` for version 0 (original authoring).
    pub role: Option<EditRole>,
    pub at: Timestamp,
    pub text_diff: Option<D>,
    pub attributes: BTreeMap<Attribute, AttributeDiff>,
    pub actions: Vec<StatusAction>,
}

impl<D> RevisionEntry<D> {
    /// Whether this step changed nothing visible.
    pub fn is_empty(&self) -> bool {
        self.text_diff.is_none() && self.attributes.is_empty() && self.actions.is_empty()
    }
}

struct Version<'a> {
    fields: &'a TrackedFields,
    user_id: DbId,
    role: Option<EditRole>,
    at: Timestamp,
}

/// Builds revision timelines using a pluggable text differ.
#[derive(Debug, Clone, Default)]
pub struct HistoryReconstructor<D = LineDiffer> {
    differ: D,
}

impl<D: TextDiffer> HistoryReconstructor<D> {
    pub fn new(differ: D) -> Self {
        Self { differ }
    }

    /// Reconstruct the timeline from `snapshots` (oldest first) and the
    /// item's `current` state. Always yields `snapshots.len() + 1` entries.
    pub fn reconstruct(
        &self,
        snapshots: &[HistorySnapshot],
        current: &ContentItem,
    ) -> Result<Vec<RevisionEntry<D::Output>>, CoreError> {
        let mut versions = Vec::with_capacity(snapshots.len() + 1);
        versions.push(Version {
            fields: snapshots.first().map_or(&current.fields, |s| &s.fields),
            user_id: current.owner_id,
            role: None,
            at: current.created_at,
        });
        for (k, edit) in snapshots.iter().enumerate() {
            versions.push(Version {
                fields: snapshots.get(k + 1).map_or(&current.fields, |s| &s.fields),
                user_id: edit.user_id,
                role: Some(edit.role),
                at: edit.created_at,
            });
        }

        let mut entries = Vec::with_capacity(versions.len());
        entries.push(RevisionEntry {
            version: 0,
            user_id: versions[0].user_id,
            role: versions[0].role,
            at: versions[0].at,
            text_diff: None,
            attributes: BTreeMap::new(),
            actions: derive_actions(&versions[0].fields.status, None)?,
        });
        for (k, pair) in versions.windows(2).enumerate() {
            entries.push(self.compare(k + 1, &pair[0], &pair[1])?);
        }
        Ok(entries)
    }

    /// Re-read the snapshot list of `current` from `store` and reconstruct.
    pub async fn load<S: SnapshotStore>(
        &self,
        store: &S,
        current: &ContentItem,
    ) -> Result<Vec<RevisionEntry<D::Output>>, HistoryError<S::Error>> {
        let snapshots = store
            .list_ordered(current.item)
            .await
            .map_err(HistoryError::StoreUnavailable)?;
        Ok(self.reconstruct(&snapshots, current)?)
    }

    fn compare(
        &self,
        version: usize,
        old: &Version<'_>,
        new: &Version<'_>,
    ) -> Result<RevisionEntry<D::Output>, CoreError> {
        let old_body = old.fields.normalized_body();
        let new_body = new.fields.normalized_body();
        let text_diff = (old_body != new_body).then(|| self.differ.diff(&old_body, &new_body));

        let mut attributes = BTreeMap::new();
        if let Some(diff) =
            AttributeDiff::between(old.fields.title.as_deref(), new.fields.title.as_deref())
        {
            attributes.insert(Attribute::Title, diff);
        }
        let (old_tags, new_tags) = (old.fields.serialized_tags(), new.fields.serialized_tags());
        if let Some(diff) = AttributeDiff::between(Some(old_tags.as_str()), Some(new_tags.as_str())) {
            attributes.insert(Attribute::Tags, diff);
        }

        Ok(RevisionEntry {
            version,
            user_id: new.user_id,
            role: new.role,
            at: new.at,
            text_diff,
            attributes,
            actions: derive_actions(&new.fields.status, Some(&old.fields.status))?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::content::{Attachment, EditMeta, ItemRef};
    use crate::diff::DiffStatus;
    use crate::memory_store::MemorySnapshotStore;
    use crate::recorder::{Change, HistoryConfig, HistoryRecorder};
    use crate::status::{ActionKind, Deletion, Status, StatusFields, StatusPair};

    const OWNER: DbId = 1;

    fn created() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn fields(body: &str) -> TrackedFields {
        TrackedFields {
            body: body.into(),
            title: Some("Title".into()),
            tags: vec!["rust".into()],
            ..Default::default()
        }
    }

    fn snapshot(id: i64, user_id: DbId, hours: i64, fields: TrackedFields) -> HistorySnapshot {
        HistorySnapshot {
            id,
            item: ItemRef::entry(5),
            user_id,
            role: EditRole::Moderator,
            created_at: created() + Duration::hours(hours),
            ip: "127.0.0.1".into(),
            fields,
        }
    }

    fn current(fields: TrackedFields) -> ContentItem {
        ContentItem {
            item: ItemRef::entry(5),
            owner_id: OWNER,
            created_at: created(),
            edit_count: 0,
            last_edited_at: None,
            fields,
        }
    }

    fn reconstructor() -> HistoryReconstructor {
        HistoryReconstructor::default()
    }

    #[test]
    fn no_history_yields_anchor_only() {
        let entries = reconstructor().reconstruct(&[], &current(fields("x"))).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].version, 0);
        assert_eq!(entries[0].user_id, OWNER);
        assert_eq!(entries[0].at, created());
        assert!(entries[0].is_empty());
    }

    #[test]
    fn yields_one_entry_per_version() {
        let snapshots = vec![
            snapshot(1, 7, 1, fields("a")),
            snapshot(2, 8, 2, fields("b")),
            snapshot(3, 9, 3, fields("c")),
        ];
        let entries = reconstructor()
            .reconstruct(&snapshots, &current(fields("d")))
            .unwrap();
        assert_eq!(entries.len(), snapshots.len() + 1);
        let versions: Vec<_> = entries.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn edits_are_attributed_to_their_author() {
        let snapshots = vec![snapshot(1, 7, 1, fields("a")), snapshot(2, 8, 2, fields("b"))];
        let entries = reconstructor()
            .reconstruct(&snapshots, &current(fields("c")))
            .unwrap();

        assert_eq!(entries[0].user_id, OWNER);
        assert_eq!(entries[0].role, None);
        assert_eq!(entries[1].user_id, 7);
        assert_eq!(entries[1].at, created() + Duration::hours(1));
        assert_eq!(entries[1].role, Some(EditRole::Moderator));
        assert_eq!(entries[2].user_id, 8);
        assert_eq!(entries[2].at, created() + Duration::hours(2));
    }

    #[test]
    fn text_diff_only_when_body_changes() {
        let mut retitled = fields("same");
        retitled.title = Some("New title".into());
        let snapshots = vec![snapshot(1, 7, 1, fields("same"))];
        let entries = reconstructor()
            .reconstruct(&snapshots, &current(retitled))
            .unwrap();

        assert!(entries[1].text_diff.is_none());
        let title = &entries[1].attributes[&Attribute::Title];
        assert_eq!(title.status, DiffStatus::Changed);
        assert_eq!(title.old.as_deref(), Some("Title"));
        assert_eq!(title.new.as_deref(), Some("New title"));
        assert!(!entries[1].attributes.contains_key(&Attribute::Tags));
    }

    #[test]
    fn body_change_produces_line_diff() {
        let snapshots = vec![snapshot(1, 7, 1, fields("one\ntwo"))];
        let entries = reconstructor()
            .reconstruct(&snapshots, &current(fields("one\nthree")))
            .unwrap();

        let diff = entries[1].text_diff.as_ref().unwrap();
        assert!(diff
            .iter()
            .any(|l| l.status == DiffStatus::Added && l.content == "three"));
        assert!(diff
            .iter()
            .any(|l| l.status == DiffStatus::Removed && l.content == "two"));
    }

    #[test]
    fn attachment_change_shows_in_text_diff() {
        let mut with_file = fields("body");
        with_file.attachments.push(Attachment {
            name: "diagram.png".into(),
            size_bytes: 2048,
            sha256: None,
        });
        let snapshots = vec![snapshot(1, 7, 1, fields("body"))];
        let entries = reconstructor()
            .reconstruct(&snapshots, &current(with_file))
            .unwrap();

        let diff = entries[1].text_diff.as_ref().unwrap();
        assert!(diff
            .iter()
            .any(|l| l.status == DiffStatus::Added && l.content.contains("diagram.png")));
    }

    #[test]
    fn tag_changes_are_serialized() {
        let mut retagged = fields("b");
        retagged.tags = vec!["rust".into(), "async".into()];
        let snapshots = vec![snapshot(1, 7, 1, fields("b"))];
        let entries = reconstructor()
            .reconstruct(&snapshots, &current(retagged))
            .unwrap();

        let tags = &entries[1].attributes[&Attribute::Tags];
        assert_eq!(tags.old.as_deref(), Some("rust"));
        assert_eq!(tags.new.as_deref(), Some("rust, async"));
    }

    #[test]
    fn deletion_and_restore_become_actions() {
        let deleted = TrackedFields {
            status: StatusFields::deleted(Deletion::Soft, StatusPair::default(), Some("spam")),
            ..fields("b")
        };
        let snapshots = vec![snapshot(1, 7, 1, fields("b")), snapshot(2, 8, 2, deleted)];
        let entries = reconstructor()
            .reconstruct(&snapshots, &current(fields("b")))
            .unwrap();

        assert!(entries[0].actions.is_empty());
        assert_eq!(entries[1].actions.len(), 1);
        assert_eq!(entries[1].actions[0].kind, ActionKind::Delete);
        assert_eq!(entries[1].actions[0].reason.as_deref(), Some("spam"));
        assert!(entries[1].text_diff.is_none());
        assert_eq!(entries[2].actions[0].kind, ActionKind::Undelete);
    }

    #[test]
    fn anchor_carries_actions_when_first_state_is_deleted() {
        let deleted = TrackedFields {
            status: StatusFields::deleted(
                Deletion::Hard,
                StatusPair::new(Status::Closed),
                Some("abuse"),
            ),
            ..fields("a")
        };
        let entries = reconstructor()
            .reconstruct(&[snapshot(1, 7, 1, deleted)], &current(fields("a")))
            .unwrap();

        assert_eq!(entries[0].actions.len(), 1);
        assert_eq!(entries[0].actions[0].kind, ActionKind::HardDelete);
        assert!(entries[0].text_diff.is_none());
    }

    #[test]
    fn malformed_status_is_reported() {
        let broken = TrackedFields {
            status: StatusFields {
                st: Status::Deleted,
                ..Default::default()
            },
            ..fields("a")
        };
        let result = reconstructor().reconstruct(&[], &current(broken));
        assert_matches!(result, Err(CoreError::MalformedStatus(_)));
    }

    #[tokio::test]
    async fn load_reads_recorded_history() {
        let recorder = HistoryRecorder::new(MemorySnapshotStore::new(), HistoryConfig::default());
        let v0 = current(fields("first"));
        let v1 = current(fields("second"));
        let meta = EditMeta::new(42, EditRole::Moderator).at(created() + Duration::hours(1));
        recorder
            .record(&[Change::new(v0, v1.clone())], &meta)
            .await
            .unwrap();

        let entries = reconstructor().load(recorder.store(), &v1).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].user_id, 42);
        assert!(entries[1].text_diff.is_some());
    }
}
