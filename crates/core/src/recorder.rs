//! History recording: turns a batch of `(old, new)` item states into the
//! minimal set of snapshot appends and removals.
//!
//! For every change of item `X`, in input order:
//!
//! 1. Equal tracked fields on both sides: no-op, nothing is written.
//! 2. The newest snapshot of `X` was made by the same user in the same role
//!    inside the grace window ending at the edit time: the edit is merged into
//!    it. If the new state equals that snapshot, the user reverted the whole
//!    burst and the snapshot is removed instead.
//! 3. `X` has no history yet, and its owner is still authoring it within the
//!    grace window after creation: nothing is written.
//! 4. Otherwise the old state is appended as a new snapshot.
//!
//! All reads happen first, one independent ledger per item; the combined
//! writes are handed to the store as a single [`HistoryBatch`].

use std::collections::BTreeMap;

use chrono::Duration;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::content::{ContentItem, EditMeta, EditRole, ItemRef, ResolvedMeta, TrackedFields};
use crate::error::{CoreError, HistoryError};
use crate::snapshot::{
    HistoryBatch, HistorySnapshot, ItemTouch, NewSnapshot, SnapshotOp, SnapshotStore,
};
use crate::types::{DbId, SnapshotId, Timestamp};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default grace window: 5 minutes.
pub const DEFAULT_GRACE_SECS: i64 = 300;

/// Recorder tuning shared by entries and comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Span during which consecutive edits by one actor collapse into a single
    /// snapshot, and after creation during which the author's edits are not
    /// recorded at all.
    pub grace: Duration,
}

impl HistoryConfig {
    pub fn with_grace_secs(secs: i64) -> Self {
        Self {
            grace: Duration::seconds(secs),
        }
    }

    /// `true` when `moment` falls in the window `(ts - grace, ts]`.
    pub fn within_grace(&self, moment: Timestamp, ts: Timestamp) -> bool {
        moment > ts - self.grace && moment <= ts
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self::with_grace_secs(DEFAULT_GRACE_SECS)
    }
}

// ---------------------------------------------------------------------------
// Input / output
// ---------------------------------------------------------------------------

/// One edit: the item before and after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub old: ContentItem,
    pub new: ContentItem,
}

impl Change {
    pub fn new(old: ContentItem, new: ContentItem) -> Self {
        Self { old, new }
    }
}

/// What the recorder did with one change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Tracked fields unchanged.
    NoOp,
    /// Author edit shortly after creation.
    CreationGrace,
    /// Absorbed by the previous snapshot of the same burst.
    Merged,
    /// Restored the state before the burst; that snapshot was dropped.
    Reverted,
    /// A new snapshot was appended.
    Recorded,
    /// Skipped; see [`RecordOutcome::rejected`].
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoOp => "no_op",
            Self::CreationGrace => "creation_grace",
            Self::Merged => "merged",
            Self::Reverted => "reverted",
            Self::Recorded => "recorded",
            Self::Rejected => "rejected",
        }
    }

    /// Whether the change modified the item (bumps its last-edit time).
    fn is_edit(&self) -> bool {
        !matches!(self, Self::NoOp | Self::Rejected)
    }
}

/// A change that was skipped without failing the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedChange {
    pub index: usize,
    pub error: CoreError,
}

/// Result of a successful [`HistoryRecorder::record`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Final snapshot count of every item that was actually edited.
    pub edit_counts: BTreeMap<ItemRef, i64>,
    /// One decision per input change, in input order.
    pub decisions: Vec<Decision>,
    pub rejected: Vec<RejectedChange>,
}

// ---------------------------------------------------------------------------
// Per-item ledger
// ---------------------------------------------------------------------------

/// A known snapshot at the tail of an item's history.
#[derive(Debug, Clone)]
enum Head {
    Stored(HistorySnapshot),
    Pending(NewSnapshot),
}

impl Head {
    fn user_id(&self) -> DbId {
        match self {
            Self::Stored(s) => s.user_id,
            Self::Pending(s) => s.user_id,
        }
    }

    fn role(&self) -> EditRole {
        match self {
            Self::Stored(s) => s.role,
            Self::Pending(s) => s.role,
        }
    }

    fn created_at(&self) -> Timestamp {
        match self {
            Self::Stored(s) => s.created_at,
            Self::Pending(s) => s.created_at,
        }
    }

    fn fields(&self) -> &TrackedFields {
        match self {
            Self::Stored(s) => &s.fields,
            Self::Pending(s) => &s.fields,
        }
    }
}

/// Accumulates one item's decisions for a batch without touching the store.
#[derive(Debug)]
struct ItemLedger {
    item: ItemRef,
    /// Known tail of the history, newest last.
    heads: Vec<Head>,
    /// `heads` holds every snapshot still alive.
    complete: bool,
    count: i64,
    appended: Vec<NewSnapshot>,
    removed: Vec<SnapshotId>,
    edited: bool,
}

impl ItemLedger {
    async fn load<S: SnapshotStore>(store: &S, item: ItemRef) -> Result<Self, S::Error> {
        let latest = store.latest(item).await?;
        let count = store.count(item).await?;
        Ok(Self {
            item,
            complete: count <= 1,
            heads: latest.into_iter().map(Head::Stored).collect(),
            count,
            appended: Vec::new(),
            removed: Vec::new(),
            edited: false,
        })
    }

    /// The newest live snapshot. Refills the tail from the store when a revert
    /// in this batch consumed every known head.
    async fn previous<S: SnapshotStore>(&mut self, store: &S) -> Result<Option<&Head>, S::Error> {
        if self.heads.is_empty() && !self.complete && self.count > 0 {
            let removed = &self.removed;
            self.heads = store
                .list_ordered(self.item)
                .await?
                .into_iter()
                .filter(|s| !removed.contains(&s.id))
                .map(Head::Stored)
                .collect();
            self.complete = true;
        }
        Ok(self.heads.last())
    }

    fn revert(&mut self) {
        match self.heads.pop() {
            Some(Head::Stored(s)) => self.removed.push(s.id),
            Some(Head::Pending(_)) => {
                self.appended.pop();
            }
            None => return,
        }
        self.count -= 1;
    }

    fn append(&mut self, snapshot: NewSnapshot) {
        self.appended.push(snapshot.clone());
        self.heads.push(Head::Pending(snapshot));
        self.count += 1;
    }
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// Records edit history into a [`SnapshotStore`].
///
/// Callers must not run two `record` calls touching the same item
/// concurrently; calls for disjoint items need no coordination.
#[derive(Debug)]
pub struct HistoryRecorder<S> {
    store: S,
    config: HistoryConfig,
}

impl<S: SnapshotStore> HistoryRecorder<S> {
    pub fn new(store: S, config: HistoryConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Record a batch of changes made by one actor.
    ///
    /// Invalid metadata fails the whole batch before anything is read. A
    /// change whose two sides belong to different items is skipped and
    /// reported in [`RecordOutcome::rejected`]. Store failures propagate
    /// unchanged and leave the store as it was.
    pub async fn record(
        &self,
        changes: &[Change],
        meta: &EditMeta,
    ) -> Result<RecordOutcome, HistoryError<S::Error>> {
        let meta = meta.resolve()?;

        let mut decisions = vec![Decision::Rejected; changes.len()];
        let mut rejected = Vec::new();
        let mut by_item: BTreeMap<ItemRef, Vec<usize>> = BTreeMap::new();

        for (index, change) in changes.iter().enumerate() {
            if change.old.item != change.new.item {
                let error = CoreError::MismatchedItem {
                    index,
                    old: change.old.item,
                    new: change.new.item,
                };
                tracing::warn!(index, old = %change.old.item, new = %change.new.item, "Skipping mismatched change");
                rejected.push(RejectedChange { index, error });
                continue;
            }
            if change.old.fields == change.new.fields {
                decisions[index] = Decision::NoOp;
                continue;
            }
            by_item.entry(change.new.item).or_default().push(index);
        }

        let planned = try_join_all(
            by_item
                .iter()
                .map(|(item, indices)| self.plan_item(*item, indices, changes, &meta)),
        )
        .await
        .map_err(HistoryError::StoreUnavailable)?;

        let mut batch = HistoryBatch::default();
        let mut edit_counts = BTreeMap::new();
        for (ledger, item_decisions) in planned {
            for (index, decision) in item_decisions {
                decisions[index] = decision;
            }
            if !ledger.edited {
                continue;
            }
            batch.ops.extend(
                ledger
                    .removed
                    .iter()
                    .map(|&id| SnapshotOp::Remove { item: ledger.item, id }),
            );
            batch
                .ops
                .extend(ledger.appended.into_iter().map(SnapshotOp::Append));
            batch.touches.push(ItemTouch {
                item: ledger.item,
                edit_count: ledger.count,
                last_edited_at: meta.ts,
            });
            edit_counts.insert(ledger.item, ledger.count);
        }

        if !batch.is_empty() {
            self.store
                .apply(&batch)
                .await
                .map_err(HistoryError::StoreUnavailable)?;
        }

        tracing::info!(
            user_id = meta.user_id,
            role = %meta.role,
            changes = changes.len(),
            items = edit_counts.len(),
            appended = batch.appends(),
            removed = batch.removals(),
            rejected = rejected.len(),
            "Recorded edit history batch"
        );

        Ok(RecordOutcome {
            edit_counts,
            decisions,
            rejected,
        })
    }

    /// Decide every change of one item, in input order.
    async fn plan_item(
        &self,
        item: ItemRef,
        indices: &[usize],
        changes: &[Change],
        meta: &ResolvedMeta,
    ) -> Result<(ItemLedger, Vec<(usize, Decision)>), S::Error> {
        let mut ledger = ItemLedger::load(&self.store, item).await?;
        let mut decisions = Vec::with_capacity(indices.len());

        for &index in indices {
            let change = &changes[index];
            let decision = self.decide(&mut ledger, change, meta).await?;
            tracing::debug!(item = %item, index, decision = decision.as_str(), "History decision");
            ledger.edited |= decision.is_edit();
            decisions.push((index, decision));
        }

        Ok((ledger, decisions))
    }

    async fn decide(
        &self,
        ledger: &mut ItemLedger,
        change: &Change,
        meta: &ResolvedMeta,
    ) -> Result<Decision, S::Error> {
        let merge = match ledger.previous(&self.store).await? {
            Some(prev) => {
                let same_burst = prev.user_id() == meta.user_id
                    && prev.role() == meta.role
                    && self.config.within_grace(prev.created_at(), meta.ts);
                same_burst.then(|| *prev.fields() == change.new.fields)
            }
            None => None,
        };

        match merge {
            Some(true) => {
                ledger.revert();
                Ok(Decision::Reverted)
            }
            Some(false) => Ok(Decision::Merged),
            None => {
                let authoring = ledger.count == 0
                    && change.new.owner_id == meta.user_id
                    && meta.role == EditRole::Author
                    && self.config.within_grace(change.new.created_at, meta.ts);
                if authoring {
                    return Ok(Decision::CreationGrace);
                }

                ledger.append(NewSnapshot {
                    item: ledger.item,
                    user_id: meta.user_id,
                    role: meta.role,
                    created_at: meta.ts,
                    ip: meta.ip.clone(),
                    fields: change.old.fields.clone(),
                });
                Ok(Decision::Recorded)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
