use crate::content::ItemRef;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid edit metadata: {0}")]
    InvalidMetadata(String),

    #[error("Change #{index} pairs different items: {old} -> {new}")]
    MismatchedItem {
        index: usize,
        old: ItemRef,
        new: ItemRef,
    },

    #[error("Malformed status: {0}")]
    MalformedStatus(String),
}

/// Error returned by operations that touch a [`SnapshotStore`].
///
/// Store failures are carried untransformed so callers can apply whatever
/// retry policy fits the backing store.
///
/// [`SnapshotStore`]: crate::snapshot::SnapshotStore
#[derive(Debug, thiserror::Error)]
pub enum HistoryError<E> {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Snapshot store error: {0}")]
    StoreUnavailable(#[source] E),
}
