//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that take
//! `&PgPool` as the first argument, or a transaction for writes that must
//! commit together.

pub mod content_item_repo;
pub mod edit_batch_repo;
pub mod snapshot_repo;

pub use content_item_repo::ContentItemRepo;
pub use edit_batch_repo::EditBatchRepo;
pub use snapshot_repo::SnapshotRepo;
