/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// History snapshot sequence id. Monotonically increasing per store, so
/// ordering snapshots of one item by id yields edit order.
pub type SnapshotId = DbId;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
