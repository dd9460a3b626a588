//! Integration tests for the edit batch drain.

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use quire_core::content::{ContentItem, EditMeta, EditRole, ItemRef, TrackedFields};
use quire_core::{Change, HistoryConfig, HistoryRecorder};
use quire_db::repositories::{ContentItemRepo, EditBatchRepo, SnapshotRepo};
use quire_db::PgSnapshotStore;
use quire_worker::drain::{drain_once, DrainReport};
use quire_worker::WorkerError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn entry(id: i64, body: &str) -> ContentItem {
    ContentItem {
        item: ItemRef::entry(id),
        owner_id: 1,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        edit_count: 0,
        last_edited_at: None,
        fields: TrackedFields {
            body: body.to_string(),
            ..Default::default()
        },
    }
}

fn edited(item: &ContentItem, body: &str) -> ContentItem {
    let mut next = item.clone();
    next.fields.body = body.to_string();
    next
}

fn recorder(pool: &PgPool) -> HistoryRecorder<PgSnapshotStore> {
    HistoryRecorder::new(PgSnapshotStore::new(pool.clone()), HistoryConfig::default())
}

fn moderator_at(minutes: i64) -> EditMeta {
    EditMeta::new(2, EditRole::Moderator)
        .at(Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap() + Duration::minutes(minutes))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_drain_records_pending_batches(pool: PgPool) {
    let a = entry(1, "one");
    ContentItemRepo::create(&pool, &a).await.unwrap();
    let b = edited(&a, "two");
    let c = edited(&a, "three");

    let first = EditBatchRepo::enqueue(&pool, &moderator_at(0), &[Change::new(a, b.clone())])
        .await
        .unwrap();
    let second = EditBatchRepo::enqueue(&pool, &moderator_at(30), &[Change::new(b, c)])
        .await
        .unwrap();

    let report = drain_once(&recorder(&pool), 10).await.unwrap();
    assert_eq!(
        report,
        DrainReport {
            processed: 2,
            failed: 0,
            interrupted: false
        }
    );

    assert_eq!(
        SnapshotRepo::count_by_item(&pool, ItemRef::entry(1)).await.unwrap(),
        2
    );
    for id in [first, second] {
        let batch = EditBatchRepo::find_by_id(&pool, id).await.unwrap().unwrap();
        assert!(batch.processed_at.is_some());
        assert!(batch.error.is_none());
    }
    assert!(EditBatchRepo::list_pending(&pool, 10).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_invalid_metadata_marks_batch_failed(pool: PgPool) {
    let a = entry(2, "one");
    ContentItemRepo::create(&pool, &a).await.unwrap();

    let meta = EditMeta {
        user_id: None,
        role: EditRole::Moderator,
        ts: None,
        ip: None,
    };
    let id = EditBatchRepo::enqueue(&pool, &meta, &[Change::new(a.clone(), edited(&a, "x"))])
        .await
        .unwrap();

    let report = drain_once(&recorder(&pool), 10).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.processed, 0);

    let batch = EditBatchRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert!(batch.error.unwrap().contains("Invalid edit metadata"));
    assert_eq!(
        SnapshotRepo::count_by_item(&pool, ItemRef::entry(2)).await.unwrap(),
        0
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_mismatched_change_is_skipped(pool: PgPool) {
    let a = entry(3, "one");
    ContentItemRepo::create(&pool, &a).await.unwrap();
    let other = entry(99, "elsewhere");

    let id = EditBatchRepo::enqueue(
        &pool,
        &moderator_at(0),
        &[Change::new(a.clone(), other), Change::new(a.clone(), edited(&a, "two"))],
    )
    .await
    .unwrap();

    let report = drain_once(&recorder(&pool), 10).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);

    let batch = EditBatchRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert!(batch.error.is_none());
    assert_eq!(
        SnapshotRepo::count_by_item(&pool, ItemRef::entry(3)).await.unwrap(),
        1
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_rejected_write_does_not_block_later_batches(pool: PgPool) {
    // Entry 4 has no content_items row, so its snapshot insert is rejected.
    let ghost = entry(4, "one");
    let bad = EditBatchRepo::enqueue(
        &pool,
        &moderator_at(0),
        &[Change::new(ghost.clone(), edited(&ghost, "two"))],
    )
    .await
    .unwrap();

    let live = entry(5, "one");
    ContentItemRepo::create(&pool, &live).await.unwrap();
    let good = EditBatchRepo::enqueue(
        &pool,
        &moderator_at(1),
        &[Change::new(live.clone(), edited(&live, "two"))],
    )
    .await
    .unwrap();

    let report = drain_once(&recorder(&pool), 10).await.unwrap();
    assert_eq!(
        report,
        DrainReport {
            processed: 1,
            failed: 1,
            interrupted: false
        }
    );

    let failed = EditBatchRepo::find_by_id(&pool, bad).await.unwrap().unwrap();
    assert!(failed.processed_at.is_some());
    assert!(failed.error.is_some());
    let recorded = EditBatchRepo::find_by_id(&pool, good).await.unwrap().unwrap();
    assert!(recorded.error.is_none());
    assert_eq!(
        SnapshotRepo::count_by_item(&pool, ItemRef::entry(5)).await.unwrap(),
        1
    );

    let again = drain_once(&recorder(&pool), 10).await.unwrap();
    assert_eq!(again, DrainReport::default());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_undecodable_payload_marks_batch_failed(pool: PgPool) {
    let bad: i64 = sqlx::query_scalar(
        "INSERT INTO edit_batches (user_id, role, changes) \
         VALUES (2, 'moderator', '[{\"bogus\": 1}]'::jsonb) RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    let live = entry(6, "one");
    ContentItemRepo::create(&pool, &live).await.unwrap();
    EditBatchRepo::enqueue(
        &pool,
        &moderator_at(0),
        &[Change::new(live.clone(), edited(&live, "two"))],
    )
    .await
    .unwrap();

    let report = drain_once(&recorder(&pool), 10).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.processed, 1);

    let failed = EditBatchRepo::find_by_id(&pool, bad).await.unwrap().unwrap();
    assert!(failed.error.unwrap().starts_with("Undecodable changes"));
    assert_eq!(
        SnapshotRepo::count_by_item(&pool, ItemRef::entry(6)).await.unwrap(),
        1
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_unreachable_database_leaves_batches_pending(pool: PgPool) {
    let live = entry(7, "one");
    ContentItemRepo::create(&pool, &live).await.unwrap();
    let id = EditBatchRepo::enqueue(
        &pool,
        &moderator_at(0),
        &[Change::new(live.clone(), edited(&live, "two"))],
    )
    .await
    .unwrap();

    let closed = PgPoolOptions::new()
        .connect_with(pool.connect_options().as_ref().clone())
        .await
        .unwrap();
    closed.close().await;

    let result = drain_once(&recorder(&closed), 10).await;
    assert_matches!(result, Err(WorkerError::Database(sqlx::Error::PoolClosed)));

    let pending = EditBatchRepo::list_pending(&pool, 10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
}
