//! Edit batch outbox drain.
//!
//! Pending rows in `edit_batches` are fed through the history recorder in
//! submission order. A batch whose payload does not decode, whose metadata is
//! invalid, or whose writes the database rejects is marked failed and never
//! retried. A batch that hits an unreachable database stays pending and ends
//! the pass so later batches for the same item cannot overtake it.

use quire_core::recorder::Change;
use quire_core::{HistoryError, HistoryRecorder};
use quire_db::models::edit_batch::EditBatch;
use quire_db::repositories::EditBatchRepo;
use quire_db::PgSnapshotStore;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::error::WorkerError;

/// Counters for one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub processed: usize,
    pub failed: usize,
    /// The database became unreachable before the listed batches ran out.
    pub interrupted: bool,
}

/// Drain up to `limit` pending batches once.
pub async fn drain_once(
    recorder: &HistoryRecorder<PgSnapshotStore>,
    limit: i64,
) -> Result<DrainReport, WorkerError> {
    let pool = recorder.store().pool();
    let pending = EditBatchRepo::list_pending(pool, limit).await?;
    let mut report = DrainReport::default();

    for batch in &pending {
        let changes = match batch.decode_changes() {
            Ok(changes) => changes,
            Err(e) => {
                tracing::warn!(batch_id = batch.id, error = %e, "Edit batch payload undecodable");
                EditBatchRepo::mark_failed(pool, batch.id, &format!("Undecodable changes: {e}"))
                    .await?;
                report.failed += 1;
                continue;
            }
        };

        match process(recorder, batch, &changes).await {
            Ok(()) => {
                EditBatchRepo::mark_processed(pool, batch.id).await?;
                report.processed += 1;
            }
            Err(HistoryError::StoreUnavailable(e)) if quire_db::is_transient(&e) => {
                tracing::error!(batch_id = batch.id, error = %e, "Edit batch deferred");
                report.interrupted = true;
                break;
            }
            Err(e) => {
                tracing::warn!(batch_id = batch.id, error = %e, "Edit batch rejected");
                EditBatchRepo::mark_failed(pool, batch.id, &e.to_string()).await?;
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

async fn process(
    recorder: &HistoryRecorder<PgSnapshotStore>,
    batch: &EditBatch,
    changes: &[Change],
) -> Result<(), HistoryError<sqlx::Error>> {
    let meta = batch.meta()?;
    let outcome = recorder.record(changes, &meta).await?;
    for rejected in &outcome.rejected {
        tracing::warn!(batch_id = batch.id, index = rejected.index, error = %rejected.error, "Change skipped");
    }
    tracing::debug!(
        batch_id = batch.id,
        changes = changes.len(),
        edited = outcome.edit_counts.len(),
        "Edit batch recorded"
    );
    Ok(())
}

/// Poll the outbox until `cancel` is triggered.
pub async fn run(
    recorder: HistoryRecorder<PgSnapshotStore>,
    config: WorkerConfig,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = config.poll_interval_secs,
        batch_limit = config.batch_limit,
        grace_secs = config.edit_grace_secs,
        "Edit batch drain started"
    );

    let mut interval = tokio::time::interval(config.poll_interval());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Edit batch drain stopping");
                break;
            }
            _ = interval.tick() => {
                match drain_once(&recorder, config.batch_limit).await {
                    Ok(report) if report.processed + report.failed > 0 => {
                        tracing::info!(
                            processed = report.processed,
                            failed = report.failed,
                            interrupted = report.interrupted,
                            "Edit batches drained"
                        );
                    }
                    Ok(_) => tracing::debug!("No pending edit batches"),
                    Err(e) => tracing::error!(error = %e, "Edit batch drain failed"),
                }
            }
        }
    }
}
