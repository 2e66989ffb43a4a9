//! Background Indexer: periodically catches up any `MessageTable` rows not
//! yet reflected in `MessageSearchTable`, in small batches so it never blocks
//! foreground access to the database for long.

use crate::config::StoreConfig;
use crate::db::{DatabaseGateway, RwOutcome};
use crate::error::StoreResult;
use crate::model::INDEXING_FIELDS;
use rusqlite::Transaction;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// External progress sink. The account store notifies it of the total
/// amount of work, increments as batches complete, and calls `finish` when
/// the loop ends — including on cancellation.
pub trait ProgressMonitor: Send + Sync {
    fn set_total(&self, total: u64);
    fn increment(&self, amount: u64);
    fn finish(&self);
}

/// A monitor that does nothing, for callers that don't need progress UI.
pub struct NullProgressMonitor;

impl ProgressMonitor for NullProgressMonitor {
    fn set_total(&self, _total: u64) {}
    fn increment(&self, _amount: u64) {}
    fn finish(&self) {}
}

fn count_unindexed(tx: &Transaction) -> StoreResult<u64> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM MessageTable \
         WHERE id NOT IN (SELECT docid FROM MessageSearchTable)",
        [],
        |r| r.get(0),
    )?;
    Ok(count.max(0) as u64)
}

/// Index up to `limit` messages not yet present in `MessageSearchTable`.
/// Returns the number of rows processed (attempted); fewer than `limit`
/// signals the caller's loop to stop.
pub(crate) fn populate_batch(tx: &Transaction, limit: u32) -> StoreResult<u32> {
    let mut stmt = tx.prepare(
        "SELECT id FROM MessageTable \
         WHERE id NOT IN (SELECT docid FROM MessageSearchTable) \
         LIMIT ?1",
    )?;
    let ids: Vec<i64> = stmt.query_map([limit], |r| r.get(0))?.collect::<Result<_, _>>()?;
    drop(stmt);

    let mut processed = 0u32;
    for id in ids {
        processed += 1;
        if let Err(e) = index_one(tx, id) {
            log::warn!("indexer: failed to index message {id}: {e}");
        }
    }
    Ok(processed)
}

fn index_one(tx: &Transaction, id: i64) -> StoreResult<()> {
    let row: (Option<String>, Option<String>, Option<String>, Option<String>, Option<String>, Option<String>, Option<String>, u32) =
        tx.query_row(
            "SELECT subject, from_field, receivers, cc, bcc, body, attachment, fields_bitmask \
             FROM MessageTable WHERE id = ?1",
            [id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?, r.get(6)?, r.get(7)?)),
        )?;
    if row.7 & INDEXING_FIELDS != INDEXING_FIELDS {
        log::debug!("indexer: message {id} missing fields for a complete index entry, indexing partially");
    }
    tx.execute(
        "INSERT INTO MessageSearchTable (docid, subject, from_field, receivers, cc, bcc, body, attachment) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (id, row.0, row.1, row.2, row.3, row.4, row.5, row.6),
    )?;
    Ok(())
}

/// Run the indexer loop: wait `indexer_initial_delay`, then repeatedly
/// `populate_batch` until a batch reports fewer than `indexer_batch_size`
/// rows, yielding cooperatively between batches. Promptly stops and still
/// reports `finish` on cancellation.
pub(crate) async fn run(
    db: DatabaseGateway,
    config: StoreConfig,
    cancel: CancellationToken,
    progress: Arc<dyn ProgressMonitor>,
) {
    tokio::select! {
        _ = tokio::time::sleep(config.indexer_initial_delay) => {}
        _ = cancel.cancelled() => {
            progress.finish();
            return;
        }
    }

    let total = db
        .read_only(Some(&cancel), |tx| count_unindexed(tx))
        .await
        .unwrap_or(0);
    progress.set_total(total);

    let batch_size = config.indexer_batch_size;
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let outcome = db
            .read_write(Some(&cancel), move |tx| {
                populate_batch(tx, batch_size).map(RwOutcome::Commit)
            })
            .await;
        let processed = match outcome {
            Ok(n) => n,
            Err(e) => {
                log::error!("indexer: batch failed: {e}");
                break;
            }
        };
        progress.increment(processed as u64);
        if processed < batch_size {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(config.indexer_batch_yield) => {}
            _ = cancel.cancelled() => break,
        }
    }
    progress.finish();
}
