//! Bounded worker pool that enriches one batch of records.
//!
//! A batch is fanned out to at most `concurrency` worker threads over a bounded
//! channel. Each worker runs one record's retry sequence at a time, so no more
//! than `concurrency` requests are ever outstanding. Results come back tagged
//! with their batch position and are reassembled in input order.

use std::collections::BTreeMap;
use std::thread;

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

use crate::client::EnrichmentClient;
use crate::record::Record;
use crate::retry::{RecordEnricher, RecordOutcome, Sleeper};

/// Default number of records enriched at once.
pub const DEFAULT_CONCURRENCY: usize = 20;

struct RecordTask<'a> {
    index: usize,
    record: &'a Record,
}

struct TaskResult {
    index: usize,
    outcome: RecordOutcome,
}

/// Enriches every record in `batch`, at most `concurrency` at a time.
///
/// The returned outcomes line up with `batch` by position, regardless of the
/// order in which records finished.
pub fn run_batch<C, S>(
    enricher: &RecordEnricher<C, S>,
    batch: &[Record],
    concurrency: usize,
) -> Result<Vec<RecordOutcome>>
where
    C: EnrichmentClient,
    S: Sleeper,
{
    if batch.is_empty() {
        return Ok(Vec::new());
    }
    let workers = concurrency.max(1).min(batch.len());
    let (task_tx, task_rx) = bounded::<RecordTask<'_>>(workers);
    let (result_tx, result_rx) = bounded::<TaskResult>(workers);

    let mut finished: BTreeMap<usize, RecordOutcome> = BTreeMap::new();
    thread::scope(|scope| {
        for worker_id in 0..workers {
            let worker_rx = task_rx.clone();
            let worker_tx = result_tx.clone();
            scope.spawn(move || worker_loop(worker_id, worker_rx, worker_tx, enricher));
        }
        drop(task_rx);
        drop(result_tx);

        scope.spawn(move || {
            for (index, record) in batch.iter().enumerate() {
                if task_tx.send(RecordTask { index, record }).is_err() {
                    break;
                }
            }
        });

        for TaskResult { index, outcome } in result_rx.iter() {
            finished.insert(index, outcome);
        }
    });

    anyhow::ensure!(
        finished.len() == batch.len(),
        "workers returned {} outcomes for {} records",
        finished.len(),
        batch.len()
    );
    (0..batch.len())
        .map(|index| {
            finished
                .remove(&index)
                .ok_or_else(|| anyhow!("missing outcome for batch position {}", index))
        })
        .collect()
}

fn worker_loop<C, S>(
    worker_id: usize,
    receiver: Receiver<RecordTask<'_>>,
    sender: Sender<TaskResult>,
    enricher: &RecordEnricher<C, S>,
) where
    C: EnrichmentClient,
    S: Sleeper,
{
    for RecordTask { index, record } in receiver.iter() {
        debug!(worker_id, key = %record.key, "enriching record");
        let outcome = enricher.enrich_with_retry(record);
        if sender.send(TaskResult { index, outcome }).is_err() {
            break;
        }
    }
}
