//! Batch-by-batch run orchestration.
//!
//! The driver computes what is left to do, runs it in fixed-size batches, and
//! rewrites the checkpoint after every batch. Batches never overlap: the next
//! one starts only after the previous checkpoint write returned, and the
//! accumulation map is only touched here, between batches.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;

use crate::checkpoint::{persist, CheckpointStore};
use crate::client::EnrichmentClient;
use crate::record::{Record, ResultRow};
use crate::retry::{RecordEnricher, RecordOutcome, Sleeper};
use crate::scheduler::{run_batch, DEFAULT_CONCURRENCY};
use crate::source::RecordSource;

/// Default number of records per checkpointed batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Knobs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Records per batch; the checkpoint is rewritten after each.
    pub batch_size: usize,
    /// Maximum records enriched concurrently within a batch.
    pub concurrency: usize,
    /// Cap on records attempted this run (`None` for all).
    pub limit: Option<usize>,
    /// Treat checkpointed rows with an empty result as not yet handled.
    pub retry_empty: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            limit: None,
            retry_empty: false,
        }
    }
}

/// Process-scoped progress: handled keys and every row produced so far.
#[derive(Debug, Default)]
pub struct RunState {
    handled: HashSet<String>,
    accumulated: HashMap<String, ResultRow>,
}

impl RunState {
    /// Seeds state from a prior checkpoint.
    ///
    /// Every checkpointed key counts as handled, empty results included, unless
    /// `retry_empty` is set; then empty rows stay in the accumulation map but
    /// are attempted again.
    pub fn from_checkpoint(rows: Vec<ResultRow>, retry_empty: bool) -> Self {
        let mut state = Self::default();
        for row in rows {
            if !(retry_empty && row.result.is_empty()) {
                state.handled.insert(row.key.clone());
            }
            state.accumulated.insert(row.key.clone(), row);
        }
        state
    }

    /// Whether `key` is treated as already done.
    pub fn is_handled(&self, key: &str) -> bool {
        self.handled.contains(key)
    }

    /// All rows produced so far, keyed by record key.
    pub fn accumulated(&self) -> &HashMap<String, ResultRow> {
        &self.accumulated
    }

    /// Catalog records not yet handled, in catalog order, truncated to `limit`.
    pub fn remaining(&self, catalog: &[Record], limit: Option<usize>) -> Vec<Record> {
        let pending = catalog
            .iter()
            .filter(|record| !self.handled.contains(&record.key))
            .cloned();
        match limit {
            Some(limit) => pending.take(limit).collect(),
            None => pending.collect(),
        }
    }

    /// Folds a finished batch into the state; returns how many results were empty.
    pub fn merge(&mut self, batch: &[Record], outcomes: Vec<RecordOutcome>) -> usize {
        let mut empty = 0usize;
        for (record, outcome) in batch.iter().zip(outcomes) {
            let result = outcome.into_result();
            if result.is_empty() {
                empty += 1;
            }
            self.handled.insert(record.key.clone());
            self.accumulated
                .insert(record.key.clone(), ResultRow::from_outcome(record, result));
        }
        empty
    }
}

/// Progress after one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Zero-based batch index.
    pub batch: usize,
    /// Records in this batch.
    pub batch_len: usize,
    /// Records processed so far this run.
    pub processed: usize,
    /// Records this run set out to process.
    pub total: usize,
    /// Wall time since the first batch started.
    pub elapsed: Duration,
    /// Records per second so far.
    pub rate: f64,
    /// Estimated time to finish the remaining records.
    pub eta: Duration,
    /// Records in this batch that ended with an empty result.
    pub empty_results: usize,
    /// Rows written to the checkpoint.
    pub checkpoint_rows: usize,
}

impl BatchReport {
    fn new(
        batch: usize,
        batch_len: usize,
        processed: usize,
        total: usize,
        elapsed: Duration,
        empty_results: usize,
        checkpoint_rows: usize,
    ) -> Self {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            processed as f64 / secs
        } else {
            0.0
        };
        let eta = if rate > 0.0 {
            Duration::from_secs_f64(total.saturating_sub(processed) as f64 / rate)
        } else {
            Duration::ZERO
        };
        Self {
            batch,
            batch_len,
            processed,
            total,
            elapsed,
            rate,
            eta,
            empty_results,
            checkpoint_rows,
        }
    }

    /// Share of the run completed, 0–100.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.processed as f64 * 100.0 / self.total as f64
        }
    }
}

/// What a run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Records in the catalog.
    pub catalog_len: usize,
    /// Records skipped as already handled.
    pub already_handled: usize,
    /// Records attempted this run.
    pub attempted: usize,
    /// Attempted records that ended with a complete result.
    pub enriched: usize,
    /// Attempted records that exhausted their retries.
    pub exhausted: usize,
    /// Complete rows across the whole checkpoint after the run.
    pub enriched_total: usize,
    /// One report per batch, in order.
    pub batches: Vec<BatchReport>,
    /// Wall time of the batch loop.
    pub elapsed: Duration,
}

/// Runs the whole pipeline: load, diff against the checkpoint, enrich in
/// batches, checkpoint after each batch.
pub fn run<R, K, C, S>(
    source: &R,
    store: &K,
    enricher: &RecordEnricher<C, S>,
    options: &RunOptions,
) -> Result<RunSummary>
where
    R: RecordSource + ?Sized,
    K: CheckpointStore + ?Sized,
    C: EnrichmentClient,
    S: Sleeper,
{
    let catalog = source.read_all().context("failed to load catalog")?;
    let prior = store.read().context("failed to load checkpoint")?;
    let mut state = RunState::from_checkpoint(prior, options.retry_empty);
    let remaining = state.remaining(&catalog, options.limit);
    let already_handled = catalog
        .iter()
        .filter(|record| state.is_handled(&record.key))
        .count();

    info!(
        catalog = catalog.len(),
        already_handled,
        remaining = remaining.len(),
        "loaded catalog"
    );

    let mut summary = RunSummary {
        catalog_len: catalog.len(),
        already_handled,
        attempted: 0,
        enriched: 0,
        exhausted: 0,
        enriched_total: 0,
        batches: Vec::new(),
        elapsed: Duration::ZERO,
    };
    if remaining.is_empty() {
        info!("nothing to do");
        summary.enriched_total = count_complete(&state);
        return Ok(summary);
    }

    let batch_size = options.batch_size.max(1);
    let total = remaining.len();
    let started = Instant::now();
    for (batch_idx, batch) in remaining.chunks(batch_size).enumerate() {
        let outcomes = run_batch(enricher, batch, options.concurrency)
            .with_context(|| format!("batch {} failed", batch_idx))?;
        let empty_results = state.merge(batch, outcomes);
        let checkpoint_rows = persist(store, state.accumulated(), &catalog)
            .with_context(|| format!("failed to checkpoint after batch {}", batch_idx))?;

        summary.attempted += batch.len();
        summary.exhausted += empty_results;
        summary.enriched += batch.len() - empty_results;
        let report = BatchReport::new(
            batch_idx,
            batch.len(),
            summary.attempted,
            total,
            started.elapsed(),
            empty_results,
            checkpoint_rows,
        );
        info!(
            batch = report.batch,
            processed = report.processed,
            total = report.total,
            percent = %format!("{:.0}", report.percent()),
            rate = %format!("{:.1}", report.rate),
            elapsed_secs = report.elapsed.as_secs(),
            eta_secs = report.eta.as_secs(),
            failures = report.empty_results,
            "batch checkpointed"
        );
        summary.batches.push(report);
    }
    summary.elapsed = started.elapsed();
    summary.enriched_total = count_complete(&state);
    info!(
        enriched = summary.enriched_total,
        elapsed_secs = summary.elapsed.as_secs(),
        "run complete"
    );
    Ok(summary)
}

fn count_complete(state: &RunState) -> usize {
    state
        .accumulated()
        .values()
        .filter(|row| row.result.is_complete())
        .count()
}
