#![warn(missing_docs)]
//! Resumable, concurrency-bounded LLM enrichment for movie catalogs.

pub mod checkpoint;
pub mod client;
pub mod controls;
pub mod driver;
pub mod enrichment;
pub mod error;
pub mod prompt;
pub mod record;
pub mod retry;
pub mod scheduler;
pub mod source;
pub mod validate;

pub use checkpoint::{ordered_rows, persist, CheckpointStore, CsvCheckpointStore};
pub use client::{ClientSettings, EnrichmentClient, OpenRouterClient, RawResponse};
pub use controls::Cli;
pub use driver::{run, BatchReport, RunOptions, RunState, RunSummary};
pub use enrichment::{EnrichmentResult, Field};
pub use error::AttemptError;
pub use record::{Record, ResultRow};
pub use retry::{RecordEnricher, RecordOutcome, RetryPolicy, Sleeper, ThreadSleeper, Transition};
pub use scheduler::run_batch;
pub use source::{CsvRecordSource, RecordSource};
pub use validate::{parse_response, strip_code_fence, InvalidReason, Validation};
