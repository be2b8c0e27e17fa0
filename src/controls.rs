//! Command-line and environment configuration for enrichment runs.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;

use crate::client::openrouter::DEFAULT_BASE_URL;
use crate::client::ClientSettings;
use crate::driver::{RunOptions, DEFAULT_BATCH_SIZE};
use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::scheduler::DEFAULT_CONCURRENCY;

/// Command-line interface for the enrichment binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "movie-enricher",
    about = "Generate multilingual abstracts and descriptions for a movie catalog"
)]
pub struct Cli {
    /// Catalog CSV with movieId,title,genres columns
    #[arg(long, env = "ENRICH_INPUT", default_value = "ml-32m/movies.csv")]
    pub input: PathBuf,

    /// Checkpoint/output CSV; rewritten after every batch and read on resume
    #[arg(long, env = "ENRICH_OUTPUT", default_value = "data/movies_enriched.csv")]
    pub output: PathBuf,

    /// Model identifier passed to the API
    #[arg(long, env = "ENRICH_MODEL", default_value = "google/gemini-2.0-flash-001")]
    pub model: String,

    /// Maximum concurrent requests
    #[arg(long, env = "ENRICH_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Maximum records to process this run (0 = all)
    #[arg(long, env = "ENRICH_LIMIT", default_value_t = 0)]
    pub limit: usize,

    /// Records per batch; progress is saved after each batch
    #[arg(long, env = "ENRICH_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Bearer credential for the API
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "ENRICH_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "ENRICH_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Attempts per record before it is saved empty
    #[arg(long, env = "ENRICH_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Sampling temperature
    #[arg(long, env = "ENRICH_TEMPERATURE", default_value_t = 0.3)]
    pub temperature: f32,

    /// Completion token cap per request
    #[arg(long, env = "ENRICH_MAX_TOKENS", default_value_t = 1536)]
    pub max_tokens: usize,

    /// Re-attempt records whose checkpointed result is empty
    #[arg(long, env = "ENRICH_RETRY_EMPTY", default_value_t = false)]
    pub retry_empty: bool,
}

impl Cli {
    /// The API key, or an error when none was supplied.
    pub fn require_api_key(&self) -> Result<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("OPENROUTER_API_KEY must be set (or pass --api-key)"))
    }

    /// Batch, concurrency, and resume settings.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            batch_size: self.batch_size.max(1),
            concurrency: self.concurrency.max(1),
            limit: (self.limit > 0).then_some(self.limit),
            retry_empty: self.retry_empty,
        }
    }

    /// Retry budget with the standard delay schedule.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.max_attempts)
    }

    /// HTTP client settings using `api_key`.
    pub fn client_settings(&self, api_key: String) -> ClientSettings {
        ClientSettings {
            api_key,
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}
