//! Per-record retry state machine.
//!
//! Each record moves through `Attempt(0) .. Attempt(max_attempts - 1)` and ends in
//! either `Success` or `Exhausted`. Attempts for one record are strictly
//! sequential; the only suspension points are the request itself and the backoff
//! sleep between attempts.

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::client::EnrichmentClient;
use crate::enrichment::EnrichmentResult;
use crate::error::AttemptError;
use crate::record::Record;
use crate::validate::{parse_response, Validation};

/// Default number of attempts per record.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Blocks the calling worker between attempts.
pub trait Sleeper: Send + Sync {
    /// Pauses for `duration`.
    fn sleep(&self, duration: Duration);
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Sleeps on the current OS thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Attempt budget and delay schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per record, including the first.
    pub max_attempts: u32,
    /// Unit for exponential backoff: attempt `n` waits `unit * 2^(n+1)`.
    pub backoff_unit: Duration,
    /// Flat pause after a non-429 HTTP error.
    pub api_error_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit: Duration::from_secs(1),
            api_error_delay: Duration::from_secs(1),
        }
    }
}

/// Where the state machine goes after one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Sleep for `delay`, then run attempt `next`.
    Retry {
        /// Zero-based index of the next attempt.
        next: u32,
        /// Pause before it.
        delay: Duration,
    },
    /// Terminal: the response validated.
    Success(EnrichmentResult),
    /// Terminal: no attempts left.
    Exhausted(AttemptError),
}

impl RetryPolicy {
    /// Builds a policy with the default delays and `max_attempts` (at least 1).
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Exponential delay after failed attempt `attempt`: `unit * 2^(attempt+1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_add(1).min(16);
        self.backoff_unit.saturating_mul(1 << exponent)
    }

    /// Decides the next state after attempt `attempt` ended with `outcome`.
    ///
    /// A failure on the final attempt exhausts the record without sleeping, since
    /// there is nothing left to wait for.
    pub fn transition(
        &self,
        attempt: u32,
        outcome: Result<EnrichmentResult, AttemptError>,
    ) -> Transition {
        let err = match outcome {
            Ok(result) => return Transition::Success(result),
            Err(err) => err,
        };
        let next = attempt + 1;
        if next >= self.max_attempts {
            return Transition::Exhausted(err);
        }
        let delay = match &err {
            err if err.is_transport() => self.backoff(attempt),
            AttemptError::RateLimited => self.backoff(attempt),
            AttemptError::Api { .. } => self.api_error_delay,
            _ => Duration::ZERO,
        };
        Transition::Retry { next, delay }
    }
}

/// How a record's retry sequence terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A validated, complete result.
    Enriched {
        /// The six populated fields.
        result: EnrichmentResult,
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// Every attempt failed; the record is saved with an empty result.
    Exhausted {
        /// Attempts used.
        attempts: u32,
        /// Failure of the final attempt.
        last_error: AttemptError,
    },
}

impl RecordOutcome {
    /// The result to persist: complete on success, empty on exhaustion.
    pub fn into_result(self) -> EnrichmentResult {
        match self {
            RecordOutcome::Enriched { result, .. } => result,
            RecordOutcome::Exhausted { .. } => EnrichmentResult::empty(),
        }
    }

    /// Number of attempts the record consumed.
    pub fn attempts(&self) -> u32 {
        match self {
            RecordOutcome::Enriched { attempts, .. } | RecordOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// True when retries were exhausted.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RecordOutcome::Exhausted { .. })
    }
}

/// A client, a retry policy, and a sleeper: everything one record needs.
pub struct RecordEnricher<C, S = ThreadSleeper> {
    client: C,
    policy: RetryPolicy,
    sleeper: S,
}

impl<C: EnrichmentClient> RecordEnricher<C, ThreadSleeper> {
    /// Enricher that sleeps on the worker thread between attempts.
    pub fn new(client: C, policy: RetryPolicy) -> Self {
        Self::with_sleeper(client, policy, ThreadSleeper)
    }
}

impl<C: EnrichmentClient, S: Sleeper> RecordEnricher<C, S> {
    /// Enricher with a custom sleeper.
    pub fn with_sleeper(client: C, policy: RetryPolicy, sleeper: S) -> Self {
        Self {
            client,
            policy,
            sleeper,
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Runs the retry state machine for `record` to a terminal state.
    pub fn enrich_with_retry(&self, record: &Record) -> RecordOutcome {
        let mut attempt = 0u32;
        loop {
            let outcome = self.attempt_once(record);
            match self.policy.transition(attempt, outcome) {
                Transition::Success(result) => {
                    return RecordOutcome::Enriched {
                        result,
                        attempts: attempt + 1,
                    };
                }
                Transition::Exhausted(last_error) => {
                    warn!(
                        key = %record.key,
                        title = %record.title,
                        attempts = attempt + 1,
                        error = %last_error,
                        "retries exhausted"
                    );
                    return RecordOutcome::Exhausted {
                        attempts: attempt + 1,
                        last_error,
                    };
                }
                Transition::Retry { next, delay } => {
                    attempt = next;
                    self.sleeper.sleep(delay);
                }
            }
        }
    }

    fn attempt_once(&self, record: &Record) -> Result<EnrichmentResult, AttemptError> {
        let outcome = self
            .client
            .enrich(record)
            .and_then(|raw| raw.completion_text())
            .and_then(|text| match parse_response(&text) {
                Validation::Valid(result) => Ok(result),
                Validation::Invalid(reason) => Err(AttemptError::InvalidResponse(reason.to_string())),
            });
        if let Err(err) = &outcome {
            match err {
                AttemptError::Api { status, message } => {
                    warn!(key = %record.key, title = %record.title, status, %message, "API error");
                }
                other => debug!(key = %record.key, error = %other, "attempt failed"),
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RawResponse;
    use crate::enrichment::Field;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn complete_body() -> String {
        let content: serde_json::Map<String, serde_json::Value> = Field::ALL
            .iter()
            .map(|field| (field.name().to_string(), format!("{} text", field.name()).into()))
            .collect();
        serde_json::json!({
            "choices": [{ "message": { "content": serde_json::Value::Object(content).to_string() } }]
        })
        .to_string()
    }

    struct Scripted {
        replies: Mutex<Vec<Result<RawResponse, AttemptError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(mut replies: Vec<Result<RawResponse, AttemptError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl EnrichmentClient for Scripted {
        fn enrich(&self, _record: &Record) -> Result<RawResponse, AttemptError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Ok(RawResponse::new(429, "")))
        }
    }

    #[derive(Default)]
    struct RecordingSleeper(Mutex<Vec<Duration>>);

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    fn record() -> Record {
        Record::new("7", "Heat (1995)", vec!["Action".into(), "Crime".into()])
    }

    #[test]
    fn backoff_doubles_from_two_units() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(2));
        assert_eq!(policy.backoff(1), Duration::from_secs(4));
        assert_eq!(policy.backoff(2), Duration::from_secs(8));
    }

    #[test]
    fn transitions_follow_error_class() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.transition(0, Err(AttemptError::TransportTimeout)),
            Transition::Retry {
                next: 1,
                delay: Duration::from_secs(2)
            }
        );
        assert_eq!(
            policy.transition(1, Err(AttemptError::RateLimited)),
            Transition::Retry {
                next: 2,
                delay: Duration::from_secs(4)
            }
        );
        assert_eq!(
            policy.transition(
                0,
                Err(AttemptError::Api {
                    status: 500,
                    message: "boom".into()
                })
            ),
            Transition::Retry {
                next: 1,
                delay: Duration::from_secs(1)
            }
        );
        assert_eq!(
            policy.transition(0, Err(AttemptError::InvalidResponse("x".into()))),
            Transition::Retry {
                next: 1,
                delay: Duration::ZERO
            }
        );
        assert_eq!(
            policy.transition(2, Err(AttemptError::TransportTimeout)),
            Transition::Exhausted(AttemptError::TransportTimeout)
        );
    }

    #[test]
    fn timeouts_then_success_yields_enriched() {
        let client = Scripted::new(vec![
            Err(AttemptError::TransportTimeout),
            Err(AttemptError::TransportTimeout),
            Ok(RawResponse::new(200, complete_body())),
        ]);
        let sleeper = RecordingSleeper::default();
        let enricher = RecordEnricher::with_sleeper(&client, RetryPolicy::default(), &sleeper);

        let outcome = enricher.enrich_with_retry(&record());

        assert_eq!(outcome.attempts(), 3);
        assert!(outcome.clone().into_result().is_complete());
        assert_eq!(
            *sleeper.0.lock().unwrap(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[test]
    fn persistent_rate_limit_exhausts_after_max_attempts() {
        let client = Scripted::new(Vec::new());
        let sleeper = RecordingSleeper::default();
        let enricher = RecordEnricher::with_sleeper(&client, RetryPolicy::default(), &sleeper);

        let outcome = enricher.enrich_with_retry(&record());

        assert_eq!(
            outcome,
            RecordOutcome::Exhausted {
                attempts: 3,
                last_error: AttemptError::RateLimited
            }
        );
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        assert!(outcome.into_result().is_empty());
    }

    #[test]
    fn incomplete_json_is_retried_without_delay() {
        let partial = serde_json::json!({
            "choices": [{ "message": { "content": "{\"abstract_en\":\"only one\"}" } }]
        })
        .to_string();
        let client = Scripted::new(vec![
            Ok(RawResponse::new(200, partial)),
            Ok(RawResponse::new(200, complete_body())),
        ]);
        let sleeper = RecordingSleeper::default();
        let enricher = RecordEnricher::with_sleeper(&client, RetryPolicy::default(), &sleeper);

        let outcome = enricher.enrich_with_retry(&record());

        assert_eq!(outcome.attempts(), 2);
        assert_eq!(*sleeper.0.lock().unwrap(), vec![Duration::ZERO]);
    }

    #[test]
    fn outcome_is_never_partial() {
        let replies = vec![
            Ok(RawResponse::new(500, r#"{"error":{"message":"boom"}}"#)),
            Err(AttemptError::Transport("reset".into())),
            Ok(RawResponse::new(200, "garbage")),
        ];
        let client = Scripted::new(replies);
        let enricher =
            RecordEnricher::with_sleeper(&client, RetryPolicy::default(), RecordingSleeper::default());

        let result = enricher.enrich_with_retry(&record()).into_result();

        assert!(result.is_empty() || result.is_complete());
        assert!(result.is_empty());
    }

    #[test]
    fn single_attempt_policy_never_sleeps() {
        let client = Scripted::new(vec![Err(AttemptError::TransportTimeout)]);
        let sleeper = RecordingSleeper::default();
        let enricher =
            RecordEnricher::with_sleeper(&client, RetryPolicy::with_max_attempts(1), &sleeper);

        assert!(enricher.enrich_with_retry(&record()).is_exhausted());
        assert!(sleeper.0.lock().unwrap().is_empty());
    }
}
