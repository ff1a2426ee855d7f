//! Bounded retry loop with backend rotation.
//!
//! Each attempt runs the whole job against one backend. A rate-limited
//! failure moves to the next backend in the pool and grows the backoff;
//! any other failure waits a flat delay and retries on the same backend.
//! Only exhausting the attempt budget is reported to the caller.

use crate::resilience::backend::{Backend, BackendPool};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::time::{Duration, TryFromFloatSecsError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// How a failed attempt should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The backend throttled the caller.
    RateLimited,
    /// Anything else.
    Other,
}

impl ErrorKind {
    /// Classify a free-text error message.
    ///
    /// Used where an error only carries text; matches the `rate_limit`
    /// marker case-insensitively.
    pub fn classify_message(message: &str) -> Self {
        if message.to_lowercase().contains("rate_limit") {
            ErrorKind::RateLimited
        } else {
            ErrorKind::Other
        }
    }
}

/// A single failed attempt, tagged where the failure happened.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AttemptError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AttemptError {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::RateLimited,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Other,
            message: message.into(),
        }
    }

    /// Build an error whose kind is inferred from its text.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ErrorKind::classify_message(&message),
            message,
        }
    }
}

/// Terminal failure: every attempt failed.
#[derive(Debug, Clone, Error)]
#[error("Maximum retry attempts reached ({attempts}){}", last_error_suffix(.last_error))]
pub struct ExhaustedRetriesError {
    pub attempts: u32,
    pub last_error: Option<String>,
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(message) => format!(": {}", message),
        None => String::new(),
    }
}

/// Retry parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempt budget.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Delay after a failure that is not a rate limit.
    pub flat_delay: Duration,
    /// Backoff growth factor per rate-limited failure.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            flat_delay: Duration::from_secs(2),
            multiplier: 1.5,
        }
    }
}

impl TryFrom<&crate::config::RetryConfig> for RetryPolicy {
    type Error = TryFromFloatSecsError;

    fn try_from(config: &crate::config::RetryConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::try_from_secs_f64(config.initial_backoff_secs)?,
            max_backoff: Duration::try_from_secs_f64(config.max_backoff_secs)?,
            flat_delay: Duration::try_from_secs_f64(config.flat_delay_secs)?,
            multiplier: config.backoff_multiplier,
        })
    }
}

/// Loop state for one top-level invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempt: u32,
    /// Delay to apply on the next rate-limited failure.
    pub backoff: Duration,
    /// Position of the current backend in the pool.
    pub backend_index: usize,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 0,
            backoff: policy.initial_backoff,
            backend_index: 0,
        }
    }

    /// State after a failed attempt, and how long to wait before the next one.
    pub fn next(
        &self,
        policy: &RetryPolicy,
        pool: &BackendPool,
        kind: ErrorKind,
    ) -> (Self, Duration) {
        match kind {
            ErrorKind::RateLimited => {
                let grown = self.backoff.as_secs_f64() * policy.multiplier;
                let capped = grown.min(policy.max_backoff.as_secs_f64());
                let next = Self {
                    attempt: self.attempt + 1,
                    backoff: Duration::try_from_secs_f64(capped).unwrap_or(policy.max_backoff),
                    backend_index: pool.next_index(self.backend_index),
                };
                (next, self.backoff.min(policy.max_backoff))
            }
            ErrorKind::Other => {
                let next = Self {
                    attempt: self.attempt + 1,
                    ..self.clone()
                };
                (next, policy.flat_delay)
            }
        }
    }
}

/// A unit of work that can be attempted against a backend.
///
/// Implementations rebuild any backend-dependent configuration from the
/// backend they are handed, so a rotation is seen by the whole job.
pub trait Job: Send {
    type Output: Send;

    fn attempt(&mut self, backend: Backend)
        -> BoxFuture<'_, Result<Self::Output, AttemptError>>;
}

/// Suspends the loop between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, delay: Duration) -> BoxFuture<'_, ()>;
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, delay: Duration) -> BoxFuture<'_, ()> {
        tokio::time::sleep(delay).boxed()
    }
}

/// Successful outcome of [`execute`].
#[derive(Debug, Clone)]
pub struct Completed<T> {
    pub output: T,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// Backend that produced the output.
    pub backend: Backend,
}

/// Run `job` until it succeeds or the attempt budget is spent.
pub async fn execute<J, S>(
    job: &mut J,
    policy: &RetryPolicy,
    pool: &BackendPool,
    sleeper: &S,
) -> Result<Completed<J::Output>, ExhaustedRetriesError>
where
    J: Job + ?Sized,
    S: Sleeper + ?Sized,
{
    let mut state = RetryState::new(policy);
    let mut last_error = None;

    while state.attempt < policy.max_retries {
        let backend = pool.get(state.backend_index).clone();
        debug!(
            "Attempt {}/{} on backend {}",
            state.attempt + 1,
            policy.max_retries,
            backend
        );

        match job.attempt(backend.clone()).await {
            Ok(output) => {
                info!(
                    "Job succeeded on attempt {} using {}",
                    state.attempt + 1,
                    backend
                );
                return Ok(Completed {
                    output,
                    attempts: state.attempt + 1,
                    backend,
                });
            }
            Err(err) => {
                let (next, delay) = state.next(policy, pool, err.kind);
                match err.kind {
                    ErrorKind::RateLimited => warn!(
                        "Rate limited on {}; switching to {} and waiting {:.1}s",
                        backend,
                        pool.get(next.backend_index),
                        delay.as_secs_f64()
                    ),
                    ErrorKind::Other => warn!(
                        "Attempt {} failed: {}; retrying in {:.1}s",
                        state.attempt + 1,
                        err.message,
                        delay.as_secs_f64()
                    ),
                }
                last_error = Some(err.message);
                sleeper.sleep(delay).await;
                state = next;
            }
        }
    }

    error!("Giving up after {} attempts", state.attempt);
    Err(ExhaustedRetriesError {
        attempts: state.attempt,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn delays(&self) -> Vec<Duration> {
            self.delays.lock().unwrap().clone()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, delay: Duration) -> BoxFuture<'_, ()> {
            self.delays.lock().unwrap().push(delay);
            futures::future::ready(()).boxed()
        }
    }

    /// Replays scripted results; repeats `fallback` once the script runs out.
    struct ScriptedJob {
        script: VecDeque<Result<&'static str, AttemptError>>,
        fallback: Result<&'static str, AttemptError>,
        seen: Vec<Backend>,
    }

    impl ScriptedJob {
        fn new(
            script: Vec<Result<&'static str, AttemptError>>,
            fallback: Result<&'static str, AttemptError>,
        ) -> Self {
            Self {
                script: script.into(),
                fallback,
                seen: Vec::new(),
            }
        }

        fn seen_names(&self) -> Vec<&str> {
            self.seen.iter().map(|b| b.name()).collect()
        }
    }

    impl Job for ScriptedJob {
        type Output = &'static str;

        fn attempt(
            &mut self,
            backend: Backend,
        ) -> BoxFuture<'_, Result<&'static str, AttemptError>> {
            self.seen.push(backend);
            let result = self
                .script
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());
            futures::future::ready(result).boxed()
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            ..RetryPolicy::default()
        }
    }

    fn secs(values: &[f64]) -> Vec<Duration> {
        values.iter().map(|v| Duration::from_secs_f64(*v)).collect()
    }

    #[test]
    fn test_classify_message() {
        assert_eq!(
            ErrorKind::classify_message("Error code: 429 - RATE_LIMIT_exceeded"),
            ErrorKind::RateLimited
        );
        assert_eq!(
            ErrorKind::classify_message("connection reset"),
            ErrorKind::Other
        );
        assert_eq!(
            AttemptError::from_message("rate_limit_exceeded").kind,
            ErrorKind::RateLimited
        );
    }

    #[test]
    fn test_exhausted_error_message() {
        let err = ExhaustedRetriesError {
            attempts: 3,
            last_error: Some("boom".to_string()),
        };
        assert_eq!(err.to_string(), "Maximum retry attempts reached (3): boom");

        let err = ExhaustedRetriesError {
            attempts: 0,
            last_error: None,
        };
        assert_eq!(err.to_string(), "Maximum retry attempts reached (0)");
    }

    #[test]
    fn test_next_state_rate_limited() {
        let pool = BackendPool::new(["a", "b"]).unwrap();
        let policy = RetryPolicy::default();
        let state = RetryState::new(&policy);

        let (next, delay) = state.next(&policy, &pool, ErrorKind::RateLimited);
        assert_eq!(delay, Duration::from_secs(1));
        assert_eq!(next.attempt, 1);
        assert_eq!(next.backend_index, 1);
        assert_eq!(next.backoff, Duration::from_secs_f64(1.5));

        let (next, _) = next.next(&policy, &pool, ErrorKind::RateLimited);
        assert_eq!(next.backend_index, 0);
    }

    #[test]
    fn test_next_state_other_keeps_backend_and_backoff() {
        let pool = BackendPool::new(["a", "b"]).unwrap();
        let policy = RetryPolicy::default();
        let state = RetryState {
            attempt: 4,
            backoff: Duration::from_secs(3),
            backend_index: 1,
        };

        let (next, delay) = state.next(&policy, &pool, ErrorKind::Other);
        assert_eq!(delay, Duration::from_secs(2));
        assert_eq!(next.attempt, 5);
        assert_eq!(next.backoff, Duration::from_secs(3));
        assert_eq!(next.backend_index, 1);
    }

    #[test]
    fn test_backoff_follows_growth_and_cap() {
        let pool = BackendPool::new(["a", "b", "c"]).unwrap();
        let policy = RetryPolicy::default();
        let mut state = RetryState::new(&policy);

        for k in 1..=20 {
            state = state.next(&policy, &pool, ErrorKind::RateLimited).0;
            let expected = (1.5f64.powi(k)).min(30.0);
            assert!((state.backoff.as_secs_f64() - expected).abs() < 1e-6);
            assert!(state.backoff <= policy.max_backoff);
        }
    }

    #[tokio::test]
    async fn test_rate_limits_rotate_then_succeed() {
        let pool = BackendPool::new(["A", "B", "C"]).unwrap();
        let sleeper = RecordingSleeper::default();
        let mut job = ScriptedJob::new(
            vec![
                Err(AttemptError::rate_limited("rate_limit_exceeded")),
                Err(AttemptError::rate_limited("rate_limit_exceeded")),
                Ok("report"),
            ],
            Err(AttemptError::other("unexpected extra attempt")),
        );

        let completed = execute(&mut job, &policy(3), &pool, &sleeper).await.unwrap();

        assert_eq!(completed.output, "report");
        assert_eq!(completed.attempts, 3);
        assert_eq!(completed.backend.name(), "C");
        assert_eq!(job.seen_names(), vec!["A", "B", "C"]);
        assert_eq!(sleeper.delays(), secs(&[1.0, 1.5]));
    }

    #[tokio::test]
    async fn test_other_errors_exhaust_without_rotation() {
        let pool = BackendPool::new(["A", "B"]).unwrap();
        let sleeper = RecordingSleeper::default();
        let mut job = ScriptedJob::new(vec![], Err(AttemptError::other("malformed csv")));

        let err = execute(&mut job, &policy(2), &pool, &sleeper)
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 2);
        assert_eq!(err.last_error.as_deref(), Some("malformed csv"));
        assert_eq!(job.seen_names(), vec!["A", "A"]);
        assert_eq!(sleeper.delays(), secs(&[2.0, 2.0]));
    }

    #[tokio::test]
    async fn test_exact_attempt_count_on_persistent_failure() {
        let pool = BackendPool::new(["A"]).unwrap();
        for n in 1..=6 {
            let sleeper = RecordingSleeper::default();
            let mut job = ScriptedJob::new(vec![], Err(AttemptError::other("down")));
            let err = execute(&mut job, &policy(n), &pool, &sleeper)
                .await
                .unwrap_err();
            assert_eq!(err.attempts, n);
            assert_eq!(job.seen.len(), n as usize);
        }
    }

    #[tokio::test]
    async fn test_rotation_is_round_robin() {
        let pool = BackendPool::new(["A", "B", "C"]).unwrap();
        let sleeper = RecordingSleeper::default();
        let mut job = ScriptedJob::new(vec![], Err(AttemptError::rate_limited("rate_limit")));

        execute(&mut job, &policy(7), &pool, &sleeper)
            .await
            .unwrap_err();

        assert_eq!(job.seen_names(), vec!["A", "B", "C", "A", "B", "C", "A"]);
    }

    #[tokio::test]
    async fn test_immediate_success_does_not_sleep() {
        let pool = BackendPool::new(["A", "B"]).unwrap();
        let sleeper = RecordingSleeper::default();
        let mut job = ScriptedJob::new(vec![Ok("done")], Err(AttemptError::other("extra")));

        let completed = execute(&mut job, &policy(10), &pool, &sleeper).await.unwrap();

        assert_eq!(completed.attempts, 1);
        assert_eq!(job.seen.len(), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_mixed_failures_only_rotate_on_rate_limit() {
        let pool = BackendPool::new(["A", "B"]).unwrap();
        let sleeper = RecordingSleeper::default();
        let mut job = ScriptedJob::new(
            vec![
                Err(AttemptError::other("timeout")),
                Err(AttemptError::rate_limited("rate_limit")),
                Err(AttemptError::other("timeout")),
                Ok("ok"),
            ],
            Err(AttemptError::other("extra")),
        );

        let completed = execute(&mut job, &policy(5), &pool, &sleeper).await.unwrap();

        assert_eq!(job.seen_names(), vec!["A", "A", "B", "B"]);
        assert_eq!(completed.attempts, 4);
        assert_eq!(sleeper.delays(), secs(&[2.0, 1.0, 2.0]));
    }

    #[test]
    fn test_zero_budget_never_runs_job() {
        let pool = BackendPool::new(["A"]).unwrap();
        let sleeper = RecordingSleeper::default();
        let mut job = ScriptedJob::new(vec![Ok("never")], Err(AttemptError::other("x")));

        let err = tokio_test::block_on(execute(&mut job, &policy(0), &pool, &sleeper)).unwrap_err();

        assert_eq!(err.attempts, 0);
        assert!(err.last_error.is_none());
        assert!(job.seen.is_empty());
    }
}
