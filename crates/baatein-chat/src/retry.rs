//! Bounded retry for upstream calls.
//!
//! A [`RetryPolicy`] re-runs an async operation while its failures are
//! classified as transient, stopping at whichever comes first: the attempt
//! ceiling or the elapsed-time ceiling. Each attempt is cut off when the time
//! budget runs out, and sleeps are clamped so the policy never waits past it.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use baatein_core::config::{BackoffKind, RetryConfig};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// Doubles from `initial` after every failure, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait after the `failures`-th consecutive failure (1-based).
    pub fn delay(&self, failures: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(failures.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// An attempt still running when the elapsed-time ceiling was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no response within {0:?}")]
pub struct AttemptTimedOut(pub Duration);

/// Outcome of an operation that did not succeed under a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RetryError<E> {
    /// Non-transient failure; returned after the first attempt.
    #[error("{0}")]
    Fatal(E),
    /// Transient failures until a ceiling was reached.
    #[error("retry exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Fatal(_) => 1,
            RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// The last underlying failure.
    pub fn last(&self) -> &E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

/// Attempt and elapsed-time ceilings plus a backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_elapsed: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        let initial = Duration::from_millis(config.initial_backoff_ms);
        let backoff = match config.backoff {
            BackoffKind::Fixed => Backoff::Fixed(initial),
            BackoffKind::Exponential => Backoff::Exponential {
                initial,
                max: Duration::from_millis(config.max_backoff_ms.max(config.initial_backoff_ms)),
            },
        };
        Self {
            max_attempts: config.max_attempts.max(1),
            max_elapsed: Duration::from_secs(config.max_elapsed_secs),
            backoff,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Run `operation` until it succeeds, fails non-transiently, or a
    /// ceiling is reached. An attempt that outlives the time budget is
    /// dropped and reported as `Exhausted` with an [`AttemptTimedOut`] cause.
    pub async fn execute<T, E, F, Fut, C>(
        &self,
        mut operation: F,
        is_transient: C,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
        E: Display + From<AttemptTimedOut>,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let remaining = self.max_elapsed.saturating_sub(started.elapsed());
            let err = match tokio::time::timeout(remaining, operation()).await {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        tracing::debug!(attempts = attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => e,
                Err(_) => {
                    let last = E::from(AttemptTimedOut(self.max_elapsed));
                    tracing::warn!(attempts = attempt, error = %last, "Attempt cut off at time budget");
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last,
                    });
                }
            };

            if !is_transient(&err) {
                return Err(RetryError::Fatal(err));
            }

            let elapsed = started.elapsed();
            if attempt >= self.max_attempts || elapsed >= self.max_elapsed {
                tracing::warn!(
                    attempts = attempt,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "Retry budget exhausted"
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.backoff.delay(attempt).min(self.max_elapsed - elapsed);
            tracing::debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum Failure {
        Transient,
        Fatal,
        TimedOut,
    }

    impl From<AttemptTimedOut> for Failure {
        fn from(_: AttemptTimedOut) -> Self {
            Failure::TimedOut
        }
    }

    impl Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    fn transient(e: &Failure) -> bool {
        *e == Failure::Transient
    }

    #[test]
    fn test_exponential_backoff_caps() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(2),
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(5), Duration::from_millis(1600));
        assert_eq!(backoff.delay(6), Duration::from_secs(2));
        assert_eq!(backoff.delay(60), Duration::from_secs(2));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 20);
        assert_eq!(policy.max_elapsed, Duration::from_secs(10));
        assert_eq!(
            policy.backoff,
            Backoff::Exponential {
                initial: Duration::from_millis(100),
                max: Duration::from_secs(2),
            }
        );

        let config = RetryConfig {
            backoff: BackoffKind::Fixed,
            initial_backoff_ms: 250,
            max_attempts: 0,
            ..RetryConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.backoff, Backoff::Fixed(Duration::from_millis(250)));
        assert_eq!(policy.max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::default()
            .execute(
                || {
                    let calls = &calls;
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        if n <= 4 {
                            Err(Failure::Transient)
                        } else {
                            Ok(n)
                        }
                    }
                },
                transient,
            )
            .await;
        assert_eq!(result, Ok(5));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::default()
            .execute(
                || {
                    let calls = &calls;
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(Failure::Fatal)
                    }
                },
                transient,
            )
            .await;
        assert_eq!(result, Err(RetryError::Fatal(Failure::Fatal)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_ceiling() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default()
            .with_max_attempts(3)
            .with_backoff(Backoff::Fixed(Duration::from_millis(10)));
        let result: Result<(), _> = policy
            .execute(
                || {
                    let calls = &calls;
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(Failure::Transient)
                    }
                },
                transient,
            )
            .await;
        let err = result.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_ceiling_with_default_policy() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let result: Result<(), _> = RetryPolicy::default()
            .execute(
                || {
                    let calls = &calls;
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(Failure::Transient)
                    }
                },
                transient,
            )
            .await;
        let err = result.unwrap_err();
        assert!(err.is_exhausted());
        // 100+200+400+800+1600+2000*3 ms, then the final sleep is clamped.
        assert_eq!(err.attempts(), 10);
        assert!(calls.load(Ordering::SeqCst) < 20);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_clamped_to_budget() {
        let started = Instant::now();
        let policy = RetryPolicy::default()
            .with_max_elapsed(Duration::from_secs(1))
            .with_backoff(Backoff::Fixed(Duration::from_secs(30)));
        let result: Result<(), _> = policy
            .execute(|| async { Err(Failure::Transient) }, transient)
            .await;
        assert_eq!(result.unwrap_err().attempts(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_attempt_cut_off_at_budget() {
        let started = Instant::now();
        let result: Result<(), _> = RetryPolicy::default()
            .execute(std::future::pending::<Result<(), Failure>>, transient)
            .await;
        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 1,
                last: Failure::TimedOut,
            })
        );
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_after_retries_cut_off() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let policy = RetryPolicy::default().with_backoff(Backoff::Fixed(Duration::from_secs(1)));
        let result: Result<(), _> = policy
            .execute(
                || {
                    let calls = &calls;
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                            return Err(Failure::Transient);
                        }
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Err(Failure::Transient)
                    }
                },
                transient,
            )
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 2);
        assert_eq!(*err.last(), Failure::TimedOut);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[test]
    fn test_retry_error_accessors() {
        let err: RetryError<&str> = RetryError::Exhausted {
            attempts: 4,
            last: "503",
        };
        assert_eq!(err.to_string(), "retry exhausted after 4 attempts: 503");
        assert_eq!(*err.last(), "503");
        assert_eq!(err.into_inner(), "503");
        assert_eq!(RetryError::Fatal("401").attempts(), 1);
    }
}
