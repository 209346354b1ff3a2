//! Retry with fixed backoff for calls to the archiving service.
//!
//! Both archive stages share one [`RetryPolicy`]. Each attempt reports an
//! [`Attempt`]: either a finished value or a [`RetryReason`]. The policy
//! decides whether another attempt fits the budget and how long to sleep
//! before it.
//!
//! # Backoff
//!
//! ```text
//! delay = base_delay                          (transport, status, structural)
//! delay = base_delay * rate_limit_multiplier  (HTTP 429)
//! ```
//!
//! No sleep happens after the final attempt.
//!
//! # Rate-limit budget
//!
//! By default a 429 response consumes one attempt from the shared budget,
//! like any other failure. With [`RateLimitBudget::Separate`] it draws from
//! its own allowance instead, so a burst of throttling does not exhaust the
//! attempts meant for real failures.

use crate::config::ArchiveSettings;
use crate::errors::ArchiverError;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// HTTP status the archiving service uses for throttling.
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Why an attempt did not produce a value.
#[derive(Debug)]
pub enum RetryReason {
    /// The request never produced a response.
    Transport(ArchiverError),
    /// The response status was not usable.
    Status(u16),
    /// The response arrived but lacked the expected content.
    Structural(String),
}

impl RetryReason {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RetryReason::Status(TOO_MANY_REQUESTS))
    }
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryReason::Transport(e) => write!(f, "{e}"),
            RetryReason::Status(TOO_MANY_REQUESTS) => write!(f, "rate limited (429)"),
            RetryReason::Status(status) => write!(f, "HTTP status {status}"),
            RetryReason::Structural(what) => write!(f, "{what}"),
        }
    }
}

/// Result of a single attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    Retry(RetryReason),
}

/// How HTTP 429 responses are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitBudget {
    /// Every 429 consumes one of `max_attempts`.
    Shared,
    /// 429 responses do not count toward `max_attempts`; at most this many
    /// are tolerated before giving up.
    Separate(u32),
}

/// Bounded retry policy with fixed, status-aware delays.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts allowed before giving up (at least one is always made).
    pub max_attempts: u32,
    /// Delay before the next attempt after an ordinary failure.
    pub base_delay: Duration,
    /// Multiplier applied to `base_delay` after a 429.
    pub rate_limit_multiplier: u32,
    /// Accounting for 429 responses.
    pub rate_limit_budget: RateLimitBudget,
}

impl From<&ArchiveSettings> for RetryPolicy {
    fn from(settings: &ArchiveSettings) -> Self {
        let rate_limit_budget = if settings.rate_limit_counts_toward_budget {
            RateLimitBudget::Shared
        } else {
            RateLimitBudget::Separate(settings.max_rate_limited_retries)
        };
        Self {
            max_attempts: settings.max_retries,
            base_delay: Duration::from_millis(settings.retry_delay_ms),
            rate_limit_multiplier: settings.rate_limit_multiplier,
            rate_limit_budget,
        }
    }
}

impl RetryPolicy {
    /// Delay to apply before retrying after `reason`.
    pub fn delay_for(&self, reason: &RetryReason) -> Duration {
        if reason.is_rate_limited() {
            self.base_delay.saturating_mul(self.rate_limit_multiplier)
        } else {
            self.base_delay
        }
    }

    /// Run `op` until it yields a value or the budget is spent.
    ///
    /// `op` receives the 1-based attempt number. Returns `None` once the
    /// budget is exhausted; every failed attempt is logged under `label`.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let total_t0 = Instant::now();
        let mut counted = 0u32;
        let mut throttled = 0u32;

        loop {
            let attempt = counted + throttled + 1;
            let reason = match op(attempt).await {
                Attempt::Done(value) => {
                    debug!(label, attempt, "Attempt succeeded");
                    return Some(value);
                }
                Attempt::Retry(reason) => reason,
            };

            let more = match self.rate_limit_budget {
                RateLimitBudget::Separate(allowance) if reason.is_rate_limited() => {
                    throttled += 1;
                    throttled <= allowance
                }
                _ => {
                    counted += 1;
                    counted < max_attempts
                }
            };

            if !more {
                warn!(
                    label,
                    attempt,
                    max = max_attempts,
                    elapsed_ms_total = total_t0.elapsed().as_millis(),
                    reason = %reason,
                    "Giving up after exhausting retries"
                );
                return None;
            }

            let delay = self.delay_for(&reason);
            warn!(
                label,
                attempt,
                max = max_attempts,
                ?delay,
                reason = %reason,
                "Attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy(budget: RateLimitBudget) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            rate_limit_multiplier: 2,
            rate_limit_budget: budget,
        }
    }

    #[test]
    fn test_delay_for_rate_limit_is_multiplied() {
        let p = policy(RateLimitBudget::Shared);
        assert_eq!(p.delay_for(&RetryReason::Status(429)), Duration::from_secs(4));
        assert_eq!(p.delay_for(&RetryReason::Status(503)), Duration::from_secs(2));
        assert_eq!(
            p.delay_for(&RetryReason::Structural("missing".into())),
            Duration::from_secs(2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_exactly_max_attempts() {
        let p = policy(RateLimitBudget::Shared);
        let calls = Cell::new(0u32);
        let start = tokio::time::Instant::now();

        let out: Option<()> = p
            .run("test", |_| {
                calls.set(calls.get() + 1);
                async {
                    let down = ArchiverError::Io(std::io::Error::other("down"));
                    Attempt::Retry(RetryReason::Transport(down))
                }
            })
            .await;

        assert!(out.is_none());
        assert_eq!(calls.get(), 3);
        // Two sleeps between three attempts, none after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_then_success_uses_long_delay() {
        let p = policy(RateLimitBudget::Shared);
        let start = tokio::time::Instant::now();

        let out = p
            .run("test", |attempt| async move {
                if attempt == 1 {
                    Attempt::Retry(RetryReason::Status(429))
                } else {
                    Attempt::Done(attempt)
                }
            })
            .await;

        assert_eq!(out, Some(2));
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_budget_counts_rate_limits() {
        let p = policy(RateLimitBudget::Shared);
        let calls = Cell::new(0u32);

        let out: Option<()> = p
            .run("test", |_| {
                calls.set(calls.get() + 1);
                async { Attempt::Retry(RetryReason::Status(429)) }
            })
            .await;

        assert!(out.is_none());
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_budget_does_not_consume_attempts() {
        let p = policy(RateLimitBudget::Separate(2));
        let start = tokio::time::Instant::now();

        // Two throttles and two ordinary failures before success: five
        // attempts, which a shared budget of three would refuse.
        let out = p
            .run("test", |attempt| async move {
                match attempt {
                    1 | 2 => Attempt::Retry(RetryReason::Status(429)),
                    3 | 4 => Attempt::Retry(RetryReason::Status(500)),
                    n => Attempt::Done(n),
                }
            })
            .await;

        assert_eq!(out, Some(5));
        assert_eq!(start.elapsed(), Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_budget_caps_throttling() {
        let p = policy(RateLimitBudget::Separate(1));
        let calls = Cell::new(0u32);

        let out: Option<()> = p
            .run("test", |_| {
                calls.set(calls.get() + 1);
                async { Attempt::Retry(RetryReason::Status(429)) }
            })
            .await;

        assert!(out.is_none());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_policy_from_settings() {
        let mut settings = ArchiveSettings::default();
        let p = RetryPolicy::from(&settings);
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.base_delay, Duration::from_secs(2));
        assert_eq!(p.rate_limit_budget, RateLimitBudget::Shared);

        settings.rate_limit_counts_toward_budget = false;
        settings.max_rate_limited_retries = 5;
        let p = RetryPolicy::from(&settings);
        assert_eq!(p.rate_limit_budget, RateLimitBudget::Separate(5));
    }
}
