//! # Bounded Concurrency Fetcher
//!
//! Runs a fallible async operation over a batch of work items with:
//! - an admission gate capping the number of attempts in flight
//! - a per-attempt timeout
//! - exponential backoff with jitter between attempts
//! - a fixed attempt budget per item
//!
//! Per-item failures never escape the batch. An item whose attempts are
//! exhausted, or whose failure is not retryable, resolves to an absent value
//! and the batch carries on. Results come back in input order regardless of
//! completion order.
//!
//! A permit is held only while an attempt runs, so an item sleeping through
//! its backoff does not block other items from being admitted.

use core_runtime::config::FetchSettings;
use futures::future::join_all;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Result of one work item.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome<T> {
    /// The value, or `None` when the item was given up on
    pub value: Option<T>,
    /// Attempts made, including the successful one
    pub attempts: u32,
    /// Last failure message, when the item was given up on
    pub last_error: Option<String>,
}

impl<T> FetchOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.value.is_some()
    }
}

/// Aggregated result of a batch, one outcome per input item in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport<T> {
    pub outcomes: Vec<FetchOutcome<T>>,
}

impl<T> FetchReport<T> {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Values in input order; `None` marks an item that was given up on.
    pub fn into_values(self) -> Vec<Option<T>> {
        self.outcomes.into_iter().map(|o| o.value).collect()
    }
}

enum AttemptError<E> {
    Failed(E),
    TimedOut(Duration),
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Failed(e) => write!(f, "{}", e),
            AttemptError::TimedOut(after) => write!(f, "attempt timed out after {:?}", after),
        }
    }
}

/// Retrying executor with an admission limit.
///
/// One fetcher is built per class of remote call (enrichment, embedding) from
/// its [`FetchSettings`].
#[derive(Debug)]
pub struct BoundedFetcher {
    settings: FetchSettings,
    admission: Semaphore,
}

impl BoundedFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        let admission = Semaphore::new(settings.max_in_flight.max(1));
        Self {
            settings,
            admission,
        }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Runs `operation` over every item.
    ///
    /// `is_retryable` decides whether a failure is worth another attempt.
    /// Timeouts are always retryable.
    pub async fn fetch_all<I, T, E, F, Fut, R>(
        &self,
        items: Vec<I>,
        operation: F,
        is_retryable: R,
    ) -> FetchReport<T>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        R: Fn(&E) -> bool,
    {
        let operation = &operation;
        let is_retryable = &is_retryable;

        let outcomes = join_all(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| self.fetch_one(index, item, operation, is_retryable)),
        )
        .await;

        FetchReport { outcomes }
    }

    async fn fetch_one<I, T, E, F, Fut, R>(
        &self,
        index: usize,
        item: I,
        operation: &F,
        is_retryable: &R,
    ) -> FetchOutcome<T>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        R: Fn(&E) -> bool,
    {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = {
                let _permit = match self.admission.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return FetchOutcome {
                            value: None,
                            attempts: attempt - 1,
                            last_error: Some("admission gate closed".to_string()),
                        }
                    }
                };

                match timeout(self.settings.attempt_timeout, operation(item.clone())).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(AttemptError::Failed(e)),
                    Err(_) => Err(AttemptError::TimedOut(self.settings.attempt_timeout)),
                }
            };

            let error = match result {
                Ok(value) => {
                    return FetchOutcome {
                        value: Some(value),
                        attempts: attempt,
                        last_error: None,
                    }
                }
                Err(error) => error,
            };

            let retryable = match &error {
                AttemptError::Failed(e) => is_retryable(e),
                AttemptError::TimedOut(_) => true,
            };

            if !retryable || attempt >= max_attempts {
                warn!(
                    item = index,
                    attempts = attempt,
                    retryable,
                    error = %error,
                    "Giving up on item"
                );
                return FetchOutcome {
                    value: None,
                    attempts: attempt,
                    last_error: Some(error.to_string()),
                };
            }

            let delay = self.backoff_delay(attempt);
            debug!(
                item = index,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Attempt failed, retrying"
            );
            sleep(delay).await;
        }
    }

    /// Backoff after the given failed attempt (1-based), jitter included.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let (min, max) = self.settings.jitter;
        let factor = if min < max {
            rand::rng().random_range(min..=max)
        } else {
            min
        };
        compute_backoff(&self.settings, attempt, factor)
    }
}

/// `min(max_delay, base_delay * 2^(attempt - 1)) * factor`
pub fn compute_backoff(settings: &FetchSettings, attempt: u32, factor: f64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let multiplier = 2u32.pow(exponent);

    let delay = settings
        .base_delay
        .checked_mul(multiplier)
        .unwrap_or(settings.max_delay)
        .min(settings.max_delay);

    delay.mul_f64(factor.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> FetchSettings {
        FetchSettings::default()
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(30))
    }

    #[test]
    fn test_compute_backoff_doubles() {
        let s = settings();
        assert_eq!(compute_backoff(&s, 1, 1.0), Duration::from_secs(1));
        assert_eq!(compute_backoff(&s, 2, 1.0), Duration::from_secs(2));
        assert_eq!(compute_backoff(&s, 3, 1.0), Duration::from_secs(4));
        assert_eq!(compute_backoff(&s, 5, 1.0), Duration::from_secs(16));
    }

    #[test]
    fn test_compute_backoff_caps() {
        let s = settings();
        assert_eq!(compute_backoff(&s, 6, 1.0), Duration::from_secs(30));
        assert_eq!(compute_backoff(&s, 40, 1.0), Duration::from_secs(30));
        assert_eq!(compute_backoff(&s, u32::MAX, 1.0), Duration::from_secs(30));
    }

    #[test]
    fn test_compute_backoff_applies_jitter() {
        let s = settings();
        assert_eq!(compute_backoff(&s, 2, 0.8), Duration::from_millis(1600));
        assert_eq!(compute_backoff(&s, 2, 1.2), Duration::from_millis(2400));
    }

    #[test]
    fn test_backoff_delay_stays_in_jitter_range() {
        let fetcher = BoundedFetcher::new(settings());
        for _ in 0..50 {
            let delay = fetcher.backoff_delay(3);
            assert!(delay >= Duration::from_millis(3200), "{:?}", delay);
            assert!(delay <= Duration::from_millis(4800), "{:?}", delay);
        }
    }

    #[test]
    fn test_report_counts() {
        let report = FetchReport {
            outcomes: vec![
                FetchOutcome {
                    value: Some(1),
                    attempts: 1,
                    last_error: None,
                },
                FetchOutcome {
                    value: None,
                    attempts: 5,
                    last_error: Some("boom".to_string()),
                },
            ],
        };

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.into_values(), vec![Some(1), None]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let fetcher = BoundedFetcher::new(settings());
        let report = fetcher
            .fetch_all(Vec::<u32>::new(), |n| async move { Ok::<_, String>(n) }, |_| true)
            .await;
        assert!(report.is_empty());
    }
}
