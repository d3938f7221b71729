//! Integration tests for the bounded fetcher
//!
//! Covers the retry budget, timeout handling, the admission bound and result
//! ordering.

use core_runtime::config::FetchSettings;
use core_sync::BoundedFetcher;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Clone, PartialEq)]
enum FakeError {
    Transient,
    Fatal,
}

impl std::fmt::Display for FakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FakeError::Transient => write!(f, "transient failure"),
            FakeError::Fatal => write!(f, "fatal failure"),
        }
    }
}

fn is_transient(e: &FakeError) -> bool {
    matches!(e, FakeError::Transient)
}

fn fast_settings() -> FetchSettings {
    FetchSettings::default()
        .with_max_attempts(5)
        .with_base_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(4))
        .with_attempt_timeout(Duration::from_secs(5))
}

/// Fails the first `failures` calls, then succeeds.
struct FlakyOperation {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyOperation {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    async fn call(&self, item: u32) -> Result<u32, FakeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            Err(FakeError::Transient)
        } else {
            Ok(item * 10)
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn test_succeeds_within_budget() {
    let fetcher = BoundedFetcher::new(fast_settings());
    let op = FlakyOperation::new(3);

    let report = fetcher
        .fetch_all(vec![4], |item| op.call(item), is_transient)
        .await;

    assert_eq!(report.outcomes[0].value, Some(40));
    assert_eq!(report.outcomes[0].attempts, 4);
    assert_eq!(op.calls(), 4);
}

#[tokio::test]
async fn test_exhausted_budget_is_absent() {
    let fetcher = BoundedFetcher::new(fast_settings());
    let op = FlakyOperation::new(6);

    let report = fetcher
        .fetch_all(vec![1], |item| op.call(item), is_transient)
        .await;

    assert_eq!(report.outcomes[0].value, None);
    assert_eq!(report.outcomes[0].attempts, 5);
    assert_eq!(
        report.outcomes[0].last_error.as_deref(),
        Some("transient failure")
    );
    assert_eq!(op.calls(), 5);
    assert_eq!(report.failed(), 1);
}

#[tokio::test]
async fn test_non_retryable_fails_once() {
    let fetcher = BoundedFetcher::new(fast_settings());
    let calls = AtomicU32::new(0);

    let report = fetcher
        .fetch_all(
            vec![1, 2],
            |item| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if item == 1 {
                        Err(FakeError::Fatal)
                    } else {
                        Ok(item)
                    }
                }
            },
            is_transient,
        )
        .await;

    assert_eq!(report.into_values(), vec![None, Some(2)]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_timeout_is_retried() {
    let fetcher = BoundedFetcher::new(
        fast_settings()
            .with_max_attempts(3)
            .with_attempt_timeout(Duration::from_millis(20)),
    );
    let calls = AtomicU32::new(0);

    let report = fetcher
        .fetch_all(
            vec![7],
            |item| {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if call == 1 {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                    }
                    Ok::<_, FakeError>(item)
                }
            },
            |_| false,
        )
        .await;

    assert_eq!(report.outcomes[0].value, Some(7));
    assert_eq!(report.outcomes[0].attempts, 2);
}

#[tokio::test]
async fn test_admission_bound() {
    let fetcher = BoundedFetcher::new(fast_settings().with_max_in_flight(3));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let report = fetcher
        .fetch_all(
            (0..10).collect(),
            |item: u32| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, FakeError>(item)
                }
            },
            is_transient,
        )
        .await;

    assert_eq!(report.succeeded(), 10);
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(peak.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_results_keep_input_order() {
    let fetcher = BoundedFetcher::new(fast_settings().with_max_in_flight(4));
    let completion_order = AsyncMutex::new(Vec::new());

    let report = fetcher
        .fetch_all(
            vec![5u64, 1, 4, 2, 3],
            |item| {
                let completion_order = &completion_order;
                async move {
                    tokio::time::sleep(Duration::from_millis(item * 5)).await;
                    completion_order.lock().await.push(item);
                    Ok::<_, FakeError>(item)
                }
            },
            is_transient,
        )
        .await;

    assert_eq!(
        report.into_values(),
        vec![Some(5), Some(1), Some(4), Some(2), Some(3)]
    );
    assert_ne!(*completion_order.lock().await, vec![5, 1, 4, 2, 3]);
}
