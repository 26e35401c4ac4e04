use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Raised when an operation did not settle before its deadline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TimeoutError {
    pub message: String,
    pub after: Duration,
}

impl TimeoutError {
    pub fn new(message: impl Into<String>, after: Duration) -> Self {
        Self {
            message: message.into(),
            after,
        }
    }
}

/// Races `operation` against `timeout`.
///
/// Returns the operation's own result if it settles first, otherwise a
/// `TimeoutError` carrying `message`. The deadline timer is dropped on both
/// paths. The operation is abandoned on timeout; nothing observes its result.
pub async fn call_with_timeout<F, T, E>(
    operation: F,
    timeout: Duration,
    message: &str,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<TimeoutError>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(TimeoutError::new(message, timeout).into()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use futures::task::{waker, ArcWake};
    use tokio::time::Instant;

    use super::*;

    #[derive(Default)]
    struct WakeCounter(AtomicUsize);

    impl ArcWake for WakeCounter {
        fn wake_by_ref(arc_self: &Arc<Self>) {
            arc_self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug, PartialEq)]
    enum TestError {
        Timeout(String),
        Op(&'static str),
    }

    impl From<TimeoutError> for TestError {
        fn from(e: TimeoutError) -> Self {
            TestError::Timeout(e.message)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_operation_times_out_with_message() {
        let started = Instant::now();
        let result: Result<(), TestError> = call_with_timeout(
            std::future::pending(),
            Duration::from_millis(500),
            "Curriculum Timeout",
        )
        .await;

        assert_eq!(result, Err(TestError::Timeout("Curriculum Timeout".into())));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(510), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_operation_returns_its_value() {
        let result: Result<u32, TestError> = call_with_timeout(
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(7)
            },
            Duration::from_secs(1),
            "unused",
        )
        .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_error_is_rethrown() {
        let result: Result<u32, TestError> =
            call_with_timeout(async { Err(TestError::Op("boom")) }, Duration::from_secs(1), "unused")
                .await;
        assert_eq!(result, Err(TestError::Op("boom")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_released_after_early_success() {
        let wakes = Arc::new(WakeCounter::default());
        let waker = waker(wakes.clone());
        let mut cx = Context::from_waker(&waker);

        let mut call = Box::pin(call_with_timeout(
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<u32, TestError>(7)
            },
            Duration::from_secs(1),
            "unused",
        ));
        assert!(call.as_mut().poll(&mut cx).is_pending());

        tokio::time::advance(Duration::from_millis(10)).await;
        for _ in 0..10 {
            if wakes.0.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        let woken = wakes.0.load(Ordering::SeqCst);
        assert!(woken >= 1);
        assert_eq!(call.as_mut().poll(&mut cx), Poll::Ready(Ok(7)));
        drop(call);

        // Past the original deadline: nothing is left to fire.
        tokio::time::advance(Duration::from_secs(2)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(wakes.0.load(Ordering::SeqCst), woken);
    }
}
