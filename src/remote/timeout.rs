// SPDX-License-Identifier: GPL-3.0-only

//! Deadline race for remote writes

use super::RemoteResult;
use crate::errors::RemoteError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Race `operation` against a timer
///
/// The operation runs as its own task. If the timer fires first the caller
/// gets [`RemoteError::Timeout`] and the task keeps running to completion in
/// the background; nothing is cancelled.
pub async fn with_timeout<T, F>(operation: &'static str, after: Duration, future: F) -> RemoteResult<T>
where
    F: Future<Output = RemoteResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::spawn(future);
    match tokio::time::timeout(after, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(RemoteError::Aborted(join_error.to_string())),
        Err(_) => {
            debug!(
                operation,
                after_ms = after.as_millis() as u64,
                "Deadline passed, write continues detached"
            );
            Err(RemoteError::Timeout { operation, after })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_fast_operation_wins() {
        let result = with_timeout("probe", Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, RemoteError>("key-1")
        })
        .await;
        assert_eq!(result, Ok("key-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_wins_and_write_keeps_running() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let result = with_timeout("log_scan", Duration::from_millis(10), async move {
            tokio::time::sleep(Duration::from_millis(5_000)).await;
            flag.store(true, Ordering::SeqCst);
            Ok::<_, RemoteError>(())
        })
        .await;

        assert_eq!(
            result,
            Err(RemoteError::Timeout {
                operation: "log_scan",
                after: Duration::from_millis(10),
            })
        );
        assert!(!finished.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_error_passes_through() {
        let result: RemoteResult<()> = with_timeout("probe", Duration::from_secs(1), async {
            Err(RemoteError::Rejected {
                status: 401,
                message: "Permission denied".into(),
            })
        })
        .await;
        assert!(matches!(result, Err(RemoteError::Rejected { status: 401, .. })));
    }
}
