//! Generic exponential-backoff retry shared by every LLM provider.

use std::fmt::Display;
use std::time::Duration;
use tracing::warn;

/// Retries `operation` up to `base_delays.len() + final_retries` times:
/// first the escalating `base_delays` (in seconds), then `final_retries`
/// more attempts at `base_delays`'s own final delay again. The router's
/// default schedule (§4.7: "retried with exponential backoff up to 3
/// attempts") is 2 escalating delays plus 1 final attempt.
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    base_delays: &[u64],
    final_retries: usize,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
{
    let mut last_error = None;
    let total_attempts = base_delays.len() + final_retries;

    for (i, delay_secs) in base_delays.iter().enumerate() {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let attempt = i + 1;
                if attempt < total_attempts {
                    warn!(
                        "llm call failed (attempt {attempt}/{total_attempts}): {e}. retrying after {delay_secs}s"
                    );
                    tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
                }
                last_error = Some(e);
            }
        }
    }

    let final_delay = base_delays.last().copied().unwrap_or(10);
    for i in 0..final_retries {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let attempt = base_delays.len() + i + 1;
                if i < final_retries - 1 {
                    warn!(
                        "llm call failed (attempt {attempt}/{total_attempts}): {e}. retrying after {final_delay}s"
                    );
                    tokio::time::sleep(Duration::from_secs(final_delay)).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.expect("loop ran at least once so an error was recorded"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_on_first_attempt_without_sleeping() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result = retry_with_backoff(
            || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), String>(())
                }
            },
            &[1, 2],
            2,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_every_attempt_before_failing() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result: Result<(), String> = retry_with_backoff(
            || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(String::from("fail"))
                }
            },
            &[0, 0],
            2,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }
}
