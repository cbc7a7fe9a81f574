//! Retry with exponential back-off and jitter for JSON source calls.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

const MAX_DELAY: Duration = Duration::from_secs(60);

/// Transient failures: 429, network errors and 5xx responses. Parse
/// failures and other 4xx responses are returned at once.
fn is_transient(err: &ScraperError) -> bool {
    match err {
        ScraperError::RateLimited { .. } | ScraperError::Http(_) => true,
        ScraperError::UnexpectedStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Wait before retry number `attempt + 1`, before jitter.
///
/// `base * 2^attempt`, capped at [`MAX_DELAY`]. A `Retry-After` hint raises
/// the floor but never past the cap.
fn nominal_delay(attempt: u32, backoff_base_secs: u64, err: &ScraperError) -> Duration {
    let doubled = Duration::from_secs(backoff_base_secs)
        .saturating_mul(1u32 << attempt.min(10))
        .min(MAX_DELAY);
    match err {
        ScraperError::RateLimited {
            retry_after_secs, ..
        } => doubled.max(Duration::from_secs(*retry_after_secs).min(MAX_DELAY)),
        _ => doubled,
    }
}

/// Scale by a random factor in `[0.75, 1.25)`.
fn jitter(delay: Duration) -> Duration {
    delay.mul_f64(0.75 + rand::random::<f64>() * 0.5).min(MAX_DELAY)
}

/// Run `operation`, retrying transient failures up to `max_retries` times.
///
/// With `max_retries = 3` the operation runs at most four times.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && attempt < max_retries => {
                let delay = jitter(nominal_delay(attempt, backoff_base_secs, &err));
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient source error, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
