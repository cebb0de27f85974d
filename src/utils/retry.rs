use crate::error::{HarvestError, Result};
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Runs `f` up to `attempts` times, sleeping `delay * attempt` between tries
///
/// Only [`HarvestError::is_transient`] errors are retried; anything else is
/// returned from the first call. With `attempts == 1` (the default policy)
/// this is a single call.
pub async fn with_retry<F, Fut, T>(f: F, attempts: u32, delay: Duration) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts || !e.is_transient() {
                    return Err(e);
                }
                warn!("Attempt {}/{} failed: {}", attempt, attempts, e);
                sleep(delay * attempt).await;
            }
        }
    }
}
