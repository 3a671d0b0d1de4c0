use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retries an async operation while `should_retry` accepts its error
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay`: Pause between attempts
/// - `should_retry`: Decides whether an error is worth another attempt
///
/// # Returns
/// Either the successful result or the last error
pub async fn with_retry<F, Fut, T, E>(
    mut operation: F,
    retries: usize,
    delay: Duration,
    should_retry: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) if attempt <= retries && should_retry(&err) => {
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt,
                    retries + 1,
                    err
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Connection failures and timeouts are worth retrying, HTTP answers are not.
pub fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}
