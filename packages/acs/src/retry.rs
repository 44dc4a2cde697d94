//! Retry with exponential backoff for transient request failures.
//!
//! Every data and dictionary request goes through [`with_backoff`]. The
//! operation is re-run on errors for which [`AcsError::is_transient`] holds
//! (connection failures, timeouts, HTTP 429, HTTP 5xx); any other error is
//! returned immediately.

use std::future::Future;

use crate::{AcsError, RetryConfig};

/// Runs `op` until it succeeds, fails terminally, or `policy.max_attempts`
/// attempts have been made.
///
/// The delay after attempt `n` is `base_delay * 2^(n-1)`, capped at
/// `max_delay`. `label` identifies the request in log output and must not
/// contain secrets.
///
/// # Errors
///
/// Returns the first terminal error, or the last transient error once the
/// attempts are exhausted.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryConfig,
    label: &str,
    mut op: F,
) -> Result<T, AcsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AcsError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    log::debug!("{label}: succeeded on attempt {attempt}/{max_attempts}");
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                log::warn!(
                    "{label}: transient error (attempt {attempt}/{max_attempts}), \
                     retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    log::error!("{label}: giving up after {max_attempts} attempts: {e}");
                }
                return Err(e);
            }
        }
    }
}
