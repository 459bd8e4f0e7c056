//! Retry loop around a single GET.

use log::{debug, error, info, warn};

use crate::config::{DelayRange, FetcherConfig};
use crate::error::FetchError;
use crate::http::Transport;
use crate::lifecycle::CloseSignal;
use crate::model::{FetchRequest, FetchResult};

/// How many times a URL is attempted and how long to pause in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Pause drawn before every attempt but the first
    pub delay: DelayRange,
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl From<&FetcherConfig> for RetryPolicy {
    fn from(config: &FetcherConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: config.delay_range,
        }
    }
}

/// Fetches one URL, retrying every non-2xx status and transport failure.
///
/// Returns `Err` only for [`FetchError::Closed`]. Running out of attempts
/// is reported inside the result as [`FetchError::Exhausted`].
pub async fn retrying_fetch<T>(
    transport: &T,
    request: &FetchRequest,
    policy: &RetryPolicy,
    signal: &CloseSignal,
) -> Result<FetchResult, FetchError>
where
    T: Transport + ?Sized,
{
    signal.check()?;

    let url = request.url.as_str();
    let max_attempts = policy.max_attempts();
    let mut last_error = None;
    let mut last_status = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            let delay = policy.delay.sample();
            debug!(
                "{}: waiting {}ms before attempt {}/{}",
                url,
                delay.as_millis(),
                attempt,
                max_attempts
            );
            signal.sleep(delay).await?;
        }

        let err = match signal.guard(transport.get(url, request.timeout)).await? {
            Ok(response) if response.is_success() => {
                info!("[Success] {}", url);
                return Ok(FetchResult::success(url, response.status, response.body));
            }
            Ok(response) => {
                last_status = Some(response.status);
                FetchError::HttpStatus(response.status)
            }
            Err(e) => FetchError::from(e),
        };

        warn!("{}: attempt {}/{} failed ({})", url, attempt, max_attempts, err);
        last_error = Some(err);
    }

    let last_error = last_error
        .unwrap_or_else(|| FetchError::Transport("no attempt was made".to_string()));
    error!("Giving up on {} after {} attempts", url, max_attempts);

    Ok(FetchResult::failure(
        url,
        last_status,
        FetchError::Exhausted {
            attempts: max_attempts,
            last_error: Box::new(last_error),
        },
    ))
}
