//! Error kinds surfaced by the fetcher.

/// Errors produced while fetching.
///
/// `Transport` and `HttpStatus` describe a single failed attempt and are
/// recovered inside the retry loop. Only `Exhausted` (carried inside a
/// [`FetchResult`](crate::FetchResult)) and `Closed` reach callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection, DNS, TLS, timeout or body read failure
    Transport(String),
    /// Server answered with a non-2xx status
    HttpStatus(u16),
    /// Every attempt failed
    Exhausted {
        attempts: u32,
        last_error: Box<FetchError>,
    },
    /// The fetcher was closed before or while the operation ran
    Closed,
    /// Configuration rejected at construction
    InvalidConfig(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Transport(msg) => {
                write!(f, "Transport error: {}", msg)
            }
            FetchError::HttpStatus(status) => {
                write!(f, "HTTP {} error", status)
            }
            FetchError::Exhausted {
                attempts,
                last_error,
            } => {
                write!(
                    f,
                    "Giving up after {} attempts, last error: {}",
                    attempts, last_error
                )
            }
            FetchError::Closed => {
                write!(f, "Fetcher is closed")
            }
            FetchError::InvalidConfig(msg) => {
                write!(f, "Invalid fetcher configuration: {}", msg)
            }
        }
    }
}

impl std::error::Error for FetchError {}

impl From<anyhow::Error> for FetchError {
    fn from(error: anyhow::Error) -> Self {
        // Keep the whole context chain, not just the outermost message.
        FetchError::Transport(format!("{:#}", error))
    }
}
