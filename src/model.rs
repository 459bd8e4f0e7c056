use std::time::Duration;

use crate::error::FetchError;

/// A single GET to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

/// Outcome of fetching one URL, produced exactly once per input URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub url: String,
    pub body: Option<String>,
    /// Status of the successful response, or of the last response seen
    pub status: Option<u16>,
    pub error: Option<FetchError>,
}

impl FetchResult {
    pub fn success(url: impl Into<String>, status: u16, body: String) -> Self {
        Self {
            url: url.into(),
            body: Some(body),
            status: Some(status),
            error: None,
        }
    }

    pub fn failure(url: impl Into<String>, status: Option<u16>, error: FetchError) -> Self {
        Self {
            url: url.into(),
            body: None,
            status,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_body(self) -> Option<String> {
        self.body
    }
}
