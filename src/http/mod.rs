//! HTTP transport used by the fetcher.
//!
//! The fetcher only needs one capability from an HTTP client: perform a GET
//! and hand back the status and body. [`Transport`] captures that so the
//! retry and batch layers can be driven by a mock in tests.

mod client;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use client::{BROWSER_USER_AGENTS, ReqwestTransport, random_user_agent};

/// Status and decoded body of a completed GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one GET. Non-2xx statuses are returned as responses, not errors;
    /// only failures to obtain a response at all are `Err`.
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse>;
}
