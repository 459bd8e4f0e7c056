//! `reqwest`-backed transport with a bounded connection pool.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use rand::seq::SliceRandom;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::{HttpResponse, Transport};
use crate::config::FetcherConfig;

/// Desktop browser agents one of which is sent when no agent is configured.
pub const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
];

pub fn random_user_agent() -> &'static str {
    BROWSER_USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(BROWSER_USER_AGENTS[0])
}

/// Transport over a shared `reqwest::Client`.
///
/// reqwest only caps idle connections, so open requests are additionally
/// gated by a semaphore of `max_connections` permits; callers beyond that
/// wait for a permit.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    connections: Arc<Semaphore>,
}

impl ReqwestTransport {
    /// Wraps an existing client, allowing at most `max_connections` open requests.
    pub fn new(client: Client, max_connections: usize) -> Self {
        Self {
            client,
            connections: Arc::new(Semaphore::new(max_connections)),
        }
    }

    /// Builds a client from the fetcher settings.
    pub fn from_config(config: &FetcherConfig) -> Result<Self> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| random_user_agent().to_string());
        debug!("Using User-Agent: {}", user_agent);

        let client = Client::builder()
            .user_agent(user_agent)
            .pool_max_idle_per_host(config.max_connections)
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::new(client, config.max_connections))
    }

    /// Connection permits not currently held by a request.
    pub fn available_connections(&self) -> usize {
        self.connections.available_permits()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self))]
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse> {
        let _permit = self
            .connections
            .acquire()
            .await
            .context("Connection pool is shut down")?;

        debug!("GET {}...", url);
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_get_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/page")
            .with_status(200)
            .with_body("<html>hi</html>")
            .create_async()
            .await;

        let transport = ReqwestTransport::new(Client::new(), 2);
        let response = transport
            .get(&format!("{}/page", url), TIMEOUT)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "<html>hi</html>");
    }

    #[tokio::test]
    async fn test_get_server_error_is_a_response() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/page")
            .with_status(503)
            .with_body("busy")
            .create_async()
            .await;

        let transport = ReqwestTransport::new(Client::new(), 2);
        let response = transport
            .get(&format!("{}/page", url), TIMEOUT)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 503);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_get_connection_refused() {
        // Port 9 (discard) is not expected to accept HTTP connections.
        let transport = ReqwestTransport::new(Client::new(), 1);
        let result = transport.get("http://127.0.0.1:9/", TIMEOUT).await;

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to send request"));
    }

    #[tokio::test]
    async fn test_from_config_sends_configured_user_agent() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/")
            .match_header("user-agent", "aiofetch-test")
            .with_status(200)
            .create_async()
            .await;

        let config = FetcherConfig::default().with_user_agent("aiofetch-test");
        let transport = ReqwestTransport::from_config(&config).unwrap();
        let response = transport.get(&url, TIMEOUT).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_from_config_sends_browser_user_agent_by_default() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/")
            .match_header("user-agent", mockito::Matcher::Regex("^Mozilla/5.0".to_string()))
            .with_status(200)
            .create_async()
            .await;

        let transport = ReqwestTransport::from_config(&FetcherConfig::default()).unwrap();
        transport.get(&url, TIMEOUT).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_connection_permits_released_after_request() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .expect(3)
            .create_async()
            .await;

        let transport = ReqwestTransport::new(Client::new(), 1);
        for _ in 0..3 {
            transport.get(&url, TIMEOUT).await.unwrap();
        }

        mock.assert_async().await;
        assert_eq!(transport.available_connections(), 1);
    }

    #[test]
    fn test_random_user_agent_from_pool() {
        for _ in 0..20 {
            assert!(BROWSER_USER_AGENTS.contains(&random_user_agent()));
        }
    }
}
