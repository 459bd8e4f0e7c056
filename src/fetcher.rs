//! The fetcher handle: configuration, shared transport and lifecycle.

use log::debug;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::FetcherConfig;
use crate::error::FetchError;
use crate::http::{ReqwestTransport, Transport};
use crate::lifecycle::{self, CloseHandle, CloseSignal};
use crate::model::{FetchRequest, FetchResult};
use crate::retry::{self, RetryPolicy};

/// Fetches URLs with retry, sequential and bounded-concurrency batching.
///
/// Clones share the transport and the open/closed state. The transport is
/// released by [`close`](Fetcher::close), or when the last clone is dropped.
pub struct Fetcher<T: Transport = ReqwestTransport> {
    pub(crate) inner: Arc<Inner<T>>,
}

pub(crate) struct Inner<T> {
    pub(crate) config: FetcherConfig,
    transport: Mutex<Option<Arc<T>>>,
    close: CloseHandle,
}

impl<T: Transport> Clone for Fetcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Fetcher<ReqwestTransport> {
    /// Validates `config` and opens a `reqwest` connection pool for it.
    #[tracing::instrument]
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        config.validate()?;
        let transport = ReqwestTransport::from_config(&config)
            .map_err(|e| FetchError::InvalidConfig(format!("{:#}", e)))?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Fetcher<T> {
    /// Builds a fetcher over any transport.
    pub fn with_transport(config: FetcherConfig, transport: T) -> Result<Self, FetchError> {
        config.validate()?;
        debug!(
            "Creating fetcher: {} connections, {} concurrent tasks, {} retries, {}-{}ms delay",
            config.max_connections,
            config.concurrent_tasks,
            config.max_retries,
            config.delay_range.min_ms,
            config.delay_range.max_ms
        );

        let (close, _signal) = lifecycle::channel();
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                transport: Mutex::new(Some(Arc::new(transport))),
                close,
            }),
        })
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.close.is_closed()
    }

    /// Closes the fetcher and releases its transport.
    ///
    /// Operations started afterwards fail with [`FetchError::Closed`] and
    /// operations still in flight stop at their next I/O or delay. Calling
    /// this again has no effect.
    pub fn close(&self) {
        if !self.inner.close.close() {
            debug!("Fetcher already closed");
            return;
        }

        let released = self
            .inner
            .transport
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if released.is_some() {
            debug!("Fetcher closed, transport released");
        }
    }

    pub(crate) fn signal(&self) -> CloseSignal {
        self.inner.close.subscribe()
    }

    fn transport(&self) -> Result<Arc<T>, FetchError> {
        self.inner
            .transport
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(FetchError::Closed)
    }

    /// Fetches one URL with retries and reports the full outcome.
    ///
    /// The only error is [`FetchError::Closed`]; exhausting the retry budget
    /// yields a result whose `error` is [`FetchError::Exhausted`].
    #[tracing::instrument(skip(self))]
    pub async fn retrying_fetch(&self, request: &FetchRequest) -> Result<FetchResult, FetchError> {
        let transport = self.transport()?;
        let policy = RetryPolicy::from(&self.inner.config);
        retry::retrying_fetch(transport.as_ref(), request, &policy, &self.signal()).await
    }

    /// Fetches one URL with the configured timeout; `None` once retries run out.
    pub async fn fetch(&self, url: &str) -> Result<Option<String>, FetchError> {
        self.fetch_with_timeout(url, self.inner.config.timeout()).await
    }

    pub async fn fetch_with_timeout(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<Option<String>, FetchError> {
        let request = FetchRequest::new(url, timeout);
        Ok(self.retrying_fetch(&request).await?.into_body())
    }
}

/// Runs `f` with a fresh fetcher and closes it afterwards.
pub async fn with_fetcher<F, Fut, R>(config: FetcherConfig, f: F) -> Result<R, FetchError>
where
    F: FnOnce(Fetcher) -> Fut,
    Fut: Future<Output = R>,
{
    let fetcher = Fetcher::new(config)?;
    let output = f(fetcher.clone()).await;
    fetcher.close();
    Ok(output)
}
