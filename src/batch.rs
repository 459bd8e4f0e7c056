//! Batch fetching: one URL at a time, or a bounded number at once.
//!
//! Both forms return exactly one result per input URL, in input order. A
//! URL that runs out of retries shows up as a failed result and the batch
//! carries on; only closing the fetcher aborts a batch.

use futures_util::{FutureExt, StreamExt, stream::FuturesUnordered};
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::http::Transport;
use crate::model::{FetchRequest, FetchResult};

impl<T: Transport> Fetcher<T> {
    /// Fetches `urls` in order, each finishing before the next starts.
    ///
    /// A randomized delay separates consecutive URLs.
    #[tracing::instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn fetch_all_results<S: AsRef<str>>(
        &self,
        urls: &[S],
    ) -> Result<Vec<FetchResult>, FetchError> {
        let signal = self.signal();
        signal.check()?;

        let timeout = self.inner.config.timeout();
        let mut results = Vec::with_capacity(urls.len());

        for (index, url) in urls.iter().enumerate() {
            if index > 0 {
                let delay = self.inner.config.delay_range.sample();
                debug!("Waiting {}ms before next URL", delay.as_millis());
                signal.sleep(delay).await?;
            }

            let request = FetchRequest::new(url.as_ref(), timeout);
            results.push(self.retrying_fetch(&request).await?);
        }

        log_summary(&results);
        Ok(results)
    }

    /// Bodies of [`fetch_all_results`](Self::fetch_all_results); `None` for failed URLs.
    pub async fn fetch_all<S: AsRef<str>>(
        &self,
        urls: &[S],
    ) -> Result<Vec<Option<String>>, FetchError> {
        Ok(into_bodies(self.fetch_all_results(urls).await?))
    }
}

impl<T: Transport + 'static> Fetcher<T> {
    /// Fetches `urls` with at most `concurrent_tasks` of them in flight.
    ///
    /// Each URL runs as its own task. A task holds its worker slot from
    /// its randomized start delay until its last attempt finishes; the
    /// remaining tasks wait for a free slot.
    #[tracing::instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn fetch_all_concurrent_results<S: AsRef<str>>(
        &self,
        urls: &[S],
    ) -> Result<Vec<FetchResult>, FetchError> {
        self.signal().check()?;

        let slots = Arc::new(Semaphore::new(self.inner.config.concurrent_tasks));
        let timeout = self.inner.config.timeout();
        let mut tasks = FuturesUnordered::new();

        for (index, url) in urls.iter().enumerate() {
            let url = url.as_ref().to_string();
            let request = FetchRequest::new(url.clone(), timeout);
            let fetcher = self.clone();
            let slots = Arc::clone(&slots);

            let handle = tokio::spawn(async move {
                let _slot = slots
                    .acquire_owned()
                    .await
                    .map_err(|_| FetchError::Closed)?;

                let delay = fetcher.inner.config.delay_range.sample();
                fetcher.signal().sleep(delay).await?;

                fetcher.retrying_fetch(&request).await
            });

            tasks.push(handle.map(move |joined| (index, url, joined)));
        }

        let mut slots_by_index: Vec<Option<FetchResult>> = vec![None; urls.len()];

        while let Some((index, url, joined)) = tasks.next().await {
            let result = match joined {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => return Err(e),
                Err(join_error) => FetchResult::failure(
                    url,
                    None,
                    FetchError::Transport(format!("Fetch task failed: {}", join_error)),
                ),
            };
            slots_by_index[index] = Some(result);
        }

        let results: Vec<FetchResult> = slots_by_index
            .into_iter()
            .zip(urls)
            .map(|(result, url)| {
                result.unwrap_or_else(|| {
                    FetchResult::failure(
                        url.as_ref(),
                        None,
                        FetchError::Transport("Fetch task produced no result".to_string()),
                    )
                })
            })
            .collect();

        log_summary(&results);
        Ok(results)
    }

    /// Bodies of [`fetch_all_concurrent_results`](Self::fetch_all_concurrent_results).
    pub async fn fetch_all_concurrent<S: AsRef<str>>(
        &self,
        urls: &[S],
    ) -> Result<Vec<Option<String>>, FetchError> {
        Ok(into_bodies(self.fetch_all_concurrent_results(urls).await?))
    }
}

fn into_bodies(results: Vec<FetchResult>) -> Vec<Option<String>> {
    results.into_iter().map(FetchResult::into_body).collect()
}

fn log_summary(results: &[FetchResult]) {
    let succeeded = results.iter().filter(|r| r.is_success()).count();
    info!("Fetched {}/{} URLs successfully", succeeded, results.len());
}
