//! Close signalling shared by a fetcher and every operation it starts.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::FetchError;

/// Owner side: flips the fetcher into the closed state.
#[derive(Debug)]
pub struct CloseHandle {
    tx: watch::Sender<bool>,
}

/// Observer side: lets operations notice the fetcher was closed.
#[derive(Debug, Clone)]
pub struct CloseSignal {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (CloseHandle, CloseSignal) {
    let (tx, rx) = watch::channel(false);
    (CloseHandle { tx }, CloseSignal { rx })
}

impl CloseHandle {
    /// Marks the fetcher closed. Returns `false` if it already was.
    pub fn close(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> CloseSignal {
        CloseSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl CloseSignal {
    pub fn is_closed(&self) -> bool {
        *self.rx.borrow()
    }

    /// Fails with `Closed` if the fetcher has been closed.
    pub fn check(&self) -> Result<(), FetchError> {
        if self.is_closed() {
            Err(FetchError::Closed)
        } else {
            Ok(())
        }
    }

    /// Resolves once the fetcher is closed.
    pub async fn closed(&self) {
        let mut rx = self.rx.clone();
        let observed = rx.wait_for(|closed| *closed).await.is_ok();
        if !observed {
            // Handle dropped without closing: never resolves.
            std::future::pending::<()>().await;
        }
    }

    /// Runs `fut` unless the fetcher is closed first.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, FetchError> {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.closed() => Err(FetchError::Closed),
            output = fut => Ok(output),
        }
    }

    /// Sleeps for `delay`, waking early with `Closed` if the fetcher is closed.
    pub async fn sleep(&self, delay: Duration) -> Result<(), FetchError> {
        if delay.is_zero() {
            return self.check();
        }
        self.guard(tokio::time::sleep(delay)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_close_is_idempotent() {
        let (handle, signal) = channel();
        assert!(!signal.is_closed());
        assert!(handle.close());
        assert!(!handle.close());
        assert!(signal.is_closed());
        assert!(handle.is_closed());
        assert_eq!(signal.check(), Err(FetchError::Closed));
    }

    #[tokio::test]
    async fn test_guard_runs_future_while_open() {
        let (_handle, signal) = channel();
        let output = signal.guard(async { 42 }).await;
        assert_eq!(output, Ok(42));
    }

    #[tokio::test]
    async fn test_guard_rejects_after_close() {
        let (handle, signal) = channel();
        handle.close();
        let output = signal.guard(async { 42 }).await;
        assert_eq!(output, Err(FetchError::Closed));
    }

    #[tokio::test]
    async fn test_sleep_wakes_on_close() {
        let (handle, signal) = channel();
        let start = Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.close();
        });

        let result = signal.sleep(Duration::from_secs(10)).await;
        assert_eq!(result, Err(FetchError::Closed));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_subscribed_signal_sees_close() {
        let (handle, _signal) = channel();
        let late = handle.subscribe();
        handle.close();
        assert!(late.is_closed());
    }
}
