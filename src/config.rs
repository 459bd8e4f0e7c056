//! Fetcher configuration.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::FetchError;

/// Default number of simultaneously open connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Default number of batch tasks allowed in flight at once.
pub const DEFAULT_CONCURRENT_TASKS: usize = 5;

/// Default retry budget, not counting the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default bounds of the randomized delay in milliseconds.
pub const DEFAULT_MIN_DELAY_MS: u64 = 100;
pub const DEFAULT_MAX_DELAY_MS: u64 = 500;

/// Default per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Closed range a randomized delay is drawn from, in milliseconds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min_ms: millis_ceil(min),
            max_ms: millis_ceil(max),
        }
    }

    /// A range that never sleeps.
    pub fn none() -> Self {
        Self {
            min_ms: 0,
            max_ms: 0,
        }
    }

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Draws a delay uniformly from `[min, max]`.
    pub fn sample(&self) -> Duration {
        if self.min_ms >= self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        let ms = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min_ms: DEFAULT_MIN_DELAY_MS,
            max_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

/// Settings fixed for the whole lifetime of a [`Fetcher`](crate::Fetcher).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FetcherConfig {
    /// Upper bound on open connections in the shared pool
    pub max_connections: usize,
    /// Upper bound on in-flight tasks of a concurrent batch
    pub concurrent_tasks: usize,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Randomized pause between attempts and between batch requests
    pub delay_range: DelayRange,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Fixed User-Agent; a browser agent is picked at random when absent
    pub user_agent: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            concurrent_tasks: DEFAULT_CONCURRENT_TASKS,
            max_retries: DEFAULT_MAX_RETRIES,
            delay_range: DelayRange::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: None,
        }
    }
}

impl FetcherConfig {
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_concurrent_tasks(mut self, concurrent_tasks: usize) -> Self {
        self.concurrent_tasks = concurrent_tasks;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delay_range(mut self, min: Duration, max: Duration) -> Self {
        self.delay_range = DelayRange::new(min, max);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = millis_ceil(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parses a JSON document; missing fields fall back to the defaults.
    pub fn from_json_str(json: &str) -> Result<Self, FetchError> {
        let config: FetcherConfig = serde_json::from_str(json)
            .map_err(|e| FetchError::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `AIOFETCH_*` environment variables.
    pub fn from_env() -> Result<Self, FetchError> {
        let mut config = Self::default();

        if let Some(v) = env_parse::<usize>("AIOFETCH_MAX_CONNECTIONS")? {
            config.max_connections = v;
        }
        if let Some(v) = env_parse::<usize>("AIOFETCH_CONCURRENT_TASKS")? {
            config.concurrent_tasks = v;
        }
        if let Some(v) = env_parse::<u32>("AIOFETCH_MAX_RETRIES")? {
            config.max_retries = v;
        }
        if let Some(v) = env_parse::<u64>("AIOFETCH_MIN_DELAY_MS")? {
            config.delay_range.min_ms = v;
        }
        if let Some(v) = env_parse::<u64>("AIOFETCH_MAX_DELAY_MS")? {
            config.delay_range.max_ms = v;
        }
        if let Some(v) = env_parse::<u64>("AIOFETCH_TIMEOUT_MS")? {
            config.timeout_ms = v;
        }
        if let Ok(agent) = env::var("AIOFETCH_USER_AGENT") {
            config.user_agent = Some(agent);
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the fetcher cannot honor.
    ///
    /// Both limits and the timeout must be non-zero, `concurrent_tasks` may
    /// not exceed `max_connections`, and the delay range may not be inverted.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.max_connections == 0 {
            return Err(FetchError::InvalidConfig(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.concurrent_tasks == 0 {
            return Err(FetchError::InvalidConfig(
                "concurrent_tasks must be at least 1".to_string(),
            ));
        }
        if self.concurrent_tasks > self.max_connections {
            return Err(FetchError::InvalidConfig(format!(
                "concurrent_tasks ({}) exceeds max_connections ({})",
                self.concurrent_tasks, self.max_connections
            )));
        }
        if self.timeout_ms == 0 {
            return Err(FetchError::InvalidConfig(
                "timeout must be at least 1ms".to_string(),
            ));
        }
        if self.delay_range.min_ms > self.delay_range.max_ms {
            return Err(FetchError::InvalidConfig(format!(
                "delay range minimum {}ms is greater than maximum {}ms",
                self.delay_range.min_ms, self.delay_range.max_ms
            )));
        }
        Ok(())
    }
}

/// Whole milliseconds, rounding any sub-millisecond remainder up.
fn millis_ceil(duration: Duration) -> u64 {
    let millis = duration.as_millis();
    let rounded = if duration.subsec_nanos() % 1_000_000 == 0 {
        millis
    } else {
        millis + 1
    };
    u64::try_from(rounded).unwrap_or(u64::MAX)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, FetchError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            FetchError::InvalidConfig(format!("{} is not a valid number: {:?}", key, raw))
        }),
        Err(_) => Ok(None),
    }
}
