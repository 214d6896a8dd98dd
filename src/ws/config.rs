#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use bon::Builder;

const DEFAULT_EVENT_CAPACITY: usize = 1024;
const DEFAULT_REQUEST_TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_INITIAL_BACKOFF_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_MAX_BACKOFF_DURATION: Duration = Duration::from_secs(60);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Configuration shared by a shard manager and the shards it creates.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Capacity of each shard's event channel. Slow receivers past this many
    /// buffered events observe a lag.
    #[builder(default = DEFAULT_EVENT_CAPACITY)]
    pub event_capacity: usize,
    /// How long [`crate::ws::Shard::request`] waits for a reply frame
    #[builder(default = DEFAULT_REQUEST_TIMEOUT_DURATION)]
    pub request_timeout: Duration,
    /// Install a SIGINT/SIGTERM listener that destroys the manager. While installed,
    /// those signals no longer terminate the process on their own.
    #[builder(default)]
    pub shutdown_hook: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Backoff used by [`crate::ws::ShardManager::reconnect`].
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of connection attempts before giving up.
    /// `None` means infinite retries.
    pub max_attempts: Option<u32>,
    /// Initial backoff duration for first reconnection attempt
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_RECONNECT_ATTEMPTS),
            initial_backoff: DEFAULT_INITIAL_BACKOFF_DURATION,
            max_backoff: DEFAULT_MAX_BACKOFF_DURATION,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl ReconnectConfig {
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    #[must_use]
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }
}

impl From<ReconnectConfig> for ExponentialBackoff {
    fn from(config: ReconnectConfig) -> Self {
        ExponentialBackoffBuilder::default()
            .with_initial_interval(config.initial_backoff)
            .with_max_interval(config.max_backoff)
            .with_multiplier(config.backoff_multiplier)
            .with_max_elapsed_time(None) // attempts are counted separately
            .build()
    }
}

#[cfg(test)]
mod tests {
    use backoff::backoff::Backoff as _;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.event_capacity, 1024);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(!config.shutdown_hook);

        let config = Config::builder().shutdown_hook(true).event_capacity(16).build();
        assert!(config.shutdown_hook);
        assert_eq!(config.event_capacity, 16);
        assert_eq!(ReconnectConfig::default().max_attempts, Some(5));
    }

    #[test]
    fn backoff_sequence() {
        let mut backoff: ExponentialBackoff = ReconnectConfig::default().into();

        // Randomized around the initial interval
        let first = backoff.next_backoff().unwrap();
        assert!(first >= Duration::from_millis(500) && first <= Duration::from_millis(1500));
    }

    #[test]
    fn backoff_respects_max() {
        let config = ReconnectConfig::default()
            .with_initial_backoff(Duration::from_secs(1))
            .with_max_backoff(Duration::from_secs(2));
        let mut backoff: ExponentialBackoff = config.into();

        for _ in 0..10 {
            let _next = backoff.next_backoff();
        }

        let duration = backoff.next_backoff().unwrap();
        assert!(duration <= Duration::from_secs(3));
    }
}
