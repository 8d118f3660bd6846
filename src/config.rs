use std::time::Duration;

use crate::encoding::Encoding;
use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 2575;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// What to do with a message that cannot be represented in the configured
/// encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodingPolicy {
    /// Treat it like a connection fault: drop the connection, back off, retry.
    #[default]
    Reconnect,
    /// Log it and move on to the next message.
    Skip,
}

/// Parameters of one run. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub host: String,
    pub port: u16,
    /// Pause after every successful send.
    pub interval: Duration,
    /// Total messages to send; 0 sends forever.
    pub count: u64,
    /// Zero disables the timeout.
    pub connect_timeout: Duration,
    /// Read and write timeout on the open connection. Zero disables it.
    pub io_timeout: Duration,
    pub ack: bool,
    pub encoding: Encoding,
    pub new_conn_each: bool,
    /// One backoff step; the delay after `k` consecutive faults is
    /// `min(30, 1 + k)` steps.
    pub backoff_unit: Duration,
    pub encoding_policy: EncodingPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            interval: Duration::from_secs(1),
            count: 0,
            connect_timeout: DEFAULT_TIMEOUT,
            io_timeout: DEFAULT_TIMEOUT,
            ack: false,
            encoding: Encoding::Utf8,
            new_conn_each: false,
            backoff_unit: Duration::from_secs(1),
            encoding_policy: EncodingPolicy::Reconnect,
        }
    }
}

/// Converts a command line value in seconds.
pub fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidDuration { name, value })
}

/// `None` for a zero duration, as the socket APIs expect.
pub(crate) fn as_timeout(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_rejects_negative_and_nan() {
        assert_eq!(seconds("interval", 0.25).unwrap(), Duration::from_millis(250));
        assert_eq!(seconds("interval", 0.0).unwrap(), Duration::ZERO);
        assert!(matches!(
            seconds("interval", -1.0),
            Err(ConfigError::InvalidDuration { name: "interval", .. })
        ));
        assert!(seconds("connect timeout", f64::NAN).is_err());
        assert!(seconds("connect timeout", f64::INFINITY).is_err());
    }

    #[test]
    fn zero_timeout_means_blocking() {
        assert_eq!(as_timeout(Duration::ZERO), None);
        assert_eq!(as_timeout(DEFAULT_TIMEOUT), Some(DEFAULT_TIMEOUT));
    }
}
