//! Server configuration.

use std::time::Duration;

use crate::core::ConfigError;
use crate::core::constants::{
    DEFAULT_MAX_SESSIONS, DEFAULT_MAX_UNACKED_BYTES, DEFAULT_MSS, DEFAULT_RTO, MAX_PAYLOAD,
};

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listening port. Segments for any other port are discarded.
    pub port: u16,

    /// Maximum payload bytes per outbound segment.
    pub mss: usize,

    /// Retransmission timeout, used for every arm of the timer.
    pub rto: Duration,

    /// Fixed initial send sequence number; `None` draws a random one per connection.
    pub initial_sequence: Option<u32>,

    /// Maximum number of concurrent sessions. Further SYNs are discarded.
    pub max_sessions: usize,

    /// Maximum bytes one session holds for retransmission.
    pub max_unacked_bytes: usize,

    /// Skip inbound checksum verification (testing only).
    pub ignore_checksum: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 7000,
            mss: DEFAULT_MSS,
            rto: DEFAULT_RTO,
            initial_sequence: None,
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_unacked_bytes: DEFAULT_MAX_UNACKED_BYTES,
            ignore_checksum: false,
        }
    }
}

impl ServerConfig {
    /// Configuration listening on `port` with default limits.
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Check that every field is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mss == 0 {
            return Err(ConfigError::invalid("mss", "must be non-zero"));
        }
        if self.mss > MAX_PAYLOAD {
            return Err(ConfigError::invalid(
                "mss",
                format!("{} exceeds the {MAX_PAYLOAD}-byte IPv4 limit", self.mss),
            ));
        }
        if self.rto.is_zero() {
            return Err(ConfigError::invalid("rto", "must be non-zero"));
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::invalid("max_sessions", "must be non-zero"));
        }
        if self.max_unacked_bytes < self.mss {
            return Err(ConfigError::invalid(
                "max_unacked_bytes",
                format!("{} is smaller than one segment ({})", self.max_unacked_bytes, self.mss),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Start from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listening port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the maximum segment size.
    pub fn mss(mut self, mss: usize) -> Self {
        self.config.mss = mss;
        self
    }

    /// Set the retransmission timeout.
    pub fn rto(mut self, rto: Duration) -> Self {
        self.config.rto = rto;
        self
    }

    /// Use a fixed initial sequence number for every connection.
    pub fn initial_sequence(mut self, iss: u32) -> Self {
        self.config.initial_sequence = Some(iss);
        self
    }

    /// Set the maximum number of concurrent sessions.
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.config.max_sessions = max;
        self
    }

    /// Set the per-session retransmission buffer bound.
    pub fn max_unacked_bytes(mut self, max: usize) -> Self {
        self.config.max_unacked_bytes = max;
        self
    }

    /// Skip inbound checksum verification.
    pub fn ignore_checksum(mut self, ignore: bool) -> Self {
        self.config.ignore_checksum = ignore;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mss, 1460);
        assert_eq!(config.rto, Duration::from_millis(500));
        assert_eq!(config.initial_sequence, None);
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = ServerConfigBuilder::new()
            .port(8080)
            .mss(536)
            .rto(Duration::from_millis(200))
            .initial_sequence(4000)
            .max_sessions(4)
            .max_unacked_bytes(4096)
            .ignore_checksum(true)
            .build()
            .expect("valid config");

        assert_eq!(config.port, 8080);
        assert_eq!(config.mss, 536);
        assert_eq!(config.rto, Duration::from_millis(200));
        assert_eq!(config.initial_sequence, Some(4000));
        assert_eq!(config.max_sessions, 4);
        assert_eq!(config.max_unacked_bytes, 4096);
        assert!(config.ignore_checksum);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            ServerConfigBuilder::new().mss(0),
            ServerConfigBuilder::new().mss(70_000),
            ServerConfigBuilder::new().rto(Duration::ZERO),
            ServerConfigBuilder::new().max_sessions(0),
            ServerConfigBuilder::new().mss(1000).max_unacked_bytes(999),
        ];
        for builder in cases {
            assert!(builder.build().is_err());
        }
    }

    #[test]
    fn test_with_port() {
        let config = ServerConfig::with_port(9);
        assert_eq!(config.port, 9);
        assert_eq!(config.max_sessions, DEFAULT_MAX_SESSIONS);
    }
}
