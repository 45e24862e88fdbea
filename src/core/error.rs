//! Error types shared across tinytcp.

use thiserror::Error;

/// Errors that can occur when decoding a segment header.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SegmentError {
    /// Segment shorter than the fixed header or its declared data offset.
    #[error("segment too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Bytes required.
        expected: usize,
        /// Bytes present.
        actual: usize,
    },

    /// Segment longer than any IPv4 datagram can carry.
    #[error("segment too long: at most {max} bytes, got {actual}")]
    TooLong {
        /// Largest accepted length.
        max: usize,
        /// Bytes present.
        actual: usize,
    },

    /// Data offset below the 5-word minimum.
    #[error("invalid data offset: {0} words")]
    InvalidDataOffset(u8),
}

/// Errors reported to the application by [`crate::server::Session`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The local side already closed its direction of the stream.
    #[error("session closed")]
    Closed,

    /// The retransmission buffer cannot hold the requested bytes.
    #[error("send buffer full: requested {requested} bytes, {available} available")]
    SendBufferFull {
        /// Bytes passed to `send`.
        requested: usize,
        /// Bytes that still fit.
        available: usize,
    },

    /// No session is registered under the given key.
    #[error("unknown session")]
    UnknownSession,
}

/// Errors raised by the network collaborator.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// I/O error from the underlying device.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The receiving side of the segment channel is gone.
    #[error("network channel closed")]
    ChannelClosed,
}

/// Invalid server configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field is out of its allowed range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SegmentError::TooShort {
            expected: 20,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "segment too short: expected at least 20 bytes, got 3"
        );

        let err = SessionError::SendBufferFull {
            requested: 10,
            available: 4,
        };
        assert_eq!(
            err.to_string(),
            "send buffer full: requested 10 bytes, 4 available"
        );

        let err = ConfigError::invalid("mss", "must be non-zero");
        assert_eq!(err.to_string(), "invalid mss: must be non-zero");
    }

    #[test]
    fn test_network_error_from_io() {
        let err: NetworkError = std::io::Error::other("device gone").into();
        assert!(matches!(err, NetworkError::Io(_)));
    }
}
