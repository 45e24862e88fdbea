//! Reasons an inbound segment is discarded.
//!
//! A discarded segment produces no reply and no state change, and nothing is
//! surfaced to the application. The reasons are returned so the host can log
//! or count them.

use std::net::SocketAddrV4;

use thiserror::Error;

use super::sequence::SeqNum;
use crate::core::SegmentError;

/// Inbound segment discard reasons.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Header could not be decoded.
    #[error("malformed segment: {0}")]
    Malformed(#[from] SegmentError),

    /// Destination port is not the listening port.
    #[error("segment for port {0} is not ours")]
    WrongPort(u16),

    /// Checksum over the pseudo-header did not verify.
    #[error("bad checksum from {0}")]
    BadChecksum(SocketAddrV4),

    /// No session exists for the segment's 4-tuple.
    #[error("segment for unknown connection {remote} -> {local}")]
    UnknownConnection {
        /// Peer endpoint.
        remote: SocketAddrV4,
        /// Local endpoint.
        local: SocketAddrV4,
    },

    /// SYN for a 4-tuple that already has a session.
    #[error("duplicate SYN from {0}")]
    DuplicateSyn(SocketAddrV4),

    /// Connection table is full.
    #[error("session limit of {0} reached")]
    SessionLimit(usize),

    /// Segment does not start at the next expected sequence number.
    #[error("out-of-order segment: expected seq {expected}, got {got}")]
    OutOfOrder {
        /// `recv_next` of the session.
        expected: SeqNum,
        /// Sequence number carried by the segment.
        got: SeqNum,
    },

}

impl TransportError {
    /// Whether the segment's bytes were damaged or unparseable.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            TransportError::Malformed(_) | TransportError::BadChecksum(_)
        )
    }

    /// Whether a SYN was refused because the connection table is full.
    pub fn is_resource_limit(&self) -> bool {
        matches!(self, TransportError::SessionLimit(_))
    }

    /// Whether the segment passed the manager's checks and was refused by a session.
    pub fn is_session_level(&self) -> bool {
        matches!(self, TransportError::OutOfOrder { .. })
    }
}

/// Result type for inbound segment handling.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn peer() -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 2), 40000)
    }

    #[test]
    fn test_integrity_failures() {
        assert!(TransportError::BadChecksum(peer()).is_integrity_failure());
        assert!(TransportError::from(SegmentError::InvalidDataOffset(1)).is_integrity_failure());
        assert!(!TransportError::WrongPort(81).is_integrity_failure());
        assert!(!TransportError::DuplicateSyn(peer()).is_integrity_failure());
    }

    #[test]
    fn test_resource_limit() {
        assert!(TransportError::SessionLimit(1).is_resource_limit());
        assert!(!TransportError::DuplicateSyn(peer()).is_resource_limit());
    }

    #[test]
    fn test_session_level_errors() {
        assert!(
            TransportError::OutOfOrder {
                expected: SeqNum::new(1),
                got: SeqNum::new(2),
            }
            .is_session_level()
        );
        assert!(!TransportError::WrongPort(1).is_session_level());
        assert!(!TransportError::BadChecksum(peer()).is_session_level());
    }

    #[test]
    fn test_malformed_from_segment_error() {
        let err: TransportError = SegmentError::InvalidDataOffset(2).into();
        assert_eq!(err.to_string(), "malformed segment: invalid data offset: 2 words");
    }
}
