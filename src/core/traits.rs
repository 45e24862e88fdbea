//! Collaborator traits.
//!
//! The raw network layer is supplied by the host; tinytcp only needs to hand
//! it finished segments.

use std::net::Ipv4Addr;

use super::error::NetworkError;

/// Outbound half of the raw network layer.
///
/// Implementations deliver a complete TCP segment (header plus payload, with
/// the checksum already filled in) to `dst`. Inbound segments are pushed into
/// [`crate::server::ConnectionManager::on_segment`] by the host.
///
/// # Example
///
/// ```
/// use std::net::Ipv4Addr;
/// use tinytcp::core::{Network, NetworkError};
///
/// #[derive(Default)]
/// struct Recorder {
///     sent: Vec<(Vec<u8>, Ipv4Addr)>,
/// }
///
/// impl Network for Recorder {
///     fn send(&mut self, segment: &[u8], dst: Ipv4Addr) -> Result<(), NetworkError> {
///         self.sent.push((segment.to_vec(), dst));
///         Ok(())
///     }
/// }
/// ```
pub trait Network {
    /// Transmit one segment to `dst`.
    fn send(&mut self, segment: &[u8], dst: Ipv4Addr) -> Result<(), NetworkError>;

    /// Whether inbound checksums should be ignored (test networks only).
    fn ignore_checksum(&self) -> bool {
        false
    }
}

impl<N: Network + ?Sized> Network for Box<N> {
    fn send(&mut self, segment: &[u8], dst: Ipv4Addr) -> Result<(), NetworkError> {
        (**self).send(segment, dst)
    }

    fn ignore_checksum(&self) -> bool {
        (**self).ignore_checksum()
    }
}
