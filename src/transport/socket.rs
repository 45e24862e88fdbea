//! Network collaborators shipped with the crate.
//!
//! - [`MemoryNetwork`] records outbound segments in memory (tests, simulation).
//! - [`ChannelNetwork`] forwards them over a tokio channel to whatever owns
//!   the raw device (requires the `runtime` feature).

use std::net::Ipv4Addr;

use crate::core::{Network, NetworkError};

/// A segment handed to the network layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Finished segment bytes (header, payload, checksum).
    pub segment: Vec<u8>,
    /// Destination address.
    pub dst: Ipv4Addr,
}

/// A segment delivered by the network layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Sender address.
    pub src: Ipv4Addr,
    /// Our address.
    pub dst: Ipv4Addr,
    /// Raw segment bytes.
    pub segment: Vec<u8>,
}

/// In-memory network that records every outbound segment.
#[derive(Debug, Default)]
pub struct MemoryNetwork {
    sent: Vec<Outbound>,
    ignore_checksum: bool,
    fail_send: bool,
}

impl MemoryNetwork {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments sent so far.
    pub fn sent(&self) -> &[Outbound] {
        &self.sent
    }

    /// Drain and return the segments sent so far.
    pub fn take_sent(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.sent)
    }

    /// Ask the stack to skip inbound checksum verification.
    pub fn set_ignore_checksum(&mut self, ignore: bool) {
        self.ignore_checksum = ignore;
    }

    /// Make every subsequent send fail.
    pub fn set_fail_send(&mut self, fail: bool) {
        self.fail_send = fail;
    }
}

impl Network for MemoryNetwork {
    fn send(&mut self, segment: &[u8], dst: Ipv4Addr) -> Result<(), NetworkError> {
        if self.fail_send {
            return Err(NetworkError::Io(std::io::Error::other("simulated send failure")));
        }
        self.sent.push(Outbound {
            segment: segment.to_vec(),
            dst,
        });
        Ok(())
    }

    fn ignore_checksum(&self) -> bool {
        self.ignore_checksum
    }
}

#[cfg(feature = "runtime")]
pub use channel::ChannelNetwork;

#[cfg(feature = "runtime")]
mod channel {
    use std::net::Ipv4Addr;

    use tokio::sync::mpsc;

    use super::Outbound;
    use crate::core::{Network, NetworkError};

    /// Network that forwards outbound segments over an unbounded channel.
    ///
    /// Sending never blocks, so it is safe to call from inside the
    /// single-threaded event loop.
    #[derive(Debug, Clone)]
    pub struct ChannelNetwork {
        tx: mpsc::UnboundedSender<Outbound>,
        ignore_checksum: bool,
    }

    impl ChannelNetwork {
        /// Create the network and the receiver the device side drains.
        pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Self {
                    tx,
                    ignore_checksum: false,
                },
                rx,
            )
        }

        /// Skip inbound checksum verification.
        pub fn ignoring_checksum(mut self, ignore: bool) -> Self {
            self.ignore_checksum = ignore;
            self
        }
    }

    impl Network for ChannelNetwork {
        fn send(&mut self, segment: &[u8], dst: Ipv4Addr) -> Result<(), NetworkError> {
            self.tx
                .send(Outbound {
                    segment: segment.to_vec(),
                    dst,
                })
                .map_err(|_| NetworkError::ChannelClosed)
        }

        fn ignore_checksum(&self) -> bool {
            self.ignore_checksum
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

    #[test]
    fn test_memory_network_records() {
        let mut net = MemoryNetwork::new();
        net.send(b"abc", PEER).expect("send");
        assert_eq!(net.sent().len(), 1);
        assert_eq!(net.sent()[0].dst, PEER);

        let drained = net.take_sent();
        assert_eq!(drained[0].segment, b"abc");
        assert!(net.sent().is_empty());
    }

    #[test]
    fn test_memory_network_failure() {
        let mut net = MemoryNetwork::new();
        net.set_fail_send(true);
        assert!(matches!(net.send(b"x", PEER), Err(NetworkError::Io(_))));
        assert!(net.sent().is_empty());
    }

    #[cfg(feature = "runtime")]
    #[test]
    fn test_channel_network_forwards() {
        let (mut net, mut rx) = ChannelNetwork::new();
        net.send(b"seg", PEER).expect("send");
        let out = rx.try_recv().expect("queued");
        assert_eq!(out.segment, b"seg");
        assert_eq!(out.dst, PEER);

        drop(rx);
        assert!(matches!(net.send(b"seg", PEER), Err(NetworkError::ChannelClosed)));
    }
}
