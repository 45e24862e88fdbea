//! # tinytcp
//!
//! The server half of a simplified, reliable, in-order TCP that runs directly
//! over a raw IPv4 segment layer. It provides:
//!
//! - **Passive open**: SYN in, SYN+ACK out, one [`Session`] per 4-tuple
//! - **Strict in-order receive**: a segment is admitted only at `recv_next`
//! - **Cumulative acknowledgment** of outbound data
//! - **Timeout retransmission** of the oldest unacknowledged chunk
//! - **Close** in either direction, with end-of-stream signalled as an empty delivery
//!
//! There is no flow or congestion control, no selective acknowledgment and no
//! reordering buffer. The core is sans-IO: every event carries an explicit
//! `now`, and the host asks for the next timer deadline.
//!
//! ## Feature Flags
//!
//! - `runtime` (default): tokio-hosted [`server::Driver`] and
//!   [`transport::ChannelNetwork`]
//!
//! ## Modules
//!
//! - [`core`]: constants, error types and the [`core::Network`] trait
//! - [`transport`]: segment codec, checksum, sequence numbers, retransmission timer
//! - [`server`]: connection manager, sessions, configuration and the driver
//!
//! ## Example Usage
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use std::time::Instant;
//!
//! use tinytcp::prelude::*;
//!
//! let config = ServerConfigBuilder::new().port(7000).initial_sequence(1).build()?;
//! let mut manager = ConnectionManager::new(config, MemoryNetwork::new())?;
//! manager.on_connection(|session| {
//!     session.on_data(|session, data| {
//!         if !data.is_empty() {
//!             let _ = session.send(data);
//!         }
//!     });
//! });
//!
//! let peer = Ipv4Addr::new(10, 0, 0, 2);
//! let local = Ipv4Addr::new(10, 0, 0, 1);
//! let syn = SegmentBuilder::new(40000, 7000)
//!     .seq(SeqNum::new(100))
//!     .flags(Flags::SYN)
//!     .build(peer, local);
//! manager.on_segment(peer, local, &syn, Instant::now())?;
//!
//! let reply = &manager.network().sent()[0];
//! let header = decode(&reply.segment)?;
//! assert_eq!(header.flags(), Flags::SYN | Flags::ACK);
//! assert_eq!(header.ack, SeqNum::new(101));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;
pub mod server;
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::server::{
        ConnectionKey, ConnectionManager, ServerConfig, ServerConfigBuilder, Session,
        SessionState,
    };
    #[cfg(feature = "runtime")]
    pub use crate::server::{Driver, DriverError, DriverHandle};

    pub use crate::transport::{
        Flags, Inbound, MemoryNetwork, Outbound, SegmentBuilder, SegmentHeader, SeqNum,
        TransportError, TransportResult, decode, encode, finalize_checksum,
    };
    #[cfg(feature = "runtime")]
    pub use crate::transport::ChannelNetwork;
}

// Re-export commonly used items at crate root
pub use crate::core::{Network, NetworkError, SessionError};
pub use server::{ConnectionKey, ConnectionManager, ServerConfig, Session};
pub use transport::{SeqNum, TransportError};
