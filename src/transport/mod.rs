//! tinytcp - Transport Layer
//!
//! Wire-level building blocks shared by the connection manager and sessions:
//!
//! - **Sequence numbers**: [`SeqNum`] with wraparound-aware ordering
//! - **Checksum**: RFC 1071 Internet checksum over the IPv4 pseudo-header
//! - **Segment codec**: [`decode`], [`encode`], [`finalize_checksum`]
//! - **Retransmission timer**: [`RetransmitTimer`], a single deadline slot
//! - **Discard reasons**: [`TransportError`]
//! - **Networks**: [`MemoryNetwork`] and, with `runtime`, [`ChannelNetwork`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Application callbacks           │
//! ├─────────────────────────────────────────┤
//! │    ConnectionManager  /  Session        │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   segments, checksum, seq, timer        │
//! ├─────────────────────────────────────────┤
//! │       Raw IPv4 network (host)           │
//! └─────────────────────────────────────────┘
//! ```

pub mod checksum;
mod error;
mod segment;
mod sequence;
mod socket;
mod timing;

pub use checksum::checksum;
pub use error::*;
pub use segment::*;
pub use sequence::SeqNum;
pub use socket::*;
pub use timing::RetransmitTimer;
