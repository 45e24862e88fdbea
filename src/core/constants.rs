//! Protocol constants for the tinytcp wire format and default timing.
//!
//! Wire values are fixed by TCP framing and MUST NOT be changed. Defaults are
//! only the starting point of [`crate::server::ServerConfig`].

use std::time::Duration;

// =============================================================================
// HEADER LAYOUT
// =============================================================================

/// Length of a TCP header without options.
pub const HEADER_LEN: usize = 20;

/// Data offset (in 32-bit words) written into every header we emit.
pub const HEADER_WORDS: u16 = (HEADER_LEN / 4) as u16;

/// Byte offset of the 16-bit checksum field inside the header.
pub const CHECKSUM_OFFSET: usize = 16;

/// IP protocol number carried in the checksum pseudo-header.
pub const IPPROTO_TCP: u8 = 6;

/// Largest payload that fits in a single IPv4 datagram after both headers.
pub const MAX_PAYLOAD: usize = 65535 - 20 - HEADER_LEN;

/// Largest segment (header plus payload) that fits in a single IPv4 datagram.
pub const MAX_SEGMENT_LEN: usize = HEADER_LEN + MAX_PAYLOAD;

// =============================================================================
// CONTROL FLAGS (low bits of the data-offset/flags word)
// =============================================================================

/// No more data from sender.
pub const FLAGS_FIN: u16 = 0x01;

/// Synchronize sequence numbers.
pub const FLAGS_SYN: u16 = 0x02;

/// Reset the connection. Decoded but never acted on.
pub const FLAGS_RST: u16 = 0x04;

/// Push function.
pub const FLAGS_PSH: u16 = 0x08;

/// Acknowledgment field is significant.
pub const FLAGS_ACK: u16 = 0x10;

// =============================================================================
// DEFAULTS
// =============================================================================

/// Maximum segment size: Ethernet MTU minus IPv4 and TCP headers.
pub const DEFAULT_MSS: usize = 1460;

/// Retransmission timeout used at every arm site.
pub const DEFAULT_RTO: Duration = Duration::from_millis(500);

/// Receive window advertised in every outbound header.
pub const DEFAULT_WINDOW: u16 = 0xFFFF;

/// Maximum number of concurrent sessions in the connection table.
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Maximum bytes a session holds for retransmission.
pub const DEFAULT_MAX_UNACKED_BYTES: usize = 1 << 20;
