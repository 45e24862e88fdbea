//! Segment header encoding and decoding.
//!
//! Wire format (20 bytes, no options emitted; options on inbound segments are
//! skipped via the data offset):
//! ```text
//! +----------------+----------------+
//! | Source port    | Dest port      |
//! +----------------+----------------+
//! | Sequence number                 |
//! +---------------------------------+
//! | Acknowledgment number           |
//! +----+-----------+----------------+
//! |Off | Flags     | Window         |
//! +----+-----------+----------------+
//! | Checksum       | Urgent pointer |
//! +----------------+----------------+
//! ```
//! The 16-bit `Off|Flags` word carries the header length in its high nibble,
//! in 32-bit words; the payload begins at `4 * (word >> 12)`.

use std::fmt;
use std::net::Ipv4Addr;
use std::ops::{BitOr, BitOrAssign};

use super::checksum;
use super::sequence::SeqNum;
use crate::core::SegmentError;
use crate::core::constants::{
    CHECKSUM_OFFSET, DEFAULT_WINDOW, FLAGS_ACK, FLAGS_FIN, FLAGS_PSH, FLAGS_RST, FLAGS_SYN,
    HEADER_LEN, HEADER_WORDS, MAX_SEGMENT_LEN,
};

/// Control flags (the low bits of the offset/flags word).
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Flags(u16);

impl Flags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Sender finished.
    pub const FIN: Self = Self(FLAGS_FIN);
    /// Open request.
    pub const SYN: Self = Self(FLAGS_SYN);
    /// Reset.
    pub const RST: Self = Self(FLAGS_RST);
    /// Push.
    pub const PSH: Self = Self(FLAGS_PSH);
    /// Acknowledgment field valid.
    pub const ACK: Self = Self(FLAGS_ACK);

    /// Mask of the bits that are control flags rather than data offset.
    const MASK: u16 = 0x01FF;

    /// Extract the control flags from a raw offset/flags word.
    pub const fn from_word(word: u16) -> Self {
        Self(word & Self::MASK)
    }

    /// Raw flag bits.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Whether every flag in `other` is set.
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Flags, &str); 5] = [
            (Flags::SYN, "SYN"),
            (Flags::ACK, "ACK"),
            (Flags::FIN, "FIN"),
            (Flags::RST, "RST"),
            (Flags::PSH, "PSH"),
        ];
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("-")?;
        }
        Ok(())
    }
}

/// Decoded segment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Source port.
    pub src_port: u16,
    /// Destination port.
    pub dst_port: u16,
    /// Sequence number of the first payload byte (or of the SYN/FIN).
    pub seq: SeqNum,
    /// Next sequence number the sender expects, if ACK is set.
    pub ack: SeqNum,
    /// Raw offset/flags word.
    pub offset_flags: u16,
    /// Advertised receive window.
    pub window: u16,
    /// Checksum as carried on the wire.
    pub checksum: u16,
    /// Urgent pointer.
    pub urgent: u16,
}

impl SegmentHeader {
    /// Control flags.
    pub fn flags(&self) -> Flags {
        Flags::from_word(self.offset_flags)
    }

    /// Header length in bytes, i.e. where the payload starts.
    pub fn header_len(&self) -> usize {
        4 * (self.offset_flags >> 12) as usize
    }

    /// Payload of `segment`, which must be the bytes this header was decoded from.
    pub fn payload<'a>(&self, segment: &'a [u8]) -> &'a [u8] {
        &segment[self.header_len()..]
    }
}

/// Decode the header of `segment`.
///
/// Fails if the segment is shorter than a bare header or longer than an IPv4
/// datagram allows, if the data offset is below five words, or if it points
/// past the end of the segment.
pub fn decode(segment: &[u8]) -> Result<SegmentHeader, SegmentError> {
    if segment.len() > MAX_SEGMENT_LEN {
        return Err(SegmentError::TooLong {
            max: MAX_SEGMENT_LEN,
            actual: segment.len(),
        });
    }
    if segment.len() < HEADER_LEN {
        return Err(SegmentError::TooShort {
            expected: HEADER_LEN,
            actual: segment.len(),
        });
    }

    let word = |at: usize| u16::from_be_bytes([segment[at], segment[at + 1]]);
    let long = |at: usize| {
        u32::from_be_bytes([
            segment[at],
            segment[at + 1],
            segment[at + 2],
            segment[at + 3],
        ])
    };

    let header = SegmentHeader {
        src_port: word(0),
        dst_port: word(2),
        seq: SeqNum::new(long(4)),
        ack: SeqNum::new(long(8)),
        offset_flags: word(12),
        window: word(14),
        checksum: word(16),
        urgent: word(18),
    };

    let words = (header.offset_flags >> 12) as u8;
    if (words as u16) < HEADER_WORDS {
        return Err(SegmentError::InvalidDataOffset(words));
    }
    if header.header_len() > segment.len() {
        return Err(SegmentError::TooShort {
            expected: header.header_len(),
            actual: segment.len(),
        });
    }

    Ok(header)
}

/// Encode a 20-byte header with a zero checksum.
pub fn encode(src_port: u16, dst_port: u16, seq: SeqNum, ack: SeqNum, flags: Flags) -> [u8; HEADER_LEN] {
    let mut buf = [0u8; HEADER_LEN];
    buf[0..2].copy_from_slice(&src_port.to_be_bytes());
    buf[2..4].copy_from_slice(&dst_port.to_be_bytes());
    buf[4..8].copy_from_slice(&seq.raw().to_be_bytes());
    buf[8..12].copy_from_slice(&ack.raw().to_be_bytes());
    buf[12..14].copy_from_slice(&((HEADER_WORDS << 12) | flags.bits()).to_be_bytes());
    buf[14..16].copy_from_slice(&DEFAULT_WINDOW.to_be_bytes());
    buf
}

/// Fill in the checksum of `segment` (header followed by payload) for `src -> dst`.
pub fn finalize_checksum(mut segment: Vec<u8>, src: Ipv4Addr, dst: Ipv4Addr) -> Vec<u8> {
    segment[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].fill(0);
    let sum = checksum::checksum(&segment, src, dst);
    segment[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&sum.to_be_bytes());
    segment
}

/// Outbound segment parameters, turned into finished bytes by [`SegmentBuilder::build`].
#[derive(Debug, Clone)]
pub struct SegmentBuilder<'a> {
    src_port: u16,
    dst_port: u16,
    seq: SeqNum,
    ack: SeqNum,
    flags: Flags,
    payload: &'a [u8],
}

impl<'a> SegmentBuilder<'a> {
    /// Start a segment from `src_port` to `dst_port`.
    pub fn new(src_port: u16, dst_port: u16) -> Self {
        Self {
            src_port,
            dst_port,
            seq: SeqNum::default(),
            ack: SeqNum::default(),
            flags: Flags::NONE,
            payload: &[],
        }
    }

    /// Set the sequence number.
    pub fn seq(mut self, seq: SeqNum) -> Self {
        self.seq = seq;
        self
    }

    /// Set the acknowledgment number.
    pub fn ack(mut self, ack: SeqNum) -> Self {
        self.ack = ack;
        self
    }

    /// Set the control flags.
    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Attach a payload.
    pub fn payload(mut self, payload: &'a [u8]) -> Self {
        self.payload = payload;
        self
    }

    /// Encode header and payload and fill in the checksum for `src -> dst`.
    pub fn build(self, src: Ipv4Addr, dst: Ipv4Addr) -> Vec<u8> {
        let mut segment = Vec::with_capacity(HEADER_LEN + self.payload.len());
        segment.extend_from_slice(&encode(
            self.src_port,
            self.dst_port,
            self.seq,
            self.ack,
            self.flags,
        ));
        segment.extend_from_slice(self.payload);
        finalize_checksum(segment, src, dst)
    }
}
