//! Internet checksum (RFC 1071) over the IPv4 pseudo-header.

use std::net::Ipv4Addr;

use crate::core::constants::IPPROTO_TCP;

/// Accumulate `data` as big-endian 16-bit words into `sum`.
fn accumulate(mut sum: u64, data: &[u8]) -> u64 {
    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum += u64::from(u16::from_be_bytes([word[0], word[1]]));
    }
    // odd trailing byte is padded with zero
    if let [last] = chunks.remainder() {
        sum += u64::from(*last) << 8;
    }
    sum
}

/// Fold carries and take the ones' complement.
fn finish(mut sum: u64) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Checksum of `segment` with the pseudo-header for `src -> dst`.
///
/// Run over a segment whose checksum field is already filled in, the result
/// is `0` exactly when the checksum is correct. The pseudo-header length is
/// 16 bits wide; longer slices are rejected by [`super::decode`] before they
/// get here.
pub fn checksum(segment: &[u8], src: Ipv4Addr, dst: Ipv4Addr) -> u16 {
    let mut pseudo = [0u8; 12];
    pseudo[0..4].copy_from_slice(&src.octets());
    pseudo[4..8].copy_from_slice(&dst.octets());
    pseudo[9] = IPPROTO_TCP;
    pseudo[10..12].copy_from_slice(&(segment.len() as u16).to_be_bytes());

    finish(accumulate(accumulate(0, &pseudo), segment))
}

/// Whether `segment` carries a correct checksum for `src -> dst`.
pub fn verify(segment: &[u8], src: Ipv4Addr, dst: Ipv4Addr) -> bool {
    checksum(segment, src, dst) == 0
}
