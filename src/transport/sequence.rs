//! Sequence-number arithmetic.
//!
//! TCP sequence numbers are 32-bit and wrap. Ordering is defined by the sign of
//! the wrapping difference, so `0xFFFF_FFFF` is before `0`.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// A 32-bit sequence number with wraparound-aware comparison.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SeqNum(u32);

impl SeqNum {
    /// Create a sequence number from its raw value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        SeqNum(value)
    }

    /// Raw value as carried on the wire.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Signed distance from `self` to `other` (positive when `other` is ahead).
    #[inline]
    pub fn diff(self, other: SeqNum) -> i32 {
        other.0.wrapping_sub(self.0) as i32
    }

    /// Number of sequence numbers in `[self, end)`, assuming `self <= end`.
    #[inline]
    pub fn distance_to(self, end: SeqNum) -> usize {
        end.0.wrapping_sub(self.0) as usize
    }
}

impl PartialOrd for SeqNum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SeqNum {
    fn cmp(&self, other: &Self) -> Ordering {
        0.cmp(&self.diff(*other))
    }
}

impl Add<u32> for SeqNum {
    type Output = SeqNum;

    #[inline]
    fn add(self, rhs: u32) -> SeqNum {
        SeqNum(self.0.wrapping_add(rhs))
    }
}

impl Add<usize> for SeqNum {
    type Output = SeqNum;

    #[inline]
    fn add(self, rhs: usize) -> SeqNum {
        SeqNum(self.0.wrapping_add(rhs as u32))
    }
}

impl AddAssign<usize> for SeqNum {
    #[inline]
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}

impl Sub for SeqNum {
    type Output = i32;

    /// Signed distance from `rhs` to `self`.
    #[inline]
    fn sub(self, rhs: SeqNum) -> i32 {
        rhs.diff(self)
    }
}

impl fmt::Debug for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNum({})", self.0)
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SeqNum {
    fn from(value: u32) -> Self {
        SeqNum(value)
    }
}

impl From<SeqNum> for u32 {
    fn from(seq: SeqNum) -> Self {
        seq.0
    }
}
