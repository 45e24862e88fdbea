//! Retransmission timer.
//!
//! Each session owns exactly one [`RetransmitTimer`]. The timer is a deadline
//! slot rather than a scheduled callback: arming overwrites the slot, so a
//! previous arm can never fire later, and dropping the session drops the
//! timer with it. The host asks the connection manager for the earliest
//! deadline and calls back into it once that instant has passed.

use std::time::{Duration, Instant};

/// Single-slot retransmission timer with a fixed timeout.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    /// Timeout applied at every arm.
    rto: Duration,
    /// When the timer fires, if armed.
    deadline: Option<Instant>,
}

impl RetransmitTimer {
    /// Create a disarmed timer using `rto` for every arm.
    pub fn new(rto: Duration) -> Self {
        Self {
            rto,
            deadline: None,
        }
    }

    /// Configured timeout.
    pub fn rto(&self) -> Duration {
        self.rto
    }

    /// Arm the timer to fire `rto` after `now`, replacing any pending deadline.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.rto);
    }

    /// Arm only if nothing is pending.
    pub fn arm_if_idle(&mut self, now: Instant) {
        if self.deadline.is_none() {
            self.arm(now);
        }
    }

    /// Disarm the timer.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Pending deadline.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the pending deadline has passed at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}
