//! Per-connection reliable delivery.
//!
//! A [`Session`] is created by the connection manager when a SYN is accepted
//! and lives until the peer's FIN is admitted. It handles:
//! - Strict in-order admission (`seq == recv_next`, anything else dropped)
//! - Cumulative acknowledgment of our outbound bytes
//! - Chunking application data into MSS-sized segments
//! - Retransmission of the oldest unacknowledged chunk on timeout

use std::collections::VecDeque;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Instant;

use tracing::{debug, trace};

use super::config::ServerConfig;
use crate::core::SessionError;
use crate::transport::{Flags, RetransmitTimer, SegmentBuilder, SeqNum, TransportError};

/// Callback invoked with in-order payload bytes; an empty slice means the peer closed.
pub type DataHandler = Box<dyn FnMut(&mut Session, &[u8]) + Send>;

/// Connection 4-tuple as seen on inbound segments.
///
/// `src` is the peer, `dst` is us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    /// Peer address.
    pub src_addr: Ipv4Addr,
    /// Peer port.
    pub src_port: u16,
    /// Local address.
    pub dst_addr: Ipv4Addr,
    /// Local (listening) port.
    pub dst_port: u16,
}

impl ConnectionKey {
    /// Create a key from the inbound segment's addressing.
    pub fn new(src_addr: Ipv4Addr, src_port: u16, dst_addr: Ipv4Addr, dst_port: u16) -> Self {
        Self {
            src_addr,
            src_port,
            dst_addr,
            dst_port,
        }
    }

    /// Peer endpoint.
    pub fn remote(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.src_addr, self.src_port)
    }

    /// Local endpoint.
    pub fn local(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.dst_addr, self.dst_port)
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.remote(), self.local())
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// SYN+ACK sent, peer has not acknowledged it yet.
    SynReceived,
    /// Data may flow both ways.
    Established,
    /// Local side closed; our FIN is outstanding or acknowledged.
    FinSent,
    /// Peer's FIN admitted; the manager removes the session.
    Closed,
}

/// What an admitted segment did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Segment processed, session continues.
    Open,
    /// Peer closed; the session must be removed from the table.
    Closed,
}

/// One accepted connection.
pub struct Session {
    key: ConnectionKey,
    state: SessionState,
    /// Initial send sequence number (carried by our SYN+ACK).
    iss: SeqNum,
    /// Oldest sent-but-unacknowledged sequence number.
    send_base: SeqNum,
    /// Sequence number for the next byte we send.
    send_next: SeqNum,
    /// Next sequence number expected from the peer.
    recv_next: SeqNum,
    /// Bytes in `[send_base, send_base + len)`, held for retransmission.
    unacked: VecDeque<u8>,
    /// Our FIN is sent and not yet acknowledged. It sits right after `unacked`.
    fin_outstanding: bool,
    timer: RetransmitTimer,
    mss: usize,
    max_unacked_bytes: usize,
    on_data: Option<DataHandler>,
    /// Finished segments waiting to be handed to the network.
    outbox: Vec<Vec<u8>>,
    /// Time of the event currently being processed.
    clock: Instant,
}

impl Session {
    /// Create a session for a SYN carrying `peer_seq`, answering with `iss`.
    ///
    /// The SYN and our SYN+ACK each consume one sequence number, so
    /// `recv_next = peer_seq + 1` and `send_base = send_next = iss + 1`.
    pub(crate) fn accept(
        key: ConnectionKey,
        peer_seq: SeqNum,
        iss: SeqNum,
        config: &ServerConfig,
        now: Instant,
    ) -> Self {
        Self {
            key,
            state: SessionState::SynReceived,
            iss,
            send_base: iss + 1u32,
            send_next: iss + 1u32,
            recv_next: peer_seq + 1u32,
            unacked: VecDeque::new(),
            fin_outstanding: false,
            timer: RetransmitTimer::new(config.rto),
            mss: config.mss,
            max_unacked_bytes: config.max_unacked_bytes,
            on_data: None,
            outbox: Vec::new(),
            clock: now,
        }
    }

    /// Connection key.
    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Initial send sequence number.
    pub fn iss(&self) -> SeqNum {
        self.iss
    }

    /// Oldest unacknowledged sequence number.
    pub fn send_base(&self) -> SeqNum {
        self.send_base
    }

    /// Next sequence number to assign.
    pub fn send_next(&self) -> SeqNum {
        self.send_next
    }

    /// Next sequence number expected from the peer (also our ACK value).
    pub fn recv_next(&self) -> SeqNum {
        self.recv_next
    }

    /// Bytes sent and not yet acknowledged.
    pub fn unacked_len(&self) -> usize {
        self.unacked.len()
    }

    /// Whether our FIN awaits acknowledgment.
    pub fn fin_outstanding(&self) -> bool {
        self.fin_outstanding
    }

    /// Pending retransmission deadline.
    pub fn timer_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Register the callback that receives in-order data.
    ///
    /// The callback runs on the event loop and may call [`Session::send`] or
    /// [`Session::close`] on the session it is given.
    pub fn on_data<F>(&mut self, handler: F)
    where
        F: FnMut(&mut Session, &[u8]) + Send + 'static,
    {
        self.on_data = Some(Box::new(handler));
    }

    /// Queue `data` for transmission in MSS-sized segments.
    ///
    /// All segments go out back-to-back; the single retransmission timer is
    /// armed if it is idle. Nothing is sent if the data would overflow the
    /// retransmission buffer.
    pub fn send(&mut self, data: &[u8]) -> Result<(), SessionError> {
        if matches!(self.state, SessionState::FinSent | SessionState::Closed) {
            return Err(SessionError::Closed);
        }
        let available = self.max_unacked_bytes.saturating_sub(self.unacked.len());
        if data.len() > available {
            return Err(SessionError::SendBufferFull {
                requested: data.len(),
                available,
            });
        }

        for chunk in data.chunks(self.mss) {
            self.queue(self.send_next, Flags::ACK, chunk);
            self.send_next += chunk.len();
            self.unacked.extend(chunk);
            self.timer.arm_if_idle(self.clock);
        }
        Ok(())
    }

    /// Close our direction of the stream by sending FIN.
    ///
    /// The FIN consumes one sequence number and is retransmitted until
    /// acknowledged. Received data is still delivered afterwards.
    pub fn close(&mut self) -> Result<(), SessionError> {
        if matches!(self.state, SessionState::FinSent | SessionState::Closed) {
            return Err(SessionError::Closed);
        }
        debug!(key = %self.key, seq = %self.send_next, "sending FIN");
        self.queue(self.send_next, Flags::FIN | Flags::ACK, &[]);
        self.send_next += 1usize;
        self.fin_outstanding = true;
        self.state = SessionState::FinSent;
        self.timer.arm_if_idle(self.clock);
        Ok(())
    }

    /// Process a segment already routed to this session.
    pub(crate) fn on_segment(
        &mut self,
        seq: SeqNum,
        ack: SeqNum,
        flags: Flags,
        payload: &[u8],
    ) -> Result<SegmentOutcome, TransportError> {
        if seq != self.recv_next {
            return Err(TransportError::OutOfOrder {
                expected: self.recv_next,
                got: seq,
            });
        }
        if flags.contains(Flags::ACK) {
            if ack > self.send_next {
                // acknowledges bytes never sent; the rest of the segment still counts
                debug!(key = %self.key, %ack, send_next = %self.send_next, "ignoring ack beyond send_next");
            } else {
                self.on_ack(ack);
            }
        }

        if flags.contains(Flags::FIN) {
            // FIN consumes one sequence number; any payload riding with it is not delivered
            self.recv_next += 1usize;
            self.queue_ack();
            self.timer.cancel();
            self.state = SessionState::Closed;
            debug!(key = %self.key, recv_next = %self.recv_next, "peer closed");
            self.deliver(&[]);
            return Ok(SegmentOutcome::Closed);
        }

        if !payload.is_empty() {
            if self.state == SessionState::SynReceived {
                self.state = SessionState::Established;
            }
            self.recv_next += payload.len();
            self.queue_ack();
            self.deliver(payload);
        }

        Ok(SegmentOutcome::Open)
    }

    /// Apply a cumulative acknowledgment no later than `send_next`.
    fn on_ack(&mut self, ack: SeqNum) {
        if self.state == SessionState::SynReceived && ack >= self.iss + 1u32 {
            self.state = SessionState::Established;
        }
        if ack <= self.send_base {
            return;
        }

        self.timer.cancel();
        let acked = self.send_base.distance_to(ack);
        let data_acked = acked.min(self.unacked.len());
        self.unacked.drain(..data_acked);
        if acked > data_acked {
            self.fin_outstanding = false;
        }
        self.send_base = ack;
        trace!(key = %self.key, %ack, remaining = self.unacked.len(), "acknowledged");

        if self.send_base < self.send_next {
            self.timer.arm(self.clock);
        }
    }

    /// Fire the retransmission timer if its deadline has passed.
    ///
    /// Only the oldest MSS-sized chunk is resent; the FIN is resent once no
    /// data remains. The timer re-arms for another full timeout either way.
    pub(crate) fn on_timeout(&mut self, now: Instant) {
        if !self.timer.is_expired(now) {
            return;
        }
        self.clock = now;
        self.timer.cancel();

        if !self.unacked.is_empty() {
            let chunk: Vec<u8> = self.unacked.iter().take(self.mss).copied().collect();
            debug!(key = %self.key, seq = %self.send_base, len = chunk.len(), "retransmitting");
            self.queue(self.send_base, Flags::ACK, &chunk);
        } else if self.fin_outstanding {
            debug!(key = %self.key, "retransmitting FIN");
            self.queue(self.send_base, Flags::FIN | Flags::ACK, &[]);
        }
        self.timer.arm(now);
    }

    pub(crate) fn set_clock(&mut self, now: Instant) {
        self.clock = now;
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outbox)
    }

    fn deliver(&mut self, payload: &[u8]) {
        match self.on_data.take() {
            Some(mut handler) => {
                handler(self, payload);
                // keep a handler the callback installed for itself
                if self.on_data.is_none() {
                    self.on_data = Some(handler);
                }
            }
            None => debug!(key = %self.key, len = payload.len(), "no data handler, dropping delivery"),
        }
    }

    fn queue_ack(&mut self) {
        self.queue(self.send_next, Flags::ACK, &[]);
    }

    fn queue(&mut self, seq: SeqNum, flags: Flags, payload: &[u8]) {
        let segment = SegmentBuilder::new(self.key.dst_port, self.key.src_port)
            .seq(seq)
            .ack(self.recv_next)
            .flags(flags)
            .payload(payload)
            .build(self.key.dst_addr, self.key.src_addr);
        trace!(key = %self.key, %seq, ack = %self.recv_next, ?flags, len = payload.len(), "queued segment");
        self.outbox.push(segment);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("send_base", &self.send_base)
            .field("send_next", &self.send_next)
            .field("recv_next", &self.recv_next)
            .field("unacked", &self.unacked.len())
            .field("fin_outstanding", &self.fin_outstanding)
            .field("timer", &self.timer.deadline())
            .finish_non_exhaustive()
    }
}
