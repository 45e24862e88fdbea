//! Connection manager.
//!
//! Owns the connection table and the network collaborator. Every inbound
//! segment, timer expiry and application command enters through a method on
//! [`ConnectionManager`], runs to completion, and leaves any segments it
//! produced with the network before returning.

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Instant;

use tracing::{debug, info, trace, warn};

use super::config::ServerConfig;
use super::session::{ConnectionKey, SegmentOutcome, Session};
use crate::core::{ConfigError, Network, SessionError};
use crate::transport::{
    Flags, SegmentBuilder, SeqNum, TransportError, TransportResult, checksum, decode,
};

/// Callback invoked once for every accepted connection.
pub type ConnectionHandler = Box<dyn FnMut(&mut Session) + Send>;

/// Accepts connections on one port and routes segments to their sessions.
///
/// # Example
///
/// ```
/// use tinytcp::server::{ConnectionManager, ServerConfig};
/// use tinytcp::transport::MemoryNetwork;
///
/// let mut manager = ConnectionManager::new(ServerConfig::with_port(7000), MemoryNetwork::new())?;
/// manager.on_connection(|session| {
///     session.on_data(|session, data| {
///         if !data.is_empty() {
///             let _ = session.send(data);
///         }
///     });
/// });
/// assert!(manager.is_empty());
/// # Ok::<(), tinytcp::core::ConfigError>(())
/// ```
pub struct ConnectionManager<N: Network> {
    config: ServerConfig,
    network: N,
    sessions: HashMap<ConnectionKey, Session>,
    on_connection: Option<ConnectionHandler>,
}

impl<N: Network> ConnectionManager<N> {
    /// Create a manager listening on `config.port`.
    pub fn new(config: ServerConfig, network: N) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            network,
            sessions: HashMap::new(),
            on_connection: None,
        })
    }

    /// Register the handler invoked with each newly accepted session.
    ///
    /// Replaces any previous handler.
    pub fn on_connection<F>(&mut self, handler: F)
    where
        F: FnMut(&mut Session) + Send + 'static,
    {
        self.on_connection = Some(Box::new(handler));
    }

    /// Handle one inbound segment from `src` addressed to `dst`.
    ///
    /// An `Err` means the segment was discarded without a reply; the variant
    /// says why.
    pub fn on_segment(
        &mut self,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        segment: &[u8],
        now: Instant,
    ) -> TransportResult<()> {
        let header = decode(segment).inspect_err(|err| debug!(%src, %err, "dropping malformed segment"))?;

        if header.dst_port != self.config.port {
            trace!(%src, port = header.dst_port, "segment for another port");
            return Err(TransportError::WrongPort(header.dst_port));
        }

        let key = ConnectionKey::new(src, header.src_port, dst, header.dst_port);
        if !self.checksum_disabled() && !checksum::verify(segment, src, dst) {
            warn!(%key, checksum = header.checksum, "dropping segment with bad checksum");
            return Err(TransportError::BadChecksum(key.remote()));
        }

        let flags = header.flags();
        debug!(%key, seq = %header.seq, ack = %header.ack, ?flags, len = segment.len() - header.header_len(), "segment");

        if flags.contains(Flags::SYN) {
            return self.accept(key, header.seq, now);
        }

        let Some(session) = self.sessions.get_mut(&key) else {
            debug!(%key, "segment for unknown connection");
            return Err(TransportError::UnknownConnection {
                remote: key.remote(),
                local: key.local(),
            });
        };

        session.set_clock(now);
        let result = session.on_segment(header.seq, header.ack, flags, header.payload(segment));
        transmit(&mut self.network, session);

        match result {
            Ok(SegmentOutcome::Open) => Ok(()),
            Ok(SegmentOutcome::Closed) => {
                self.sessions.remove(&key);
                info!(%key, active = self.sessions.len(), "connection closed by peer");
                Ok(())
            }
            Err(err) => {
                debug!(%key, %err, "segment discarded by session");
                Err(err)
            }
        }
    }

    /// Passive open for a SYN carrying `peer_seq`.
    fn accept(&mut self, key: ConnectionKey, peer_seq: SeqNum, now: Instant) -> TransportResult<()> {
        if self.sessions.contains_key(&key) {
            debug!(%key, "ignoring duplicate SYN");
            return Err(TransportError::DuplicateSyn(key.remote()));
        }
        if self.sessions.len() >= self.config.max_sessions {
            warn!(%key, limit = self.config.max_sessions, "connection table full, dropping SYN");
            return Err(TransportError::SessionLimit(self.config.max_sessions));
        }

        let iss = SeqNum::new(self.config.initial_sequence.unwrap_or_else(rand::random));
        let syn_ack = SegmentBuilder::new(key.dst_port, key.src_port)
            .seq(iss)
            .ack(peer_seq + 1u32)
            .flags(Flags::SYN | Flags::ACK)
            .build(key.dst_addr, key.src_addr);
        send_segment(&mut self.network, &key, &syn_ack);

        let session = self
            .sessions
            .entry(key)
            .or_insert_with(|| Session::accept(key, peer_seq, iss, &self.config, now));
        if let Some(handler) = self.on_connection.as_mut() {
            handler(session);
        }
        transmit(&mut self.network, session);

        info!(%key, %iss, active = self.sessions.len(), "accepted connection");
        Ok(())
    }

    /// Earliest pending retransmission deadline across all sessions.
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.sessions
            .values()
            .filter_map(Session::timer_deadline)
            .min()
    }

    /// Fire every retransmission timer whose deadline is at or before `now`.
    pub fn handle_timeout(&mut self, now: Instant) {
        for session in self.sessions.values_mut() {
            session.on_timeout(now);
            transmit(&mut self.network, session);
        }
    }

    /// Send `data` on the session for `key`.
    pub fn send(&mut self, key: &ConnectionKey, data: &[u8], now: Instant) -> Result<(), SessionError> {
        self.with_session(key, now, |session| session.send(data))?
    }

    /// Close our direction of the session for `key`.
    pub fn close(&mut self, key: &ConnectionKey, now: Instant) -> Result<(), SessionError> {
        self.with_session(key, now, Session::close)?
    }

    /// Run `f` against the session for `key` and transmit whatever it queued.
    pub fn with_session<R>(
        &mut self,
        key: &ConnectionKey,
        now: Instant,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, SessionError> {
        let session = self.sessions.get_mut(key).ok_or(SessionError::UnknownSession)?;
        session.set_clock(now);
        let out = f(session);
        transmit(&mut self.network, session);
        Ok(out)
    }

    /// Session for `key`, if one is open.
    pub fn session(&self, key: &ConnectionKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    /// Whether a session exists for `key`.
    pub fn contains(&self, key: &ConnectionKey) -> bool {
        self.sessions.contains_key(key)
    }

    /// Keys of all open sessions.
    pub fn keys(&self) -> impl Iterator<Item = &ConnectionKey> {
        self.sessions.keys()
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are open.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Network collaborator.
    pub fn network(&self) -> &N {
        &self.network
    }

    /// Mutable network collaborator.
    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    fn checksum_disabled(&self) -> bool {
        self.config.ignore_checksum || self.network.ignore_checksum()
    }
}

impl<N: Network> fmt::Debug for ConnectionManager<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

fn transmit<N: Network>(network: &mut N, session: &mut Session) {
    let key = *session.key();
    for segment in session.take_outbox() {
        send_segment(network, &key, &segment);
    }
}

/// A failed send is treated as a lost segment.
fn send_segment<N: Network>(network: &mut N, key: &ConnectionKey, segment: &[u8]) {
    if let Err(err) = network.send(segment, key.src_addr) {
        warn!(%key, %err, "failed to send segment");
    }
}
