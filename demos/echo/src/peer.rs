//! Minimal active-open client that talks to the server over channels.

use std::net::Ipv4Addr;
use std::time::Duration;

use thiserror::Error;
use tinytcp::prelude::*;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, info};

/// How long the peer waits for any single reply.
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("server went away")]
    ChannelClosed,

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("malformed reply: {0}")]
    Malformed(#[from] SegmentError),

    #[error("unexpected reply: {0}")]
    Unexpected(String),
}

pub struct Peer {
    pub addr: Ipv4Addr,
    pub port: u16,
    pub server_addr: Ipv4Addr,
    pub server_port: u16,
    pub initial_sequence: u32,
    /// Discard the first data segment from the server to force a retransmission.
    pub drop_first_data: bool,
}

struct Link<'a> {
    peer: &'a Peer,
    tx: mpsc::Sender<Inbound>,
    rx: &'a mut mpsc::UnboundedReceiver<Outbound>,
    seq: SeqNum,
    ack: SeqNum,
}

impl Link<'_> {
    async fn transmit(&self, flags: Flags, payload: &[u8]) -> Result<(), PeerError> {
        let segment = SegmentBuilder::new(self.peer.port, self.peer.server_port)
            .seq(self.seq)
            .ack(self.ack)
            .flags(flags)
            .payload(payload)
            .build(self.peer.addr, self.peer.server_addr);
        self.tx
            .send(Inbound {
                src: self.peer.addr,
                dst: self.peer.server_addr,
                segment,
            })
            .await
            .map_err(|_| PeerError::ChannelClosed)
    }

    async fn receive(&mut self) -> Result<(SegmentHeader, Vec<u8>), PeerError> {
        let out = time::timeout(REPLY_TIMEOUT, self.rx.recv())
            .await
            .map_err(|_| PeerError::Timeout(REPLY_TIMEOUT))?
            .ok_or(PeerError::ChannelClosed)?;
        let header = decode(&out.segment)?;
        let payload = header.payload(&out.segment).to_vec();
        debug!(seq = %header.seq, ack = %header.ack, flags = ?header.flags(), len = payload.len(), "peer received");
        Ok((header, payload))
    }
}

impl Peer {
    /// Connect, send `message`, collect the echo, then close.
    pub async fn run(
        &self,
        tx: mpsc::Sender<Inbound>,
        rx: &mut mpsc::UnboundedReceiver<Outbound>,
        message: &[u8],
    ) -> Result<Vec<u8>, PeerError> {
        let mut link = Link {
            peer: self,
            tx,
            rx,
            seq: SeqNum::new(self.initial_sequence),
            ack: SeqNum::new(0),
        };

        link.transmit(Flags::SYN, &[]).await?;
        let (syn_ack, _) = link.receive().await?;
        if syn_ack.flags() != Flags::SYN | Flags::ACK || syn_ack.ack != link.seq + 1u32 {
            return Err(PeerError::Unexpected(format!("{syn_ack:?}")));
        }
        link.seq = link.seq + 1u32;
        link.ack = syn_ack.seq + 1u32;
        link.transmit(Flags::ACK, &[]).await?;
        info!(server_iss = %syn_ack.seq, "peer connected");

        link.transmit(Flags::ACK, message).await?;
        link.seq += message.len();

        let mut echoed = Vec::with_capacity(message.len());
        let mut drop_next = self.drop_first_data;
        while echoed.len() < message.len() {
            let (header, payload) = link.receive().await?;
            if payload.is_empty() {
                continue;
            }
            if drop_next {
                drop_next = false;
                info!(seq = %header.seq, "peer dropping segment");
                continue;
            }
            if header.seq != link.ack {
                debug!(expected = %link.ack, got = %header.seq, "peer ignoring out-of-order segment");
                continue;
            }
            echoed.extend_from_slice(&payload);
            link.ack += payload.len();
            link.transmit(Flags::ACK, &[]).await?;
        }

        link.transmit(Flags::FIN | Flags::ACK, &[]).await?;
        let (fin_ack, _) = link.receive().await?;
        if fin_ack.ack != link.seq + 1u32 {
            return Err(PeerError::Unexpected(format!("{fin_ack:?}")));
        }
        info!("peer closed");
        Ok(echoed)
    }
}
