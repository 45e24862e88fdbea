//! Driver behaviour on a paused tokio clock.

#![cfg(feature = "runtime")]

use std::net::Ipv4Addr;
use std::time::Duration;

use tinytcp::prelude::*;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

const PEER: Ipv4Addr = Ipv4Addr::new(10, 9, 0, 2);
const LOCAL: Ipv4Addr = Ipv4Addr::new(10, 9, 0, 1);
const PORT: u16 = 9000;
const ISS: u32 = 70_000;
const RTO: Duration = Duration::from_millis(250);

struct Wire {
    inbound: mpsc::Sender<Inbound>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl Wire {
    async fn push(&self, seq: u32, ack: u32, flags: Flags, payload: &[u8]) {
        let segment = SegmentBuilder::new(41000, PORT)
            .seq(SeqNum::new(seq))
            .ack(SeqNum::new(ack))
            .flags(flags)
            .payload(payload)
            .build(PEER, LOCAL);
        self.inbound
            .send(Inbound {
                src: PEER,
                dst: LOCAL,
                segment,
            })
            .await
            .expect("driver running");
    }

    async fn pull(&mut self) -> (SegmentHeader, Vec<u8>) {
        let out = self.outbound.recv().await.expect("segment");
        let header = decode(&out.segment).expect("well-formed");
        let payload = header.payload(&out.segment).to_vec();
        (header, payload)
    }
}

fn key() -> ConnectionKey {
    ConnectionKey::new(PEER, 41000, LOCAL, PORT)
}

fn spawn() -> (Wire, DriverHandle, tokio::task::JoinHandle<ConnectionManager<ChannelNetwork>>) {
    let config = ServerConfigBuilder::new()
        .port(PORT)
        .mss(4)
        .rto(RTO)
        .initial_sequence(ISS)
        .build()
        .expect("valid config");
    let (network, outbound) = ChannelNetwork::new();
    let manager = ConnectionManager::new(config, network).expect("manager");
    let (inbound, rx) = mpsc::channel(32);
    let (driver, handle) = Driver::new(manager, rx);
    (Wire { inbound, outbound }, handle, tokio::spawn(driver.run()))
}

#[tokio::test(start_paused = true)]
async fn oldest_chunk_is_resent_each_timeout() {
    let (mut wire, handle, _task) = spawn();
    wire.push(500, 0, Flags::SYN, &[]).await;
    wire.pull().await;

    handle.send(key(), b"abcdefgh".to_vec()).await.expect("send");
    let (a, _) = wire.pull().await;
    let (b, _) = wire.pull().await;
    assert_eq!(b.seq, a.seq + 4u32);

    // two firings without any acknowledgment resend the same first chunk
    let start = Instant::now();
    for round in 1..=2u32 {
        let (header, payload) = wire.pull().await;
        assert_eq!(header.seq, a.seq);
        assert_eq!(payload, b"abcd");
        assert!(Instant::now() - start >= RTO * round);
    }

    // acknowledging the first chunk moves retransmission on to the second
    wire.push(501, ISS + 5, Flags::ACK, &[]).await;
    let (header, payload) = wire.pull().await;
    assert_eq!(header.seq, b.seq);
    assert_eq!(payload, b"efgh");
}

#[tokio::test(start_paused = true)]
async fn fin_is_retransmitted_until_acknowledged() {
    let (mut wire, handle, task) = spawn();
    wire.push(500, 0, Flags::SYN, &[]).await;
    wire.pull().await;

    handle.close(key()).await.expect("close");
    let (fin, _) = wire.pull().await;
    assert!(fin.flags().contains(Flags::FIN));
    assert_eq!(fin.seq, SeqNum::new(ISS + 1));

    let (again, _) = wire.pull().await;
    assert!(again.flags().contains(Flags::FIN));
    assert_eq!(again.seq, fin.seq);

    wire.push(501, ISS + 2, Flags::ACK, &[]).await;
    time::sleep(RTO * 3).await;
    assert!(wire.outbound.try_recv().is_err());

    assert_eq!(
        handle.send(key(), b"late".to_vec()).await,
        Err(DriverError::Session(SessionError::Closed))
    );

    handle.shutdown().await.expect("shutdown");
    let manager = task.await.expect("driver task");
    let session = manager.session(&key()).expect("still open until peer FIN");
    assert!(!session.fin_outstanding());
}

#[tokio::test(start_paused = true)]
async fn discarded_segments_do_not_stop_the_driver() {
    let (mut wire, handle, task) = spawn();
    wire.inbound
        .send(Inbound {
            src: PEER,
            dst: LOCAL,
            segment: vec![0u8; 7],
        })
        .await
        .expect("driver running");
    wire.push(900, 0, Flags::ACK, b"stray").await;

    wire.push(500, 0, Flags::SYN, &[]).await;
    let (syn_ack, _) = wire.pull().await;
    assert_eq!(syn_ack.ack, SeqNum::new(501));

    handle.shutdown().await.expect("shutdown");
    assert_eq!(task.await.expect("driver task").len(), 1);
}
