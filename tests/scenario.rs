//! End-to-end connection lifecycle through the public sans-IO API.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tinytcp::prelude::*;

const PEER: Ipv4Addr = Ipv4Addr::new(172, 16, 0, 9);
const LOCAL: Ipv4Addr = Ipv4Addr::new(172, 16, 0, 1);
const PEER_PORT: u16 = 33000;
const PORT: u16 = 8080;
const ISS: u32 = 0xFFFF_FFF0;

struct Fixture {
    manager: ConnectionManager<MemoryNetwork>,
    received: Arc<Mutex<Vec<Vec<u8>>>>,
    accepted: Arc<Mutex<Vec<ConnectionKey>>>,
}

fn fixture(mss: usize) -> Fixture {
    let config = ServerConfigBuilder::new()
        .port(PORT)
        .mss(mss)
        .rto(Duration::from_millis(300))
        .initial_sequence(ISS)
        .build()
        .expect("valid config");
    let mut manager = ConnectionManager::new(config, MemoryNetwork::new()).expect("manager");

    let received = Arc::new(Mutex::new(Vec::new()));
    let accepted = Arc::new(Mutex::new(Vec::new()));
    let (sink, seen) = (Arc::clone(&received), Arc::clone(&accepted));
    manager.on_connection(move |session| {
        seen.lock().unwrap().push(*session.key());
        let sink = Arc::clone(&sink);
        session.on_data(move |_, data| sink.lock().unwrap().push(data.to_vec()));
    });

    Fixture {
        manager,
        received,
        accepted,
    }
}

fn key() -> ConnectionKey {
    ConnectionKey::new(PEER, PEER_PORT, LOCAL, PORT)
}

fn from_peer(seq: u32, ack: u32, flags: Flags, payload: &[u8]) -> Vec<u8> {
    SegmentBuilder::new(PEER_PORT, PORT)
        .seq(SeqNum::new(seq))
        .ack(SeqNum::new(ack))
        .flags(flags)
        .payload(payload)
        .build(PEER, LOCAL)
}

fn replies(manager: &mut ConnectionManager<MemoryNetwork>) -> Vec<(SegmentHeader, Vec<u8>)> {
    manager
        .network_mut()
        .take_sent()
        .into_iter()
        .map(|out| {
            assert_eq!(out.dst, PEER);
            assert_eq!(tinytcp::transport::checksum(&out.segment, LOCAL, PEER), 0);
            let header = decode(&out.segment).expect("well-formed");
            let payload = header.payload(&out.segment).to_vec();
            (header, payload)
        })
        .collect()
}

#[test]
fn syn_data_fin_lifecycle() {
    let mut f = fixture(1460);
    let now = Instant::now();

    f.manager
        .on_segment(PEER, LOCAL, &from_peer(100, 0, Flags::SYN, &[]), now)
        .expect("syn");
    let out = replies(&mut f.manager);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0.flags(), Flags::SYN | Flags::ACK);
    assert_eq!(out[0].0.seq, SeqNum::new(ISS));
    assert_eq!(out[0].0.ack, SeqNum::new(101));
    assert_eq!(*f.accepted.lock().unwrap(), vec![key()]);

    f.manager
        .on_segment(PEER, LOCAL, &from_peer(101, ISS.wrapping_add(1), Flags::ACK, b"hi"), now)
        .expect("data");
    let out = replies(&mut f.manager);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0.flags(), Flags::ACK);
    assert_eq!(out[0].0.ack, SeqNum::new(103));
    assert!(out[0].1.is_empty());
    assert_eq!(*f.received.lock().unwrap(), vec![b"hi".to_vec()]);

    f.manager
        .on_segment(
            PEER,
            LOCAL,
            &from_peer(103, ISS.wrapping_add(1), Flags::FIN | Flags::ACK, &[]),
            now,
        )
        .expect("fin");
    let out = replies(&mut f.manager);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0.ack, SeqNum::new(104));
    assert_eq!(*f.received.lock().unwrap(), vec![b"hi".to_vec(), Vec::new()]);
    assert!(!f.manager.contains(&key()));
    assert!(f.manager.is_empty());
}

#[test]
fn retransmission_across_sequence_wrap() {
    let mut f = fixture(8);
    let start = Instant::now();
    f.manager
        .on_segment(PEER, LOCAL, &from_peer(100, 0, Flags::SYN, &[]), start)
        .expect("syn");
    replies(&mut f.manager);

    // ISS + 1 .. ISS + 33 crosses the 32-bit boundary
    let data: Vec<u8> = (0u8..32).collect();
    f.manager.send(&key(), &data, start).expect("send");
    let out = replies(&mut f.manager);
    assert_eq!(out.len(), 4);
    let first = out[0].clone();

    let deadline = f.manager.poll_timeout().expect("armed");
    f.manager.handle_timeout(deadline);
    let resent = replies(&mut f.manager);
    assert_eq!(resent.len(), 1);
    assert_eq!(resent[0].0.seq, first.0.seq);
    assert_eq!(resent[0].1, first.1);

    let ack = ISS.wrapping_add(1).wrapping_add(16);
    f.manager
        .on_segment(PEER, LOCAL, &from_peer(101, ack, Flags::ACK, &[]), deadline)
        .expect("partial ack");
    let session = f.manager.session(&key()).expect("session");
    assert_eq!(session.send_base(), SeqNum::new(ack));
    assert_eq!(session.unacked_len(), 16);

    let deadline = f.manager.poll_timeout().expect("rearmed");
    f.manager.handle_timeout(deadline);
    let resent = replies(&mut f.manager);
    assert_eq!(resent[0].0.seq, SeqNum::new(ack));
    assert_eq!(resent[0].1, &data[16..24]);

    let end = ISS.wrapping_add(33);
    f.manager
        .on_segment(PEER, LOCAL, &from_peer(101, end, Flags::ACK, &[]), deadline)
        .expect("full ack");
    assert_eq!(f.manager.poll_timeout(), None);
}

#[test]
fn server_close_then_peer_close() {
    let mut f = fixture(1460);
    let now = Instant::now();
    f.manager
        .on_segment(PEER, LOCAL, &from_peer(100, 0, Flags::SYN, &[]), now)
        .expect("syn");
    replies(&mut f.manager);

    f.manager.send(&key(), b"bye", now).expect("send");
    f.manager.close(&key(), now).expect("close");
    let out = replies(&mut f.manager);
    assert_eq!(out.len(), 2);
    assert!(out[1].0.flags().contains(Flags::FIN));
    assert_eq!(out[1].0.seq, SeqNum::new(ISS.wrapping_add(4)));

    // peer acknowledges data and FIN, then closes its own side
    let fin_ack = ISS.wrapping_add(5);
    f.manager
        .on_segment(PEER, LOCAL, &from_peer(101, fin_ack, Flags::ACK, &[]), now)
        .expect("ack");
    assert_eq!(f.manager.poll_timeout(), None);
    assert_eq!(
        f.manager.session(&key()).map(Session::state),
        Some(SessionState::FinSent)
    );

    f.manager
        .on_segment(PEER, LOCAL, &from_peer(101, fin_ack, Flags::FIN | Flags::ACK, &[]), now)
        .expect("peer fin");
    assert!(f.manager.is_empty());
    assert_eq!(*f.received.lock().unwrap(), vec![Vec::<u8>::new()]);
}

#[test]
fn sessions_are_independent() {
    let mut f = fixture(1460);
    let now = Instant::now();
    let other = SegmentBuilder::new(PEER_PORT + 1, PORT)
        .seq(SeqNum::new(5000))
        .flags(Flags::SYN)
        .build(PEER, LOCAL);

    f.manager
        .on_segment(PEER, LOCAL, &from_peer(100, 0, Flags::SYN, &[]), now)
        .expect("first");
    f.manager.on_segment(PEER, LOCAL, &other, now).expect("second");
    assert_eq!(f.manager.len(), 2);
    assert_eq!(f.accepted.lock().unwrap().len(), 2);

    f.manager
        .on_segment(PEER, LOCAL, &from_peer(101, 0, Flags::FIN, &[]), now)
        .expect("close first");
    assert_eq!(f.manager.len(), 1);
    assert!(f.manager.contains(&ConnectionKey::new(PEER, PEER_PORT + 1, LOCAL, PORT)));
}
