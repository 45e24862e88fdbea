//! tinytcp Echo Example
//!
//! Runs an echo server on the tokio driver and connects an in-process peer to
//! it over channels standing in for the raw IPv4 device. The peer drops the
//! first echoed segment so the retransmission path shows up in the log.
//!
//! Environment variables:
//! - TINYTCP_PORT: listening port (default 7000)
//! - TINYTCP_MESSAGE: bytes to echo (default "hello over tinytcp")
//! - RUST_LOG: tracing filter (default info)

mod peer;

use std::net::Ipv4Addr;
use std::time::Duration;

use tinytcp::prelude::*;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::peer::Peer;

const SERVER_ADDR: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const PEER_ADDR: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let port = match std::env::var("TINYTCP_PORT") {
        Ok(port) => port.parse()?,
        Err(_) => 7000,
    };
    let message =
        std::env::var("TINYTCP_MESSAGE").unwrap_or_else(|_| "hello over tinytcp".to_string());

    let config = ServerConfigBuilder::new()
        .port(port)
        .mss(8)
        .rto(Duration::from_millis(200))
        .build()?;
    let (network, mut outbound) = ChannelNetwork::new();
    let mut manager = ConnectionManager::new(config, network)?;
    manager.on_connection(|session| {
        info!(key = %session.key(), "client connected");
        session.on_data(|session, data| {
            if data.is_empty() {
                info!(key = %session.key(), "client finished");
                return;
            }
            if let Err(err) = session.send(data) {
                warn!(%err, "echo failed");
            }
        });
    });

    let (inbound_tx, inbound_rx) = mpsc::channel(64);
    let (driver, handle) = Driver::new(manager, inbound_rx);
    let server = tokio::spawn(driver.run());

    let peer = Peer {
        addr: PEER_ADDR,
        port: 40000,
        server_addr: SERVER_ADDR,
        server_port: port,
        initial_sequence: 100,
        drop_first_data: true,
    };
    let echoed = peer.run(inbound_tx.clone(), &mut outbound, message.as_bytes()).await?;
    info!(echoed = %String::from_utf8_lossy(&echoed), "round trip complete");

    handle.shutdown().await?;
    let manager = server.await?;
    info!(open_sessions = manager.len(), "server stopped");
    Ok(())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_level(true))
        .with(env_filter)
        .init();
}
