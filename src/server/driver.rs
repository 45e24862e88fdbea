//! tokio-hosted event loop.
//!
//! [`Driver`] owns a [`ConnectionManager`] and feeds it from a single task:
//! inbound segments, application commands and the earliest retransmission
//! deadline are awaited together in one `select!`, so handlers never run
//! concurrently and the manager needs no locks.

use std::time::Instant;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{debug, info, trace};

use super::server::ConnectionManager;
use super::session::ConnectionKey;
use crate::core::{Network, SessionError};
use crate::transport::Inbound;

/// Capacity of the command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Errors returned through a [`DriverHandle`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The session refused the operation.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// The driver is no longer running.
    #[error("driver shut down")]
    Shutdown,
}

/// Application request executed on the driver task.
#[derive(Debug)]
pub enum Command {
    /// Send bytes on a session.
    Send {
        /// Target session.
        key: ConnectionKey,
        /// Bytes to send.
        data: Vec<u8>,
        /// Outcome of the send.
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    /// Close our direction of a session.
    Close {
        /// Target session.
        key: ConnectionKey,
        /// Outcome of the close.
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    /// Stop the event loop.
    Shutdown,
}

/// Cloneable handle for issuing commands to a running [`Driver`].
#[derive(Debug, Clone)]
pub struct DriverHandle {
    tx: mpsc::Sender<Command>,
}

impl DriverHandle {
    /// Send `data` on the session for `key`.
    pub async fn send(&self, key: ConnectionKey, data: impl Into<Vec<u8>>) -> Result<(), DriverError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Send {
            key,
            data: data.into(),
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| DriverError::Shutdown)??)
    }

    /// Close our direction of the session for `key`.
    pub async fn close(&self, key: ConnectionKey) -> Result<(), DriverError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Close { key, reply }).await?;
        Ok(rx.await.map_err(|_| DriverError::Shutdown)??)
    }

    /// Ask the driver to stop.
    pub async fn shutdown(&self) -> Result<(), DriverError> {
        self.request(Command::Shutdown).await
    }

    async fn request(&self, command: Command) -> Result<(), DriverError> {
        self.tx.send(command).await.map_err(|_| DriverError::Shutdown)
    }
}

/// Single-task event loop around a [`ConnectionManager`].
pub struct Driver<N: Network> {
    manager: ConnectionManager<N>,
    inbound: mpsc::Receiver<Inbound>,
    commands: mpsc::Receiver<Command>,
}

impl<N: Network> Driver<N> {
    /// Wrap `manager`, reading segments from `inbound`.
    pub fn new(manager: ConnectionManager<N>, inbound: mpsc::Receiver<Inbound>) -> (Self, DriverHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        (
            Self {
                manager,
                inbound,
                commands,
            },
            DriverHandle { tx },
        )
    }

    /// Run until shut down, the inbound channel closes, or every handle is dropped.
    ///
    /// Returns the manager so the caller can inspect or reuse it.
    pub async fn run(mut self) -> ConnectionManager<N> {
        info!(port = self.manager.config().port, "driver started");

        loop {
            let deadline = self.manager.poll_timeout();

            tokio::select! {
                inbound = self.inbound.recv() => {
                    let Some(Inbound { src, dst, segment }) = inbound else {
                        debug!("inbound channel closed");
                        break;
                    };
                    match self.manager.on_segment(src, dst, &segment, now()) {
                        Err(err) if err.is_integrity_failure() => {
                            debug!(%src, %err, "damaged segment dropped");
                        }
                        Err(err) => trace!(%src, %err, "segment dropped"),
                        Ok(()) => {}
                    }
                }
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Send { key, data, reply }) => {
                            let _ = reply.send(self.manager.send(&key, &data, now()));
                        }
                        Some(Command::Close { key, reply }) => {
                            let _ = reply.send(self.manager.close(&key, now()));
                        }
                        Some(Command::Shutdown) | None => break,
                    }
                }
                _ = sleep_until(deadline) => {
                    self.manager.handle_timeout(now());
                }
            }
        }

        info!(sessions = self.manager.len(), "driver stopped");
        self.manager
    }
}

/// Current time on the tokio clock, so paused-time tests stay consistent.
fn now() -> Instant {
    time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
