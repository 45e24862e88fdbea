//! tinytcp - Server
//!
//! Passive-open TCP server: [`ConnectionManager`] accepts connections on one
//! port and routes segments to per-connection [`Session`]s. With the
//! `runtime` feature, [`Driver`] hosts the manager on a tokio task.

mod config;
#[cfg(feature = "runtime")]
mod driver;
#[allow(clippy::module_inception)]
mod server;
mod session;

pub use config::{ServerConfig, ServerConfigBuilder};
#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub use driver::{Command, Driver, DriverError, DriverHandle};
pub use server::{ConnectionHandler, ConnectionManager};
pub use session::{ConnectionKey, DataHandler, SegmentOutcome, Session, SessionState};
