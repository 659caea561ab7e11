//! Streaming transport: relays one attached viewer to its PTY session.

pub mod adapter;
pub mod utf8;

use std::time::Duration;

use thiserror::Error;

use crate::config::TransportConfig;
use crate::session::SessionError;

pub use adapter::serve;
pub use utf8::Utf8Decoder;

/// Why a streaming connection ended abnormally.
#[derive(Error, Debug)]
pub enum TransportError {
    /// A read or write on the connection failed.
    #[error("connection broken: {0}")]
    Broken(String),

    /// No pong arrived within the liveness bound.
    #[error("no pong received within {0:?}")]
    LivenessTimeout(Duration),

    /// An envelope could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    /// The session could not be attached.
    #[error("attach failed: {0}")]
    Session(#[from] SessionError),
}

/// Heartbeat timing for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Interval between pings.
    pub ping_interval: Duration,
    /// The connection is dropped if no pong arrives for this long.
    pub pong_wait: Duration,
    /// Bound on a single outbound write.
    pub write_wait: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self::from(&TransportConfig::default())
    }
}

impl From<&TransportConfig> for HeartbeatConfig {
    fn from(config: &TransportConfig) -> Self {
        Self {
            ping_interval: Duration::from_secs(config.ping_interval_secs),
            pong_wait: Duration::from_secs(config.pong_wait_secs),
            write_wait: Duration::from_secs(config.write_wait_secs),
        }
    }
}
