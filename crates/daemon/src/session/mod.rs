//! Session management module.
//!
//! This module provides PTY spawning, output fan-out, history logs and the
//! session registry. Sessions can be created, attached to, detached from,
//! resized, renamed, and deleted.

pub mod history;
pub mod manager;
pub mod multiplexer;
pub mod pty;

pub use history::HistoryStore;
pub use manager::{ManagerConfig, SessionInfo, SessionManager, SessionManagerImpl};
pub use multiplexer::{Consumer, ConsumerId, ConsumerSet, ConsumerStats, DEFAULT_QUEUE_CAPACITY};
pub use pty::{ExitCallback, PtySession, SessionError, SessionId, SpawnOptions};
