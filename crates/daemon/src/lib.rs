//! # Conductor Daemon Library
//!
//! This crate provides the daemon behind Conductor: shell sessions that live
//! on the host and can be watched and typed into from any number of browsers
//! at once.
//!
//! ## Overview
//!
//! - **PTY Sessions**: one shell per session, an append-only history log and
//!   a non-blocking fan-out to every attached viewer
//! - **Session Registry**: create, list, rename and delete sessions; sessions
//!   whose shell exits remove themselves
//! - **Authentication**: a shared password exchanged for expiring tokens
//! - **Transport**: the per-connection relay with heartbeat and replay
//! - **HTTP surface**: REST endpoints and the streaming attach endpoint
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Daemon Orchestrator                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │              HTTP router (axum, token gate)            │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐   │
//! │  │   Session    │  │  Transport   │  │   Auth Service   │   │
//! │  │   Registry   │  │   Adapter    │  │ (tokens, sweep)  │   │
//! │  └──────┬───────┘  └──────┬───────┘  └──────────────────┘   │
//! │         │                 │                                  │
//! │  ┌──────▼─────────────────▼─────┐                            │
//! │  │ PTY Session ─ history log    │                            │
//! │  │            └─ consumer set   │                            │
//! │  └──────────────────────────────┘                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daemon::{Config, DaemonOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::load_default()?;
//!     config.apply_env_overrides();
//!
//!     let mut orchestrator = DaemonOrchestrator::new(config)?;
//!     orchestrator.start().await?;
//!
//!     // Wait for shutdown signal...
//!
//!     orchestrator.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading, defaults and validation
//! - [`session`]: PTY sessions, history logs and the registry
//! - [`auth`]: Password verification and token store
//! - [`transport`]: Streaming connection relay
//! - [`api`]: HTTP routes and middleware
//! - [`pidfile`]: PID file bookkeeping
//! - [`orchestrator`]: Main daemon coordinator

pub mod api;
pub mod auth;
pub mod config;
pub mod orchestrator;
pub mod pidfile;
pub mod session;
pub mod transport;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::Config;

// Re-export session types for convenience
pub use session::{
    PtySession, SessionError, SessionId, SessionInfo, SessionManager, SessionManagerImpl,
};

// Re-export auth types for convenience
pub use auth::{AuthService, TokenStore};

// Re-export transport types for convenience
pub use transport::{HeartbeatConfig, TransportError};

// Re-export api types for convenience
pub use api::{router, ApiError, AppState};

// Re-export orchestrator types for convenience
pub use orchestrator::{DaemonOrchestrator, OrchestratorState};
