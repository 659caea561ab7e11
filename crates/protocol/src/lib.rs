//! # Conductor Protocol Library
//!
//! Wire contract between the Conductor daemon and its browser clients.
//!
//! ## Overview
//!
//! - **Streaming envelopes**: the `input` / `output` / `resize` messages carried
//!   over an attached terminal connection, one connection per viewer
//! - **REST bodies**: login, session listing, create/rename/delete payloads
//! - **Errors**: a single [`ProtocolError`] for encode/decode failures
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{Envelope, MessageType};
//!
//! let frame = Envelope::resize(24, 80).to_json().unwrap();
//! let parsed = Envelope::from_json(&frame).unwrap();
//! assert_eq!(parsed.kind, MessageType::Resize);
//! assert_eq!(parsed.resize_dimensions(), Some((24, 80)));
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Streaming envelope definitions
//! - [`api`]: REST request/response bodies
//! - [`error`]: Error types

pub mod api;
pub mod error;
pub mod messages;

pub use api::{
    CreateSessionRequest, CreatedSession, ErrorBody, HealthBody, LoginRequest, LoginResponse,
    RenameSessionRequest, SessionSummary, SuccessBody, CREATED_AT_FORMAT,
};
pub use error::{ProtocolError, Result};
pub use messages::{Envelope, MessageType};
