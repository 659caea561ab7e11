//! Streaming envelope exchanged over an attached terminal connection.
//!
//! Every frame on the wire is a JSON object with a `type` discriminator:
//!
//! ```json
//! {"type":"input","data":"ls\n"}
//! {"type":"output","data":"file.txt\r\n"}
//! {"type":"resize","rows":24,"cols":80}
//! ```
//!
//! Empty `data` and zero `rows`/`cols` are omitted when serializing and
//! default to empty/zero when absent on input.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Discriminator for [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Keyboard input from a viewer, forwarded to the PTY.
    Input,
    /// Process output, sent from the daemon to a viewer.
    Output,
    /// Terminal geometry change requested by a viewer.
    Resize,
}

/// A single message unit on a streaming connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message discriminator.
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Payload for `input` and `output`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    /// Rows for `resize`.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub rows: u16,
    /// Columns for `resize`.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub cols: u16,
}

fn is_zero(value: &u16) -> bool {
    *value == 0
}

impl Envelope {
    /// Creates an `input` envelope.
    pub fn input(data: impl Into<String>) -> Self {
        Self {
            kind: MessageType::Input,
            data: data.into(),
            rows: 0,
            cols: 0,
        }
    }

    /// Creates an `output` envelope.
    pub fn output(data: impl Into<String>) -> Self {
        Self {
            kind: MessageType::Output,
            data: data.into(),
            rows: 0,
            cols: 0,
        }
    }

    /// Creates a `resize` envelope.
    pub fn resize(rows: u16, cols: u16) -> Self {
        Self {
            kind: MessageType::Resize,
            data: String::new(),
            rows,
            cols,
        }
    }

    /// Returns the requested geometry for a `resize` envelope.
    ///
    /// `None` unless this is a resize with both dimensions strictly positive;
    /// zero or missing dimensions are not a valid geometry.
    pub fn resize_dimensions(&self) -> Option<(u16, u16)> {
        match self.kind {
            MessageType::Resize if self.rows > 0 && self.cols > 0 => Some((self.rows, self.cols)),
            _ => None,
        }
    }

    /// Serializes the envelope to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ProtocolError::from)
    }

    /// Parses an envelope from a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(ProtocolError::from)
    }

    /// Parses an envelope from a binary frame holding JSON.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(ProtocolError::from)
    }
}
