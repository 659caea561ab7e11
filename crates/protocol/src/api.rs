//! Request and response bodies for the REST surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout used in session listings.
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Authentication
// ============================================================================

/// Body of `POST /api/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Shared password.
    pub password: String,
}

/// Successful login response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Always `true`.
    pub success: bool,
    /// Opaque access token.
    pub token: String,
}

// ============================================================================
// Sessions
// ============================================================================

/// Listing entry for a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Creation time, `YYYY-MM-DD HH:MM:SS` in UTC.
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl SessionSummary {
    /// Builds a summary, formatting the creation instant.
    pub fn new(id: impl Into<String>, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at: created_at.format(CREATED_AT_FORMAT).to_string(),
        }
    }
}

/// Body of `POST /api/sessions`. The whole body is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// Display name; defaults to the session ID.
    #[serde(default)]
    pub name: Option<String>,
}

/// Response to a successful create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSession {
    /// Session identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Body of `PUT /api/sessions/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameSessionRequest {
    /// New display name. Must not be empty.
    #[serde(default)]
    pub name: String,
}

// ============================================================================
// Generic bodies
// ============================================================================

/// `{"success": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessBody {
    /// Always `true`.
    pub success: bool,
}

impl SuccessBody {
    /// The only value this body ever carries.
    pub const OK: SuccessBody = SuccessBody { success: true };
}

/// `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error.
    pub error: String,
}

impl ErrorBody {
    /// Creates an error body.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// `{"status": "ok"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBody {
    /// Service status.
    pub status: String,
}
