//! HTTP surface: login, session CRUD, and the streaming attach endpoint.
//!
//! | Route | Auth | Purpose |
//! |---|---|---|
//! | `GET /api/health` | public | liveness probe |
//! | `POST /api/login` | public | exchange the password for a token |
//! | `POST /api/logout` | token | revoke the presented token |
//! | `GET /api/sessions` | token | list sessions, oldest first |
//! | `POST /api/sessions` | token | create a session |
//! | `PUT /api/sessions/:id` | token | rename a session |
//! | `DELETE /api/sessions/:id` | token | delete a session and its history |
//! | `GET /ws/:id` | token | attach to a session |

pub mod handlers;
pub mod middleware;
pub mod ws;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use protocol::ErrorBody;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::auth::AuthService;
use crate::session::{SessionError, SessionManager};
use crate::transport::HeartbeatConfig;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    /// Session registry.
    pub sessions: Arc<dyn SessionManager>,
    /// Password check and token store.
    pub auth: Arc<AuthService>,
    /// Heartbeat timing for streaming connections.
    pub heartbeat: HeartbeatConfig,
}

/// Error returned by handlers, rendered as `{"error": msg}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(_) | SessionError::AlreadyTerminated(_) => {
                ApiError::NotFound("session not found".to_string())
            }
            SessionError::LimitReached(_) => ApiError::Unavailable(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/logout", post(handlers::logout))
        .route(
            "/api/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route(
            "/api/sessions/:id",
            put(handlers::rename_session).delete(handlers::delete_session),
        )
        .route("/ws/:id", get(ws::attach))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_token,
        ));

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/login", post(handlers::login))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors_layer())
        .with_state(state)
}
