//! `GET /ws/:id`: upgrade and hand the socket to the transport adapter.

use axum::{
    extract::{ws::rejection::WebSocketUpgradeRejection, Path, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;

use super::{ApiError, AppState};
use crate::transport;

/// Attaches the caller to a live session.
///
/// Unknown sessions are rejected before the upgrade so the client sees a
/// plain 404.
pub async fn attach(
    State(state): State<AppState>,
    Path(id): Path<String>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let session = state
        .sessions
        .get(&id)
        .ok_or_else(|| ApiError::NotFound("session not found".to_string()))?;

    let upgrade = upgrade.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let heartbeat = state.heartbeat;

    Ok(upgrade
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            if let Err(e) = transport::serve(session, sink, stream, heartbeat).await {
                tracing::debug!(session_id = %id, error = %e, "Streaming connection ended");
            }
        })
        .into_response())
}
