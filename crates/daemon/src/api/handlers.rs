//! REST handlers.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use protocol::{
    CreateSessionRequest, CreatedSession, HealthBody, LoginRequest, LoginResponse,
    RenameSessionRequest, SessionSummary, SuccessBody,
};

use super::middleware::{cleared_cookie, session_cookie, AuthToken};
use super::{ApiError, AppState};

/// `GET /api/health`
pub async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok".to_string(),
    })
}

/// `POST /api/login`
///
/// bcrypt verification is CPU-bound, so it runs on the blocking pool.
pub async fn login(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: LoginRequest = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("invalid request".to_string()))?;

    let auth = state.auth.clone();
    let token = tokio::task::spawn_blocking(move || auth.login(&request.password))
        .await
        .map_err(|e| ApiError::Internal(format!("login task failed: {}", e)))?
        .ok_or_else(|| {
            tracing::warn!("Rejected login attempt");
            ApiError::Unauthorized("invalid password".to_string())
        })?;

    let cookie = session_cookie(&token, state.auth.token_ttl());
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            success: true,
            token,
        }),
    ))
}

/// `POST /api/logout`
pub async fn logout(
    State(state): State<AppState>,
    Extension(AuthToken(token)): Extension<AuthToken>,
) -> impl IntoResponse {
    state.auth.logout(&token);
    ([(header::SET_COOKIE, cleared_cookie())], Json(SuccessBody::OK))
}

/// `GET /api/sessions`
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    let sessions = state.sessions.list().iter().map(|info| info.summary()).collect();
    Json(sessions)
}

/// `POST /api/sessions`
///
/// The body is optional; anything unparsable is treated as "no name".
pub async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: CreateSessionRequest = serde_json::from_slice(&body).unwrap_or_default();
    let name = request.name.unwrap_or_default();

    // Spawning forks a process and opens files.
    let sessions = state.sessions.clone();
    let info = tokio::task::spawn_blocking(move || sessions.create(&name))
        .await
        .map_err(|e| ApiError::Internal(format!("create task failed: {}", e)))??;

    Ok((
        StatusCode::CREATED,
        Json(CreatedSession {
            id: info.id,
            name: info.name,
        }),
    ))
}

/// `PUT /api/sessions/:id`
pub async fn rename_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<SuccessBody>, ApiError> {
    let name = serde_json::from_slice::<RenameSessionRequest>(&body)
        .map(|request| request.name)
        .unwrap_or_default();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }

    state.sessions.rename(&id, &name)?;
    Ok(Json(SuccessBody::OK))
}

/// `DELETE /api/sessions/:id`
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessBody>, ApiError> {
    let sessions = state.sessions.clone();
    tokio::task::spawn_blocking(move || sessions.delete(&id))
        .await
        .map_err(|e| ApiError::Internal(format!("delete task failed: {}", e)))??;
    Ok(Json(SuccessBody::OK))
}
