use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use crate::models::{AppState, SessionResponse, SessionSettingsRequest};
use crate::session::SessionContext;
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route(
            "/api/sessions/{id}",
            get(get_session).patch(update_session).delete(delete_session),
        )
        .with_state(state)
}

/// POST /api/sessions - Start a session with optional keys and language
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<SessionSettingsRequest>,
) -> AppResult<impl IntoResponse> {
    let mut session = SessionContext::new(state.config.output.language);
    session.apply(request, state.config.llm.provider)?;

    let response = session.to_response();
    let id = state.sessions.insert(session).await;
    info!(session_id = %id, "Session created");

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/sessions/{id} - Session view with masked keys
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.to_response()))
}

/// PATCH /api/sessions/{id} - Update keys or language; "" clears a key
async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SessionSettingsRequest>,
) -> AppResult<Json<SessionResponse>> {
    let provider = state.config.llm.provider;
    let response = state
        .sessions
        .update(id, |session| {
            session.apply(request, provider)?;
            Ok(session.to_response())
        })
        .await?;

    info!(session_id = %id, "Session settings updated");
    Ok(Json(response))
}

/// DELETE /api/sessions/{id}
async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.sessions.remove(id).await?;
    info!(session_id = %id, "Session deleted");
    Ok(StatusCode::NO_CONTENT)
}
