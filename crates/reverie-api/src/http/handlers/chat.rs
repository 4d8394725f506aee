//! Chat session HTTP handlers.
//!
//! Endpoints:
//! - POST   /api/v1/chat                     - Start a session with an opening prompt
//! - POST   /api/v1/chat/{id}/messages       - Continue a session
//! - GET    /api/v1/chat?page=&limit=        - List own sessions, newest first
//! - GET    /api/v1/chat/{id}                - Session with its messages
//! - DELETE /api/v1/chat/{id}                - Delete a session

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use reverie_core::chat::orchestrator::{Actor, CreatedSession, Origin};
use reverie_types::chat::{SessionDetail, SessionPage};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthUser;
use crate::http::extractors::query::SessionListQuery;
use crate::http::response::{ApiResponse, RequestClock};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PromptBody {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSessionBody {
    pub session_id: Uuid,
    pub assistant_text: String,
}

impl From<CreatedSession> for CreatedSessionBody {
    fn from(created: CreatedSession) -> Self {
        Self {
            session_id: created.session_id,
            assistant_text: created.assistant_text,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReplyBody {
    pub assistant_text: String,
}

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid session id: {s}")))
}

/// Unwrap a JSON body, turning axum's rejection into an envelope error.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// POST /api/v1/chat - Start a session.
pub async fn create_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<PromptBody>, JsonRejection>,
) -> Result<(StatusCode, ApiResponse<CreatedSessionBody>), AppError> {
    let clock = RequestClock::start();
    let body = json_body(payload)?;

    let created = state
        .orchestrator
        .create_session(&user_id, &body.text, Origin::Web)
        .await?;

    Ok((StatusCode::CREATED, clock.success(CreatedSessionBody::from(created))))
}

/// POST /api/v1/chat/{id}/messages - Continue a session.
pub async fn append_message(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(session_id): Path<String>,
    payload: Result<Json<PromptBody>, JsonRejection>,
) -> Result<ApiResponse<AssistantReplyBody>, AppError> {
    let clock = RequestClock::start();
    let sid = parse_uuid(&session_id)?;
    let body = json_body(payload)?;

    let assistant_text = state
        .orchestrator
        .append_message(&user_id, &sid, &body.text, Origin::Web)
        .await?;

    Ok(clock.success(AssistantReplyBody { assistant_text }))
}

/// GET /api/v1/chat - List the caller's sessions.
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<SessionListQuery>,
) -> Result<ApiResponse<SessionPage>, AppError> {
    let clock = RequestClock::start();
    let page = state
        .orchestrator
        .settings()
        .page(query.page, query.limit);

    let sessions = state.orchestrator.list_sessions(&user_id, page).await?;

    Ok(clock.success(sessions).with_link(
        "self",
        &format!("/api/v1/chat?page={}&limit={}", page.page, page.page_size),
    ))
}

/// GET /api/v1/chat/{id} - Session detail.
pub async fn get_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(session_id): Path<String>,
) -> Result<ApiResponse<SessionDetail>, AppError> {
    let clock = RequestClock::start();
    let sid = parse_uuid(&session_id)?;

    let detail = state
        .orchestrator
        .get_session(&Actor::User(user_id), &sid)
        .await?;

    Ok(clock.success(detail))
}

/// DELETE /api/v1/chat/{id} - Delete a session and its messages.
pub async fn delete_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let sid = parse_uuid(&session_id)?;

    state
        .orchestrator
        .delete_session(&Actor::User(user_id), &sid)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
