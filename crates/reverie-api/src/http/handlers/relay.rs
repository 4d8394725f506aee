//! Relay HTTP handlers.
//!
//! The relay is a trusted bridge to another messaging surface. It acts on
//! behalf of its users, identified by their external id, and authenticates
//! with the shared relay secret.
//!
//! Endpoints:
//! - POST /api/v1/relay/auth-success                 - Announce a user's authentication
//! - GET  /api/v1/relay/users/{external_id}          - Profile and quota view
//! - POST /api/v1/relay/interpret                    - Start a session for a user
//! - POST /api/v1/relay/sessions/{id}/messages       - Continue a user's session

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use reverie_core::chat::orchestrator::Origin;

use crate::http::error::AppError;
use crate::http::extractors::auth::RelayAuth;
use crate::http::handlers::account::ProfileBody;
use crate::http::handlers::chat::{
    AssistantReplyBody, CreatedSessionBody, json_body, parse_uuid,
};
use crate::http::response::{ApiResponse, RequestClock};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSuccessBody {
    pub external_user_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeliveryBody {
    pub delivered: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayPromptBody {
    pub external_user_id: String,
    pub text: String,
}

/// POST /api/v1/relay/auth-success - Push `user_authed` to the relay socket.
pub async fn auth_success(
    State(state): State<AppState>,
    _relay: RelayAuth,
    payload: Result<Json<AuthSuccessBody>, JsonRejection>,
) -> Result<ApiResponse<DeliveryBody>, AppError> {
    let clock = RequestClock::start();
    let body = json_body(payload)?;

    let delivered = state
        .accounts
        .notify_relay_user_authed(&body.external_user_id, body.name)
        .await?;

    Ok(clock.success(DeliveryBody { delivered }))
}

/// GET /api/v1/relay/users/{external_id} - Profile and quota view.
pub async fn get_user(
    State(state): State<AppState>,
    _relay: RelayAuth,
    Path(external_id): Path<String>,
) -> Result<ApiResponse<ProfileBody>, AppError> {
    let clock = RequestClock::start();
    let user = state.accounts.find_by_external_id(&external_id).await?;
    let quota = state.accounts.quota_view(&user);
    Ok(clock.success(ProfileBody::new(&user, quota)))
}

/// POST /api/v1/relay/interpret - Start a session on behalf of a relay user.
pub async fn interpret(
    State(state): State<AppState>,
    _relay: RelayAuth,
    payload: Result<Json<RelayPromptBody>, JsonRejection>,
) -> Result<(StatusCode, ApiResponse<CreatedSessionBody>), AppError> {
    let clock = RequestClock::start();
    let body = json_body(payload)?;
    let user = state.accounts.find_by_external_id(&body.external_user_id).await?;

    let created = state
        .orchestrator
        .create_session(
            &user.id,
            &body.text,
            Origin::Relay {
                external_user_id: body.external_user_id,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, clock.success(CreatedSessionBody::from(created))))
}

/// POST /api/v1/relay/sessions/{id}/messages - Continue a relay user's session.
pub async fn append_message(
    State(state): State<AppState>,
    _relay: RelayAuth,
    Path(session_id): Path<String>,
    payload: Result<Json<RelayPromptBody>, JsonRejection>,
) -> Result<ApiResponse<AssistantReplyBody>, AppError> {
    let clock = RequestClock::start();
    let sid = parse_uuid(&session_id)?;
    let body = json_body(payload)?;
    let user = state.accounts.find_by_external_id(&body.external_user_id).await?;

    let assistant_text = state
        .orchestrator
        .append_message(
            &user.id,
            &sid,
            &body.text,
            Origin::Relay {
                external_user_id: body.external_user_id,
            },
        )
        .await?;

    Ok(clock.success(AssistantReplyBody { assistant_text }))
}
