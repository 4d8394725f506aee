//! Bearer token authentication extractors.
//!
//! Credentials are read from `Authorization: Bearer <token>`. A token is either
//! a user's API token (SHA-256 hashed and looked up in `api_tokens`) or the
//! relay's shared secret.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use reverie_types::event::RecipientId;
use reverie_types::user::UserId;
use secrecy::ExposeSecret;

use crate::http::error::AppError;
use crate::state::AppState;

/// Who a presented credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    User(UserId),
    Relay,
}

impl Principal {
    pub fn recipient(&self) -> RecipientId {
        match self {
            Principal::User(id) => RecipientId::User(*id),
            Principal::Relay => RecipientId::Relay,
        }
    }
}

/// Authenticated end user. Extracting this validates the bearer token.
pub struct AuthUser(pub UserId);

/// Authenticated relay. Extracting this validates the shared secret.
pub struct RelayAuth;

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?.ok_or_else(missing_token)?;
        match resolve_principal(state, &token).await? {
            Principal::User(id) => Ok(AuthUser(id)),
            Principal::Relay => Err(AppError::Unauthorized(
                "The relay credential cannot be used on user endpoints.".to_string(),
            )),
        }
    }
}

impl FromRequestParts<AppState> for RelayAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.relay_secret.is_none() {
            return Err(AppError::RelayDisabled);
        }
        let token = bearer_token(&parts.headers)?.ok_or_else(missing_token)?;
        if is_relay_secret(state, &token) {
            Ok(RelayAuth)
        } else {
            Err(AppError::Unauthorized("Invalid relay credential.".to_string()))
        }
    }
}

fn missing_token() -> AppError {
    AppError::Unauthorized(
        "Missing token. Provide it via 'Authorization: Bearer <token>' header.".to_string(),
    )
}

/// Extract the bearer token from request headers, if any.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    let Some(auth) = headers.get("authorization") else {
        return Ok(None);
    };
    let auth_str = auth.to_str().map_err(|_| {
        AppError::Unauthorized("Invalid Authorization header encoding".to_string())
    })?;
    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        _ => Err(AppError::Unauthorized(
            "Authorization header must use the Bearer scheme".to_string(),
        )),
    }
}

fn is_relay_secret(state: &AppState, token: &str) -> bool {
    state
        .relay_secret
        .as_ref()
        .is_some_and(|secret| secret.expose_secret() == token)
}

/// Resolve a presented token to its principal.
pub async fn resolve_principal(state: &AppState, token: &str) -> Result<Principal, AppError> {
    if is_relay_secret(state, token) {
        return Ok(Principal::Relay);
    }

    let user_id = state
        .tokens
        .resolve(token)
        .await
        .map_err(|e| AppError::Internal(format!("Database error: {e}")))?;

    user_id
        .map(Principal::User)
        .ok_or_else(|| AppError::Unauthorized("Invalid token.".to_string()))
}
