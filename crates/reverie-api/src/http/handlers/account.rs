//! Account HTTP handlers.
//!
//! Endpoints:
//! - GET /api/v1/me - The caller's profile and quota view

use axum::extract::State;
use chrono::NaiveDate;
use serde::Serialize;

use reverie_types::user::{AccountStatus, QuotaView, SubscriptionTier, User, UserId};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthUser;
use crate::http::response::{ApiResponse, RequestClock};
use crate::state::AppState;

/// Profile projection returned to users and to the relay.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBody {
    pub id: UserId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    pub tier: SubscriptionTier,
    pub status: AccountStatus,
    pub quota: QuotaView,
}

impl ProfileBody {
    pub fn new(user: &User, quota: QuotaView) -> Self {
        Self {
            id: user.id,
            name: user.display_name().to_string(),
            birth_date: user.birth_date,
            tier: user.tier,
            status: user.status,
            quota,
        }
    }
}

/// GET /api/v1/me - The caller's profile and quota view.
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<ApiResponse<ProfileBody>, AppError> {
    let clock = RequestClock::start();
    let user = state.accounts.get_user(&user_id).await?;
    let quota = state.accounts.quota_view(&user);
    Ok(clock.success(ProfileBody::new(&user, quota)))
}
