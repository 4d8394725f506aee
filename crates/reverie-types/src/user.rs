use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Unique identifier for a user, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Create a new UserId using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create a UserId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Subscription tier of a user.
///
/// Maps to the CHECK constraint `tier IN ('FREE', 'PREMIUM')`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionTier {
    Free,
    Premium,
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionTier::Free => write!(f, "FREE"),
            SubscriptionTier::Premium => write!(f, "PREMIUM"),
        }
    }
}

impl FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FREE" => Ok(SubscriptionTier::Free),
            "PREMIUM" => Ok(SubscriptionTier::Premium),
            other => Err(format!("invalid subscription tier: '{other}'")),
        }
    }
}

impl Default for SubscriptionTier {
    fn default() -> Self {
        SubscriptionTier::Free
    }
}

/// Lifecycle status of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Active,
    Banned,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "ACTIVE"),
            AccountStatus::Banned => write!(f, "BANNED"),
        }
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Ok(AccountStatus::Active),
            "BANNED" => Ok(AccountStatus::Banned),
            other => Err(format!("invalid account status: '{other}'")),
        }
    }
}

/// A user of the interpretation service.
///
/// Owned by the identity subsystem. The quota fields (`remaining_interpretations`,
/// `last_free_interpretation_at`) are written by the quota ledger on every
/// admitted interpretation and by the daily premium reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    /// Identifier of the user on the relay side (e.g. a messenger account id).
    pub external_id: Option<String>,
    pub tier: SubscriptionTier,
    pub remaining_interpretations: u32,
    pub last_free_interpretation_at: Option<DateTime<Utc>>,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name used when addressing the user; falls back to "User".
    pub fn display_name(&self) -> &str {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => "User",
        }
    }

    pub fn is_banned(&self) -> bool {
        self.status == AccountStatus::Banned
    }
}

/// Input for creating a user record.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub external_id: Option<String>,
    pub tier: SubscriptionTier,
}

/// Derived quota state of a user at a point in time. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaView {
    pub tier: SubscriptionTier,
    pub remaining_interpretations: u32,
    /// Whether an interpretation would be admitted right now.
    pub admitted: bool,
    /// When the free-tier cooldown lapses, if it is currently active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_at: Option<DateTime<Utc>>,
}
