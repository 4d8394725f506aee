//! Configuration types for Reverie.
//!
//! `ReverieConfig` represents `{data_dir}/config.toml`. Every section and field
//! has a default, so an empty or missing file yields a working configuration.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReverieConfig {
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

/// How concurrent admissions for the same user are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    /// Admissions for one user run one at a time; no double spending.
    #[default]
    Serialized,
    /// Read-then-write without a lock; concurrent requests may double-spend.
    Relaxed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_free_initial_count")]
    pub free_initial_count: u32,
    #[serde(default = "default_premium_daily_count")]
    pub premium_daily_count: u32,
    #[serde(default = "default_free_cooldown_days")]
    pub free_cooldown_days: u32,
    #[serde(default)]
    pub admission_mode: AdmissionMode,
    /// Six-field cron expression (with seconds) for the premium reset.
    #[serde(default = "default_premium_reset_cron")]
    pub premium_reset_cron: String,
    /// UTC offset, in hours, of the clock `premium_reset_cron` is evaluated in.
    #[serde(default = "default_premium_reset_offset")]
    pub premium_reset_timezone_offset_hours: i32,
}

fn default_free_initial_count() -> u32 {
    3
}

fn default_premium_daily_count() -> u32 {
    20
}

fn default_free_cooldown_days() -> u32 {
    3
}

fn default_premium_reset_cron() -> String {
    "0 0 0 * * *".to_string()
}

fn default_premium_reset_offset() -> i32 {
    3
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_initial_count: default_free_initial_count(),
            premium_daily_count: default_premium_daily_count(),
            free_cooldown_days: default_free_cooldown_days(),
            admission_mode: AdmissionMode::default(),
            premium_reset_cron: default_premium_reset_cron(),
            premium_reset_timezone_offset_hours: default_premium_reset_offset(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_list_ttl")]
    pub list_ttl_secs: u64,
    #[serde(default = "default_detail_ttl")]
    pub detail_ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
}

fn default_list_ttl() -> u64 {
    300
}

fn default_detail_ttl() -> u64 {
    3600
}

fn default_cache_capacity() -> u64 {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            list_ttl_secs: default_list_ttl(),
            detail_ttl_secs: default_detail_ttl(),
            max_capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_url")]
    pub base_url: String,
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,
    /// Max characters of each prior opening prompt sent as context.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "default_prior_sessions")]
    pub prior_sessions: u32,
}

fn default_oracle_url() -> String {
    "http://localhost:3002".to_string()
}

fn default_oracle_timeout() -> u64 {
    60
}

fn default_preview_chars() -> usize {
    100
}

fn default_prior_sessions() -> u32 {
    2
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_oracle_url(),
            timeout_secs: default_oracle_timeout(),
            preview_chars: default_preview_chars(),
            prior_sessions: default_prior_sessions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Outbound buffer per connection; events beyond it are dropped.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_channel_capacity() -> usize {
    64
}

fn default_broadcast_capacity() -> usize {
    256
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

/// Relay integration settings. The relay is disabled when `secret` is unset.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub secret: Option<String>,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_title_chars")]
    pub title_chars: usize,
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

fn default_title_chars() -> usize {
    40
}

fn default_page_size() -> u32 {
    15
}

fn default_max_page_size() -> u32 {
    100
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            title_chars: default_title_chars(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}
