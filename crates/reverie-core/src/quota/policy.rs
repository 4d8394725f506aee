//! Pure quota admission rules.
//!
//! - PREMIUM: admitted iff `remaining > 0`; admission decrements `remaining`.
//! - FREE: admitted iff `remaining > 0` or the cooldown since the last free
//!   interpretation has lapsed (a user who never had one is past any cooldown).
//!   Admission decrements `remaining` when positive and always stamps
//!   `last_free_interpretation_at = now`.
//!
//! A charge is relative to the stored row, not to the snapshot it was decided
//! on, so a reset or upgrade landing mid-admission is kept.

use chrono::{DateTime, Duration, Utc};
use reverie_types::config::QuotaConfig;
use reverie_types::error::QuotaDenial;
use reverie_types::user::{QuotaView, SubscriptionTier, User};

/// Cost of an admitted interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaCharge {
    /// Take one unit from the stored allowance (saturating at zero).
    pub decrement: bool,
    /// New free-tier stamp. `None` leaves the stored value untouched.
    pub stamp_free_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    pub free_initial_count: u32,
    pub premium_daily_count: u32,
    pub free_cooldown: Duration,
}

impl QuotaPolicy {
    pub fn from_config(config: &QuotaConfig) -> Self {
        Self {
            free_initial_count: config.free_initial_count,
            premium_daily_count: config.premium_daily_count,
            free_cooldown: Duration::days(i64::from(config.free_cooldown_days)),
        }
    }

    /// Allowance granted on registration or reset for a tier.
    pub fn allowance(&self, tier: SubscriptionTier) -> u32 {
        match tier {
            SubscriptionTier::Free => self.free_initial_count,
            SubscriptionTier::Premium => self.premium_daily_count,
        }
    }

    /// Decide admission for `user` at `now` and compute the charge.
    pub fn evaluate(&self, user: &User, now: DateTime<Utc>) -> Result<QuotaCharge, QuotaDenial> {
        let remaining = user.remaining_interpretations;
        match user.tier {
            SubscriptionTier::Premium => {
                if remaining == 0 {
                    return Err(QuotaDenial::AllowanceExhausted);
                }
                Ok(QuotaCharge {
                    decrement: true,
                    stamp_free_at: None,
                })
            }
            SubscriptionTier::Free => {
                if remaining == 0 {
                    if let Some(available_at) = self.cooldown_until(user, now) {
                        return Err(QuotaDenial::CooldownActive { available_at });
                    }
                }
                Ok(QuotaCharge {
                    decrement: remaining > 0,
                    stamp_free_at: Some(now),
                })
            }
        }
    }

    /// End of the active free-tier cooldown, or `None` when it has lapsed.
    fn cooldown_until(&self, user: &User, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let last = user.last_free_interpretation_at?;
        let available_at = last + self.free_cooldown;
        (now < available_at).then_some(available_at)
    }

    pub fn view(&self, user: &User, now: DateTime<Utc>) -> QuotaView {
        let (admitted, available_at) = match self.evaluate(user, now) {
            Ok(_) => (true, None),
            Err(QuotaDenial::CooldownActive { available_at }) => (false, Some(available_at)),
            Err(QuotaDenial::AllowanceExhausted) => (false, None),
        };
        QuotaView {
            tier: user.tier,
            remaining_interpretations: user.remaining_interpretations,
            admitted,
            available_at,
        }
    }
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self::from_config(&QuotaConfig::default())
    }
}
