//! Daily premium allowance reset, driven by `tokio-cron-scheduler`.
//!
//! The job runs `AccountService::reset_premium_allowances` on
//! `quota.premium_reset_cron`, evaluated in the fixed UTC offset
//! `quota.premium_reset_timezone_offset_hours`.

use anyhow::Context;
use chrono::{FixedOffset, Offset, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::state::AppState;

/// Fixed offset for the reset clock. Out-of-range offsets fall back to UTC.
fn reset_offset(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours.saturating_mul(3600)).unwrap_or_else(|| {
        tracing::warn!(hours, "invalid premium reset UTC offset, using UTC");
        Utc.fix()
    })
}

/// Start the scheduler with the premium reset job registered.
///
/// The returned scheduler must be kept alive and shut down on exit.
pub async fn start_premium_reset(state: &AppState) -> anyhow::Result<JobScheduler> {
    let quota = &state.config.quota;
    let offset = reset_offset(quota.premium_reset_timezone_offset_hours);

    let scheduler = JobScheduler::new()
        .await
        .context("failed to create job scheduler")?;

    let accounts = state.accounts.clone();
    let job = Job::new_async_tz(quota.premium_reset_cron.as_str(), offset, move |_uuid, _lock| {
        let accounts = accounts.clone();
        Box::pin(async move {
            match accounts.reset_premium_allowances().await {
                Ok(count) => tracing::info!(count, "scheduled premium reset completed"),
                Err(e) => tracing::error!(error = %e, "scheduled premium reset failed"),
            }
        })
    })
    .with_context(|| format!("invalid premium reset cron '{}'", quota.premium_reset_cron))?;

    scheduler
        .add(job)
        .await
        .context("failed to register premium reset job")?;
    scheduler
        .start()
        .await
        .context("failed to start job scheduler")?;

    tracing::info!(
        cron = %quota.premium_reset_cron,
        utc_offset_hours = quota.premium_reset_timezone_offset_hours,
        "premium reset scheduled"
    );
    Ok(scheduler)
}
