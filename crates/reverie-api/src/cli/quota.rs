//! Quota administration CLI commands.

use anyhow::Result;
use console::style;

use crate::state::AppState;

/// Restore every premium user's daily allowance, as the scheduled reset does.
pub async fn reset_premium(state: &AppState, json: bool) -> Result<()> {
    let count = state.accounts.reset_premium_allowances().await?;
    let allowance = state.config.quota.premium_daily_count;

    if json {
        let out = serde_json::json!({ "reset": count, "allowance": allowance });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Reset {} premium user(s) to {} interpretations",
        style("✓").green().bold(),
        style(count).cyan(),
        allowance
    );
    println!();
    Ok(())
}
