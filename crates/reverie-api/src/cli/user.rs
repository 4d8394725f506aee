//! User administration CLI commands: create, show, upgrade, set-status.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use console::style;

use reverie_types::user::{AccountStatus, NewUser, SubscriptionTier, User, UserId};

use crate::state::AppState;

fn parse_user_id(id: &str) -> Result<UserId> {
    id.parse::<UserId>()
        .map_err(|e| anyhow::anyhow!("invalid user id '{id}': {e}"))
}

fn print_profile(state: &AppState, user: &User) {
    let quota = state.accounts.quota_view(user);

    println!(
        "  {}  {}",
        style("Id:").bold(),
        style(user.id).cyan()
    );
    println!("  {}  {}", style("Name:").bold(), user.display_name());
    if let Some(birth_date) = user.birth_date {
        println!("  {}  {}", style("Born:").bold(), birth_date);
    }
    if let Some(external_id) = &user.external_id {
        println!("  {}  {}", style("External id:").bold(), external_id);
    }
    println!("  {}  {}", style("Tier:").bold(), user.tier);
    println!("  {}  {}", style("Status:").bold(), user.status);
    println!(
        "  {}  {}",
        style("Remaining:").bold(),
        quota.remaining_interpretations
    );
    if let Some(at) = quota.available_at {
        println!(
            "  {}  {}",
            style("Next free:").bold(),
            style(at.format("%Y-%m-%d %H:%M UTC")).yellow()
        );
    }
}

/// Create a user and print its token once.
///
/// # Examples
///
/// ```bash
/// reverie user create --name "Mira" --birth-date 1992-07-14
/// reverie user create --external-id tg-42 --premium
/// ```
pub async fn create_user(
    state: &AppState,
    name: Option<String>,
    birth_date: Option<String>,
    external_id: Option<String>,
    premium: bool,
    json: bool,
) -> Result<()> {
    let birth_date = birth_date
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .with_context(|| format!("invalid birth date '{s}', expected YYYY-MM-DD"))
        })
        .transpose()?;

    let request = NewUser {
        name,
        birth_date,
        external_id,
        tier: if premium {
            SubscriptionTier::Premium
        } else {
            SubscriptionTier::Free
        },
    };

    let user = state.accounts.register_user(request).await?;
    let token = state.tokens.issue(&user.id).await?;

    if json {
        let out = serde_json::json!({ "user": user, "token": token });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("  {} User created", style("✓").green().bold());
    println!();
    print_profile(state, &user);
    println!();
    println!(
        "  {} API token (save this -- it won't be shown again):",
        style("🔑").bold()
    );
    println!();
    println!("  {}", style(&token).yellow().bold());
    println!();
    Ok(())
}

pub async fn show_user(state: &AppState, id: &str, json: bool) -> Result<()> {
    let user = state.accounts.get_user(&parse_user_id(id)?).await?;

    if json {
        let out = serde_json::json!({
            "user": user,
            "quota": state.accounts.quota_view(&user),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    print_profile(state, &user);
    println!();
    Ok(())
}

pub async fn upgrade_user(state: &AppState, id: &str, json: bool) -> Result<()> {
    let user = state
        .accounts
        .upgrade_to_premium(&parse_user_id(id)?)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {} is now {} with {} interpretations",
        style("✓").green().bold(),
        style(user.display_name()).cyan(),
        style(user.tier).bold(),
        user.remaining_interpretations
    );
    println!();
    Ok(())
}

pub async fn set_status(state: &AppState, id: &str, status: &str, json: bool) -> Result<()> {
    let status: AccountStatus = status.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let user = state
        .accounts
        .set_status(&parse_user_id(id)?, status)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
        return Ok(());
    }

    let mark = match user.status {
        AccountStatus::Active => style("✓").green().bold(),
        AccountStatus::Banned => style("✗").red().bold(),
    };
    println!();
    println!(
        "  {} {} status set to {}",
        mark,
        style(user.display_name()).cyan(),
        user.status
    );
    println!();
    Ok(())
}
