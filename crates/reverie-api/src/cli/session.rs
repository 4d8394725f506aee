//! Session administration CLI commands.

use anyhow::Result;
use console::style;
use uuid::Uuid;

use reverie_core::chat::orchestrator::Actor;

use crate::state::AppState;

/// Delete a session as an administrator.
pub async fn delete_session(state: &AppState, id: &str, json: bool) -> Result<()> {
    let session_id = id
        .parse::<Uuid>()
        .map_err(|e| anyhow::anyhow!("invalid session id '{id}': {e}"))?;

    state
        .orchestrator
        .delete_session(&Actor::Admin, &session_id)
        .await?;

    if json {
        println!("{}", serde_json::json!({ "deleted": session_id }));
        return Ok(());
    }

    println!();
    println!(
        "  {} Session {} deleted",
        style("✓").green().bold(),
        style(session_id).cyan()
    );
    println!();
    Ok(())
}
