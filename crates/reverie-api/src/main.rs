//! Reverie CLI and REST API entry point.
//!
//! Binary name: `reverie`
//!
//! Parses CLI arguments, initializes tracing, database and services, then
//! dispatches to the appropriate command handler or starts the server.

mod cli;
mod http;
mod scheduler;
mod state;

use clap::Parser;
use reverie_observe::tracing_setup::{LogFormat, init_tracing, shutdown_tracing};

use cli::{Cli, Commands, QuotaCommand, SessionCommand, UserCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,reverie_api=debug,reverie_core=debug,reverie_infra=debug",
        _ => "trace",
    };
    let format: LogFormat = cli.log_format.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let otel = matches!(cli.command, Commands::Serve { otel: true, .. });
    init_tracing(filter, format, otel).map_err(|e| anyhow::anyhow!(e))?;

    // Initialize application state (config, DB, services)
    let state = AppState::init().await?;

    let result = run(cli.command, state, cli.json).await;
    shutdown_tracing();
    result
}

async fn run(command: Commands, state: AppState, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Serve { port, host, .. } => serve(state, &host, port).await?,

        Commands::User { action } => match action {
            UserCommand::Create {
                name,
                birth_date,
                external_id,
                premium,
            } => {
                cli::user::create_user(&state, name, birth_date, external_id, premium, json)
                    .await?;
            }
            UserCommand::Show { id } => cli::user::show_user(&state, &id, json).await?,
            UserCommand::Upgrade { id } => cli::user::upgrade_user(&state, &id, json).await?,
            UserCommand::SetStatus { id, status } => {
                cli::user::set_status(&state, &id, &status, json).await?;
            }
        },

        Commands::Quota { action } => match action {
            QuotaCommand::ResetPremium => cli::quota::reset_premium(&state, json).await?,
        },

        Commands::Session { action } => match action {
            SessionCommand::Delete { id } => {
                cli::session::delete_session(&state, &id, json).await?;
            }
        },
    }

    Ok(())
}

async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let mut scheduler = scheduler::start_premium_reset(&state).await?;

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} Reverie API listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!(
        "  {} {}",
        console::style("Data directory:").dim(),
        state.data_dir.display()
    );
    if state.relay_secret.is_none() {
        println!(
            "  {}",
            console::style("Relay disabled (no [relay] secret in config.toml)").dim()
        );
    }
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "job scheduler shutdown failed");
    }
    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
