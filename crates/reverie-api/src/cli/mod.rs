//! CLI command definitions for the `reverie` binary.
//!
//! Uses clap derive macros for argument parsing. Administrative commands
//! follow a noun-verb pattern (e.g., `reverie user create`, `reverie quota reset-premium`).

pub mod quota;
pub mod session;
pub mod user;

use clap::{Parser, Subcommand};

/// Dream interpretation sessions, quota-gated.
#[derive(Parser)]
#[command(name = "reverie", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format: pretty or json.
    #[arg(long, global = true, env = "REVERIE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API and push socket server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, env = "REVERIE_PORT", default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, env = "REVERIE_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Export spans to stdout through OpenTelemetry.
        #[arg(long)]
        otel: bool,
    },

    /// Manage users.
    User {
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Quota administration.
    Quota {
        #[command(subcommand)]
        action: QuotaCommand,
    },

    /// Session administration.
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Create a user and print a freshly issued API token.
    Create {
        /// Name used when addressing the user.
        #[arg(long)]
        name: Option<String>,

        /// Birth date, YYYY-MM-DD.
        #[arg(long)]
        birth_date: Option<String>,

        /// Identifier of the user on the relay side.
        #[arg(long)]
        external_id: Option<String>,

        /// Create the user on the premium tier.
        #[arg(long)]
        premium: bool,
    },

    /// Show a user's profile and quota state.
    Show {
        /// User id.
        id: String,
    },

    /// Upgrade a user to premium.
    Upgrade {
        /// User id.
        id: String,
    },

    /// Ban or reinstate a user.
    SetStatus {
        /// User id.
        id: String,

        /// New status: active or banned.
        status: String,
    },
}

#[derive(Subcommand)]
pub enum QuotaCommand {
    /// Restore the daily allowance of every premium user now.
    ResetPremium,
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Delete any session, bypassing ownership.
    #[command(alias = "rm")]
    Delete {
        /// Session id.
        id: String,
    },
}
