//! Garden Companion CLI - Database migrations and out-of-band administration.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! garden-cli migrate
//!
//! # Grant or revoke admin access
//! garden-cli admin promote -e gardener@example.com
//! garden-cli admin demote -e gardener@example.com
//!
//! # Activate a pending referral for a referee
//! garden-cli referral activate -e luc@example.com
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "garden-cli")]
#[command(author, version, about = "Garden Companion CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the admin flag on users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Manage referrals
    Referral {
        #[command(subcommand)]
        action: ReferralAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Grant admin access
    Promote {
        /// User email address
        #[arg(short, long)]
        email: String,
    },
    /// Revoke admin access
    Demote {
        /// User email address
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum ReferralAction {
    /// Mark a referee's pending referral as active
    Activate {
        /// Referee email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Promote { email } => commands::admin::set_admin(&email, true).await?,
            AdminAction::Demote { email } => commands::admin::set_admin(&email, false).await?,
        },
        Commands::Referral { action } => match action {
            ReferralAction::Activate { email } => commands::referral::activate(&email).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_admin_promote() {
        let cli = Cli::try_parse_from(["garden-cli", "admin", "promote", "-e", "a@example.com"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Admin { action: AdminAction::Promote { .. } })
        ));
    }
}
