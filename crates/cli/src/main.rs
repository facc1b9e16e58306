//! Atelier CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! atelier migrate
//!
//! # Create a staff account
//! atelier user create -e ops@example.com -p 'long-passphrase' -r admin -f Priya
//!
//! # Delete expired PayU payment attempts
//! atelier payments purge-expired
//! ```
//!
//! # Environment Variables
//!
//! - `ATELIER_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "atelier")]
#[command(author, version, about = "Atelier CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Payment maintenance
    Payments {
        #[command(subcommand)]
        action: PaymentsAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create an account with any role
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Initial password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Role (`customer`, `warehouse`, `admin`, `super_admin`)
        #[arg(short, long, default_value = "admin")]
        role: String,

        /// First name
        #[arg(short, long, default_value = "Atelier")]
        first_name: String,

        /// Last name
        #[arg(short, long, default_value = "")]
        last_name: String,
    },
}

#[derive(Subcommand)]
enum PaymentsAction {
    /// Delete payment attempts past their expiry
    PurgeExpired,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                password,
                role,
                first_name,
                last_name,
            } => {
                commands::user::create(&email, &password, &role, &first_name, &last_name).await?;
            }
        },
        Commands::Payments { action } => match action {
            PaymentsAction::PurgeExpired => commands::payments::purge_expired().await?,
        },
    }
    Ok(())
}
