//! FreshBites CLI - Database migrations, catalog seeding and account tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (schema and session store)
//! fb-cli migrate
//!
//! # Load a catalog export or a JSON array of products
//! fb-cli seed products catalog.json
//!
//! # Create an account with a role
//! fb-cli user create -u rahim -e rahim@example.com -n "Rahim Uddin" -r manager
//!
//! # Change the role of an existing account
//! fb-cli user set-role rahim manager
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `FB_CLI_PASSWORD` - Password for `user create` when `--password` is not given

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "fb-cli")]
#[command(author, version, about = "FreshBites CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Load data into the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert products from a JSON file
    Products {
        /// Catalog export (`{"products": [...], "premiumItems": [...]}`) or product array
        file: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new account
    Create {
        /// Login name
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role (`normal`, `premium`, `manager`)
        #[arg(short, long, default_value = "normal")]
        role: String,

        /// Password (falls back to `FB_CLI_PASSWORD`)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Change the role of an existing account
    SetRole {
        /// Login name
        username: String,

        /// Role (`normal`, `premium`, `manager`)
        role: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => {
                commands::seed::products(&file).await?;
            }
        },
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                email,
                name,
                role,
                password,
            } => {
                let password = password
                    .or_else(|| std::env::var("FB_CLI_PASSWORD").ok())
                    .ok_or("Provide --password or set FB_CLI_PASSWORD")?;
                commands::users::create(&username, &email, &name, &role, &password).await?;
            }
            UserAction::SetRole { username, role } => {
                commands::users::set_role(&username, &role).await?;
            }
        },
    }
    Ok(())
}
