//! Bazaar CLI - session migrations and store management tools.
//!
//! # Usage
//!
//! ```bash
//! # Create the storefront session table
//! bazaar-cli migrate storefront
//!
//! # Create the admin session table (admin.session)
//! bazaar-cli migrate admin
//!
//! # Both
//! bazaar-cli migrate all
//!
//! # Load products and coupons from YAML
//! bazaar-cli seed data/catalog.yaml
//!
//! # Make an existing account an admin
//! bazaar-cli promote -e owner@example.in -r admin
//! ```
//!
//! # Commands
//!
//! - `migrate` - Create session-store tables
//! - `seed` - Insert catalog and coupons through the platform
//! - `promote` - Change an account's role

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use bazaar_core::UserRole;

mod commands;

#[derive(Parser)]
#[command(name = "bazaar-cli")]
#[command(author, version, about = "Bazaar CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create session-store tables
    Migrate {
        #[command(subcommand)]
        target: MigrateTarget,
    },
    /// Seed products and coupons from a YAML file
    Seed {
        /// Path to the YAML file
        file: String,
    },
    /// Change an account's role
    Promote {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// New role (`customer`, `admin`, `delivery_partner`)
        #[arg(short, long, default_value = "admin")]
        role: UserRole,
    },
}

#[derive(Subcommand)]
enum MigrateTarget {
    /// Storefront session table
    Storefront,
    /// Admin session table
    Admin,
    /// Both session tables
    All,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Migrate { target } => match target {
            MigrateTarget::Storefront => commands::migrate::storefront().await?,
            MigrateTarget::Admin => commands::migrate::admin().await?,
            MigrateTarget::All => {
                commands::migrate::storefront().await?;
                commands::migrate::admin().await?;
            }
        },
        Commands::Seed { file } => {
            let backend = commands::platform_backend()?;
            let summary = commands::seed::from_file(&backend, &file).await?;
            tracing::info!(
                products = summary.products_created,
                coupons = summary.coupons_created,
                skipped = summary.skipped,
                "Seeding complete"
            );
        }
        Commands::Promote { email, role } => {
            let backend = commands::platform_backend()?;
            commands::roles::promote(&backend, &email, role).await?;
        }
    }
    Ok(())
}
