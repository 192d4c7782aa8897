//! Gasto CLI - Bank sync and transaction categorization
//!
//! Usage:
//!   gasto init                                  Initialize database
//!   gasto link --user 1 ITEM_ID                 Link Pluggy accounts
//!   gasto sync --user 1 3 --from .. --to ..     Pull transactions
//!   gasto categorize --user 1                   Categorize transactions
//!   gasto serve --port 3000                     Start web server

mod cli;
mod commands;


use anyhow::{Context, Result};
use clap::Parser;
use gasto_core::Settings;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Classify {
            description,
            amount,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let classifier = commands::build_classifier(&db, &settings);
            commands::cmd_classify(&classifier, &description, amount).await
        }
        Commands::Categorize { user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let classifier = commands::build_classifier(&db, &settings);
            commands::cmd_categorize(&db, classifier, &settings, user).await
        }
        Commands::Jobs { user, json } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_jobs(&db, user, json)
        }
        Commands::Accounts { user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_accounts(&db, user)
        }
        Commands::Link { user, item_id } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let sync = commands::bank_sync(&db, &settings)?;
            commands::cmd_link(&sync, user, &item_id).await
        }
        Commands::Disconnect { user, account } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_disconnect(&db, user, account)
        }
        Commands::Sync {
            user,
            account,
            from,
            to,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let sync = commands::bank_sync(&db, &settings)?;
            commands::cmd_sync(&sync, user, account, from, to).await
        }
        Commands::Categories => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_categories(&db)
        }
        Commands::Cache { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                CacheAction::Prune => commands::cmd_cache_prune(&db),
                CacheAction::Stats => commands::cmd_cache_stats(&db),
            }
        }
        Commands::Serve {
            port,
            host,
            allowed_origins,
        } => {
            commands::cmd_serve(
                &cli.db,
                &settings,
                &host,
                port,
                allowed_origins,
                cli.no_encrypt,
            )
            .await
        }
    }
}
