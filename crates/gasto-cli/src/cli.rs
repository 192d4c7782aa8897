//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

/// Gasto - Categorize your bank transactions
#[derive(Parser)]
#[command(name = "gasto")]
#[command(about = "Personal finance backend: bank sync and transaction categorization", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "gasto.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set GASTO_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Settings file (defaults to ~/.config/gasto/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and seed the default categories
    Init,

    /// Classify a single transaction description
    Classify {
        /// Transaction description, e.g. "IFOOD *PEDIDO"
        description: String,

        /// Transaction amount, e.g. -50.00
        #[arg(short, long, allow_negative_numbers = true)]
        amount: Option<Decimal>,
    },

    /// Categorize every uncategorized transaction of a user
    Categorize {
        /// User ID
        #[arg(short, long)]
        user: i64,
    },

    /// List recent categorization jobs of a user
    Jobs {
        /// User ID
        #[arg(short, long)]
        user: i64,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// List a user's linked bank accounts
    Accounts {
        /// User ID
        #[arg(short, long)]
        user: i64,
    },

    /// Link every account of a Pluggy item
    Link {
        /// User ID
        #[arg(short, long)]
        user: i64,

        /// Pluggy item ID
        item_id: String,
    },

    /// Disconnect a linked account (its transactions are kept)
    Disconnect {
        /// User ID
        #[arg(short, long)]
        user: i64,

        /// Account ID
        account: i64,
    },

    /// Pull an account's transactions for a date range
    Sync {
        /// User ID
        #[arg(short, long)]
        user: i64,

        /// Account ID
        account: i64,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
    },

    /// List categories
    Categories,

    /// Classification cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Allowed CORS origin (repeatable)
        #[arg(long = "allow-origin")]
        allowed_origins: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Delete expired entries from the persistent cache
    Prune,
    /// Show how many entries the persistent cache holds
    Stats,
}
