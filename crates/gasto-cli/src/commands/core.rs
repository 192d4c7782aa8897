//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `build_classifier` - Classifier wired to the configured LLM, if any
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use gasto_core::{AIBackend, AIClient, Classifier, Database, Settings};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Classifier over the database cache and the LLM picked from the environment
pub fn build_classifier(db: &Database, settings: &Settings) -> Classifier {
    let llm = AIClient::from_settings(&settings.ai);
    match &llm {
        Some(client) => tracing::debug!("LLM backend: {} ({})", client.host(), client.model()),
        None => println!("   💡 Tip: Set OPENAI_API_KEY (or AI_BACKEND=ollama) for LLM categorization"),
    }
    Classifier::new(db.clone(), llm, settings)
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;

    let seeded = db
        .seed_default_categories()
        .context("Failed to seed default categories")?;
    println!("   Seeded {} default categories", seeded);

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Link a bank: gasto link --user 1 <pluggy-item-id>");
    println!("  2. Pull transactions: gasto sync --user 1 <account-id> --from 2024-01-01 --to 2024-01-31");
    println!("  3. Categorize: gasto categorize --user 1");

    Ok(())
}
