//! Server command implementation

use std::path::Path;

use anyhow::Result;
use gasto_core::Settings;
use gasto_server::ServerConfig;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    settings: &Settings,
    host: &str,
    port: u16,
    allowed_origins: Vec<String>,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting Gasto web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    println!(
        "   Jobs: {} concurrent, {} attempt(s) each",
        settings.jobs.max_concurrent, settings.jobs.max_attempts
    );
    if !allowed_origins.is_empty() {
        println!("   CORS origins: {}", allowed_origins.join(", "));
    }
    println!();
    println!("   ⚠️  No authentication - keep it behind a trusted proxy");

    let db = open_db(db_path, no_encrypt)?;
    let config = ServerConfig { allowed_origins };

    gasto_server::serve(db, settings, host, port, config).await
}
