//! Bank account commands (Pluggy linking and transaction sync)

use anyhow::{Context, Result};
use chrono::NaiveDate;
use gasto_core::{BankSync, Database, PluggyClient, Settings};

use super::truncate;

/// Ingestion service; fails when PLUGGY_API_KEY is missing
pub fn bank_sync(db: &Database, settings: &Settings) -> Result<BankSync> {
    let client = PluggyClient::from_settings(&settings.pluggy)?
        .context("Bank sync requires PLUGGY_API_KEY to be set")?;
    Ok(BankSync::new(db.clone(), client))
}

pub fn cmd_accounts(db: &Database, user_id: i64) -> Result<()> {
    let accounts = db.list_accounts(user_id)?;

    if accounts.is_empty() {
        println!("No accounts linked. Use 'gasto link --user {} <item-id>'.", user_id);
        return Ok(());
    }

    println!(
        "{:<6} {:<24} {:<12} {:>14}  {}",
        "ID", "BANK", "TYPE", "BALANCE", "STATUS"
    );
    for account in &accounts {
        println!(
            "{:<6} {:<24} {:<12} {:>14}  {}",
            account.id,
            truncate(&account.bank_name, 24),
            truncate(&account.account_type, 12),
            account.balance.round_dp(2).to_string(),
            if account.is_active { "active" } else { "disconnected" }
        );
    }

    Ok(())
}

pub async fn cmd_link(sync: &BankSync, user_id: i64, item_id: &str) -> Result<()> {
    println!("🔗 Linking Pluggy item {}...", item_id);

    let accounts = sync
        .link_item(user_id, item_id)
        .await
        .context("Failed to link accounts")?;

    for account in &accounts {
        println!("   {} - {} ({})", account.id, account.bank_name, account.account_type);
    }
    println!("✅ Linked {} account(s)", accounts.len());

    Ok(())
}

pub fn cmd_disconnect(db: &Database, user_id: i64, account_id: i64) -> Result<()> {
    gasto_core::disconnect_account(db, user_id, account_id)?;
    println!("✅ Account {} disconnected", account_id);
    Ok(())
}

pub async fn cmd_sync(
    sync: &BankSync,
    user_id: i64,
    account_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<()> {
    println!("🔄 Syncing account {} from {} to {}...", account_id, from, to);

    let result = sync
        .sync_account_transactions(user_id, account_id, from, to)
        .await
        .context("Failed to sync transactions")?;

    println!("   New:       {}", result.inserted);
    println!("   Existing:  {}", result.skipped);
    if result.rejected > 0 {
        println!("   ⚠️  Rejected: {} (unreadable date)", result.rejected);
    }
    println!("✅ Sync complete");

    Ok(())
}
