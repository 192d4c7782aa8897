//! Category and cache maintenance commands

use anyhow::Result;
use gasto_core::Database;

pub fn cmd_categories(db: &Database) -> Result<()> {
    let categories = db.list_categories()?;

    if categories.is_empty() {
        println!("No categories yet. Run 'gasto init' to seed the defaults.");
        return Ok(());
    }

    for category in &categories {
        print!("{:<5} {:<14} {:<10} {}", category.id, category.name, category.icon, category.color);
        if !category.keywords.is_empty() {
            print!("  [{}]", category.keywords.join(", "));
        }
        println!();
    }

    Ok(())
}

pub fn cmd_cache_prune(db: &Database) -> Result<()> {
    let removed = db.delete_expired_cache_entries()?;
    println!("🧹 Removed {} expired cache entr{}", removed, if removed == 1 { "y" } else { "ies" });
    Ok(())
}

pub fn cmd_cache_stats(db: &Database) -> Result<()> {
    println!("Persistent cache entries: {}", db.count_cache_entries()?);
    Ok(())
}
