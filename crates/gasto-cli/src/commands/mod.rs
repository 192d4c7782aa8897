//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - init and shared utilities (open_db, build_classifier)
//! - `categorize` - single classification, bulk categorization, job listing
//! - `bank` - Pluggy linking, sync and account listing
//! - `categories` - category listing and cache maintenance
//! - `serve` - Web server command

pub mod bank;
pub mod categories;
pub mod categorize;
pub mod core;
pub mod serve;

// Re-export command functions for main.rs
pub use bank::*;
pub use categories::*;
pub use categorize::*;
pub use core::*;
pub use serve::*;

/// Truncate a string to at most `max` characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
