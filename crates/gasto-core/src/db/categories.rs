//! Category registry operations
//!
//! Lookup-or-create is the only write path: names are unique and the
//! insert relies on the UNIQUE constraint, so racing callers converge on
//! the same row.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{parse_datetime, Database};
use crate::classifier::FALLBACK_RULES;
use crate::error::{Error, Result};
use crate::models::{Category, DEFAULT_CATEGORY_COLOR, DEFAULT_CATEGORY_ICON};

fn row_to_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    let keywords_json: String = row.get(4)?;
    let created_at_str: String = row.get(5)?;

    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        icon: row.get(2)?,
        color: row.get(3)?,
        keywords: serde_json::from_str(&keywords_json).unwrap_or_default(),
        created_at: parse_datetime(&created_at_str)?,
    })
}

/// Insert unless the name exists, then read back whichever row won
fn insert_or_select(
    conn: &Connection,
    name: &str,
    icon: &str,
    color: &str,
    keywords: &[&str],
) -> Result<Category> {
    let keywords_json = serde_json::to_string(keywords)?;
    let inserted = conn.execute(
        r#"
        INSERT INTO categories (name, icon, color, keywords)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(name) DO NOTHING
        "#,
        params![name, icon, color, keywords_json],
    )?;
    if inserted > 0 {
        debug!(category = name, "Created category");
    }

    let category = conn.query_row(
        "SELECT id, name, icon, color, keywords, created_at FROM categories WHERE name = ?",
        params![name],
        row_to_category,
    )?;
    Ok(category)
}

impl Database {
    /// Get a category by name, creating it with default attributes if missing
    pub fn get_or_create_category(&self, name: &str) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidData("Category name cannot be empty".into()));
        }
        let conn = self.conn()?;
        insert_or_select(&conn, name, DEFAULT_CATEGORY_ICON, DEFAULT_CATEGORY_COLOR, &[])
    }

    /// Get a category by exact name
    pub fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                "SELECT id, name, icon, color, keywords, created_at FROM categories WHERE name = ?",
                params![name],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// Get a category by ID
    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                "SELECT id, name, icon, color, keywords, created_at FROM categories WHERE id = ?",
                params![id],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// List all categories by name
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, icon, color, keywords, created_at FROM categories ORDER BY name",
        )?;
        let categories = stmt
            .query_map([], row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Create the built-in categories with their icons, colors and keywords
    ///
    /// Idempotent: existing categories are left untouched. Returns how many
    /// were newly created.
    pub fn seed_default_categories(&self) -> Result<usize> {
        let conn = self.conn()?;
        let before: i64 = conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;

        for (label, keywords) in FALLBACK_RULES {
            insert_or_select(&conn, label.as_str(), label.icon(), label.color(), keywords)?;
        }

        let after: i64 = conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;
        Ok((after - before) as usize)
    }
}
