//! Transaction operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, parse_decimal, Database, DATETIME_FORMAT};
use crate::error::Result;
use crate::models::{NewTransaction, Transaction};

/// Result of inserting a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionInsertResult {
    /// Transaction was inserted, contains the new transaction ID
    Inserted(i64),
    /// The external ID was already ingested, contains the existing transaction ID
    Duplicate(i64),
}

const TRANSACTION_COLUMNS: &str = "t.id, t.account_id, t.external_id, t.amount, t.description, \
     t.date, t.category_id, t.processed, t.created_at, t.updated_at";

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let amount_str: String = row.get(3)?;
    let date_str: String = row.get(5)?;
    let created_at_str: String = row.get(8)?;
    let updated_at_str: String = row.get(9)?;

    Ok(Transaction {
        id: row.get(0)?,
        account_id: row.get(1)?,
        external_id: row.get(2)?,
        amount: parse_decimal(&amount_str)?,
        description: row.get(4)?,
        date: parse_datetime(&date_str)?.naive_utc(),
        category_id: row.get(6)?,
        processed: row.get(7)?,
        created_at: parse_datetime(&created_at_str)?,
        updated_at: parse_datetime(&updated_at_str)?,
    })
}

impl Database {
    /// Insert a transaction, skipping external IDs that were already ingested
    pub fn insert_transaction(
        &self,
        account_id: i64,
        tx: &NewTransaction,
    ) -> Result<TransactionInsertResult> {
        let conn = self.conn()?;

        let inserted = conn.execute(
            r#"
            INSERT INTO transactions (account_id, external_id, amount, description, date)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO NOTHING
            "#,
            params![
                account_id,
                tx.external_id,
                tx.amount.to_string(),
                tx.description,
                tx.date.format(DATETIME_FORMAT).to_string(),
            ],
        )?;

        if inserted > 0 {
            return Ok(TransactionInsertResult::Inserted(conn.last_insert_rowid()));
        }

        let existing_id: i64 = conn.query_row(
            "SELECT id FROM transactions WHERE external_id = ?",
            params![tx.external_id],
            |row| row.get(0),
        )?;
        Ok(TransactionInsertResult::Duplicate(existing_id))
    }

    /// Get a transaction by ID
    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions t WHERE t.id = ?",
                    TRANSACTION_COLUMNS
                ),
                params![id],
                row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// Transactions in the user's active accounts that have no category yet
    ///
    /// The `processed` flag is not consulted: a transaction only leaves this
    /// set by getting a category.
    pub fn uncategorized_transactions(&self, user_id: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}
            FROM transactions t
            JOIN accounts a ON a.id = t.account_id
            WHERE a.user_id = ? AND a.is_active = 1 AND t.category_id IS NULL
            ORDER BY t.id
            "#,
            TRANSACTION_COLUMNS
        ))?;

        let transactions = stmt
            .query_map(params![user_id], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Count transactions in an account
    pub fn count_account_transactions(&self, account_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE account_id = ?",
            params![account_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Attach a category and mark the transaction processed
    ///
    /// Only an uncategorized row is claimed. Returns false when the row already
    /// has a category, e.g. when an overlapping run got there first.
    pub fn assign_category(&self, transaction_id: i64, category_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE transactions
            SET category_id = ?, processed = 1, updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND category_id IS NULL
            "#,
            params![category_id, transaction_id],
        )?;
        Ok(updated > 0)
    }
}
