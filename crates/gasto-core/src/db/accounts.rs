//! Bank account operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, parse_decimal, Database};
use crate::error::Result;
use crate::models::{BankAccount, NewBankAccount};

const ACCOUNT_COLUMNS: &str =
    "id, user_id, external_id, bank_name, account_type, balance, is_active, created_at, updated_at";

fn row_to_account(row: &Row<'_>) -> rusqlite::Result<BankAccount> {
    let balance_str: String = row.get(5)?;
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    Ok(BankAccount {
        id: row.get(0)?,
        user_id: row.get(1)?,
        external_id: row.get(2)?,
        bank_name: row.get(3)?,
        account_type: row.get(4)?,
        balance: parse_decimal(&balance_str)?,
        is_active: row.get(6)?,
        created_at: parse_datetime(&created_at_str)?,
        updated_at: parse_datetime(&updated_at_str)?,
    })
}

impl Database {
    /// Create or refresh an account for a user
    ///
    /// Re-linking an existing account updates its details and reactivates it.
    pub fn upsert_account(&self, user_id: i64, account: &NewBankAccount) -> Result<i64> {
        let conn = self.conn()?;
        let id = conn.query_row(
            r#"
            INSERT INTO accounts (user_id, external_id, bank_name, account_type, balance, is_active)
            VALUES (?, ?, ?, ?, ?, 1)
            ON CONFLICT(user_id, external_id) DO UPDATE SET
                bank_name = excluded.bank_name,
                account_type = excluded.account_type,
                balance = excluded.balance,
                is_active = 1,
                updated_at = CURRENT_TIMESTAMP
            RETURNING id
            "#,
            params![
                user_id,
                account.external_id,
                account.bank_name,
                account.account_type,
                account.balance.to_string(),
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// List all accounts of a user, active or not
    pub fn list_accounts(&self, user_id: i64) -> Result<Vec<BankAccount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE user_id = ? ORDER BY bank_name, id",
            ACCOUNT_COLUMNS
        ))?;

        let accounts = stmt
            .query_map(params![user_id], row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(accounts)
    }

    /// IDs of the user's active accounts
    pub fn active_account_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id FROM accounts WHERE user_id = ? AND is_active = 1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Get an account owned by a user
    pub fn get_account(&self, user_id: i64, id: i64) -> Result<Option<BankAccount>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!(
                    "SELECT {} FROM accounts WHERE id = ? AND user_id = ?",
                    ACCOUNT_COLUMNS
                ),
                params![id, user_id],
                row_to_account,
            )
            .optional()?;

        Ok(account)
    }

    /// Mark an account inactive. Its transactions are kept.
    ///
    /// Returns false if the user owns no such account.
    pub fn deactivate_account(&self, user_id: i64, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE accounts SET is_active = 0, updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND user_id = ?
            "#,
            params![id, user_id],
        )?;
        Ok(updated > 0)
    }
}
