//! Bank account linking and transaction ingestion
//!
//! Aggregator errors are returned to the caller untouched; nothing here
//! retries or falls back.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::db::{Database, TransactionInsertResult};
use crate::error::{Error, Result};
use crate::models::{BankAccount, NewBankAccount, NewTransaction, SyncResult};
use crate::pluggy::{parse_pluggy_date, PluggyClient, PluggyTransaction};

/// Links accounts and pulls transactions through Pluggy
#[derive(Clone)]
pub struct BankSync {
    db: Database,
    pluggy: PluggyClient,
}

impl BankSync {
    pub fn new(db: Database, pluggy: PluggyClient) -> Self {
        Self { db, pluggy }
    }

    /// Upsert every account of a Pluggy item for a user
    ///
    /// Accounts seen before are refreshed and reactivated.
    pub async fn link_item(&self, user_id: i64, item_id: &str) -> Result<Vec<BankAccount>> {
        let remote = self.pluggy.get_accounts(item_id).await?;

        let mut linked = Vec::with_capacity(remote.len());
        for account in &remote {
            let id = self.db.upsert_account(
                user_id,
                &NewBankAccount {
                    external_id: account.id.clone(),
                    bank_name: account.display_name().to_string(),
                    account_type: account.kind().to_string(),
                    balance: account.balance.unwrap_or_default(),
                },
            )?;
            if let Some(stored) = self.db.get_account(user_id, id)? {
                linked.push(stored);
            }
        }

        info!(user_id, item_id, accounts = linked.len(), "Linked bank accounts");
        Ok(linked)
    }

    /// Fetch and store an account's transactions for a date range
    ///
    /// Already-ingested transactions are skipped; the account must be active.
    pub async fn sync_account_transactions(
        &self,
        user_id: i64,
        account_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<SyncResult> {
        if from > to {
            return Err(Error::InvalidData(format!(
                "start date {} is after end date {}",
                from, to
            )));
        }

        let account = self
            .db
            .get_account(user_id, account_id)?
            .filter(|a| a.is_active)
            .ok_or_else(|| Error::NotFound(format!("Bank account {}", account_id)))?;

        let remote = self
            .pluggy
            .get_transactions(&account.external_id, from, to)
            .await?;

        let mut result = SyncResult::default();
        for tx in &remote {
            let Some(new_tx) = to_new_transaction(tx) else {
                warn!(
                    account_id,
                    external_id = %tx.id,
                    date = %tx.date,
                    "Skipping transaction with unreadable date"
                );
                result.rejected += 1;
                continue;
            };

            match self.db.insert_transaction(account.id, &new_tx)? {
                TransactionInsertResult::Inserted(_) => result.inserted += 1,
                TransactionInsertResult::Duplicate(_) => result.skipped += 1,
            }
        }

        info!(
            user_id,
            account_id,
            inserted = result.inserted,
            skipped = result.skipped,
            "Synced transactions"
        );
        Ok(result)
    }
}

/// Mark an account inactive. Its transactions stay, but leave the working set.
pub fn disconnect_account(db: &Database, user_id: i64, account_id: i64) -> Result<()> {
    if db.deactivate_account(user_id, account_id)? {
        info!(user_id, account_id, "Disconnected bank account");
        Ok(())
    } else {
        Err(Error::NotFound(format!("Bank account {}", account_id)))
    }
}

fn to_new_transaction(tx: &PluggyTransaction) -> Option<NewTransaction> {
    Some(NewTransaction {
        external_id: tx.id.clone(),
        amount: tx.amount,
        description: tx.description.clone(),
        date: parse_pluggy_date(&tx.date)?,
    })
}
