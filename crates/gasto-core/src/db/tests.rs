//! Database tests

use super::*;
use crate::models::*;
use chrono::{Duration as ChronoDuration, NaiveDate};
use rust_decimal::Decimal;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn new_account(external_id: &str) -> NewBankAccount {
    NewBankAccount {
        external_id: external_id.to_string(),
        bank_name: "Nubank".to_string(),
        account_type: "BANK".to_string(),
        balance: dec("1520.35"),
    }
}

fn new_tx(external_id: &str, description: &str, amount: &str) -> NewTransaction {
    NewTransaction {
        external_id: external_id.to_string(),
        amount: dec(amount),
        description: description.to_string(),
        date: NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap(),
    }
}

#[test]
fn test_in_memory_db() {
    let db = Database::in_memory().unwrap();
    assert!(db.list_accounts(1).unwrap().is_empty());
    assert!(db.list_categories().unwrap().is_empty());
}

#[test]
fn test_upsert_account_reactivates() {
    let db = Database::in_memory().unwrap();

    let id = db.upsert_account(1, &new_account("acc-1")).unwrap();
    assert!(db.deactivate_account(1, id).unwrap());
    assert!(db.active_account_ids(1).unwrap().is_empty());

    // Re-linking the same external account keeps the row and reactivates it
    let mut relinked = new_account("acc-1");
    relinked.balance = dec("99.90");
    let id2 = db.upsert_account(1, &relinked).unwrap();
    assert_eq!(id, id2);

    let account = db.get_account(1, id).unwrap().unwrap();
    assert!(account.is_active);
    assert_eq!(account.balance, dec("99.90"));
    assert_eq!(db.active_account_ids(1).unwrap(), vec![id]);
}

#[test]
fn test_accounts_are_scoped_by_user() {
    let db = Database::in_memory().unwrap();
    let a = db.upsert_account(1, &new_account("shared-ext")).unwrap();
    let b = db.upsert_account(2, &new_account("shared-ext")).unwrap();
    assert_ne!(a, b);

    assert!(db.get_account(2, a).unwrap().is_none());
    assert!(!db.deactivate_account(2, a).unwrap());
    assert_eq!(db.list_accounts(1).unwrap().len(), 1);
}

#[test]
fn test_insert_transaction_is_idempotent() {
    let db = Database::in_memory().unwrap();
    let account_id = db.upsert_account(1, &new_account("acc-1")).unwrap();

    let tx = new_tx("tx-1", "IFOOD *RESTAURANTE", "-50.00");
    let first = db.insert_transaction(account_id, &tx).unwrap();
    let second = db.insert_transaction(account_id, &tx).unwrap();

    let TransactionInsertResult::Inserted(id) = first else {
        panic!("expected insert, got {:?}", first);
    };
    assert_eq!(second, TransactionInsertResult::Duplicate(id));
    assert_eq!(db.count_account_transactions(account_id).unwrap(), 1);

    let stored = db.get_transaction(id).unwrap().unwrap();
    assert_eq!(stored.amount, dec("-50.00"));
    assert_eq!(stored.amount.to_string(), "-50.00");
    assert_eq!(stored.description, "IFOOD *RESTAURANTE");
    assert_eq!(stored.date, tx.date);
    assert!(!stored.processed);
    assert!(stored.category_id.is_none());
}

#[test]
fn test_uncategorized_skips_inactive_accounts_and_categorized_rows() {
    let db = Database::in_memory().unwrap();
    let active = db.upsert_account(1, &new_account("active")).unwrap();
    let inactive = db.upsert_account(1, &new_account("inactive")).unwrap();
    let other_user = db.upsert_account(2, &new_account("other")).unwrap();

    db.insert_transaction(active, &new_tx("t1", "Uber", "-12.00"))
        .unwrap();
    let TransactionInsertResult::Inserted(t2) = db
        .insert_transaction(active, &new_tx("t2", "Cinema", "-30.00"))
        .unwrap()
    else {
        panic!("expected insert");
    };
    db.insert_transaction(inactive, &new_tx("t3", "Padaria", "-8.00"))
        .unwrap();
    db.insert_transaction(other_user, &new_tx("t4", "Netflix", "-39.90"))
        .unwrap();
    db.deactivate_account(1, inactive).unwrap();

    let category = db.get_or_create_category("Lazer").unwrap();
    assert!(db.assign_category(t2, category.id).unwrap());

    // A categorized row is never claimed twice
    let other = db.get_or_create_category("Outros").unwrap();
    assert!(!db.assign_category(t2, other.id).unwrap());

    let pending = db.uncategorized_transactions(1).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].external_id, "t1");

    let assigned = db.get_transaction(t2).unwrap().unwrap();
    assert!(assigned.processed);
    assert_eq!(assigned.category_id, Some(category.id));
}

#[test]
fn test_get_or_create_category_defaults() {
    let db = Database::in_memory().unwrap();

    let created = db.get_or_create_category("Pets").unwrap();
    assert_eq!(created.name, "Pets");
    assert_eq!(created.icon, DEFAULT_CATEGORY_ICON);
    assert_eq!(created.color, DEFAULT_CATEGORY_COLOR);
    assert!(created.keywords.is_empty());

    let again = db.get_or_create_category("Pets").unwrap();
    assert_eq!(again.id, created.id);
    assert_eq!(db.list_categories().unwrap().len(), 1);

    assert!(db.get_or_create_category("   ").is_err());
}

#[test]
fn test_get_or_create_category_concurrent() {
    let db = Database::in_memory().unwrap();
    let barrier = std::sync::Arc::new(std::sync::Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = db.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                db.get_or_create_category("NewCategory").unwrap().id
            })
        })
        .collect();

    let ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));

    let conn = db.conn().unwrap();
    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM categories WHERE name = 'NewCategory'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn test_seed_default_categories_is_idempotent() {
    let db = Database::in_memory().unwrap();

    assert_eq!(db.seed_default_categories().unwrap(), 8);
    assert_eq!(db.seed_default_categories().unwrap(), 0);

    let food = db.get_category_by_name("Alimentação").unwrap().unwrap();
    assert_eq!(food.icon, CategoryLabel::Food.icon());
    assert!(food.keywords.contains(&"ifood".to_string()));

    let other = db.get_category_by_name("Outros").unwrap().unwrap();
    assert!(other.keywords.is_empty());
}

#[test]
fn test_cache_entry_upsert_and_lookup() {
    let db = Database::in_memory().unwrap();

    assert!(db.find_cache_entry("k").unwrap().is_none());

    db.upsert_cache_entry("k", "Transporte", None).unwrap();
    let entry = db.find_cache_entry("k").unwrap().unwrap();
    assert_eq!(entry.value, "Transporte");
    assert!(entry.expires_at.is_none());

    // Last write wins
    let expires = Utc::now() + ChronoDuration::hours(1);
    db.upsert_cache_entry("k", "Lazer", Some(expires)).unwrap();
    let entry = db.find_cache_entry("k").unwrap().unwrap();
    assert_eq!(entry.value, "Lazer");
    assert_eq!(
        entry.expires_at.unwrap().timestamp(),
        expires.timestamp(),
        "expiry is stored with second precision"
    );
    assert_eq!(db.count_cache_entries().unwrap(), 1);
}

#[test]
fn test_unreadable_timestamps_are_errors() {
    let db = Database::in_memory().unwrap();
    db.upsert_cache_entry("k", "Lazer", None).unwrap();
    let account = db.upsert_account(1, &new_account("acc")).unwrap();
    let TransactionInsertResult::Inserted(tx) = db
        .insert_transaction(account, &new_tx("t1", "Uber", "-12.00"))
        .unwrap()
    else {
        panic!("expected insert");
    };

    db.conn()
        .unwrap()
        .execute_batch(
            "UPDATE ai_cache SET expires_at = 'not a date';
             UPDATE transactions SET date = '15/03/2024';",
        )
        .unwrap();

    assert!(db.find_cache_entry("k").is_err());
    assert!(db.get_transaction(tx).is_err());
}

#[test]
fn test_delete_expired_cache_entries() {
    let db = Database::in_memory().unwrap();
    db.upsert_cache_entry("old", "Lazer", Some(Utc::now() - ChronoDuration::hours(1)))
        .unwrap();
    db.upsert_cache_entry("fresh", "Lazer", Some(Utc::now() + ChronoDuration::hours(1)))
        .unwrap();
    db.upsert_cache_entry("forever", "Lazer", None).unwrap();

    // Expired rows are still readable until pruned
    assert!(db.find_cache_entry("old").unwrap().unwrap().is_expired());

    assert_eq!(db.delete_expired_cache_entries().unwrap(), 1);
    assert!(db.find_cache_entry("old").unwrap().is_none());
    assert!(db.find_cache_entry("fresh").unwrap().is_some());
    assert!(db.find_cache_entry("forever").unwrap().is_some());
}

#[test]
fn test_job_lifecycle() {
    let db = Database::in_memory().unwrap();
    let job_id = db.create_categorization_job(7).unwrap();

    let job = db.get_categorization_job(job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempts, 0);
    assert!(job.started_at.is_none());

    db.mark_job_processing(job_id).unwrap();
    db.mark_job_retrying(job_id, "database is locked").unwrap();
    db.mark_job_processing(job_id).unwrap();

    let summary = CategorizationSummary {
        processed: 3,
        failed: 1,
        by_llm: 2,
        by_fallback: 1,
        ..Default::default()
    };
    db.mark_job_completed(job_id, &summary).unwrap();

    let job = db.get_categorization_job(job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 2);
    assert_eq!(job.summary, summary);
    assert!(job.error.is_none());
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_some());

    assert_eq!(db.list_categorization_jobs(7, 10).unwrap().len(), 1);
    assert!(db.list_categorization_jobs(8, 10).unwrap().is_empty());
    assert!(db.get_categorization_job(job_id + 100).unwrap().is_none());
}

#[test]
fn test_recover_stuck_jobs() {
    let db = Database::in_memory().unwrap();
    let pending = db.create_categorization_job(1).unwrap();
    let running = db.create_categorization_job(1).unwrap();
    let done = db.create_categorization_job(1).unwrap();
    db.mark_job_processing(running).unwrap();
    db.mark_job_completed(done, &CategorizationSummary::default())
        .unwrap();

    assert_eq!(db.recover_stuck_jobs().unwrap(), 2);

    for id in [pending, running] {
        let job = db.get_categorization_job(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.is_some());
    }
    let job = db.get_categorization_job(done).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}
