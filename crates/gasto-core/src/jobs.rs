//! Bulk categorization job and its worker queue
//!
//! [`BulkCategorizer::run`] walks a user's uncategorized transactions and
//! assigns each one a category. [`CategorizationQueue`] runs that job in the
//! background: `enqueue` records a `categorization_jobs` row, spawns a
//! worker and hands back the job id right away. A semaphore bounds how many
//! jobs run at once; failed runs are retried with a fixed delay.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::classifier::Classifier;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{CategorizationJob, CategorizationSummary, JobStatus, Transaction};
use crate::settings::JobSettings;

/// Default page size for job listings
const JOB_LIST_LIMIT: i64 = 50;

/// Categorizes every uncategorized transaction of a user
#[derive(Clone)]
pub struct BulkCategorizer {
    db: Database,
    classifier: Classifier,
}

impl BulkCategorizer {
    pub fn new(db: Database, classifier: Classifier) -> Self {
        Self { db, classifier }
    }

    /// Run one pass over the user's working set
    ///
    /// Only reading the working set can fail the run. A transaction whose
    /// category cannot be persisted is logged, counted as failed and left
    /// uncategorized for the next run. Transactions claimed by an overlapping
    /// run for the same user are not counted.
    pub async fn run(&self, user_id: i64) -> Result<CategorizationSummary> {
        let pending = self.db.uncategorized_transactions(user_id)?;
        info!(user_id, count = pending.len(), "Categorizing transactions");

        let mut summary = CategorizationSummary::default();

        for tx in &pending {
            let classification = self
                .classifier
                .classify_detailed(&tx.description, Some(tx.amount))
                .await;

            match self.persist(tx, &classification.category) {
                Ok(true) => {
                    debug!(
                        transaction_id = tx.id,
                        category = %classification.category,
                        source = %classification.source,
                        "Categorized transaction"
                    );
                    summary.record(classification.source);
                }
                Ok(false) => {
                    debug!(
                        transaction_id = tx.id,
                        "Transaction already categorized by another run"
                    );
                }
                Err(e) => {
                    warn!(
                        transaction_id = tx.id,
                        "Failed to save category for transaction: {}", e
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            user_id,
            processed = summary.processed,
            failed = summary.failed,
            "Categorization finished"
        );
        Ok(summary)
    }

    /// Returns false when another run categorized the transaction first
    fn persist(&self, tx: &Transaction, category_name: &str) -> Result<bool> {
        let category = self.db.get_or_create_category(category_name)?;
        self.db.assign_category(tx.id, category.id)
    }
}

/// Handle for an enqueued job
#[derive(Debug)]
pub struct TaskHandle {
    pub job_id: i64,
    join: JoinHandle<JobStatus>,
}

impl TaskHandle {
    /// Wait for the worker to finish and return the job's final status
    pub async fn wait(self) -> Result<JobStatus> {
        self.join
            .await
            .map_err(|e| Error::Job(format!("Job {} worker panicked: {}", self.job_id, e)))
    }
}

/// Dispatches categorization jobs onto a bounded worker pool
#[derive(Clone)]
pub struct CategorizationQueue {
    db: Database,
    categorizer: BulkCategorizer,
    permits: Arc<Semaphore>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl CategorizationQueue {
    pub fn new(db: Database, classifier: Classifier, settings: &JobSettings) -> Self {
        Self {
            categorizer: BulkCategorizer::new(db.clone(), classifier),
            db,
            permits: Arc::new(Semaphore::new(settings.max_concurrent.max(1))),
            max_attempts: settings.max_attempts.max(1),
            retry_delay: settings.retry_delay(),
        }
    }

    /// Record a pending job for `user_id` and start it in the background
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue(&self, user_id: i64) -> Result<TaskHandle> {
        let job_id = self.db.create_categorization_job(user_id)?;
        info!(job_id, user_id, "Enqueued categorization job");

        let queue = self.clone();
        let join = tokio::spawn(async move { queue.work(job_id, user_id).await });

        Ok(TaskHandle { job_id, join })
    }

    pub fn get_job(&self, job_id: i64) -> Result<Option<CategorizationJob>> {
        self.db.get_categorization_job(job_id)
    }

    pub fn list_jobs(&self, user_id: i64) -> Result<Vec<CategorizationJob>> {
        self.db.list_categorization_jobs(user_id, JOB_LIST_LIMIT)
    }

    /// Worker body: wait for a slot, then run with retries
    async fn work(&self, job_id: i64, user_id: i64) -> JobStatus {
        let _permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                self.record(job_id, self.db.mark_job_failed(job_id, &e.to_string()));
                return JobStatus::Failed;
            }
        };

        for attempt in 1..=self.max_attempts {
            self.record(job_id, self.db.mark_job_processing(job_id));

            match self.categorizer.run(user_id).await {
                Ok(summary) => {
                    self.record(job_id, self.db.mark_job_completed(job_id, &summary));
                    info!(
                        job_id,
                        user_id,
                        processed = summary.processed,
                        "Categorization job completed"
                    );
                    return JobStatus::Completed;
                }
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        job_id,
                        attempt, "Categorization attempt failed, retrying: {}", e
                    );
                    self.record(job_id, self.db.mark_job_retrying(job_id, &e.to_string()));
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    error!(job_id, attempt, "Categorization job failed: {}", e);
                    self.record(job_id, self.db.mark_job_failed(job_id, &e.to_string()));
                    return JobStatus::Failed;
                }
            }
        }

        JobStatus::Failed
    }

    /// Ledger updates are best effort; the job outcome does not depend on them
    fn record(&self, job_id: i64, result: Result<()>) {
        if let Err(e) = result {
            warn!(job_id, "Failed to update job ledger: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIClient, MockBackend};
    use crate::models::{NewBankAccount, NewTransaction};
    use crate::settings::Settings;
    use chrono::NaiveDate;

    fn seed_user(db: &Database, user_id: i64, descriptions: &[&str]) -> i64 {
        let account_id = db
            .upsert_account(
                user_id,
                &NewBankAccount {
                    external_id: format!("acc-{}", user_id),
                    bank_name: "Itaú".to_string(),
                    account_type: "BANK".to_string(),
                    balance: "0".parse().unwrap(),
                },
            )
            .unwrap();

        for (i, description) in descriptions.iter().enumerate() {
            db.insert_transaction(
                account_id,
                &NewTransaction {
                    external_id: format!("u{}-tx-{}", user_id, i),
                    amount: format!("-{}.50", 10 + i).parse().unwrap(),
                    description: description.to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 5, 1)
                        .unwrap()
                        .and_hms_opt(12, 0, 0)
                        .unwrap(),
                },
            )
            .unwrap();
        }
        account_id
    }

    fn categorizer(db: &Database, llm: Option<AIClient>) -> BulkCategorizer {
        let classifier = Classifier::new(db.clone(), llm, &Settings::default());
        BulkCategorizer::new(db.clone(), classifier)
    }

    fn fast_settings() -> JobSettings {
        JobSettings {
            max_concurrent: 2,
            max_attempts: 2,
            retry_delay_secs: 0,
        }
    }

    #[tokio::test]
    async fn test_run_twice_processes_then_zero() {
        let db = Database::in_memory().unwrap();
        seed_user(&db, 1, &["IFOOD *PEDIDO", "UBER *TRIP", "Padaria Real", "PIX enviado"]);
        let job = categorizer(&db, None);

        let first = job.run(1).await.unwrap();
        assert_eq!(first.processed, 4);
        assert_eq!(first.by_fallback, 4);
        assert_eq!(first.failed, 0);

        let second = job.run(1).await.unwrap();
        assert_eq!(second.processed, 0);

        let names: Vec<String> = db
            .list_categories()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Alimentação", "Outros", "Transporte"]);
        assert!(db.uncategorized_transactions(1).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_runs_for_one_user_count_each_transaction_once() {
        let db = Database::in_memory().unwrap();
        seed_user(&db, 1, &["Loja A", "Loja B", "Loja C"]);
        // Both runs read the working set before either one persists
        let mock = MockBackend::slow(Duration::from_millis(20));
        let a = categorizer(&db, Some(AIClient::Mock(mock.clone())));
        let b = categorizer(&db, Some(AIClient::Mock(mock)));

        let (first, second) = tokio::join!(a.run(1), b.run(1));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.processed + second.processed, 3);
        assert_eq!(first.failed + second.failed, 0);
        assert!(db.uncategorized_transactions(1).unwrap().is_empty());
        assert_eq!(db.list_categories().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_creates_unseen_category_with_defaults() {
        let db = Database::in_memory().unwrap();
        seed_user(&db, 1, &["Petshop Amigo", "Petz Vila Mariana"]);
        let mock = MockBackend::with_reply("Pets");
        let job = categorizer(&db, Some(AIClient::Mock(mock.clone())));

        let summary = job.run(1).await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.by_llm, 2);

        let pets = db.get_category_by_name("Pets").unwrap().unwrap();
        assert_eq!(pets.icon, "default");
        assert_eq!(pets.color, "#000000");
        assert!(pets.keywords.is_empty());
        assert_eq!(db.list_categories().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_continues_past_persistence_failures() {
        let db = Database::in_memory().unwrap();
        seed_user(&db, 1, &["Cinema", "Netflix"]);
        // The trigger makes every category insert fail
        let mock = MockBackend::with_reply("Categoria");
        let job = categorizer(&db, Some(AIClient::Mock(mock)));
        db.conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_categories BEFORE INSERT ON categories
                 BEGIN SELECT RAISE(ABORT, 'read-only'); END;",
            )
            .unwrap();

        let summary = job.run(1).await.unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.failed, 2);
        assert_eq!(db.uncategorized_transactions(1).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_run_ignores_inactive_accounts() {
        let db = Database::in_memory().unwrap();
        let account_id = seed_user(&db, 1, &["Uber"]);
        db.deactivate_account(1, account_id).unwrap();

        let summary = categorizer(&db, None).run(1).await.unwrap();
        assert_eq!(summary.processed, 0);
    }

    #[tokio::test]
    async fn test_enqueue_runs_to_completion() {
        let db = Database::in_memory().unwrap();
        seed_user(&db, 1, &["Farmacia Pague Menos", "Escola de Música"]);
        let classifier = Classifier::new(db.clone(), None, &Settings::default());
        let queue = CategorizationQueue::new(db.clone(), classifier, &fast_settings());

        let handle = queue.enqueue(1).unwrap();
        let job_id = handle.job_id;
        assert_eq!(handle.wait().await.unwrap(), JobStatus::Completed);

        let job = queue.get_job(job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.summary.processed, 2);
        assert_eq!(job.summary.by_fallback, 2);
        assert_eq!(queue.list_jobs(1).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_retries_then_fails() {
        let db = Database::in_memory().unwrap();
        seed_user(&db, 1, &["Uber"]);
        // Break the working-set query so every attempt errors
        db.conn()
            .unwrap()
            .execute_batch("ALTER TABLE transactions RENAME COLUMN category_id TO cat_id;")
            .unwrap();

        let classifier = Classifier::new(db.clone(), None, &Settings::default());
        let queue = CategorizationQueue::new(db.clone(), classifier, &fast_settings());

        let handle = queue.enqueue(1).unwrap();
        let job_id = handle.job_id;
        assert_eq!(handle.wait().await.unwrap(), JobStatus::Failed);

        let job = queue.get_job(job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 2);
        assert!(job.error.is_some());
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_jobs_share_categories() {
        let db = Database::in_memory().unwrap();
        for user_id in 1..=4 {
            seed_user(&db, user_id, &["Mercado Extra", "Uber Eats Mercado", "Cinema"]);
        }
        let classifier = Classifier::new(db.clone(), None, &Settings::default());
        let queue = CategorizationQueue::new(db.clone(), classifier, &fast_settings());

        let handles: Vec<TaskHandle> = (1..=4).map(|u| queue.enqueue(u).unwrap()).collect();
        for handle in handles {
            assert_eq!(handle.wait().await.unwrap(), JobStatus::Completed);
        }

        let names: Vec<String> = db
            .list_categories()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Alimentação", "Lazer"]);
        for user_id in 1..=4 {
            assert!(db.uncategorized_transactions(user_id).unwrap().is_empty());
        }
    }
}
