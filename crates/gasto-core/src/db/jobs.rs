//! Categorization job ledger

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{CategorizationJob, CategorizationSummary, JobStatus};

const JOB_COLUMNS: &str = "id, user_id, status, attempts, processed_count, failed_count, \
     by_ephemeral_cache, by_persistent_cache, by_llm, by_fallback, error_message, \
     created_at, started_at, completed_at";

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<CategorizationJob> {
    let status_str: String = row.get(2)?;
    let created_at_str: String = row.get(11)?;
    let started_at_str: Option<String> = row.get(12)?;
    let completed_at_str: Option<String> = row.get(13)?;

    Ok(CategorizationJob {
        id: row.get(0)?,
        user_id: row.get(1)?,
        status: status_str.parse().unwrap_or_default(),
        attempts: row.get(3)?,
        summary: CategorizationSummary {
            processed: row.get(4)?,
            failed: row.get(5)?,
            by_ephemeral_cache: row.get(6)?,
            by_persistent_cache: row.get(7)?,
            by_llm: row.get(8)?,
            by_fallback: row.get(9)?,
        },
        error: row.get(10)?,
        created_at: parse_datetime(&created_at_str)?,
        started_at: started_at_str.as_deref().map(parse_datetime).transpose()?,
        completed_at: completed_at_str.as_deref().map(parse_datetime).transpose()?,
    })
}

impl Database {
    /// Record a new pending job for a user
    pub fn create_categorization_job(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categorization_jobs (user_id, status) VALUES (?, ?)",
            params![user_id, JobStatus::Pending.as_str()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Start an attempt: status becomes processing and the attempt counter goes up
    pub fn mark_job_processing(&self, job_id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"UPDATE categorization_jobs SET
                status = 'processing',
                attempts = attempts + 1,
                started_at = COALESCE(started_at, CURRENT_TIMESTAMP)
            WHERE id = ?"#,
            params![job_id],
        )?;
        Ok(())
    }

    /// Record a failed attempt that will be retried
    pub fn mark_job_retrying(&self, job_id: i64, error: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"UPDATE categorization_jobs SET
                status = 'pending',
                error_message = ?
            WHERE id = ?"#,
            params![error, job_id],
        )?;
        Ok(())
    }

    /// Mark a job completed with its outcome counters
    pub fn mark_job_completed(&self, job_id: i64, summary: &CategorizationSummary) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"UPDATE categorization_jobs SET
                status = 'completed',
                processed_count = ?,
                failed_count = ?,
                by_ephemeral_cache = ?,
                by_persistent_cache = ?,
                by_llm = ?,
                by_fallback = ?,
                error_message = NULL,
                completed_at = CURRENT_TIMESTAMP
            WHERE id = ?"#,
            params![
                summary.processed,
                summary.failed,
                summary.by_ephemeral_cache,
                summary.by_persistent_cache,
                summary.by_llm,
                summary.by_fallback,
                job_id,
            ],
        )?;
        Ok(())
    }

    /// Mark a job permanently failed
    pub fn mark_job_failed(&self, job_id: i64, error: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"UPDATE categorization_jobs SET
                status = 'failed',
                error_message = ?,
                completed_at = CURRENT_TIMESTAMP
            WHERE id = ?"#,
            params![error, job_id],
        )?;
        Ok(())
    }

    /// Get a job by ID
    pub fn get_categorization_job(&self, job_id: i64) -> Result<Option<CategorizationJob>> {
        let conn = self.conn()?;
        let job = conn
            .query_row(
                &format!("SELECT {} FROM categorization_jobs WHERE id = ?", JOB_COLUMNS),
                params![job_id],
                row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    /// List a user's jobs, newest first
    pub fn list_categorization_jobs(&self, user_id: i64, limit: i64) -> Result<Vec<CategorizationJob>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM categorization_jobs WHERE user_id = ? ORDER BY id DESC LIMIT ?",
            JOB_COLUMNS
        ))?;
        let jobs = stmt
            .query_map(params![user_id, limit], row_to_job)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    /// Fail jobs left unfinished by a previous process
    ///
    /// The queue lives in memory, so pending jobs are lost on restart along
    /// with the ones that were mid-run.
    pub fn recover_stuck_jobs(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.execute(
            r#"UPDATE categorization_jobs SET
                status = 'failed',
                error_message = 'Server restarted before the job finished. Please enqueue it again.',
                completed_at = CURRENT_TIMESTAMP
            WHERE status IN ('pending', 'processing')"#,
            [],
        )?;
        Ok(count as i64)
    }
}
