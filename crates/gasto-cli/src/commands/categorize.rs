//! Classification and bulk categorization commands

use anyhow::{bail, Result};
use gasto_core::models::JobStatus;
use gasto_core::{CategorizationQueue, Classifier, Database, Settings};
use rust_decimal::Decimal;

use super::truncate;

pub async fn cmd_classify(
    classifier: &Classifier,
    description: &str,
    amount: Option<Decimal>,
) -> Result<()> {
    let result = classifier.classify_detailed(description, amount).await;
    println!("{}  ({})", result.category, result.source);
    Ok(())
}

/// Run a categorization job in the foreground and print its summary
///
/// Goes through the job queue so the run is recorded like a server-side one.
pub async fn cmd_categorize(
    db: &Database,
    classifier: Classifier,
    settings: &Settings,
    user_id: i64,
) -> Result<()> {
    println!("🏷️  Categorizing transactions for user {}...", user_id);

    let queue = CategorizationQueue::new(db.clone(), classifier, &settings.jobs);
    let handle = queue.enqueue(user_id)?;
    let job_id = handle.job_id;
    let status = handle.wait().await?;

    let Some(job) = queue.get_job(job_id)? else {
        bail!("Job {} disappeared from the ledger", job_id);
    };

    if status == JobStatus::Failed {
        bail!(
            "Categorization job {} failed after {} attempt(s): {}",
            job_id,
            job.attempts,
            job.error.as_deref().unwrap_or("unknown error")
        );
    }

    let s = &job.summary;
    println!();
    println!("📊 Job {} completed", job_id);
    println!("   ─────────────────────────────");
    println!("   Categorized:          {}", s.processed);
    println!("   ├─ ephemeral cache:   {}", s.by_ephemeral_cache);
    println!("   ├─ persistent cache:  {}", s.by_persistent_cache);
    println!("   ├─ LLM:               {}", s.by_llm);
    println!("   └─ keyword fallback:  {}", s.by_fallback);
    if s.failed > 0 {
        println!("   ⚠️  Not saved: {} (left for the next run)", s.failed);
    }

    Ok(())
}

pub fn cmd_jobs(db: &Database, user_id: i64, json: bool) -> Result<()> {
    let jobs = db.list_categorization_jobs(user_id, 50)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("No categorization jobs for user {}.", user_id);
        return Ok(());
    }

    println!(
        "{:<6} {:<11} {:>8} {:>9} {:<19}  {}",
        "ID", "STATUS", "ATTEMPTS", "PROCESSED", "CREATED", "ERROR"
    );
    for job in &jobs {
        println!(
            "{:<6} {:<11} {:>8} {:>9} {:<19}  {}",
            job.id,
            job.status.as_str(),
            job.attempts,
            job.summary.processed,
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
            truncate(job.error.as_deref().unwrap_or(""), 40)
        );
    }

    Ok(())
}
