use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::db::Repository;
use crate::error::Result;
use crate::models::{FailureEntry, FailureReport};

const MONITOR_STAGE: &str = "failure_monitor";
const CURSOR_KEY: &str = "cursor";
const WINDOW: &str = "last hour";

/// Scan run history for failures within the trailing hour and batch them
/// into a single report. Returns None on a quiet window. The cursor always
/// advances to `now`, so a window is never reprocessed.
pub async fn scan(repo: &Repository, now: DateTime<Utc>) -> Result<Option<FailureReport>> {
    let last_check = repo.stage_metadata(MONITOR_STAGE, CURSOR_KEY).await?;
    tracing::debug!(?last_check, "Scanning run history for failures");

    let one_hour_ago = now - Duration::hours(1);
    let failed = repo.failed_runs_since(one_hour_ago).await?;

    repo.set_stage_metadata(MONITOR_STAGE, CURSOR_KEY, &now.to_rfc3339())
        .await?;

    if failed.is_empty() {
        tracing::info!("No failures detected in the last hour");
        return Ok(None);
    }

    let failures: Vec<FailureEntry> = failed.into_iter().map(FailureEntry::from).collect();
    tracing::warn!(
        count = failures.len(),
        "Pipeline failure(s) detected in the last hour"
    );

    Ok(Some(FailureReport::new(failures, WINDOW, now)))
}

/// Asset-scoped variant: the same window's failures grouped by job name,
/// for per-stage alerting. Jobs outside the monitored set are ignored.
pub async fn scan_by_job(
    repo: &Repository,
    monitored_jobs: &[&str],
    now: DateTime<Utc>,
) -> Result<BTreeMap<String, Vec<FailureEntry>>> {
    let one_hour_ago = now - Duration::hours(1);
    let failed = repo.failed_runs_since(one_hour_ago).await?;

    let mut by_job: BTreeMap<String, Vec<FailureEntry>> = BTreeMap::new();
    for run in failed {
        if monitored_jobs.contains(&run.job_name.as_str()) {
            by_job
                .entry(run.job_name.clone())
                .or_default()
                .push(FailureEntry::from(run));
        }
    }

    Ok(by_job)
}
