use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::api::NewsApiClient;
use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::models::{RunRecord, RunStatus};
use crate::services::Notifier;
use crate::{monitor, pipeline};

pub const PIPELINE_JOB: &str = "news_pipeline";
pub const MONITOR_JOB: &str = "failure_monitor";

/// Outcome of one full pipeline execution.
#[derive(Debug)]
pub struct PipelineSummary {
    pub fetched: usize,
    pub accumulated: usize,
    pub filtered_total: usize,
}

/// One end-to-end pipeline execution: fetch, then dedup, then filter, each
/// stage triggered by completion of the previous one. The run is recorded
/// in history either way so the failure monitor can see it.
pub async fn run_pipeline_once(
    repo: &Repository,
    client: &NewsApiClient,
    config: &Config,
) -> Result<PipelineSummary> {
    let run_id = Uuid::new_v4().to_string();
    tracing::info!(run_id = %run_id, "Starting pipeline run");

    let result = run_stages(repo, client, config).await;

    let status = match &result {
        Ok(_) => RunStatus::Success,
        Err(_) => RunStatus::Failure,
    };
    repo.record_run(RunRecord {
        run_id,
        job_name: PIPELINE_JOB.to_string(),
        status,
        created_at: Utc::now(),
        tags: vec!["pipeline".to_string()],
    })
    .await?;

    result
}

async fn run_stages(
    repo: &Repository,
    client: &NewsApiClient,
    config: &Config,
) -> Result<PipelineSummary> {
    let batch = pipeline::fetch::run(client, repo, &config.category_uris).await?;
    let fetched = batch.len();

    let outcome = pipeline::dedup::run(repo, batch).await?;

    pipeline::filter::run(repo, outcome.new_rows).await?;

    // Persisted totals, not this run's snapshot: an empty fetch short-
    // circuits the dedup stage, whose in-memory snapshot is then empty
    // while the store still holds the accumulated history.
    let accumulated = repo.count_processed().await?;
    let filtered_total = repo.count_filtered().await?;

    Ok(PipelineSummary {
        fetched,
        accumulated,
        filtered_total,
    })
}

/// One monitor pass: scan the trailing window and deliver a batched report
/// when there is one, with a per-job breakdown of the same window for
/// finer-grained visibility. Delivery failures are recorded as failed
/// monitor runs rather than crashing the loop.
pub async fn run_monitor_once<N: Notifier>(
    repo: &Repository,
    notifier: Option<&N>,
) -> Result<bool> {
    let now = Utc::now();
    let report = match monitor::scan(repo, now).await? {
        Some(report) => report,
        None => return Ok(false),
    };

    let by_job = monitor::scan_by_job(repo, &[PIPELINE_JOB, MONITOR_JOB], now).await?;
    for (job, failures) in &by_job {
        tracing::warn!(
            job = %job,
            count = failures.len(),
            "Monitored job failed in the last hour"
        );
    }

    match notifier {
        Some(notifier) => {
            if let Err(e) = notifier.notify(&report).await {
                tracing::error!("Failed to deliver failure alert: {}", e);
                repo.record_run(RunRecord {
                    run_id: Uuid::new_v4().to_string(),
                    job_name: MONITOR_JOB.to_string(),
                    status: RunStatus::Failure,
                    created_at: Utc::now(),
                    tags: vec!["monitor".to_string()],
                })
                .await?;
            }
        }
        None => {
            tracing::warn!(
                failures = report.failure_count,
                severity = ?report.severity,
                "Pipeline failure alert (no webhook configured)"
            );
        }
    }

    Ok(true)
}

/// Daemon loop: pipeline on one interval, monitor on another. The pipeline
/// tick runs all three stages in sequence, so downstream stages never race
/// the fetch.
pub async fn run<N: Notifier>(
    repo: &Repository,
    client: &NewsApiClient,
    config: &Config,
    notifier: Option<&N>,
) -> Result<()> {
    let mut pipeline_tick = tokio::time::interval(Duration::from_secs(
        u64::from(config.fetch_interval_hours) * 3600,
    ));
    let mut monitor_tick =
        tokio::time::interval(Duration::from_secs(config.monitor_interval_secs));

    loop {
        tokio::select! {
            _ = pipeline_tick.tick() => {
                match run_pipeline_once(repo, client, config).await {
                    Ok(summary) => tracing::info!(
                        fetched = summary.fetched,
                        accumulated = summary.accumulated,
                        filtered = summary.filtered_total,
                        "Pipeline run complete"
                    ),
                    Err(e) => tracing::error!("Pipeline run failed: {}", e),
                }
            }
            _ = monitor_tick.tick() => {
                if let Err(e) = run_monitor_once(repo, notifier).await {
                    tracing::error!("Monitor scan failed: {}", e);
                }
            }
        }
    }
}
