use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> RunStatus {
        match s {
            "success" => RunStatus::Success,
            _ => RunStatus::Failure,
        }
    }
}

/// One pipeline or monitor execution in run history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub job_name: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

/// One failed run inside a batched failure report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEntry {
    pub run_id: String,
    pub job_name: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

impl From<RunRecord> for FailureEntry {
    fn from(run: RunRecord) -> Self {
        FailureEntry {
            run_id: run.run_id,
            job_name: run.job_name,
            status: run.status,
            created_at: run.created_at,
            tags: run.tags,
        }
    }
}

/// Batched failure report handed to the notifier. One report covers the
/// whole scan window regardless of how many runs failed in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub failure_count: usize,
    pub time_window: String,
    pub severity: Severity,
    pub generated_at: DateTime<Utc>,
    pub failures: Vec<FailureEntry>,
}

impl FailureReport {
    pub fn new(failures: Vec<FailureEntry>, time_window: &str, now: DateTime<Utc>) -> Self {
        let severity = if failures.len() > 5 {
            Severity::High
        } else {
            Severity::Medium
        };
        FailureReport {
            failure_count: failures.len(),
            time_window: time_window.to_string(),
            severity,
            generated_at: now,
            failures,
        }
    }
}
