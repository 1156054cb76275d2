use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::FailureReport;

/// Delivery transport for batched failure reports. The monitor produces
/// the report; implementations only decide where it goes.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn notify(&self, report: &FailureReport) -> Result<()>;
}

/// Keep webhook messages readable: detail the first few failures, count
/// the rest.
const MAX_DETAILED_FAILURES: usize = 5;

#[derive(Debug, Serialize)]
struct WebhookPayload {
    text: String,
    severity: String,
    failure_count: usize,
    time_window: String,
    report: FailureReport,
}

fn build_payload(report: &FailureReport) -> WebhookPayload {
    let mut text = format!(
        "Pipeline failure alert: {} failure(s) in the {}\n",
        report.failure_count, report.time_window
    );
    for failure in report.failures.iter().take(MAX_DETAILED_FAILURES) {
        text.push_str(&format!(
            "- {} run {} at {}\n",
            failure.job_name,
            failure.run_id,
            failure.created_at.to_rfc3339()
        ));
    }
    if report.failures.len() > MAX_DETAILED_FAILURES {
        text.push_str(&format!(
            "...and {} more failure(s)\n",
            report.failures.len() - MAX_DETAILED_FAILURES
        ));
    }

    WebhookPayload {
        text,
        severity: match report.severity {
            crate::models::Severity::High => "high".to_string(),
            crate::models::Severity::Medium => "medium".to_string(),
        },
        failure_count: report.failure_count,
        time_window: report.time_window.clone(),
        report: report.clone(),
    }
}

/// Posts failure reports to a configured webhook endpoint as JSON.
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            webhook_url,
        }
    }
}

impl Notifier for WebhookNotifier {
    async fn notify(&self, report: &FailureReport) -> Result<()> {
        let payload = build_payload(report);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Notify(format!(
                "Webhook returned HTTP {}",
                response.status()
            )));
        }

        tracing::info!(
            failures = report.failure_count,
            "Failure alert delivered to webhook"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FailureEntry, RunStatus, Severity};
    use chrono::Utc;

    fn report(count: usize) -> FailureReport {
        let failures = (0..count)
            .map(|i| FailureEntry {
                run_id: format!("run-{}", i),
                job_name: "news_pipeline".to_string(),
                status: RunStatus::Failure,
                created_at: Utc::now(),
                tags: vec!["pipeline".to_string()],
            })
            .collect();
        FailureReport::new(failures, "last hour", Utc::now())
    }

    #[test]
    fn payload_details_first_five_failures() {
        let payload = build_payload(&report(8));
        assert_eq!(payload.failure_count, 8);
        assert_eq!(payload.severity, "high");
        assert!(payload.text.contains("run-4"));
        assert!(!payload.text.contains("run-5"));
        assert!(payload.text.contains("...and 3 more failure(s)"));
    }

    #[test]
    fn payload_serializes_full_report() {
        let payload = build_payload(&report(2));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["severity"], "medium");
        assert_eq!(json["report"]["failures"].as_array().unwrap().len(), 2);
        assert_eq!(json["report"]["failures"][0]["job_name"], "news_pipeline");
    }

    #[tokio::test]
    async fn delivers_to_local_webhook() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut data = Vec::new();
            let mut buf = [0u8; 4096];
            // Read until headers and the full declared body have arrived.
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                data.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&data);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text
                        .lines()
                        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(str::trim).map(String::from))
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0);
                    if data.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
            String::from_utf8_lossy(&data).to_string()
        });

        let notifier = WebhookNotifier::new(format!("http://{}/alerts", addr));
        notifier.notify(&report(1)).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /alerts"));
        assert!(request.contains("news_pipeline"));
    }
}
