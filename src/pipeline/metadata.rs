use serde::Serialize;

use crate::db::Repository;
use crate::error::Result;
use crate::models::Article;

/// Structured report attached to one stage execution. Persisted as JSON
/// under the stage's metadata so the last run of every stage stays
/// inspectable from the store.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub total_articles: usize,
    pub new_articles: usize,
    pub removed_articles: usize,
    pub existing_articles: usize,
    pub date_range: Option<String>,
    pub preview: String,
}

impl StageReport {
    pub async fn record(&self, repo: &Repository) -> Result<()> {
        let json = serde_json::to_string(self)?;
        repo.set_stage_metadata(&self.stage, "last_report", &json)
            .await?;
        tracing::info!(
            stage = %self.stage,
            total = self.total_articles,
            new = self.new_articles,
            removed = self.removed_articles,
            existing = self.existing_articles,
            "Stage completed"
        );
        Ok(())
    }
}

/// Min/max of `published_at` over the snapshot, rendered as a range.
pub fn date_range(articles: &[Article]) -> Option<String> {
    let mut dates = articles.iter().filter_map(|a| a.published_at);
    let first = dates.next()?;
    let (min, max) = dates.fold((first, first), |(min, max), d| (min.min(d), max.max(d)));
    Some(format!("{} to {}", min.to_rfc3339(), max.to_rfc3339()))
}

/// Short human-readable markdown table of the top records.
pub fn markdown_preview(articles: &[Article], limit: usize) -> String {
    if articles.is_empty() {
        return "No articles".to_string();
    }

    let mut out = String::from("| title | source_name | published_at |\n|---|---|---|\n");
    for article in articles.iter().take(limit) {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            article.title.as_deref().unwrap_or("-"),
            article.source_name.as_deref().unwrap_or("-"),
            article
                .published_at
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn article(title: &str, published: Option<&str>) -> Article {
        Article {
            article_id: None,
            url: Some(format!("https://example.com/{}", title)),
            title: Some(title.to_string()),
            body: Some("body".to_string()),
            description: None,
            published_at: published.map(|s| {
                chrono::DateTime::parse_from_rfc3339(s)
                    .unwrap()
                    .with_timezone(&Utc)
            }),
            source_name: Some("Example News".to_string()),
            source_uri: None,
            fetched_at: Utc.with_ymd_and_hms(2024, 12, 15, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn preview_of_empty_batch() {
        assert_eq!(markdown_preview(&[], 5), "No articles");
    }

    #[test]
    fn preview_caps_at_limit() {
        let articles: Vec<_> = (0..10)
            .map(|i| article(&format!("a{}", i), Some("2024-12-15T10:00:00+00:00")))
            .collect();
        let preview = markdown_preview(&articles, 5);
        // header + separator + 5 rows
        assert_eq!(preview.trim_end().lines().count(), 7);
    }

    #[test]
    fn date_range_spans_min_to_max() {
        let articles = vec![
            article("a", Some("2024-12-14T08:00:00+00:00")),
            article("b", None),
            article("c", Some("2024-12-16T09:00:00+00:00")),
        ];
        let range = date_range(&articles).unwrap();
        assert!(range.starts_with("2024-12-14T08:00:00"));
        assert!(range.contains("2024-12-16T09:00:00"));
    }
}
