use std::collections::HashSet;

use crate::db::{Repository, STAGE_FILTERED};
use crate::error::Result;
use crate::models::Article;
use crate::pipeline::metadata::{date_range, markdown_preview, StageReport};

/// Sentinel placed in both title and content by sources that retract
/// articles after publication.
const REMOVED_SENTINEL: &str = "[Removed]";

fn field_ok(value: Option<&str>) -> bool {
    match value {
        Some(s) => !s.trim().is_empty() && s != REMOVED_SENTINEL,
        None => false,
    }
}

/// Content-validity predicate: usable title, usable content (body or
/// description), and a parseable publication date. Rows whose date failed
/// lenient parsing upstream carry None here and are dropped.
pub fn is_valid(article: &Article) -> bool {
    field_ok(article.title.as_deref())
        && field_ok(article.content())
        && article.published_at.is_some()
}

/// Apply the validity predicate to a batch, preserving order.
pub fn filter_batch(batch: Vec<Article>) -> Vec<Article> {
    batch.into_iter().filter(is_valid).collect()
}

/// Union newly validated rows into the previously filtered dataset:
/// previous-first URL dedup, then a stable sort by publication date,
/// newest first.
pub fn merge_filtered(existing: Vec<Article>, valid_new: Vec<Article>) -> Vec<Article> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut combined = Vec::with_capacity(existing.len() + valid_new.len());
    for article in existing.into_iter().chain(valid_new) {
        if let Some(url) = article.url.clone() {
            if !seen.insert(url) {
                continue;
            }
        }
        combined.push(article);
    }
    combined.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    combined
}

/// Accumulating filter stage. Consumes the dedup stage's new-rows delta;
/// previously accepted rows are already in the persisted snapshot and are
/// not re-filtered.
pub async fn run(repo: &Repository, new_rows: Vec<Article>) -> Result<Vec<Article>> {
    if new_rows.is_empty() {
        tracing::info!("No new articles to filter");
        return Ok(Vec::new());
    }

    let incoming = new_rows.len();
    let valid = filter_batch(new_rows);
    let removed = incoming - valid.len();
    tracing::info!(
        incoming,
        removed,
        "Validated new articles"
    );

    let existing = repo.load_filtered().await?;
    let existing_count = existing.len();
    let new_count = valid.len();

    let snapshot = merge_filtered(existing, valid);
    repo.replace_filtered(snapshot.clone()).await?;

    StageReport {
        stage: STAGE_FILTERED.to_string(),
        total_articles: snapshot.len(),
        new_articles: new_count,
        removed_articles: removed,
        existing_articles: existing_count,
        date_range: date_range(&snapshot),
        preview: markdown_preview(&snapshot, 10),
    }
    .record(repo)
    .await?;

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn article(url: &str, title: &str, body: &str, day: Option<u32>) -> Article {
        Article {
            article_id: None,
            url: Some(url.to_string()),
            title: if title.is_empty() {
                None
            } else {
                Some(title.to_string())
            },
            body: if body.is_empty() {
                None
            } else {
                Some(body.to_string())
            },
            description: None,
            published_at: day.map(|d| Utc.with_ymd_and_hms(2024, 12, d, 10, 0, 0).unwrap()),
            source_name: None,
            source_uri: None,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn drops_missing_title() {
        assert!(!is_valid(&article("u", "", "content", Some(1))));
    }

    #[test]
    fn drops_blank_title() {
        let mut a = article("u", "x", "content", Some(1));
        a.title = Some("   ".to_string());
        assert!(!is_valid(&a));
    }

    #[test]
    fn drops_removed_sentinel() {
        assert!(!is_valid(&article("u", "[Removed]", "content", Some(1))));
        assert!(!is_valid(&article("u", "Title", "[Removed]", Some(1))));
    }

    #[test]
    fn drops_missing_content() {
        assert!(!is_valid(&article("u", "Title", "", Some(1))));
    }

    #[test]
    fn drops_missing_publication_date() {
        assert!(!is_valid(&article("u", "Title", "content", None)));
    }

    #[test]
    fn description_backfills_missing_body() {
        let mut a = article("u", "Title", "", Some(1));
        a.description = Some("short description".to_string());
        assert!(is_valid(&a));
    }

    #[test]
    fn all_invalid_batch_yields_nothing() {
        let batch = vec![
            article("http://example.com/1", "", "Content", Some(15)),
            article("http://example.com/2", "Title", "", Some(15)),
            article("http://example.com/3", "[Removed]", "[Removed]", Some(15)),
        ];
        assert!(filter_batch(batch).is_empty());
    }

    #[test]
    fn merge_sorts_newest_first() {
        let existing = vec![
            article("u1", "a", "c", Some(10)),
            article("u2", "b", "c", Some(20)),
        ];
        let new = vec![article("u3", "c", "c", Some(15))];

        let merged = merge_filtered(existing, new);
        let days: Vec<u32> = merged
            .iter()
            .map(|a| {
                use chrono::Datelike;
                a.published_at.unwrap().day()
            })
            .collect();
        assert_eq!(days, vec![20, 15, 10]);
    }

    #[test]
    fn merge_prefers_previously_filtered_record() {
        let existing = vec![article("u1", "kept", "c", Some(10))];
        let new = vec![article("u1", "discarded", "c", Some(12))];

        let merged = merge_filtered(existing, new);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title.as_deref(), Some("kept"));
    }
}
