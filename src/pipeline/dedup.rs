use std::collections::HashSet;

use crate::db::{Repository, STAGE_PROCESSED};
use crate::error::Result;
use crate::models::Article;
use crate::pipeline::metadata::{date_range, markdown_preview, StageReport};

/// Result of merging a fetched batch into the accumulated dataset.
pub struct DedupOutcome {
    /// Full accumulated, URL-deduplicated dataset.
    pub snapshot: Vec<Article>,
    /// Rows added this run (URLs not previously known). Downstream stages
    /// consume this delta instead of re-processing the whole history.
    pub new_rows: Vec<Article>,
    /// Duplicates dropped within the incoming batch itself.
    pub batch_duplicates: usize,
    /// Incoming rows dropped because their URL was already accumulated.
    pub known_duplicates: usize,
}

/// Drop duplicate URLs within one batch, keeping the first occurrence.
/// Order is preserved; rows without a URL are kept as-is.
pub fn dedup_batch(batch: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    batch
        .into_iter()
        .filter(|article| match &article.url {
            Some(url) => seen.insert(url.clone()),
            None => true,
        })
        .collect()
}

/// Union a new batch into the previously accumulated dataset. Previous data
/// comes first, so on a URL collision the earliest-seen record always wins.
pub fn merge_batch(existing: Vec<Article>, batch: Vec<Article>) -> DedupOutcome {
    let incoming = batch.len();
    let batch = dedup_batch(batch);
    let batch_duplicates = incoming - batch.len();

    let known: HashSet<String> = existing.iter().filter_map(|a| a.url.clone()).collect();

    let mut new_rows = Vec::new();
    let mut known_duplicates = 0;
    for article in batch {
        let already_known = article
            .url
            .as_ref()
            .is_some_and(|url| known.contains(url));
        if already_known {
            known_duplicates += 1;
        } else {
            new_rows.push(article);
        }
    }

    let mut snapshot = existing;
    snapshot.extend(new_rows.iter().cloned());

    DedupOutcome {
        snapshot,
        new_rows,
        batch_duplicates,
        known_duplicates,
    }
}

/// Accumulating dedup stage: merge the freshly fetched batch into the
/// persisted dataset and rewrite the snapshot. An empty batch is a no-op
/// and leaves persisted state untouched.
pub async fn run(repo: &Repository, batch: Vec<Article>) -> Result<DedupOutcome> {
    if batch.is_empty() {
        tracing::info!("No raw articles to process");
        return Ok(DedupOutcome {
            snapshot: Vec::new(),
            new_rows: Vec::new(),
            batch_duplicates: 0,
            known_duplicates: 0,
        });
    }

    let existing = repo.load_processed().await?;
    let existing_count = existing.len();
    tracing::info!(
        existing = existing_count,
        incoming = batch.len(),
        "Merging batch into accumulated dataset"
    );

    let outcome = merge_batch(existing, batch);
    repo.replace_processed(outcome.snapshot.clone()).await?;

    StageReport {
        stage: STAGE_PROCESSED.to_string(),
        total_articles: outcome.snapshot.len(),
        new_articles: outcome.new_rows.len(),
        removed_articles: outcome.batch_duplicates + outcome.known_duplicates,
        existing_articles: existing_count,
        date_range: date_range(&outcome.snapshot),
        preview: markdown_preview(&outcome.snapshot, 5),
    }
    .record(repo)
    .await?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(url: Option<&str>, title: &str) -> Article {
        Article {
            article_id: None,
            url: url.map(|s| s.to_string()),
            title: Some(title.to_string()),
            body: Some("body".to_string()),
            description: None,
            published_at: Some(Utc::now()),
            source_name: None,
            source_uri: None,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn batch_dedup_keeps_first_occurrence() {
        let batch = vec![
            article(Some("https://example.com/x"), "A"),
            article(Some("https://example.com/x"), "B"),
        ];
        let deduped = dedup_batch(batch);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].title.as_deref(), Some("A"));
    }

    #[test]
    fn rows_without_url_bypass_dedup() {
        let batch = vec![article(None, "A"), article(None, "B")];
        assert_eq!(dedup_batch(batch).len(), 2);
    }

    #[test]
    fn previously_known_record_wins_over_new() {
        let existing = vec![article(Some("https://example.com/x"), "old title")];
        let batch = vec![article(Some("https://example.com/x"), "new title")];

        let outcome = merge_batch(existing, batch);
        assert_eq!(outcome.snapshot.len(), 1);
        assert_eq!(outcome.snapshot[0].title.as_deref(), Some("old title"));
        assert_eq!(outcome.known_duplicates, 1);
        assert!(outcome.new_rows.is_empty());
    }

    #[test]
    fn merge_is_idempotent() {
        let existing = vec![
            article(Some("https://example.com/1"), "one"),
            article(Some("https://example.com/2"), "two"),
        ];
        let outcome = merge_batch(existing.clone(), existing.clone());
        assert_eq!(outcome.snapshot.len(), 2);
        assert_eq!(outcome.known_duplicates, 2);
        let titles: Vec<_> = outcome
            .snapshot
            .iter()
            .map(|a| a.title.clone().unwrap())
            .collect();
        assert_eq!(titles, vec!["one", "two"]);
    }

    #[test]
    fn unique_articles_all_preserved() {
        let batch: Vec<_> = (0..5)
            .map(|i| article(Some(&format!("https://example.com/{}", i)), "t"))
            .collect();
        let outcome = merge_batch(Vec::new(), batch);
        assert_eq!(outcome.snapshot.len(), 5);
        assert_eq!(outcome.new_rows.len(), 5);
        assert_eq!(outcome.batch_duplicates, 0);
    }
}
