use chrono::Utc;

use crate::api::{ArticleQuery, NewsApiClient};
use crate::db::{Repository, STAGE_RAW};
use crate::error::Result;
use crate::models::Article;
use crate::pipeline::cursor::{self, LAST_FETCH_KEY};
use crate::pipeline::metadata::{date_range, markdown_preview, StageReport};

/// Fetch stage: one incremental query against the search API, normalized
/// into canonical records. API failures degrade to an empty batch so the
/// scheduled run keeps going; downstream stages see "nothing new this run".
pub async fn run(
    client: &NewsApiClient,
    repo: &Repository,
    category_uris: &[String],
) -> Result<Vec<Article>> {
    let from_date = cursor::resolve(repo, STAGE_RAW).await?;
    let date_start = from_date.format("%Y-%m-%d").to_string();
    tracing::info!(from_date = %date_start, "Fetching articles");

    let query = ArticleQuery {
        category_uris: category_uris.to_vec(),
        date_start,
    };

    let raw = match client.fetch_articles(&query).await {
        Ok(raw) => raw,
        Err(e) => {
            // Degrade to an empty batch; the high-water mark is not
            // advanced, so the missed window is retried next run.
            tracing::error!("Error fetching news: {}", e);
            return Ok(Vec::new());
        }
    };

    let fetched_at = Utc::now();
    let articles: Vec<Article> = raw
        .into_iter()
        .map(|r| r.normalize(fetched_at))
        .collect();
    tracing::info!(count = articles.len(), "Fetched articles");

    // Wall-clock high-water mark, independent of article dates. Forward
    // progress is guaranteed even on an empty fetch.
    repo.set_stage_metadata(STAGE_RAW, LAST_FETCH_KEY, &fetched_at.to_rfc3339())
        .await?;

    StageReport {
        stage: STAGE_RAW.to_string(),
        total_articles: articles.len(),
        new_articles: articles.len(),
        removed_articles: 0,
        existing_articles: 0,
        date_range: date_range(&articles),
        preview: markdown_preview(&articles, 5),
    }
    .record(repo)
    .await?;

    Ok(articles)
}
