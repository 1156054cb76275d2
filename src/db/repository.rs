use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Article, RunRecord, RunStatus};

use super::schema::SCHEMA;

/// Logical stage identifiers, used to key run metadata.
pub const STAGE_RAW: &str = "raw_news";
pub const STAGE_PROCESSED: &str = "processed_news";
pub const STAGE_FILTERED: &str = "filtered_news";

/// Async facade over the embedded store. One table per pipeline stage plus
/// run history and per-stage metadata. The schema is created at startup, so
/// an empty table is the clean "no prior data" signal and any later read
/// failure is a genuine storage error that propagates.
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Stage snapshots

    /// Prior accumulated deduplicated dataset, in insertion order.
    pub async fn load_processed(&self) -> Result<Vec<Article>> {
        self.load_articles("processed_articles", "ORDER BY id").await
    }

    /// Prior accumulated filtered dataset, newest first.
    pub async fn load_filtered(&self) -> Result<Vec<Article>> {
        self.load_articles(
            "filtered_articles",
            "ORDER BY published_at DESC NULLS LAST, id",
        )
        .await
    }

    async fn load_articles(&self, table: &str, order: &str) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT article_id, url, title, body, description, published_at, \
             source_name, source_uri, fetched_at FROM {} {}",
            table, order
        );
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map([], |row| Ok(article_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Rewrite the deduplicated snapshot in one transaction.
    pub async fn replace_processed(&self, articles: Vec<Article>) -> Result<()> {
        self.replace_articles("processed_articles", articles).await
    }

    /// Rewrite the filtered snapshot in one transaction.
    pub async fn replace_filtered(&self, articles: Vec<Article>) -> Result<()> {
        self.replace_articles("filtered_articles", articles).await
    }

    async fn replace_articles(&self, table: &'static str, articles: Vec<Article>) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(&format!("DELETE FROM {}", table), [])?;
                {
                    let mut stmt = tx.prepare(&format!(
                        "INSERT INTO {} (article_id, url, title, body, description, \
                         published_at, source_name, source_uri, fetched_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                        table
                    ))?;
                    for article in &articles {
                        stmt.execute(params![
                            article.article_id,
                            article.url,
                            article.title,
                            article.body,
                            article.description,
                            article.published_at.map(|dt| dt.to_rfc3339()),
                            article.source_name,
                            article.source_uri,
                            article.fetched_at.to_rfc3339(),
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn count_processed(&self) -> Result<usize> {
        self.count_articles("processed_articles").await
    }

    pub async fn count_filtered(&self) -> Result<usize> {
        self.count_articles("filtered_articles").await
    }

    async fn count_articles(&self, table: &'static str) -> Result<usize> {
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                        row.get(0)
                    })?;
                Ok(count)
            })
            .await?;
        Ok(count as usize)
    }

    // Stage metadata

    pub async fn stage_metadata(&self, stage: &str, key: &str) -> Result<Option<String>> {
        let stage = stage.to_string();
        let key = key.to_string();
        let value = self
            .conn
            .call(move |conn| {
                let value = conn
                    .query_row(
                        "SELECT value FROM stage_metadata WHERE stage = ?1 AND key = ?2",
                        params![stage, key],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await?;
        Ok(value)
    }

    pub async fn set_stage_metadata(&self, stage: &str, key: &str, value: &str) -> Result<()> {
        let stage = stage.to_string();
        let key = key.to_string();
        let value = value.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO stage_metadata (stage, key, value, recorded_at)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(stage, key) DO UPDATE SET
                           value = excluded.value,
                           recorded_at = excluded.recorded_at"#,
                    params![stage, key, value, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Run history

    pub async fn record_run(&self, run: RunRecord) -> Result<()> {
        let tags_json = serde_json::to_string(&run.tags)?;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO runs (run_id, job_name, status, created_at, tags) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        run.run_id,
                        run.job_name,
                        run.status.as_str(),
                        run.created_at.to_rfc3339(),
                        tags_json,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Failed runs created after the given instant, newest first, capped
    /// at 100 per scan.
    pub async fn failed_runs_since(&self, since: DateTime<Utc>) -> Result<Vec<RunRecord>> {
        let since = since.to_rfc3339();
        let runs = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT run_id, job_name, status, created_at, tags FROM runs \
                     WHERE status = 'failure' AND created_at > ?1 \
                     ORDER BY created_at DESC LIMIT 100",
                )?;
                let runs = stmt
                    .query_map(params![since], |row| Ok(run_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(runs)
            })
            .await?;
        Ok(runs)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn article_from_row(row: &Row) -> Article {
    Article {
        article_id: row.get(0).unwrap(),
        url: row.get(1).unwrap(),
        title: row.get(2).unwrap(),
        body: row.get(3).unwrap(),
        description: row.get(4).unwrap(),
        published_at: row
            .get::<_, Option<String>>(5)
            .unwrap()
            .and_then(|s| parse_datetime(&s)),
        source_name: row.get(6).unwrap(),
        source_uri: row.get(7).unwrap(),
        fetched_at: row
            .get::<_, String>(8)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn run_from_row(row: &Row) -> RunRecord {
    let tags: Vec<String> = row
        .get::<_, Option<String>>(4)
        .unwrap()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();
    RunRecord {
        run_id: row.get(0).unwrap(),
        job_name: row.get(1).unwrap(),
        status: RunStatus::parse(&row.get::<_, String>(2).unwrap()),
        created_at: row
            .get::<_, String>(3)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        tags,
    }
}
