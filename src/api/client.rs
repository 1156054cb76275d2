use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Article;

const API_URL: &str = "https://eventregistry.org/api/v1/article/getArticles";
const PAGE_SIZE: u32 = 100;

#[derive(Debug, Serialize)]
struct GetArticlesRequest {
    #[serde(rename = "apiKey")]
    api_key: String,
    #[serde(rename = "categoryUri")]
    category_uri: CategoryAnd,
    lang: String,
    #[serde(rename = "dateStart")]
    date_start: String,
    #[serde(rename = "articlesSortBy")]
    sort_by: String,
    #[serde(rename = "articlesCount")]
    count: u32,
    #[serde(rename = "resultType")]
    result_type: String,
}

#[derive(Debug, Serialize)]
struct CategoryAnd {
    #[serde(rename = "$and")]
    and: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GetArticlesResponse {
    articles: Option<ArticlePage>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticlePage {
    #[serde(default)]
    results: Vec<RawArticle>,
}

/// Raw article as returned by the API. Field names vary across response
/// versions; normalization into [`Article`] happens in [`RawArticle::normalize`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawArticle {
    pub uri: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "dateTime")]
    pub date_time: Option<String>,
    pub date: Option<String>,
    pub source: Option<RawSource>,
}

/// The source field arrives either as a nested object or as a bare string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawSource {
    Object {
        uri: Option<String>,
        title: Option<String>,
    },
    Name(String),
}

impl RawArticle {
    /// Flatten the raw payload into the canonical record shape.
    pub fn normalize(self, fetched_at: DateTime<Utc>) -> Article {
        let (source_name, source_uri) = match self.source {
            Some(RawSource::Object { uri, title }) => (title, uri),
            Some(RawSource::Name(name)) => (Some(name), None),
            None => (None, None),
        };

        let published_at = self
            .date_time
            .as_deref()
            .and_then(parse_lenient_datetime)
            .or_else(|| self.date.as_deref().and_then(parse_lenient_datetime));

        Article {
            article_id: self.uri.clone(),
            url: self.url.or(self.uri),
            title: self.title,
            body: self.body,
            description: self.description,
            published_at,
            source_name,
            source_uri,
            fetched_at,
        }
    }
}

/// Lenient timestamp parsing: RFC 3339, then a handful of common API
/// formats. Unparseable values become None rather than errors.
fn parse_lenient_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

/// Query parameters for one fetch run.
#[derive(Debug, Clone)]
pub struct ArticleQuery {
    /// Taxonomy categories, all of which must match (boolean AND).
    pub category_uris: Vec<String>,
    /// Lower bound of the fetch window, YYYY-MM-DD.
    pub date_start: String,
}

pub struct NewsApiClient {
    client: Client,
    api_key: String,
    api_url: String,
}

impl NewsApiClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("newsflow/0.1")
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_key,
            api_url: API_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint, e.g. a local stub.
    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = url;
        self
    }

    /// Run one query against the search API: English articles matching every
    /// configured category, relevance-sorted, capped at one page.
    pub async fn fetch_articles(&self, query: &ArticleQuery) -> Result<Vec<RawArticle>> {
        let request = GetArticlesRequest {
            api_key: self.api_key.clone(),
            category_uri: CategoryAnd {
                and: query.category_uris.clone(),
            },
            lang: "eng".to_string(),
            date_start: query.date_start.clone(),
            sort_by: "rel".to_string(),
            count: PAGE_SIZE,
            result_type: "articles".to_string(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::NewsApi(format!(
                "HTTP {} from search API",
                response.status()
            )));
        }

        let body: GetArticlesResponse = response.json().await?;

        if let Some(error) = body.error {
            return Err(AppError::NewsApi(error));
        }

        Ok(body.articles.map(|page| page.results).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_event_registry_schema() {
        let json = r#"{
            "uri": "article-1",
            "title": "Test Article 1",
            "body": "Test content 1",
            "url": "https://example.com/article-1",
            "dateTime": "2024-12-15T10:00:00Z",
            "source": {"uri": "example.com", "title": "Example News"}
        }"#;

        let raw: RawArticle = serde_json::from_str(json).unwrap();
        let article = raw.normalize(Utc::now());

        assert_eq!(article.article_id.as_deref(), Some("article-1"));
        assert_eq!(article.url.as_deref(), Some("https://example.com/article-1"));
        assert_eq!(article.source_name.as_deref(), Some("Example News"));
        assert_eq!(article.source_uri.as_deref(), Some("example.com"));
        assert_eq!(
            article.published_at.unwrap().to_rfc3339(),
            "2024-12-15T10:00:00+00:00"
        );
    }

    #[test]
    fn uri_backfills_missing_url() {
        let json = r#"{"uri": "https://example.com/a", "title": "T", "date": "2024-12-15"}"#;
        let raw: RawArticle = serde_json::from_str(json).unwrap();
        let article = raw.normalize(Utc::now());

        assert_eq!(article.url.as_deref(), Some("https://example.com/a"));
        // date-only variant parses to midnight UTC
        assert_eq!(
            article.published_at.unwrap().to_rfc3339(),
            "2024-12-15T00:00:00+00:00"
        );
    }

    #[test]
    fn string_source_becomes_source_name() {
        let json = r#"{"uri": "a", "title": "T", "source": "Example Wire"}"#;
        let raw: RawArticle = serde_json::from_str(json).unwrap();
        let article = raw.normalize(Utc::now());

        assert_eq!(article.source_name.as_deref(), Some("Example Wire"));
        assert!(article.source_uri.is_none());
    }

    #[test]
    fn unparseable_date_becomes_none() {
        let json = r#"{"uri": "a", "title": "T", "dateTime": "not-a-date"}"#;
        let raw: RawArticle = serde_json::from_str(json).unwrap();
        let article = raw.normalize(Utc::now());

        assert!(article.published_at.is_none());
    }

    #[test]
    fn body_preferred_over_description() {
        let json = r#"{"uri": "a", "body": "full text", "description": "short"}"#;
        let raw: RawArticle = serde_json::from_str(json).unwrap();
        let article = raw.normalize(Utc::now());

        assert_eq!(article.content(), Some("full text"));
    }
}
