mod client;

pub use client::{ArticleQuery, NewsApiClient, RawArticle};
