pub const SCHEMA: &str = r#"
-- accumulated URL-deduplicated articles (owned by the dedup stage)
CREATE TABLE IF NOT EXISTS processed_articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    article_id TEXT,
    url TEXT UNIQUE,
    title TEXT,
    body TEXT,
    description TEXT,
    published_at TEXT,
    source_name TEXT,
    source_uri TEXT,
    fetched_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_processed_url ON processed_articles(url);

-- accumulated filtered articles (owned by the filter stage)
CREATE TABLE IF NOT EXISTS filtered_articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    article_id TEXT,
    url TEXT UNIQUE,
    title TEXT NOT NULL,
    body TEXT,
    description TEXT,
    published_at TEXT NOT NULL,
    source_name TEXT,
    source_uri TEXT,
    fetched_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_filtered_published_at ON filtered_articles(published_at DESC);

-- run history, scanned by the failure monitor
CREATE TABLE IF NOT EXISTS runs (
    run_id TEXT PRIMARY KEY,
    job_name TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    tags TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_status_created ON runs(status, created_at);

-- per-stage key/value metadata (high-water marks, monitor cursor, run reports)
CREATE TABLE IF NOT EXISTS stage_metadata (
    stage TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    recorded_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (stage, key)
);
"#;
