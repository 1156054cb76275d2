use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::db::Repository;
use crate::error::Result;

/// Metadata key holding the fetch stage's high-water mark.
pub const LAST_FETCH_KEY: &str = "last_fetch_timestamp";

/// Default fetch window when no prior run exists.
const DEFAULT_LOOKBACK_DAYS: i64 = 7;

/// Lower bound for the next fetch window: the recorded high-water mark of
/// the last successful run, or `today - 7 days` when there is none. Missing
/// history is the expected initial-run state, never an error.
pub async fn resolve(repo: &Repository, stage: &str) -> Result<NaiveDate> {
    let raw = repo.stage_metadata(stage, LAST_FETCH_KEY).await?;
    Ok(resolve_start_date(raw.as_deref(), Utc::now().date_naive()))
}

/// Normalize a recorded high-water mark to a date. The value may be an
/// RFC 3339 timestamp or a raw seconds-since-epoch number, depending on
/// which writer recorded it; anything unrecognized falls back to the
/// default lookback window.
pub fn resolve_start_date(raw: Option<&str>, today: NaiveDate) -> NaiveDate {
    if let Some(value) = raw {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return dt.with_timezone(&Utc).date_naive();
        }
        if let Ok(secs) = value.parse::<f64>() {
            if let Some(dt) = DateTime::from_timestamp(secs as i64, 0) {
                return dt.date_naive();
            }
        }
        tracing::warn!("Unrecognized high-water mark {:?}, using default window", value);
    }
    today - Duration::days(DEFAULT_LOOKBACK_DAYS)
}
