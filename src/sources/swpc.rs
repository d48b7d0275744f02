//! NOAA SWPC one-minute planetary K-index feed.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use super::{check_status, SeveritySource};
use crate::error::{DaypackError, Result};
use crate::models::SeveritySample;

pub const NOAA_KP_1M: &str = "https://services.swpc.noaa.gov/json/planetary_k_index_1m.json";

const SOURCE: &str = "kp feed";

// ---

#[derive(Debug, Clone)]
pub struct SwpcKpFeed {
    client: reqwest::Client,
    url: String,
}

impl SwpcKpFeed {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

/// `time_tag` is usually naive (`2024-05-10T17:42:00`) and means UTC;
/// RFC 3339 is accepted too.
fn parse_time_tag(tag: &str) -> Option<DateTime<Utc>> {
    // ---
    DateTime::parse_from_rfc3339(tag)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(tag, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc())
        })
}

/// Extract `(time_tag, estimated_kp)` pairs in feed order. Rows missing
/// either field, or with an unparseable time, are skipped.
pub fn parse_kp_rows(rows: &[Value]) -> Vec<SeveritySample> {
    // ---
    rows.iter()
        .filter_map(|row| {
            let time_utc = row.get("time_tag")?.as_str().and_then(parse_time_tag)?;
            let kp = row.get("estimated_kp")?.as_f64()?;
            Some(SeveritySample { time_utc, kp })
        })
        .collect()
}

#[async_trait]
impl SeveritySource for SwpcKpFeed {
    async fn severity_series(&self) -> Result<Vec<SeveritySample>> {
        // ---
        tracing::debug!("Fetching K-index feed from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| DaypackError::unavailable(SOURCE, e))?;

        let rows: Vec<Value> = check_status(SOURCE, response)?
            .json()
            .await
            .map_err(|e| DaypackError::unavailable(SOURCE, e))?;

        let series = parse_kp_rows(&rows);
        tracing::debug!("K-index feed: {} rows, {} usable", rows.len(), series.len());
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_kp_rows() {
        // ---
        let rows: Vec<Value> = serde_json::from_str(
            r#"[
                {"time_tag": "2024-05-10T17:40:00", "estimated_kp": 8.33, "kp": "8P"},
                {"time_tag": "2024-05-10T17:41:00", "kp_index": 8},
                {"estimated_kp": 9.0},
                {"time_tag": "yesterday", "estimated_kp": 9.0},
                {"time_tag": "2024-05-10T17:42:00Z", "estimated_kp": 9}
            ]"#,
        )
        .unwrap();

        let series = parse_kp_rows(&rows);
        assert_eq!(series.len(), 2);
        let first = Utc.with_ymd_and_hms(2024, 5, 10, 17, 40, 0).unwrap();
        assert_eq!(series[0].time_utc, first);
        assert_eq!(series[0].kp, 8.33);
        assert_eq!(series[1].kp, 9.0);
    }
}
