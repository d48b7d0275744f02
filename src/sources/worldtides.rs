//! WorldTides v3 `extremes` client.

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;

use super::{check_status, TideSource};
use crate::error::{DaypackError, Result};
use crate::models::{Observer, TideExtreme, TideKind, TimeWindow};

pub const WORLDTIDES_URL: &str = "https://www.worldtides.info/api/v3";

const SOURCE: &str = "worldtides";

/// Response body. Only the fields we read are declared.
#[derive(Debug, Deserialize)]
pub struct WorldTidesResponse {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub extremes: Vec<RawExtreme>,
}

#[derive(Debug, Deserialize)]
pub struct RawExtreme {
    /// Unix seconds.
    pub dt: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub height: Option<f64>,
}

// ---

#[derive(Debug, Clone)]
pub struct WorldTides {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl WorldTides {
    // ---
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// `extremes` is a bare flag; every other parameter is form-encoded.
    fn request(&self, observer: &Observer, window: &TimeWindow) -> reqwest::RequestBuilder {
        // ---
        let url = format!("{}?extremes", self.base_url);
        self.client.get(url).query(&[
            ("lat", observer.lat.to_string()),
            ("lon", observer.lon.to_string()),
            ("start", window.start_utc.timestamp().to_string()),
            ("length", window.duration().num_seconds().to_string()),
            ("key", self.api_key.clone()),
        ])
    }
}

/// Convert a WorldTides body into extremes. Rows with an unknown type or
/// an out-of-range timestamp are skipped.
pub fn parse_extremes(body: WorldTidesResponse) -> Result<Vec<TideExtreme>> {
    // ---
    if let Some(error) = body.error {
        return Err(DaypackError::unavailable(SOURCE, error));
    }
    if let Some(status) = body.status.filter(|s| *s != 200) {
        let reason = format!("status {status}");
        return Err(DaypackError::unavailable(SOURCE, reason));
    }

    let mut out = Vec::with_capacity(body.extremes.len());
    for raw in body.extremes {
        let kind = match raw.kind.to_ascii_lowercase().as_str() {
            "high" => TideKind::High,
            "low" => TideKind::Low,
            other => {
                tracing::debug!("Skipping tide extreme with unknown type '{}'", other);
                continue;
            }
        };
        let Some(instant_utc) = DateTime::from_timestamp(raw.dt, 0) else {
            tracing::debug!("Skipping tide extreme with invalid dt {}", raw.dt);
            continue;
        };
        out.push(TideExtreme {
            instant_utc,
            kind,
            height_m: raw.height,
        });
    }
    Ok(out)
}

#[async_trait]
impl TideSource for WorldTides {
    async fn tide_extremes(
        &self,
        observer: Observer,
        window: TimeWindow,
    ) -> Result<Vec<TideExtreme>> {
        // ---
        tracing::debug!(
            "Fetching tide extremes lat={} lon={} from {} for {}s",
            observer.lat,
            observer.lon,
            window.start_utc,
            window.duration().num_seconds()
        );

        let response = self
            .request(&observer, &window)
            .send()
            .await
            .map_err(|e| DaypackError::unavailable(SOURCE, e.without_url()))?;

        let body: WorldTidesResponse = check_status(SOURCE, response)?
            .json()
            .await
            .map_err(|e| DaypackError::unavailable(SOURCE, e.without_url()))?;

        parse_extremes(body)
    }
}
