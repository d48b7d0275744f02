//! Ephemeris client for an HTTP ephemeris sidecar.
//!
//! Contract (all times RFC 3339 UTC):
//! - `GET  {base}/sun?lat&lon&start&end`          -> `[{"time", "kind"}]`
//! - `GET  {base}/moon/events?lat&lon&start&end`  -> `[{"time", "kind"}]`
//! - `GET  {base}/moon/phases?start&end`          -> `[{"time", "phase"}]`
//! - `POST {base}/moon/distance {"times": [...]}` -> `{"km": [...]}`

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{check_status, Ephemeris};
use crate::error::{DaypackError, Result};
use crate::models::{MoonEventKind, MoonPhase, Observer, SunEventKind, TimeWindow};

const SOURCE: &str = "ephemeris";

#[derive(Debug, Deserialize)]
struct KindRow<K> {
    time: DateTime<Utc>,
    kind: K,
}

#[derive(Debug, Deserialize)]
struct PhaseRow {
    time: DateTime<Utc>,
    phase: MoonPhase,
}

#[derive(Debug, Serialize)]
struct DistanceRequest<'a> {
    times: &'a [DateTime<Utc>],
}

#[derive(Debug, Deserialize)]
struct DistanceResponse {
    km: Vec<f64>,
}

// ---

#[derive(Debug, Clone)]
pub struct HttpEphemeris {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEphemeris {
    // ---
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn window_params(window: &TimeWindow) -> [(&'static str, String); 2] {
        [
            ("start", window.start_utc.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("end", window.end_utc.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ]
    }

    fn observer_params(observer: &Observer) -> [(&'static str, String); 2] {
        [
            ("lat", observer.lat.to_string()),
            ("lon", observer.lon.to_string()),
        ]
    }

    async fn get_json<T: DeserializeOwned + Send>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        // ---
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| DaypackError::unavailable(SOURCE, e))?;

        check_status(SOURCE, response)?
            .json::<T>()
            .await
            .map_err(|e| DaypackError::unavailable(SOURCE, e))
    }

    async fn kind_rows<K: DeserializeOwned + Send>(
        &self,
        path: &str,
        observer: Observer,
        window: TimeWindow,
    ) -> Result<Vec<(DateTime<Utc>, K)>> {
        // ---
        let mut query: Vec<(&str, String)> = Self::observer_params(&observer).into();
        query.extend(Self::window_params(&window));
        let rows: Vec<KindRow<K>> = self.get_json(path, &query).await?;
        Ok(rows.into_iter().map(|r| (r.time, r.kind)).collect())
    }
}

#[async_trait]
impl Ephemeris for HttpEphemeris {
    async fn sun_events(
        &self,
        observer: Observer,
        window: TimeWindow,
    ) -> Result<Vec<(DateTime<Utc>, SunEventKind)>> {
        self.kind_rows("/sun", observer, window).await
    }

    async fn moon_events(
        &self,
        observer: Observer,
        window: TimeWindow,
    ) -> Result<Vec<(DateTime<Utc>, MoonEventKind)>> {
        self.kind_rows("/moon/events", observer, window).await
    }

    async fn moon_phases(&self, window: TimeWindow) -> Result<Vec<(DateTime<Utc>, MoonPhase)>> {
        let rows: Vec<PhaseRow> = self
            .get_json("/moon/phases", &Self::window_params(&window))
            .await?;
        Ok(rows.into_iter().map(|r| (r.time, r.phase)).collect())
    }

    async fn earth_moon_distance_km(&self, at: DateTime<Utc>) -> Result<f64> {
        let km = self.earth_moon_distances_km(&[at]).await?;
        km.first()
            .copied()
            .ok_or_else(|| DaypackError::unavailable(SOURCE, "empty distance reply"))
    }

    async fn earth_moon_distances_km(&self, instants: &[DateTime<Utc>]) -> Result<Vec<f64>> {
        // ---
        let url = format!("{}/moon/distance", self.base_url);
        tracing::debug!("POST {} ({} instants)", url, instants.len());

        let response = self
            .client
            .post(&url)
            .json(&DistanceRequest { times: instants })
            .send()
            .await
            .map_err(|e| DaypackError::unavailable(SOURCE, e))?;

        let body: DistanceResponse = check_status(SOURCE, response)?
            .json()
            .await
            .map_err(|e| DaypackError::unavailable(SOURCE, e))?;

        if body.km.len() != instants.len() {
            return Err(DaypackError::unavailable(
                SOURCE,
                format!("asked for {} distances, got {}", instants.len(), body.km.len()),
            ));
        }
        Ok(body.km)
    }
}
