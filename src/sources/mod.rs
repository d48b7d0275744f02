//! External capabilities consumed by the timeline and the storm watcher.
//!
//! Each capability is an async trait so request handlers and the watcher
//! can hold it as `Arc<dyn _>`; the HTTP adapters below are the production
//! implementations and tests substitute in-memory stubs.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{DaypackError, Result};
use crate::models::{
    MoonEventKind, MoonPhase, Observer, SeveritySample, SunEventKind, TideExtreme, TimeWindow,
};

pub mod ephemeris_http;
pub mod fcm;
pub mod swpc;
pub mod worldtides;

pub use ephemeris_http::HttpEphemeris;
pub use fcm::{FcmAuth, FcmNotifier};
pub use swpc::SwpcKpFeed;
pub use worldtides::WorldTides;

// ---

/// Sun and moon ephemeris.
#[async_trait]
pub trait Ephemeris: Send + Sync {
    /// Dawn, sunrise, sunset and dusk instants inside `window`.
    async fn sun_events(
        &self,
        observer: Observer,
        window: TimeWindow,
    ) -> Result<Vec<(DateTime<Utc>, SunEventKind)>>;

    /// Moonrise, moonset and meridian transits inside `window`.
    async fn moon_events(
        &self,
        observer: Observer,
        window: TimeWindow,
    ) -> Result<Vec<(DateTime<Utc>, MoonEventKind)>>;

    /// Principal phase instants inside `window`.
    async fn moon_phases(&self, window: TimeWindow) -> Result<Vec<(DateTime<Utc>, MoonPhase)>>;

    /// Geocentric Earth-Moon distance in km.
    async fn earth_moon_distance_km(&self, at: DateTime<Utc>) -> Result<f64>;

    /// Distance for many instants at once. Implementations backed by a
    /// remote service should override this with a single round trip.
    async fn earth_moon_distances_km(&self, instants: &[DateTime<Utc>]) -> Result<Vec<f64>> {
        // ---
        let mut out = Vec::with_capacity(instants.len());
        for &at in instants {
            out.push(self.earth_moon_distance_km(at).await?);
        }
        Ok(out)
    }
}

/// High/low water extremes.
#[async_trait]
pub trait TideSource: Send + Sync {
    async fn tide_extremes(
        &self,
        observer: Observer,
        window: TimeWindow,
    ) -> Result<Vec<TideExtreme>>;
}

/// Planetary K-index feed. Samples may come back in any order.
#[async_trait]
pub trait SeveritySource: Send + Sync {
    async fn severity_series(&self) -> Result<Vec<SeveritySample>>;
}

/// Push delivery to a single device token.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_alert(&self, title: &str, body: &str, token: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Fallbacks used when a capability is not configured
// ---------------------------------------------------------------------------

/// Ephemeris stand-in that reports every query as unavailable, so sun and
/// moon sources contribute nothing instead of failing the request.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredEphemeris;

impl UnconfiguredEphemeris {
    fn unavailable() -> DaypackError {
        DaypackError::unavailable("ephemeris", "EPHEMERIS_URL is not set")
    }
}

#[async_trait]
impl Ephemeris for UnconfiguredEphemeris {
    async fn sun_events(
        &self,
        _observer: Observer,
        _window: TimeWindow,
    ) -> Result<Vec<(DateTime<Utc>, SunEventKind)>> {
        Err(Self::unavailable())
    }

    async fn moon_events(
        &self,
        _observer: Observer,
        _window: TimeWindow,
    ) -> Result<Vec<(DateTime<Utc>, MoonEventKind)>> {
        Err(Self::unavailable())
    }

    async fn moon_phases(&self, _window: TimeWindow) -> Result<Vec<(DateTime<Utc>, MoonPhase)>> {
        Err(Self::unavailable())
    }

    async fn earth_moon_distance_km(&self, _at: DateTime<Utc>) -> Result<f64> {
        Err(Self::unavailable())
    }
}

/// Notifier that only logs. Used when push credentials are absent.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_alert(&self, title: &str, body: &str, token: &str) -> Result<()> {
        tracing::info!(token, "push disabled, alert not sent: {} - {}", title, body);
        Ok(())
    }
}

/// Shared reqwest client with connect and overall deadlines.
pub fn http_client(
    connect_timeout: Duration,
    timeout: Duration,
) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .user_agent(concat!("daypack/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Map a non-success HTTP status to `SourceUnavailable`.
pub(crate) fn check_status(
    source_name: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    // ---
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let reason = format!("HTTP {status}");
        Err(DaypackError::unavailable(source_name, reason))
    }
}
