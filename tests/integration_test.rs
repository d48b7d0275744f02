use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;

use daypack::models::{MoonEventKind, MoonPhase, SunEventKind};
use daypack::{
    AppState, Config, DaypackError, DeviceRegistry, Ephemeris, Observer, SeveritySample,
    SeveritySource, TimeWindow, TimelineSources,
};

#[derive(Debug, Deserialize)]
struct Event {
    time_local: String,
    label: String,
}

#[derive(Debug, Deserialize)]
struct Meta {
    lat: f64,
    lon: f64,
    date: String,
    tz: String,
}

#[derive(Debug, Deserialize)]
struct DaypackResponse {
    events: Vec<Event>,
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct KpPoint {
    time_utc: DateTime<Utc>,
    kp: f64,
}

#[derive(Debug, Deserialize)]
struct KpResponse {
    series: Vec<KpPoint>,
    last_point: Option<KpPoint>,
    g_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KpLineResponse {
    x: Vec<DateTime<Utc>>,
    y: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct RegistryResponse {
    ok: bool,
    count: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

// ---

fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, hour, minute, 0).unwrap()
}

/// Ephemeris with one sunrise at 06:30 Brisbane time on 2024-06-21, a few
/// moon events around it and a strictly decreasing distance curve.
struct StubEphemeris;

#[async_trait]
impl Ephemeris for StubEphemeris {
    async fn sun_events(
        &self,
        _observer: Observer,
        _window: TimeWindow,
    ) -> daypack::Result<Vec<(DateTime<Utc>, SunEventKind)>> {
        Ok(vec![(utc(20, 20, 30), SunEventKind::Sunrise)])
    }

    async fn moon_events(
        &self,
        _observer: Observer,
        _window: TimeWindow,
    ) -> daypack::Result<Vec<(DateTime<Utc>, MoonEventKind)>> {
        Ok(vec![
            // 2024-06-21 16:45 local
            (utc(21, 6, 45), MoonEventKind::Rise),
            // 2024-06-21 01:20 local
            (utc(20, 15, 20), MoonEventKind::UpperTransit),
            // 2024-06-22 07:40 local: next day, dropped
            (utc(21, 21, 40), MoonEventKind::Set),
        ])
    }

    async fn moon_phases(
        &self,
        _window: TimeWindow,
    ) -> daypack::Result<Vec<(DateTime<Utc>, MoonPhase)>> {
        // 2024-06-22 11:07 local: outside the day
        Ok(vec![(utc(22, 1, 7), MoonPhase(2))])
    }

    async fn earth_moon_distance_km(&self, at: DateTime<Utc>) -> daypack::Result<f64> {
        Ok(400_000.0 - (at - utc(20, 0, 0)).num_minutes() as f64)
    }
}

struct StubFeed {
    samples: Vec<SeveritySample>,
}

#[async_trait]
impl SeveritySource for StubFeed {
    async fn severity_series(&self) -> daypack::Result<Vec<SeveritySample>> {
        Ok(self.samples.clone())
    }
}

struct DownFeed;

#[async_trait]
impl SeveritySource for DownFeed {
    async fn severity_series(&self) -> daypack::Result<Vec<SeveritySample>> {
        Err(DaypackError::unavailable("kp feed", "connection refused"))
    }
}

fn storm_feed() -> Arc<StubFeed> {
    // ---
    let t0 = Utc.with_ymd_and_hms(2024, 5, 10, 17, 0, 0).unwrap();
    let sample = |minutes: i64, kp: f64| SeveritySample {
        time_utc: t0 + chrono::Duration::minutes(minutes),
        kp,
    };
    Arc::new(StubFeed {
        samples: vec![sample(2, 7.33), sample(0, 4.0), sample(1, 9.0)],
    })
}

fn app_state(severity: Arc<dyn SeveritySource>) -> AppState {
    AppState {
        config: Config::default(),
        timeline: TimelineSources {
            ephemeris: Arc::new(StubEphemeris),
            tides: None,
        },
        severity,
        registry: DeviceRegistry::new(),
    }
}

/// Serve the real router on an ephemeral port and return its base URL.
async fn spawn_app(state: AppState) -> Result<String> {
    // ---
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, daypack::router(state)).await;
    });
    Ok(format!("http://{addr}"))
}

// ---

#[tokio::test]
async fn daypack_brisbane_end_to_end() -> Result<()> {
    // ---
    let base = spawn_app(app_state(storm_feed())).await?;
    let url = format!(
        "{base}/daypack?lat=-27.47&lon=153.02&date_str=2024-06-21&tzname=Australia/Brisbane"
    );

    let resp = Client::new().get(&url).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: DaypackResponse = resp.json().await?;

    let got: Vec<(&str, &str)> = body
        .events
        .iter()
        .map(|e| (e.time_local.as_str(), e.label.as_str()))
        .collect();
    assert_eq!(
        got,
        vec![
            ("2024-06-21T01:20+10:00", "Moon above"),
            ("2024-06-21T06:30+10:00", "Sunrise"),
            ("2024-06-21T16:45+10:00", "Moonrise"),
        ]
    );

    for e in &body.events {
        assert!(
            e.time_local.starts_with("2024-06-21T"),
            "{} is not on the requested date",
            e.time_local
        );
    }

    assert_eq!(body.meta.lat, -27.47);
    assert_eq!(body.meta.lon, 153.02);
    assert_eq!(body.meta.date, "2024-06-21");
    assert_eq!(body.meta.tz, "Australia/Brisbane");
    Ok(())
}

#[tokio::test]
async fn daypack_uses_default_timezone_and_aliases() -> Result<()> {
    // ---
    let base = spawn_app(app_state(storm_feed())).await?;
    let url = format!("{base}/daypack?lat=-27.47&lon=153.02&date=2024-06-21");

    let body: DaypackResponse = Client::new().get(&url).send().await?.json().await?;
    assert_eq!(body.meta.tz, "Australia/Brisbane");
    assert!(body.events.iter().any(|e| e.label == "Sunrise"));

    // Same instant seen from UTC falls on 2024-06-20
    let url = format!("{base}/daypack?lat=-27.47&lon=153.02&date=2024-06-20&tz=UTC");
    let body: DaypackResponse = Client::new().get(&url).send().await?.json().await?;
    let sunrise = body.events.iter().find(|e| e.label == "Sunrise").unwrap();
    assert_eq!(sunrise.time_local, "2024-06-20T20:30+00:00");
    Ok(())
}

#[tokio::test]
async fn daypack_rejects_invalid_input() -> Result<()> {
    // ---
    let base = spawn_app(app_state(storm_feed())).await?;
    let client = Client::new();

    let cases = [
        ("lat=0&lon=0&date_str=2024-06-21&tzname=Moon/Tranquility", "invalid timezone"),
        ("lat=0&lon=0&date_str=2024-13-40&tzname=UTC", "invalid date"),
        ("lat=95&lon=0&date_str=2024-06-21&tzname=UTC", "invalid coordinates"),
    ];
    for (query, expected) in cases {
        let resp = client.get(format!("{base}/daypack?{query}")).send().await?;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{query}");
        let body: ErrorResponse = resp.json().await?;
        assert!(body.error.starts_with(expected), "{query}: {}", body.error);
    }

    let resp = client
        .get(format!("{base}/daypack?lon=0&date_str=2024-06-21"))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn kp_reports_latest_point_and_level() -> Result<()> {
    // ---
    let base = spawn_app(app_state(storm_feed())).await?;
    let body: KpResponse = Client::new()
        .get(format!("{base}/kp"))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body.series.len(), 3);
    let times: Vec<_> = body.series.iter().map(|p| p.time_utc).collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    let last = body.last_point.unwrap();
    assert_eq!(last.kp, 7.33);
    assert_eq!(body.g_level.as_deref(), Some("G3"));
    Ok(())
}

#[tokio::test]
async fn kp_line_keeps_feed_order() -> Result<()> {
    // ---
    let base = spawn_app(app_state(storm_feed())).await?;
    let body: KpLineResponse = Client::new()
        .get(format!("{base}/kp_line"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body.y, vec![7.33, 4.0, 9.0]);
    assert_eq!(body.x.len(), 3);
    Ok(())
}

#[tokio::test]
async fn kp_feed_failure_is_an_empty_series() -> Result<()> {
    // ---
    let base = spawn_app(app_state(Arc::new(DownFeed))).await?;
    let resp = Client::new().get(format!("{base}/kp")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: KpResponse = resp.json().await?;
    assert!(body.series.is_empty());
    assert!(body.last_point.is_none());
    assert!(body.g_level.is_none());
    Ok(())
}

#[tokio::test]
async fn device_registration_is_idempotent() -> Result<()> {
    // ---
    let state = app_state(storm_feed());
    let registry = state.registry.clone();
    let base = spawn_app(state).await?;
    let client = Client::new();

    for _ in 0..2 {
        let body: RegistryResponse = client
            .post(format!("{base}/register_device?token=device-abc"))
            .send()
            .await?
            .json()
            .await?;
        assert!(body.ok);
        assert_eq!(body.count, 1);
    }
    assert!(registry.contains("device-abc"));

    let body: RegistryResponse = client
        .post(format!("{base}/unregister_device?token=never-registered"))
        .send()
        .await?
        .json()
        .await?;
    assert!(body.ok);
    assert_eq!(body.count, 1);

    let body: RegistryResponse = client
        .post(format!("{base}/unregister_device?token=device-abc"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body.count, 0);

    let resp = client
        .post(format!("{base}/register_device?token="))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn health_is_ok() -> Result<()> {
    // ---
    let base = spawn_app(app_state(Arc::new(DownFeed))).await?;
    let body: serde_json::Value = Client::new()
        .get(format!("{base}/health"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "daypack");
    Ok(())
}

#[tokio::test]
async fn cors_preflight_is_answered() -> Result<()> {
    // ---
    let base = spawn_app(app_state(storm_feed())).await?;
    let client = Client::new();

    let resp = client
        .request(Method::OPTIONS, format!("{base}/daypack"))
        .header("Origin", "https://app.example.com")
        .header("Access-Control-Request-Method", "GET")
        .send()
        .await?;
    assert!(resp.status().is_success(), "{}", resp.status());
    let allow_origin = resp.headers().get("access-control-allow-origin");
    assert_eq!(allow_origin.and_then(|v| v.to_str().ok()), Some("*"));

    let resp = client
        .get(format!("{base}/kp"))
        .header("Origin", "https://app.example.com")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let allow_origin = resp.headers().get("access-control-allow-origin");
    assert_eq!(allow_origin.and_then(|v| v.to_str().ok()), Some("*"));
    Ok(())
}
