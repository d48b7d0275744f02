//! K-index endpoints. A feed failure yields an empty series rather than
//! an error status.
use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::AppState;
use crate::{latest_sample, SeverityLevel, SeveritySample};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/kp", get(kp))
        .route("/kp_line", get(kp_line))
}

#[derive(Debug, Serialize)]
struct KpResponse {
    series: Vec<SeveritySample>,
    last_point: Option<SeveritySample>,
    g_level: Option<SeverityLevel>,
}

/// Chart-friendly columns in feed order.
#[derive(Debug, Serialize)]
struct KpLineResponse {
    x: Vec<DateTime<Utc>>,
    y: Vec<f64>,
}

async fn fetch_series(state: &AppState) -> Vec<SeveritySample> {
    // ---
    match state.severity.severity_series().await {
        Ok(series) => series,
        Err(e) => {
            warn!("K-index feed unavailable: {}", e);
            Vec::new()
        }
    }
}

async fn kp(State(state): State<AppState>) -> Json<KpResponse> {
    // ---
    let mut series = fetch_series(&state).await;
    let last_point = latest_sample(&mut series);
    let g_level = last_point.and_then(|p| SeverityLevel::from_kp(p.kp));
    info!("GET /kp - {} samples, level {:?}", series.len(), g_level);

    Json(KpResponse {
        series,
        last_point,
        g_level,
    })
}

async fn kp_line(State(state): State<AppState>) -> Json<KpLineResponse> {
    // ---
    let series = fetch_series(&state).await;
    info!("GET /kp_line - {} samples", series.len());
    let (x, y) = series.into_iter().map(|s| (s.time_utc, s.kp)).unzip();
    Json(KpLineResponse { x, y })
}
