use axum::{
    extract::Query, extract::State, response::IntoResponse, response::Response, routing::get, Json,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::AppState;
use crate::{timeline, DayWindows, DaypackError, Event, Observer};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/daypack", get(handler))
}

/// Query parameters for `GET /daypack`.
#[derive(Debug, Deserialize)]
pub struct DaypackQuery {
    lat: f64,
    lon: f64,
    /// `YYYY-MM-DD`
    #[serde(alias = "date")]
    date_str: String,
    /// IANA zone; the configured default when omitted.
    #[serde(alias = "tz")]
    tzname: Option<String>,
}

#[derive(Debug, Serialize)]
struct Meta {
    lat: f64,
    lon: f64,
    date: String,
    tz: String,
}

#[derive(Debug, Serialize)]
struct DaypackResponse {
    events: Vec<Event>,
    meta: Meta,
}

async fn handler(Query(params): Query<DaypackQuery>, State(state): State<AppState>) -> Response {
    // ---
    let tzname = params
        .tzname
        .clone()
        .unwrap_or_else(|| state.config.default_tz.name().to_string());
    info!(
        "GET /daypack lat={} lon={} date={} tz={}",
        params.lat, params.lon, params.date_str, tzname
    );

    let (observer, day) = match prepare(&params, &tzname) {
        Ok(prepared) => prepared,
        Err(e) => {
            debug!("GET /daypack - rejected: {}", e);
            return e.into_response();
        }
    };

    let events = timeline::build_timeline(&state.timeline, observer, &day).await;
    info!("GET /daypack - returning {} events", events.len());

    Json(DaypackResponse {
        events,
        meta: Meta {
            lat: params.lat,
            lon: params.lon,
            date: params.date_str,
            tz: tzname,
        },
    })
    .into_response()
}

fn prepare(params: &DaypackQuery, tzname: &str) -> Result<(Observer, DayWindows), DaypackError> {
    let day = DayWindows::parse(&params.date_str, tzname)?;
    let observer = Observer::new(params.lat, params.lon)?;
    Ok((observer, day))
}
