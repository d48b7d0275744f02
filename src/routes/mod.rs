//! Route gateway: merges every subrouter and attaches the shared state.
//!
//! Subrouters only know about [`AppState`] and the crate-level exports,
//! never about each other.
use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::{Config, DaypackError, DeviceRegistry, SeveritySource, TimelineSources};

mod daypack;
mod devices;
mod health;
mod kp;

// ---

/// State shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub timeline: TimelineSources,
    pub severity: Arc<dyn SeveritySource>,
    pub registry: DeviceRegistry,
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(daypack::router())
        .merge(kp::router())
        .merge(devices::router())
        .merge(health::router())
        .layer(cors())
        .with_state(state)
}

/// Browser clients (web previews, hybrid apps) call from arbitrary origins.
/// No credentials: they cannot be combined with a wildcard origin.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// JSON body for rejected requests.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for DaypackError {
    fn into_response(self) -> Response {
        // ---
        let status = if self.is_invalid_input() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
