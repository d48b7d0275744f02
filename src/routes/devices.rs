use axum::{
    extract::Query, extract::State, response::IntoResponse, response::Response, routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/register_device", post(register))
        .route("/unregister_device", post(unregister))
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    token: String,
}

#[derive(Debug, Serialize)]
struct RegistryResponse {
    ok: bool,
    count: usize,
}

async fn register(Query(params): Query<TokenQuery>, State(state): State<AppState>) -> Response {
    // ---
    match state.registry.register(&params.token) {
        Ok(count) => {
            info!("Device registered ({} total)", count);
            Json(RegistryResponse { ok: true, count }).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn unregister(
    Query(params): Query<TokenQuery>,
    State(state): State<AppState>,
) -> Json<RegistryResponse> {
    // ---
    let count = state.registry.unregister(&params.token);
    info!("Device unregistered ({} total)", count);
    Json(RegistryResponse { ok: true, count })
}
