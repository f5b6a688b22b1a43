use crate::{
    api::{error::ApiResult, state::AppState},
    errors::Error,
};
use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::time::Instant;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Database round trip in milliseconds
    pub db_rtt_ms: u128,
}

#[tracing::instrument(name = "GET /health", skip(state))]
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let started = Instant::now();
    state.db.ping().await.map_err(Error::from)?;
    Ok(Json(HealthResponse {
        status: "ok",
        db_rtt_ms: started.elapsed().as_millis(),
    }))
}
