use crate::{
    api::{error::ApiResult, extract::Path, state::AppState},
    core::{access::Identity, claim},
    entities::deal_claim,
};
use axum::{
    Json, Router,
    extract::State,
    routing::post,
};
use chrono::Utc;

pub fn routes() -> Router<AppState> {
    Router::new().route("/{id}/redeem", post(redeem_claim))
}

/// Marks a customer's claim used at the counter.
pub async fn redeem_claim(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> ApiResult<Json<deal_claim::Model>> {
    let claim = claim::redeem_claim(&state.db, &identity, id, Utc::now()).await?;
    Ok(Json(claim))
}
