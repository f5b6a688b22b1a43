use crate::{
    api::{
        error::ApiResult,
        extract::{Path, Query},
        state::AppState,
    },
    core::{
        access::Identity,
        claim::{self, ClaimReceipt},
        deal::{self, DealFilter, DealState, deal_state},
        saved,
    },
    entities::{deal as deal_entity, saved_deal},
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_deals))
        .route("/{id}", get(get_deal))
        .route("/{id}/deactivate", post(deactivate_deal))
        .route("/{id}/claim", post(claim_deal))
        .route("/{id}/save", post(save_deal).delete(unsave_deal))
}

/// A deal with its derived state at response time.
#[derive(Debug, Serialize)]
pub struct DealView {
    #[serde(flatten)]
    pub deal: deal_entity::Model,
    pub state: DealState,
    pub claimable: bool,
    pub remaining: i32,
}

impl DealView {
    pub fn at(deal: deal_entity::Model, now: DateTime<Utc>) -> Self {
        Self {
            state: deal_state(&deal, now),
            claimable: deal::is_claimable(&deal, now),
            remaining: (deal.max_redemptions - deal.current_redemptions).max(0),
            deal,
        }
    }

    pub fn list(deals: Vec<deal_entity::Model>, now: DateTime<Utc>) -> Vec<Self> {
        deals.into_iter().map(|deal| Self::at(deal, now)).collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DealQuery {
    pub category: Option<String>,
    /// Free-text search over title and description
    pub q: Option<String>,
    pub merchant_id: Option<i64>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub async fn list_deals(
    State(state): State<AppState>,
    Query(query): Query<DealQuery>,
) -> ApiResult<Json<Vec<DealView>>> {
    let now = Utc::now();
    let max_page = state.settings.deals.max_page_size;
    let filter = DealFilter {
        category: query.category,
        search: query.q,
        merchant_id: query.merchant_id,
        limit: Some(query.limit.unwrap_or(max_page).min(max_page)),
        offset: query.offset,
    };
    let deals = deal::list_active_deals(&state.db, &filter, now).await?;
    Ok(Json(DealView::list(deals, now)))
}

pub async fn get_deal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DealView>> {
    let deal = deal::require_deal(&state.db, id).await?;
    Ok(Json(DealView::at(deal, Utc::now())))
}

pub async fn deactivate_deal(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> ApiResult<Json<DealView>> {
    let deal = deal::deactivate_deal(&state.db, &identity, id).await?;
    Ok(Json(DealView::at(deal, Utc::now())))
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    #[serde(flatten)]
    pub receipt: ClaimReceipt,
    pub remaining: i32,
}

pub async fn claim_deal(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> ApiResult<(StatusCode, Json<ClaimResponse>)> {
    let receipt = claim::claim_deal(&state.db, &identity, id, Utc::now()).await?;
    let remaining = receipt.remaining();
    Ok((StatusCode::CREATED, Json(ClaimResponse { receipt, remaining })))
}

pub async fn save_deal(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> ApiResult<(StatusCode, Json<saved_deal::Model>)> {
    let saved = saved::save_deal(&state.db, &identity, id).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn unsave_deal(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    saved::unsave_deal(&state.db, &identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
