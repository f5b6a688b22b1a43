use crate::{
    api::{
        error::ApiResult,
        extract::{Path, Query, ValidatedJson},
        routes::deals::DealView,
        state::AppState,
    },
    core::{
        access::Identity,
        deal::{self, DealFilter, NewDeal},
        merchant::{self, NewMerchant},
        report::{self, MerchantDashboard},
    },
    entities::{RecurringInterval, merchant as merchant_entity},
    errors::Error,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_merchants).post(create_merchant))
        .route("/{id}", get(get_merchant).delete(deactivate_merchant))
        .route("/{id}/dashboard", get(dashboard))
        .route("/{id}/deals", get(list_merchant_deals).post(create_deal))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMerchantRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(length(min = 1, max = 300))]
    pub address: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MerchantQuery {
    pub category: Option<String>,
}

pub async fn create_merchant(
    State(state): State<AppState>,
    identity: Identity,
    ValidatedJson(body): ValidatedJson<CreateMerchantRequest>,
) -> ApiResult<(StatusCode, Json<merchant_entity::Model>)> {
    let new_merchant = NewMerchant {
        name: body.name,
        category: body.category,
        latitude: body.latitude,
        longitude: body.longitude,
        address: body.address,
        phone: body.phone,
        website: body.website,
    };
    let merchant = merchant::create_merchant(&state.db, &identity, new_merchant).await?;
    Ok((StatusCode::CREATED, Json(merchant)))
}

pub async fn list_merchants(
    State(state): State<AppState>,
    Query(query): Query<MerchantQuery>,
) -> ApiResult<Json<Vec<merchant_entity::Model>>> {
    let merchants = merchant::list_active_merchants(&state.db, query.category.as_deref()).await?;
    Ok(Json(merchants))
}

pub async fn get_merchant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<merchant_entity::Model>> {
    let merchant = merchant::get_merchant_by_id(&state.db, id)
        .await?
        .ok_or_else(|| Error::not_found("merchant", id))?;
    Ok(Json(merchant))
}

pub async fn deactivate_merchant(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> ApiResult<Json<merchant_entity::Model>> {
    let merchant = merchant::deactivate_merchant(&state.db, &identity, id).await?;
    Ok(Json(merchant))
}

pub async fn dashboard(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> ApiResult<Json<MerchantDashboard>> {
    let dashboard = report::merchant_dashboard(&state.db, &identity, id, Utc::now()).await?;
    Ok(Json(dashboard))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDealRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
    #[validate(range(exclusive_min = 0.0))]
    pub original_price: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub discounted_price: f64,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    /// RFC 3339
    pub start_time: DateTime<Utc>,
    /// RFC 3339
    pub end_time: DateTime<Utc>,
    #[validate(range(min = 1))]
    pub max_redemptions: Option<i32>,
    pub recurring_interval: Option<RecurringInterval>,
}

pub async fn create_deal(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
    ValidatedJson(body): ValidatedJson<CreateDealRequest>,
) -> ApiResult<(StatusCode, Json<DealView>)> {
    let new_deal = NewDeal {
        title: body.title,
        description: body.description,
        original_price: body.original_price,
        discounted_price: body.discounted_price,
        category: body.category,
        start_time: body.start_time,
        end_time: body.end_time,
        max_redemptions: Some(
            body.max_redemptions
                .unwrap_or(state.settings.deals.default_max_redemptions),
        ),
        recurring_interval: body.recurring_interval,
    };
    let deal = deal::create_deal(&state.db, &identity, id, new_deal).await?;
    Ok((StatusCode::CREATED, Json(DealView::at(deal, Utc::now()))))
}

/// Owners and super merchants see every deal of the merchant, everyone else
/// only the listable ones.
pub async fn list_merchant_deals(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<DealView>>> {
    let now = Utc::now();
    let merchant = merchant::get_merchant_by_id(&state.db, id)
        .await?
        .ok_or_else(|| Error::not_found("merchant", id))?;

    let deals = if identity.is_super_merchant() || merchant.owner_id == Some(identity.user_id) {
        deal::list_deals_for_merchant(&state.db, id).await?
    } else {
        let filter = DealFilter {
            merchant_id: Some(id),
            ..Default::default()
        };
        deal::list_active_deals(&state.db, &filter, now).await?
    };
    Ok(Json(DealView::list(deals, now)))
}
