//! The calling user's own claims, bookmarks, merchants, notifications and
//! capabilities.

use crate::{
    api::{error::ApiResult, extract::Query, routes::deals::DealView, state::AppState},
    core::{
        access::{self, Capabilities, Identity, Route},
        claim, merchant, notification, saved,
    },
    entities::{
        Role, deal as deal_entity, deal_claim, merchant as merchant_entity,
        notification as notification_entity,
    },
};
use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/claims", get(my_claims))
        .route("/saved", get(my_saved))
        .route("/merchants", get(my_merchants))
        .route("/notifications", get(my_notifications))
        .route("/capabilities", get(my_capabilities))
}

#[derive(Debug, Serialize)]
pub struct ClaimView {
    #[serde(flatten)]
    pub claim: deal_claim::Model,
    pub deal: Option<deal_entity::Model>,
}

pub async fn my_claims(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<Vec<ClaimView>>> {
    access::require(&identity, Route::Claims, Capabilities::CLAIM_DEALS)?;
    let claims = claim::list_claims_for_user(&state.db, identity.user_id).await?;
    Ok(Json(
        claims
            .into_iter()
            .map(|(claim, deal)| ClaimView { claim, deal })
            .collect(),
    ))
}

pub async fn my_saved(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<Vec<DealView>>> {
    access::require(&identity, Route::Saved, Capabilities::SAVE_DEALS)?;
    let deals = saved::list_saved_deals(&state.db, identity.user_id).await?;
    Ok(Json(DealView::list(deals, Utc::now())))
}

/// Merchants the caller owns, deactivated ones included.
pub async fn my_merchants(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<Vec<merchant_entity::Model>>> {
    access::require(&identity, Route::MerchantPortal, Capabilities::MANAGE_MERCHANTS)?;
    let merchants = merchant::list_merchants_for_owner(&state.db, identity.user_id).await?;
    Ok(Json(merchants))
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

pub async fn my_notifications(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Vec<notification_entity::Model>>> {
    access::require(
        &identity,
        Route::Notifications,
        Capabilities::READ_NOTIFICATIONS,
    )?;
    let notifications =
        notification::list_notifications(&state.db, identity.user_id, query.unread).await?;
    Ok(Json(notifications))
}

#[derive(Debug, Serialize)]
pub struct RouteCapabilities {
    pub route: Route,
    pub capabilities: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct CapabilitiesResponse {
    pub role: Role,
    pub routes: Vec<RouteCapabilities>,
}

/// Which views the client should offer, per route.
pub async fn my_capabilities(identity: Identity) -> Json<CapabilitiesResponse> {
    let routes = Route::ALL
        .into_iter()
        .map(|route| RouteCapabilities {
            route,
            capabilities: access::capability_names(access::capabilities(identity.role, route)),
        })
        .filter(|entry| !entry.capabilities.is_empty())
        .collect();
    Json(CapabilitiesResponse {
        role: identity.role,
        routes,
    })
}
