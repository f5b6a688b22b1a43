//! Analytics - per-merchant dashboards and the platform summary.

use crate::{
    core::{
        access::{self, Capabilities, Identity, Route},
        deal::{DealState, deal_state},
        merchant,
    },
    entities::{
        AuditLog, ClaimStatus, Deal, DealClaim, Merchant, SavedDeal, User, deal, deal_claim,
        merchant as merchant_entity,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{JoinType, QueryOrder, QuerySelect, RelationTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use std::collections::HashMap;

/// How one deal is performing.
#[derive(Debug, Clone, Serialize)]
pub struct DealPerformance {
    pub deal_id: i64,
    pub title: String,
    pub state: DealState,
    /// Claims across every window, any status
    pub claims: u64,
    /// Claims redeemed at the counter
    pub redemptions_used: u64,
    /// Units still claimable in the current window
    pub remaining_capacity: i32,
    /// Share of the current window's capacity already claimed
    pub fill_rate_percent: f64,
}

/// Dashboard for one merchant.
#[derive(Debug, Clone, Serialize)]
pub struct MerchantDashboard {
    pub merchant: merchant_entity::Model,
    pub deals: Vec<DealPerformance>,
    pub live_deals: usize,
    pub total_claims: u64,
    pub total_redemptions_used: u64,
    pub generated_at: DateTime<Utc>,
}

/// Platform-wide counters.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformSummary {
    pub users: u64,
    pub active_merchants: u64,
    pub live_deals: u64,
    pub claims_claimed: u64,
    pub claims_used: u64,
    pub claims_expired: u64,
    pub saved_deals: u64,
    pub audit_entries: u64,
    pub generated_at: DateTime<Utc>,
}

/// Percentage of capacity claimed, 0 when there is no capacity.
#[must_use]
pub fn calculate_fill_rate(current_redemptions: i32, max_redemptions: i32) -> f64 {
    if max_redemptions <= 0 {
        return 0.0;
    }
    (f64::from(current_redemptions) / f64::from(max_redemptions)) * 100.0
}

/// Builds the dashboard for a merchant.
///
/// Owners see their own merchants; super merchants see any merchant.
///
/// # Errors
/// - `Authorization` when the caller's role has no dashboard access or the
///   caller does not own the merchant
/// - `NotFound` when the merchant does not exist
pub async fn merchant_dashboard(
    db: &DatabaseConnection,
    identity: &Identity,
    merchant_id: i64,
    now: DateTime<Utc>,
) -> Result<MerchantDashboard> {
    access::require(identity, Route::Analytics, Capabilities::VIEW_DASHBOARD)?;

    let merchant = if identity.is_super_merchant() {
        merchant::get_merchant_by_id(db, merchant_id)
            .await?
            .ok_or_else(|| Error::not_found("merchant", merchant_id))?
    } else {
        merchant::require_owned_merchant(db, identity, merchant_id).await?
    };

    let deals = Deal::find()
        .filter(deal::Column::MerchantId.eq(merchant_id))
        .order_by_desc(deal::Column::CreatedAt)
        .order_by_desc(deal::Column::Id)
        .all(db)
        .await?;

    let claims = DealClaim::find()
        .join(JoinType::InnerJoin, deal_claim::Relation::Deal.def())
        .filter(deal::Column::MerchantId.eq(merchant_id))
        .all(db)
        .await?;

    // (claims, used) per deal
    let mut tally: HashMap<i64, (u64, u64)> = HashMap::new();
    for claim in &claims {
        let entry = tally.entry(claim.deal_id).or_default();
        entry.0 += 1;
        if claim.status == ClaimStatus::Used {
            entry.1 += 1;
        }
    }

    let deals: Vec<DealPerformance> = deals
        .into_iter()
        .map(|deal| {
            let (claims, used) = tally.get(&deal.id).copied().unwrap_or_default();
            DealPerformance {
                deal_id: deal.id,
                state: deal_state(&deal, now),
                claims,
                redemptions_used: used,
                remaining_capacity: (deal.max_redemptions - deal.current_redemptions).max(0),
                fill_rate_percent: calculate_fill_rate(
                    deal.current_redemptions,
                    deal.max_redemptions,
                ),
                title: deal.title,
            }
        })
        .collect();

    Ok(MerchantDashboard {
        merchant,
        live_deals: deals.iter().filter(|d| d.state == DealState::Live).count(),
        total_claims: deals.iter().map(|d| d.claims).sum(),
        total_redemptions_used: deals.iter().map(|d| d.redemptions_used).sum(),
        deals,
        generated_at: now,
    })
}

/// Counts rows across the platform.
///
/// # Errors
/// `Authorization` for any role without platform analytics.
pub async fn platform_summary(
    db: &DatabaseConnection,
    identity: &Identity,
    now: DateTime<Utc>,
) -> Result<PlatformSummary> {
    access::require(identity, Route::Analytics, Capabilities::VIEW_PLATFORM)?;

    let claims_with = |status: ClaimStatus| {
        DealClaim::find().filter(deal_claim::Column::Status.eq(status))
    };

    Ok(PlatformSummary {
        users: User::find().count(db).await?,
        active_merchants: Merchant::find()
            .filter(merchant_entity::Column::IsActive.eq(true))
            .count(db)
            .await?,
        live_deals: Deal::find()
            .filter(deal::Column::IsActive.eq(true))
            .filter(deal::Column::StartTime.lte(now))
            .filter(deal::Column::EndTime.gt(now))
            .filter(
                Expr::col(deal::Column::CurrentRedemptions)
                    .lt(Expr::col(deal::Column::MaxRedemptions)),
            )
            .count(db)
            .await?,
        claims_claimed: claims_with(ClaimStatus::Claimed).count(db).await?,
        claims_used: claims_with(ClaimStatus::Used).count(db).await?,
        claims_expired: claims_with(ClaimStatus::Expired).count(db).await?,
        saved_deals: SavedDeal::find().count(db).await?,
        audit_entries: AuditLog::find().count(db).await?,
        generated_at: now,
    })
}
