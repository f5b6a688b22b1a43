//! Deal business logic - creation, validity windows, claimability and listing.
//!
//! A deal's lifecycle state is never stored. It is derived from `is_active`, the
//! claim window and the redemption counter whenever it is read, see [`deal_state`].

use crate::{
    core::{
        access::{self, Capabilities, Identity, Route},
        merchant::{self, require_owned_merchant},
    },
    entities::{Deal, RecurringInterval, deal},
    errors::{Error, Result, UnavailableReason},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    QueryOrder, QuerySelect, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, LikeExpr},
};
use serde::Serialize;
use tracing::info;

/// Capacity applied when a new deal does not specify one.
pub const DEFAULT_MAX_REDEMPTIONS: i32 = 100;

/// Input for a new deal.
#[derive(Debug, Clone)]
pub struct NewDeal {
    /// Headline, must not be blank
    pub title: String,
    /// Longer description
    pub description: String,
    /// Regular price, positive
    pub original_price: f64,
    /// Deal price, positive and not above `original_price`
    pub discounted_price: f64,
    /// Category used for filtering
    pub category: String,
    /// Start of the claim window
    pub start_time: DateTime<Utc>,
    /// End of the claim window, after `start_time`
    pub end_time: DateTime<Utc>,
    /// Capacity, defaults to [`DEFAULT_MAX_REDEMPTIONS`]
    pub max_redemptions: Option<i32>,
    /// Set for deals that re-open automatically
    pub recurring_interval: Option<RecurringInterval>,
}

/// Lifecycle state of a deal at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DealState {
    /// Window has not opened yet
    Scheduled,
    /// Window open with capacity remaining
    Live,
    /// Window open but every unit is claimed
    Exhausted,
    /// Window has closed
    Expired,
    /// Switched off by the merchant
    Inactive,
}

/// Search filter for [`list_active_deals`].
#[derive(Debug, Clone, Default)]
pub struct DealFilter {
    /// Exact category match (case-insensitive)
    pub category: Option<String>,
    /// Case-insensitive substring matched against title and description
    pub search: Option<String>,
    /// Restrict to one merchant
    pub merchant_id: Option<i64>,
    /// Maximum number of deals to return
    pub limit: Option<u64>,
    /// Number of deals to skip
    pub offset: Option<u64>,
}

/// Lowercased text a deal is searched by.
#[must_use]
pub fn search_text(title: &str, description: &str) -> String {
    format!("{}\n{}", title.trim(), description.trim()).to_lowercase()
}

/// Escapes `LIKE` wildcards so `text` only matches itself. Backslash is the escape character.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Whole-number discount for a price pair, rounded and clamped to 0..=100.
#[must_use]
pub fn discount_percentage(original_price: f64, discounted_price: f64) -> i32 {
    if original_price <= 0.0 || !original_price.is_finite() || !discounted_price.is_finite() {
        return 0;
    }

    let percent = ((original_price - discounted_price) / original_price * 100.0).round();
    // Clamped to 0..=100 first, so the cast is exact.
    #[allow(clippy::cast_possible_truncation)]
    let percent = percent.clamp(0.0, 100.0) as i32;
    percent
}

/// Checks the price pair, window and capacity of a new deal.
pub fn validate_new_deal(new_deal: &NewDeal) -> Result<()> {
    if new_deal.title.trim().is_empty() {
        return Err(Error::validation("Deal title cannot be empty"));
    }
    if new_deal.category.trim().is_empty() {
        return Err(Error::validation("Deal category cannot be empty"));
    }
    for (label, price) in [
        ("original price", new_deal.original_price),
        ("discounted price", new_deal.discounted_price),
    ] {
        if !price.is_finite() || price <= 0.0 {
            return Err(Error::validation(format!(
                "The {label} must be a positive amount, got {price}"
            )));
        }
    }
    if new_deal.discounted_price > new_deal.original_price {
        return Err(Error::validation(format!(
            "Discounted price {:.2} is above the original price {:.2}",
            new_deal.discounted_price, new_deal.original_price
        )));
    }
    if new_deal.end_time <= new_deal.start_time {
        return Err(Error::validation("Deal end time must be after its start time"));
    }
    if let Some(max) = new_deal.max_redemptions {
        if max <= 0 {
            return Err(Error::validation(format!(
                "Max redemptions must be positive, got {max}"
            )));
        }
    }
    Ok(())
}

/// Derives the lifecycle state of a deal at `now`.
#[must_use]
pub fn deal_state(deal: &deal::Model, now: DateTime<Utc>) -> DealState {
    if !deal.is_active {
        DealState::Inactive
    } else if now < deal.start_time {
        DealState::Scheduled
    } else if now >= deal.end_time {
        DealState::Expired
    } else if deal.current_redemptions >= deal.max_redemptions {
        DealState::Exhausted
    } else {
        DealState::Live
    }
}

/// Maps a lifecycle state to claimability, returning why a claim is refused.
pub const fn check_claimable(state: DealState) -> std::result::Result<(), UnavailableReason> {
    match state {
        DealState::Live => Ok(()),
        DealState::Inactive => Err(UnavailableReason::Inactive),
        DealState::Scheduled => Err(UnavailableReason::NotYetStarted),
        DealState::Expired => Err(UnavailableReason::Expired),
        DealState::Exhausted => Err(UnavailableReason::CapacityExhausted),
    }
}

/// Whether a deal is claimable at `now`.
#[must_use]
pub fn is_claimable(deal: &deal::Model, now: DateTime<Utc>) -> bool {
    deal_state(deal, now) == DealState::Live
}

/// Creates a deal for a merchant the caller owns.
///
/// The discount percentage is derived from the price pair, the redemption counter
/// starts at zero and the deal starts active.
///
/// # Errors
/// Returns an error if:
/// - The title is blank, a price is not positive, the discounted price is above the
///   original, the window is empty or reversed, or the capacity is not positive
/// - The merchant does not exist (`NotFound`)
/// - The caller's role cannot manage deals or the caller does not own the
///   merchant (`Authorization`)
/// - The merchant has been deactivated
pub async fn create_deal(
    db: &DatabaseConnection,
    identity: &Identity,
    merchant_id: i64,
    new_deal: NewDeal,
) -> Result<deal::Model> {
    access::require(identity, Route::MerchantPortal, Capabilities::MANAGE_DEALS)?;
    validate_new_deal(&new_deal)?;

    let merchant = require_owned_merchant(db, identity, merchant_id).await?;
    if !merchant.is_active {
        return Err(Error::validation(format!(
            "Merchant {merchant_id} is deactivated"
        )));
    }

    let now = Utc::now();
    let deal = deal::ActiveModel {
        merchant_id: Set(merchant_id),
        title: Set(new_deal.title.trim().to_string()),
        description: Set(new_deal.description.trim().to_string()),
        search_text: Set(search_text(&new_deal.title, &new_deal.description)),
        original_price: Set(new_deal.original_price),
        discounted_price: Set(new_deal.discounted_price),
        discount_percentage: Set(discount_percentage(
            new_deal.original_price,
            new_deal.discounted_price,
        )),
        category: Set(new_deal.category.trim().to_lowercase()),
        start_time: Set(new_deal.start_time),
        end_time: Set(new_deal.end_time),
        max_redemptions: Set(new_deal.max_redemptions.unwrap_or(DEFAULT_MAX_REDEMPTIONS)),
        current_redemptions: Set(0),
        is_active: Set(true),
        is_recurring: Set(new_deal.recurring_interval.is_some()),
        recurring_interval: Set(new_deal.recurring_interval),
        last_recurred_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let deal = deal.insert(db).await?;
    info!(
        deal_id = deal.id,
        merchant_id,
        discount = deal.discount_percentage,
        "Deal created"
    );
    Ok(deal)
}

/// Finds a deal by its unique ID.
pub async fn get_deal_by_id<C>(db: &C, deal_id: i64) -> Result<Option<deal::Model>>
where
    C: ConnectionTrait,
{
    Deal::find_by_id(deal_id).one(db).await.map_err(Into::into)
}

/// Finds a deal by ID, failing with `NotFound` when it does not exist.
pub async fn require_deal<C>(db: &C, deal_id: i64) -> Result<deal::Model>
where
    C: ConnectionTrait,
{
    get_deal_by_id(db, deal_id)
        .await?
        .ok_or_else(|| Error::not_found("deal", deal_id))
}

/// Lists deals that are active and not yet ended at `now`, soonest ending first.
///
/// Scheduled and exhausted deals are included; expired deals are not, even when
/// their `is_active` flag is still set.
pub async fn list_active_deals(
    db: &DatabaseConnection,
    filter: &DealFilter,
    now: DateTime<Utc>,
) -> Result<Vec<deal::Model>> {
    let mut query = Deal::find()
        .filter(deal::Column::IsActive.eq(true))
        .filter(deal::Column::EndTime.gt(now));

    if let Some(category) = filter
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        query = query.filter(deal::Column::Category.eq(category.to_lowercase()));
    }

    if let Some(merchant_id) = filter.merchant_id {
        query = query.filter(deal::Column::MerchantId.eq(merchant_id));
    }

    if let Some(search) = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
        query = query.filter(
            Expr::col(deal::Column::SearchText).like(LikeExpr::new(pattern).escape('\\')),
        );
    }

    let mut query = query
        .order_by_asc(deal::Column::EndTime)
        .order_by_asc(deal::Column::Id);
    if let Some(offset) = filter.offset {
        query = query.offset(offset);
    }
    if let Some(limit) = filter.limit {
        query = query.limit(limit);
    }

    query.all(db).await.map_err(Into::into)
}

/// Lists every deal of a merchant, newest first.
pub async fn list_deals_for_merchant(
    db: &DatabaseConnection,
    merchant_id: i64,
) -> Result<Vec<deal::Model>> {
    Deal::find()
        .filter(deal::Column::MerchantId.eq(merchant_id))
        .order_by_desc(deal::Column::CreatedAt)
        .order_by_desc(deal::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Switches a deal off. Only the owner of the deal's merchant may do this.
pub async fn deactivate_deal(
    db: &DatabaseConnection,
    identity: &Identity,
    deal_id: i64,
) -> Result<deal::Model> {
    access::require(identity, Route::MerchantPortal, Capabilities::MANAGE_DEALS)?;
    let txn = db.begin().await?;

    let deal = require_deal(&txn, deal_id).await?;
    merchant::require_owned_merchant(&txn, identity, deal.merchant_id).await?;

    let mut active_model: deal::ActiveModel = deal.into();
    active_model.is_active = Set(false);
    active_model.updated_at = Set(Utc::now());
    let deal = active_model.update(&txn).await?;

    txn.commit().await?;
    info!(deal_id, "Deal deactivated");
    Ok(deal)
}
