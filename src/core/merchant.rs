//! Merchant business logic - Handles creating, finding and deactivating merchants.
//!
//! Merchants are soft-deactivated; deactivating one also switches off all of its
//! deals so none of them stay claimable.

use crate::{
    core::{
        access::{self, Capabilities, Identity, Route},
        user,
    },
    entities::{Deal, Merchant, deal, merchant},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::info;

/// Input for a new merchant.
#[derive(Debug, Clone)]
pub struct NewMerchant {
    /// Business name
    pub name: String,
    /// Business category
    pub category: String,
    /// Latitude in degrees, -90 to 90
    pub latitude: f64,
    /// Longitude in degrees, -180 to 180
    pub longitude: f64,
    /// Street address
    pub address: String,
    /// Optional contact phone
    pub phone: Option<String>,
    /// Optional website
    pub website: Option<String>,
}

fn validate_new_merchant(new_merchant: &NewMerchant) -> Result<()> {
    if new_merchant.name.trim().is_empty() {
        return Err(Error::validation("Merchant name cannot be empty"));
    }
    if new_merchant.category.trim().is_empty() {
        return Err(Error::validation("Merchant category cannot be empty"));
    }
    if new_merchant.address.trim().is_empty() {
        return Err(Error::validation("Merchant address cannot be empty"));
    }
    if !(-90.0..=90.0).contains(&new_merchant.latitude) {
        return Err(Error::validation(format!(
            "Latitude {} is outside -90..=90",
            new_merchant.latitude
        )));
    }
    if !(-180.0..=180.0).contains(&new_merchant.longitude) {
        return Err(Error::validation(format!(
            "Longitude {} is outside -180..=180",
            new_merchant.longitude
        )));
    }
    Ok(())
}

/// Creates a merchant owned by the calling user.
///
/// # Errors
/// Returns an error if:
/// - The caller's role cannot manage merchants
/// - The name, category or address is blank, or the coordinates are out of range
/// - The caller has no user profile
pub async fn create_merchant(
    db: &DatabaseConnection,
    identity: &Identity,
    new_merchant: NewMerchant,
) -> Result<merchant::Model> {
    access::require(
        identity,
        Route::MerchantPortal,
        Capabilities::MANAGE_MERCHANTS,
    )?;
    validate_new_merchant(&new_merchant)?;
    user::require_user(db, identity.user_id).await?;

    let now = Utc::now();
    let merchant = merchant::ActiveModel {
        owner_id: Set(Some(identity.user_id)),
        name: Set(new_merchant.name.trim().to_string()),
        category: Set(new_merchant.category.trim().to_lowercase()),
        latitude: Set(new_merchant.latitude),
        longitude: Set(new_merchant.longitude),
        address: Set(new_merchant.address.trim().to_string()),
        phone: Set(new_merchant.phone),
        website: Set(new_merchant.website),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let merchant = merchant.insert(db).await?;
    info!(merchant_id = merchant.id, owner_id = identity.user_id, "Merchant created");
    Ok(merchant)
}

/// Finds a merchant by its unique ID, including inactive ones.
pub async fn get_merchant_by_id<C>(db: &C, merchant_id: i64) -> Result<Option<merchant::Model>>
where
    C: ConnectionTrait,
{
    Merchant::find_by_id(merchant_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a merchant and checks that the caller owns it.
///
/// Fails with `NotFound` when the merchant does not exist and with
/// `Authorization` when it belongs to someone else (or to nobody).
pub async fn require_owned_merchant<C>(
    db: &C,
    identity: &Identity,
    merchant_id: i64,
) -> Result<merchant::Model>
where
    C: ConnectionTrait,
{
    let merchant = get_merchant_by_id(db, merchant_id)
        .await?
        .ok_or_else(|| Error::not_found("merchant", merchant_id))?;

    if merchant.owner_id != Some(identity.user_id) {
        return Err(Error::unauthorized(format!(
            "user {} does not own merchant {merchant_id}",
            identity.user_id
        )));
    }

    Ok(merchant)
}

/// Lists active merchants alphabetically, optionally restricted to one category.
pub async fn list_active_merchants(
    db: &DatabaseConnection,
    category: Option<&str>,
) -> Result<Vec<merchant::Model>> {
    let mut query = Merchant::find().filter(merchant::Column::IsActive.eq(true));
    if let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) {
        query = query.filter(merchant::Column::Category.eq(category.to_lowercase()));
    }

    query
        .order_by_asc(merchant::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists every merchant owned by a user, active or not.
pub async fn list_merchants_for_owner(
    db: &DatabaseConnection,
    owner_id: i64,
) -> Result<Vec<merchant::Model>> {
    Merchant::find()
        .filter(merchant::Column::OwnerId.eq(owner_id))
        .order_by_asc(merchant::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Soft-deactivates a merchant and all of its deals in one transaction.
pub async fn deactivate_merchant(
    db: &DatabaseConnection,
    identity: &Identity,
    merchant_id: i64,
) -> Result<merchant::Model> {
    access::require(identity, Route::MerchantPortal, Capabilities::MANAGE_MERCHANTS)?;
    let txn = db.begin().await?;

    let merchant = require_owned_merchant(&txn, identity, merchant_id).await?;
    let now = Utc::now();

    let mut active_model: merchant::ActiveModel = merchant.into();
    active_model.is_active = Set(false);
    active_model.updated_at = Set(now);
    let merchant = active_model.update(&txn).await?;

    let deals = Deal::update_many()
        .col_expr(deal::Column::IsActive, Expr::value(false))
        .col_expr(deal::Column::UpdatedAt, Expr::value(now))
        .filter(deal::Column::MerchantId.eq(merchant_id))
        .filter(deal::Column::IsActive.eq(true))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    info!(
        merchant_id,
        deactivated_deals = deals.rows_affected,
        "Merchant deactivated"
    );
    Ok(merchant)
}
