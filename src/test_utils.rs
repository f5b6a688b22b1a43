//! Shared test utilities for the flash deals service.
//!
//! This module provides helpers for setting up test databases and creating
//! users, merchants and deals with sensible defaults.

use crate::{
    core::{
        access::Identity,
        deal::{self, NewDeal},
        merchant::{self, NewMerchant},
        user,
    },
    entities::{self, Role},
    errors::Result,
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
///
/// The pool holds a single connection so every task in a test sees the same
/// in-memory database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database under `dir` with a pool of several
/// connections, so concurrent tasks really run their transactions side by side.
pub async fn setup_file_db(dir: &Path) -> Result<DatabaseConnection> {
    let url = format!("sqlite://{}?mode=rwc", dir.join("deals.sqlite").display());
    let mut options = ConnectOptions::new(url);
    options.max_connections(8).sqlx_logging(false);
    let db = Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test user. The display name is derived from the email.
pub async fn create_test_user(
    db: &DatabaseConnection,
    email: &str,
    role: Role,
) -> Result<entities::user::Model> {
    let display_name = email.split('@').next().unwrap_or(email).to_string();
    user::create_user(db, email.to_string(), display_name, role).await
}

/// The identity a request from this user would carry.
pub fn identity_of(user: &entities::user::Model) -> Identity {
    Identity::new(user.id, user.role)
}

/// Merchant input with sensible defaults.
///
/// # Defaults
/// * category: "food"
/// * location: downtown Portland
pub fn sample_merchant(name: &str) -> NewMerchant {
    NewMerchant {
        name: name.to_string(),
        category: "food".to_string(),
        latitude: 45.5152,
        longitude: -122.6784,
        address: "1 Main St".to_string(),
        phone: None,
        website: None,
    }
}

/// Creates a database with one merchant-role user owning one merchant.
pub async fn setup_with_merchant() -> Result<(
    DatabaseConnection,
    entities::user::Model,
    entities::merchant::Model,
)> {
    let db = setup_test_db().await?;
    let owner = create_test_user(&db, "owner@example.com", Role::Merchant).await?;
    let merchant =
        merchant::create_merchant(&db, &identity_of(&owner), sample_merchant("Corner Cafe"))
            .await?;
    Ok((db, owner, merchant))
}

/// Deal input with sensible defaults.
///
/// # Defaults
/// * prices: 20.00 down to 15.00
/// * category: "food"
/// * window: one hour either side of `now`
/// * capacity: the service default
/// * not recurring
pub fn sample_deal(title: &str, now: DateTime<Utc>) -> NewDeal {
    NewDeal {
        title: title.to_string(),
        description: "Test deal description".to_string(),
        original_price: 20.0,
        discounted_price: 15.0,
        category: "food".to_string(),
        start_time: now - Duration::hours(1),
        end_time: now + Duration::hours(1),
        max_redemptions: None,
        recurring_interval: None,
    }
}

/// Creates a deal that is live at `now` with the given capacity.
pub async fn create_live_deal(
    db: &DatabaseConnection,
    owner: &entities::user::Model,
    merchant_id: i64,
    now: DateTime<Utc>,
    capacity: i32,
) -> Result<entities::deal::Model> {
    let mut input = sample_deal("Flash special", now);
    input.max_redemptions = Some(capacity);
    deal::create_deal(db, &identity_of(owner), merchant_id, input).await
}

/// Builds an unsaved deal row for pure state checks.
pub fn test_deal_model(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    max_redemptions: i32,
    current_redemptions: i32,
) -> entities::deal::Model {
    entities::deal::Model {
        id: 1,
        merchant_id: 1,
        title: "Test deal".to_string(),
        description: "Test deal description".to_string(),
        search_text: deal::search_text("Test deal", "Test deal description"),
        original_price: 20.0,
        discounted_price: 15.0,
        discount_percentage: 25,
        category: "food".to_string(),
        start_time,
        end_time,
        max_redemptions,
        current_redemptions,
        is_active: true,
        is_recurring: false,
        recurring_interval: None,
        last_recurred_at: None,
        created_at: start_time,
        updated_at: start_time,
    }
}
