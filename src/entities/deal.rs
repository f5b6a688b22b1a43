//! Deal entity - A time-boxed, capacity-bounded discount offer.
//!
//! Each deal belongs to one merchant and carries its price pair, the derived
//! discount percentage, its claim window, its redemption counter and an optional
//! recurrence descriptor. Expiry is computed at read time from `end_time`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How often a recurring deal re-opens its claim window
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum RecurringInterval {
    /// Every day
    #[sea_orm(string_value = "daily")]
    Daily,
    /// Every seven days
    #[sea_orm(string_value = "weekly")]
    Weekly,
    /// Every calendar month
    #[sea_orm(string_value = "monthly")]
    Monthly,
}

/// Deal database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deals")]
pub struct Model {
    /// Unique identifier for the deal
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the merchant publishing this deal
    pub merchant_id: i64,
    /// Short headline (e.g., "Two coffees for one")
    pub title: String,
    /// Longer description shown on the deal page
    pub description: String,
    /// Title and description, Unicode-lowercased, for substring search
    #[serde(skip_serializing, default)]
    pub search_text: String,
    /// Regular price in dollars
    pub original_price: f64,
    /// Price while the deal is claimable
    pub discounted_price: f64,
    /// Derived whole-number discount, 0 to 100
    pub discount_percentage: i32,
    /// Deal category used for filtering
    pub category: String,
    /// Start of the claim window (inclusive)
    pub start_time: DateTimeUtc,
    /// End of the claim window (exclusive)
    pub end_time: DateTimeUtc,
    /// Capacity of the current window
    pub max_redemptions: i32,
    /// Units claimed in the current window
    pub current_redemptions: i32,
    /// Merchant-controlled switch; false makes the deal unclaimable
    pub is_active: bool,
    /// Whether the window re-opens automatically
    pub is_recurring: bool,
    /// Interval for recurring deals
    pub recurring_interval: Option<RecurringInterval>,
    /// When the recurrence sweep last advanced this deal
    pub last_recurred_at: Option<DateTimeUtc>,
    /// When the deal was created
    pub created_at: DateTimeUtc,
    /// When the deal was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Deal and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each deal belongs to one merchant
    #[sea_orm(
        belongs_to = "super::merchant::Entity",
        from = "Column::MerchantId",
        to = "super::merchant::Column::Id"
    )]
    Merchant,
    /// One deal has many claims
    #[sea_orm(has_many = "super::deal_claim::Entity")]
    Claims,
    /// One deal is bookmarked by many users
    #[sea_orm(has_many = "super::saved_deal::Entity")]
    SavedBy,
}

impl Related<super::merchant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Merchant.def()
    }
}

impl Related<super::deal_claim::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Claims.def()
    }
}

impl Related<super::saved_deal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SavedBy.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
