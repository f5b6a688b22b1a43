//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod audit_log;
pub mod deal;
pub mod deal_claim;
pub mod merchant;
pub mod notification;
pub mod saved_deal;
pub mod user;

// Re-export specific types to avoid conflicts
pub use audit_log::{Column as AuditLogColumn, Entity as AuditLog, Model as AuditLogModel};
pub use deal::{Column as DealColumn, Entity as Deal, Model as DealModel, RecurringInterval};
pub use deal_claim::{
    ClaimStatus, Column as DealClaimColumn, Entity as DealClaim, Model as DealClaimModel,
};
pub use merchant::{Column as MerchantColumn, Entity as Merchant, Model as MerchantModel};
pub use notification::{
    Column as NotificationColumn, Entity as Notification, Model as NotificationModel,
};
pub use saved_deal::{Column as SavedDealColumn, Entity as SavedDeal, Model as SavedDealModel};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel, Role};
