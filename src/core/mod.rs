//! Core business logic - framework-agnostic deal lifecycle, accounting and reporting.
//!
//! Every operation takes a `SeaORM` connection and returns the crate `Result`.
//! Time-dependent operations take `now` explicitly so callers and tests control the clock.

/// Roles, capabilities and caller identity
pub mod access;
/// Append-only audit ledger
pub mod audit;
/// Claiming, redeeming and expiring claims
pub mod claim;
/// Deal creation, validity windows and listing
pub mod deal;
/// Merchant registry
pub mod merchant;
/// User notifications
pub mod notification;
/// Recurring deal sweep
pub mod recurrence;
/// Merchant dashboard and platform summary
pub mod report;
/// Saved deal bookmarks
pub mod saved;
/// Local user profiles
pub mod user;
