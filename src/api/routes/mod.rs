pub mod admin;
pub mod claims;
pub mod deals;
pub mod health;
pub mod me;
pub mod merchants;
pub mod notifications;
pub mod users;
