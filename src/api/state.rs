use crate::config::settings::Settings;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Shared state handed to every handler through the router.
#[derive(Clone)]
pub struct AppState {
    /// Connection pool
    pub db: DatabaseConnection,
    /// Loaded service settings
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wraps a connection and settings for the router.
    #[must_use]
    pub fn new(db: DatabaseConnection, settings: Settings) -> Self {
        Self {
            db,
            settings: Arc::new(settings),
        }
    }
}
