//! Database configuration module.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs without hand-written SQL.

use crate::entities::{AuditLog, Deal, DealClaim, Merchant, Notification, SavedDeal, User};
use crate::errors::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::path::Path;
use tracing::{debug, info};

/// Default location of the `SQLite` database when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/flash_deals.sqlite?mode=rwc";

/// Creates the directory holding a file-backed `SQLite` database, if needed.
///
/// Other backends and in-memory databases are left alone.
pub fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or(rest);
    if let Some(parent) = Path::new(file).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
        debug!("Ensured database directory {:?}", parent);
    }
    Ok(())
}

/// Establishes a connection to the database at `database_url`.
///
/// `log_statements` toggles sqlx statement logging.
pub async fn create_connection(
    database_url: &str,
    log_statements: bool,
) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options.sqlx_logging(log_statements);

    let db = Database::connect(options).await?;
    info!("Connected to database");
    Ok(db)
}

/// Creates all tables from the entity definitions, skipping tables that already exist.
///
/// Parents are created before children so foreign keys resolve on every backend.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut statements = vec![
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(Merchant),
        schema.create_table_from_entity(Deal),
        schema.create_table_from_entity(DealClaim),
        schema.create_table_from_entity(SavedDeal),
        schema.create_table_from_entity(Notification),
        schema.create_table_from_entity(AuditLog),
    ];

    for statement in &mut statements {
        statement.if_not_exists();
        db.execute(builder.build(&*statement)).await?;
    }
    debug!("Ensured {} tables exist", statements.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{DealModel, MerchantModel, UserModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[test]
    fn test_ensure_sqlite_dir_ignores_memory_and_other_backends() -> Result<()> {
        ensure_sqlite_dir("sqlite::memory:")?;
        ensure_sqlite_dir("postgres://localhost/deals")?;
        ensure_sqlite_dir("sqlite://flat.sqlite?mode=rwc")?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Tables exist and are queryable
        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        let _: Vec<MerchantModel> = Merchant::find().limit(1).all(&db).await?;
        let _: Vec<DealModel> = Deal::find().limit(1).all(&db).await?;
        let _ = DealClaim::find().limit(1).all(&db).await?;
        let _ = SavedDeal::find().limit(1).all(&db).await?;
        let _ = Notification::find().limit(1).all(&db).await?;
        let _ = AuditLog::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
