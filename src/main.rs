use flash_deals::{
    api::{AppState, construct_router},
    config::{database, settings},
    core::recurrence::{self, CatchUpPolicy},
    errors::Result,
};
use dotenvy::dotenv;
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();

    // 3. Load settings
    let settings = settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;
    info!(bind = %settings.server.bind_address, "Settings loaded");

    // 4. Initialize database
    database::ensure_sqlite_dir(&settings.database.url)?;
    let db = database::create_connection(&settings.database.url, settings.database.log_statements)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    // 5. Background sweep
    if settings.sweep.interval_secs > 0 {
        tokio::spawn(run_sweeper(
            db.clone(),
            Duration::from_secs(settings.sweep.interval_secs),
            settings.sweep.catch_up,
        ));
    } else {
        warn!("Background sweep disabled");
    }

    // 6. Serve
    let listener = TcpListener::bind(&settings.server.bind_address).await?;
    info!("Listening on {}", listener.local_addr()?);
    let app = construct_router(AppState::new(db, settings));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn run_sweeper(db: DatabaseConnection, every: Duration, catch_up: CatchUpPolicy) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        match recurrence::run_sweep(&db, chrono::Utc::now(), catch_up).await {
            Ok(result) => info!(
                recurred = result.recurrence.recurred.len(),
                expired_claims = result.expired_claims,
                "Sweep finished"
            ),
            Err(e) => error!("Sweep failed: {}", e),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
