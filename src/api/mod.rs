//! REST surface under `/api/v1`.
//!
//! Handlers are thin: they pull the caller identity and a validated body out of
//! the request, call into [`crate::core`] and map the result through [`ApiError`].

use axum::{Router, middleware::from_fn_with_state};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod error;
pub mod extract;
mod middleware;
mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Builds the full application router.
pub fn construct_router(state: AppState) -> Router {
    let router = Router::new()
        .nest("/health", routes::health::routes())
        .nest("/users", routes::users::routes())
        .nest("/merchants", routes::merchants::routes())
        .nest("/deals", routes::deals::routes())
        .nest("/me", routes::me::routes())
        .nest("/claims", routes::claims::routes())
        .nest("/notifications", routes::notifications::routes())
        .nest("/admin", routes::admin::routes())
        .with_state(state.clone())
        .layer(from_fn_with_state(state, middleware::audit_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    Router::new().nest("/api/v1", router)
}
