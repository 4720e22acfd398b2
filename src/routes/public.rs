use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints that are **unauthenticated** and never touch storage.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /healthcheck
        // Liveness probe for load balancers. Always `{"status": "ok"}` while the
        // process is up, independent of the database.
        .route("/healthcheck", get(handlers::healthcheck))
}
