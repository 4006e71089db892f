use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// API Router Module
///
/// Read-only JSON views of the route table. `/api/me` authenticates through
/// the `SessionToken` extractor and answers 401 instead of redirecting.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // GET /api/navigation/{role}
        .route("/api/navigation/{role}", get(handlers::get_navigation))
        // GET /api/routes
        // Every generated dashboard route with its owning role and view.
        .route("/api/routes", get(handlers::get_routes))
        // GET /api/me
        .route("/api/me", get(handlers::get_me))
}
