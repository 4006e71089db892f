use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Nothing here reveals wallet data;
/// the login and sign-up handlers only relay credentials to the backend.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        .route("/", get(handlers::home))
        .route("/about", get(handlers::about))
        .route("/feature", get(handlers::feature))
        .route("/faq", get(handlers::faq))
        .route("/contact", get(handlers::contact))
        // GET/POST /login
        // On success the session cookie is set and the caller lands on their dashboard.
        .route("/login", get(handlers::login_form).post(handlers::login))
        .route("/signup", get(handlers::signup_form).post(handlers::signup))
        // POST /logout
        // Works with or without a valid session; always clears the cookie.
        .route("/logout", post(handlers::logout))
}
