use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Navigation data and the route generator built from it.
pub mod generator;
pub mod models;
pub mod navigation;

// Access control and sessions.
pub mod guard;
pub mod session;

// Backend access.
pub mod backend;
pub mod cache;

// Server-rendered markup.
pub mod markup;
pub mod shell;
pub mod views;

pub mod config;
pub mod error;
pub mod handlers;

// Module for routing segregation (Public, API, Dashboards).
pub mod routes;
use routes::{api, dashboard, public};

// --- Public Re-exports ---

pub use backend::{BackendState, HttpBackend, MockBackend, WalletBackend};
pub use cache::ResourceCache;
pub use config::AppConfig;
pub use generator::RouteTable;
pub use navigation::RoleRegistry;

use guard::{RoleGate, require_role};
use models::Role;

/// ApiDoc
///
/// OpenAPI document for the JSON endpoints, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::get_navigation, handlers::get_routes, handlers::get_me),
    components(
        schemas(
            models::Role, models::Identity, models::RouteInfo, models::SessionOverview,
            models::LoginRequest, models::RegisterRequest,
            navigation::NavigationGroup, navigation::NavigationItem, views::View,
        )
    ),
    tags(
        (name = "ewallet-portal", description = "E-Wallet dashboard portal")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request may need, assembled once in `main` (or a test) and
/// shared read-only across requests. There are no process-wide globals.
#[derive(Clone)]
pub struct AppState {
    /// The E-Wallet REST service.
    pub backend: BackendState,
    /// Per-session cache of backend reads.
    pub cache: Arc<ResourceCache>,
    /// Routes generated from the navigation registry at startup.
    pub routes: Arc<RouteTable>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(backend: BackendState, routes: RouteTable, config: AppConfig) -> Self {
        Self {
            backend,
            cache: Arc::new(ResourceCache::new(config.cache_ttl)),
            routes: Arc::new(routes),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for BackendState {
    fn from_ref(app_state: &AppState) -> BackendState {
        app_state.backend.clone()
    }
}

impl FromRef<AppState> for Arc<RouteTable> {
    fn from_ref(app_state: &AppState) -> Arc<RouteTable> {
        app_state.routes.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the public pages, the JSON API and one guarded subtree per role,
/// then applies the observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Dashboards: each role's subtree sits behind its own guard, so a
    // handler under /admin never runs for a user or agent.
    let mut dashboards = Router::new();
    for role in Role::ALL {
        let gate = RoleGate {
            app: state.clone(),
            expected: role,
        };
        dashboards = dashboards.merge(
            dashboard::role_routes(role, &state.routes)
                .route_layer(middleware::from_fn_with_state(gate, require_role)),
        );
    }

    // 3. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(api::api_routes())
        .merge(dashboards)
        .with_state(state);

    // 4. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, correlated by the `x-request-id` header.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
