use ewallet_portal::{
    AppState, HttpBackend, RoleRegistry, RouteTable,
    backend::BackendState,
    config::{AppConfig, Env},
    create_router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: loads configuration, initializes logging, builds the route
/// table and the backend client, then serves the portal.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ewallet_portal=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Navigation and Route Generation
    // A malformed registry is a startup error, never a runtime one.
    let registry = match &config.navigation_file {
        Some(path) => {
            tracing::info!(path = %path, "loading navigation registry");
            RoleRegistry::load(path).expect("FATAL: Failed to load NAVIGATION_FILE.")
        }
        None => RoleRegistry::builtin(),
    };
    let routes = RouteTable::build(registry).expect("FATAL: Invalid navigation registry.");

    // 5. Backend Client
    let backend = Arc::new(
        HttpBackend::new(&config.api_base_url).expect("FATAL: Failed to build the backend client."),
    ) as BackendState;

    tracing::info!(api = %config.api_base_url, "backend client ready");

    // 6. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(backend, routes, config);

    // 7. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind PORTAL_BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app).await.expect("FATAL: server error");
}
