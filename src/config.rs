use std::{env, time::Duration};

/// AppConfig
///
/// Holds the portal's entire configuration. Loaded once at startup and
/// immutable afterwards; handlers pull it out of the shared state via
/// `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the bearer bypass and cookie security.
    pub env: Env,
    // Base URL of the E-Wallet REST backend, e.g. `https://api.example.com/api/v1`.
    pub api_base_url: String,
    // HMAC secret used to sign the portal session cookie.
    pub session_secret: String,
    // Lifetime of a session cookie.
    pub session_ttl: Duration,
    // Lifetime of cached backend reads.
    pub cache_ttl: Duration,
    // Address the HTTP listener binds to.
    pub bind_addr: String,
    // Optional JSON file replacing the built-in navigation registry.
    pub navigation_file: Option<String>,
}

/// Env
///
/// Runtime context: `Local` enables development conveniences, `Production`
/// demands explicit secrets.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const LOCAL_SESSION_SECRET: &str = "local-portal-session-secret-change-me";
const LOCAL_API_BASE_URL: &str = "http://localhost:5000/api/v1";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;
const DEFAULT_CACHE_TTL_SECS: u64 = 60;

impl Default for AppConfig {
    /// Non-panicking configuration for tests.
    fn default() -> Self {
        Self {
            env: Env::Local,
            api_base_url: LOCAL_API_BASE_URL.to_string(),
            session_secret: LOCAL_SESSION_SECRET.to_string(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            navigation_file: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// # Panics
    /// Panics in production when `API_BASE_URL` or `SESSION_SECRET` is
    /// missing, and in any environment when a TTL is not a whole number of
    /// seconds.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let (api_base_url, session_secret) = match env {
            Env::Production => (
                env::var("API_BASE_URL").expect("FATAL: API_BASE_URL must be set in production."),
                env::var("SESSION_SECRET")
                    .expect("FATAL: SESSION_SECRET must be set in production."),
            ),
            Env::Local => (
                env::var("API_BASE_URL").unwrap_or_else(|_| LOCAL_API_BASE_URL.to_string()),
                env::var("SESSION_SECRET").unwrap_or_else(|_| LOCAL_SESSION_SECRET.to_string()),
            ),
        };

        Self {
            env,
            api_base_url,
            session_secret,
            session_ttl: Duration::from_secs(seconds("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)),
            cache_ttl: Duration::from_secs(seconds("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)),
            bind_addr: env::var("PORTAL_BIND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            navigation_file: env::var("NAVIGATION_FILE").ok().filter(|p| !p.is_empty()),
        }
    }
}

fn seconds(var: &str, default: u64) -> u64 {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {var} must be a whole number of seconds.")),
        Err(_) => default,
    }
}
