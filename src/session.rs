use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, StatusCode, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::SessionError,
};

/// Name of the cookie carrying the signed portal session.
pub const SESSION_COOKIE: &str = "ewallet_session";

/// Claims
///
/// Payload of the portal session JWT. The backend access token obtained at
/// login rides inside; the signature stops clients from swapping it out
/// and `exp` bounds the session lifetime.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The backend access token.
    pub token: String,
    /// Unique id of this session.
    pub jti: Uuid,
    pub iat: usize,
    pub exp: usize,
}

/// Signs a new session around `access_token`.
pub fn issue(access_token: &str, config: &AppConfig) -> Result<String, SessionError> {
    let now = Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        token: access_token.to_string(),
        jti: Uuid::new_v4(),
        iat: now,
        exp: now.saturating_add(usize::try_from(config.session_ttl.as_secs()).unwrap_or(usize::MAX)),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.session_secret.as_bytes()),
    )
    .map_err(|e| SessionError::Issue(e.to_string()))
}

/// Verifies a session JWT and returns the backend access token inside.
pub fn verify(session: &str, config: &AppConfig) -> Result<String, SessionError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        session,
        &DecodingKey::from_secret(config.session_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims.token)
    .map_err(|e| {
        tracing::debug!(error = %e, "session rejected");
        SessionError::Invalid
    })
}

/// Reads one cookie from the request headers.
pub fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// access_token
///
/// Resolves the backend access token of the caller:
/// 1. a valid `ewallet_session` cookie;
/// 2. in `Env::Local` only, an `Authorization: Bearer <token>` header carrying
///    the backend token directly (development bypass).
pub fn access_token(headers: &HeaderMap, config: &AppConfig) -> Result<String, SessionError> {
    if let Some(session) = cookie(headers, SESSION_COOKIE) {
        return verify(session, config);
    }

    if config.env == Env::Local {
        if let Some(token) = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .filter(|token| !token.is_empty())
        {
            return Ok(token.to_string());
        }
    }

    Err(SessionError::Missing)
}

/// `Set-Cookie` value installing a session.
pub fn session_cookie(session: &str, config: &AppConfig) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        SESSION_COOKIE,
        session,
        config.session_ttl.as_secs(),
        secure_flag(config)
    )
}

/// `Set-Cookie` value removing the session.
pub fn cleared_cookie(config: &AppConfig) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
        SESSION_COOKIE,
        secure_flag(config)
    )
}

fn secure_flag(config: &AppConfig) -> &'static str {
    match config.env {
        Env::Production => "; Secure",
        Env::Local => "",
    }
}

/// SessionToken
///
/// Extractor yielding the caller's backend access token. Rejects with
/// 401 Unauthorized when no valid session is present; used by the JSON API
/// where a redirect would be meaningless.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        access_token(&parts.headers, &config)
            .map(SessionToken)
            .map_err(|_| StatusCode::UNAUTHORIZED)
    }
}
