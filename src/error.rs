use thiserror::Error;

use crate::models::Role;

/// ConfigError
///
/// Raised while building the navigation registry or the route table.
/// Every variant is fatal at startup: the portal refuses to serve a
/// partially-correct menu.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown role `{0}`")]
    UnknownRole(String),

    #[error("navigation for role `{0}` is missing")]
    MissingRole(Role),

    #[error("role `{0}` has no navigation entries")]
    EmptyNavigation(Role),

    #[error("item `{item}` in group `{group}` ({role}) has no url")]
    MissingUrl {
        role: Role,
        group: String,
        item: String,
    },

    #[error("item `{item}` in group `{group}` ({role}) has no view")]
    MissingView {
        role: Role,
        group: String,
        item: String,
    },

    #[error("`{path}` is not a valid route path")]
    InvalidPath { role: Role, path: String },

    #[error("`{path}` is outside the `{role}` subtree")]
    OutsideSubtree { role: Role, path: String },

    #[error("`{path}` is declared more than once for role `{role}`")]
    DuplicatePath { role: Role, path: String },

    #[error("failed to read navigation file: {0}")]
    Io(String),

    #[error("failed to parse navigation file: {0}")]
    Parse(String),
}

/// BackendError
///
/// Failure channel of the wallet backend capability. `Unauthenticated` covers
/// 401/403 answers; everything else is either a non-success status, a
/// transport problem or an unexpected payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("caller is not authenticated")]
    Unauthenticated,

    #[error("backend answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("backend unreachable: {0}")]
    Transport(String),

    #[error("unexpected backend payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// SessionError
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no session present")]
    Missing,

    #[error("session token rejected")]
    Invalid,

    #[error("failed to sign session: {0}")]
    Issue(String),
}

/// FormError
///
/// Validation failures of dashboard form submissions. These never reach the
/// backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("amount must be a positive number")]
    InvalidAmount,

    #[error("field `{0}` is required")]
    MissingField(&'static str),

    #[error("`{0}` is not a valid record id")]
    InvalidId(String),

    #[error("unsupported operation `{0}`")]
    UnknownOperation(String),
}
