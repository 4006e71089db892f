use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    error::ConfigError,
    navigation::NavigationGroup,
    views::View,
};

// --- Access Roles ---

/// Role
///
/// The access-level classification of an authenticated caller. Assigned by
/// the backend and read from the fetched profile; the portal never mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[serde(alias = "ADMIN", alias = "Admin")]
    Admin,
    #[serde(alias = "USER", alias = "User")]
    User,
    #[serde(alias = "AGENT", alias = "Agent")]
    Agent,
}

impl Role {
    /// Every role, in the order the dashboards are mounted.
    pub const ALL: [Role; 3] = [Role::Admin, Role::User, Role::Agent];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Agent => "agent",
        }
    }

    /// The top-level path under which this role's dashboard is mounted.
    pub fn prefix(self) -> &'static str {
        match self {
            Role::Admin => "/admin",
            Role::User => "/user",
            Role::Agent => "/agent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "agent" => Ok(Role::Agent),
            _ => Err(ConfigError::UnknownRole(value.to_string())),
        }
    }
}

// --- Identity ---

/// Identity
///
/// The caller's profile as returned by `GET /users/profile`. Only the fields
/// the portal relies on are typed; the backend may send more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Identity {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
}

impl Identity {
    /// Name shown in the dashboard header, falling back to the email.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

// --- Request Payloads ---

/// LoginRequest
///
/// Credentials posted by the login form and forwarded to `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// RegisterRequest
///
/// Sign-up form payload forwarded to `POST /auth/register`. The password is
/// passed through and never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

// --- API Responses ---

/// RouteInfo
///
/// One mounted dashboard route, as listed by `GET /api/routes`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RouteInfo {
    pub role: Role,
    pub path: String,
    pub title: String,
    pub view: View,
}

/// SessionOverview
///
/// Output of `GET /api/me`: the resolved caller plus the menu their role is
/// entitled to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionOverview {
    pub identity: Identity,
    pub landing: String,
    pub navigation: Vec<NavigationGroup>,
}
