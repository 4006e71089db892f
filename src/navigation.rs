use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{error::ConfigError, models::Role, views::View};

/// NavigationItem
///
/// A single menu entry. `url` and `view` are optional only because
/// descriptors can be loaded from a file; the route generator rejects entries
/// missing either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NavigationItem {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub view: Option<View>,
}

impl NavigationItem {
    pub fn new(title: &str, url: &str, view: View) -> Self {
        Self {
            title: title.to_string(),
            url: Some(url.to_string()),
            view: Some(view),
        }
    }
}

/// NavigationGroup
///
/// A titled section of the side menu. Items keep their declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NavigationGroup {
    pub title: String,
    #[serde(default)]
    pub items: Vec<NavigationItem>,
}

impl NavigationGroup {
    pub fn new(title: &str, items: Vec<NavigationItem>) -> Self {
        Self {
            title: title.to_string(),
            items,
        }
    }
}

/// RoleRegistry
///
/// The fixed mapping from role to navigation groups. One field per role, so a
/// registry without a menu for some role cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRegistry {
    admin: Vec<NavigationGroup>,
    user: Vec<NavigationGroup>,
    agent: Vec<NavigationGroup>,
}

impl RoleRegistry {
    pub fn new(
        admin: Vec<NavigationGroup>,
        user: Vec<NavigationGroup>,
        agent: Vec<NavigationGroup>,
    ) -> Self {
        Self { admin, user, agent }
    }

    pub fn groups(&self, role: Role) -> &[NavigationGroup] {
        match role {
            Role::Admin => &self.admin,
            Role::User => &self.user,
            Role::Agent => &self.agent,
        }
    }

    /// The menus shipped with the portal.
    pub fn builtin() -> Self {
        Self::new(admin_navigation(), user_navigation(), agent_navigation())
    }

    /// Parses a registry from JSON of the shape
    /// `{ "admin": [groups], "user": [groups], "agent": [groups] }`.
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, Vec<NavigationGroup>> =
            serde_json::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut admin = None;
        let mut user = None;
        let mut agent = None;
        for (key, groups) in raw {
            match key.parse::<Role>()? {
                Role::Admin => admin = Some(groups),
                Role::User => user = Some(groups),
                Role::Agent => agent = Some(groups),
            }
        }

        Ok(Self::new(
            admin.ok_or(ConfigError::MissingRole(Role::Admin))?,
            user.ok_or(ConfigError::MissingRole(Role::User))?,
            agent.ok_or(ConfigError::MissingRole(Role::Agent))?,
        ))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::Io(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&source)
    }
}

// --- Built-in menus ---

fn admin_navigation() -> Vec<NavigationGroup> {
    vec![
        NavigationGroup::new(
            "Dashboard",
            vec![NavigationItem::new(
                "Overview",
                "/admin/overview",
                View::AdminOverview,
            )],
        ),
        NavigationGroup::new(
            "User Management",
            vec![
                NavigationItem::new("Manage Users", "/admin/manage-user", View::AdminManageUsers),
                NavigationItem::new(
                    "Manage Agents",
                    "/admin/manage-agents",
                    View::AdminManageAgents,
                ),
                NavigationItem::new(
                    "Manage Transactions",
                    "/admin/transaction",
                    View::AdminTransactions,
                ),
                NavigationItem::new("Manage Profile", "/admin/manage-profile", View::ManageProfile),
            ],
        ),
    ]
}

fn user_navigation() -> Vec<NavigationGroup> {
    vec![
        NavigationGroup::new(
            "Dashboard",
            vec![NavigationItem::new("Overview", "/user/overview", View::UserOverview)],
        ),
        NavigationGroup::new(
            "Wallet Management",
            vec![
                NavigationItem::new("Send Money", "/user/send-money", View::UserSendMoney),
                NavigationItem::new("Deposit", "/user/deposit", View::UserDeposit),
                NavigationItem::new(
                    "Transaction History",
                    "/user/transaction",
                    View::UserTransactions,
                ),
                NavigationItem::new("Withdraw", "/user/withdraw", View::UserWithdraw),
            ],
        ),
        NavigationGroup::new(
            "Manage Profile",
            vec![NavigationItem::new("Manage Profile", "/user/profile", View::ManageProfile)],
        ),
    ]
}

fn agent_navigation() -> Vec<NavigationGroup> {
    vec![
        NavigationGroup::new(
            "Dashboard",
            vec![NavigationItem::new("Overview", "/agent/overview", View::AgentOverview)],
        ),
        NavigationGroup::new(
            "Wallet Management",
            vec![
                NavigationItem::new("Add Money", "/agent/add-money", View::AgentAddMoney),
                NavigationItem::new("Cash Out", "/agent/cash-out", View::AgentCashOut),
                NavigationItem::new(
                    "Transaction History",
                    "/agent/history",
                    View::AgentTransactions,
                ),
            ],
        ),
        NavigationGroup::new(
            "Profile Management",
            vec![NavigationItem::new("Manage Profile", "/agent/profile", View::ManageProfile)],
        ),
    ]
}
