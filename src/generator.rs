use std::collections::{HashMap, HashSet};

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::ConfigError,
    models::{Role, RouteInfo},
    navigation::{NavigationGroup, RoleRegistry},
    views::View,
};

/// RouteDescriptor
///
/// A routable (path, view) pair derived from one navigation item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RouteDescriptor {
    pub path: String,
    pub title: String,
    pub view: View,
}

/// generate_routes
///
/// Flattens a role's navigation groups into route descriptors, groups in
/// order and items within a group in order. Pure: the same input always
/// yields the same output.
///
/// # Errors
/// Fails on the first item that has no url or view, whose url is not a
/// well-formed path strictly below the role prefix, or whose url was already
/// declared for this role.
pub fn generate_routes(
    role: Role,
    groups: &[NavigationGroup],
) -> Result<Vec<RouteDescriptor>, ConfigError> {
    let mut seen = HashSet::new();
    let mut routes = Vec::with_capacity(groups.iter().map(|g| g.items.len()).sum());

    for group in groups {
        for item in &group.items {
            let path = item
                .url
                .as_deref()
                .filter(|url| !url.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingUrl {
                    role,
                    group: group.title.clone(),
                    item: item.title.clone(),
                })?;

            let view = item.view.ok_or_else(|| ConfigError::MissingView {
                role,
                group: group.title.clone(),
                item: item.title.clone(),
            })?;

            if !is_route_path(path) {
                return Err(ConfigError::InvalidPath {
                    role,
                    path: path.to_string(),
                });
            }

            let inside = path
                .strip_prefix(role.prefix())
                .is_some_and(|rest| rest.len() > 1 && rest.starts_with('/'));
            if !inside {
                return Err(ConfigError::OutsideSubtree {
                    role,
                    path: path.to_string(),
                });
            }

            if !seen.insert(path.to_string()) {
                return Err(ConfigError::DuplicatePath {
                    role,
                    path: path.to_string(),
                });
            }

            routes.push(RouteDescriptor {
                path: path.to_string(),
                title: item.title.clone(),
                view,
            });
        }
    }

    Ok(routes)
}

/// Absolute, no empty or dot-only segments, and only characters the router
/// accepts literally. Surrounding whitespace is not stripped: the url is
/// also the menu link, so it must be usable as written.
fn is_route_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    !rest.is_empty()
        && rest.split('/').all(|segment| {
            !segment.is_empty()
                && !segment.chars().all(|c| c == '.')
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        })
}

/// RoleRoutes
///
/// The menu and generated routes of a single role.
#[derive(Debug, Clone)]
pub struct RoleRoutes {
    pub role: Role,
    pub groups: Vec<NavigationGroup>,
    pub routes: Vec<RouteDescriptor>,
}

impl RoleRoutes {
    /// The first generated route; where a caller of this role is sent by
    /// default.
    pub fn landing(&self) -> &str {
        // `RouteTable::build` rejects roles without routes.
        self.routes
            .first()
            .map(|route| route.path.as_str())
            .unwrap_or(self.role.prefix())
    }
}

/// RouteTable
///
/// Every role's generated routes. Built once at startup from the
/// `RoleRegistry` and shared read-only for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct RouteTable {
    admin: RoleRoutes,
    user: RoleRoutes,
    agent: RoleRoutes,
    index: HashMap<String, (Role, usize)>,
}

impl RouteTable {
    pub fn build(registry: RoleRegistry) -> Result<Self, ConfigError> {
        let build_role = |role: Role| -> Result<RoleRoutes, ConfigError> {
            let groups = registry.groups(role).to_vec();
            let routes = generate_routes(role, &groups)?;
            if routes.is_empty() {
                return Err(ConfigError::EmptyNavigation(role));
            }
            Ok(RoleRoutes {
                role,
                groups,
                routes,
            })
        };

        let admin = build_role(Role::Admin)?;
        let user = build_role(Role::User)?;
        let agent = build_role(Role::Agent)?;

        let mut index = HashMap::new();
        for role_routes in [&admin, &user, &agent] {
            for (position, route) in role_routes.routes.iter().enumerate() {
                index.insert(route.path.clone(), (role_routes.role, position));
            }
        }

        tracing::debug!(routes = index.len(), "route table built");

        Ok(Self {
            admin,
            user,
            agent,
            index,
        })
    }

    pub fn for_role(&self, role: Role) -> &RoleRoutes {
        match role {
            Role::Admin => &self.admin,
            Role::User => &self.user,
            Role::Agent => &self.agent,
        }
    }

    pub fn landing(&self, role: Role) -> &str {
        self.for_role(role).landing()
    }

    /// Looks up a mounted route by its exact path.
    pub fn find(&self, path: &str) -> Option<(Role, &RouteDescriptor)> {
        let (role, position) = self.index.get(path)?;
        Some((*role, &self.for_role(*role).routes[*position]))
    }

    pub fn route_infos(&self) -> Vec<RouteInfo> {
        Role::ALL
            .into_iter()
            .flat_map(|role| {
                self.for_role(role).routes.iter().map(move |route| RouteInfo {
                    role,
                    path: route.path.clone(),
                    title: route.title.clone(),
                    view: route.view,
                })
            })
            .collect()
    }
}
