/// Router Module Index
///
/// Splits the portal's routes by who may reach them. Access control is
/// attached per module with Axum layers in `create_router`, never inside
/// individual handlers.

/// Marketing pages, the login/sign-up forms and the health check.
pub mod public;

/// JSON endpoints describing the mounted navigation and the caller's session.
pub mod api;

/// Role-scoped dashboard subtrees, generated from the route table.
/// Each subtree is wrapped in the `require_role` guard by the caller.
pub mod dashboard;
