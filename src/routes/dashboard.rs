use crate::{AppState, generator::RouteTable, handlers, models::Role};
use axum::{Router, routing::get};

/// Dashboard Router Module
///
/// Mounts one role's subtree: the bare prefix forwards to the landing route,
/// and every generated descriptor renders its view on GET. Views with a form
/// also accept POST; for the others Axum answers 405.
///
/// The returned router is unguarded. `create_router` wraps it in
/// `require_role` before merging.
pub fn role_routes(role: Role, table: &RouteTable) -> Router<AppState> {
    let mut router = Router::new().route(role.prefix(), get(handlers::landing));

    for route in &table.for_role(role).routes {
        let method_router = if route.view.accepts_submissions() {
            get(handlers::show_page).post(handlers::submit_page)
        } else {
            get(handlers::show_page)
        };
        router = router.route(&route.path, method_router);
    }

    router
}
