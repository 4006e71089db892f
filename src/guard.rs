use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    AppState,
    backend::BackendState,
    error::BackendError,
    generator::RouteTable,
    markup,
    models::{Identity, Role},
    session,
};

/// Where unauthenticated callers are sent.
pub const LOGIN_PATH: &str = "/login";

/// GuardState
///
/// Lifecycle of one guarded mount: `Pending` until the identity request
/// settles, then exactly one terminal state.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardState {
    Pending,
    Granted(Identity),
    Redirect(String),
}

impl GuardState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, GuardState::Pending)
    }
}

/// decide
///
/// Maps the outcome of the identity request to a terminal state. A caller
/// with another role is sent to their own landing route; any failure is sent
/// to the login page.
pub fn decide(
    expected: Role,
    outcome: Result<Identity, BackendError>,
    routes: &RouteTable,
) -> GuardState {
    match outcome {
        Ok(identity) if identity.role == expected => GuardState::Granted(identity),
        Ok(identity) => {
            tracing::warn!(
                expected = %expected,
                actual = %identity.role,
                "role mismatch, redirecting to own dashboard"
            );
            GuardState::Redirect(routes.landing(identity.role).to_string())
        }
        Err(e) => {
            tracing::info!(error = %e, "identity resolution failed, redirecting to login");
            GuardState::Redirect(LOGIN_PATH.to_string())
        }
    }
}

/// AccessGuard
///
/// Gates a role-scoped subtree behind an asynchronous identity check.
#[derive(Clone)]
pub struct AccessGuard {
    backend: BackendState,
    routes: Arc<RouteTable>,
    expected: Role,
}

impl AccessGuard {
    pub fn new(backend: BackendState, routes: Arc<RouteTable>, expected: Role) -> Self {
        Self {
            backend,
            routes,
            expected,
        }
    }

    /// mount
    ///
    /// Starts resolving the caller. Exactly one identity request is issued
    /// per mount, on its own task; without a token the guard settles on the
    /// login redirect without contacting the backend.
    pub fn mount(&self, token: Option<String>) -> GuardHandle {
        let Some(token) = token else {
            let (_tx, rx) = watch::channel(GuardState::Redirect(LOGIN_PATH.to_string()));
            return GuardHandle {
                state: rx,
                task: None,
            };
        };

        let (tx, rx) = watch::channel(GuardState::Pending);
        let backend = Arc::clone(&self.backend);
        let routes = Arc::clone(&self.routes);
        let expected = self.expected;

        let task = tokio::spawn(async move {
            let outcome = backend.fetch_identity(&token).await;
            let _ = tx.send(decide(expected, outcome, &routes));
        });

        GuardHandle {
            state: rx,
            task: Some(task),
        }
    }
}

/// Rendered
///
/// What a guarded mount shows at a given instant.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Loading(String),
    Content(String),
    Redirect(String),
}

/// GuardHandle
///
/// A mounted guard. Dropping the handle unmounts it: the in-flight identity
/// request is aborted and no further state is published.
pub struct GuardHandle {
    state: watch::Receiver<GuardState>,
    task: Option<JoinHandle<()>>,
}

impl GuardHandle {
    pub fn state(&self) -> GuardState {
        self.state.borrow().clone()
    }

    /// Waits for the terminal state. A resolution task that died without
    /// publishing one counts as an authentication failure.
    pub async fn settled(&mut self) -> GuardState {
        match self.state.wait_for(GuardState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => GuardState::Redirect(LOGIN_PATH.to_string()),
        }
    }

    /// Renders the current state. `view` is only invoked once access has
    /// been granted, so nothing of the protected view exists before that.
    pub fn render<F>(&self, view: F) -> Rendered
    where
        F: FnOnce(&Identity) -> String,
    {
        match &*self.state.borrow() {
            GuardState::Pending => Rendered::Loading(markup::loading().into_string()),
            GuardState::Granted(identity) => Rendered::Content(view(identity)),
            GuardState::Redirect(to) => Rendered::Redirect(to.clone()),
        }
    }
}

impl Drop for GuardHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// --- HTTP Integration ---

/// AuthContext
///
/// Inserted into the request extensions by `require_role` once access has
/// been granted.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: Identity,
    pub token: String,
}

/// RoleGate
///
/// State of the `require_role` middleware: the application state plus the
/// role the wrapped subtree demands.
#[derive(Clone)]
pub struct RoleGate {
    pub app: AppState,
    pub expected: Role,
}

/// require_role
///
/// Middleware wrapping each dashboard subtree. The request reaches the inner
/// handler only when the resolved role matches; otherwise the caller is
/// redirected and the handler never runs.
pub async fn require_role(
    State(gate): State<RoleGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match session::access_token(request.headers(), &gate.app.config) {
        Ok(token) => Some(token),
        Err(e) => {
            tracing::debug!(error = %e, path = %request.uri().path(), "no usable session");
            None
        }
    };

    let guard = AccessGuard::new(
        Arc::clone(&gate.app.backend),
        Arc::clone(&gate.app.routes),
        gate.expected,
    );
    let mut handle = guard.mount(token.clone());

    match (handle.settled().await, token) {
        (GuardState::Granted(identity), Some(token)) => {
            request
                .extensions_mut()
                .insert(AuthContext { identity, token });
            next.run(request).await
        }
        (GuardState::Redirect(to), _) => Redirect::to(&to).into_response(),
        _ => Redirect::to(LOGIN_PATH).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::MockBackend, navigation::RoleRegistry};
    use std::time::Duration;

    fn identity(role: Role) -> Identity {
        Identity {
            id: "u-1".to_string(),
            name: Some("Casey".to_string()),
            email: "casey@example.com".to_string(),
            role,
        }
    }

    fn routes() -> Arc<RouteTable> {
        Arc::new(RouteTable::build(RoleRegistry::builtin()).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn pending_identity_renders_only_the_loading_state() {
        let backend = Arc::new(
            MockBackend::new()
                .with_identity(identity(Role::User))
                .with_delay(Duration::from_millis(500)),
        );
        let guard = AccessGuard::new(backend, routes(), Role::User);
        let mut handle = guard.mount(Some("tok".to_string()));

        for _ in 0..4 {
            assert_eq!(handle.state(), GuardState::Pending);
            let rendered = handle.render(|_| "<h1>user dashboard</h1>".to_string());
            assert!(matches!(rendered, Rendered::Loading(ref html) if !html.contains("dashboard")));
            tokio::time::advance(Duration::from_millis(100)).await;
            tokio::task::yield_now().await;
        }

        assert!(matches!(handle.settled().await, GuardState::Granted(_)));
        assert_eq!(
            handle.render(|identity| format!("<h1>{}</h1>", identity.email)),
            Rendered::Content("<h1>casey@example.com</h1>".to_string())
        );
    }

    #[tokio::test]
    async fn mismatched_role_redirects_to_own_landing_without_rendering() {
        let backend = Arc::new(MockBackend::new().with_identity(identity(Role::User)));
        let guard = AccessGuard::new(backend, routes(), Role::Admin);
        let mut handle = guard.mount(Some("tok".to_string()));

        assert_eq!(
            handle.settled().await,
            GuardState::Redirect("/user/overview".to_string())
        );

        let mut rendered_admin = false;
        let outcome = handle.render(|_| {
            rendered_admin = true;
            "<h1>admin dashboard</h1>".to_string()
        });
        assert_eq!(outcome, Rendered::Redirect("/user/overview".to_string()));
        assert!(!rendered_admin);
    }

    #[tokio::test]
    async fn failed_identity_redirects_to_login() {
        let backend = Arc::new(MockBackend::new().with_identity_error(BackendError::Unauthenticated));
        let guard = AccessGuard::new(backend, routes(), Role::Agent);
        let mut handle = guard.mount(Some("tok".to_string()));
        assert_eq!(
            handle.settled().await,
            GuardState::Redirect(LOGIN_PATH.to_string())
        );
    }

    #[tokio::test]
    async fn missing_token_skips_the_backend() {
        let backend = Arc::new(MockBackend::new().with_identity(identity(Role::Admin)));
        let guard = AccessGuard::new(backend.clone(), routes(), Role::Admin);
        let mut handle = guard.mount(None);
        assert_eq!(
            handle.settled().await,
            GuardState::Redirect(LOGIN_PATH.to_string())
        );
        assert_eq!(backend.identity_requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_cancels_the_identity_request() {
        let backend = Arc::new(
            MockBackend::new()
                .with_identity(identity(Role::User))
                .with_delay(Duration::from_millis(500)),
        );
        let guard = AccessGuard::new(backend.clone(), routes(), Role::User);
        let handle = guard.mount(Some("tok".to_string()));

        tokio::task::yield_now().await;
        assert_eq!(backend.identity_requests(), 1);

        drop(handle);
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;

        assert_eq!(backend.completed_identity_requests(), 0);
    }

    #[test]
    fn decide_maps_every_outcome() {
        let table = routes();
        assert!(matches!(
            decide(Role::Agent, Ok(identity(Role::Agent)), &table),
            GuardState::Granted(_)
        ));
        assert_eq!(
            decide(Role::User, Ok(identity(Role::Admin)), &table),
            GuardState::Redirect("/admin/overview".to_string())
        );
        assert_eq!(
            decide(
                Role::User,
                Err(BackendError::Transport("refused".to_string())),
                &table
            ),
            GuardState::Redirect(LOGIN_PATH.to_string())
        );
    }
}
