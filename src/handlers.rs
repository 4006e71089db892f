use axum::{
    Extension, Form, Json,
    extract::{MatchedPath, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use maud::{Markup, html};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::BackendError,
    guard::{AuthContext, LOGIN_PATH},
    markup::{self, NoticeKind},
    models::{LoginRequest, RegisterRequest, Role, RouteInfo, SessionOverview},
    navigation::NavigationGroup,
    session::{self, SessionToken},
    shell::{DashboardShell, MenuState, status_banner},
    views::{self, ActionForm, HistoryFilter, HistoryQuery, View, ViewData},
};

// --- Query Structs ---

/// PageQuery
///
/// Query parameters understood by every dashboard page.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// `open` shows the side menu on small viewports.
    pub menu: Option<String>,
    /// Outcome of the last form submission (`success`, `failed`, `invalid`).
    pub outcome: Option<String>,
    /// Transaction reference returned by a successful money movement.
    pub reference: Option<String>,
}

/// Query string of the redirect that follows a form submission.
#[derive(Serialize)]
struct OutcomeQuery<'a> {
    outcome: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<&'a str>,
}

fn outcome_location(path: &str, outcome: &str, reference: Option<&str>) -> String {
    match serde_urlencoded::to_string(OutcomeQuery { outcome, reference }) {
        Ok(query) => format!("{}?{}", path, query),
        Err(_) => format!("{}?outcome={}", path, outcome),
    }
}

/// AuthPageQuery
///
/// Feedback flags for the login and sign-up forms.
#[derive(Debug, Default, Deserialize)]
pub struct AuthPageQuery {
    pub error: Option<String>,
    pub registered: Option<String>,
}

// --- Public Pages ---

const PUBLIC_LINKS: &[(&str, &str)] = &[
    ("/", "Home"),
    ("/feature", "Features"),
    ("/about", "About"),
    ("/faq", "FAQ"),
    ("/contact", "Contact"),
    ("/login", "Log in"),
    ("/signup", "Sign up"),
];

fn public_page(title: &str, content: Markup) -> Html<String> {
    let body = html! {
        header class="site-header" {
            nav {
                @for (href, label) in PUBLIC_LINKS {
                    a href=(href) { (label) }
                }
            }
        }
        main class="site-content" {
            h1 { (title) }
            (content)
        }
        footer class="site-footer" {
            p { "E-Wallet.com" }
        }
    };
    Html(markup::page(title, body).into_string())
}

pub async fn home() -> Html<String> {
    public_page(
        "E-Wallet",
        html! {
            p { "Deposit, withdraw and send money from one secure wallet." }
            p {
                a href="/signup" { "Open a wallet" }
                " or "
                a href="/login" { "log in" }
                "."
            }
        },
    )
}

pub async fn about() -> Html<String> {
    public_page(
        "About",
        html! {
            p { "E-Wallet connects customers and cash agents so money moves without a bank branch." }
        },
    )
}

pub async fn feature() -> Html<String> {
    public_page(
        "Features",
        html! {
            ul {
                li { "Instant deposits and withdrawals" }
                li { "Agent cash-in and cash-out" }
                li { "Full transaction history with search and filters" }
            }
        },
    )
}

pub async fn faq() -> Html<String> {
    public_page(
        "FAQ",
        html! {
            dl {
                dt { "How do I add money?" }
                dd { "Use Deposit in your dashboard or visit an agent." }
                dt { "Who can become an agent?" }
                dd { "Any verified user approved by an administrator." }
            }
        },
    )
}

pub async fn contact() -> Html<String> {
    public_page("Contact", html! { p { "Reach support at support@e-wallet.com." } })
}

// --- Authentication Forms ---

/// login_form
///
/// [Public Route] Renders the login form, with feedback from a previous attempt.
pub async fn login_form(Query(query): Query<AuthPageQuery>) -> Html<String> {
    let feedback = match (query.error.as_deref(), query.registered.as_deref()) {
        (Some("credentials"), _) => Some(markup::notice(NoticeKind::Error, "Invalid email or password.")),
        (Some(_), _) => Some(markup::notice(
            NoticeKind::Error,
            "Login is unavailable right now. Please try again later.",
        )),
        (None, Some(_)) => Some(markup::notice(NoticeKind::Success, "Account created. Please log in.")),
        (None, None) => None,
    };
    public_page(
        "Log in",
        html! {
            @if let Some(feedback) = feedback {
                (feedback)
            }
            form method="post" action="/login" class="auth-form" {
                label { "Email " input type="email" name="email" required; }
                label { "Password " input type="password" name="password" minlength="8" required; }
                button type="submit" { "Log in" }
            }
        },
    )
}

/// login
///
/// [Public Route] Exchanges credentials for a backend access token, wraps it
/// in a signed session cookie and sends the caller to their own dashboard.
pub async fn login(State(state): State<AppState>, Form(credentials): Form<LoginRequest>) -> Response {
    let token = match state.backend.login(&credentials).await {
        Ok(token) => token,
        Err(BackendError::Unauthenticated) | Err(BackendError::Status { .. }) => {
            tracing::info!("login rejected");
            return Redirect::to("/login?error=credentials").into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "login failed");
            return Redirect::to("/login?error=unavailable").into_response();
        }
    };

    let session = match session::issue(&token, &state.config) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "could not sign session");
            return Redirect::to("/login?error=unavailable").into_response();
        }
    };

    // The landing page depends on the role, which only the profile reveals.
    let target = match state.backend.fetch_identity(&token).await {
        Ok(identity) => {
            tracing::info!(role = %identity.role, "login succeeded");
            state.routes.landing(identity.role).to_string()
        }
        Err(e) => {
            tracing::warn!(error = %e, "profile unavailable after login");
            "/".to_string()
        }
    };

    (
        [(header::SET_COOKIE, session::session_cookie(&session, &state.config))],
        Redirect::to(&target),
    )
        .into_response()
}

/// signup_form
///
/// [Public Route] Renders the registration form.
pub async fn signup_form(Query(query): Query<AuthPageQuery>) -> Html<String> {
    let feedback = query.error.map(|_| {
        markup::notice(
            NoticeKind::Error,
            "Registration failed. Please check your details and try again.",
        )
    });
    public_page(
        "Sign up",
        html! {
            @if let Some(feedback) = feedback {
                (feedback)
            }
            form method="post" action="/signup" class="auth-form" {
                label { "Name " input type="text" name="name" required; }
                label { "Email " input type="email" name="email" required; }
                label { "Phone " input type="tel" name="phone"; }
                label { "Password " input type="password" name="password" minlength="8" required; }
                label {
                    "Account type "
                    select name="role" {
                        option value="user" { "User" }
                        option value="agent" { "Agent" }
                    }
                }
                button type="submit" { "Create account" }
            }
        },
    )
}

/// signup
///
/// [Public Route] Forwards the registration to the backend and sends the
/// caller to the login form. Administrators cannot self-register.
pub async fn signup(State(state): State<AppState>, Form(mut request): Form<RegisterRequest>) -> Response {
    if request.role == Some(Role::Admin) {
        return Redirect::to("/signup?error=role").into_response();
    }
    request.phone = request.phone.filter(|phone| !phone.trim().is_empty());

    match state.backend.register(&request).await {
        Ok(()) => Redirect::to("/login?registered=1").into_response(),
        Err(e) => {
            tracing::info!(error = %e, "registration rejected");
            Redirect::to("/signup?error=1").into_response()
        }
    }
}

/// logout
///
/// [Public Route] Ends the backend session (best effort), forgets cached
/// data and clears the session cookie.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Ok(token) = session::access_token(&headers, &state.config) {
        if let Err(e) = state.backend.logout(&token).await {
            tracing::warn!(error = %e, "backend logout failed");
        }
        state.cache.clear_session(&token);
    }

    (
        [(header::SET_COOKIE, session::cleared_cookie(&state.config))],
        Redirect::to(LOGIN_PATH),
    )
        .into_response()
}

// --- JSON API ---

/// get_navigation
///
/// [Public Route] The side menu of a role.
#[utoipa::path(
    get,
    path = "/api/navigation/{role}",
    params(("role" = String, Path, description = "admin, user or agent")),
    responses(
        (status = 200, description = "Navigation groups", body = [NavigationGroup]),
        (status = 404, description = "Unknown role")
    )
)]
pub async fn get_navigation(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Result<Json<Vec<NavigationGroup>>, StatusCode> {
    let role: Role = role.parse().map_err(|_| StatusCode::NOT_FOUND)?;
    Ok(Json(state.routes.for_role(role).groups.clone()))
}

/// get_routes
///
/// [Public Route] Every mounted dashboard route.
#[utoipa::path(
    get,
    path = "/api/routes",
    responses((status = 200, description = "Mounted routes", body = [RouteInfo]))
)]
pub async fn get_routes(State(state): State<AppState>) -> Json<Vec<RouteInfo>> {
    Json(state.routes.route_infos())
}

/// get_me
///
/// [Authenticated Route] The caller's identity, landing route and menu.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current session", body = SessionOverview),
        (status = 401, description = "No valid session"),
        (status = 502, description = "Backend unavailable")
    )
)]
pub async fn get_me(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<Json<SessionOverview>, StatusCode> {
    let identity = state
        .backend
        .fetch_identity(&token)
        .await
        .map_err(|e| match e {
            BackendError::Unauthenticated => StatusCode::UNAUTHORIZED,
            other => {
                tracing::warn!(error = %other, "identity lookup failed");
                StatusCode::BAD_GATEWAY
            }
        })?;

    let role_routes = state.routes.for_role(identity.role);
    Ok(Json(SessionOverview {
        landing: role_routes.landing().to_string(),
        navigation: role_routes.groups.clone(),
        identity,
    }))
}

// --- Dashboard Pages ---

/// Fetches every resource a view displays, through the per-session cache.
pub async fn load_view_data(
    state: &AppState,
    token: &str,
    view: View,
    filter: HistoryFilter,
) -> Result<ViewData, BackendError> {
    let backend = &state.backend;
    let resources = view.resources(&filter);
    let mut data = ViewData::new(filter);
    for resource in resources {
        let value = state
            .cache
            .get_or_fetch(token, resource, || async move {
                backend.fetch(token, &resource).await
            })
            .await?;
        data.insert(resource, value);
    }
    Ok(data)
}

/// landing
///
/// [Guarded Route] `/admin`, `/user`, `/agent`: forwards to the role's first
/// route.
pub async fn landing(State(state): State<AppState>, Extension(auth): Extension<AuthContext>) -> Redirect {
    Redirect::to(state.routes.landing(auth.identity.role))
}

/// show_page
///
/// [Guarded Route] Renders the view mounted at the matched path inside the
/// dashboard shell. History views read their page and filters from the
/// query. Data the view cannot load becomes an in-page notice; an expired
/// backend session sends the caller back to the login form.
pub async fn show_page(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    matched: MatchedPath,
    Query(query): Query<PageQuery>,
    Query(history): Query<HistoryQuery>,
) -> Response {
    let Some((role, route)) = state.routes.find(matched.as_str()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let filter = HistoryFilter::from_query(&history);
    let content = match load_view_data(&state, &auth.token, route.view, filter).await {
        Ok(data) => route.view.render(&data),
        Err(BackendError::Unauthenticated) => {
            state.cache.clear_session(&auth.token);
            return Redirect::to(LOGIN_PATH).into_response();
        }
        Err(e) => {
            tracing::warn!(error = %e, path = %route.path, "view data unavailable");
            markup::notice(
                NoticeKind::Error,
                "We could not load this page right now. Please try again later.",
            )
        }
    };

    let html = DashboardShell::new(&auth.identity, &state.routes.for_role(role).groups, &route.path)
        .title(&route.title)
        .menu(MenuState::from_query(query.menu.as_deref()))
        .banner(status_banner(query.outcome.as_deref(), query.reference.as_deref()))
        .render(content);

    Html(html.into_string()).into_response()
}

/// submit_page
///
/// [Guarded Route] Validates the view's form, forwards it to the backend and
/// redirects back to the page with the outcome. Invalid forms never reach the
/// backend; a successful call invalidates the cache tags it affects and
/// passes on the transaction reference the backend answered with.
pub async fn submit_page(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    matched: MatchedPath,
    Form(form): Form<ActionForm>,
) -> Response {
    let Some((_, route)) = state.routes.find(matched.as_str()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let back = |outcome: &str, reference: Option<&str>| {
        Redirect::to(&outcome_location(&route.path, outcome, reference)).into_response()
    };

    let submission = match route.view.submission(&form) {
        Ok(Some(submission)) => submission,
        Ok(None) => return StatusCode::METHOD_NOT_ALLOWED.into_response(),
        Err(e) => {
            tracing::debug!(error = %e, path = %route.path, "form rejected");
            return back("invalid", None);
        }
    };

    match state
        .backend
        .submit(&auth.token, &submission.action, submission.body)
        .await
    {
        Ok(response) => {
            state
                .cache
                .invalidate(&auth.token, submission.action.invalidates());
            let reference = views::reference_of(&response);
            tracing::info!(
                action = ?submission.action,
                user = %auth.identity.id,
                reference = ?reference,
                "action completed"
            );
            back("success", reference.as_deref())
        }
        Err(BackendError::Unauthenticated) => {
            state.cache.clear_session(&auth.token);
            Redirect::to(LOGIN_PATH).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, action = ?submission.action, "action failed");
            back("failed", None)
        }
    }
}
