use ewallet_portal::{
    AppConfig, AppState, MockBackend, RoleRegistry, RouteTable,
    backend::{Action, BackendState, Resource, TransactionKind, TransactionQuery},
    create_router,
    error::BackendError,
    models::{Identity, Role},
    session::{self, SESSION_COOKIE},
};
use reqwest::{Client, StatusCode, header, redirect::Policy};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub client: Client,
}

impl TestApp {
    async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(format!("{}{}", self.address, path));
        if let Some(token) = token {
            request = request.header(header::COOKIE, session_cookie(token));
        }
        request.send().await.expect("req fail")
    }

    async fn post(&self, path: &str, token: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .header(header::COOKIE, session_cookie(token))
            .form(form)
            .send()
            .await
            .expect("req fail")
    }
}

async fn spawn_app(backend: Arc<MockBackend>) -> TestApp {
    let routes = RouteTable::build(RoleRegistry::builtin()).expect("builtin registry is valid");
    let state = AppState::new(backend as BackendState, routes, AppConfig::default());
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Redirects are asserted on, never followed.
    let client = Client::builder().redirect(Policy::none()).build().unwrap();
    TestApp { address, client }
}

fn session_cookie(token: &str) -> String {
    let session = session::issue(token, &AppConfig::default()).unwrap();
    format!("{}={}", SESSION_COOKIE, session)
}

fn identity(role: Role) -> Identity {
    Identity {
        id: format!("{}-1", role),
        name: Some("Jordan".to_string()),
        email: format!("{}@example.com", role),
        role,
    }
}

fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

fn wallet_user() -> MockBackend {
    MockBackend::new()
        .with_identity(identity(Role::User))
        .with_resource(Resource::Wallet, json!({ "balance": 150 }))
        .with_resource(
            Resource::RECENT_TRANSACTIONS,
            json!([{ "type": "deposit", "amount": 50, "status": "completed" }]),
        )
}

// --- Guard ---

#[tokio::test]
async fn test_user_on_admin_route_lands_on_own_dashboard() {
    let backend = Arc::new(wallet_user());
    let app = spawn_app(backend.clone()).await;

    let response = app.get("/admin/overview", Some("tok")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/user/overview");
    let body = response.text().await.unwrap();
    assert!(!body.contains("Manage Agents"));
    assert_eq!(backend.fetches(), 0, "admin data must never be requested");
}

#[tokio::test]
async fn test_every_cross_role_visit_is_redirected() {
    let backend = Arc::new(MockBackend::new().with_identity(identity(Role::Agent)));
    let app = spawn_app(backend).await;

    for path in ["/admin/manage-user", "/user/deposit", "/user", "/admin"] {
        let response = app.get(path, Some("tok")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&response), "/agent/overview", "{path}");
    }
}

#[tokio::test]
async fn test_no_session_redirects_to_login_without_backend_call() {
    let backend = Arc::new(wallet_user());
    let app = spawn_app(backend.clone()).await;

    let response = app.get("/user/overview", None).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(backend.identity_requests(), 0);
}

#[tokio::test]
async fn test_forged_session_redirects_to_login() {
    let app = spawn_app(Arc::new(wallet_user())).await;
    let response = app
        .client
        .get(format!("{}/user/overview", app.address))
        .header(header::COOKIE, format!("{}=not-a-jwt", SESSION_COOKIE))
        .send()
        .await
        .unwrap();
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_rejected_identity_redirects_to_login() {
    let backend = Arc::new(MockBackend::new().with_identity_error(BackendError::Unauthenticated));
    let app = spawn_app(backend.clone()).await;

    let response = app.get("/agent/overview", Some("expired")).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(backend.identity_requests(), 1);
}

#[tokio::test]
async fn test_unreachable_backend_redirects_to_login() {
    let backend = Arc::new(
        MockBackend::new().with_identity_error(BackendError::Transport("refused".to_string())),
    );
    let app = spawn_app(backend).await;
    let response = app.get("/admin/overview", Some("tok")).await;
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_bearer_header_is_accepted_locally() {
    let app = spawn_app(Arc::new(wallet_user())).await;
    let response = app
        .client
        .get(format!("{}/user/overview", app.address))
        .bearer_auth("raw-backend-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// --- Shell ---

#[tokio::test]
async fn test_matching_role_renders_view_inside_shell() {
    let app = spawn_app(Arc::new(wallet_user())).await;

    let response = app.get("/user/overview", Some("tok")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("<a href=\"/user/overview\" class=\"active\" aria-current=\"page\">Overview</a>"));
    assert!(body.contains("<a href=\"/user/deposit\">Deposit</a>"));
    assert!(body.contains("$150.00"));
    assert!(body.contains("Jordan"));
    assert!(!body.contains("/admin/"));
}

#[tokio::test]
async fn test_role_prefix_forwards_to_landing() {
    let app = spawn_app(Arc::new(wallet_user())).await;
    let response = app.get("/user", Some("tok")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/user/overview");
}

#[tokio::test]
async fn test_unknown_subroute_is_not_found() {
    let app = spawn_app(Arc::new(wallet_user())).await;
    let response = app.get("/user/settings", Some("tok")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_menu_toggle_state_round_trips_through_query() {
    let app = spawn_app(Arc::new(wallet_user())).await;
    let body = app
        .get("/user/overview?menu=open", Some("tok"))
        .await
        .text()
        .await
        .unwrap();
    assert!(body.contains("data-state=\"open\""));
    assert!(body.contains("href=\"/user/overview?menu=closed\""));
}

#[tokio::test]
async fn test_missing_backend_data_renders_notice() {
    // No transactions scripted: the overview still renders, with a notice.
    let backend = Arc::new(
        MockBackend::new()
            .with_identity(identity(Role::User))
            .with_resource(Resource::Wallet, json!({ "balance": 1 })),
    );
    let app = spawn_app(backend).await;

    let response = app.get("/user/overview", Some("tok")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("We could not load this page right now."));
    assert!(body.contains("class=\"active\""));
}

#[tokio::test]
async fn test_reads_are_cached_per_session() {
    let backend = Arc::new(wallet_user());
    let app = spawn_app(backend.clone()).await;

    app.get("/user/overview", Some("tok")).await;
    app.get("/user/overview", Some("tok")).await;
    assert_eq!(backend.fetches(), 2);

    app.get("/user/overview", Some("other-session")).await;
    assert_eq!(backend.fetches(), 4);
}

// --- Forms ---

#[tokio::test]
async fn test_deposit_submits_once_and_invalidates_balance() {
    let backend = Arc::new(wallet_user());
    let app = spawn_app(backend.clone()).await;

    app.get("/user/overview", Some("tok")).await;
    assert_eq!(backend.fetches(), 2);

    let response = app
        .post("/user/deposit", "tok", &[("amount", "25"), ("description", "rent")])
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/user/deposit?outcome=success");
    assert_eq!(
        backend.submissions(),
        vec![(Action::Deposit, json!({ "amount": 25.0, "description": "rent" }))]
    );

    app.get("/user/overview", Some("tok")).await;
    assert_eq!(backend.fetches(), 4, "balance and history are refetched");
}

#[tokio::test]
async fn test_invalid_amount_never_reaches_backend() {
    let backend = Arc::new(wallet_user());
    let app = spawn_app(backend.clone()).await;

    let response = app.post("/user/withdraw", "tok", &[("amount", "-5")]).await;

    assert_eq!(location(&response), "/user/withdraw?outcome=invalid");
    assert!(backend.submissions().is_empty());

    let page = app
        .get("/user/withdraw?outcome=invalid", Some("tok"))
        .await
        .text()
        .await
        .unwrap();
    assert!(page.contains("Please check the form and try again."));
}

#[tokio::test]
async fn test_display_only_view_rejects_posts() {
    let app = spawn_app(Arc::new(wallet_user())).await;
    let response = app.post("/user/overview", "tok", &[("amount", "5")]).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_forms_are_guarded_too() {
    let backend = Arc::new(wallet_user());
    let app = spawn_app(backend.clone()).await;

    let response = app
        .post("/admin/manage-user", "tok", &[("op", "block"), ("id", "w-1")])
        .await;

    assert_eq!(location(&response), "/user/overview");
    assert!(backend.submissions().is_empty());
}

#[tokio::test]
async fn test_admin_blocks_wallet() {
    let backend = Arc::new(MockBackend::new().with_identity(identity(Role::Admin)));
    let app = spawn_app(backend.clone()).await;

    let response = app
        .post("/admin/manage-user", "tok", &[("op", "block"), ("id", "w-1")])
        .await;

    assert_eq!(location(&response), "/admin/manage-user?outcome=success");
    assert_eq!(
        backend.submissions(),
        vec![(Action::BlockWallet("w-1".to_string()), json!({}))]
    );
}

#[tokio::test]
async fn test_path_changing_record_id_never_reaches_backend() {
    let backend = Arc::new(MockBackend::new().with_identity(identity(Role::Admin)));
    let app = spawn_app(backend.clone()).await;

    let response = app
        .post(
            "/admin/manage-user",
            "tok",
            &[("op", "block"), ("id", "w1/../../../users/profile?x=")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/manage-user?outcome=invalid");
    assert!(backend.submissions().is_empty());
}

#[tokio::test]
async fn test_deposit_reports_transaction_reference() {
    let backend = Arc::new(wallet_user().with_submit_response(json!({
        "transaction": { "referenceId": "DEP-12345678", "amount": 25 }
    })));
    let app = spawn_app(backend).await;

    let response = app.post("/user/deposit", "tok", &[("amount", "25")]).await;

    let target = location(&response).to_string();
    assert_eq!(target, "/user/deposit?outcome=success&reference=DEP-12345678");

    let page = app.get(&target, Some("tok")).await.text().await.unwrap();
    assert!(page.contains("Request completed. Reference: DEP-12345678"));
}

// --- History ---

#[tokio::test]
async fn test_history_reads_requested_page_and_filters() {
    let second_deposits = TransactionQuery {
        page: 2,
        kind: Some(TransactionKind::Deposit),
        ..TransactionQuery::FIRST_PAGE
    };
    let records: Vec<_> = (0..TransactionQuery::PAGE_SIZE)
        .map(|n| json!({ "type": "deposit", "amount": 10 + n, "referenceId": format!("DEP-2{n:02}") }))
        .collect();
    let backend = Arc::new(
        MockBackend::new()
            .with_identity(identity(Role::Agent))
            .with_resource(
                Resource::Transactions(second_deposits),
                json!({ "transactions": records }),
            ),
    );
    let app = spawn_app(backend.clone()).await;

    let response = app
        .get("/agent/history?page=2&type=deposit", Some("tok"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("DEP-200"));
    assert!(body.contains("rel=\"prev\" href=\"?page=1&amp;type=deposit\""));
    assert!(body.contains("rel=\"next\" href=\"?page=3&amp;type=deposit\""));
    assert!(!body.contains("We could not load this page right now."));
    assert_eq!(backend.fetches(), 1);
}

#[tokio::test]
async fn test_history_search_filters_the_page() {
    let backend = Arc::new(
        MockBackend::new()
            .with_identity(identity(Role::User))
            .with_resource(
                Resource::RECENT_TRANSACTIONS,
                json!({ "transactions": [
                    { "type": "withdraw", "description": "Groceries", "referenceId": "WTH-1" },
                    { "type": "deposit", "description": "Salary", "referenceId": "DEP-9" },
                ] }),
            ),
    );
    let app = spawn_app(backend).await;

    let body = app
        .get("/user/transaction?search=salary", Some("tok"))
        .await
        .text()
        .await
        .unwrap();

    assert!(body.contains("DEP-9"));
    assert!(!body.contains("WTH-1"));
    assert!(body.contains("value=\"salary\""));
}

// --- Login / Logout ---

#[tokio::test]
async fn test_login_sets_session_and_lands_on_role_dashboard() {
    let backend = Arc::new(
        MockBackend::new()
            .with_access_token("backend-tok")
            .with_identity(identity(Role::Agent)),
    );
    let app = spawn_app(backend).await;

    let response = app
        .client
        .post(format!("{}/login", app.address))
        .form(&[("email", "agent@example.com"), ("password", "hunter22")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/agent/overview");
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap();
    assert!(cookie.starts_with(&format!("{}=", SESSION_COOKIE)));
    assert!(cookie.contains("HttpOnly"));

    let session = cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value)
        .unwrap();
    assert_eq!(
        session::verify(session, &AppConfig::default()).unwrap(),
        "backend-tok"
    );
}

#[tokio::test]
async fn test_rejected_login_returns_to_form() {
    let app = spawn_app(Arc::new(MockBackend::new())).await;
    let response = app
        .client
        .post(format!("{}/login", app.address))
        .form(&[("email", "nobody@example.com"), ("password", "wrong-pass")])
        .send()
        .await
        .unwrap();

    assert_eq!(location(&response), "/login?error=credentials");
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_signup_forwards_registration() {
    let backend = Arc::new(MockBackend::new());
    let app = spawn_app(backend.clone()).await;

    let response = app
        .client
        .post(format!("{}/signup", app.address))
        .form(&[
            ("name", "Riley"),
            ("email", "riley@example.com"),
            ("password", "password1"),
            ("phone", ""),
            ("role", "agent"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(location(&response), "/login?registered=1");
    let registrations = backend.registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].role, Some(Role::Agent));
    assert_eq!(registrations[0].phone, None);
}

#[tokio::test]
async fn test_signup_refuses_admin_accounts() {
    let backend = Arc::new(MockBackend::new());
    let app = spawn_app(backend.clone()).await;

    let response = app
        .client
        .post(format!("{}/signup", app.address))
        .form(&[
            ("name", "Eve"),
            ("email", "eve@example.com"),
            ("password", "password1"),
            ("role", "admin"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(location(&response), "/signup?error=role");
    assert!(backend.registrations().is_empty());
}

#[tokio::test]
async fn test_logout_clears_the_session_cookie() {
    let app = spawn_app(Arc::new(wallet_user())).await;
    let response = app.post("/logout", "tok", &[]).await;

    assert_eq!(location(&response), "/login");
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap();
    assert!(cookie.contains("Max-Age=0"));
}
