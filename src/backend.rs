use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::http::Method;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde_json::Value;

use crate::{
    error::BackendError,
    models::{Identity, LoginRequest, RegisterRequest},
};

// 1. Resources, Actions and Cache Tags

/// Tag
///
/// Groups cached resources so a successful mutation can drop everything it
/// may have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Balance,
    History,
    User,
    Admin,
}

/// TransactionKind
///
/// Transaction types the history filter understands, with their wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Send,
    Receive,
    CashIn,
    CashOut,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 6] = [
        TransactionKind::Deposit,
        TransactionKind::Withdraw,
        TransactionKind::Send,
        TransactionKind::Receive,
        TransactionKind::CashIn,
        TransactionKind::CashOut,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::Send => "send",
            TransactionKind::Receive => "receive",
            TransactionKind::CashIn => "cash-in",
            TransactionKind::CashOut => "cash-out",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }
}

/// TransactionStatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    Completed,
    Pending,
    Processing,
    Failed,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 4] = [
        TransactionStatus::Completed,
        TransactionStatus::Pending,
        TransactionStatus::Processing,
        TransactionStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == raw)
    }
}

/// TransactionQuery
///
/// One page of the caller's history, optionally narrowed by type, status and
/// an inclusive date range. Part of the cache key, so every filter
/// combination is cached on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionQuery {
    pub page: u32,
    pub limit: u32,
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl TransactionQuery {
    pub const PAGE_SIZE: u32 = 10;

    pub const FIRST_PAGE: TransactionQuery = TransactionQuery {
        page: 1,
        limit: Self::PAGE_SIZE,
        kind: None,
        status: None,
        from: None,
        to: None,
    };

    pub fn is_filtered(&self) -> bool {
        self.kind.is_some() || self.status.is_some() || self.from.is_some() || self.to.is_some()
    }
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self::FIRST_PAGE
    }
}

/// Resource
///
/// The read-only backend resources the dashboards display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Profile,
    Wallet,
    Transactions(TransactionQuery),
    AgentProfile,
    AdminDashboard,
    AdminUsers,
    AdminWallets,
    AdminAgents,
}

impl Resource {
    /// The unfiltered first page of the caller's history, as shown on
    /// overviews.
    pub const RECENT_TRANSACTIONS: Resource = Resource::Transactions(TransactionQuery::FIRST_PAGE);

    pub fn path(&self) -> &'static str {
        match self {
            Resource::Profile => "/users/profile",
            Resource::Wallet => "/wallets/me",
            Resource::Transactions(_) => "/transactions/me",
            Resource::AgentProfile => "/agents/profile",
            Resource::AdminDashboard => "/admin/dashboard",
            Resource::AdminUsers => "/admin/users",
            Resource::AdminWallets => "/admin/wallets",
            Resource::AdminAgents => "/admin/agents",
        }
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        let Resource::Transactions(query) = self else {
            return Vec::new();
        };
        let mut params = vec![
            ("page", query.page.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(kind) = query.kind {
            params.push(("type", kind.as_str().to_string()));
        }
        if let Some(status) = query.status {
            params.push(("status", status.as_str().to_string()));
        }
        if let Some(from) = query.from {
            params.push(("dateFrom", from.to_string()));
        }
        if let Some(to) = query.to {
            params.push(("dateTo", to.to_string()));
        }
        params
    }

    pub fn tags(&self) -> &'static [Tag] {
        match self {
            Resource::Profile | Resource::AgentProfile => &[Tag::User],
            Resource::Wallet => &[Tag::Balance],
            Resource::Transactions(_) => &[Tag::History],
            Resource::AdminDashboard | Resource::AdminUsers | Resource::AdminAgents => {
                &[Tag::Admin]
            }
            Resource::AdminWallets => &[Tag::Admin, Tag::Balance],
        }
    }
}

/// Action
///
/// The state-changing backend calls reachable from dashboard forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Deposit,
    Withdraw,
    AgentCashIn,
    AgentCashOut,
    UpdateProfile,
    ApproveAgent(String),
    SuspendAgent(String),
    BlockWallet(String),
    UnblockWallet(String),
}

impl Action {
    pub fn method(&self) -> Method {
        match self {
            Action::Deposit | Action::Withdraw | Action::AgentCashIn | Action::AgentCashOut => {
                Method::POST
            }
            Action::UpdateProfile => Method::PUT,
            Action::ApproveAgent(_)
            | Action::SuspendAgent(_)
            | Action::BlockWallet(_)
            | Action::UnblockWallet(_) => Method::PATCH,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Action::Deposit => "/wallets/deposit".to_string(),
            Action::Withdraw => "/wallets/withdraw".to_string(),
            Action::AgentCashIn => "/agents/cash-in".to_string(),
            Action::AgentCashOut => "/agents/cash-out".to_string(),
            Action::UpdateProfile => "/users/profile".to_string(),
            Action::ApproveAgent(id) => format!("/admin/agents/approve/{}", id),
            Action::SuspendAgent(id) => format!("/admin/agents/suspend/{}", id),
            Action::BlockWallet(id) => format!("/admin/wallets/block/{}", id),
            Action::UnblockWallet(id) => format!("/admin/wallets/unblock/{}", id),
        }
    }

    /// Whether `id` can be placed in a backend path as a single segment.
    /// Admin forms are validated against this before an action is built.
    pub fn is_entity_id(id: &str) -> bool {
        !id.is_empty()
            && id.len() <= 64
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    /// Cache tags made stale by a successful call.
    pub fn invalidates(&self) -> &'static [Tag] {
        match self {
            Action::Deposit | Action::Withdraw | Action::AgentCashIn | Action::AgentCashOut => {
                &[Tag::Balance, Tag::History]
            }
            Action::UpdateProfile => &[Tag::User],
            Action::ApproveAgent(_) | Action::SuspendAgent(_) => &[Tag::Admin],
            Action::BlockWallet(_) | Action::UnblockWallet(_) => &[Tag::Admin, Tag::Balance],
        }
    }
}

// 2. WalletBackend Contract

/// WalletBackend
///
/// The capability interface through which the portal reaches the E-Wallet
/// REST service. Handlers only ever see `Arc<dyn WalletBackend>`, so tests
/// swap in `MockBackend` without touching the routing code.
///
/// Every call takes the caller's backend access token; payloads are returned
/// with the response envelope already stripped.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    /// Resolves the caller behind `token`.
    async fn fetch_identity(&self, token: &str) -> Result<Identity, BackendError>;

    /// Exchanges credentials for an access token.
    async fn login(&self, credentials: &LoginRequest) -> Result<String, BackendError>;

    async fn register(&self, request: &RegisterRequest) -> Result<(), BackendError>;

    async fn logout(&self, token: &str) -> Result<(), BackendError>;

    async fn fetch(&self, token: &str, resource: &Resource) -> Result<Value, BackendError>;

    async fn submit(&self, token: &str, action: &Action, body: Value)
    -> Result<Value, BackendError>;
}

/// BackendState
///
/// The concrete type used to share the backend across the application state.
pub type BackendState = Arc<dyn WalletBackend>;

// 3. The Real Implementation (HTTP)

/// HttpBackend
///
/// `WalletBackend` over the backend's JSON REST API using a pooled
/// `reqwest::Client`. The access token travels as a bearer token.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Maps the status to `BackendError` and strips the `{ data: ... }`
    /// envelope from successful answers.
    async fn read(response: reqwest::Response) -> Result<Value, BackendError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Unauthenticated);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(text);
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        Ok(match body {
            Value::Object(mut map) if map.contains_key("data") => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        })
    }
}

#[async_trait]
impl WalletBackend for HttpBackend {
    async fn fetch_identity(&self, token: &str) -> Result<Identity, BackendError> {
        let response = self
            .client
            .get(self.url(Resource::Profile.path()))
            .bearer_auth(token)
            .send()
            .await?;
        let data = Self::read(response).await?;
        serde_json::from_value(data).map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn login(&self, credentials: &LoginRequest) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(credentials)
            .send()
            .await?;
        let data = Self::read(response).await?;
        data.get("accessToken")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BackendError::Decode("login response has no accessToken".to_string()))
    }

    async fn register(&self, request: &RegisterRequest) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(request)
            .send()
            .await?;
        Self::read(response).await.map(|_| ())
    }

    async fn logout(&self, token: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.url("/auth/logout"))
            .bearer_auth(token)
            .send()
            .await?;
        Self::read(response).await.map(|_| ())
    }

    async fn fetch(&self, token: &str, resource: &Resource) -> Result<Value, BackendError> {
        tracing::debug!(path = resource.path(), "fetching backend resource");
        let response = self
            .client
            .get(self.url(resource.path()))
            .query(&resource.query())
            .bearer_auth(token)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn submit(
        &self,
        token: &str,
        action: &Action,
        body: Value,
    ) -> Result<Value, BackendError> {
        let path = action.path();
        tracing::debug!(method = %action.method(), path = %path, "submitting backend action");
        let response = self
            .client
            .request(action.method(), self.url(&path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        Self::read(response).await
    }
}

// 4. The Mock Implementation (Testing)

/// MockBackend
///
/// An in-memory `WalletBackend` for tests. The identity answer, an artificial
/// latency and the resource payloads are scripted up front; every submission
/// is recorded for later inspection.
pub struct MockBackend {
    identity: Result<Identity, BackendError>,
    delay: Duration,
    access_token: Option<String>,
    resources: HashMap<Resource, Value>,
    submit_response: Value,
    identity_requests: AtomicUsize,
    completed_identity_requests: AtomicUsize,
    fetches: AtomicUsize,
    submissions: Mutex<Vec<(Action, Value)>>,
    registrations: Mutex<Vec<RegisterRequest>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Starts unauthenticated, with no latency and no resources.
    pub fn new() -> Self {
        Self {
            identity: Err(BackendError::Unauthenticated),
            delay: Duration::ZERO,
            access_token: None,
            resources: HashMap::new(),
            submit_response: Value::Null,
            identity_requests: AtomicUsize::new(0),
            completed_identity_requests: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
            registrations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Ok(identity);
        self
    }

    pub fn with_identity_error(mut self, error: BackendError) -> Self {
        self.identity = Err(error);
        self
    }

    /// Latency applied to identity resolution.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes `login` succeed with this access token.
    pub fn with_access_token(mut self, token: &str) -> Self {
        self.access_token = Some(token.to_string());
        self
    }

    pub fn with_resource(mut self, resource: Resource, payload: Value) -> Self {
        self.resources.insert(resource, payload);
        self
    }

    /// Payload every successful submission answers with.
    pub fn with_submit_response(mut self, payload: Value) -> Self {
        self.submit_response = payload;
        self
    }

    pub fn identity_requests(&self) -> usize {
        self.identity_requests.load(Ordering::SeqCst)
    }

    /// Identity requests that ran to completion (were not cancelled).
    pub fn completed_identity_requests(&self) -> usize {
        self.completed_identity_requests.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<(Action, Value)> {
        self.submissions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn registrations(&self) -> Vec<RegisterRequest> {
        self.registrations
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WalletBackend for MockBackend {
    async fn fetch_identity(&self, _token: &str) -> Result<Identity, BackendError> {
        self.identity_requests.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed_identity_requests.fetch_add(1, Ordering::SeqCst);
        self.identity.clone()
    }

    async fn login(&self, _credentials: &LoginRequest) -> Result<String, BackendError> {
        self.access_token
            .clone()
            .ok_or(BackendError::Unauthenticated)
    }

    async fn register(&self, request: &RegisterRequest) -> Result<(), BackendError> {
        if let Ok(mut registrations) = self.registrations.lock() {
            registrations.push(request.clone());
        }
        Ok(())
    }

    async fn logout(&self, _token: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn fetch(&self, _token: &str, resource: &Resource) -> Result<Value, BackendError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.resources
            .get(resource)
            .cloned()
            .ok_or_else(|| BackendError::Status {
                status: 404,
                message: format!("{} not scripted", resource.path()),
            })
    }

    async fn submit(
        &self,
        _token: &str,
        action: &Action,
        body: Value,
    ) -> Result<Value, BackendError> {
        if let Ok(mut submissions) = self.submissions.lock() {
            submissions.push((action.clone(), body));
        }
        Ok(self.submit_response.clone())
    }
}
