use std::collections::HashMap;

use chrono::{DateTime, NaiveDate};
use maud::{Markup, html};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    backend::{Action, Resource, TransactionKind, TransactionQuery, TransactionStatus},
    error::FormError,
    markup::{self, NoticeKind},
};

/// View
///
/// The closed set of dashboard views a navigation item can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum View {
    AdminOverview,
    AdminManageUsers,
    AdminManageAgents,
    AdminTransactions,
    ManageProfile,
    UserOverview,
    UserSendMoney,
    UserDeposit,
    UserWithdraw,
    UserTransactions,
    AgentOverview,
    AgentAddMoney,
    AgentCashOut,
    AgentTransactions,
}

static NULL: Value = Value::Null;

/// HistoryQuery
///
/// Raw query parameters of the history views. Values that do not parse are
/// ignored rather than rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub search: Option<String>,
}

/// HistoryFilter
///
/// The parsed history selection: the page and backend-side filters, plus a
/// free-text search applied to the fetched page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFilter {
    pub query: TransactionQuery,
    pub search: Option<String>,
}

/// Query string of a history link. Unset filters are left out.
#[derive(Serialize)]
struct HistoryLink<'a> {
    page: u32,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<&'a str>,
}

impl HistoryFilter {
    pub fn from_query(raw: &HistoryQuery) -> Self {
        let page = filled(&raw.page)
            .and_then(|page| page.parse::<u32>().ok())
            .filter(|page| *page > 0)
            .unwrap_or(1);
        let date = |field: &Option<String>| {
            filled(field).and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        };

        Self {
            query: TransactionQuery {
                page,
                limit: TransactionQuery::PAGE_SIZE,
                kind: filled(&raw.kind).and_then(TransactionKind::parse),
                status: filled(&raw.status).and_then(TransactionStatus::parse),
                from: date(&raw.from),
                to: date(&raw.to),
            },
            search: filled(&raw.search).map(str::to_string),
        }
    }

    /// Whether anything narrows the history beyond paging.
    pub fn is_narrowed(&self) -> bool {
        self.query.is_filtered() || self.search.is_some()
    }

    /// Case-insensitive match of the search text against the descriptive
    /// fields of a record.
    pub fn matches(&self, record: &Value) -> bool {
        let Some(search) = &self.search else {
            return true;
        };
        let needle = search.to_lowercase();
        [
            "description",
            "referenceId",
            "recipient",
            "sender",
            "recipient.email",
            "sender.email",
        ]
        .iter()
        .filter_map(|path| field(record, path).as_str())
        .any(|haystack| haystack.to_lowercase().contains(&needle))
    }

    /// Relative link to `page` of the same selection.
    pub fn link(&self, page: u32) -> String {
        let link = HistoryLink {
            page,
            kind: self.query.kind.map(TransactionKind::as_str),
            status: self.query.status.map(TransactionStatus::as_str),
            from: self.query.from.map(|day| day.to_string()),
            to: self.query.to.map(|day| day.to_string()),
            search: self.search.as_deref(),
        };
        match serde_urlencoded::to_string(&link) {
            Ok(query) => format!("?{}", query),
            Err(_) => format!("?page={}", page),
        }
    }
}

/// ViewData
///
/// Backend payloads fetched for one render, keyed by resource, together with
/// the history selection they were fetched for.
#[derive(Debug, Clone, Default)]
pub struct ViewData {
    values: HashMap<Resource, Value>,
    filter: HistoryFilter,
}

impl ViewData {
    pub fn new(filter: HistoryFilter) -> Self {
        Self {
            values: HashMap::new(),
            filter,
        }
    }

    pub fn with_filter(mut self, filter: HistoryFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn insert(&mut self, resource: Resource, value: Value) {
        self.values.insert(resource, value);
    }

    pub fn get(&self, resource: &Resource) -> &Value {
        self.values.get(resource).unwrap_or(&NULL)
    }

    pub fn filter(&self) -> &HistoryFilter {
        &self.filter
    }
}

impl FromIterator<(Resource, Value)> for ViewData {
    fn from_iter<I: IntoIterator<Item = (Resource, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
            filter: HistoryFilter::default(),
        }
    }
}

/// ActionForm
///
/// Union of the fields posted by dashboard forms.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionForm {
    pub amount: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub op: Option<String>,
    pub id: Option<String>,
}

/// Submission
///
/// A validated form, ready to be sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub action: Action,
    pub body: Value,
}

impl View {
    /// Backend resources the view displays. History views read the page
    /// selected by `filter`; overviews always read the recent page.
    pub fn resources(self, filter: &HistoryFilter) -> Vec<Resource> {
        match self {
            View::AdminOverview => vec![Resource::AdminDashboard],
            View::AdminManageUsers => vec![Resource::AdminUsers, Resource::AdminWallets],
            View::AdminManageAgents => vec![Resource::AdminAgents],
            View::AdminTransactions | View::UserTransactions | View::AgentTransactions => {
                vec![Resource::Transactions(filter.query)]
            }
            View::ManageProfile => vec![Resource::Profile],
            View::UserOverview => vec![Resource::Wallet, Resource::RECENT_TRANSACTIONS],
            View::UserSendMoney
            | View::UserDeposit
            | View::UserWithdraw
            | View::AgentAddMoney
            | View::AgentCashOut => vec![Resource::Wallet],
            View::AgentOverview => vec![
                Resource::AgentProfile,
                Resource::Wallet,
                Resource::RECENT_TRANSACTIONS,
            ],
        }
    }

    /// Whether the view posts a form back to its own route.
    pub fn accepts_submissions(self) -> bool {
        matches!(
            self,
            View::AdminManageUsers
                | View::AdminManageAgents
                | View::ManageProfile
                | View::UserDeposit
                | View::UserWithdraw
                | View::AgentAddMoney
                | View::AgentCashOut
        )
    }

    /// Renders the content region from already-fetched data.
    pub fn render(self, data: &ViewData) -> Markup {
        match self {
            View::AdminOverview => html! {
                section class="stats" {
                    h2 { "System overview" }
                    (object_table(data.get(&Resource::AdminDashboard)))
                }
            },
            View::AdminManageUsers => html! {
                section {
                    h2 { "Users" }
                    (users_table(list(data.get(&Resource::AdminUsers), "users")))
                }
                section {
                    h2 { "Wallets" }
                    (wallets_table(list(data.get(&Resource::AdminWallets), "wallets")))
                }
            },
            View::AdminManageAgents => html! {
                section {
                    h2 { "Agents" }
                    (agents_table(list(data.get(&Resource::AdminAgents), "agents")))
                }
            },
            View::AdminTransactions | View::UserTransactions | View::AgentTransactions => {
                history(data)
            }
            View::ManageProfile => html! {
                section {
                    h2 { "Profile" }
                    (object_table(data.get(&Resource::Profile)))
                }
                section {
                    h2 { "Update profile" }
                    (profile_form(data.get(&Resource::Profile)))
                }
            },
            View::UserOverview => html! {
                (balance_card(data.get(&Resource::Wallet)))
                section {
                    h2 { "Recent transactions" }
                    (transactions_table(list(data.get(&Resource::RECENT_TRANSACTIONS), "transactions")))
                }
            },
            View::UserSendMoney => html! {
                (balance_card(data.get(&Resource::Wallet)))
                (markup::notice(
                    NoticeKind::Info,
                    "Sending money to another wallet is not available from the portal yet.",
                ))
            },
            View::UserDeposit => with_balance(data, amount_form("Deposit", false)),
            View::UserWithdraw => with_balance(data, amount_form("Withdraw", false)),
            View::AgentOverview => html! {
                section {
                    h2 { "Agent" }
                    (object_table(data.get(&Resource::AgentProfile)))
                }
                (balance_card(data.get(&Resource::Wallet)))
                section {
                    h2 { "Recent transactions" }
                    (transactions_table(list(data.get(&Resource::RECENT_TRANSACTIONS), "transactions")))
                }
            },
            View::AgentAddMoney => with_balance(data, amount_form("Add Money", true)),
            View::AgentCashOut => with_balance(data, amount_form("Cash Out", true)),
        }
    }

    /// submission
    ///
    /// Validates a posted form and maps it to a backend action. `Ok(None)`
    /// means the view has no form.
    pub fn submission(self, form: &ActionForm) -> Result<Option<Submission>, FormError> {
        let submission = match self {
            View::UserDeposit => Submission {
                action: Action::Deposit,
                body: money_body(form, false)?,
            },
            View::UserWithdraw => Submission {
                action: Action::Withdraw,
                body: money_body(form, false)?,
            },
            View::AgentAddMoney => Submission {
                action: Action::AgentCashIn,
                body: money_body(form, true)?,
            },
            View::AgentCashOut => Submission {
                action: Action::AgentCashOut,
                body: money_body(form, true)?,
            },
            View::ManageProfile => {
                let mut body = Map::new();
                if let Some(name) = filled(&form.name) {
                    body.insert("name".to_string(), json!(name));
                }
                if let Some(phone) = filled(&form.phone) {
                    body.insert("phone".to_string(), json!(phone));
                }
                if body.is_empty() {
                    return Err(FormError::MissingField("name"));
                }
                Submission {
                    action: Action::UpdateProfile,
                    body: Value::Object(body),
                }
            }
            View::AdminManageUsers => {
                let id = entity_id(form)?;
                let action = match filled(&form.op) {
                    Some("block") => Action::BlockWallet(id),
                    Some("unblock") => Action::UnblockWallet(id),
                    other => return Err(FormError::UnknownOperation(other.unwrap_or("").to_string())),
                };
                Submission {
                    action,
                    body: json!({}),
                }
            }
            View::AdminManageAgents => {
                let id = entity_id(form)?;
                let action = match filled(&form.op) {
                    Some("approve") => Action::ApproveAgent(id),
                    Some("suspend") => Action::SuspendAgent(id),
                    other => return Err(FormError::UnknownOperation(other.unwrap_or("").to_string())),
                };
                Submission {
                    action,
                    body: json!({}),
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(submission))
    }
}

/// The transaction reference of a successful money movement, if the backend
/// sent one.
pub fn reference_of(response: &Value) -> Option<String> {
    ["transaction.referenceId", "referenceId"]
        .iter()
        .find_map(|path| field(response, path).as_str())
        .filter(|reference| !reference.is_empty())
        .map(str::to_string)
}

// --- Form helpers ---

fn filled(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

/// The record id of an admin row action, as a single backend path segment.
fn entity_id(form: &ActionForm) -> Result<String, FormError> {
    let id = filled(&form.id).ok_or(FormError::MissingField("id"))?;
    if !Action::is_entity_id(id) {
        return Err(FormError::InvalidId(id.to_string()));
    }
    Ok(id.to_string())
}

fn money_body(form: &ActionForm, with_email: bool) -> Result<Value, FormError> {
    let amount = filled(&form.amount)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|amount| amount.is_finite() && *amount > 0.0)
        .ok_or(FormError::InvalidAmount)?;

    let mut body = Map::new();
    if with_email {
        let email = filled(&form.email).ok_or(FormError::MissingField("email"))?;
        body.insert("email".to_string(), json!(email));
    }
    body.insert("amount".to_string(), json!(amount));
    if let Some(description) = filled(&form.description) {
        body.insert("description".to_string(), json!(description));
    }
    Ok(Value::Object(body))
}

fn amount_form(label: &str, with_email: bool) -> Markup {
    html! {
        form method="post" class="amount-form" {
            @if with_email {
                label { "Recipient email " input type="email" name="email" required; }
            }
            label { "Amount " input type="number" name="amount" min="0.01" step="0.01" required; }
            label { "Description " input type="text" name="description"; }
            button type="submit" { (label) }
        }
    }
}

fn profile_form(profile: &Value) -> Markup {
    let value = |key: &str| profile.get(key).and_then(Value::as_str).unwrap_or("");
    html! {
        form method="post" class="profile-form" {
            label { "Name " input type="text" name="name" value=(value("name")); }
            label { "Phone " input type="tel" name="phone" value=(value("phone")); }
            button type="submit" { "Save" }
        }
    }
}

fn row_action(op: &str, label: &str, id: &str) -> Markup {
    html! {
        form method="post" class="row-action" {
            input type="hidden" name="op" value=(op);
            input type="hidden" name="id" value=(id);
            button type="submit" { (label) }
        }
    }
}

fn filter_form(filter: &HistoryFilter) -> Markup {
    let query = &filter.query;
    html! {
        form method="get" class="history-filter" {
            label { "Search " input type="search" name="search" value=[filter.search.as_deref()]; }
            label {
                "Type "
                select name="type" {
                    option value="" selected[query.kind.is_none()] { "All types" }
                    @for kind in TransactionKind::ALL {
                        option value=(kind.as_str()) selected[query.kind == Some(kind)] { (kind.as_str()) }
                    }
                }
            }
            label {
                "Status "
                select name="status" {
                    option value="" selected[query.status.is_none()] { "All statuses" }
                    @for status in TransactionStatus::ALL {
                        option value=(status.as_str()) selected[query.status == Some(status)] { (status.as_str()) }
                    }
                }
            }
            label { "From " input type="date" name="from" value=[query.from.map(|day| day.to_string())]; }
            label { "To " input type="date" name="to" value=[query.to.map(|day| day.to_string())]; }
            button type="submit" { "Apply" }
            a href="?" { "Clear" }
        }
    }
}

/// Previous/next links. A full page means there may be another one.
fn pager(filter: &HistoryFilter, fetched: usize) -> Markup {
    let page = filter.query.page;
    let has_next = u32::try_from(fetched).unwrap_or(u32::MAX) >= filter.query.limit;
    html! {
        nav class="pager" aria-label="Pagination" {
            @if page > 1 {
                a rel="prev" href=(filter.link(page - 1)) { "Previous" }
            }
            span class="page" { "Page " (page) }
            @if has_next {
                a rel="next" href=(filter.link(page.saturating_add(1))) { "Next" }
            }
        }
    }
}

// --- Value helpers ---

/// The array under `key`, or the value itself when it already is one.
fn list<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .or_else(|| value.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Looks up a dotted path such as `user.email`.
fn field<'a>(record: &'a Value, path: &str) -> &'a Value {
    path.split('.')
        .try_fold(record, |current, key| current.get(key))
        .unwrap_or(&NULL)
}

fn id_of(record: &Value) -> Option<String> {
    ["_id", "id"]
        .iter()
        .find_map(|key| record.get(*key))
        .map(text)
}

fn text(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => (if *b { "yes" } else { "no" }).to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Formats a currency amount as `$1,234.56` / `-$12.00`.
pub fn format_amount(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn amount_cell(value: &Value) -> String {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .map(format_amount)
        .unwrap_or_else(|| text(value))
}

fn plain(value: String) -> Markup {
    html! { (value) }
}

// --- Rendering helpers ---

fn with_balance(data: &ViewData, form: Markup) -> Markup {
    html! {
        (balance_card(data.get(&Resource::Wallet)))
        (form)
    }
}

fn table(headers: &[&str], rows: Vec<Vec<Markup>>) -> Markup {
    if rows.is_empty() {
        return markup::notice(NoticeKind::Info, "Nothing to show yet.");
    }
    html! {
        table {
            thead {
                tr {
                    @for header in headers {
                        th { (header) }
                    }
                }
            }
            tbody {
                @for cells in &rows {
                    tr {
                        @for cell in cells {
                            td { (cell) }
                        }
                    }
                }
            }
        }
    }
}

fn object_table(value: &Value) -> Markup {
    let Some(object) = value.as_object() else {
        return markup::notice(NoticeKind::Info, "Nothing to show yet.");
    };
    let rows = object
        .iter()
        .filter(|(_, v)| !v.is_object() && !v.is_array())
        .map(|(k, v)| vec![plain(k.clone()), plain(text(v))])
        .collect();
    table(&["Field", "Value"], rows)
}

fn balance_card(wallet: &Value) -> Markup {
    let balance = wallet
        .get("balance")
        .map(amount_cell)
        .unwrap_or_else(|| "-".to_string());
    html! {
        section class="balance" {
            h2 { "Available balance" }
            p class="amount" { (balance) }
        }
    }
}

fn history(data: &ViewData) -> Markup {
    let filter = data.filter();
    let fetched = list(data.get(&Resource::Transactions(filter.query)), "transactions");
    let shown: Vec<&Value> = fetched.iter().filter(|record| filter.matches(record)).collect();

    html! {
        section class="history" {
            h2 { "Transaction history" }
            (filter_form(filter))
            @if shown.is_empty() && filter.is_narrowed() {
                (markup::notice(NoticeKind::Info, "No transactions match these filters."))
            } @else {
                (transactions_table(shown))
            }
            (pager(filter, fetched.len()))
        }
    }
}

fn transactions_table<'a>(records: impl IntoIterator<Item = &'a Value>) -> Markup {
    let rows = records
        .into_iter()
        .map(|record| {
            let date = field(record, "createdAt")
                .as_str()
                .map(format_timestamp)
                .unwrap_or_else(|| "-".to_string());
            vec![
                plain(date),
                plain(text(field(record, "type"))),
                plain(amount_cell(field(record, "amount"))),
                plain(text(field(record, "status"))),
                plain(text(field(record, "referenceId"))),
            ]
        })
        .collect();
    table(&["Date", "Type", "Amount", "Status", "Reference"], rows)
}

fn users_table(records: &[Value]) -> Markup {
    let rows = records
        .iter()
        .map(|record| {
            vec![
                plain(text(field(record, "name"))),
                plain(text(field(record, "email"))),
                plain(text(field(record, "role"))),
                plain(text(field(record, "status"))),
            ]
        })
        .collect();
    table(&["Name", "Email", "Role", "Status"], rows)
}

fn wallets_table(records: &[Value]) -> Markup {
    let rows = records
        .iter()
        .map(|record| {
            let blocked = field(record, "isBlocked").as_bool().unwrap_or_else(|| {
                text(field(record, "status")).eq_ignore_ascii_case("blocked")
            });
            let owner = match field(record, "user.email") {
                Value::Null => field(record, "user"),
                email => email,
            };
            let action = match id_of(record).filter(|id| Action::is_entity_id(id)) {
                Some(id) if blocked => row_action("unblock", "Unblock", &id),
                Some(id) => row_action("block", "Block", &id),
                None => html! {},
            };
            vec![
                plain(text(owner)),
                plain(amount_cell(field(record, "balance"))),
                plain((if blocked { "Blocked" } else { "Active" }).to_string()),
                action,
            ]
        })
        .collect();
    table(&["Owner", "Balance", "Status", ""], rows)
}

fn agents_table(records: &[Value]) -> Markup {
    let rows = records
        .iter()
        .map(|record| {
            let actions = match id_of(record).filter(|id| Action::is_entity_id(id)) {
                Some(id) => html! {
                    (row_action("approve", "Approve", &id))
                    (row_action("suspend", "Suspend", &id))
                },
                None => html! {},
            };
            vec![
                plain(text(field(record, "name"))),
                plain(text(field(record, "email"))),
                plain(text(field(record, "status"))),
                actions,
            ]
        })
        .collect();
    table(&["Name", "Email", "Status", ""], rows)
}
