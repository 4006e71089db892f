use maud::{Markup, html};

use crate::{
    markup::{self, NoticeKind},
    models::Identity,
    navigation::NavigationGroup,
};

/// MenuState
///
/// Visibility of the side menu on small viewports. Starts `Closed`; the
/// toggle is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MenuState {
    #[default]
    Closed,
    Open,
}

impl MenuState {
    pub fn toggle(self) -> Self {
        match self {
            MenuState::Closed => MenuState::Open,
            MenuState::Open => MenuState::Closed,
        }
    }

    /// Reads the `menu` query parameter; anything but `open` is closed.
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw {
            Some("open") => MenuState::Open,
            _ => MenuState::Closed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MenuState::Closed => "closed",
            MenuState::Open => "open",
        }
    }
}

/// Banner shown after a form submission redirect. A successful call may
/// carry the backend's transaction reference.
pub fn status_banner(outcome: Option<&str>, reference: Option<&str>) -> Option<Markup> {
    match outcome? {
        "success" => Some(match reference.filter(|r| !r.is_empty()) {
            Some(reference) => markup::notice(
                NoticeKind::Success,
                &format!("Request completed. Reference: {}", reference),
            ),
            None => markup::notice(NoticeKind::Success, "Request completed."),
        }),
        "failed" => Some(markup::notice(
            NoticeKind::Error,
            "The request could not be completed. Please try again later.",
        )),
        "invalid" => Some(markup::notice(
            NoticeKind::Error,
            "Please check the form and try again.",
        )),
        _ => None,
    }
}

/// DashboardShell
///
/// Persistent layout around every dashboard view: the role's side menu with
/// the current route highlighted, the caller, and the content region.
/// Renders only; it never fetches data.
pub struct DashboardShell<'a> {
    identity: &'a Identity,
    groups: &'a [NavigationGroup],
    current_path: &'a str,
    title: &'a str,
    menu: MenuState,
    banner: Option<Markup>,
}

impl<'a> DashboardShell<'a> {
    pub fn new(identity: &'a Identity, groups: &'a [NavigationGroup], current_path: &'a str) -> Self {
        Self {
            identity,
            groups,
            current_path,
            title: "Dashboard",
            menu: MenuState::default(),
            banner: None,
        }
    }

    pub fn title(mut self, title: &'a str) -> Self {
        self.title = title;
        self
    }

    pub fn menu(mut self, menu: MenuState) -> Self {
        self.menu = menu;
        self
    }

    pub fn banner(mut self, banner: Option<Markup>) -> Self {
        self.banner = banner;
        self
    }

    fn navigation(&self) -> Markup {
        html! {
            @for group in self.groups {
                section class="menu-group" {
                    h2 { (group.title) }
                    ul {
                        @for item in &group.items {
                            @if let Some(url) = item.url.as_deref() {
                                @let active = url == self.current_path;
                                li {
                                    a href=(url)
                                        class=[active.then_some("active")]
                                        aria-current=[active.then_some("page")] { (item.title) }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    pub fn render(&self, content: Markup) -> Markup {
        let toggle = format!("{}?menu={}", self.current_path, self.menu.toggle().as_str());
        let expanded = if self.menu == MenuState::Open { "true" } else { "false" };
        let body = html! {
            div class="dashboard" data-role=(self.identity.role.as_str()) {
                header class="dashboard-header" {
                    a class="menu-toggle" href=(toggle) aria-expanded=(expanded) { "Menu" }
                    span class="caller" { (self.identity.display_name()) }
                    form method="post" action="/logout" {
                        button type="submit" { "Log out" }
                    }
                }
                nav class="sidebar" data-state=(self.menu.as_str()) { (self.navigation()) }
                main class="content" {
                    h1 { (self.title) }
                    @if let Some(banner) = &self.banner {
                        (banner)
                    }
                    (content)
                }
            }
        };

        markup::page(self.title, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::Role, navigation::RoleRegistry};

    fn agent() -> Identity {
        Identity {
            id: "a-1".to_string(),
            name: None,
            email: "agent@example.com".to_string(),
            role: Role::Agent,
        }
    }

    #[test]
    fn menu_starts_closed_and_toggles() {
        assert_eq!(MenuState::default(), MenuState::Closed);
        assert_eq!(MenuState::Closed.toggle(), MenuState::Open);
        assert_eq!(MenuState::Open.toggle(), MenuState::Closed);
        assert_eq!(MenuState::from_query(Some("open")), MenuState::Open);
        assert_eq!(MenuState::from_query(Some("sideways")), MenuState::Closed);
        assert_eq!(MenuState::from_query(None), MenuState::Closed);
    }

    #[test]
    fn only_the_current_route_is_active() {
        let registry = RoleRegistry::builtin();
        let identity = agent();
        let html = DashboardShell::new(&identity, registry.groups(Role::Agent), "/agent/cash-out")
            .title("Cash Out")
            .render(html! { p { "body" } })
            .into_string();

        assert!(html.contains(
            "<a href=\"/agent/cash-out\" class=\"active\" aria-current=\"page\">Cash Out</a>"
        ));
        assert!(html.contains("<a href=\"/agent/overview\">Overview</a>"));
        assert_eq!(html.matches("aria-current=\"page\"").count(), 1);
        assert!(html.contains("<p>body</p>"));
        assert!(html.contains("agent@example.com"));
    }

    #[test]
    fn groups_render_in_declaration_order() {
        let registry = RoleRegistry::builtin();
        let identity = agent();
        let html = DashboardShell::new(&identity, registry.groups(Role::Agent), "/agent/overview")
            .render(html! {})
            .into_string();
        let dashboard = html.find("<h2>Dashboard</h2>").unwrap();
        let wallet = html.find("<h2>Wallet Management</h2>").unwrap();
        let profile = html.find("<h2>Profile Management</h2>").unwrap();
        assert!(dashboard < wallet && wallet < profile);
    }

    #[test]
    fn open_menu_links_to_closing_it() {
        let registry = RoleRegistry::builtin();
        let identity = agent();
        let html = DashboardShell::new(&identity, registry.groups(Role::Agent), "/agent/overview")
            .menu(MenuState::Open)
            .render(html! {})
            .into_string();
        assert!(html.contains("data-state=\"open\""));
        assert!(html.contains("href=\"/agent/overview?menu=closed\""));
    }

    #[test]
    fn unknown_outcome_has_no_banner() {
        assert!(status_banner(Some("success"), None).is_some());
        assert!(status_banner(Some("weird"), None).is_none());
        assert!(status_banner(None, Some("DEP-1")).is_none());
    }

    #[test]
    fn success_banner_shows_the_escaped_reference() {
        let banner = status_banner(Some("success"), Some("DEP-<1>")).unwrap().into_string();
        assert!(banner.contains("Request completed. Reference: DEP-&lt;1&gt;"));

        let plain = status_banner(Some("success"), Some("")).unwrap().into_string();
        assert!(plain.contains("Request completed.</p>"));
    }

    #[test]
    fn caller_name_is_escaped() {
        let registry = RoleRegistry::builtin();
        let identity = Identity {
            name: Some("<b>Mallory</b>".to_string()),
            ..agent()
        };
        let html = DashboardShell::new(&identity, registry.groups(Role::Agent), "/agent/overview")
            .render(html! {})
            .into_string();
        assert!(html.contains("&lt;b&gt;Mallory&lt;/b&gt;"));
    }
}
