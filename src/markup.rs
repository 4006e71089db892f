//! Small `maud` building blocks shared by the public pages, the dashboard
//! shell and the views. Spliced values are escaped by the `html!` macro.

use maud::{DOCTYPE, Markup, html};

/// Wraps a body fragment into a complete document.
pub fn page(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " | E-Wallet" }
            }
            body { (body) }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

impl NoticeKind {
    fn class(self) -> &'static str {
        match self {
            NoticeKind::Info => "notice notice-info",
            NoticeKind::Success => "notice notice-success",
            NoticeKind::Error => "notice notice-error",
        }
    }
}

pub fn notice(kind: NoticeKind, message: &str) -> Markup {
    html! {
        p class=(kind.class()) role="status" { (message) }
    }
}

/// The neutral placeholder shown while a guarded view waits for the caller's
/// identity. Contains nothing from the protected view.
pub fn loading() -> Markup {
    html! {
        div class="guard-loading" role="status" aria-busy="true" { "Loading..." }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_escapes_title_but_not_markup_body() {
        let html = page("<Home>", html! { main { "ok" } }).into_string();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>&lt;Home&gt; | E-Wallet</title>"));
        assert!(html.contains("<main>ok</main>"));
    }

    #[test]
    fn notice_escapes_its_message() {
        let html = notice(NoticeKind::Error, r#"<a href="x">Tom & Jerry</a>"#).into_string();
        assert_eq!(
            html,
            "<p class=\"notice notice-error\" role=\"status\">\
             &lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&lt;/a&gt;</p>"
        );
    }

    #[test]
    fn loading_placeholder_is_neutral() {
        assert_eq!(
            loading().into_string(),
            "<div class=\"guard-loading\" role=\"status\" aria-busy=\"true\">Loading...</div>"
        );
    }
}
