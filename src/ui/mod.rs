// Server-rendered pages: Askama templates plus the data every page shares

mod templates;

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::auth::ResolvedSession;

pub use templates::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Error,
    Info,
    Success,
}

impl MessageKind {
    pub fn css_class(&self) -> &'static str {
        match self {
            MessageKind::Error => "error",
            MessageKind::Info => "info",
            MessageKind::Success => "success",
        }
    }
}

/// Flash message shown above a page's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub content: String,
}

/// Fields the base layout needs on every page
#[derive(Debug, Clone)]
pub struct PageContext {
    pub title: String,
    pub messages: Vec<Message>,
    pub is_authenticated: bool,
    pub is_admin: bool,
}

impl PageContext {
    pub fn new(title: &str, session: Option<&ResolvedSession>) -> Self {
        Self {
            title: title.to_string(),
            messages: Vec::new(),
            is_authenticated: session.is_some(),
            is_admin: session.is_some_and(ResolvedSession::is_admin),
        }
    }

    pub fn anonymous(title: &str) -> Self {
        Self::new(title, None)
    }

    pub fn push(&mut self, kind: MessageKind, content: impl Into<String>) {
        self.messages.push(Message {
            kind,
            content: content.into(),
        });
    }

    pub fn with_error(mut self, content: impl Into<String>) -> Self {
        self.push(MessageKind::Error, content);
        self
    }

    pub fn with_success(mut self, content: impl Into<String>) -> Self {
        self.push(MessageKind::Success, content);
        self
    }
}

// Helper to render templates and handle errors
pub fn render_template<T: Template>(template: T) -> Response {
    render_with_status(StatusCode::OK, template)
}

pub fn render_with_status<T: Template>(status: StatusCode, template: T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Template rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_page_context_reflects_session() {
        let admin = ResolvedSession {
            user_id: 1,
            roles: vec!["admin".to_string(), "user".to_string()],
            expires_at: Utc::now(),
        };
        let page = PageContext::new("Home", Some(&admin));
        assert!(page.is_authenticated);
        assert!(page.is_admin);

        let page = PageContext::anonymous("Home").with_error("nope");
        assert!(!page.is_authenticated);
        assert_eq!(page.messages[0].kind.css_class(), "error");
    }

    #[test]
    fn test_messages_are_escaped() {
        let page = PageContext::anonymous("Login").with_error("<script>alert(1)</script>");
        let html = LoginTemplate {
            page,
            email: String::new(),
        }
        .render()
        .unwrap();
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
