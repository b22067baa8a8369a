//! Error page for failures a handler cannot turn into a form message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::auth::AuthError;
use crate::ui::{render_with_status, ErrorTemplate, PageContext};

/// Renders as an HTML error page. The cause is logged where the error is
/// created and never shown to the client.
#[derive(Debug)]
pub struct PageError {
    status: StatusCode,
    message: String,
}

impl PageError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Internal server error (500)
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "Request failed");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "An internal error occurred, please try again later.",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<sqlx::Error> for PageError {
    fn from(err: sqlx::Error) -> Self {
        Self::internal(format!("Database error: {}", err))
    }
}

impl From<AuthError> for PageError {
    fn from(err: AuthError) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            tracing::error!(error = %err, "Identity operation failed");
        }
        Self::new(status, err.public_message())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let title = if self.status.is_server_error() {
            "Error"
        } else {
            "Request failed"
        };
        let template = ErrorTemplate {
            page: PageContext::anonymous(title).with_error(self.message),
        };
        render_with_status(self.status, template)
    }
}

impl std::fmt::Display for PageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for PageError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_keep_their_status() {
        assert_eq!(PageError::from(AuthError::Expired).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            PageError::from(AuthError::TokenIssuance { attempts: 5 }).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_hides_cause() {
        let err = PageError::internal("disk on fire");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_renders_html_page() {
        let response = PageError::new(StatusCode::BAD_REQUEST, "Nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/html"));
    }
}
