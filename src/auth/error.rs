use axum::http::StatusCode;
use thiserror::Error;

/// Message shown for any missing, stale or already used token or session
pub const GENERIC_RETRY_MESSAGE: &str = "Something went wrong, please try again.";

/// Body of a throttled response
pub const THROTTLED_MESSAGE: &str = "Too many requests. Please wait a minute and try again.";

#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input; the message is safe to show to the user
    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("expired")]
    Expired,

    #[error("storage error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("could not issue a unique token after {attempts} attempts")]
    TokenIssuance { attempts: u32 },

    #[error("too many requests")]
    ThrottleExceeded,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::NotFound | Self::Expired => StatusCode::BAD_REQUEST,
            Self::Persistence(_) | Self::Hashing(_) | Self::TokenIssuance { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::ThrottleExceeded => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Text that may be shown to the client.
    ///
    /// `NotFound` and `Expired` are indistinguishable here; server faults never
    /// expose their cause.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::NotFound | Self::Expired => GENERIC_RETRY_MESSAGE.to_string(),
            Self::Persistence(_) | Self::Hashing(_) | Self::TokenIssuance { .. } => {
                "An internal error occurred, please try again later.".to_string()
            }
            Self::ThrottleExceeded => THROTTLED_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_and_expired_look_the_same() {
        assert_eq!(AuthError::NotFound.public_message(), AuthError::Expired.public_message());
        assert_eq!(AuthError::NotFound.status_code(), AuthError::Expired.status_code());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::Persistence(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AuthError::TokenIssuance { attempts: 5 }.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AuthError::ThrottleExceeded.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_server_faults_hide_details() {
        let err = AuthError::Persistence(sqlx::Error::PoolTimedOut);
        assert!(!err.public_message().contains("pool"));
        assert!(err.to_string().contains("pool"));
    }

    #[test]
    fn test_validation_message_passes_through() {
        let err = AuthError::Validation("Your password must be 8 characters in length or longer".into());
        assert_eq!(err.public_message(), err.to_string());
    }
}
