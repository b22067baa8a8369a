//! Input validation for form submissions.

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use crate::auth::password::MIN_PASSWORD_LENGTH;
use crate::auth::AuthError;

lazy_static! {
    /// Pragmatic email shape: one `@`, no whitespace, a dot in the domain
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^@\s]+@[^@\s]+\.[^@\s]+$"
    ).unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.is_empty() {
        return Err(AuthError::Validation("Email is required".to_string()));
    }

    if email.len() > 254 {
        return Err(AuthError::Validation(
            "Email is too long (max 254 characters)".to_string(),
        ));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(AuthError::Validation("Invalid email format".to_string()));
    }

    Ok(())
}

/// Validate a new password
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "Your password must be {} characters in length or longer",
            MIN_PASSWORD_LENGTH
        )));
    }

    Ok(())
}

/// Validate the public base URL used in emailed links
pub fn validate_base_url(base_url: &str) -> Result<(), String> {
    let url = Url::parse(base_url).map_err(|e| format!("Invalid base URL: {}", e))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err("Base URL must use http or https".to_string());
    }

    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err("Base URL must include a host".to_string());
    }

    Ok(())
}

/// Validate the throttle limit entered on the configuration page
pub fn validate_requests_per_minute(value: &str) -> Result<u32, String> {
    match value.trim().parse::<u32>() {
        Ok(0) => Err("Requests per minute must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("Can't convert to integer: {}", value)),
    }
}
