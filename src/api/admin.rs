//! Admin pages: overview, runtime configuration and log level.

use axum::{extract::State, http::StatusCode, response::Response, Form};
use serde::Deserialize;
use std::sync::Arc;

use super::error::PageError;
use super::middleware::CurrentSession;
use super::validation::{validate_base_url, validate_email, validate_requests_per_minute};
use crate::config::RuntimeSettings;
use crate::db::users;
use crate::logging::LEVELS;
use crate::ui::{
    render_template, render_with_status, AdminTemplate, ConfigTemplate, LevelOption, MessageKind,
    PageContext,
};
use crate::AppState;

/// Overview of accounts and sessions
pub async fn admin_page(
    State(state): State<Arc<AppState>>,
    session: CurrentSession,
) -> Result<Response, PageError> {
    let current = session
        .get()
        .ok_or_else(|| PageError::new(StatusCode::UNAUTHORIZED, "Not signed in"))?;

    let stats = users::stats(&state.db).await?;
    let active_sessions = state.sessions.count_active().await?;
    let email = users::find_by_id(&state.db, current.user_id)
        .await?
        .map(|user| user.email)
        .unwrap_or_default();

    Ok(render_template(AdminTemplate {
        page: PageContext::new("Admin", Some(current)),
        stats,
        active_sessions,
        email,
        roles: current.roles.join(", "),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigForm {
    pub base_url: String,
    pub smtp_host: String,
    pub smtp_port: String,
    pub smtp_username: String,
    /// Empty keeps the stored password
    pub smtp_password: String,
    pub from_address: String,
    pub from_name: String,
    pub requests_per_minute: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LogLevelForm {
    pub level: String,
}

fn config_template(state: &AppState, page: PageContext) -> ConfigTemplate {
    let settings = state.settings();
    let current_level = state.log_level.current();
    let email = &settings.email;

    ConfigTemplate {
        page,
        base_url: settings.base_url.clone(),
        smtp_host: email.smtp_host.clone().unwrap_or_default(),
        smtp_port: email.smtp_port,
        smtp_username: email.smtp_username.clone().unwrap_or_default(),
        smtp_password_set: email.smtp_password.is_some(),
        from_address: email.from_address.clone().unwrap_or_default(),
        from_name: email.from_name.clone(),
        requests_per_minute: settings.requests_per_minute,
        log_levels: LEVELS
            .iter()
            .map(|&name| LevelOption {
                name,
                selected: name == current_level,
            })
            .collect(),
    }
}

pub async fn config_page(State(state): State<Arc<AppState>>, session: CurrentSession) -> Response {
    let page = PageContext::new("Configuration", session.get());
    render_template(config_template(&state, page))
}

/// Empty input clears an optional setting
fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Apply the submitted values that changed, reporting each change or rejection
pub fn apply_config_form(
    current: &RuntimeSettings,
    form: &ConfigForm,
    page: &mut PageContext,
) -> RuntimeSettings {
    let mut next = current.clone();

    let base_url = form.base_url.trim();
    if base_url != next.base_url {
        match validate_base_url(base_url) {
            Ok(()) => {
                tracing::info!(new_value = %base_url, "Base URL changed");
                next.base_url = base_url.to_string();
                page.push(MessageKind::Success, "Base URL changed");
            }
            Err(message) => page.push(MessageKind::Error, message),
        }
    }

    let smtp_host = optional(&form.smtp_host);
    if smtp_host != next.email.smtp_host {
        tracing::info!(new_value = ?smtp_host, "SMTP host changed");
        next.email.smtp_host = smtp_host;
        page.push(MessageKind::Success, "SMTP host changed");
    }

    match form.smtp_port.trim().parse::<u16>() {
        Ok(port) if port != next.email.smtp_port => {
            tracing::info!(new_value = port, "SMTP port changed");
            next.email.smtp_port = port;
            page.push(MessageKind::Success, "SMTP port changed");
        }
        Ok(_) => {}
        Err(_) => page.push(
            MessageKind::Error,
            format!("Can't convert to a port number: {}", form.smtp_port),
        ),
    }

    let smtp_username = optional(&form.smtp_username);
    if smtp_username != next.email.smtp_username {
        tracing::info!(new_value = ?smtp_username, "SMTP username changed");
        next.email.smtp_username = smtp_username;
        page.push(MessageKind::Success, "SMTP username changed");
    }

    if let Some(password) = optional(&form.smtp_password) {
        if next.email.smtp_password.as_deref() != Some(password.as_str()) {
            tracing::info!("SMTP password changed");
            next.email.smtp_password = Some(password);
            page.push(MessageKind::Success, "SMTP password changed");
        }
    }

    let from_address = optional(&form.from_address);
    if from_address != next.email.from_address {
        match from_address.as_deref().map(validate_email).transpose() {
            Ok(_) => {
                tracing::info!(new_value = ?from_address, "SMTP sender changed");
                next.email.from_address = from_address;
                page.push(MessageKind::Success, "SMTP sender changed");
            }
            Err(err) => page.push(MessageKind::Error, err.public_message()),
        }
    }

    let from_name = form.from_name.trim();
    if !from_name.is_empty() && from_name != next.email.from_name {
        tracing::info!(new_value = %from_name, "Sender name changed");
        next.email.from_name = from_name.to_string();
        page.push(MessageKind::Success, "Sender name changed");
    }

    match validate_requests_per_minute(&form.requests_per_minute) {
        Ok(limit) if limit != next.requests_per_minute => {
            next.requests_per_minute = limit;
            page.push(MessageKind::Success, "Requests per minute changed");
        }
        Ok(_) => {}
        Err(message) => page.push(MessageKind::Error, message),
    }

    next
}

pub async fn config_submit(
    State(state): State<Arc<AppState>>,
    session: CurrentSession,
    Form(form): Form<ConfigForm>,
) -> Response {
    let mut page = PageContext::new("Configuration", session.get());
    let current = state.settings();
    let next = apply_config_form(&current, &form, &mut page);

    if next.requests_per_minute != current.requests_per_minute {
        state.rate_limiter.set_limit(next.requests_per_minute);
    }
    state.settings.store(Arc::new(next));

    let status = if page.messages.iter().any(|m| m.kind == MessageKind::Error) {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    render_with_status(status, config_template(&state, page))
}

pub async fn log_level_submit(
    State(state): State<Arc<AppState>>,
    session: CurrentSession,
    Form(form): Form<LogLevelForm>,
) -> Response {
    let mut page = PageContext::new("Configuration", session.get());

    let status = match state.log_level.set(&form.level) {
        Ok(()) => {
            let level = state.log_level.current();
            tracing::info!(level = %level, "Log level changed");
            page.push(MessageKind::Success, format!("Logging level set to {}", level));
            StatusCode::OK
        }
        Err(e) => {
            tracing::warn!(error = %e, "Log level change rejected");
            page.push(MessageKind::Error, e.to_string());
            StatusCode::BAD_REQUEST
        }
    };

    render_with_status(status, config_template(&state, page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn form_for(settings: &RuntimeSettings) -> ConfigForm {
        ConfigForm {
            base_url: settings.base_url.clone(),
            smtp_host: settings.email.smtp_host.clone().unwrap_or_default(),
            smtp_port: settings.email.smtp_port.to_string(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: String::new(),
            from_name: settings.email.from_name.clone(),
            requests_per_minute: settings.requests_per_minute.to_string(),
        }
    }

    #[test]
    fn test_unchanged_form_changes_nothing() {
        let current = RuntimeSettings::from_config(&Config::default());
        let mut page = PageContext::anonymous("Configuration");

        let next = apply_config_form(&current, &form_for(&current), &mut page);
        assert!(page.messages.is_empty());
        assert_eq!(next.base_url, current.base_url);
        assert_eq!(next.requests_per_minute, 5);
    }

    #[test]
    fn test_changes_are_reported_per_field() {
        let current = RuntimeSettings::from_config(&Config::default());
        let mut form = form_for(&current);
        form.base_url = "https://auth.example.com/".to_string();
        form.smtp_host = "smtp.example.com".to_string();
        form.smtp_password = "secret".to_string();
        form.requests_per_minute = "12".to_string();

        let mut page = PageContext::anonymous("Configuration");
        let next = apply_config_form(&current, &form, &mut page);

        assert_eq!(next.base_url, "https://auth.example.com/");
        assert_eq!(next.email.smtp_host.as_deref(), Some("smtp.example.com"));
        assert_eq!(next.email.smtp_password.as_deref(), Some("secret"));
        assert_eq!(next.requests_per_minute, 12);
        assert_eq!(page.messages.len(), 4);
        assert!(page.messages.iter().all(|m| m.kind == MessageKind::Success));
    }

    #[test]
    fn test_invalid_values_are_rejected_individually() {
        let current = RuntimeSettings::from_config(&Config::default());
        let mut form = form_for(&current);
        form.base_url = "not a url".to_string();
        form.requests_per_minute = "lots".to_string();
        form.smtp_host = "smtp.example.com".to_string();

        let mut page = PageContext::anonymous("Configuration");
        let next = apply_config_form(&current, &form, &mut page);

        assert_eq!(next.base_url, current.base_url);
        assert_eq!(next.requests_per_minute, current.requests_per_minute);
        assert_eq!(next.email.smtp_host.as_deref(), Some("smtp.example.com"));
        let errors = page
            .messages
            .iter()
            .filter(|m| m.kind == MessageKind::Error)
            .count();
        assert_eq!(errors, 2);
    }
}
