//! Account activation: the emailed link and the resend form.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Form,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::AuthError;
use crate::db::{users, TokenKind, TokenOwner};
use crate::notifications::{self, activation_link, Email};
use crate::ui::{
    render_template, render_with_status, ActivateTemplate, PageContext, ResendActivationTemplate,
};
use crate::AppState;

pub const ACTIVATION_ERROR: &str = "Please provide a valid activation token";
pub const ACTIVATION_SUCCESS: &str = "Account activated. You may now proceed to login to your account.";
pub const RESEND_SUCCESS: &str = "A new activation email has been sent if the account exists and is not already activated. Please remember to check your spam inbox in case the email is not showing in your inbox.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EmailForm {
    pub email: String,
}

/// Redeem an activation token and mark its owner activated
pub async fn activate(State(state): State<Arc<AppState>>, Path(token): Path<String>) -> Response {
    match activate_owner(&state, &token).await {
        Ok(user_id) => {
            tracing::info!(user_id, "Account activated");
            render_template(ActivateTemplate {
                page: PageContext::anonymous("Activate").with_success(ACTIVATION_SUCCESS),
            })
        }
        Err(err) => {
            match &err {
                AuthError::NotFound | AuthError::Expired => {
                    tracing::info!(reason = %err, "Activation refused")
                }
                _ => tracing::error!(error = %err, "Activation failed"),
            }
            render_with_status(
                err.status_code(),
                ActivateTemplate {
                    page: PageContext::anonymous("Activate").with_error(ACTIVATION_ERROR),
                },
            )
        }
    }
}

async fn activate_owner(state: &AppState, token: &str) -> Result<i64, AuthError> {
    let TokenOwner::User(user_id) = state.tokens.redeem(TokenKind::Activation, token).await?;

    // The token is spent at this point even if the update below fails
    if !users::set_activated(&state.db, user_id).await? {
        tracing::warn!(user_id, "Activation token owner no longer exists");
        return Err(AuthError::NotFound);
    }
    Ok(user_id)
}

pub async fn resend_page() -> Response {
    render_template(ResendActivationTemplate {
        page: PageContext::anonymous("Resend Activation Email"),
    })
}

/// Always answers with the same page; the lookup and mailing run detached.
pub async fn resend_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EmailForm>,
) -> Response {
    let email = form.email.trim().to_string();
    if !email.is_empty() {
        notifications::dispatch("activation-resend", resend_activation_email(state, email));
    }

    render_with_status(
        StatusCode::OK,
        ResendActivationTemplate {
            page: PageContext::anonymous("Resend Activation Email").with_success(RESEND_SUCCESS),
        },
    )
}

/// Issue a fresh activation token and mail it
pub async fn send_activation_email(
    state: Arc<AppState>,
    user_id: i64,
    email: String,
) -> anyhow::Result<()> {
    let token = state
        .tokens
        .issue(TokenKind::Activation, TokenOwner::User(user_id))
        .await?;
    deliver(&state, &email, &token.value).await
}

/// Mail the pending activation token again, or a new one if none is still valid
async fn resend_activation_email(state: Arc<AppState>, email: String) -> anyhow::Result<()> {
    let Some(user) = users::find_by_email(&state.db, &email).await? else {
        tracing::debug!("Activation resend for unknown email");
        return Ok(());
    };
    if user.is_activated() {
        tracing::debug!(user_id = user.id, "Activation resend for active account");
        return Ok(());
    }

    let owner = TokenOwner::User(user.id);
    let value = match state.tokens.find_active(TokenKind::Activation, owner).await {
        Some(token) => token.value,
        None => state.tokens.issue(TokenKind::Activation, owner).await?.value,
    };
    deliver(&state, &user.email, &value).await
}

async fn deliver(state: &AppState, email: &str, token: &str) -> anyhow::Result<()> {
    let link = activation_link(&state.settings().base_url, token)?;
    let message = Email::activation(&link);
    state.mailer.send(email, &message.subject, &message.body).await
}
