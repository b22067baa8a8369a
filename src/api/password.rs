//! Forgotten password: request a reset link, then set a new password with it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Form,
};
use serde::Deserialize;
use std::sync::Arc;

use super::activation::EmailForm;
use super::validation::validate_password;
use crate::auth::{password, AuthError};
use crate::db::{users, TokenKind, TokenOwner};
use crate::notifications::{self, password_reset_link, Email};
use crate::ui::{
    render_template, render_with_status, ForgotPasswordTemplate, PageContext,
    ResetPasswordTemplate,
};
use crate::AppState;

pub const FORGOT_SUCCESS: &str =
    "An email with instructions describing how to reset your password has been sent.";
pub const RESET_ERROR: &str = "Could not reset password, please try again";
pub const RESET_SUCCESS: &str = "Your password has successfully been reset.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewPasswordForm {
    pub password: String,
}

pub async fn forgot_page() -> Response {
    render_template(ForgotPasswordTemplate {
        page: PageContext::anonymous("Forgot Password"),
    })
}

/// The response never depends on the email; lookup and mailing run detached.
pub async fn forgot_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EmailForm>,
) -> Response {
    let email = form.email.trim().to_string();
    if !email.is_empty() {
        notifications::dispatch("password-reset", send_reset_email(state, email));
    }

    render_template(ForgotPasswordTemplate {
        page: PageContext::anonymous("Forgot Password").with_success(FORGOT_SUCCESS),
    })
}

/// Replace any outstanding reset token with a fresh one and mail it.
/// Only activated accounts receive a link.
async fn send_reset_email(state: Arc<AppState>, email: String) -> anyhow::Result<()> {
    let Some(user) = users::find_by_email(&state.db, &email).await? else {
        tracing::debug!("Password reset requested for unknown email");
        return Ok(());
    };
    if !user.is_activated() {
        tracing::debug!(user_id = user.id, "Password reset requested for inactive account");
        return Ok(());
    }

    let owner = TokenOwner::User(user.id);
    let superseded = state.tokens.supersede(TokenKind::PasswordReset, owner).await?;
    if superseded > 0 {
        tracing::debug!(user_id = user.id, superseded, "Replaced earlier reset tokens");
    }
    let token = state.tokens.issue(TokenKind::PasswordReset, owner).await?;

    let link = password_reset_link(&state.settings().base_url, &token.value)?;
    let message = Email::password_reset(&link);
    state
        .mailer
        .send(&user.email, &message.subject, &message.body)
        .await
}

pub async fn reset_page(Path(token): Path<String>) -> Response {
    render_template(ResetPasswordTemplate {
        page: PageContext::anonymous("Reset Password"),
        token,
    })
}

pub async fn reset_submit(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Form(form): Form<NewPasswordForm>,
) -> Response {
    let render = |status: StatusCode, page: PageContext, token: String| {
        render_with_status(status, ResetPasswordTemplate { page, token })
    };

    // Checked before redeeming so a rejected password does not spend the token
    if let Err(err) = validate_password(&form.password) {
        let page = PageContext::anonymous("Reset Password").with_error(err.public_message());
        return render(err.status_code(), page, token);
    }

    match reset_owner_password(&state, &token, &form.password).await {
        Ok(user_id) => {
            tracing::info!(user_id, "Password reset");
            let page = PageContext::anonymous("Reset Password").with_success(RESET_SUCCESS);
            render(StatusCode::OK, page, token)
        }
        Err(err) => {
            match &err {
                AuthError::NotFound | AuthError::Expired => {
                    tracing::info!(reason = %err, "Password reset refused")
                }
                _ => tracing::error!(error = %err, "Password reset failed"),
            }
            let page = PageContext::anonymous("Reset Password").with_error(RESET_ERROR);
            render(err.status_code(), page, token)
        }
    }
}

async fn reset_owner_password(
    state: &AppState,
    token: &str,
    new_password: &str,
) -> Result<i64, AuthError> {
    let password_hash = password::hash_password_async(new_password).await?;
    let TokenOwner::User(user_id) = state.tokens.redeem(TokenKind::PasswordReset, token).await?;

    if !users::set_password_hash(&state.db, user_id, &password_hash).await? {
        tracing::warn!(user_id, "Reset token owner no longer exists");
        return Err(AuthError::NotFound);
    }
    Ok(user_id)
}
