//! Login, logout and registration pages.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use super::activation::send_activation_email;
use super::error::PageError;
use super::middleware::{removal_cookie, session_cookie, CurrentSession, SESSION_COOKIE};
use super::validation::{validate_email, validate_password};
use crate::auth::{authenticate, password, LoginError};
use crate::db::{users, ROLE_USER};
use crate::notifications;
use crate::ui::{render_template, render_with_status, LoginTemplate, PageContext, RegisterTemplate};
use crate::AppState;

pub const LOGIN_ERROR: &str = "Could not login, please make sure that you have typed in the correct email and password. If you have forgotten your password, please click the forgot password link below.";
pub const NOT_ACTIVATED: &str = "Account is not activated yet.";
pub const REGISTER_ERROR: &str = "Could not register, please make sure the details you have provided are correct and that you do not already have an existing account.";
pub const REGISTER_SUCCESS: &str = "Thank you for registering. An activation email has been sent with steps describing how to activate your account.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
}

pub async fn login_page() -> Response {
    render_template(LoginTemplate {
        page: PageContext::anonymous("Login"),
        email: String::new(),
    })
}

pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let email = form.email.trim().to_string();

    match authenticate(&state.db, &state.sessions, &email, &form.password).await {
        Ok(success) => {
            let jar = jar.add(session_cookie(&state, success.session_id));
            (jar, Redirect::to("/")).into_response()
        }
        Err(err) => {
            let (status, message) = match &err {
                LoginError::InvalidCredentials => (StatusCode::BAD_REQUEST, LOGIN_ERROR),
                LoginError::NotActivated => (StatusCode::BAD_REQUEST, NOT_ACTIVATED),
                LoginError::Internal(e) => {
                    tracing::error!(error = %e, "Login failed");
                    (StatusCode::INTERNAL_SERVER_ERROR, LOGIN_ERROR)
                }
            };
            render_with_status(
                status,
                LoginTemplate {
                    page: PageContext::anonymous("Login").with_error(message),
                    email,
                },
            )
        }
    }
}

/// Delete the session row and clear the cookie, then go home.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    session: CurrentSession,
    jar: CookieJar,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.invalidate(cookie.value()).await;
    }
    if let Some(current) = session.get() {
        tracing::info!(user_id = current.user_id, "User logged out");
    }

    let jar = jar.remove(removal_cookie());
    (jar, Redirect::to("/")).into_response()
}

pub async fn register_page() -> Response {
    render_template(RegisterTemplate {
        page: PageContext::anonymous("Register"),
        email: String::new(),
    })
}

pub async fn register_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CredentialsForm>,
) -> Result<Response, PageError> {
    let email = form.email.trim().to_string();
    let failed = |status: StatusCode, message: &str, email: String| {
        render_with_status(
            status,
            RegisterTemplate {
                page: PageContext::anonymous("Register").with_error(message),
                email,
            },
        )
    };

    if let Err(err) = validate_password(&form.password) {
        return Ok(failed(err.status_code(), &err.public_message(), email));
    }

    // Hashed before any lookup so known and unknown emails take the same time
    let password_hash = password::hash_password_async(&form.password).await?;

    if let Err(reason) = validate_email(&email) {
        tracing::debug!(reason = %reason, "Registration rejected");
        return Ok(failed(StatusCode::BAD_REQUEST, REGISTER_ERROR, email));
    }

    if users::find_by_email(&state.db, &email).await?.is_some() {
        tracing::debug!("Registration rejected: email already registered");
        return Ok(failed(StatusCode::BAD_REQUEST, REGISTER_ERROR, email));
    }

    let user = match users::create(&state.db, &email, &password_hash, &[ROLE_USER]).await {
        Ok(user) => user,
        Err(e) => {
            // Includes losing a race on the unique email index
            tracing::error!(error = %e, "Failed to create user");
            return Ok(failed(StatusCode::INTERNAL_SERVER_ERROR, REGISTER_ERROR, email));
        }
    };
    tracing::info!(user_id = user.id, "User registered");

    notifications::dispatch(
        "activation",
        send_activation_email(state.clone(), user.id, user.email),
    );

    Ok(render_template(RegisterTemplate {
        page: PageContext::anonymous("Register").with_success(REGISTER_SUCCESS),
        email: String::new(),
    }))
}
