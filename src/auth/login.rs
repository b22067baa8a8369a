//! Credential check that precedes session creation.

use thiserror::Error;

use super::{password, AuthError, SessionManager};
use crate::db::{users, User};
use crate::DbPool;

#[derive(Debug, Error)]
pub enum LoginError {
    /// Unknown email, wrong password or an account without roles
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Correct password for an account that was never activated
    #[error("account not activated")]
    NotActivated,

    #[error(transparent)]
    Internal(#[from] AuthError),
}

impl From<sqlx::Error> for LoginError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(AuthError::Persistence(err))
    }
}

#[derive(Debug)]
pub struct LoginSuccess {
    pub user: User,
    pub roles: Vec<String>,
    /// Identifier for the client cookie
    pub session_id: String,
}

/// Check the credentials and open a session.
///
/// The password is always verified, against a dummy digest when the email is
/// unknown, before any account state is looked at. Only a caller who knows the
/// password learns that the account is not yet activated.
pub async fn authenticate(
    db: &DbPool,
    sessions: &SessionManager,
    email: &str,
    password: &str,
) -> Result<LoginSuccess, LoginError> {
    let user = users::find_by_email(db, email).await?;

    let password_ok = match &user {
        Some(user) => password::verify_password_async(password, &user.password_hash).await?,
        None => password::dummy_verify_async(password).await?,
    };

    let user = match user {
        Some(user) if password_ok => user,
        _ => {
            tracing::debug!(email = %email, "Login rejected: unknown email or wrong password");
            return Err(LoginError::InvalidCredentials);
        }
    };

    if !user.is_activated() {
        tracing::debug!(user_id = user.id, "Login rejected: account not activated");
        return Err(LoginError::NotActivated);
    }

    let roles = users::role_names(db, user.id).await?;
    if roles.is_empty() {
        tracing::warn!(user_id = user.id, "Login rejected: account has no roles");
        return Err(LoginError::InvalidCredentials);
    }

    let session_id = sessions.create(user.id, &roles).await?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok(LoginSuccess {
        user,
        roles,
        session_id,
    })
}
