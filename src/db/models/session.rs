//! Login session model.

use sqlx::FromRow;

/// Stored session row.
///
/// `roles` is a snapshot of the user's role names taken at login, joined with
/// commas. It is not updated when the user's roles change later.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: i64,
    pub token_hash: String,
    pub user_id: i64,
    pub roles: String,
    pub expires_at: String,
    pub created_at: String,
}
