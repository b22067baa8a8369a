//! User and role models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Name of the role every registered account receives
pub const ROLE_USER: &str = "user";

/// Name of the role that unlocks the admin pages
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// `None` until the account has been activated through an emailed token
    pub activated_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn is_activated(&self) -> bool {
        self.activated_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: String,
}
