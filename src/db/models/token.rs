//! One-time token models.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Purpose a one-time token was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Activation,
    PasswordReset,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::PasswordReset => "password-reset",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record a token belongs to.
///
/// Stored as an `(owner_type, owner_id)` pair so further owner kinds can share
/// the table without a schema change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenOwner {
    User(i64),
}

impl TokenOwner {
    pub fn owner_type(&self) -> &'static str {
        match self {
            Self::User(_) => "User",
        }
    }

    pub fn owner_id(&self) -> i64 {
        match self {
            Self::User(id) => *id,
        }
    }

    pub fn from_parts(owner_type: &str, owner_id: i64) -> Option<Self> {
        match owner_type {
            "User" => Some(Self::User(owner_id)),
            _ => None,
        }
    }
}

/// Stored token row
#[derive(Debug, Clone, FromRow)]
pub struct TokenRecord {
    pub id: i64,
    pub value: String,
    pub kind: String,
    pub owner_type: String,
    pub owner_id: i64,
    pub expires_at: String,
    pub created_at: String,
}

impl TokenRecord {
    pub fn owner(&self) -> Option<TokenOwner> {
        TokenOwner::from_parts(&self.owner_type, self.owner_id)
    }

    /// Parsed expiry; an unparseable timestamp counts as already expired
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&self.expires_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }
}
