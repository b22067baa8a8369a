//! One-time tokens for account activation and password reset.
//!
//! A token moves from issued to redeemed (row deleted), superseded (row
//! deleted when a fresh one is requested) or expired. Expired rows are left in
//! place; redeeming them fails with [`AuthError::Expired`] and the periodic
//! purge removes them.

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::AuthError;
use crate::db::{format_timestamp, TokenKind, TokenOwner, TokenRecord};
use crate::DbPool;

/// Upper bound on generate-check-insert rounds before issuance gives up
pub const MAX_ISSUE_ATTEMPTS: u32 = 5;

/// A token as handed to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub kind: TokenKind,
    pub owner: TokenOwner,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    fn from_record(record: &TokenRecord, kind: TokenKind, owner: TokenOwner) -> Self {
        Self {
            value: record.value.clone(),
            kind,
            owner,
            expires_at: record.expires_at(),
        }
    }
}

/// New ULID string: 128 bits, lexically sortable by creation time
fn generate_token_value() -> String {
    ulid::Ulid::new().to_string()
}

#[derive(Clone)]
pub struct TokenManager {
    db: DbPool,
    ttl: chrono::Duration,
    generate: fn() -> String,
}

impl TokenManager {
    pub fn new(db: DbPool, ttl: Duration) -> Self {
        Self {
            db,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::minutes(10)),
            generate: generate_token_value,
        }
    }

    /// Replace the value generator (collision tests)
    #[cfg(test)]
    fn with_generator(mut self, generate: fn() -> String) -> Self {
        self.generate = generate;
        self
    }

    /// Issue a token for `owner`, valid for the configured TTL.
    ///
    /// The value is checked against every stored token before insert; on a
    /// collision or an insert that reports no rows, a new value is drawn. After
    /// [`MAX_ISSUE_ATTEMPTS`] rounds this fails with `TokenIssuance`.
    pub async fn issue(&self, kind: TokenKind, owner: TokenOwner) -> Result<Token, AuthError> {
        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let value = (self.generate)();

            let existing: Option<i64> =
                sqlx::query_scalar("SELECT id FROM tokens WHERE value = ? LIMIT 1")
                    .bind(&value)
                    .fetch_optional(&self.db)
                    .await?;
            if existing.is_some() {
                tracing::warn!(attempt, kind = %kind, "Token value collision, regenerating");
                continue;
            }

            let now = Utc::now();
            let expires_at = now + self.ttl;
            let result = sqlx::query(
                "INSERT INTO tokens (value, kind, owner_type, owner_id, expires_at, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&value)
            .bind(kind.as_str())
            .bind(owner.owner_type())
            .bind(owner.owner_id())
            .bind(format_timestamp(expires_at))
            .bind(format_timestamp(now))
            .execute(&self.db)
            .await?;

            if result.rows_affected() == 0 {
                tracing::warn!(attempt, kind = %kind, "Token insert affected no rows, regenerating");
                continue;
            }

            tracing::debug!(kind = %kind, owner_id = owner.owner_id(), "Issued token");
            return Ok(Token {
                value,
                kind,
                owner,
                expires_at,
            });
        }

        Err(AuthError::TokenIssuance {
            attempts: MAX_ISSUE_ATTEMPTS,
        })
    }

    /// Consume a token and return its owner.
    ///
    /// Fails with `NotFound` for unknown values (or values of another kind) and
    /// with `Expired` once past the expiry, in which case the row is kept. The
    /// caller's follow-up write is not in the same transaction: if it fails
    /// the token is already spent.
    pub async fn redeem(&self, kind: TokenKind, value: &str) -> Result<TokenOwner, AuthError> {
        let record: Option<TokenRecord> =
            sqlx::query_as("SELECT * FROM tokens WHERE value = ? AND kind = ? LIMIT 1")
                .bind(value)
                .bind(kind.as_str())
                .fetch_optional(&self.db)
                .await?;

        let record = record.ok_or(AuthError::NotFound)?;

        if record.has_expired(Utc::now()) {
            return Err(AuthError::Expired);
        }

        let owner = record.owner().ok_or_else(|| {
            tracing::error!(owner_type = %record.owner_type, "Token has unknown owner type");
            AuthError::NotFound
        })?;

        // A concurrent redemption may have deleted the row first; only one wins.
        let deleted = sqlx::query("DELETE FROM tokens WHERE id = ?")
            .bind(record.id)
            .execute(&self.db)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(AuthError::NotFound);
        }

        Ok(owner)
    }

    /// Newest unexpired token of `kind` for `owner`.
    ///
    /// Expired rows count as absent, and lookup errors are logged and reported
    /// as absent so the caller falls back to issuing a fresh token.
    pub async fn find_active(&self, kind: TokenKind, owner: TokenOwner) -> Option<Token> {
        let result: Result<Option<TokenRecord>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT * FROM tokens
            WHERE owner_type = ? AND owner_id = ? AND kind = ? AND expires_at > ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(owner.owner_type())
        .bind(owner.owner_id())
        .bind(kind.as_str())
        .bind(format_timestamp(Utc::now()))
        .fetch_optional(&self.db)
        .await;

        match result {
            Ok(record) => record.map(|r| Token::from_record(&r, kind, owner)),
            Err(e) => {
                tracing::error!(error = %e, kind = %kind, "Failed to look up active token");
                None
            }
        }
    }

    /// Delete every token of `kind` held by `owner`
    pub async fn supersede(&self, kind: TokenKind, owner: TokenOwner) -> Result<u64, AuthError> {
        let result =
            sqlx::query("DELETE FROM tokens WHERE owner_type = ? AND owner_id = ? AND kind = ?")
                .bind(owner.owner_type())
                .bind(owner.owner_id())
                .bind(kind.as_str())
                .execute(&self.db)
                .await?;
        Ok(result.rows_affected())
    }

    /// Remove expired tokens of every kind
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM tokens WHERE expires_at < ?")
            .bind(format_timestamp(Utc::now()))
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}
