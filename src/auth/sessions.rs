//! Login sessions.
//!
//! The client cookie carries a random identifier; only its SHA-256 digest is
//! stored, so a copy of the database cannot be replayed as cookies.

use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::time::Duration;

use super::AuthError;
use crate::db::{format_timestamp, Session, ROLE_ADMIN};
use crate::DbPool;

/// Generate a random session identifier
fn generate_session_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash an identifier for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Identity attached to a request whose session cookie resolved.
///
/// `roles` is the snapshot taken at login and does not follow later role edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    pub user_id: i64,
    pub roles: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

impl ResolvedSession {
    fn from_row(session: Session) -> Option<Self> {
        let expires_at = DateTime::parse_from_rfc3339(&session.expires_at)
            .ok()?
            .with_timezone(&Utc);
        Some(Self {
            user_id: session.user_id,
            roles: split_roles(&session.roles),
            expires_at,
        })
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN)
    }
}

fn split_roles(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Clone)]
pub struct SessionManager {
    db: DbPool,
    ttl: chrono::Duration,
}

impl SessionManager {
    pub fn new(db: DbPool, ttl: Duration) -> Self {
        Self {
            db,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1)),
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Persist a new session and return the identifier for the client cookie.
    ///
    /// On error nothing was stored and the client must not be treated as logged in.
    pub async fn create(&self, user_id: i64, roles: &[String]) -> Result<String, AuthError> {
        let identifier = generate_session_id();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, roles, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(hash_token(&identifier))
        .bind(user_id)
        .bind(roles.join(","))
        .bind(format_timestamp(now + self.ttl))
        .bind(format_timestamp(now))
        .execute(&self.db)
        .await?;

        tracing::debug!(user_id, roles = %roles.join(","), "Session created");
        Ok(identifier)
    }

    /// Look up a session. Unknown and expired sessions both resolve to `None`;
    /// expired rows are left for the purge task.
    pub async fn resolve(&self, identifier: &str) -> Result<Option<ResolvedSession>, AuthError> {
        let session: Option<Session> =
            sqlx::query_as("SELECT * FROM sessions WHERE token_hash = ?")
                .bind(hash_token(identifier))
                .fetch_optional(&self.db)
                .await?;

        let resolved = session
            .and_then(ResolvedSession::from_row)
            .filter(|s| Utc::now() <= s.expires_at);
        Ok(resolved)
    }

    /// Best-effort delete. The cookie is cleared by the caller regardless.
    pub async fn invalidate(&self, identifier: &str) {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(hash_token(identifier))
            .execute(&self.db)
            .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to delete session");
        }
    }

    /// Number of unexpired sessions
    pub async fn count_active(&self) -> Result<i64, AuthError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE expires_at > ?")
            .bind(format_timestamp(Utc::now()))
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// Remove expired sessions
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(format_timestamp(Utc::now()))
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_memory, users, ROLE_USER};

    async fn setup() -> (SessionManager, i64) {
        let db = connect_memory().await.unwrap();
        let user = users::create(&db, "a@b.com", "digest", &[ROLE_USER]).await.unwrap();
        (SessionManager::new(db, Duration::from_secs(3600)), user.id)
    }

    async fn expire_all(manager: &SessionManager) {
        sqlx::query("UPDATE sessions SET expires_at = ?")
            .bind(format_timestamp(Utc::now() - chrono::Duration::seconds(1)))
            .execute(&manager.db)
            .await
            .unwrap();
    }

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_then_resolve() {
        let (manager, user_id) = setup().await;
        let id = manager.create(user_id, &roles(&["user", "admin"])).await.unwrap();

        assert_eq!(id.len(), 64);
        let session = manager.resolve(&id).await.unwrap().unwrap();
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.roles, roles(&["user", "admin"]));
        assert!(session.is_admin());
        assert!(session.expires_at > Utc::now() + chrono::Duration::minutes(59));
    }

    #[tokio::test]
    async fn test_identifier_is_not_stored_in_clear() {
        let (manager, user_id) = setup().await;
        let id = manager.create(user_id, &roles(&["user"])).await.unwrap();

        let stored: String = sqlx::query_scalar("SELECT token_hash FROM sessions")
            .fetch_one(&manager.db)
            .await
            .unwrap();
        assert_ne!(stored, id);
        assert_eq!(stored, hash_token(&id));
    }

    #[tokio::test]
    async fn test_unknown_and_expired_resolve_to_none() {
        let (manager, user_id) = setup().await;
        assert!(manager.resolve("deadbeef").await.unwrap().is_none());

        let id = manager.create(user_id, &roles(&["user"])).await.unwrap();
        expire_all(&manager).await;
        assert!(manager.resolve(&id).await.unwrap().is_none());

        // resolve does not purge
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&manager.db)
            .await
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(manager.count_active().await.unwrap(), 0);
        assert_eq!(manager.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let (manager, user_id) = setup().await;
        let id = manager.create(user_id, &roles(&["user"])).await.unwrap();
        manager.invalidate(&id).await;
        assert!(manager.resolve(&id).await.unwrap().is_none());

        // unknown identifiers are a no-op
        manager.invalidate("not-a-session").await;
    }

    #[tokio::test]
    async fn test_role_snapshot_does_not_follow_user() {
        let (manager, user_id) = setup().await;
        let id = manager.create(user_id, &roles(&["user"])).await.unwrap();

        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) SELECT ?, id FROM roles WHERE name = 'admin'",
        )
        .bind(user_id)
        .execute(&manager.db)
        .await
        .unwrap();

        let session = manager.resolve(&id).await.unwrap().unwrap();
        assert!(!session.is_admin());
    }

    #[test]
    fn test_role_matching_is_exact() {
        let session = ResolvedSession {
            user_id: 1,
            roles: split_roles("user,superadmin"),
            expires_at: Utc::now(),
        };
        assert!(session.has_role("user"));
        assert!(!session.is_admin());
        assert!(split_roles("").is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique_hex() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
        assert!(hex::decode(&a).is_ok());
    }
}
