//! Periodic purge of expired sessions and one-time tokens.
//!
//! Neither table is cleaned on read, so without this task both grow with every
//! abandoned login and unanswered email.

use std::time::Duration;
use tokio::time::interval;

use crate::auth::{AuthError, SessionManager, TokenManager};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeStats {
    pub sessions_removed: u64,
    pub tokens_removed: u64,
}

pub struct Housekeeping {
    sessions: SessionManager,
    tokens: TokenManager,
}

impl Housekeeping {
    pub fn new(sessions: SessionManager, tokens: TokenManager) -> Self {
        Self { sessions, tokens }
    }

    /// Run a single purge cycle
    pub async fn run_once(&self) -> Result<PurgeStats, AuthError> {
        let stats = PurgeStats {
            sessions_removed: self.sessions.purge_expired().await?,
            tokens_removed: self.tokens.purge_expired().await?,
        };

        if stats.sessions_removed > 0 || stats.tokens_removed > 0 {
            tracing::info!(
                sessions = stats.sessions_removed,
                tokens = stats.tokens_removed,
                "Purged expired sessions and tokens"
            );
        }
        Ok(stats)
    }

    /// Run forever on a fixed interval; the first cycle runs immediately
    pub async fn run(self, every: Duration) {
        let mut ticker = interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                tracing::warn!(error = %e, "Housekeeping cycle failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_memory, format_timestamp, users, TokenKind, TokenOwner, ROLE_USER};
    use chrono::Utc;

    #[tokio::test]
    async fn test_purges_only_expired_rows() {
        let db = connect_memory().await.unwrap();
        let user = users::create(&db, "a@b.com", "digest", &[ROLE_USER]).await.unwrap();
        let sessions = SessionManager::new(db.clone(), Duration::from_secs(3600));
        let tokens = TokenManager::new(db.clone(), Duration::from_secs(600));

        sessions.create(user.id, &["user".to_string()]).await.unwrap();
        tokens
            .issue(TokenKind::Activation, TokenOwner::User(user.id))
            .await
            .unwrap();

        let housekeeping = Housekeeping::new(sessions.clone(), tokens.clone());
        assert_eq!(housekeeping.run_once().await.unwrap(), PurgeStats::default());

        let past = format_timestamp(Utc::now() - chrono::Duration::minutes(1));
        for table in ["sessions", "tokens"] {
            sqlx::query(&format!("UPDATE {} SET expires_at = ?", table))
                .bind(&past)
                .execute(&db)
                .await
                .unwrap();
        }

        let stats = housekeeping.run_once().await.unwrap();
        assert_eq!(stats.sessions_removed, 1);
        assert_eq!(stats.tokens_removed, 1);
    }
}
