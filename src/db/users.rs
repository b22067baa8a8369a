//! User and role queries.

use chrono::Utc;
use sqlx::SqlitePool;

use super::{format_timestamp, User};

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Insert an unactivated user and attach the named roles (unknown role names are skipped).
///
/// The user and its roles are written in one transaction; on error nothing is stored.
pub async fn create(
    pool: &SqlitePool,
    email: &str,
    password_hash: &str,
    roles: &[&str],
) -> sqlx::Result<User> {
    let now = format_timestamp(Utc::now());
    let mut tx = pool.begin().await?;

    let user: User = sqlx::query_as(
        "INSERT INTO users (email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?) RETURNING *",
    )
    .bind(email)
    .bind(password_hash)
    .bind(&now)
    .bind(&now)
    .fetch_one(&mut *tx)
    .await?;

    for role in roles {
        sqlx::query(
            "INSERT OR IGNORE INTO user_roles (user_id, role_id) SELECT ?, id FROM roles WHERE name = ?",
        )
        .bind(user.id)
        .bind(*role)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(user)
}

/// Role names held by the user, alphabetically
pub async fn role_names(pool: &SqlitePool, user_id: i64) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar(
        r#"
        SELECT r.name FROM roles r
        JOIN user_roles ur ON ur.role_id = r.id
        WHERE ur.user_id = ?
        ORDER BY r.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone, Copy, Default, sqlx::FromRow)]
pub struct UserStats {
    pub total: i64,
    pub activated: i64,
}

pub async fn stats(pool: &SqlitePool) -> sqlx::Result<UserStats> {
    sqlx::query_as(
        "SELECT COUNT(*) AS total, COUNT(activated_at) AS activated FROM users",
    )
    .fetch_one(pool)
    .await
}

/// Stamp the activation time. Returns false when no such user exists.
pub async fn set_activated(pool: &SqlitePool, user_id: i64) -> sqlx::Result<bool> {
    let now = format_timestamp(Utc::now());
    let result = sqlx::query("UPDATE users SET activated_at = ?, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(&now)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Replace the password digest. Returns false when no such user exists.
pub async fn set_password_hash(
    pool: &SqlitePool,
    user_id: i64,
    password_hash: &str,
) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(format_timestamp(Utc::now()))
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_memory, ROLE_ADMIN, ROLE_USER};

    #[tokio::test]
    async fn test_create_and_lookup() {
        let pool = connect_memory().await.unwrap();
        let user = create(&pool, "a@b.com", "digest", &[ROLE_USER]).await.unwrap();

        assert!(!user.is_activated());
        let by_email = find_by_email(&pool, "a@b.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(find_by_email(&pool, "nobody@b.com").await.unwrap().is_none());
        assert_eq!(role_names(&pool, user.id).await.unwrap(), vec!["user"]);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let pool = connect_memory().await.unwrap();
        create(&pool, "a@b.com", "digest", &[]).await.unwrap();
        assert!(create(&pool, "a@b.com", "other", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_role_insert_stores_no_user() {
        let pool = connect_memory().await.unwrap();
        sqlx::query("DROP TABLE user_roles").execute(&pool).await.unwrap();

        assert!(create(&pool, "a@b.com", "digest", &[ROLE_USER]).await.is_err());
        assert!(find_by_email(&pool, "a@b.com").await.unwrap().is_none());
        assert_eq!(stats(&pool).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_roles_sorted_and_unknown_skipped() {
        let pool = connect_memory().await.unwrap();
        let user = create(&pool, "root@b.com", "digest", &[ROLE_USER, ROLE_ADMIN, "ghost"])
            .await
            .unwrap();
        assert_eq!(role_names(&pool, user.id).await.unwrap(), vec!["admin", "user"]);
    }

    #[tokio::test]
    async fn test_activation_and_password_updates() {
        let pool = connect_memory().await.unwrap();
        let user = create(&pool, "a@b.com", "digest", &[]).await.unwrap();

        assert!(set_activated(&pool, user.id).await.unwrap());
        assert!(set_password_hash(&pool, user.id, "new-digest").await.unwrap());
        let reloaded = find_by_id(&pool, user.id).await.unwrap().unwrap();
        assert!(reloaded.is_activated());
        assert_eq!(reloaded.password_hash, "new-digest");

        assert!(!set_activated(&pool, 9999).await.unwrap());
    }

    #[tokio::test]
    async fn test_stats() {
        let pool = connect_memory().await.unwrap();
        let user = create(&pool, "a@b.com", "digest", &[]).await.unwrap();
        create(&pool, "c@d.com", "digest", &[]).await.unwrap();
        set_activated(&pool, user.id).await.unwrap();

        let stats = stats(&pool).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.activated, 1);
    }
}
