//! Database seeders for built-in data
//!
//! Roles are owned by the deployment, not by the identity flows, so they are
//! seeded here on every startup.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::info;

use super::{users, ROLE_ADMIN, ROLE_USER};
use crate::auth::password::hash_password;

/// Seed the built-in roles (idempotent)
pub async fn seed_roles(pool: &SqlitePool) -> Result<()> {
    let roles = [
        (ROLE_USER, "Registered account"),
        (ROLE_ADMIN, "Full access to the admin pages"),
    ];

    for (name, description) in roles {
        sqlx::query("INSERT OR IGNORE INTO roles (name, description) VALUES (?, ?)")
            .bind(name)
            .bind(description)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to seed role {}", name))?;
    }

    Ok(())
}

/// Create an activated administrator if no account with this email exists yet
pub async fn ensure_admin_user(pool: &SqlitePool, email: &str, password: &str) -> Result<()> {
    if users::find_by_email(pool, email).await?.is_some() {
        return Ok(());
    }

    let password_hash =
        hash_password(password).context("Failed to hash bootstrap admin password")?;
    let user = users::create(pool, email, &password_hash, &[ROLE_USER, ROLE_ADMIN]).await?;
    users::set_activated(pool, user.id).await?;

    info!(email = %email, "Created bootstrap admin user");
    Ok(())
}
