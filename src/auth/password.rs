//! Password hashing and verification.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;

use super::AuthError;

/// Shortest password accepted at registration and reset
pub const MIN_PASSWORD_LENGTH: usize = 8;

lazy_static! {
    /// Digest checked against when the account does not exist, so a miss
    /// costs the same as a wrong password.
    static ref DUMMY_HASH: String = hash_password("portcullis-timing-pad")
        .unwrap_or_default();
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Burn one verification for an unknown account. Always false.
pub fn dummy_verify(password: &str) -> bool {
    let _ = verify_password(password, &DUMMY_HASH);
    false
}

/// Run argon2 work on the blocking pool instead of an async worker thread
async fn run_blocking<T, F>(work: F) -> Result<T, AuthError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AuthError::Hashing(format!("hashing task failed: {}", e)))
}

pub async fn hash_password_async(password: &str) -> Result<String, AuthError> {
    let password = password.to_owned();
    run_blocking(move || hash_password(&password)).await?
}

pub async fn verify_password_async(password: &str, hash: &str) -> Result<bool, AuthError> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    run_blocking(move || verify_password(&password, &hash)).await
}

pub async fn dummy_verify_async(password: &str) -> Result<bool, AuthError> {
    let password = password.to_owned();
    run_blocking(move || dummy_verify(&password)).await
}
