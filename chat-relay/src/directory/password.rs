//! Password hashing (Argon2id, PHC string format).

use crate::error::StorageError;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Salt length in bytes.
const SALT_LEN: usize = 16;

/// Hash a password into a self-describing PHC string.
pub fn hash_password(password: &str) -> Result<String, StorageError> {
    let mut salt_bytes = [0u8; SALT_LEN];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| StorageError::PasswordHash(format!("salt generation failed: {e}")))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| StorageError::PasswordHash(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StorageError::PasswordHash(e.to_string()))
}

/// Check a password against a stored PHC string.
///
/// A mismatch is `Ok(false)`; only an unparseable stored hash is an error.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, StorageError> {
    let parsed =
        PasswordHash::new(stored).map_err(|e| StorageError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// [`hash_password`] on the blocking pool, keeping Argon2 off the async workers.
pub async fn hash_password_blocking(password: &str) -> Result<String, StorageError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| StorageError::PasswordHash(format!("hashing task failed: {e}")))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(password: &str, stored: &str) -> Result<bool, StorageError> {
    let (password, stored) = (password.to_string(), stored.to_string());
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| StorageError::PasswordHash(format!("verification task failed: {e}")))?
}
