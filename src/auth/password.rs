//! Password hashing (argon2). Runs on the blocking pool so request workers stay free.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::EcommerceError;

pub async fn hash_password(password: String) -> Result<String, EcommerceError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| EcommerceError::Internal(format!("password hashing failed: {e}")))
    })
    .await
    .map_err(|e| EcommerceError::Internal(e.to_string()))?
}

/// False for a wrong password or an unreadable stored hash.
pub async fn verify_password(password: String, hash: String) -> Result<bool, EcommerceError> {
    tokio::task::spawn_blocking(move || match PasswordHash::new(&hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    })
    .await
    .map_err(|e| EcommerceError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hash = hash_password("hunter22".into()).await.unwrap();
        assert!(verify_password("hunter22".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("hunter23".into(), hash).await.unwrap());
        assert!(!verify_password("x".into(), "not-a-hash".into()).await.unwrap());
    }
}
