use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    /// The stored value is not a PHC string.
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),

    #[error("password does not match")]
    Mismatch,
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

pub fn verify_password(password: &str, hashed: &str) -> Result<(), PasswordError> {
    let argon2 = Argon2::default();
    let parsed =
        PasswordHash::new(hashed).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;

    argon2
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| PasswordError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("site-password").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("site-password", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong", &hash),
            Err(PasswordError::Mismatch)
        ));
    }

    #[test]
    fn malformed_hash_is_reported() {
        assert!(matches!(
            verify_password("x", "plain-text"),
            Err(PasswordError::MalformedHash(_))
        ));
    }
}
