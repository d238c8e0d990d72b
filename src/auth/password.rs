//! One-way password digests (argon2id, random per-password salt).

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct PasswordHashError(String);

/// Hash a plaintext password into a PHC-format digest.
pub fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordHashError(err.to_string()))
}

/// Check `candidate` against a stored digest. Malformed digests never match.
pub fn verify_password(digest: &str, candidate: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        return false;
    };

    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_verifies_only_the_original_password() {
        let digest = hash_password("hunter22").unwrap();

        assert_ne!(digest, "hunter22");
        assert!(verify_password(&digest, "hunter22"));
        assert!(!verify_password(&digest, "hunter23"));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("hunter22").unwrap();
        let b = hash_password("hunter22").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_digest_does_not_verify() {
        assert!(!verify_password("not-a-phc-string", "anything"));
    }
}
