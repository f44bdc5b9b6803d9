use argon2::Config as ArgonConfig;
use rand::RngCore;

use crate::utils::error::AppError;

const SALT_LEN: usize = 16;

/// Hashes a password with argon2 and a random per-user salt. The result is
/// the self-describing encoded form, safe to store as-is.
pub fn hash(password: &str) -> Result<String, AppError> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    argon2::hash_encoded(password.as_bytes(), &salt, &ArgonConfig::default())
        .map_err(|e| AppError::InternalServerError(format!("failed to hash password: {}", e)))
}

/// Checks a candidate password against a stored encoded hash.
pub fn verify(encoded: &str, password: &str) -> bool {
    argon2::verify_encoded(encoded, password.as_bytes()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let encoded = hash("correct horse battery staple").unwrap();
        assert!(verify(&encoded, "correct horse battery staple"));
    }

    #[test]
    fn test_wrong_password_fails() {
        let encoded = hash("secret-one").unwrap();
        assert!(!verify(&encoded, "secret-two"));
    }

    #[test]
    fn test_salts_differ_between_hashes() {
        let a = hash("same-password").unwrap();
        let b = hash("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_tolerates_garbage_hash() {
        assert!(!verify("not-an-encoded-hash", "anything"));
    }
}
