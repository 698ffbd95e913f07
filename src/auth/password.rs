//! Password hashing with bcrypt.

use crate::error::ServiceError;

/// Work factor used when none is configured.
pub const DEFAULT_COST: u32 = 10;

/// Hash `password` with a fresh random salt at the given bcrypt cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, ServiceError> {
    bcrypt::hash(password, cost).map_err(|e| ServiceError::Internal(format!("bcrypt: {}", e)))
}

/// Check `password` against a stored hash.
///
/// Returns `Ok(false)` on mismatch and an error only when the stored hash
/// itself is unreadable.
pub fn verify_password(stored: &str, password: &str) -> Result<bool, ServiceError> {
    bcrypt::verify(password, stored)
        .map_err(|e| ServiceError::Internal(format!("stored password hash is malformed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_password("correct horse", TEST_COST).unwrap();
        assert!(stored.starts_with("$2b$04$"));
        assert!(verify_password(&stored, "correct horse").unwrap());
        assert!(!verify_password(&stored, "battery staple").unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same", TEST_COST).unwrap();
        let b = hash_password("same", TEST_COST).unwrap();
        assert_ne!(a, b);
        assert!(verify_password(&a, "same").unwrap());
        assert!(verify_password(&b, "same").unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(verify_password("plaintext", "x").is_err());
        assert!(verify_password("hs256$10000$abc$def", "x").is_err());
    }

    #[test]
    fn test_invalid_cost_is_an_error() {
        assert!(matches!(
            hash_password("pw", 2),
            Err(ServiceError::Internal(_))
        ));
    }
}
