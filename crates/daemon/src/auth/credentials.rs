//! Shared-password verification.
//!
//! The password is hashed once with bcrypt at startup and only the hash is
//! kept. Verification is CPU-bound; async callers run it on the blocking pool.

pub use bcrypt::{BcryptError, DEFAULT_COST};

/// Verifies candidates against a single bcrypt password hash.
#[derive(Clone)]
pub struct PasswordVerifier {
    hash: String,
}

impl PasswordVerifier {
    /// Hashes `password` with the default bcrypt cost.
    pub fn new(password: &str) -> Result<Self, BcryptError> {
        Self::with_cost(password, DEFAULT_COST)
    }

    /// Hashes `password` with the given bcrypt cost.
    pub fn with_cost(password: &str, cost: u32) -> Result<Self, BcryptError> {
        Ok(Self {
            hash: bcrypt::hash(password, cost)?,
        })
    }

    /// Returns whether `candidate` matches the stored password.
    pub fn verify(&self, candidate: &str) -> bool {
        match bcrypt::verify(candidate, &self.hash) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::error!(error = %e, "Password hash check failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for PasswordVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordVerifier")
            .field("hash", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lowest cost bcrypt accepts; keeps tests fast.
    const TEST_COST: u32 = 4;

    #[test]
    fn test_verify_accepts_correct_password() {
        let verifier = PasswordVerifier::with_cost("hunter2", TEST_COST).unwrap();
        assert!(verifier.verify("hunter2"));
    }

    #[test]
    fn test_verify_rejects_wrong_password() {
        let verifier = PasswordVerifier::with_cost("hunter2", TEST_COST).unwrap();
        assert!(!verifier.verify("hunter3"));
        assert!(!verifier.verify(""));
        assert!(!verifier.verify("hunter2 "));
    }

    #[test]
    fn test_stores_bcrypt_hash_not_password() {
        let verifier = PasswordVerifier::with_cost("same", TEST_COST).unwrap();
        assert!(verifier.hash.starts_with("$2"));
        assert!(!verifier.hash.contains("same"));

        let other = PasswordVerifier::with_cost("same", TEST_COST).unwrap();
        assert_ne!(verifier.hash, other.hash);
        assert!(verifier.verify("same") && other.verify("same"));
    }

    #[test]
    fn test_cost_out_of_range_is_rejected() {
        assert!(PasswordVerifier::with_cost("pw", 3).is_err());
        assert!(PasswordVerifier::with_cost("pw", 32).is_err());
    }

    #[test]
    fn test_debug_does_not_leak_hash() {
        let verifier = PasswordVerifier::with_cost("secret", TEST_COST).unwrap();
        let debug = format!("{:?}", verifier);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(&verifier.hash));
    }
}
