use crate::error::ApiError;

/// PasswordHasher
///
/// Salted one-way hashing with bcrypt. The work factor comes from `AppConfig::bcrypt_cost`.
#[derive(Clone, Debug)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, plain: &str) -> Result<String, ApiError> {
        bcrypt::hash(plain, self.cost).map_err(|e| {
            tracing::error!(error = %e, "failed to hash password");
            ApiError::Internal
        })
    }

    /// A digest that cannot be parsed counts as a mismatch.
    pub fn verify(&self, plain: &str, digest: &str) -> bool {
        bcrypt::verify(plain, digest).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "stored password digest is unreadable");
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_only_the_original_password() {
        let hasher = PasswordHasher::new(4);
        let digest = hasher.hash("pw1234").unwrap();

        assert_ne!(digest, "pw1234");
        assert!(hasher.verify("pw1234", &digest));
        assert!(!hasher.verify("wrong", &digest));
    }

    #[test]
    fn same_password_hashes_differently() {
        let hasher = PasswordHasher::new(4);
        assert_ne!(hasher.hash("pw1234").unwrap(), hasher.hash("pw1234").unwrap());
    }

    #[test]
    fn garbage_digest_never_verifies() {
        assert!(!PasswordHasher::new(4).verify("pw1234", "not-a-bcrypt-digest"));
    }
}
