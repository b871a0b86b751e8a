//! Password hashing and verification (bcrypt).

use thiserror::Error;

/// Work factor used unless configured otherwise (2^10 rounds).
pub const DEFAULT_COST: u32 = 10;

/// Lowest cost bcrypt accepts.
pub const MIN_COST: u32 = 4;

/// Upper bound on the configurable cost; keeps a single login from becoming
/// a CPU amplifier.
pub const MAX_COST: u32 = 12;

/// bcrypt only reads the first 72 bytes of a secret.
pub const MAX_SECRET_BYTES: usize = 72;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("secret exceeds {MAX_SECRET_BYTES} bytes")]
    TooLong,

    #[error("hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Salted, adaptive hashing with a fixed work factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordHasher {
    /// Build a hasher, clamping `cost` into `MIN_COST..=MAX_COST`.
    pub fn with_cost(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash `secret` with a fresh random salt.
    pub fn hash(&self, secret: &str) -> Result<String, PasswordError> {
        if secret.len() > MAX_SECRET_BYTES {
            return Err(PasswordError::TooLong);
        }
        Ok(bcrypt::hash(secret, self.cost)?)
    }

    /// Check `secret` against a stored hash.
    ///
    /// Returns `false` for a mismatch and for a hash that cannot be parsed.
    pub fn verify(&self, secret: &str, stored_hash: &str) -> bool {
        if secret.len() > MAX_SECRET_BYTES {
            return false;
        }
        bcrypt::verify(secret, stored_hash).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> PasswordHasher {
        PasswordHasher::with_cost(MIN_COST)
    }

    #[test]
    fn default_cost_is_ten() {
        assert_eq!(PasswordHasher::default().cost(), 10);
    }

    #[test]
    fn cost_is_clamped() {
        assert_eq!(PasswordHasher::with_cost(1).cost(), MIN_COST);
        assert_eq!(PasswordHasher::with_cost(31).cost(), MAX_COST);
    }

    #[test]
    fn hash_then_verify() {
        let hasher = fast();
        let hash = hasher.hash("Secret123").unwrap();
        assert!(hash.starts_with("$2"));
        assert!(hasher.verify("Secret123", &hash));
        assert!(!hasher.verify("secret123", &hash));
    }

    #[test]
    fn same_secret_gets_different_salts() {
        let hasher = fast();
        assert_ne!(hasher.hash("Secret123").unwrap(), hasher.hash("Secret123").unwrap());
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        assert!(!fast().verify("Secret123", "not-a-bcrypt-hash"));
        assert!(!fast().verify("Secret123", ""));
    }

    #[test]
    fn overlong_secret_is_rejected() {
        let long = "x".repeat(MAX_SECRET_BYTES + 1);
        assert!(matches!(fast().hash(&long), Err(PasswordError::TooLong)));
    }
}
