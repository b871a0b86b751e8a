//! Async wrapper around the bcrypt hasher.
//!
//! bcrypt is deliberately slow, so every call runs on the blocking pool.

use anyhow::Context;

use sesame_auth::{Password, PasswordHasher};

/// Hashes and checks secrets off the async executor.
///
/// Holds a throwaway hash so that a lookup miss still costs one full verify;
/// login latency then does not reveal whether the identifier exists.
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    hasher: PasswordHasher,
    dummy_hash: String,
}

impl CredentialVerifier {
    pub fn new(hasher: PasswordHasher) -> anyhow::Result<Self> {
        let dummy_hash = hasher
            .hash("sesame-placeholder-secret")
            .context("hashing placeholder secret")?;
        Ok(Self { hasher, dummy_hash })
    }

    pub fn cost(&self) -> u32 {
        self.hasher.cost()
    }

    pub async fn hash(&self, secret: &Password) -> anyhow::Result<String> {
        let hasher = self.hasher;
        let secret = secret.expose().to_string();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .context("password hashing task failed")??;
        Ok(hash)
    }

    /// Compare `secret` with `stored_hash`, or with the placeholder when there
    /// is no stored hash. The latter always yields `false`.
    pub async fn verify(&self, secret: &Password, stored_hash: Option<&str>) -> anyhow::Result<bool> {
        let hasher = self.hasher;
        let secret = secret.expose().to_string();
        let (hash, known) = match stored_hash {
            Some(h) => (h.to_string(), true),
            None => (self.dummy_hash.clone(), false),
        };

        let matched = tokio::task::spawn_blocking(move || hasher.verify(&secret, &hash))
            .await
            .context("password verification task failed")?;
        Ok(known && matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> CredentialVerifier {
        CredentialVerifier::new(PasswordHasher::with_cost(4)).unwrap()
    }

    fn password(raw: &str) -> Password {
        Password::parse("password", Some(raw.to_string())).unwrap()
    }

    #[tokio::test]
    async fn hash_and_verify_off_thread() {
        let v = verifier();
        let hash = v.hash(&password("Secret123")).await.unwrap();

        assert!(v.verify(&password("Secret123"), Some(&hash)).await.unwrap());
        assert!(!v.verify(&password("Wrong123"), Some(&hash)).await.unwrap());
    }

    #[tokio::test]
    async fn missing_hash_never_matches() {
        let v = verifier();
        assert!(
            !v.verify(&password("sesame-placeholder-secret"), None)
                .await
                .unwrap()
        );
    }
}
