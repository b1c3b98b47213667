//! Admin configuration.

use argon2::{Argon2, PasswordHash, PasswordVerifier};

/// Admin configuration with hashed secret.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// The argon2 hashed admin secret.
    pub secret_hash: String,
}

impl AdminConfig {
    pub fn new(secret_hash: String) -> Self {
        Self { secret_hash }
    }

    /// Check a plaintext secret from the `Vault-Admin-Authorization` header
    /// against the stored hash. An unparseable hash matches nothing.
    pub fn verify_secret(&self, plaintext: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(&self.secret_hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::{
        PasswordHasher,
        password_hash::{SaltString, rand_core::OsRng},
    };

    #[test]
    fn test_verify_secret() {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(b"vault-admin", &salt)
            .unwrap()
            .to_string();

        let admin = AdminConfig::new(hash);
        assert!(admin.verify_secret("vault-admin"));
        assert!(!admin.verify_secret("vault-admin "));
        assert!(!admin.verify_secret(""));
    }

    #[test]
    fn test_garbage_hash_matches_nothing() {
        let admin = AdminConfig::new("not-a-hash".into());
        assert!(!admin.verify_secret("not-a-hash"));
    }
}
