//! Password hashing with Argon2id and the account password policy.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use tracing::debug;

use crate::shared::error::{PlatformError, Result};

pub const PASSWORD_SYMBOLS: &str = "!@#$%^&*()-_=+[]{};:'\",.<>/?\\|`~";

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub symbols: String,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 64,
            symbols: PASSWORD_SYMBOLS.to_string(),
        }
    }
}

impl PasswordPolicy {
    /// Fails with the first rule the password breaks.
    pub fn validate(&self, password: &str) -> Result<()> {
        let len = password.chars().count();
        if len < self.min_length {
            return Err(PlatformError::validation(format!(
                "password must be at least {} characters",
                self.min_length
            )));
        }
        if len > self.max_length {
            return Err(PlatformError::validation(format!(
                "password must be at most {} characters",
                self.max_length
            )));
        }
        if !password.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(PlatformError::validation("password must contain a lowercase letter"));
        }
        if !password.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(PlatformError::validation("password must contain an uppercase letter"));
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PlatformError::validation("password must contain a digit"));
        }
        if !password.chars().any(|c| self.symbols.contains(c)) {
            return Err(PlatformError::validation(format!(
                "password must contain one of the symbols {}",
                self.symbols
            )));
        }
        Ok(())
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone)]
pub struct Argon2Config {
    /// Memory cost in KiB
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_cost: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl Argon2Config {
    /// Cheap parameters for tests.
    pub fn testing() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }
}

pub struct PasswordService {
    argon2: Argon2<'static>,
    policy: PasswordPolicy,
}

impl PasswordService {
    pub fn new(config: Argon2Config, policy: PasswordPolicy) -> Result<Self> {
        let params = Params::new(config.memory_cost, config.time_cost, config.parallelism, None)
            .map_err(|e| PlatformError::internal(format!("Invalid Argon2 params: {}", e)))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            policy,
        })
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// Validate against the policy, then hash with a fresh salt.
    pub fn hash(&self, password: &str) -> Result<String> {
        self.policy.validate(password)?;

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PlatformError::internal(format!("Failed to hash password: {}", e)))?;

        Ok(hash.to_string())
    }

    pub fn verify(&self, digest: &str, password: &str) -> Result<bool> {
        let parsed = PasswordHash::new(digest)
            .map_err(|e| PlatformError::internal(format!("Invalid password hash format: {}", e)))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => {
                debug!("Password verification failed");
                Ok(false)
            }
            Err(e) => Err(PlatformError::internal(format!("Password verification error: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PasswordService {
        PasswordService::new(Argon2Config::testing(), PasswordPolicy::default()).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let service = service();
        let digest = service.hash("Aa1!aa1!").unwrap();
        assert!(digest.starts_with("$argon2id$"));
        assert!(service.verify(&digest, "Aa1!aa1!").unwrap());
        assert!(!service.verify(&digest, "Bb2@bb2@").unwrap());
    }

    #[test]
    fn test_same_password_distinct_digests() {
        let service = service();
        let a = service.hash("Aa1!aa1!").unwrap();
        let b = service.hash("Aa1!aa1!").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_policy_names_missing_class() {
        let policy = PasswordPolicy::default();
        let message = |p: &str| policy.validate(p).unwrap_err().to_string();

        assert!(message("Aa1!").contains("at least 8"));
        assert!(message(&format!("Aa1!{}", "a".repeat(61))).contains("at most 64"));
        assert!(message("AAAA1111!").contains("lowercase"));
        assert!(message("aaaa1111!").contains("uppercase"));
        assert!(message("Aaaaaaaa!").contains("digit"));
        assert!(message("Aaaa1111").contains("symbols"));
        assert!(policy.validate("Bb2@bb2@").is_ok());
    }

    #[test]
    fn test_malformed_digest_is_an_error() {
        assert!(service().verify("not-a-phc-string", "Aa1!aa1!").is_err());
    }
}
