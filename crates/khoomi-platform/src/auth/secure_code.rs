//! Single-use codes for email verification and password reset.
//!
//! Codes are 16 hex characters drawn from the OS RNG. Only the SHA-256
//! digest is persisted; comparison is constant time.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const CODE_BYTES: usize = 8;

pub struct SecureCode {
    pub code: String,
    pub digest: String,
}

pub fn generate() -> SecureCode {
    let mut bytes = [0u8; CODE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let code = hex::encode(bytes);
    let digest = digest(&code);
    SecureCode { code, digest }
}

pub fn digest(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

pub fn matches(stored_digest: &str, presented_code: &str) -> bool {
    let presented = digest(presented_code);
    stored_digest.as_bytes().ct_eq(presented.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_shape() {
        let code = generate();
        assert_eq!(code.code.len(), 16);
        assert!(code.code.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(code.code, code.digest);
    }

    #[test]
    fn test_matches_only_original_code() {
        let code = generate();
        assert!(matches(&code.digest, &code.code));
        assert!(!matches(&code.digest, &generate().code));
        assert!(!matches(&code.digest, ""));
    }

    #[test]
    fn test_codes_are_unique() {
        assert_ne!(generate().code, generate().code);
    }
}
