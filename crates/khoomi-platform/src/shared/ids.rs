//! Object identifiers
//!
//! Documents use 12-byte ObjectIds stored in their 24-char hex form.

use bson::oid::ObjectId;

use crate::shared::error::{PlatformError, Result};

pub fn new_id() -> String {
    ObjectId::new().to_hex()
}

pub fn is_object_id(raw: &str) -> bool {
    raw.len() == 24 && ObjectId::parse_str(raw).is_ok()
}

/// Validate an identifier taken from a path or query, normalising to lowercase hex.
pub fn parse_id(entity_type: &str, raw: &str) -> Result<String> {
    if is_object_id(raw) {
        Ok(raw.to_ascii_lowercase())
    } else {
        Err(PlatformError::validation(format!("invalid {} id: {}", entity_type, raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_valid_and_unique() {
        let a = new_id();
        let b = new_id();
        assert_eq!(a.len(), 24);
        assert!(is_object_id(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(
            parse_id("shop", "65A1B2C3D4E5F60718293A4B").unwrap(),
            "65a1b2c3d4e5f60718293a4b"
        );
        assert!(parse_id("shop", "my-shop").is_err());
        assert!(parse_id("shop", "65a1b2c3d4e5f60718293a4").is_err());
        assert!(parse_id("shop", "65a1b2c3d4e5f60718293a4z").is_err());
    }
}
