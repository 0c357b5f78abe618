//! Authentication
//!
//! Password hashing, JWT issuance and validation, the revocation store,
//! and single-use account tokens.

pub mod auth_service;
pub mod password_service;
pub mod secure_code;
pub mod secure_token;
pub mod token_store;

pub use auth_service::{extract_bearer_token, AccessTokenClaims, AuthConfig, AuthService, Principal, TokenUse};
pub use password_service::{Argon2Config, PasswordPolicy, PasswordService};
pub use secure_token::{SecureToken, SecureTokenKind};
pub use token_store::{MemoryTokenStore, RedisTokenStore, TokenStore};
