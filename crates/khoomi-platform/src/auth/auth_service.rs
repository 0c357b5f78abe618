//! Authentication Service
//!
//! HS256 access and refresh tokens, password hashing, and revocation.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::password_service::PasswordService;
use crate::auth::token_store::{token_key, TokenStore};
use crate::shared::error::{PlatformError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// JWT claims carried by both token kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// User id
    pub sub: String,
    pub email: String,
    pub login_name: String,
    pub is_seller: bool,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    /// Unique per mint so two tokens issued in the same second differ
    pub jti: String,
    pub token_use: TokenUse,
}

/// Identity fields copied into tokens
#[derive(Debug, Clone)]
pub struct Principal<'a> {
    pub user_id: &'a str,
    pub email: &'a str,
    pub login_name: &'a str,
    pub is_seller: bool,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret_key: String,
    pub issuer: String,
    pub access_token_expiry_secs: i64,
    pub refresh_token_expiry_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: "development-secret-change-me".to_string(),
            issuer: "khoomi".to_string(),
            access_token_expiry_secs: 3600,
            refresh_token_expiry_secs: 7 * 24 * 3600,
        }
    }
}

impl From<&khoomi_config::AuthConfig> for AuthConfig {
    fn from(config: &khoomi_config::AuthConfig) -> Self {
        let defaults = Self::default();
        Self {
            secret_key: if config.jwt_secret.is_empty() {
                defaults.secret_key
            } else {
                config.jwt_secret.clone()
            },
            issuer: config.issuer.clone(),
            access_token_expiry_secs: config.access_token_expiry_secs,
            refresh_token_expiry_secs: config.refresh_token_expiry_secs,
        }
    }
}

pub struct AuthService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    passwords: Arc<PasswordService>,
    revocations: Arc<dyn TokenStore>,
}

impl AuthService {
    pub fn new(config: AuthConfig, passwords: Arc<PasswordService>, revocations: Arc<dyn TokenStore>) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret_key.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret_key.as_bytes());

        info!(issuer = %config.issuer, "AuthService initialized with HS256");

        Self {
            config,
            encoding_key,
            decoding_key,
            passwords,
            revocations,
        }
    }

    pub fn passwords(&self) -> &PasswordService {
        &self.passwords
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        self.passwords.hash(password)
    }

    pub fn verify(&self, digest: &str, password: &str) -> Result<bool> {
        self.passwords.verify(digest, password)
    }

    pub fn mint_access(&self, principal: &Principal<'_>) -> Result<(String, DateTime<Utc>)> {
        self.mint(principal, TokenUse::Access, self.config.access_token_expiry_secs)
    }

    pub fn mint_refresh(&self, principal: &Principal<'_>) -> Result<String> {
        self.mint(principal, TokenUse::Refresh, self.config.refresh_token_expiry_secs)
            .map(|(token, _)| token)
    }

    fn mint(&self, principal: &Principal<'_>, token_use: TokenUse, lifetime_secs: i64) -> Result<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let exp = now + Duration::seconds(lifetime_secs);

        let claims = AccessTokenClaims {
            sub: principal.user_id.to_string(),
            email: principal.email.to_string(),
            login_name: principal.login_name.to_string(),
            is_seller: principal.is_seller,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.issuer.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            token_use,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok((token, exp))
    }

    /// Signature, expiry, and issuer check without consulting the revocation store.
    fn decode_claims(&self, token: &str, expected: TokenUse) -> Result<AccessTokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.leeway = 0;

        let claims = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => PlatformError::TokenExpired,
                _ => PlatformError::InvalidToken { message: e.to_string() },
            })?;

        if claims.token_use != expected {
            return Err(PlatformError::InvalidToken {
                message: format!("expected a {:?} token", expected).to_lowercase(),
            });
        }
        Ok(claims)
    }

    pub async fn validate_access(&self, token: &str) -> Result<AccessTokenClaims> {
        let claims = self.decode_claims(token, TokenUse::Access)?;
        if self.is_revoked(token).await? {
            return Err(PlatformError::TokenRevoked);
        }
        Ok(claims)
    }

    pub async fn validate_refresh(&self, token: &str) -> Result<AccessTokenClaims> {
        let claims = self.decode_claims(token, TokenUse::Refresh)?;
        if self.is_revoked(token).await? {
            return Err(PlatformError::TokenRevoked);
        }
        Ok(claims)
    }

    /// Revoke for the rest of the token's lifetime. Expired tokens need no entry.
    pub async fn revoke(&self, token: &str, claims: &AccessTokenClaims) -> Result<()> {
        let remaining = remaining_lifetime_secs(claims.exp, Utc::now());
        if remaining == 0 {
            return Ok(());
        }
        self.revocations.put(&token_key(token), remaining).await?;
        debug!(user_id = %claims.sub, ttl = remaining, "Token revoked");
        Ok(())
    }

    pub async fn is_revoked(&self, token: &str) -> Result<bool> {
        self.revocations.contains(&token_key(token)).await
    }
}

fn remaining_lifetime_secs(exp: i64, now: DateTime<Utc>) -> u64 {
    match Utc.timestamp_opt(exp, 0).single() {
        Some(exp_at) if exp_at > now => (exp_at - now).num_seconds().max(1) as u64,
        _ => 0,
    }
}

/// Extract the token from an `Authorization: Bearer <jwt>` header value.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password_service::{Argon2Config, PasswordPolicy};
    use crate::auth::token_store::MemoryTokenStore;

    fn service(config: AuthConfig) -> AuthService {
        let passwords = PasswordService::new(Argon2Config::testing(), PasswordPolicy::default()).unwrap();
        AuthService::new(config, Arc::new(passwords), Arc::new(MemoryTokenStore::new()))
    }

    fn principal() -> Principal<'static> {
        Principal {
            user_id: "65a1b2c3d4e5f60718293a4b",
            email: "a@b.co",
            login_name: "adalovelace1234",
            is_seller: false,
        }
    }

    #[tokio::test]
    async fn test_mint_and_validate_access() {
        let service = service(AuthConfig::default());
        let (token, exp) = service.mint_access(&principal()).unwrap();
        assert!(exp > Utc::now());

        let claims = service.validate_access(&token).await.unwrap();
        assert_eq!(claims.sub, "65a1b2c3d4e5f60718293a4b");
        assert_eq!(claims.email, "a@b.co");
        assert_eq!(claims.login_name, "adalovelace1234");
        assert!(!claims.is_seller);
        assert_eq!(claims.token_use, TokenUse::Access);
    }

    #[tokio::test]
    async fn test_token_kinds_are_not_interchangeable() {
        let service = service(AuthConfig::default());
        let refresh = service.mint_refresh(&principal()).unwrap();
        let (access, _) = service.mint_access(&principal()).unwrap();

        assert!(matches!(service.validate_access(&refresh).await, Err(PlatformError::InvalidToken { .. })));
        assert!(matches!(service.validate_refresh(&access).await, Err(PlatformError::InvalidToken { .. })));
        assert!(service.validate_refresh(&refresh).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoked_token_fails_immediately() {
        let service = service(AuthConfig::default());
        let (token, _) = service.mint_access(&principal()).unwrap();
        let claims = service.validate_access(&token).await.unwrap();

        service.revoke(&token, &claims).await.unwrap();

        assert!(service.is_revoked(&token).await.unwrap());
        assert!(matches!(service.validate_access(&token).await, Err(PlatformError::TokenRevoked)));
    }

    #[tokio::test]
    async fn test_revocation_is_per_token() {
        let service = service(AuthConfig::default());
        let (first, _) = service.mint_access(&principal()).unwrap();
        let (second, _) = service.mint_access(&principal()).unwrap();
        assert_ne!(first, second);

        let claims = service.validate_access(&first).await.unwrap();
        service.revoke(&first, &claims).await.unwrap();
        assert!(service.validate_access(&second).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let service = service(AuthConfig {
            access_token_expiry_secs: -10,
            ..AuthConfig::default()
        });
        let (token, _) = service.mint_access(&principal()).unwrap();
        assert!(matches!(service.validate_access(&token).await, Err(PlatformError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_foreign_signature_rejected() {
        let ours = service(AuthConfig::default());
        let theirs = service(AuthConfig {
            secret_key: "someone-else".to_string(),
            ..AuthConfig::default()
        });
        let (token, _) = theirs.mint_access(&principal()).unwrap();
        assert!(matches!(ours.validate_access(&token).await, Err(PlatformError::InvalidToken { .. })));
    }

    #[test]
    fn test_remaining_lifetime() {
        let now = Utc::now();
        assert_eq!(remaining_lifetime_secs(now.timestamp() - 5, now), 0);
        let remaining = remaining_lifetime_secs(now.timestamp() + 120, now);
        assert!((119..=120).contains(&remaining));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("bearer abc123"), None);
        assert_eq!(extract_bearer_token("Basic abc123"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}
