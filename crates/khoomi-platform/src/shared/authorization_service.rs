//! Authorization Service
//!
//! Resolves what the caller may do. Handlers state the capability they need
//! and ask [`AuthorizationService::authorize`]; nothing else compares ids.

use mongodb::Database;

use crate::auth::auth_service::AccessTokenClaims;
use crate::shared::error::{PlatformError, Result};
use crate::shop::entity::Shop;
use crate::shop::repository::ShopRepository;
use crate::user::entity::User;
use crate::user::repository::UserRepository;

/// Authorization context for a request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub email: String,
    pub login_name: String,
    /// As minted; seller checks re-read the user
    pub is_seller: bool,
    /// Raw bearer token, needed to revoke it on logout
    pub token: String,
    pub claims: AccessTokenClaims,
}

impl AuthContext {
    pub fn from_claims(token: impl Into<String>, claims: AccessTokenClaims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            email: claims.email.clone(),
            login_name: claims.login_name.clone(),
            is_seller: claims.is_seller,
            token: token.into(),
            claims,
        }
    }

    pub fn is_user(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// What a request needs to be allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability<'a> {
    /// Caller is this user
    SelfUser(&'a str),
    /// Caller is a seller
    Seller,
    /// Caller owns this shop
    ShopOwner(&'a str),
    Admin,
}

/// Proof of a granted capability, carrying whatever was loaded to decide it.
#[derive(Debug)]
pub enum Grant {
    SelfUser,
    Seller(User),
    ShopOwner(Shop),
    Admin(User),
}

pub struct AuthorizationService {
    users: UserRepository,
    shops: ShopRepository,
}

impl AuthorizationService {
    pub fn new(db: &Database) -> Self {
        Self {
            users: UserRepository::new(db),
            shops: ShopRepository::new(db),
        }
    }

    /// Self and owner failures answer 401; seller and admin failures 403.
    pub async fn authorize(&self, context: &AuthContext, capability: Capability<'_>) -> Result<Grant> {
        match capability {
            Capability::SelfUser(user_id) => {
                if context.is_user(user_id) {
                    Ok(Grant::SelfUser)
                } else {
                    Err(PlatformError::unauthorized("you can only access your own account"))
                }
            }
            Capability::Seller => {
                let user = self.users.get(&context.user_id).await?;
                if user.is_seller {
                    Ok(Grant::Seller(user))
                } else {
                    Err(PlatformError::forbidden("seller account required"))
                }
            }
            Capability::ShopOwner(shop_id) => {
                let shop = self.shops.get(shop_id).await?;
                if shop.is_owned_by(&context.user_id) {
                    Ok(Grant::ShopOwner(shop))
                } else {
                    Err(PlatformError::unauthorized("you do not own this shop"))
                }
            }
            Capability::Admin => {
                let user = self.users.get(&context.user_id).await?;
                if user.is_admin() {
                    Ok(Grant::Admin(user))
                } else {
                    Err(PlatformError::forbidden("administrator access required"))
                }
            }
        }
    }
}

/// Typed shorthands over [`AuthorizationService::authorize`]
pub mod checks {
    use super::*;

    pub async fn require_self(authz: &AuthorizationService, context: &AuthContext, user_id: &str) -> Result<()> {
        authz.authorize(context, Capability::SelfUser(user_id)).await.map(|_| ())
    }

    pub async fn require_seller(authz: &AuthorizationService, context: &AuthContext) -> Result<User> {
        match authz.authorize(context, Capability::Seller).await? {
            Grant::Seller(user) => Ok(user),
            other => Err(unexpected(other)),
        }
    }

    /// Owner check; the shop must exist (404 otherwise).
    pub async fn require_shop_owner(authz: &AuthorizationService, context: &AuthContext, shop_id: &str) -> Result<Shop> {
        match authz.authorize(context, Capability::ShopOwner(shop_id)).await? {
            Grant::ShopOwner(shop) => Ok(shop),
            other => Err(unexpected(other)),
        }
    }

    pub async fn require_admin(authz: &AuthorizationService, context: &AuthContext) -> Result<User> {
        match authz.authorize(context, Capability::Admin).await? {
            Grant::Admin(user) => Ok(user),
            other => Err(unexpected(other)),
        }
    }

    fn unexpected(grant: Grant) -> PlatformError {
        PlatformError::internal(format!("unexpected grant {:?}", grant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::auth_service::TokenUse;

    fn context(user_id: &str) -> AuthContext {
        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            email: "a@b.co".into(),
            login_name: "ada1234".into(),
            is_seller: false,
            iat: 0,
            exp: 0,
            iss: "khoomi".into(),
            jti: "j".into(),
            token_use: TokenUse::Access,
        };
        AuthContext::from_claims("token", claims)
    }

    #[test]
    fn test_context_copies_claims() {
        let ctx = context("u1");
        assert_eq!(ctx.user_id, "u1");
        assert_eq!(ctx.login_name, "ada1234");
        assert_eq!(ctx.token, "token");
        assert!(ctx.is_user("u1"));
        assert!(!ctx.is_user("u2"));
    }
}
