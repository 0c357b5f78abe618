//! Aggregate Writer Integration Tests
//!
//! These tests require a MongoDB replica set (transactions need one):
//! docker run -d -p 27017:27017 mongo:7 --replSet rs0
//! docker exec <container> mongosh --eval 'rs.initiate()'
//!
//! Override the address with KHOOMI_TEST_MONGO_URI. Each test runs in its own
//! database, dropped at the end.
//!
//! Tests for:
//! - Registration and duplicate emails
//! - Shop creation promoting the owner
//! - Follower count and embedded excerpts
//! - Review excerpts
//! - Default flags and per-user limits on addresses and payment accounts
//! - Password reset codes and login alerts through the mail outbox
//! - Shop about page ownership over HTTP

#![cfg(feature = "mongo-integration")]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use bson::doc;
use futures::TryStreamExt;
use tower::ServiceExt;
use utoipa_axum::router::OpenApiRouter;

use khoomi_platform::address::{AddressInput, UserAddress};
use khoomi_platform::auth::{
    Argon2Config, AuthConfig, AuthService, MemoryTokenStore, PasswordPolicy, PasswordService, Principal,
    SecureTokenKind,
};
use khoomi_platform::mail::outbox::MAIL_OUTBOX;
use khoomi_platform::mail::{MailOutboxItem, MailOutboxRepository, OutboxStatus};
use khoomi_platform::media::DisabledMediaHost;
use khoomi_platform::payment::{PaymentInformation, PaymentInput};
use khoomi_platform::shared::{initialize_indexes, AppState, AuthLayer, AuthorizationService, TrustedProxies};
use khoomi_platform::shop::about::ShopAboutRepository;
use khoomi_platform::shop::compliance::ComplianceRepository;
use khoomi_platform::shop::return_policy::ReturnPolicyRepository;
use khoomi_platform::shop::verification::VerificationRepository;
use khoomi_platform::writer::{LoginAttempt, NewShop, Registration};
use khoomi_platform::*;

const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017/?replicaSet=rs0&directConnection=true";

struct Harness {
    store: Store,
    writer: AggregateWriter,
    users: UserRepository,
    shops: ShopRepository,
}

impl Harness {
    async fn new(name: &str) -> Self {
        let uri = std::env::var("KHOOMI_TEST_MONGO_URI").unwrap_or_else(|_| DEFAULT_MONGO_URI.to_string());
        let database = format!("khoomi_it_{}_{}", name, std::process::id());
        let store = Store::connect(&uri, &database).await.expect("Failed to connect to MongoDB");
        initialize_indexes(store.database()).await.expect("Failed to create indexes");

        let passwords = Arc::new(PasswordService::new(Argon2Config::testing(), PasswordPolicy::default()).unwrap());
        let writer = AggregateWriter::new(
            store.clone(),
            passwords,
            Arc::new(DisabledMediaHost),
            WriterSettings::default(),
        );
        let users = UserRepository::new(store.database());
        let shops = ShopRepository::new(store.database());

        Self { store, writer, users, shops }
    }

    async fn register(&self, email: &str, first_name: &str) -> User {
        self.writer
            .register(Registration {
                email: email.to_string(),
                password: "Sup3r-secret!".to_string(),
                first_name: first_name.to_string(),
                last_name: "Tester".to_string(),
            })
            .await
            .expect("Failed to register user")
    }

    async fn open_shop(&self, owner: &User, username: &str) -> Shop {
        self.writer
            .create_shop(
                &owner.id,
                NewShop {
                    name: "Clay and Kiln".to_string(),
                    username: username.to_string(),
                    description: "Hand thrown stoneware".to_string(),
                    logo: None,
                    banner: None,
                },
            )
            .await
            .expect("Failed to create shop")
    }

    async fn outbox(&self, kind: &str) -> Vec<MailOutboxItem> {
        self.store
            .database()
            .collection::<MailOutboxItem>(MAIL_OUTBOX)
            .find(doc! { "kind": kind })
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap()
    }

    async fn login(&self, email: &str, ip: &str) -> Result<User> {
        self.writer
            .authenticate(LoginAttempt {
                email,
                password: "Sup3r-secret!",
                ip,
                user_agent: "integration-tests",
            })
            .await
    }

    async fn teardown(self) {
        let _ = self.store.database().drop().await;
    }
}

#[tokio::test]
async fn test_duplicate_email_is_rejected() {
    let h = Harness::new("duplicate_email").await;
    h.register("potter@example.com", "Ada").await;

    let second = h
        .writer
        .register(Registration {
            email: "Potter@Example.com".to_string(),
            password: "Sup3r-secret!".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Tester".to_string(),
        })
        .await;

    assert!(matches!(second, Err(PlatformError::Conflict { code: "DUPLICATE_EMAIL", .. })), "{:?}", second);
    h.teardown().await;
}

#[tokio::test]
async fn test_shop_creation_promotes_owner() {
    let h = Harness::new("shop_creation").await;
    let owner = h.register("owner@example.com", "Ada").await;
    let shop = h.open_shop(&owner, "clayandkiln").await;

    let owner = h.users.get(&owner.id).await.unwrap();
    assert!(owner.is_seller);
    assert_eq!(owner.shop_id.as_deref(), Some(shop.id.as_str()));

    let again = h
        .writer
        .create_shop(
            &owner.id,
            NewShop {
                name: "Second".to_string(),
                username: "secondshop".to_string(),
                description: "Another one".to_string(),
                logo: None,
                banner: None,
            },
        )
        .await;
    assert!(again.is_err());
    h.teardown().await;
}

#[tokio::test]
async fn test_follow_keeps_count_and_excerpts_in_step() {
    let h = Harness::new("follow").await;
    let owner = h.register("owner@example.com", "Ada").await;
    let fan = h.register("fan@example.com", "Grace").await;
    let shop = h.open_shop(&owner, "clayandkiln").await;

    h.writer.follow_shop(&fan.id, &shop.id).await.unwrap();
    let repeat = h.writer.follow_shop(&fan.id, &shop.id).await;
    assert!(matches!(repeat, Err(PlatformError::Conflict { code: "ALREADY_FOLLOWING", .. })));

    let followed = h.shops.get(&shop.id).await.unwrap();
    assert_eq!(followed.follower_count, 1);
    assert_eq!(followed.followers.len(), 1);
    assert_eq!(followed.followers[0].user_id, fan.id);
    assert!(h.shops.is_following(&shop.id, &fan.id).await.unwrap());

    let fan_after = h.users.get(&fan.id).await.unwrap();
    assert!(fan_after.favorite_shops.contains(&shop.id));

    h.writer.unfollow_shop(&fan.id, &shop.id).await.unwrap();
    let unfollowed = h.shops.get(&shop.id).await.unwrap();
    assert_eq!(unfollowed.follower_count, 0);
    assert!(unfollowed.followers.is_empty());

    let missing = h.writer.unfollow_shop(&fan.id, &shop.id).await;
    assert!(matches!(missing, Err(PlatformError::Conflict { code: "NOT_FOLLOWING", .. })));
    h.teardown().await;
}

#[tokio::test]
async fn test_owner_cannot_review_own_shop() {
    let h = Harness::new("own_review").await;
    let owner = h.register("owner@example.com", "Ada").await;
    let shop = h.open_shop(&owner, "clayandkiln").await;

    let result = h.writer.create_review(&owner.id, &shop.id, "Lovely work").await;
    assert!(matches!(result, Err(PlatformError::Unprocessable { .. })), "{:?}", result);

    let unchanged = h.shops.get(&shop.id).await.unwrap();
    assert_eq!(unchanged.reviews_count, 0);
    h.teardown().await;
}

#[tokio::test]
async fn test_review_updates_count_and_recent_reviews() {
    let h = Harness::new("review").await;
    let owner = h.register("owner@example.com", "Ada").await;
    let buyer = h.register("buyer@example.com", "Grace").await;
    let shop = h.open_shop(&owner, "clayandkiln").await;

    h.writer.create_review(&buyer.id, &shop.id, "  Beautiful mugs  ").await.unwrap();
    let reviewed = h.shops.get(&shop.id).await.unwrap();
    assert_eq!(reviewed.reviews_count, 1);
    assert_eq!(reviewed.recent_reviews.len(), 1);
    assert_eq!(reviewed.recent_reviews[0].review, "Beautiful mugs");

    h.writer.delete_my_review(&buyer.id, &shop.id).await.unwrap();
    let cleared = h.shops.get(&shop.id).await.unwrap();
    assert_eq!(cleared.reviews_count, 0);
    assert!(cleared.recent_reviews.is_empty());
    h.teardown().await;
}

fn address(street: &str, is_default: bool) -> AddressInput {
    AddressInput {
        city: "Lagos".to_string(),
        state: "Lagos".to_string(),
        street: street.to_string(),
        postal_code: "100001".to_string(),
        country: "NG".to_string(),
        is_default_shipping_address: is_default,
    }
}

fn bank_account(number: &str, is_default: bool) -> PaymentInput {
    PaymentInput {
        bank_name: "First Bank".to_string(),
        account_name: "Ada Tester".to_string(),
        account_number: number.to_string(),
        is_default,
    }
}

/// Code embedded in a queued mail's link (`...&token=<code>`)
fn link_code(item: &MailOutboxItem) -> String {
    let start = item.text_body.find("token=").expect("mail has no token link") + "token=".len();
    item.text_body[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect()
}

#[tokio::test]
async fn test_default_payment_account_moves() {
    let h = Harness::new("payment_default").await;
    let seller = h.register("seller@example.com", "Ada").await;
    let payments = PaymentRepository::new(h.store.database());

    let first: PaymentInformation = h
        .writer
        .insert_flagged(PaymentInformation::new(&seller.id, bank_account("0123456789", true)))
        .await
        .unwrap();
    h.writer
        .insert_flagged(PaymentInformation::new(&seller.id, bank_account("1123456789", false)))
        .await
        .unwrap();
    let third: PaymentInformation = h
        .writer
        .insert_flagged(PaymentInformation::new(&seller.id, bank_account("2123456789", false)))
        .await
        .unwrap();

    let moved: PaymentInformation = h.writer.set_default(&seller.id, &third.id).await.unwrap();
    assert!(moved.is_default);

    let accounts = payments.list(&seller.id).await.unwrap();
    let defaults: Vec<&str> = accounts.iter().filter(|a| a.is_default).map(|a| a.id.as_str()).collect();
    assert_eq!(defaults, vec![third.id.as_str()]);
    assert!(accounts.iter().any(|a| a.id == first.id && !a.is_default));

    let fourth = h
        .writer
        .insert_flagged(PaymentInformation::new(&seller.id, bank_account("3123456789", true)))
        .await;
    assert!(matches!(fourth, Err(PlatformError::LimitReached { limit: 3, .. })), "{:?}", fourth);
    assert_eq!(payments.list(&seller.id).await.unwrap().len(), 3);
    h.teardown().await;
}

#[tokio::test]
async fn test_addresses_keep_one_default_and_cap_at_five() {
    let h = Harness::new("address_limit").await;
    let user = h.register("buyer@example.com", "Grace").await;
    let addresses = AddressRepository::new(h.store.database());

    for i in 0..5 {
        let _: UserAddress = h
            .writer
            .insert_flagged(UserAddress::new(&user.id, address(&format!("{} Broad St", i), true)))
            .await
            .unwrap();
    }
    let stored = addresses.list(&user.id).await.unwrap();
    assert_eq!(stored.len(), 5);
    assert_eq!(stored.iter().filter(|a| a.is_default_shipping_address).count(), 1);

    let sixth = h
        .writer
        .insert_flagged(UserAddress::new(&user.id, address("6 Broad St", false)))
        .await;
    assert!(matches!(sixth, Err(PlatformError::LimitReached { limit: 5, .. })), "{:?}", sixth);
    h.teardown().await;
}

#[tokio::test]
async fn test_editing_default_address_without_flag_clears_it() {
    let h = Harness::new("address_edit").await;
    let user = h.register("buyer@example.com", "Grace").await;
    let addresses = AddressRepository::new(h.store.database());

    let home: UserAddress = h
        .writer
        .insert_flagged(UserAddress::new(&user.id, address("1 Broad St", true)))
        .await
        .unwrap();
    let edited: UserAddress = h
        .writer
        .update_flagged(&user.id, &home.id, address("2 Marina Rd", false).to_set_document(), false)
        .await
        .unwrap();

    assert_eq!(edited.street, "2 Marina Rd");
    assert!(!edited.is_default_shipping_address);
    assert!(addresses.find_default(&user.id).await.unwrap().is_none());
    h.teardown().await;
}

#[tokio::test]
async fn test_password_reset_code_is_single_use() {
    let h = Harness::new("password_reset").await;
    let user = h.register("ada@example.com", "Ada").await;

    h.writer.request_password_reset("ADA@example.com").await.unwrap();
    let queued = h.outbox("password_reset").await;
    assert_eq!(queued.len(), 1);
    let code = link_code(&queued[0]);

    let wrong = h.writer.reset_password(&user.id, "not-the-code", "N3w-password!").await;
    assert!(matches!(wrong, Err(PlatformError::InvalidToken { .. })), "{:?}", wrong);

    h.writer.reset_password(&user.id, &code, "N3w-password!").await.unwrap();
    let remaining = h
        .store
        .database()
        .collection::<bson::Document>(SecureTokenKind::PasswordReset.collection_name())
        .count_documents(doc! { "user_uid": &user.id })
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    let reused = h.writer.reset_password(&user.id, &code, "An0ther-one!").await;
    assert!(matches!(reused, Err(PlatformError::InvalidToken { .. })), "{:?}", reused);

    let old = h.login("ada@example.com", "10.0.0.1").await;
    assert!(matches!(old, Err(PlatformError::InvalidCredentials)));
    let fresh = h
        .writer
        .authenticate(LoginAttempt {
            email: "ada@example.com",
            password: "N3w-password!",
            ip: "10.0.0.1",
            user_agent: "integration-tests",
        })
        .await;
    assert!(fresh.is_ok());
    assert_eq!(h.outbox("password_reset_confirmation").await.len(), 1);
    h.teardown().await;
}

#[tokio::test]
async fn test_expired_reset_code_is_rejected() {
    let h = Harness::new("password_reset_expired").await;
    let user = h.register("ada@example.com", "Ada").await;

    h.writer.request_password_reset("ada@example.com").await.unwrap();
    let code = link_code(&h.outbox("password_reset").await[0]);
    h.store
        .database()
        .collection::<bson::Document>(SecureTokenKind::PasswordReset.collection_name())
        .update_one(
            doc! { "user_uid": &user.id },
            doc! { "$set": { "expires_at": bson::DateTime::from_millis(0) } },
        )
        .await
        .unwrap();

    let expired = h.writer.reset_password(&user.id, &code, "N3w-password!").await;
    assert!(matches!(expired, Err(PlatformError::InvalidToken { .. })), "{:?}", expired);
    assert!(h.login("ada@example.com", "10.0.0.1").await.is_ok());
    h.teardown().await;
}

#[tokio::test]
async fn test_verification_code_activates_once() {
    let h = Harness::new("verify_email").await;
    let user = h.register("ada@example.com", "Ada").await;
    let code = link_code(&h.outbox("verify_email").await[0]);

    let verified = h.writer.verify_email(&user.id, &code).await.unwrap();
    assert!(verified.auth.email_verified);
    assert_eq!(verified.status, UserStatus::Active);

    let reused = h.writer.verify_email(&user.id, &code).await;
    assert!(matches!(reused, Err(PlatformError::InvalidToken { .. })), "{:?}", reused);
    h.teardown().await;
}

#[tokio::test]
async fn test_login_from_new_address_queues_one_alert() {
    let h = Harness::new("login_alert").await;
    h.register("ada@example.com", "Ada").await;

    h.login("ada@example.com", "10.0.0.1").await.unwrap();
    assert!(h.outbox("login_ip_alert").await.is_empty());

    h.login("ada@example.com", "10.0.0.1").await.unwrap();
    assert!(h.outbox("login_ip_alert").await.is_empty());

    let user = h.login("ada@example.com", "203.0.113.7").await.unwrap();
    assert_eq!(user.last_login_ip.as_deref(), Some("203.0.113.7"));
    let alerts = h.outbox("login_ip_alert").await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].to, "ada@example.com");
    assert!(alerts[0].text_body.contains("203.0.113.7"));
    h.teardown().await;
}

#[tokio::test]
async fn test_sent_mail_no_longer_holds_the_code() {
    let h = Harness::new("outbox_scrub").await;
    h.register("ada@example.com", "Ada").await;
    let outbox = MailOutboxRepository::new(h.store.database());

    // Welcome and verification mails were queued at registration
    while let Some(item) = outbox.claim_next().await.unwrap() {
        outbox.mark_sent(&item.id).await.unwrap();
    }

    let verification = h.outbox("verify_email").await;
    assert_eq!(verification.len(), 1);
    assert_eq!(verification[0].status, OutboxStatus::Sent);
    assert!(!verification[0].text_body.contains("token="));
    assert!(verification[0].html_body.is_empty());
    assert!(verification[0].finished_at.is_some());
    h.teardown().await;
}

#[tokio::test]
async fn test_owner_removes_follower_and_review() {
    let h = Harness::new("owner_moderation").await;
    let owner = h.register("owner@example.com", "Ada").await;
    let fan = h.register("fan@example.com", "Grace").await;
    let shop = h.open_shop(&owner, "clayandkiln").await;

    h.writer.follow_shop(&fan.id, &shop.id).await.unwrap();
    h.writer.create_review(&fan.id, &shop.id, "Lovely glaze").await.unwrap();

    let own = h.writer.remove_other_follower(&owner.id, &shop.id, &owner.id).await;
    assert!(matches!(own, Err(PlatformError::Validation { .. })));

    h.writer.remove_other_follower(&owner.id, &shop.id, &fan.id).await.unwrap();
    h.writer.delete_other_review(&shop.id, &fan.id).await.unwrap();

    let after = h.shops.get(&shop.id).await.unwrap();
    assert_eq!(after.follower_count, 0);
    assert!(after.followers.is_empty());
    assert_eq!(after.reviews_count, 0);
    assert!(after.recent_reviews.is_empty());
    assert!(!h.shops.is_following(&shop.id, &fan.id).await.unwrap());

    let again = h.writer.delete_other_review(&shop.id, &fan.id).await;
    assert!(matches!(again, Err(PlatformError::NotFound { .. })), "{:?}", again);
    h.teardown().await;
}

#[tokio::test]
async fn test_non_owner_cannot_patch_about_page() {
    let h = Harness::new("about_patch").await;
    let owner = h.register("owner@example.com", "Ada").await;
    let intruder = h.register("intruder@example.com", "Mallory").await;
    let shop = h.open_shop(&owner, "clayandkiln").await;

    let db = h.store.database().clone();
    let passwords = Arc::new(PasswordService::new(Argon2Config::testing(), PasswordPolicy::default()).unwrap());
    let auth = Arc::new(AuthService::new(AuthConfig::default(), passwords, Arc::new(MemoryTokenStore::new())));
    let authz = Arc::new(AuthorizationService::new(&db));
    let about_repo = Arc::new(ShopAboutRepository::new(&db));
    let api = shop_profile_router(ShopProfileState {
        shop_repo: Arc::new(ShopRepository::new(&db)),
        about_repo: about_repo.clone(),
        return_policy_repo: Arc::new(ReturnPolicyRepository::new(&db)),
        compliance_repo: Arc::new(ComplianceRepository::new(&db)),
        verification_repo: Arc::new(VerificationRepository::new(&db)),
        authz_service: authz.clone(),
    });
    let (router, _) = OpenApiRouter::new().nest("/api", api).split_for_parts();
    let router = router.layer(AuthLayer::new(AppState {
        auth_service: auth.clone(),
        authz_service: authz,
        trusted_proxies: TrustedProxies::default(),
    }));

    let before = about_repo.find_by_shop(&shop.id).await.unwrap().unwrap();
    let patch = |user: &User, headline: &str| {
        let principal = Principal {
            user_id: &user.id,
            email: &user.primary_email,
            login_name: &user.login_name,
            is_seller: user.is_seller,
        };
        let (token, _) = auth.mint_access(&principal).unwrap();
        Request::builder()
            .method(Method::PATCH)
            .uri(format!("/api/shops/{}/about", shop.id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::json!({ "headline": headline }).to_string()))
            .unwrap()
    };

    let response = router.clone().oneshot(patch(&intruder, "Taken over")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let unchanged = about_repo.find_by_shop(&shop.id).await.unwrap().unwrap();
    assert_eq!(unchanged.headline, before.headline);
    assert_eq!(unchanged.story, before.story);

    let owner = h.users.get(&owner.id).await.unwrap();
    let response = router.clone().oneshot(patch(&owner, "Stoneware from Jos")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let patched = about_repo.find_by_shop(&shop.id).await.unwrap().unwrap();
    assert_eq!(patched.headline, "Stoneware from Jos");
    assert_eq!(patched.story, before.story);
    h.teardown().await;
}
