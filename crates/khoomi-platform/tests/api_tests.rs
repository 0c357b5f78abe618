//! Platform API Integration Tests
//!
//! Drives the assembled routers through `tower::ServiceExt::oneshot`. The
//! MongoDB client is created lazily and never reached: every request here is
//! settled by authentication, authorization, or input validation first.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use utoipa_axum::router::OpenApiRouter;

use khoomi_platform::auth::{
    Argon2Config, AuthConfig, AuthService, MemoryTokenStore, PasswordPolicy, PasswordService, Principal,
};
use khoomi_platform::media::DisabledMediaHost;
use khoomi_platform::shared::{envelope_routing_misses, AppState, AuthLayer, AuthorizationService, TrustedProxies};
use khoomi_platform::shop::about::ShopAboutRepository;
use khoomi_platform::shop::compliance::ComplianceRepository;
use khoomi_platform::shop::return_policy::ReturnPolicyRepository;
use khoomi_platform::shop::verification::VerificationRepository;
use khoomi_platform::*;

const ALICE: &str = "65a1b2c3d4e5f60718293a4b";
const BOB: &str = "65a1b2c3d4e5f60718293a4c";

struct TestApp {
    router: Router,
    openapi: utoipa::openapi::OpenApi,
    auth: Arc<AuthService>,
}

impl TestApp {
    async fn new() -> Self {
        let store = Store::connect(
            "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200&connectTimeoutMS=200",
            "khoomi_api_tests",
        )
        .await
        .unwrap();
        let db = store.database().clone();

        let passwords = Arc::new(PasswordService::new(Argon2Config::testing(), PasswordPolicy::default()).unwrap());
        let auth = Arc::new(AuthService::new(
            AuthConfig::default(),
            passwords.clone(),
            Arc::new(MemoryTokenStore::new()),
        ));
        let authz = Arc::new(AuthorizationService::new(&db));
        let writer = Arc::new(AggregateWriter::new(
            store,
            passwords,
            Arc::new(DisabledMediaHost),
            WriterSettings::default(),
        ));
        let shop_repo = Arc::new(ShopRepository::new(&db));
        let shops_state = ShopsState {
            shop_repo: shop_repo.clone(),
            writer: writer.clone(),
            authz_service: authz.clone(),
        };

        let api = OpenApiRouter::new()
            .merge(users_router(UsersState {
                user_repo: Arc::new(UserRepository::new(&db)),
                writer: writer.clone(),
                auth_service: auth.clone(),
                authz_service: authz.clone(),
            }))
            .merge(addresses_router(AddressesState {
                address_repo: Arc::new(AddressRepository::new(&db)),
                writer: writer.clone(),
                authz_service: authz.clone(),
            }))
            .merge(wishlist_router(WishlistState {
                wishlist_repo: Arc::new(WishlistRepository::new(&db)),
                writer: writer.clone(),
                authz_service: authz.clone(),
            }))
            .merge(notifications_router(NotificationsState {
                notification_repo: Arc::new(NotificationRepository::new(&db)),
                authz_service: authz.clone(),
            }))
            .merge(shops_router(shops_state.clone()))
            .merge(shop_community_router(shops_state))
            .merge(shop_profile_router(ShopProfileState {
                shop_repo: shop_repo.clone(),
                about_repo: Arc::new(ShopAboutRepository::new(&db)),
                return_policy_repo: Arc::new(ReturnPolicyRepository::new(&db)),
                compliance_repo: Arc::new(ComplianceRepository::new(&db)),
                verification_repo: Arc::new(VerificationRepository::new(&db)),
                authz_service: authz.clone(),
            }))
            .merge(listings_router(ListingsState {
                listing_repo: Arc::new(ListingRepository::new(&db)),
                shop_repo,
                writer,
                authz_service: authz.clone(),
            }))
            .merge(categories_router(CategoriesState {
                category_repo: Arc::new(CategoryRepository::new(&db)),
                authz_service: authz.clone(),
            }));

        let (router, openapi) = OpenApiRouter::new().nest("/api", api).split_for_parts();
        let router = router
            .layer(AuthLayer::new(AppState {
                auth_service: auth.clone(),
                authz_service: authz,
                trusted_proxies: TrustedProxies::default(),
            }))
            .layer(axum::middleware::from_fn(envelope_routing_misses));

        Self { router, openapi, auth }
    }

    fn access_token(&self, user_id: &str) -> String {
        let principal = Principal {
            user_id,
            email: "alice@example.com",
            login_name: "alicemaker1234",
            is_seller: false,
        };
        self.auth.mint_access(&principal).unwrap().0
    }

    fn refresh_token(&self, user_id: &str) -> String {
        let principal = Principal {
            user_id,
            email: "alice@example.com",
            login_name: "alicemaker1234",
            is_seller: false,
        };
        self.auth.mint_refresh(&principal).unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn json(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

mod authentication_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let app = TestApp::new().await;
        let (status, body) = app.send(get("/api/users/me", None)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let app = TestApp::new().await;
        let (status, body) = app.send(get("/api/users/me", Some("not.a.jwt"))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_refresh_token_cannot_authenticate_requests() {
        let app = TestApp::new().await;
        let refresh = app.refresh_token(ALICE);
        let (status, body) = app.send(get("/api/users/me", Some(&refresh))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_access_token_cannot_refresh() {
        let app = TestApp::new().await;
        let access = app.access_token(ALICE);
        let request = json(Method::POST, "/api/users/refresh", None, serde_json::json!({ "token": access }));
        let (status, body) = app.send(request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_logout_revokes_the_token() {
        let app = TestApp::new().await;
        let token = app.access_token(ALICE);

        let logout = Request::builder()
            .method(Method::POST)
            .uri("/api/users/logout")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let (status, body) = app.send(logout).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");

        let (status, body) = app.send(get("/api/users/me", Some(&token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "TOKEN_REVOKED");
    }
}

mod authorization_tests {
    use super::*;

    #[tokio::test]
    async fn test_cannot_read_another_users_addresses() {
        let app = TestApp::new().await;
        let token = app.access_token(ALICE);
        let (status, body) = app.send(get(&format!("/api/users/{}/addresses", BOB), Some(&token))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_cannot_change_another_users_notifications() {
        let app = TestApp::new().await;
        let token = app.access_token(ALICE);
        let request = json(
            Method::PATCH,
            &format!("/api/users/{}/notifications", BOB),
            Some(&token),
            serde_json::json!({ "field": "new_message", "value": false }),
        );
        let (status, _) = app.send(request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wishlist_requires_authentication() {
        let app = TestApp::new().await;
        let request = json(
            Method::POST,
            &format!("/api/users/{}/wishlist", ALICE),
            None,
            serde_json::json!({ "listing_id": BOB }),
        );
        let (status, _) = app.send(request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

mod routing_tests {
    use super::*;

    #[tokio::test]
    async fn test_about_patch_is_routed_and_authenticated() {
        let app = TestApp::new().await;
        let uri = format!("/api/shops/{}/about", ALICE);
        let (status, body) = app
            .send(json(Method::PATCH, &uri, None, serde_json::json!({ "headline": "Taken over" })))
            .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_unsupported_method_uses_error_envelope() {
        let app = TestApp::new().await;
        let uri = format!("/api/shops/{}/about", ALICE);
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(&uri)
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let allow = response
            .headers()
            .get(header::ALLOW)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(allow.contains("PATCH"), "allow header was {:?}", allow);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "METHOD_NOT_ALLOWED");
        assert!(body["message"].as_str().unwrap().contains("DELETE"));
    }

    #[tokio::test]
    async fn test_unknown_route_uses_error_envelope() {
        let app = TestApp::new().await;
        let (status, body) = app.send(get("/api/no-such-thing", None)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "NOT_FOUND");
    }
}

mod validation_tests {
    use super::*;

    #[tokio::test]
    async fn test_registration_rejects_invalid_email() {
        let app = TestApp::new().await;
        let request = json(
            Method::POST,
            "/api/users",
            None,
            serde_json::json!({
                "email": "not-an-email",
                "password": "Sup3r-secret!",
                "first_name": "Ada",
                "last_name": "Lovelace"
            }),
        );
        let (status, body) = app.send(request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = TestApp::new().await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/users/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"email\": "))
            .unwrap();
        let (status, body) = app.send(request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_invalid_ids_are_rejected_before_lookup() {
        let app = TestApp::new().await;

        let (status, _) = app.send(get("/api/listings/not-an-id", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.send(get("/api/shops/xyz/followers", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_pagination_bounds() {
        let app = TestApp::new().await;

        let (status, body) = app.send(get("/api/shops?limit=0", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("limit"));

        let (status, _) = app.send(get("/api/listings?limit=1000", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_sort_field_is_rejected() {
        let app = TestApp::new().await;
        let (status, _) = app.send(get("/api/listings?sort=-password", None)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod openapi_tests {
    use super::*;

    #[tokio::test]
    async fn test_document_lists_routes_under_api() {
        let app = TestApp::new().await;
        let paths: Vec<&String> = app.openapi.paths.paths.keys().collect();

        for expected in [
            "/api/users",
            "/api/users/login",
            "/api/users/refresh",
            "/api/users/{id}/addresses",
            "/api/users/{id}/wishlist",
            "/api/users/{id}/notifications",
            "/api/shops",
            "/api/shops/{id}",
            "/api/shops/{id}/followers",
            "/api/shops/{id}/reviews",
            "/api/shops/{id}/about",
            "/api/shops/{id}/policies",
            "/api/shops/{id}/compliance",
            "/api/shops/{id}/verification",
            "/api/shops/{id}/listings",
            "/api/listings",
            "/api/listings/{id}",
            "/api/categories",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing {} in {:?}",
                expected,
                paths
            );
        }
    }

    #[tokio::test]
    async fn test_about_page_documents_put_and_patch() {
        let app = TestApp::new().await;
        let item = app.openapi.paths.paths.get("/api/shops/{id}/about").unwrap();
        assert!(item.put.is_some());
        assert!(item.patch.is_some());
    }
}
