//! Khoomi API Server
//!
//! Serves the marketplace REST API under `/api`, with Swagger UI at
//! `/swagger-ui` and liveness/readiness at `/health` and `/ready`. A
//! background task drains the mail outbox.
//!
//! ## Configuration
//!
//! Read from `khoomi.toml` (or `KHOOMI_CONFIG`), then `KHOOMI_*` environment
//! overrides. See `khoomi_config::AppConfig::example_toml`.
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `KHOOMI_MONGODB_URI` | MongoDB replica set URI |
//! | `KHOOMI_REDIS_URL` | Token revocation store |
//! | `KHOOMI_JWT_SECRET` | HS256 signing secret |
//! | `KHOOMI_DEV_MODE` | In-memory revocations and log-only mail |
//! | `RUST_LOG` / `LOG_FORMAT` | Log filter and `json` output |

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use khoomi_config::AppConfig;
use khoomi_platform::auth::{
    Argon2Config, AuthConfig, AuthService, MemoryTokenStore, PasswordPolicy, PasswordService, RedisTokenStore,
    TokenStore,
};
use khoomi_platform::mail::{LogMailer, MailOutboxProcessor, MailOutboxRepository, Mailer, ProcessorConfig, SmtpMailer};
use khoomi_platform::media::{DisabledMediaHost, HttpMediaHost, HttpMediaHostConfig, MediaHost};
use khoomi_platform::shared::{
    enforce_deadline, envelope_routing_misses, health_router, initialize_indexes, AppState, AuthLayer,
    AuthorizationService, DeadlinePolicy, HealthState, TrustedProxies,
};
use khoomi_platform::shop::about::ShopAboutRepository;
use khoomi_platform::shop::compliance::ComplianceRepository;
use khoomi_platform::shop::return_policy::ReturnPolicyRepository;
use khoomi_platform::shop::verification::VerificationRepository;
use khoomi_platform::{
    addresses_router, categories_router, listings_router, notifications_router, payments_router,
    shipping_profiles_router, shop_community_router, shop_profile_router, shops_router, users_router,
    wishlist_router, AddressRepository, AddressesState, AggregateWriter, CategoriesState, CategoryRepository,
    ListingRepository, ListingsState, NotificationRepository, NotificationsState, PaymentRepository, PaymentsState,
    ShippingProfileRepository, ShippingProfilesState, ShopProfileState, ShopRepository, ShopsState, Store,
    UserRepository, UsersState, WishlistRepository, WishlistState, WriterSettings,
};

#[tokio::main]
async fn main() -> Result<()> {
    khoomi_common::init_logging("khoomi-server");

    let config = AppConfig::load().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    info!(dev_mode = config.dev_mode, "Starting Khoomi API server");

    // MongoDB
    info!(database = %config.mongodb.database, "Connecting to MongoDB");
    let store = Store::connect(&config.mongodb.uri, &config.mongodb.database).await?;
    store.ping().await.context("MongoDB is not reachable")?;
    initialize_indexes(store.database()).await?;
    let db = store.database().clone();

    // Token revocations
    let token_store: Arc<dyn TokenStore> = if config.dev_mode && config.redis.url.is_empty() {
        warn!("Using in-memory token revocation store");
        Arc::new(MemoryTokenStore::new())
    } else {
        Arc::new(RedisTokenStore::connect(&config.redis.url, config.redis.revocation_prefix.clone()).await?)
    };

    // Auth
    let password_service = Arc::new(PasswordService::new(Argon2Config::default(), PasswordPolicy::default())?);
    let auth_service = Arc::new(AuthService::new(
        AuthConfig::from(&config.auth),
        password_service.clone(),
        token_store.clone(),
    ));
    let authz_service = Arc::new(AuthorizationService::new(&db));
    info!("Auth services initialized");

    // Outbound integrations
    let media: Arc<dyn MediaHost> = if config.media.upload_url.is_empty() {
        warn!("No media host configured; image uploads will fail");
        Arc::new(DisabledMediaHost)
    } else {
        Arc::new(HttpMediaHost::new(HttpMediaHostConfig::from(&config.media))?)
    };
    let mailer: Arc<dyn Mailer> = if config.smtp.enabled {
        Arc::new(SmtpMailer::new(&config.smtp)?)
    } else {
        warn!("SMTP disabled; outgoing mail is logged only");
        Arc::new(LogMailer)
    };

    let writer = Arc::new(AggregateWriter::new(
        store.clone(),
        password_service,
        media,
        WriterSettings::from_config(&config),
    ));

    // Repositories
    let user_repo = Arc::new(UserRepository::new(&db));
    let shop_repo = Arc::new(ShopRepository::new(&db));
    let listing_repo = Arc::new(ListingRepository::new(&db));
    let category_repo = Arc::new(CategoryRepository::new(&db));

    let app_state = AppState {
        auth_service: auth_service.clone(),
        authz_service: authz_service.clone(),
        trusted_proxies: TrustedProxies::parse(config.http.trusted_proxies.as_slice())?,
    };

    // API states
    let users_state = UsersState {
        user_repo,
        writer: writer.clone(),
        auth_service,
        authz_service: authz_service.clone(),
    };
    let addresses_state = AddressesState {
        address_repo: Arc::new(AddressRepository::new(&db)),
        writer: writer.clone(),
        authz_service: authz_service.clone(),
    };
    let payments_state = PaymentsState {
        payment_repo: Arc::new(PaymentRepository::new(&db)),
        writer: writer.clone(),
        authz_service: authz_service.clone(),
    };
    let wishlist_state = WishlistState {
        wishlist_repo: Arc::new(WishlistRepository::new(&db)),
        writer: writer.clone(),
        authz_service: authz_service.clone(),
    };
    let notifications_state = NotificationsState {
        notification_repo: Arc::new(NotificationRepository::new(&db)),
        authz_service: authz_service.clone(),
    };
    let shops_state = ShopsState {
        shop_repo: shop_repo.clone(),
        writer: writer.clone(),
        authz_service: authz_service.clone(),
    };
    let shop_profile_state = ShopProfileState {
        shop_repo: shop_repo.clone(),
        about_repo: Arc::new(ShopAboutRepository::new(&db)),
        return_policy_repo: Arc::new(ReturnPolicyRepository::new(&db)),
        compliance_repo: Arc::new(ComplianceRepository::new(&db)),
        verification_repo: Arc::new(VerificationRepository::new(&db)),
        authz_service: authz_service.clone(),
    };
    let shipping_state = ShippingProfilesState {
        shipping_repo: Arc::new(ShippingProfileRepository::new(&db)),
        authz_service: authz_service.clone(),
    };
    let listings_state = ListingsState {
        listing_repo,
        shop_repo,
        writer,
        authz_service: authz_service.clone(),
    };
    let categories_state = CategoriesState {
        category_repo,
        authz_service,
    };

    // Handlers declare absolute paths; everything is served under /api
    let api = OpenApiRouter::new()
        .merge(users_router(users_state))
        .merge(addresses_router(addresses_state))
        .merge(payments_router(payments_state))
        .merge(wishlist_router(wishlist_state))
        .merge(notifications_router(notifications_state))
        .merge(shops_router(shops_state.clone()))
        .merge(shop_community_router(shops_state))
        .merge(shop_profile_router(shop_profile_state))
        .merge(shipping_profiles_router(shipping_state))
        .merge(listings_router(listings_state))
        .merge(categories_router(categories_state));

    let (router, mut openapi) = OpenApiRouter::new().nest("/api", api).split_for_parts();

    openapi.info.title = "Khoomi Marketplace API".to_string();
    openapi.info.version = env!("CARGO_PKG_VERSION").to_string();
    openapi.info.description = Some("Accounts, shops, listings, and seller tooling".to_string());
    openapi
        .components
        .get_or_insert_with(utoipa::openapi::Components::default)
        .add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
        );

    let health_state = HealthState::new(
        Some(store.clone()),
        Some(token_store),
        Some(env!("CARGO_PKG_VERSION").to_string()),
    );
    let deadlines = Arc::new(DeadlinePolicy::from(&config.deadlines));

    let app = Router::new()
        .merge(router)
        .merge(SwaggerUi::new("/swagger-ui").url("/q/openapi", openapi))
        .layer(axum::middleware::from_fn_with_state(deadlines, enforce_deadline))
        .layer(DefaultBodyLimit::max(config.http.max_upload_bytes))
        .layer(AuthLayer::new(app_state))
        .merge(health_router(health_state.clone()))
        .layer(axum::middleware::from_fn(envelope_routing_misses))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.http.cors_origins));

    // Mail outbox
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let outbox = MailOutboxProcessor::new(
        Arc::new(MailOutboxRepository::new(&db)),
        mailer,
        ProcessorConfig::from(&config.mail_outbox),
    );
    let outbox_task = tokio::spawn(outbox.run(shutdown_rx));

    let addr = format!("{}:{}", config.http.host, config.http.port);
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("failed to bind {}", addr))?;
    info!("API server listening on http://{}", addr);
    info!("Swagger UI at http://{}/swagger-ui", addr);

    health_state.set_ready();
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(khoomi_common::shutdown_signal())
        .await?;

    info!("Shutdown signal received, stopping mail outbox");
    let _ = shutdown_tx.send(true);
    if let Err(e) = outbox_task.await {
        warn!(error = %e, "Mail outbox task ended abnormally");
    }

    info!("Khoomi API server shutdown complete");
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS];
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    if allowed.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any).allow_methods(methods).allow_headers(Any);
    }
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(methods)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
