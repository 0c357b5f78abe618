//! MongoDB Index Initialization
//!
//! Unique indexes here back the uniqueness rules the writers rely on
//! (duplicate email, one shop per user, one follow per user and shop, ...).

use std::time::Duration;

use mongodb::{bson::doc, bson::Document, options::IndexOptions, Database, IndexModel};
use tracing::info;

use crate::address::entity::USER_ADDRESSES;
use crate::auth::secure_token::{EMAIL_VERIFICATION_TOKENS, PASSWORD_RESET_TOKENS};
use crate::category::entity::CATEGORIES;
use crate::listing::entity::LISTINGS;
use crate::mail::outbox::{FINISHED_MAIL_RETENTION, MAIL_OUTBOX};
use crate::notification::entity::NOTIFICATION_SETTINGS;
use crate::payment::entity::PAYMENT_INFORMATION;
use crate::shipping::entity::SHIPPING_PROFILES;
use crate::shop::about::SHOP_ABOUT;
use crate::shop::compliance::SHOP_COMPLIANCE_POLICIES;
use crate::shop::entity::{SHOPS, SHOP_FOLLOWERS, SHOP_REVIEWS};
use crate::shop::return_policy::SHOP_RETURN_POLICIES;
use crate::shop::verification::SELLER_VERIFICATIONS;
use crate::user::entity::{DELETION_REQUESTS, LOGIN_HISTORIES, USERS};
use crate::wishlist::entity::USER_WISHLISTS;

fn plain(keys: Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn unique(keys: Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create(db: &Database, collection: &str, indexes: Vec<IndexModel>) -> Result<(), mongodb::error::Error> {
    db.collection::<Document>(collection).create_indexes(indexes).await?;
    info!("Created indexes on {}", collection);
    Ok(())
}

/// Initialize all MongoDB indexes
pub async fn initialize_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    info!("Initializing MongoDB indexes...");

    create_user_indexes(db).await?;
    create_shop_indexes(db).await?;
    create_listing_indexes(db).await?;
    create_misc_indexes(db).await?;

    info!("MongoDB indexes initialized successfully");
    Ok(())
}

async fn create_user_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    create(
        db,
        USERS,
        vec![unique(doc! { "primary_email": 1 }), unique(doc! { "login_name": 1 })],
    )
    .await?;
    create(db, USER_ADDRESSES, vec![plain(doc! { "user_id": 1, "is_default_shipping_address": -1 })]).await?;
    create(db, PAYMENT_INFORMATION, vec![plain(doc! { "user_id": 1, "is_default": -1 })]).await?;
    create(db, NOTIFICATION_SETTINGS, vec![unique(doc! { "user_id": 1 })]).await?;
    create(db, USER_WISHLISTS, vec![unique(doc! { "user_id": 1, "listing_id": 1 }), plain(doc! { "listing_id": 1 })])
        .await?;
    create(db, LOGIN_HISTORIES, vec![plain(doc! { "user_uid": 1, "date": -1 })]).await?;
    create(db, DELETION_REQUESTS, vec![unique(doc! { "user_id": 1 })]).await?;

    // Secure tokens: one per user, removed by the server once expired
    for collection in [PASSWORD_RESET_TOKENS, EMAIL_VERIFICATION_TOKENS] {
        create(
            db,
            collection,
            vec![
                unique(doc! { "user_uid": 1 }),
                IndexModel::builder()
                    .keys(doc! { "expires_at": 1 })
                    .options(IndexOptions::builder().expire_after(Duration::from_secs(0)).build())
                    .build(),
            ],
        )
        .await?;
    }
    Ok(())
}

async fn create_shop_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    create(
        db,
        SHOPS,
        vec![
            unique(doc! { "username": 1 }),
            unique(doc! { "slug": 1 }),
            unique(doc! { "user_id": 1 }),
            plain(doc! { "status": 1, "created_at": -1 }),
        ],
    )
    .await?;
    create(
        db,
        SHOP_FOLLOWERS,
        vec![unique(doc! { "shop_id": 1, "user_id": 1 }), plain(doc! { "shop_id": 1, "joined_at": -1 })],
    )
    .await?;
    create(
        db,
        SHOP_REVIEWS,
        vec![
            unique(doc! { "shop_id": 1, "user_id": 1 }),
            plain(doc! { "shop_id": 1, "status": 1, "created_at": -1 }),
        ],
    )
    .await?;
    create(db, SHOP_ABOUT, vec![unique(doc! { "shop_id": 1 })]).await?;
    create(db, SHOP_COMPLIANCE_POLICIES, vec![unique(doc! { "shop_id": 1 })]).await?;
    create(db, SELLER_VERIFICATIONS, vec![unique(doc! { "shop_id": 1 })]).await?;
    create(db, SHOP_RETURN_POLICIES, vec![plain(doc! { "shop_id": 1 })]).await?;
    create(db, SHIPPING_PROFILES, vec![plain(doc! { "shop_id": 1 })]).await?;
    Ok(())
}

async fn create_listing_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    create(
        db,
        LISTINGS,
        vec![
            plain(doc! { "shop_id": 1, "state.state": 1 }),
            plain(doc! { "state.state": 1, "details.category": 1 }),
            plain(doc! { "date.created_at": -1 }),
        ],
    )
    .await
}

async fn create_misc_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    create(db, CATEGORIES, vec![plain(doc! { "parent_id": 1 }), plain(doc! { "path": 1 })]).await?;
    create(
        db,
        MAIL_OUTBOX,
        vec![
            plain(doc! { "status": 1, "created_at": 1 }),
            // Only sent and failed rows carry finished_at
            IndexModel::builder()
                .keys(doc! { "finished_at": 1 })
                .options(IndexOptions::builder().expire_after(FINISHED_MAIL_RETENTION).build())
                .build(),
        ],
    )
    .await
}
