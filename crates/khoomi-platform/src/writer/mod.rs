//! Aggregate Writer
//!
//! The only code that opens MongoDB transactions. Every protocol that has to
//! keep a denormalized projection (follower excerpts, review excerpts,
//! default flags, counters) in step with its source collection lives here.
//!
//! Each protocol follows the same shape:
//!
//! ```ignore
//! let mut session = self.store.begin().await?;
//! let outcome = self.some_steps(&mut session, ...).await;
//! self.store.settle(session, outcome).await
//! ```
//!
//! Outgoing mail is written to the outbox inside the same transaction.

mod account;
mod defaults;
mod follow;
mod listing;
mod review;
mod shop;
mod wishlist;

use std::sync::Arc;

use bson::doc;
use chrono::Duration;
use mongodb::{ClientSession, Collection};

use crate::auth::password_service::PasswordService;
use crate::auth::secure_code;
use crate::auth::secure_token::{SecureToken, SecureTokenKind};
use crate::mail::outbox::{MailOutboxItem, MailOutboxRepository};
use crate::mail::templates::MailTemplate;
use crate::media::MediaHost;
use crate::shared::error::{PlatformError, Result};
use crate::store::{is_duplicate_key, Store};
use crate::user::entity::{User, USERS};

pub use account::{LoginAttempt, Registration};
pub use shop::NewShop;

/// Settings the protocols need beyond their collaborators.
#[derive(Debug, Clone)]
pub struct WriterSettings {
    /// Base URL for links in outgoing mail
    pub origin_url: String,
    pub secure_code_ttl: Duration,
    /// Root folder on the media host
    pub media_folder: String,
}

impl WriterSettings {
    pub fn from_config(config: &khoomi_config::AppConfig) -> Self {
        Self {
            origin_url: config.origin_url.clone(),
            secure_code_ttl: Duration::seconds(config.auth.secure_code_expiry_secs.max(60)),
            media_folder: config.media.folder.clone(),
        }
    }
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            origin_url: "https://khoomi.com".to_string(),
            secure_code_ttl: Duration::hours(1),
            media_folder: "khoomi".to_string(),
        }
    }
}

pub struct AggregateWriter {
    store: Store,
    passwords: Arc<PasswordService>,
    media: Arc<dyn MediaHost>,
    outbox: MailOutboxRepository,
    settings: WriterSettings,
}

impl AggregateWriter {
    pub fn new(
        store: Store,
        passwords: Arc<PasswordService>,
        media: Arc<dyn MediaHost>,
        settings: WriterSettings,
    ) -> Self {
        let outbox = MailOutboxRepository::new(store.database());
        Self {
            store,
            passwords,
            media,
            outbox,
            settings,
        }
    }

    pub fn media(&self) -> &dyn MediaHost {
        self.media.as_ref()
    }

    fn users(&self) -> Collection<User> {
        self.store.collection(USERS)
    }

    fn media_folder(&self, sub: &str) -> String {
        format!("{}/{}", self.settings.media_folder.trim_end_matches('/'), sub)
    }

    /// Load a user inside the transaction snapshot.
    async fn load_user(&self, session: &mut ClientSession, user_id: &str) -> Result<User> {
        self.users()
            .find_one(doc! { "_id": user_id })
            .session(&mut *session)
            .await?
            .ok_or_else(|| PlatformError::not_found("User", user_id))
    }

    /// Bump the owner's `modified_at` so concurrent protocols for the same
    /// user conflict on this document and one of them aborts.
    async fn touch_user(&self, session: &mut ClientSession, user_id: &str) -> Result<()> {
        let result = self
            .users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "modified_at": bson::DateTime::now() } },
            )
            .session(&mut *session)
            .await?;
        if result.matched_count == 0 {
            return Err(PlatformError::not_found("User", user_id));
        }
        Ok(())
    }

    async fn enqueue_mail(&self, session: &mut ClientSession, to: &str, template: MailTemplate<'_>) -> Result<()> {
        let rendered = template.render(&self.settings.origin_url)?;
        self.outbox.enqueue(session, &MailOutboxItem::new(to, rendered)).await
    }

    /// Replace any outstanding token of this kind; returns the plain code.
    async fn issue_secure_token(
        &self,
        session: &mut ClientSession,
        kind: SecureTokenKind,
        user_id: &str,
    ) -> Result<String> {
        let code = secure_code::generate();
        let token = SecureToken::new(user_id, code.digest, self.settings.secure_code_ttl);
        self.store
            .collection::<SecureToken>(kind.collection_name())
            .replace_one(doc! { "user_uid": user_id }, &token)
            .upsert(true)
            .session(&mut *session)
            .await?;
        Ok(code.code)
    }

    /// Single-use: the row is deleted, and the delete rolls back if the code
    /// is wrong or expired because the caller's transaction aborts.
    async fn consume_secure_token(
        &self,
        session: &mut ClientSession,
        kind: SecureTokenKind,
        user_id: &str,
        code: &str,
    ) -> Result<()> {
        let invalid = || PlatformError::InvalidToken {
            message: "link is invalid or has expired".to_string(),
        };
        let token = self
            .store
            .collection::<SecureToken>(kind.collection_name())
            .find_one_and_delete(doc! { "user_uid": user_id })
            .session(&mut *session)
            .await?
            .ok_or_else(invalid)?;

        if token.is_expired_at(chrono::Utc::now()) || !secure_code::matches(&token.token_digest, code.trim()) {
            return Err(invalid());
        }
        Ok(())
    }
}

/// Turn a unique-index violation into `conflict`, pass anything else through.
fn on_duplicate(err: mongodb::error::Error, conflict: impl FnOnce() -> PlatformError) -> PlatformError {
    if is_duplicate_key(&err) {
        conflict()
    } else {
        err.into()
    }
}
