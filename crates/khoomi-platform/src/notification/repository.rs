//! Notification Settings Repository

use bson::doc;
use mongodb::{options::ReturnDocument, Collection, Database};

use crate::notification::entity::{
    NotificationSettings, NotificationToggle, NotificationToggles, NOTIFICATION_SETTINGS,
};
use crate::shared::error::{PlatformError, Result};
use crate::store::is_duplicate_key;

pub struct NotificationRepository {
    collection: Collection<NotificationSettings>,
}

impl NotificationRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(NOTIFICATION_SETTINGS),
        }
    }

    pub async fn find(&self, user_id: &str) -> Result<Option<NotificationSettings>> {
        Ok(self.collection.find_one(doc! { "user_id": user_id }).await?)
    }

    pub async fn get(&self, user_id: &str) -> Result<NotificationSettings> {
        self.find(user_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("NotificationSettings", user_id))
    }

    pub async fn create(&self, user_id: &str, toggles: NotificationToggles) -> Result<NotificationSettings> {
        let settings = NotificationSettings::new(user_id, toggles);
        self.collection.insert_one(&settings).await.map_err(|e| {
            if is_duplicate_key(&e) {
                PlatformError::conflict("SETTINGS_EXIST", "notification settings already exist")
            } else {
                e.into()
            }
        })?;
        Ok(settings)
    }

    pub async fn replace(&self, user_id: &str, toggles: NotificationToggles) -> Result<NotificationSettings> {
        let mut set = toggles.to_set_document();
        set.insert("modified_at", bson::DateTime::now());
        self.update(user_id, set).await
    }

    /// Flip exactly the requested toggle.
    pub async fn set_toggle(&self, user_id: &str, toggle: NotificationToggle, value: bool) -> Result<NotificationSettings> {
        self.update(
            user_id,
            doc! { toggle.field_name(): value, "modified_at": bson::DateTime::now() },
        )
        .await
    }

    async fn update(&self, user_id: &str, set: bson::Document) -> Result<NotificationSettings> {
        self.collection
            .find_one_and_update(doc! { "user_id": user_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| PlatformError::not_found("NotificationSettings", user_id))
    }
}
