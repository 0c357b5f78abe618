//! User Repository

use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::{options::ReturnDocument, Collection, Database};

use crate::shared::api_common::{Page, PagedResponse};
use crate::shared::error::Result;
use crate::store::is_duplicate_key;
use crate::user::entity::{
    DeletionRequest, LoginHistory, User, UserStatus, DELETION_REQUESTS, LOGIN_HISTORIES, USERS,
};
use crate::PlatformError;

pub struct UserRepository {
    collection: Collection<User>,
    login_histories: Collection<LoginHistory>,
    deletion_requests: Collection<DeletionRequest>,
}

impl UserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(USERS),
            login_histories: db.collection(LOGIN_HISTORIES),
            deletion_requests: db.collection(DELETION_REQUESTS),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    pub async fn get(&self, id: &str) -> Result<User> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| PlatformError::not_found("User", id))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.collection.find_one(doc! { "primary_email": email }).await?)
    }

    /// Apply a `$set` to one user and return the updated document.
    pub async fn update_fields(&self, id: &str, mut fields: Document) -> Result<User> {
        fields.insert("modified_at", bson::DateTime::now());
        let updated = self
            .collection
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": fields })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    PlatformError::conflict("DUPLICATE_EMAIL", "email is already in use")
                } else {
                    e.into()
                }
            })?;
        updated.ok_or_else(|| PlatformError::not_found("User", id))
    }

    /// Swap the stored thumbnail, returning the previous asset handle.
    pub async fn replace_thumbnail(&self, id: &str, url: &str, handle: &str) -> Result<Option<String>> {
        let previous = self
            .collection
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": {
                    "thumbnail": url,
                    "thumbnail_handle": handle,
                    "modified_at": bson::DateTime::now(),
                } },
            )
            .return_document(ReturnDocument::Before)
            .await?
            .ok_or_else(|| PlatformError::not_found("User", id))?;
        Ok(previous.thumbnail_handle)
    }

    pub async fn set_status(&self, id: &str, status: UserStatus) -> Result<User> {
        self.update_fields(id, doc! { "status": status.as_str() }).await
    }

    pub async fn set_login_notification(&self, id: &str, allow: bool) -> Result<User> {
        self.update_fields(id, doc! { "allow_login_ip_notification": allow }).await
    }

    // Login history

    pub async fn list_login_history(&self, user_id: &str, page: &Page) -> Result<PagedResponse<LoginHistory>> {
        let filter = doc! { "user_uid": user_id };
        let total = self.login_histories.count_documents(filter.clone()).await?;
        let items = self
            .login_histories
            .find(filter)
            .sort(page.sort.clone())
            .skip(page.skip)
            .limit(page.limit)
            .await?
            .try_collect()
            .await?;
        Ok(PagedResponse::new(items, total, page))
    }

    /// Delete the given rows, or every row for the user when `ids` is empty.
    pub async fn delete_login_history(&self, user_id: &str, ids: &[String]) -> Result<u64> {
        let filter = if ids.is_empty() {
            doc! { "user_uid": user_id }
        } else {
            doc! { "user_uid": user_id, "_id": { "$in": ids } }
        };
        let result = self.login_histories.delete_many(filter).await?;
        Ok(result.deleted_count)
    }

    // Deletion requests

    pub async fn request_deletion(&self, user_id: &str) -> Result<DeletionRequest> {
        let request = DeletionRequest::new(user_id);
        self.deletion_requests
            .insert_one(&request)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    PlatformError::conflict("DELETION_ALREADY_REQUESTED", "account deletion was already requested")
                } else {
                    e.into()
                }
            })?;
        Ok(request)
    }

    pub async fn find_deletion_request(&self, user_id: &str) -> Result<Option<DeletionRequest>> {
        Ok(self.deletion_requests.find_one(doc! { "user_id": user_id }).await?)
    }

    pub async fn cancel_deletion(&self, user_id: &str) -> Result<bool> {
        let result = self.deletion_requests.delete_one(doc! { "user_id": user_id }).await?;
        Ok(result.deleted_count > 0)
    }
}
