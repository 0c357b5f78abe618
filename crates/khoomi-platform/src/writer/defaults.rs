//! Default-flag protocol for addresses and payment information
//!
//! Per user: at most `T::LIMIT` rows and at most one with the default flag.
//! Every step touches the owning user document first, so two concurrent
//! requests for the same user write-conflict and one aborts instead of
//! both flipping a row to default.

use bson::{doc, Document};
use mongodb::{options::ReturnDocument, ClientSession, Collection};
use tracing::info;

use super::AggregateWriter;
use crate::shared::default_flag::DefaultFlagged;
use crate::shared::error::{PlatformError, Result};

impl AggregateWriter {
    fn flagged<T: DefaultFlagged>(&self) -> Collection<T> {
        self.store.collection(T::COLLECTION)
    }

    /// Insert a new row, clearing the flag on siblings when it is the default.
    pub async fn insert_flagged<T: DefaultFlagged>(&self, record: T) -> Result<T> {
        let mut session = self.store.begin().await?;
        let outcome = self.insert_flagged_steps(&mut session, &record).await;
        self.store.settle(session, outcome).await?;
        info!(user_id = %record.user_id(), id = %record.id(), entity = T::ENTITY, "Record created");
        Ok(record)
    }

    async fn insert_flagged_steps<T: DefaultFlagged>(&self, session: &mut ClientSession, record: &T) -> Result<()> {
        let existing = self
            .flagged::<T>()
            .count_documents(doc! { "user_id": record.user_id() })
            .session(&mut *session)
            .await?;
        if existing >= T::LIMIT {
            return Err(PlatformError::limit_reached(T::ENTITY, T::LIMIT));
        }

        self.touch_user(session, record.user_id()).await?;
        if record.is_default() {
            self.clear_default::<T>(session, record.user_id(), record.id()).await?;
        }
        self.flagged::<T>().insert_one(record).session(&mut *session).await?;
        Ok(())
    }

    /// Edit a row in place; `make_default` also moves the flag to it.
    pub async fn update_flagged<T: DefaultFlagged>(
        &self,
        user_id: &str,
        id: &str,
        changes: Document,
        make_default: bool,
    ) -> Result<T> {
        let mut session = self.store.begin().await?;
        let outcome = self.update_flagged_steps::<T>(&mut session, user_id, id, changes, make_default).await;
        self.store.settle(session, outcome).await
    }

    /// Move the default flag to `id`.
    pub async fn set_default<T: DefaultFlagged>(&self, user_id: &str, id: &str) -> Result<T> {
        let mut session = self.store.begin().await?;
        let outcome = self.update_flagged_steps::<T>(&mut session, user_id, id, Document::new(), true).await;
        let record = self.store.settle(session, outcome).await?;
        info!(user_id = %user_id, id = %id, entity = T::ENTITY, "Default changed");
        Ok(record)
    }

    async fn update_flagged_steps<T: DefaultFlagged>(
        &self,
        session: &mut ClientSession,
        user_id: &str,
        id: &str,
        changes: Document,
        make_default: bool,
    ) -> Result<T> {
        self.touch_user(session, user_id).await?;
        if make_default {
            self.clear_default::<T>(session, user_id, id).await?;
        }

        self.flagged::<T>()
            .find_one_and_update(
                doc! { "_id": id, "user_id": user_id },
                doc! { "$set": flagged_set::<T>(changes, make_default) },
            )
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await?
            .ok_or_else(|| PlatformError::not_found(T::ENTITY, id))
    }

    async fn clear_default<T: DefaultFlagged>(&self, session: &mut ClientSession, user_id: &str, keep_id: &str) -> Result<()> {
        self.flagged::<T>()
            .update_many(
                doc! { "user_id": user_id, "_id": { "$ne": keep_id }, (T::DEFAULT_FIELD): true },
                doc! { "$set": { (T::DEFAULT_FIELD): false } },
            )
            .session(&mut *session)
            .await?;
        Ok(())
    }
}

/// `$set` body for an edit. The flag is always written, so an edit that
/// omits it clears it.
fn flagged_set<T: DefaultFlagged>(mut changes: Document, make_default: bool) -> Document {
    changes.insert(T::DEFAULT_FIELD, make_default);
    changes.insert("modified_at", bson::DateTime::now());
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{AddressInput, UserAddress};
    use crate::payment::PaymentInformation;

    fn address_input(is_default: bool) -> AddressInput {
        AddressInput {
            city: "Lagos".into(),
            state: "Lagos".into(),
            street: "12 Broad St".into(),
            postal_code: "100001".into(),
            country: "NG".into(),
            is_default_shipping_address: is_default,
        }
    }

    #[test]
    fn test_edit_without_flag_clears_default() {
        let set = flagged_set::<UserAddress>(address_input(false).to_set_document(), false);
        assert!(!set.get_bool("is_default_shipping_address").unwrap());
        assert_eq!(set.get_str("street").unwrap(), "12 Broad St");
        assert!(set.contains_key("modified_at"));

        let set = flagged_set::<PaymentInformation>(Document::new(), false);
        assert!(!set.get_bool("is_default").unwrap());
    }

    #[test]
    fn test_edit_with_flag_sets_default() {
        let set = flagged_set::<UserAddress>(address_input(true).to_set_document(), true);
        assert!(set.get_bool("is_default_shipping_address").unwrap());
    }
}
