//! Mail outbox
//!
//! Rows are written inside the same transaction as the state change that
//! caused them, then drained by [`MailOutboxProcessor`](crate::mail::processor::MailOutboxProcessor).
//! Bodies can hold one-time codes, so they are blanked once a row is sent or
//! gives up, and the finished row expires after [`FINISHED_MAIL_RETENTION`].

use std::time::Duration as StdDuration;

use bson::{doc, Document};
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Duration, Utc};
use mongodb::{options::ReturnDocument, ClientSession, Collection, Database};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::mail::mailer::Envelope;
use crate::mail::templates::RenderedMail;
use crate::shared::error::Result;
use crate::shared::ids::new_id;

pub const MAIL_OUTBOX: &str = "mail_outbox";

/// How long sent and failed rows are kept for inspection
pub const FINISHED_MAIL_RETENTION: StdDuration = StdDuration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    InProgress,
    Sent,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    /// Status after a failed attempt, given the attempts made so far.
    pub fn after_failure(attempts: u32, max_retries: u32) -> Self {
        if attempts >= max_retries {
            Self::Failed
        } else {
            Self::Pending
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailOutboxItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub to: String,
    pub kind: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub status: OutboxStatus,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Set when the row reaches sent or failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<bson::DateTime>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl MailOutboxItem {
    pub fn new(to: impl Into<String>, mail: RenderedMail) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            to: to.into(),
            kind: mail.kind.to_string(),
            subject: mail.subject,
            text_body: mail.text_body,
            html_body: mail.html_body,
            status: OutboxStatus::Pending,
            retry_count: 0,
            last_error: None,
            finished_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn envelope(&self) -> Envelope<'_> {
        Envelope {
            to: &self.to,
            subject: &self.subject,
            text_body: &self.text_body,
            html_body: &self.html_body,
        }
    }
}

/// `$set` for a row that will not be attempted again.
fn finished_set(status: OutboxStatus, last_error: Option<&str>) -> Document {
    let now = bson::DateTime::now();
    doc! {
        "status": status.as_str(),
        "last_error": last_error,
        "text_body": "",
        "html_body": "",
        "finished_at": now,
        "updated_at": now,
    }
}

pub struct MailOutboxRepository {
    collection: Collection<MailOutboxItem>,
}

impl MailOutboxRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(MAIL_OUTBOX),
        }
    }

    /// Insert as part of an open transaction.
    pub async fn enqueue(&self, session: &mut ClientSession, item: &MailOutboxItem) -> Result<()> {
        self.collection.insert_one(item).session(&mut *session).await?;
        debug!(id = %item.id, kind = %item.kind, "Mail queued");
        Ok(())
    }

    /// Atomically take the oldest pending row.
    pub async fn claim_next(&self) -> Result<Option<MailOutboxItem>> {
        Ok(self
            .collection
            .find_one_and_update(
                doc! { "status": OutboxStatus::Pending.as_str() },
                doc! { "$set": {
                    "status": OutboxStatus::InProgress.as_str(),
                    "updated_at": bson::DateTime::now(),
                } },
            )
            .sort(doc! { "created_at": 1 })
            .return_document(ReturnDocument::After)
            .await?)
    }

    pub async fn mark_sent(&self, id: &str) -> Result<()> {
        self.collection
            .update_one(doc! { "_id": id }, doc! { "$set": finished_set(OutboxStatus::Sent, None) })
            .await?;
        Ok(())
    }

    /// Record a failed attempt; the row goes back to pending until retries run out.
    pub async fn mark_failed(&self, item: &MailOutboxItem, error: &str, max_retries: u32) -> Result<OutboxStatus> {
        let attempts = item.retry_count + 1;
        let status = OutboxStatus::after_failure(attempts, max_retries);
        let set = match status {
            OutboxStatus::Failed => finished_set(status, Some(error)),
            _ => doc! {
                "status": status.as_str(),
                "last_error": error,
                "updated_at": bson::DateTime::now(),
            },
        };
        self.collection
            .update_one(doc! { "_id": &item.id }, doc! { "$inc": { "retry_count": 1 }, "$set": set })
            .await?;
        Ok(status)
    }

    /// Return rows left in progress by a crashed worker to the queue.
    pub async fn reset_stuck(&self, older_than: Duration) -> Result<u64> {
        let cutoff = bson::DateTime::from_chrono(Utc::now() - older_than);
        let result = self
            .collection
            .update_many(
                doc! { "status": OutboxStatus::InProgress.as_str(), "updated_at": { "$lt": cutoff } },
                doc! { "$set": { "status": OutboxStatus::Pending.as_str(), "updated_at": bson::DateTime::now() } },
            )
            .await?;
        Ok(result.modified_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_budget() {
        assert_eq!(OutboxStatus::after_failure(1, 5), OutboxStatus::Pending);
        assert_eq!(OutboxStatus::after_failure(4, 5), OutboxStatus::Pending);
        assert_eq!(OutboxStatus::after_failure(5, 5), OutboxStatus::Failed);
        assert_eq!(OutboxStatus::after_failure(1, 0), OutboxStatus::Failed);
    }

    #[test]
    fn test_new_item_is_pending() {
        let rendered = RenderedMail {
            kind: "welcome",
            subject: "Welcome".into(),
            text_body: "hi".into(),
            html_body: "<p>hi</p>".into(),
        };
        let item = MailOutboxItem::new("a@b.co", rendered);
        assert_eq!(item.status, OutboxStatus::Pending);
        assert_eq!(item.retry_count, 0);
        let doc = bson::to_document(&item).unwrap();
        assert_eq!(doc.get_str("status").unwrap(), "pending");
        assert_eq!(item.envelope().to, "a@b.co");
        assert!(!doc.contains_key("finished_at"));
    }

    #[test]
    fn test_finished_rows_drop_bodies() {
        let sent = finished_set(OutboxStatus::Sent, None);
        assert_eq!(sent.get_str("status").unwrap(), "sent");
        assert_eq!(sent.get_str("text_body").unwrap(), "");
        assert_eq!(sent.get_str("html_body").unwrap(), "");
        assert!(sent.get_datetime("finished_at").is_ok());
        assert!(sent.is_null("last_error"));

        let failed = finished_set(OutboxStatus::Failed, Some("554 rejected"));
        assert_eq!(failed.get_str("status").unwrap(), "failed");
        assert_eq!(failed.get_str("last_error").unwrap(), "554 rejected");
        assert_eq!(failed.get_str("text_body").unwrap(), "");
    }
}
