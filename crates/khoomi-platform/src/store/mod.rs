//! Store
//!
//! Owns the MongoDB client and database handles. Repositories borrow the
//! database for single-document work; multi-document transactions are opened
//! only through [`Store::begin`] by the aggregate writer.

use mongodb::{
    error::{ErrorKind, WriteFailure, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{Acknowledgment, ReadConcern, WriteConcern},
    Client, ClientSession, Collection, Database,
};
use tracing::{debug, warn};

use crate::shared::error::Result;

/// MongoDB duplicate key error code
const DUPLICATE_KEY: i32 = 11000;

const MAX_COMMIT_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct Store {
    client: Client,
    db: Database,
}

impl Store {
    pub fn new(client: Client, database: &str) -> Self {
        let db = client.database(database);
        Self { client, db }
    }

    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Self::new(client, database))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    /// Round-trip to the primary, used by readiness checks.
    pub async fn ping(&self) -> Result<()> {
        self.db.run_command(bson::doc! { "ping": 1 }).await?;
        Ok(())
    }

    /// Open a session with a snapshot-read, majority-write transaction.
    pub(crate) async fn begin(&self) -> Result<ClientSession> {
        let mut session = self.client.start_session().await?;
        session
            .start_transaction()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::builder().w(Acknowledgment::Majority).build())
            .await?;
        Ok(session)
    }

    /// Commit when `outcome` is Ok, abort otherwise; returns the outcome.
    pub(crate) async fn settle<T>(&self, mut session: ClientSession, outcome: Result<T>) -> Result<T> {
        let value = match outcome {
            Ok(value) => value,
            Err(e) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    debug!(error = %abort_err, "Abort after failed transaction step");
                }
                return Err(e);
            }
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match session.commit_transaction().await {
                Ok(()) => return Ok(value),
                Err(e) if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) && attempt < MAX_COMMIT_ATTEMPTS => {
                    warn!(attempt, error = %e, "Retrying transaction commit");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// True when the error is a unique-index violation.
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Name of the index that rejected a duplicate key, when the server reports it.
pub fn duplicate_key_index(err: &mongodb::error::Error) -> Option<String> {
    if !is_duplicate_key(err) {
        return None;
    }
    index_name_from_message(&err.to_string())
}

fn index_name_from_message(message: &str) -> Option<String> {
    let rest = &message[message.find("index: ")? + "index: ".len()..];
    rest.split_whitespace().next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_name_from_server_message() {
        let msg = "E11000 duplicate key error collection: khoomi.users index: primary_email_1 dup key: { primary_email: \"a@b.co\" }";
        assert_eq!(index_name_from_message(msg).as_deref(), Some("primary_email_1"));
        assert_eq!(index_name_from_message("some other failure"), None);
    }
}
