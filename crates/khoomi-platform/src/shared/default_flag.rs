//! Per-owner "at most one default" records

use serde::{de::DeserializeOwned, Serialize};

/// A record kept under the at-most-one-default and count-limit invariants
/// for its owning user. Only the aggregate writer flips the flag.
pub trait DefaultFlagged: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    const COLLECTION: &'static str;
    /// Name of the boolean default field in the stored document
    const DEFAULT_FIELD: &'static str;
    /// Maximum rows per user
    const LIMIT: u64;
    /// Human-readable name used in errors
    const ENTITY: &'static str;

    fn id(&self) -> &str;
    fn user_id(&self) -> &str;
    fn is_default(&self) -> bool;
}
