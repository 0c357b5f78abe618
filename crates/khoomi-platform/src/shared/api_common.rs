//! Common API types and utilities

use axum::extract::{FromRequest, FromRequestParts};
use bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::shared::error::{PlatformError, Result};

mod string_or_number {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNum {
        Num(u64),
        Str(String),
    }

    pub fn deserialize_u64_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<StringOrNum>::deserialize(deserializer)? {
            Some(StringOrNum::Num(n)) => Ok(Some(n)),
            Some(StringOrNum::Str(s)) if s.is_empty() => Ok(None),
            Some(StringOrNum::Str(s)) => s.parse().map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}

/// JSON body extractor whose rejection renders the failure envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(PlatformError))]
pub struct AppJson<T>(pub T);

/// Query extractor whose rejection renders the failure envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(PlatformError))]
pub struct AppQuery<T>(pub T);

/// Path extractor whose rejection renders the failure envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(PlatformError))]
pub struct AppPath<T>(pub T);

/// Success envelope: `{status, message, data}`
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }
}

impl ApiResponse<Empty> {
    pub fn done(message: impl Into<String>) -> Self {
        Self::ok(message, Empty {})
    }
}

/// Empty `data` payload
#[derive(Debug, Serialize, ToSchema)]
pub struct Empty {}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedResponse {
    pub id: String,
}

impl CreatedResponse {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

pub const DEFAULT_LIMIT: u64 = 50;
pub const MAX_LIMIT: u64 = 100;

/// `limit`, `skip`, and optional `sort` (`field` ascending, `-field` descending)
#[derive(Debug, Default, Clone, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    #[serde(default, deserialize_with = "string_or_number::deserialize_u64_opt")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "string_or_number::deserialize_u64_opt")]
    pub skip: Option<u64>,
    #[serde(default)]
    pub sort: Option<String>,
}

/// Resolved pagination, ready for a Mongo query.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub limit: i64,
    pub skip: u64,
    pub sort: Document,
}

/// Sort allowlist entry: public name and the stored field it maps to.
pub type SortField = (&'static str, &'static str);

impl PaginationParams {
    /// Validate against a per-endpoint sort allowlist; the first entry is the default.
    pub fn resolve(&self, allowed: &[SortField], default_desc: bool) -> Result<Page> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(PlatformError::validation(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }

        let sort = match self.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => {
                let direction = if default_desc { -1 } else { 1 };
                match allowed.first() {
                    Some((_, field)) => doc! { *field: direction },
                    None => Document::new(),
                }
            }
            Some(raw) => {
                let (name, direction) = match raw.strip_prefix('-') {
                    Some(name) => (name, -1),
                    None => (raw.strip_prefix('+').unwrap_or(raw), 1),
                };
                let field = allowed
                    .iter()
                    .find(|(public, _)| *public == name)
                    .map(|(_, field)| *field)
                    .ok_or_else(|| {
                        let names: Vec<&str> = allowed.iter().map(|(public, _)| *public).collect();
                        PlatformError::validation(format!(
                            "cannot sort by '{}'; allowed: {}",
                            name,
                            names.join(", ")
                        ))
                    })?;
                doc! { field: direction }
            }
        };

        Ok(Page {
            limit: limit as i64,
            skip: self.skip.unwrap_or(0),
            sort,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PagedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: i64,
    pub skip: u64,
}

impl<T> PagedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: &Page) -> Self {
        Self {
            items,
            total,
            limit: page.limit,
            skip: page.skip,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResponse<U> {
        PagedResponse {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            skip: self.skip,
        }
    }
}

/// Case-insensitive substring match over each of `fields`.
pub fn substring_filter(term: &str, fields: &[&str]) -> Document {
    let pattern = regex::escape(term.trim());
    let clauses: Vec<Bson> = fields
        .iter()
        .map(|field| {
            Bson::Document(doc! {
                *field: { "$regex": pattern.as_str(), "$options": "i" }
            })
        })
        .collect();
    doc! { "$or": clauses }
}
