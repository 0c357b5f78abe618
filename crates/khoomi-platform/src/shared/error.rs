//! Platform Error Types

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Duplicate {entity_type} with {field}={value}")]
    Duplicate { entity_type: String, field: String, value: String },

    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{message}")]
    Unprocessable { message: String },

    #[error("Limit reached: at most {limit} {entity_type} entries are allowed")]
    LimitReached { entity_type: String, limit: u64 },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Invalid token: {message}")]
    InvalidToken { message: String },

    #[error("Method {method} is not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] bson::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Token store error: {0}")]
    TokenStore(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Media host error: {message}")]
    Media { message: String },

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Mail error: {message}")]
    Mail { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PlatformError {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(entity_type: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict { code, message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::Unprocessable { message: message.into() }
    }

    pub fn limit_reached(entity_type: impl Into<String>, limit: u64) -> Self {
        Self::LimitReached {
            entity_type: entity_type.into(),
            limit,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    pub fn media(message: impl Into<String>) -> Self {
        Self::Media { message: message.into() }
    }

    pub fn mail(message: impl Into<String>) -> Self {
        Self::Mail { message: message.into() }
    }

    pub fn method_not_allowed(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::MethodNotAllowed {
            method: method.into(),
            path: path.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// HTTP status and stable machine-readable code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Duplicate { .. } => (StatusCode::CONFLICT, "DUPLICATE"),
            Self::Conflict { code, .. } => (StatusCode::CONFLICT, *code),
            Self::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::Unprocessable { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE"),
            Self::LimitReached { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "LIMIT_REACHED"),
            Self::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            Self::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            Self::TokenRevoked => (StatusCode::UNAUTHORIZED, "TOKEN_REVOKED"),
            Self::InvalidToken { .. } => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            Self::MethodNotAllowed { .. } => (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED"),
            Self::DeadlineExceeded => (StatusCode::INTERNAL_SERVER_ERROR, "DEADLINE_EXCEEDED"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Failure envelope: `{status, message, error}`
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub error: String,
}

impl IntoResponse for PlatformError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
            if matches!(self, Self::DeadlineExceeded) {
                self.to_string()
            } else {
                "internal server error".to_string()
            }
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            status: "error".to_string(),
            message,
            error: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for PlatformError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for PlatformError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<PathRejection> for PlatformError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for PlatformError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<MultipartError> for PlatformError {
    fn from(err: MultipartError) -> Self {
        Self::validation(format!("Malformed multipart body: {}", err.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(PlatformError::not_found("Shop", "x").status_and_code().0, StatusCode::NOT_FOUND);
        assert_eq!(
            PlatformError::duplicate("User", "primary_email", "a@b.co").status_and_code(),
            (StatusCode::CONFLICT, "DUPLICATE")
        );
        assert_eq!(
            PlatformError::conflict("ALREADY_FOLLOWING", "already following").status_and_code(),
            (StatusCode::CONFLICT, "ALREADY_FOLLOWING")
        );
        assert_eq!(
            PlatformError::limit_reached("address", 5).status_and_code(),
            (StatusCode::UNPROCESSABLE_ENTITY, "LIMIT_REACHED")
        );
        assert_eq!(PlatformError::validation("bad").status_and_code().0, StatusCode::BAD_REQUEST);
        assert_eq!(PlatformError::unauthorized("no").status_and_code().0, StatusCode::UNAUTHORIZED);
        assert_eq!(PlatformError::forbidden("no").status_and_code().0, StatusCode::FORBIDDEN);
        assert_eq!(PlatformError::TokenRevoked.status_and_code().0, StatusCode::UNAUTHORIZED);
        assert_eq!(
            PlatformError::method_not_allowed("PATCH", "/api/x").status_and_code(),
            (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED")
        );
        assert_eq!(
            PlatformError::DeadlineExceeded.status_and_code().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_limit_message_names_entity() {
        let err = PlatformError::limit_reached("payment information", 3);
        assert_eq!(
            err.to_string(),
            "Limit reached: at most 3 payment information entries are allowed"
        );
    }

    #[test]
    fn test_into_response_status() {
        let response = PlatformError::conflict("ALREADY_FOLLOWING", "x").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = PlatformError::internal("boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
