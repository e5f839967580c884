//! Shared error handling for API endpoints.
//!
//! Every error response carries a machine-readable `code` alongside the
//! human-readable `message`. Validation errors additionally carry a map
//! of field names to messages.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    /// Request payload failed validation. Carries per-field messages.
    Validation {
        message: String,
        errors: BTreeMap<String, String>,
    },
    Authentication(String),
    Authorization(String),
    TokenExpired(String),
    InvalidToken(String),
    NotFound(String),
    DuplicateUser(String),
    AlreadyLiked(String),
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>, errors: BTreeMap<String, String>) -> Self {
        Self::Validation {
            message: message.into(),
            errors,
        }
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn token_expired(msg: impl Into<String>) -> Self {
        Self::TokenExpired(msg.into())
    }

    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::InvalidToken(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn duplicate_user(msg: impl Into<String>) -> Self {
        Self::DuplicateUser(msg.into())
    }

    pub fn already_liked(msg: impl Into<String>) -> Self {
        Self::AlreadyLiked(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Internal server error!".into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "ValidationError",
            ApiError::Authentication(_) => "AuthenticationError",
            ApiError::Authorization(_) => "AuthorizationError",
            ApiError::TokenExpired(_) => "TokenExpired",
            ApiError::InvalidToken(_) => "InvalidToken",
            ApiError::NotFound(_) => "NotFound",
            ApiError::DuplicateUser(_) => "DuplicateUser",
            ApiError::AlreadyLiked(_) => "AlreadyLiked",
            ApiError::Internal(_) => "ServerError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::AlreadyLiked(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_)
            | ApiError::TokenExpired(_)
            | ApiError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DuplicateUser(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<String, String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let (message, errors) = match self {
            ApiError::Validation { message, errors } => (message, Some(errors)),
            ApiError::Authentication(msg)
            | ApiError::Authorization(msg)
            | ApiError::TokenExpired(msg)
            | ApiError::InvalidToken(msg)
            | ApiError::NotFound(msg)
            | ApiError::DuplicateUser(msg)
            | ApiError::AlreadyLiked(msg)
            | ApiError::Internal(msg) => (msg, None),
        };
        (
            status,
            Json(ErrorResponse {
                code,
                message,
                errors,
            }),
        )
            .into_response()
    }
}

/// Validate a UUID string format.
pub fn validate_uuid(uuid: &str) -> Result<(), ApiError> {
    if uuid::Uuid::parse_str(uuid).is_err() {
        let mut errors = BTreeMap::new();
        errors.insert("uuid".to_string(), "Invalid UUID format".to_string());
        return Err(ApiError::validation("Validation failed!", errors));
    }
    Ok(())
}
