//! Authentication and authorization error types.

use axum::response::{IntoResponse, Response};

/// Error kind produced by the authentication and authorization extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    MissingToken,
    TokenExpired,
    InvalidToken,
    UserNotFound,
    InsufficientRole,
    ServerError,
}

/// Authentication error returned as JSON with a machine-readable code.
#[derive(Debug)]
pub struct AuthError {
    pub(super) kind: AuthErrorKind,
}

impl AuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self.kind {
            AuthErrorKind::MissingToken
            | AuthErrorKind::TokenExpired
            | AuthErrorKind::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthErrorKind::InsufficientRole => StatusCode::FORBIDDEN,
            AuthErrorKind::UserNotFound => StatusCode::NOT_FOUND,
            AuthErrorKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::MissingToken | AuthErrorKind::InsufficientRole => "AuthorizationError",
            AuthErrorKind::TokenExpired => "TokenExpired",
            AuthErrorKind::InvalidToken => "InvalidToken",
            AuthErrorKind::UserNotFound => "NotFound",
            AuthErrorKind::ServerError => "ServerError",
        }
    }

    pub fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::MissingToken => "Access denied, no token provided!",
            AuthErrorKind::TokenExpired => "Token has expired!",
            AuthErrorKind::InvalidToken => "Invalid token!",
            AuthErrorKind::UserNotFound => "User not found!",
            AuthErrorKind::InsufficientRole => "Access denied, insufficient permissions!",
            AuthErrorKind::ServerError => "Internal server error!",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        use axum::Json;
        use serde::Serialize;

        #[derive(Serialize)]
        struct ErrorResponse {
            code: &'static str,
            message: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                code: self.code(),
                message: self.message(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::new(AuthErrorKind::MissingToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::new(AuthErrorKind::TokenExpired).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::new(AuthErrorKind::InsufficientRole).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::new(AuthErrorKind::UserNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AuthError::new(AuthErrorKind::ServerError).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_expired_and_invalid_tokens_have_distinct_codes() {
        assert_eq!(AuthError::new(AuthErrorKind::TokenExpired).code(), "TokenExpired");
        assert_eq!(AuthError::new(AuthErrorKind::InvalidToken).code(), "InvalidToken");
    }
}
