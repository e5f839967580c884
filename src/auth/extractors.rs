//! Axum extractors for authentication and role-based authorization.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::header, http::request::Parts};

use super::errors::{AuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use crate::db::{User, UserRole};
use crate::jwt::JwtError;

/// Core authentication logic shared between the strict and optional
/// extractors. Validates the Bearer access token and returns the
/// caller's UUID without touching the database.
fn authenticate_request<S>(parts: &Parts, state: &S) -> Result<AuthUser, AuthErrorKind>
where
    S: HasAuthBackend + Send + Sync,
{
    let header_value = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthErrorKind::MissingToken)?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or(AuthErrorKind::MissingToken)?
        .trim();
    if token.is_empty() {
        return Err(AuthErrorKind::MissingToken);
    }

    let claims = state.jwt().validate_access_token(token).map_err(|e| match e {
        JwtError::Expired => AuthErrorKind::TokenExpired,
        _ => AuthErrorKind::InvalidToken,
    })?;

    Ok(AuthUser {
        user_uuid: claims.user_uuid,
    })
}

/// Extractor for endpoints that require a valid access token.
/// Stateless, no database lookup.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_uuid: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state).map_err(AuthError::new)
    }
}

/// Optional authentication extractor. Never rejects; endpoints that work
/// both authenticated and anonymous use this and branch on the Option.
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match authenticate_request(parts, state) {
            Ok(user) => Ok(MaybeAuthUser(Some(user))),
            Err(kind) => {
                tracing::debug!("Optional auth not satisfied: {:?}", kind);
                Ok(MaybeAuthUser(None))
            }
        }
    }
}

/// Role constraint for the [`Authorized`] extractor.
pub trait RoleConstraint {
    fn allows(role: UserRole) -> bool;
}

/// Constraint permitting admins only.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn allows(role: UserRole) -> bool {
        role == UserRole::Admin
    }
}

/// Constraint permitting any authenticated user whose account still exists.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn allows(_role: UserRole) -> bool {
        true
    }
}

/// Extractor for endpoints gated on the caller's role. The role is read
/// from the database on every request rather than from a token claim, so
/// demotions take effect immediately and deleted accounts are rejected
/// even while their access tokens are still valid.
pub struct Authorized<C: RoleConstraint> {
    pub user: User,
    _constraint: PhantomData<C>,
}

impl<S, C> FromRequestParts<S> for Authorized<C>
where
    S: HasAuthBackend + Send + Sync,
    C: RoleConstraint,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;

        let user = state
            .db()
            .users()
            .get_by_uuid(&auth.user_uuid)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load user for authorization: {}", e);
                AuthError::new(AuthErrorKind::ServerError)
            })?
            .ok_or_else(|| AuthError::new(AuthErrorKind::UserNotFound))?;

        if !C::allows(user.role) {
            return Err(AuthError::new(AuthErrorKind::InsufficientRole));
        }

        Ok(Authorized {
            user,
            _constraint: PhantomData,
        })
    }
}
