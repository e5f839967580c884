//! JWT token issuance and verification.
//!
//! Dual-secret scheme: access tokens and refresh tokens are signed with
//! distinct HS256 secrets, so a leaked access-token secret cannot be used
//! to forge refresh tokens (or the other way around). Access tokens are
//! stateless and short-lived; refresh tokens are long-lived and tracked in
//! the refresh-token ledger.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Constant `sub` claim carried by every token as a sanity label.
pub const TOKEN_SUBJECT: &str = "quillstack-api";

/// Default access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Default refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Claims carried by access tokens (stateless, no JTI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Owning user UUID
    pub user_uuid: String,
    /// Subject label, always [`TOKEN_SUBJECT`]
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Claims carried by refresh tokens.
///
/// The JTI makes every issued refresh token string unique even when two
/// tokens for the same user are minted within the same second, which is
/// what lets the ledger enforce a uniqueness constraint on the raw string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Unique token identifier
    pub jti: String,
    /// Owning user UUID
    pub user_uuid: String,
    /// Subject label, always [`TOKEN_SUBJECT`]
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Result of issuing an access token.
#[derive(Debug, Clone)]
pub struct AccessTokenResult {
    /// The signed JWT string
    pub token: String,
    /// Token lifetime in seconds
    pub duration: u64,
}

/// Result of issuing a refresh token. The caller is responsible for
/// persisting the token in the ledger.
#[derive(Debug, Clone)]
pub struct RefreshTokenResult {
    /// The signed JWT string
    pub token: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token lifetime in seconds
    pub duration: u64,
}

/// Immutable JWT configuration, constructed once at startup and injected
/// into the router state.
pub struct JwtConfig {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: u64,
    refresh_ttl: u64,
}

impl JwtConfig {
    /// Create a JWT configuration with distinct secrets per token class.
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_ttl: access_ttl.as_secs(),
            refresh_ttl: refresh_ttl.as_secs(),
        }
    }

    /// Issue an access token bound to a user.
    pub fn generate_access_token(&self, user_uuid: &str) -> Result<AccessTokenResult, JwtError> {
        let now = unix_now()?;

        let claims = AccessClaims {
            user_uuid: user_uuid.to_string(),
            sub: TOKEN_SUBJECT.to_string(),
            iat: now,
            exp: now + self.access_ttl,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(JwtError::Encoding)?;

        Ok(AccessTokenResult {
            token,
            duration: self.access_ttl,
        })
    }

    /// Issue a refresh token bound to a user.
    pub fn generate_refresh_token(&self, user_uuid: &str) -> Result<RefreshTokenResult, JwtError> {
        let now = unix_now()?;
        let exp = now + self.refresh_ttl;

        let claims = RefreshClaims {
            jti: uuid::Uuid::new_v4().to_string(),
            user_uuid: user_uuid.to_string(),
            sub: TOKEN_SUBJECT.to_string(),
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(JwtError::Encoding)?;

        Ok(RefreshTokenResult {
            token,
            issued_at: now,
            expires_at: exp,
            duration: self.refresh_ttl,
        })
    }

    /// Verify an access token's signature and expiry.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let claims: AccessClaims = decode(token, &self.access_decoding)?;

        if claims.sub != TOKEN_SUBJECT {
            return Err(JwtError::Invalid);
        }

        Ok(claims)
    }

    /// Verify a refresh token's signature and expiry.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let claims: RefreshClaims = decode(token, &self.refresh_decoding)?;

        if claims.sub != TOKEN_SUBJECT {
            return Err(JwtError::Invalid);
        }

        Ok(claims)
    }

    /// Refresh token lifetime in seconds, for cookie Max-Age.
    pub fn refresh_ttl_secs(&self) -> u64 {
        self.refresh_ttl
    }
}

fn decode<T: serde::de::DeserializeOwned>(token: &str, key: &DecodingKey) -> Result<T, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let data = jsonwebtoken::decode::<T>(token, key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::Invalid,
    })?;

    Ok(data.claims)
}

fn unix_now() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

/// Errors that can occur during JWT operations.
///
/// `Expired` and `Invalid` are distinct kinds on purpose: both map to
/// HTTP 401, but with different machine-readable codes.
#[derive(Debug)]
pub enum JwtError {
    /// Error signing the token
    Encoding(jsonwebtoken::errors::Error),
    /// Signature valid, expiry elapsed
    Expired,
    /// Signature invalid or token malformed
    Invalid,
    /// System time error
    TimeError,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Expired => write!(f, "Token has expired"),
            JwtError::Invalid => write!(f, "Invalid token"),
            JwtError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for JwtError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig::new(
            b"access-secret-for-testing-only!!",
            b"refresh-secret-for-testing-only!",
            DEFAULT_ACCESS_TTL,
            DEFAULT_REFRESH_TTL,
        )
    }

    #[test]
    fn test_access_token_round_trip() {
        let config = test_config();

        let result = config.generate_access_token("uuid-123").unwrap();
        assert_eq!(result.duration, DEFAULT_ACCESS_TTL.as_secs());

        let claims = config.validate_access_token(&result.token).unwrap();
        assert_eq!(claims.user_uuid, "uuid-123");
        assert_eq!(claims.sub, TOKEN_SUBJECT);
    }

    #[test]
    fn test_refresh_token_round_trip() {
        let config = test_config();

        let result = config.generate_refresh_token("uuid-123").unwrap();
        assert_eq!(result.duration, DEFAULT_REFRESH_TTL.as_secs());
        assert_eq!(result.expires_at, result.issued_at + result.duration);

        let claims = config.validate_refresh_token(&result.token).unwrap();
        assert_eq!(claims.user_uuid, "uuid-123");
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_token_classes_are_not_interchangeable() {
        let config = test_config();

        let access = config.generate_access_token("uuid-123").unwrap();
        let refresh = config.generate_refresh_token("uuid-123").unwrap();

        // Each class is signed with its own secret
        assert!(matches!(
            config.validate_refresh_token(&access.token),
            Err(JwtError::Invalid)
        ));
        assert!(matches!(
            config.validate_access_token(&refresh.token),
            Err(JwtError::Invalid)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let config1 = test_config();
        let config2 = JwtConfig::new(
            b"a-different-access-secret-value!",
            b"a-different-refresh-secret-value",
            DEFAULT_ACCESS_TTL,
            DEFAULT_REFRESH_TTL,
        );

        let result = config1.generate_access_token("uuid-123").unwrap();
        assert!(matches!(
            config2.validate_access_token(&result.token),
            Err(JwtError::Invalid)
        ));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let config = test_config();
        let result = config.generate_access_token("uuid-123").unwrap();

        // Flip the last character of the signature segment
        let mut tampered = result.token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        assert!(matches!(
            config.validate_access_token(&tampered),
            Err(JwtError::Invalid)
        ));
    }

    #[test]
    fn test_malformed_token_rejected() {
        let config = test_config();
        assert!(matches!(
            config.validate_access_token("not-a-jwt"),
            Err(JwtError::Invalid)
        ));
    }

    #[test]
    fn test_expired_token_yields_expired_kind() {
        let config = test_config();

        let now = unix_now().unwrap();
        let claims = AccessClaims {
            user_uuid: "uuid-123".to_string(),
            sub: TOKEN_SUBJECT.to_string(),
            iat: now - 100,
            exp: now - 50,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"access-secret-for-testing-only!!"),
        )
        .unwrap();

        assert!(matches!(
            config.validate_access_token(&token),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_wrong_subject_rejected() {
        let config = test_config();

        let now = unix_now().unwrap();
        let claims = AccessClaims {
            user_uuid: "uuid-123".to_string(),
            sub: "some-other-api".to_string(),
            iat: now,
            exp: now + 60,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"access-secret-for-testing-only!!"),
        )
        .unwrap();

        assert!(matches!(
            config.validate_access_token(&token),
            Err(JwtError::Invalid)
        ));
    }

    #[test]
    fn test_unique_token_strings_per_issue() {
        let config = test_config();

        let r1 = config.generate_refresh_token("uuid-123").unwrap();
        let r2 = config.generate_refresh_token("uuid-123").unwrap();

        assert_ne!(r1.token, r2.token);
    }
}
