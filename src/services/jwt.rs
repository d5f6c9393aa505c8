// Session token issue and verification
// HS256 JWTs carrying the authenticated identity; one token class, no refresh
// flow. The synthetic super-admin is encoded as a reserved subject so it never
// collides with a database user id.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use crate::middleware::auth::Role;

/// Reserved subject for the synthetic super-admin principal
pub const SUPER_ADMIN_SUBJECT: &str = "super-admin";

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("JWT encoding error: {0}")]
    EncodingError(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer => JwtError::InvalidToken,
            _ => JwtError::EncodingError(err.to_string()),
        }
    }
}

/// Claims carried by every session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id as a string, or [`SUPER_ADMIN_SUBJECT`]
    pub sub: String,
    pub role: String,
    pub jti: String,
    pub iat: u64,
    pub exp: u64,
    pub iss: String,
    pub aud: String,
}

impl SessionClaims {
    /// Database user id, if this token belongs to a registered user
    pub fn user_id(&self) -> Option<i32> {
        self.sub.parse().ok()
    }

    pub fn is_super_admin(&self) -> bool {
        self.sub == SUPER_ADMIN_SUBJECT
    }
}

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    pub expiry_seconds: u64,
    pub audience: String,
    pub issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("expiry_seconds", &self.expiry_seconds)
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("encoding_key", &"<redacted>")
            .field("decoding_key", &"<redacted>")
            .finish()
    }
}

impl JwtConfig {
    pub fn new(secret: &str, expiry_seconds: u64, audience: String, issuer: String) -> Self {
        Self {
            expiry_seconds,
            audience,
            issuer,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Create JWT config from centralized app configuration
    pub fn from_env() -> Self {
        let settings = &crate::app_config::config().jwt;
        Self::new(
            &settings.secret,
            settings.expiry_seconds,
            settings.audience.clone(),
            settings.issuer.clone(),
        )
    }

    /// Deterministic config for tests, independent of the environment
    pub fn for_test() -> Self {
        Self::new(
            "test-session-secret-that-is-long-enough",
            3600,
            "test.niko".to_string(),
            "test.niko".to_string(),
        )
    }
}

/// Session token service
pub struct JwtService {
    config: JwtConfig,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(JwtConfig::from_env())
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn issue(&self, sub: String, role: Role) -> Result<String, JwtError> {
        let iat = Self::now();
        let claims = SessionClaims {
            sub,
            role: role.as_str().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat,
            exp: iat + self.config.expiry_seconds,
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.config.encoding_key,
        )
        .map_err(|e| JwtError::EncodingError(e.to_string()))
    }

    /// Issue a token for a registered user
    pub fn issue_for_user(&self, user_id: i32, role: Role) -> Result<String, JwtError> {
        self.issue(user_id.to_string(), role)
    }

    /// Issue a token for the synthetic super-admin
    pub fn issue_super_admin(&self) -> Result<String, JwtError> {
        self.issue(SUPER_ADMIN_SUBJECT.to_string(), Role::SuperAdmin)
    }

    /// Validate a token and return its claims
    pub fn validate(&self, token: &str) -> Result<SessionClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.audience.clone()]);
        validation.set_issuer(&[self.config.issuer.clone()]);

        let data = decode::<SessionClaims>(token, &self.config.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(JwtConfig::for_test())
    }

    #[test]
    fn test_issue_and_validate_user_token() {
        let svc = service();
        let token = svc.issue_for_user(42, Role::User).expect("issue");
        let claims = svc.validate(&token).expect("validate");

        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.role, "user");
        assert!(!claims.is_super_admin());
    }

    #[test]
    fn test_super_admin_token_has_reserved_subject() {
        let svc = service();
        let token = svc.issue_super_admin().expect("issue");
        let claims = svc.validate(&token).expect("validate");

        assert!(claims.is_super_admin());
        assert_eq!(claims.user_id(), None);
        assert_eq!(claims.role, "super_admin");
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let svc = service();
        let token = svc.issue_for_user(1, Role::Admin).expect("issue");
        let mut tampered = token.clone();
        tampered.push('x');

        assert!(matches!(
            svc.validate(&tampered),
            Err(JwtError::InvalidToken) | Err(JwtError::EncodingError(_))
        ));
    }

    #[test]
    fn test_wrong_audience_is_rejected() {
        let issuing = JwtService::new(JwtConfig::new(
            "test-session-secret-that-is-long-enough",
            3600,
            "other-audience".to_string(),
            "test.niko".to_string(),
        ));
        let token = issuing.issue_for_user(1, Role::User).expect("issue");

        assert!(service().validate(&token).is_err());
    }
}
