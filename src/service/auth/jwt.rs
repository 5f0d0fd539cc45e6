use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{models::UserId, Error, Result};

/// JWT token type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Staff flag
    pub staff: bool,
    /// Token type (access or refresh)
    pub typ: String,
    /// Token ID; refresh tokens are tracked server-side by this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<Uuid>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn user_id(&self) -> UserId {
        UserId::from_string(self.sub.clone())
    }

    #[must_use]
    pub fn is_access_token(&self) -> bool {
        self.typ == "access"
    }

    #[must_use]
    pub fn is_refresh_token(&self) -> bool {
        self.typ == "refresh"
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// JWT service for signing and verifying tokens (HS256, shared secret).
#[derive(Clone)]
pub struct JwtService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("access_lifetime", &self.access_lifetime)
            .field("refresh_lifetime", &self.refresh_lifetime)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    pub fn new(secret: &[u8], access_minutes: i64, refresh_minutes: i64) -> Result<Self> {
        if secret.len() < 32 {
            return Err(Error::Internal(
                "JWT secret must be at least 32 bytes".to_string(),
            ));
        }

        Ok(Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret)),
            decoding_key: Arc::new(DecodingKey::from_secret(secret)),
            access_lifetime: Duration::minutes(access_minutes),
            refresh_lifetime: Duration::minutes(refresh_minutes),
        })
    }

    #[must_use]
    pub const fn refresh_lifetime(&self) -> Duration {
        self.refresh_lifetime
    }

    /// Sign a token for a user. Refresh tokens carry a `jti` matching their
    /// server-side row; access tokens are stateless.
    pub fn sign_token(
        &self,
        user_id: &UserId,
        is_staff: bool,
        token_type: TokenType,
        jti: Option<Uuid>,
    ) -> Result<String> {
        let now = Utc::now();
        let (duration, typ) = match token_type {
            TokenType::Access => (self.access_lifetime, "access"),
            TokenType::Refresh => (self.refresh_lifetime, "refresh"),
        };

        let claims = Claims {
            sub: user_id.as_str().to_string(),
            staff: is_staff,
            typ: typ.to_string(),
            jti,
            iat: now.timestamp(),
            exp: (now + duration).timestamp(),
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to sign token: {e}")))
    }

    /// Verify a token and extract claims
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 60; // clock skew

        let token_data: TokenData<Claims> = decode(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Error::Unauthorized("Token expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    Error::Unauthorized("Invalid token".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    Error::Unauthorized("Invalid token signature".to_string())
                }
                _ => Error::Unauthorized(format!("Token verification failed: {e}")),
            })?;

        Ok(token_data.claims)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims> {
        let claims = self.verify_token(token)?;
        if !claims.is_access_token() {
            return Err(Error::Unauthorized("Not an access token".to_string()));
        }
        Ok(claims)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims> {
        let claims = self.verify_token(token)?;
        if !claims.is_refresh_token() {
            return Err(Error::Unauthorized("Not a refresh token".to_string()));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn service() -> JwtService {
        JwtService::new(SECRET, 15, 60 * 24).unwrap()
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(JwtService::new(b"too-short", 15, 60).is_err());
    }

    #[test]
    fn test_access_token_round_trip() {
        let svc = service();
        let user_id = UserId::new();
        let token = svc
            .sign_token(&user_id, false, TokenType::Access, None)
            .unwrap();

        let claims = svc.verify_access_token(&token).unwrap();
        assert_eq!(claims.user_id(), user_id);
        assert!(!claims.staff);
        assert!(claims.jti.is_none());
    }

    #[test]
    fn test_refresh_token_carries_jti() {
        let svc = service();
        let jti = Uuid::new_v4();
        let token = svc
            .sign_token(&UserId::new(), true, TokenType::Refresh, Some(jti))
            .unwrap();

        let claims = svc.verify_refresh_token(&token).unwrap();
        assert_eq!(claims.jti, Some(jti));
        assert!(claims.staff);
    }

    #[test]
    fn test_token_type_mismatch() {
        let svc = service();
        let access = svc
            .sign_token(&UserId::new(), false, TokenType::Access, None)
            .unwrap();
        assert!(svc.verify_refresh_token(&access).is_err());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let svc = service();
        let token = svc
            .sign_token(&UserId::new(), false, TokenType::Access, None)
            .unwrap();

        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('A') { 'B' } else { 'A' });
        assert!(svc.verify_token(&tampered).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let svc = service();
        let other = JwtService::new(b"another-secret-another-secret-32", 15, 60).unwrap();
        let token = svc
            .sign_token(&UserId::new(), false, TokenType::Access, None)
            .unwrap();
        assert!(other.verify_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // Negative lifetime puts exp in the past, beyond the 60s leeway.
        let svc = JwtService::new(SECRET, -5, -5).unwrap();
        let token = svc
            .sign_token(&UserId::new(), false, TokenType::Access, None)
            .unwrap();

        let err = service().verify_token(&token).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }
}
