//! Token lifecycle service
//!
//! Issues access/refresh pairs, rotates refresh tokens (single use) and
//! revokes whole sessions. Access tokens are stateless; refresh tokens are
//! tracked server-side by their `jti`.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    models::{RefreshToken, User, UserId},
    repository::{RefreshTokenRepository, UserRepository},
    service::auth::{Claims, JwtService, TokenType},
    Error, Result,
};

/// An access/refresh pair as handed to the client.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Token lifecycle service
#[derive(Clone)]
pub struct TokenService {
    user_repo: UserRepository,
    token_repo: RefreshTokenRepository,
    jwt: JwtService,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").finish()
    }
}

impl TokenService {
    pub fn new(
        user_repo: UserRepository,
        token_repo: RefreshTokenRepository,
        jwt: JwtService,
    ) -> Self {
        Self {
            user_repo,
            token_repo,
            jwt,
        }
    }

    /// Authenticate by username, email or telephone.
    pub async fn login(&self, login: &str, password: &str) -> Result<TokenPair> {
        let user = self
            .user_repo
            .get_by_login(login)
            .await?
            .ok_or_else(|| Error::Unauthorized("Invalid credentials".to_string()))?;

        if !super::auth::verify_password(password, &user.password_hash).await? {
            return Err(Error::Unauthorized("Invalid credentials".to_string()));
        }
        if !user.is_active {
            return Err(Error::Unauthorized("Account is deactivated".to_string()));
        }

        let pair = self.issue_pair(&user).await?;
        tracing::info!(user_id = %user.id, "user logged in");
        Ok(pair)
    }

    /// Issue a fresh pair for a user, persisting the refresh token row.
    pub async fn issue_pair(&self, user: &User) -> Result<TokenPair> {
        let now = Utc::now();
        let row = RefreshToken {
            id: Uuid::new_v4(),
            user_id: user.id.clone(),
            is_staff: user.is_staff,
            issued_at: now,
            expires_at: now + self.jwt.refresh_lifetime(),
            is_active: true,
        };
        let row = self.token_repo.create(&row).await?;

        self.sign_pair(&row)
    }

    /// Rotate a refresh token: the presented token is deactivated and a
    /// successor is issued in the same transaction. A token can only be
    /// rotated once; replays are rejected.
    pub async fn refresh(&self, refresh_jwt: &str) -> Result<TokenPair> {
        let claims = self.jwt.verify_refresh_token(refresh_jwt)?;
        let jti = claims
            .jti
            .ok_or_else(|| Error::Unauthorized("Malformed refresh token".to_string()))?;

        let row = self
            .token_repo
            .get_by_id(jti)
            .await?
            .ok_or_else(|| Error::Unauthorized("Refresh token has been revoked".to_string()))?;

        let now = Utc::now();
        if row.is_expired(now) {
            return Err(Error::Unauthorized("Refresh token expired".to_string()));
        }

        let user = self
            .user_repo
            .get_by_id(&row.user_id)
            .await?
            .ok_or_else(|| Error::Unauthorized("Account no longer exists".to_string()))?;
        if !user.is_active {
            return Err(Error::Unauthorized("Account is deactivated".to_string()));
        }

        let mut tx = self.token_repo.pool().begin().await?;
        if !self.token_repo.deactivate_if_active_tx(&mut tx, jti).await? {
            // Lost the race or the token was already spent.
            return Err(Error::Unauthorized(
                "Refresh token has been revoked".to_string(),
            ));
        }

        let successor = RefreshToken {
            id: Uuid::new_v4(),
            user_id: user.id.clone(),
            is_staff: user.is_staff,
            issued_at: now,
            expires_at: now + self.jwt.refresh_lifetime(),
            is_active: true,
        };
        let successor = self.token_repo.create_tx(&mut tx, &successor).await?;
        tx.commit().await?;

        self.sign_pair(&successor)
    }

    /// Revoke every refresh token the user holds and hand back a fresh
    /// pair. Outstanding access tokens ride out their natural expiry.
    pub async fn revoke_all(&self, user_id: &UserId) -> Result<TokenPair> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

        let revoked = self.token_repo.revoke_all_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, revoked, "all sessions revoked");

        self.issue_pair(&user).await
    }

    /// Verify an access token and return its claims.
    pub fn verify_access(&self, token: &str) -> Result<Claims> {
        self.jwt.verify_access_token(token)
    }

    fn sign_pair(&self, row: &RefreshToken) -> Result<TokenPair> {
        let access_token =
            self.jwt
                .sign_token(&row.user_id, row.is_staff, TokenType::Access, None)?;
        let refresh_token =
            self.jwt
                .sign_token(&row.user_id, row.is_staff, TokenType::Refresh, Some(row.id))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_refresh_rotation_rejects_replay() {
        // Covered by integration runs against a live Postgres.
    }

    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_login_rejects_inactive_account() {
        // Covered by integration runs against a live Postgres.
    }
}
