use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::id::UserId;

/// Server-side record of an issued refresh token, keyed by the JWT `jti`.
///
/// Access tokens are stateless and never persisted; only refresh tokens
/// get a row so they can be rotated and revoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: UserId,
    pub is_staff: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

impl RefreshToken {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_is_expired() {
        let now = Utc::now();
        let token = RefreshToken {
            id: Uuid::new_v4(),
            user_id: UserId::new(),
            is_staff: false,
            issued_at: now - Duration::minutes(10),
            expires_at: now + Duration::minutes(10),
            is_active: true,
        };
        assert!(!token.is_expired(now));
        assert!(token.is_expired(now + Duration::minutes(11)));
    }
}
