use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{MeetingId, UserId};
use crate::error::Error;

/// Feedback row, one per `(meeting_id, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub meeting_id: MeetingId,
    pub user_id: UserId,
    pub rate: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub fn validate_rate(rate: i16) -> crate::error::Result<()> {
    if (0..=5).contains(&rate) {
        Ok(())
    } else {
        Err(Error::ValidationFailed(
            "Rate must be between 0 and 5".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rate_bounds() {
        assert!(validate_rate(0).is_ok());
        assert!(validate_rate(5).is_ok());
        assert!(validate_rate(-1).is_err());
        assert!(validate_rate(6).is_err());
    }
}
