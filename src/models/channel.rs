use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ChannelId;
use crate::error::Error;

/// Channel row. `members_cnt` and `rating` are denormalized and recomputed
/// by the services after every mutation that affects them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub description: Option<String>,
    pub members_cnt: i32,
    pub rating: Option<f64>,
    pub is_personal: bool,
    pub is_public: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller may change on an existing channel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub is_public: Option<bool>,
}

pub fn validate_channel_name(name: &str) -> crate::error::Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.len() > 100 {
        return Err(Error::ValidationFailed(
            "Channel name must be 1-100 characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_channel_name() {
        assert!(validate_channel_name("Rust Meetups").is_ok());
        assert!(validate_channel_name("").is_err());
        assert!(validate_channel_name("   ").is_err());
        assert!(validate_channel_name(&"x".repeat(101)).is_err());
    }
}
