use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ChannelId, MeetingId, UserId};
use super::permission::PermissionBits;
use crate::error::Error;

/// Meeting row. `rating` is the denormalized average of feedback rates,
/// recomputed whenever feedback changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: MeetingId,
    pub channel_id: ChannelId,
    pub title: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub address: String,
    pub capacity: i32,
    pub price: i32,
    pub minimum_age: i32,
    pub maximum_age: i32,
    pub students_only: bool,
    pub residents_only: bool,
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    #[must_use]
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_at <= now
    }
}

/// Attendance row, keyed on `(meeting_id, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingMember {
    pub meeting_id: MeetingId,
    pub user_id: UserId,
    pub date_of_join: DateTime<Utc>,
}

/// Parameters for creating a meeting.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMeeting {
    pub channel_id: ChannelId,
    pub title: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub address: String,
    pub capacity: i32,
    pub price: i32,
    pub minimum_age: i32,
    pub maximum_age: i32,
    pub students_only: bool,
    pub residents_only: bool,
}

/// Fields a caller may change on an existing meeting.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub start_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<Option<i32>>,
    pub address: Option<String>,
    pub capacity: Option<i32>,
    pub price: Option<i32>,
    pub minimum_age: Option<i32>,
    pub maximum_age: Option<i32>,
    pub students_only: Option<bool>,
    pub residents_only: Option<bool>,
}

pub fn validate_new_meeting(new: &NewMeeting, now: DateTime<Utc>) -> crate::error::Result<()> {
    if new.title.trim().is_empty() || new.title.len() > 256 {
        return Err(Error::ValidationFailed(
            "Meeting title must be 1-256 characters".to_string(),
        ));
    }
    if new.address.trim().is_empty() || new.address.len() > 512 {
        return Err(Error::ValidationFailed(
            "Meeting address must be 1-512 characters".to_string(),
        ));
    }
    if new.start_at <= now {
        return Err(Error::ValidationFailed(
            "Meeting must start in the future".to_string(),
        ));
    }
    if new.capacity <= 0 {
        return Err(Error::ValidationFailed(
            "Capacity must be positive".to_string(),
        ));
    }
    if new.price < 0 {
        return Err(Error::ValidationFailed(
            "Price must not be negative".to_string(),
        ));
    }
    if new.minimum_age < 0 || new.maximum_age < new.minimum_age {
        return Err(Error::ValidationFailed(
            "Invalid age restriction range".to_string(),
        ));
    }
    Ok(())
}

/// Capacity guard for joins. `current` is the attendance count taken
/// under the meeting row lock.
pub fn ensure_capacity(current: i64, capacity: i32) -> crate::error::Result<()> {
    if current >= i64::from(capacity) {
        return Err(Error::Conflict("Capacity is full".to_string()));
    }
    Ok(())
}

/// Feedback preconditions: only attendees, and only once the meeting has
/// started.
pub fn ensure_feedback_open(
    meeting: &Meeting,
    attended: bool,
    now: DateTime<Utc>,
) -> crate::error::Result<()> {
    if !attended {
        return Err(Error::PermissionDenied {
            missing: PermissionBits::JOIN_MEETING.bits(),
        });
    }
    if !meeting.has_started(now) {
        return Err(Error::Conflict(
            "Meeting has not taken place yet".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{meeting_fixture, new_meeting_fixture};
    use chrono::Duration;

    #[test]
    fn test_has_started() {
        let now = Utc::now();
        let mut meeting = meeting_fixture(ChannelId::new());
        meeting.start_at = now - Duration::minutes(1);
        assert!(meeting.has_started(now));
        meeting.start_at = now + Duration::minutes(1);
        assert!(!meeting.has_started(now));
    }

    #[test]
    fn test_validate_new_meeting_ok() {
        let now = Utc::now();
        let new = new_meeting_fixture(ChannelId::new(), now + Duration::hours(1));
        assert!(validate_new_meeting(&new, now).is_ok());
    }

    #[test]
    fn test_validate_rejects_past_start() {
        let now = Utc::now();
        let new = new_meeting_fixture(ChannelId::new(), now - Duration::hours(1));
        assert!(validate_new_meeting(&new, now).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let now = Utc::now();
        let mut new = new_meeting_fixture(ChannelId::new(), now + Duration::hours(1));
        new.capacity = 0;
        assert!(validate_new_meeting(&new, now).is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_age_range() {
        let now = Utc::now();
        let mut new = new_meeting_fixture(ChannelId::new(), now + Duration::hours(1));
        new.minimum_age = 30;
        new.maximum_age = 20;
        assert!(validate_new_meeting(&new, now).is_err());
    }

    #[test]
    fn test_capacity_full_is_a_conflict() {
        assert!(ensure_capacity(3, 4).is_ok());
        assert!(matches!(
            ensure_capacity(4, 4).unwrap_err(),
            Error::Conflict(_)
        ));
        assert!(ensure_capacity(5, 4).is_err());
    }

    #[test]
    fn test_feedback_closed_before_start() {
        let now = Utc::now();
        let mut meeting = meeting_fixture(ChannelId::new());
        meeting.start_at = now + Duration::hours(1);
        assert!(matches!(
            ensure_feedback_open(&meeting, true, now).unwrap_err(),
            Error::Conflict(_)
        ));
    }

    #[test]
    fn test_feedback_open_to_attendees_after_start() {
        let now = Utc::now();
        let mut meeting = meeting_fixture(ChannelId::new());
        meeting.start_at = now - Duration::hours(1);
        assert!(ensure_feedback_open(&meeting, true, now).is_ok());
        assert!(matches!(
            ensure_feedback_open(&meeting, false, now).unwrap_err(),
            Error::PermissionDenied { .. }
        ));
    }
}
