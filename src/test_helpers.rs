//! Fixture builders shared by unit tests.

use chrono::{Duration, NaiveDate, Utc};

use crate::models::meeting::NewMeeting;
use crate::models::permission::Role;
use crate::models::user::Confidentiality;
use crate::models::{ChannelId, ChannelMember, Gender, Meeting, MeetingId, User, UserId};

pub fn user_fixture(username: &str) -> User {
    let now = Utc::now();
    User {
        id: UserId::new(),
        referrer_id: None,
        username: Some(username.to_string()),
        telephone: format!("+7900{:07}", username.len()),
        email: format!("{username}@example.com"),
        password_hash: "$argon2id$v=19$m=65536,t=3,p=4$placeholder$hash".to_string(),
        firstname: "Alice".to_string(),
        patronymic: Some("Petrovna".to_string()),
        surname: "Ivanova".to_string(),
        other_names: None,
        gender: Gender::Female,
        date_of_birth: NaiveDate::from_ymd_opt(1995, 4, 12).unwrap_or_default(),
        confidentiality: Confidentiality::default(),
        is_staff: false,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn member_fixture(role: Role) -> ChannelMember {
    member_in_channel(&ChannelId::new(), role, matches!(role, Role::Owner))
}

pub fn member_in_channel(channel_id: &ChannelId, role: Role, is_owner: bool) -> ChannelMember {
    ChannelMember {
        channel_id: channel_id.clone(),
        user_id: UserId::new(),
        date_of_join: Utc::now() - Duration::days(10),
        permissions: role.permissions(),
        is_owner,
        notify_about_meeting: false,
    }
}

pub fn meeting_fixture(channel_id: ChannelId) -> Meeting {
    let now = Utc::now();
    Meeting {
        id: MeetingId::new(),
        channel_id,
        title: "Monthly get-together".to_string(),
        description: None,
        start_at: now + Duration::days(7),
        duration_minutes: Some(90),
        address: "12 Main St".to_string(),
        capacity: 4,
        price: 0,
        minimum_age: 0,
        maximum_age: 150,
        students_only: false,
        residents_only: false,
        rating: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn new_meeting_fixture(
    channel_id: ChannelId,
    start_at: chrono::DateTime<Utc>,
) -> NewMeeting {
    NewMeeting {
        channel_id,
        title: "Monthly get-together".to_string(),
        description: None,
        start_at,
        duration_minutes: Some(90),
        address: "12 Main St".to_string(),
        capacity: 4,
        price: 0,
        minimum_age: 0,
        maximum_age: 150,
        students_only: false,
        residents_only: false,
    }
}
