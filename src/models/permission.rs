use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Channel-scoped permission bitmask.
///
/// Stored as a signed 64-bit integer column on `channel_members`. Each bit
/// grants one capability; role masks below are OR-combinations of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionBits(pub i64);

impl PermissionBits {
    pub const NONE: Self = Self(0);

    pub const JOIN_MEETING: Self = Self(1 << 0);
    pub const SEE_MEETING_MEMBERS: Self = Self(1 << 1);
    pub const SEE_SUBSCRIBERS: Self = Self(1 << 2);
    pub const SEE_MEETINGS: Self = Self(1 << 3);
    pub const DELETE_MEETING: Self = Self(1 << 4);
    pub const UPDATE_MEETING: Self = Self(1 << 5);
    pub const CREATE_MEETING: Self = Self(1 << 6);
    pub const SEE_USER_INFO: Self = Self(1 << 7);
    pub const GIVE_ACCESS: Self = Self(1 << 8);
    pub const UPDATE_CHANNEL: Self = Self(1 << 9);
    pub const DELETE_CHANNEL: Self = Self(1 << 10);

    pub const ALL: Self = Self((1 << 11) - 1);

    #[must_use]
    pub const fn bits(self) -> i64 {
        self.0
    }

    /// Subset test: every bit of `perm` is present in `self`.
    #[must_use]
    pub const fn has(self, perm: Self) -> bool {
        (self.0 & perm.0) == perm.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn remove(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Check `perm` and fail with the bits the holder lacks.
    ///
    /// No side effects on success; the error carries `perm & !self`.
    pub fn require(self, perm: Self) -> crate::error::Result<()> {
        if self.has(perm) {
            Ok(())
        } else {
            Err(Error::PermissionDenied {
                missing: perm.0 & !self.0,
            })
        }
    }
}

impl std::ops::BitOr for PermissionBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for PermissionBits {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for PermissionBits {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for PermissionBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#b}", self.0)
    }
}

impl sqlx::Type<sqlx::Postgres> for PermissionBits {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl sqlx::Encode<'_, sqlx::Postgres> for PermissionBits {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PermissionBits {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let v = <i64 as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
        Ok(Self(v))
    }
}

/// Named role within a channel. Each role expands to a fixed permission mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Editor,
    Member,
    Guest,
    ConfirmWaiter,
    Anonymous,
    Blocked,
}

impl Role {
    /// Default permission mask for this role.
    #[must_use]
    pub const fn permissions(self) -> PermissionBits {
        const VIEW: i64 = PermissionBits::SEE_MEETINGS.0
            | PermissionBits::SEE_SUBSCRIBERS.0
            | PermissionBits::SEE_MEETING_MEMBERS.0
            | PermissionBits::JOIN_MEETING.0;
        match self {
            Self::Owner => PermissionBits::ALL,
            Self::Admin => PermissionBits(PermissionBits::ALL.0 & !PermissionBits::DELETE_CHANNEL.0),
            Self::Editor => PermissionBits(
                VIEW | PermissionBits::CREATE_MEETING.0
                    | PermissionBits::UPDATE_MEETING.0
                    | PermissionBits::SEE_USER_INFO.0,
            ),
            Self::Member | Self::Guest => PermissionBits(VIEW),
            Self::Blocked => PermissionBits(
                PermissionBits::SEE_SUBSCRIBERS.0 | PermissionBits::SEE_MEETINGS.0,
            ),
            Self::ConfirmWaiter | Self::Anonymous => PermissionBits::NONE,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Member => "member",
            Self::Guest => "guest",
            Self::ConfirmWaiter => "confirm_waiter",
            Self::Anonymous => "anonymous",
            Self::Blocked => "blocked",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "editor" => Ok(Self::Editor),
            "member" => Ok(Self::Member),
            "guest" => Ok(Self::Guest),
            "confirm_waiter" => Ok(Self::ConfirmWaiter),
            "anonymous" => Ok(Self::Anonymous),
            "blocked" => Ok(Self::Blocked),
            other => Err(Error::ValidationFailed(format!("Unknown role: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_is_subset_test() {
        let bits = PermissionBits::SEE_MEETINGS | PermissionBits::JOIN_MEETING;
        assert!(bits.has(PermissionBits::SEE_MEETINGS));
        assert!(bits.has(PermissionBits::SEE_MEETINGS | PermissionBits::JOIN_MEETING));
        assert!(!bits.has(PermissionBits::CREATE_MEETING));
        assert!(!bits.has(PermissionBits::SEE_MEETINGS | PermissionBits::CREATE_MEETING));
        assert!(bits.has(PermissionBits::NONE));
    }

    #[test]
    fn test_require_reports_only_missing_bits() {
        let bits = PermissionBits::SEE_MEETINGS;
        let wanted = PermissionBits::SEE_MEETINGS | PermissionBits::CREATE_MEETING;
        let err = bits.require(wanted).unwrap_err();
        match err {
            Error::PermissionDenied { missing } => {
                assert_eq!(missing, PermissionBits::CREATE_MEETING.0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_require_ok_when_subset() {
        let bits = Role::Admin.permissions();
        assert!(bits.require(PermissionBits::CREATE_MEETING).is_ok());
    }

    #[test]
    fn test_owner_has_everything() {
        assert_eq!(Role::Owner.permissions(), PermissionBits::ALL);
        assert!(Role::Owner.permissions().has(PermissionBits::DELETE_CHANNEL));
    }

    #[test]
    fn test_admin_cannot_delete_channel() {
        let admin = Role::Admin.permissions();
        assert!(!admin.has(PermissionBits::DELETE_CHANNEL));
        assert!(admin.has(PermissionBits::DELETE_MEETING));
        assert!(admin.has(PermissionBits::GIVE_ACCESS));
    }

    #[test]
    fn test_editor_manages_meetings_but_not_members() {
        let editor = Role::Editor.permissions();
        assert!(editor.has(PermissionBits::CREATE_MEETING));
        assert!(editor.has(PermissionBits::UPDATE_MEETING));
        assert!(!editor.has(PermissionBits::DELETE_MEETING));
        assert!(!editor.has(PermissionBits::GIVE_ACCESS));
    }

    #[test]
    fn test_member_equals_guest() {
        assert_eq!(Role::Member.permissions(), Role::Guest.permissions());
        assert!(Role::Member.permissions().has(PermissionBits::JOIN_MEETING));
    }

    #[test]
    fn test_blocked_sees_but_cannot_join() {
        let blocked = Role::Blocked.permissions();
        assert!(blocked.has(PermissionBits::SEE_MEETINGS));
        assert!(blocked.has(PermissionBits::SEE_SUBSCRIBERS));
        assert!(!blocked.has(PermissionBits::JOIN_MEETING));
        assert!(!blocked.has(PermissionBits::SEE_MEETING_MEMBERS));
    }

    #[test]
    fn test_waiter_and_anonymous_have_nothing() {
        assert_eq!(Role::ConfirmWaiter.permissions(), PermissionBits::NONE);
        assert_eq!(Role::Anonymous.permissions(), PermissionBits::NONE);
    }

    #[test]
    fn test_role_round_trip() {
        for role in [
            Role::Owner,
            Role::Admin,
            Role::Editor,
            Role::Member,
            Role::Guest,
            Role::ConfirmWaiter,
            Role::Anonymous,
            Role::Blocked,
        ] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(_)));
    }
}
