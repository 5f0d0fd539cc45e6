use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ChannelId, UserId};
use super::permission::PermissionBits;

/// Persisted membership row, keyed on `(channel_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMember {
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub date_of_join: DateTime<Utc>,
    pub permissions: PermissionBits,
    pub is_owner: bool,
    pub notify_about_meeting: bool,
}

/// A user's standing in a channel as seen by the permission checks.
///
/// `Persisted` wraps a real `channel_members` row; `Synthetic` is computed
/// on the fly for non-subscribers (guest mask on public channels, nothing
/// otherwise) and can never reach a repository write.
#[derive(Debug, Clone)]
pub enum Membership {
    Persisted(ChannelMember),
    Synthetic {
        channel_id: ChannelId,
        user_id: UserId,
        permissions: PermissionBits,
    },
}

impl Membership {
    #[must_use]
    pub fn permissions(&self) -> PermissionBits {
        match self {
            Self::Persisted(m) => m.permissions,
            Self::Synthetic { permissions, .. } => *permissions,
        }
    }

    #[must_use]
    pub fn channel_id(&self) -> &ChannelId {
        match self {
            Self::Persisted(m) => &m.channel_id,
            Self::Synthetic { channel_id, .. } => channel_id,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        match self {
            Self::Persisted(m) => &m.user_id,
            Self::Synthetic { user_id, .. } => user_id,
        }
    }

    /// The underlying row, if the user is actually subscribed.
    #[must_use]
    pub fn persisted(&self) -> Option<&ChannelMember> {
        match self {
            Self::Persisted(m) => Some(m),
            Self::Synthetic { .. } => None,
        }
    }

    #[must_use]
    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Persisted(m) if m.is_owner)
    }

    /// Permission check over whichever mask this membership carries.
    pub fn require(&self, perm: PermissionBits) -> crate::error::Result<()> {
        self.permissions().require(perm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::permission::Role;
    use crate::test_helpers::member_fixture;

    #[test]
    fn test_persisted_membership_exposes_row() {
        let member = member_fixture(Role::Admin);
        let membership = Membership::Persisted(member.clone());
        assert_eq!(membership.permissions(), Role::Admin.permissions());
        assert!(membership.persisted().is_some());
        assert_eq!(membership.user_id(), &member.user_id);
    }

    #[test]
    fn test_synthetic_membership_has_no_row() {
        let membership = Membership::Synthetic {
            channel_id: ChannelId::new(),
            user_id: UserId::new(),
            permissions: Role::Guest.permissions(),
        };
        assert!(membership.persisted().is_none());
        assert!(!membership.is_owner());
        assert!(membership.require(PermissionBits::SEE_MEETINGS).is_ok());
    }

    #[test]
    fn test_synthetic_anonymous_denied() {
        let membership = Membership::Synthetic {
            channel_id: ChannelId::new(),
            user_id: UserId::new(),
            permissions: Role::Anonymous.permissions(),
        };
        let err = membership.require(PermissionBits::SEE_MEETINGS).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied { .. }));
    }
}
