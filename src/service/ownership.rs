use crate::models::{ChannelMember, UserId};

/// What happens to a channel when its owner leaves or is deactivated.
#[derive(Debug, Clone, PartialEq)]
pub enum OwnerExit {
    /// Promote this member to owner.
    Transfer { new_owner: ChannelMember },
    /// The owner was the only member; the channel is deactivated.
    DeactivateChannel,
}

/// Pick the successor when the owner exits a channel.
///
/// The new owner is the remaining member with the most permission bits;
/// ties go to the earliest `date_of_join`, then the smallest user id, so
/// the outcome is deterministic for any input order.
#[must_use]
pub fn plan_owner_exit(members: &[ChannelMember], old_owner_id: &UserId) -> OwnerExit {
    let candidate = members
        .iter()
        .filter(|m| &m.user_id != old_owner_id)
        .min_by(|a, b| {
            b.permissions
                .bits()
                .cmp(&a.permissions.bits())
                .then_with(|| a.date_of_join.cmp(&b.date_of_join))
                .then_with(|| a.user_id.as_str().cmp(b.user_id.as_str()))
        });

    match candidate {
        Some(new_owner) => OwnerExit::Transfer {
            new_owner: new_owner.clone(),
        },
        None => OwnerExit::DeactivateChannel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::permission::Role;
    use crate::models::{ChannelId, PermissionBits};
    use crate::test_helpers::member_in_channel;
    use chrono::{Duration, Utc};

    #[test]
    fn test_sole_owner_deactivates_channel() {
        let channel_id = ChannelId::new();
        let owner = member_in_channel(&channel_id, Role::Owner, true);
        let plan = plan_owner_exit(&[owner.clone()], &owner.user_id);
        assert_eq!(plan, OwnerExit::DeactivateChannel);
    }

    #[test]
    fn test_highest_permissions_wins() {
        let channel_id = ChannelId::new();
        let owner = member_in_channel(&channel_id, Role::Owner, true);
        let admin = member_in_channel(&channel_id, Role::Admin, false);
        let member = member_in_channel(&channel_id, Role::Member, false);

        let plan = plan_owner_exit(
            &[member.clone(), owner.clone(), admin.clone()],
            &owner.user_id,
        );
        match plan {
            OwnerExit::Transfer { new_owner } => assert_eq!(new_owner.user_id, admin.user_id),
            OwnerExit::DeactivateChannel => panic!("expected a transfer"),
        }
    }

    #[test]
    fn test_tie_goes_to_earliest_join() {
        let channel_id = ChannelId::new();
        let owner = member_in_channel(&channel_id, Role::Owner, true);
        let mut early = member_in_channel(&channel_id, Role::Admin, false);
        let mut late = member_in_channel(&channel_id, Role::Admin, false);
        early.date_of_join = Utc::now() - Duration::days(30);
        late.date_of_join = Utc::now() - Duration::days(1);

        let plan = plan_owner_exit(
            &[late.clone(), early.clone(), owner.clone()],
            &owner.user_id,
        );
        match plan {
            OwnerExit::Transfer { new_owner } => assert_eq!(new_owner.user_id, early.user_id),
            OwnerExit::DeactivateChannel => panic!("expected a transfer"),
        }
    }

    #[test]
    fn test_full_tie_goes_to_smallest_user_id() {
        let channel_id = ChannelId::new();
        let joined = Utc::now() - Duration::days(7);
        let owner = member_in_channel(&channel_id, Role::Owner, true);
        let mut a = member_in_channel(&channel_id, Role::Member, false);
        let mut b = member_in_channel(&channel_id, Role::Member, false);
        a.date_of_join = joined;
        b.date_of_join = joined;
        a.user_id = crate::models::UserId::from_string("aaaaaaaaaaaa".to_string());
        b.user_id = crate::models::UserId::from_string("bbbbbbbbbbbb".to_string());

        let plan = plan_owner_exit(&[b.clone(), a.clone(), owner.clone()], &owner.user_id);
        match plan {
            OwnerExit::Transfer { new_owner } => assert_eq!(new_owner.user_id, a.user_id),
            OwnerExit::DeactivateChannel => panic!("expected a transfer"),
        }
    }

    #[test]
    fn test_result_independent_of_input_order() {
        let channel_id = ChannelId::new();
        let owner = member_in_channel(&channel_id, Role::Owner, true);
        let admin = member_in_channel(&channel_id, Role::Admin, false);
        let editor = member_in_channel(&channel_id, Role::Editor, false);

        let forward = plan_owner_exit(
            &[owner.clone(), admin.clone(), editor.clone()],
            &owner.user_id,
        );
        let reverse = plan_owner_exit(
            &[editor.clone(), admin.clone(), owner.clone()],
            &owner.user_id,
        );
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_blocked_member_still_eligible_as_last_resort() {
        let channel_id = ChannelId::new();
        let owner = member_in_channel(&channel_id, Role::Owner, true);
        let mut blocked = member_in_channel(&channel_id, Role::Blocked, false);
        blocked.permissions = PermissionBits::NONE;

        let plan = plan_owner_exit(&[owner.clone(), blocked.clone()], &owner.user_id);
        match plan {
            OwnerExit::Transfer { new_owner } => assert_eq!(new_owner.user_id, blocked.user_id),
            OwnerExit::DeactivateChannel => panic!("expected a transfer"),
        }
    }
}
