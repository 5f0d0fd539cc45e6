//! Channel membership service
//!
//! Resolves a caller's standing in a channel and handles subscription,
//! confirmation, role changes and ownership handover.

use chrono::Utc;

use crate::{
    models::{
        permission::Role, Channel, ChannelId, ChannelMember, Membership, PermissionBits, UserId,
    },
    repository::{ChannelMemberRepository, ChannelRepository},
    service::ownership::{plan_owner_exit, OwnerExit},
    Error, Result,
};

/// Channel membership service
#[derive(Clone)]
pub struct MembershipService {
    channel_repo: ChannelRepository,
    member_repo: ChannelMemberRepository,
}

impl std::fmt::Debug for MembershipService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipService").finish()
    }
}

impl MembershipService {
    pub fn new(channel_repo: ChannelRepository, member_repo: ChannelMemberRepository) -> Self {
        Self {
            channel_repo,
            member_repo,
        }
    }

    /// Resolve a user's standing in a channel.
    ///
    /// Subscribers get their persisted row. Everyone else gets a synthetic
    /// membership: the guest mask on public channels, nothing otherwise.
    pub async fn resolve(&self, channel_id: &ChannelId, user_id: &UserId) -> Result<Membership> {
        if let Some(member) = self.member_repo.get(channel_id, user_id).await? {
            return Ok(Membership::Persisted(member));
        }

        let channel = self.get_channel(channel_id).await?;
        let role = if channel.is_public {
            Role::Guest
        } else {
            Role::Anonymous
        };

        Ok(Membership::Synthetic {
            channel_id: channel_id.clone(),
            user_id: user_id.clone(),
            permissions: role.permissions(),
        })
    }

    /// Subscribe a user to a channel.
    ///
    /// Public channels admit subscribers as members right away; private
    /// channels park them as confirmation waiters.
    pub async fn subscribe(
        &self,
        channel_id: &ChannelId,
        user_id: &UserId,
    ) -> Result<ChannelMember> {
        let channel = self.get_channel(channel_id).await?;
        if !channel.is_active {
            return Err(Error::Conflict("Channel is not active".to_string()));
        }

        if self.member_repo.get(channel_id, user_id).await?.is_some() {
            return Err(Error::Conflict(
                "Already subscribed to this channel".to_string(),
            ));
        }

        let role = if channel.is_public {
            Role::Member
        } else {
            Role::ConfirmWaiter
        };

        let member = ChannelMember {
            channel_id: channel_id.clone(),
            user_id: user_id.clone(),
            date_of_join: Utc::now(),
            permissions: role.permissions(),
            is_owner: false,
            notify_about_meeting: false,
        };

        let mut tx = self.member_repo.pool().begin().await?;
        let created = self.member_repo.create_tx(&mut tx, &member).await?;
        self.channel_repo
            .recount_members_tx(&mut tx, channel_id)
            .await?;
        tx.commit().await?;

        tracing::info!(channel_id = %channel_id, user_id = %user_id, role = %role, "user subscribed");
        Ok(created)
    }

    /// Unsubscribe a user from a channel.
    ///
    /// When the owner leaves, ownership moves to the best remaining member;
    /// if nobody remains the channel is deactivated and the owner's row is
    /// kept. Personal channels cannot be left.
    pub async fn unsubscribe(&self, channel_id: &ChannelId, user_id: &UserId) -> Result<()> {
        let member = self
            .member_repo
            .get(channel_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Not subscribed to this channel".to_string()))?;

        if !member.is_owner {
            let mut tx = self.member_repo.pool().begin().await?;
            self.member_repo.delete_tx(&mut tx, channel_id, user_id).await?;
            self.channel_repo
                .recount_members_tx(&mut tx, channel_id)
                .await?;
            tx.commit().await?;
            return Ok(());
        }

        let channel = self.get_channel(channel_id).await?;
        if channel.is_personal {
            return Err(Error::Conflict(
                "Cannot unsubscribe from a personal channel".to_string(),
            ));
        }

        let mut tx = self.member_repo.pool().begin().await?;
        let members = self
            .member_repo
            .list_by_channel_locked(&mut tx, channel_id)
            .await?;

        match plan_owner_exit(&members, user_id) {
            OwnerExit::Transfer { new_owner } => {
                self.member_repo.delete_tx(&mut tx, channel_id, user_id).await?;
                self.member_repo
                    .update_permissions_tx(
                        &mut tx,
                        channel_id,
                        &new_owner.user_id,
                        Role::Owner.permissions(),
                        true,
                    )
                    .await?;
                tracing::info!(
                    channel_id = %channel_id,
                    old_owner = %user_id,
                    new_owner = %new_owner.user_id,
                    "channel ownership transferred"
                );
            }
            OwnerExit::DeactivateChannel => {
                // Sole member: keep the row, retire the channel.
                self.channel_repo
                    .set_active_tx(&mut tx, channel_id, false)
                    .await?;
                tracing::info!(channel_id = %channel_id, "channel deactivated, owner was sole member");
            }
        }

        self.channel_repo
            .recount_members_tx(&mut tx, channel_id)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Confirm a waiting subscriber into a full member.
    pub async fn confirm(
        &self,
        channel_id: &ChannelId,
        actor_id: &UserId,
        target_id: &UserId,
    ) -> Result<()> {
        let actor = self.resolve(channel_id, actor_id).await?;
        actor.require(PermissionBits::GIVE_ACCESS)?;

        let target = self
            .member_repo
            .get(channel_id, target_id)
            .await?
            .ok_or_else(|| Error::NotFound("Subscriber not found".to_string()))?;

        if target.permissions != Role::ConfirmWaiter.permissions() {
            return Err(Error::Conflict(
                "Subscriber is not waiting for confirmation".to_string(),
            ));
        }

        let mut tx = self.member_repo.pool().begin().await?;
        self.member_repo
            .update_permissions_tx(
                &mut tx,
                channel_id,
                target_id,
                Role::Member.permissions(),
                false,
            )
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Assign a role to another subscriber.
    ///
    /// The actor needs `GIVE_ACCESS` and every bit the new role grants;
    /// nobody can change their own role or the owner's.
    pub async fn set_role(
        &self,
        channel_id: &ChannelId,
        actor_id: &UserId,
        target_id: &UserId,
        role: Role,
    ) -> Result<()> {
        if actor_id == target_id {
            return Err(Error::Conflict("Cannot change your own role".to_string()));
        }
        if matches!(role, Role::Owner | Role::Guest | Role::Anonymous) {
            return Err(Error::ValidationFailed(format!(
                "Role {role} cannot be assigned"
            )));
        }

        let actor = self.resolve(channel_id, actor_id).await?;
        actor.require(PermissionBits::GIVE_ACCESS)?;
        // No privilege escalation through delegation.
        actor.require(role.permissions())?;

        let channel = self.get_channel(channel_id).await?;
        if channel.is_personal && !matches!(role, Role::Member | Role::Blocked) {
            return Err(Error::ValidationFailed(
                "Personal channels only allow member and blocked roles".to_string(),
            ));
        }

        let target = self
            .member_repo
            .get(channel_id, target_id)
            .await?
            .ok_or_else(|| Error::NotFound("Subscriber not found".to_string()))?;
        if target.is_owner {
            return Err(Error::Conflict("Cannot change the owner's role".to_string()));
        }

        let mut tx = self.member_repo.pool().begin().await?;
        self.member_repo
            .update_permissions_tx(&mut tx, channel_id, target_id, role.permissions(), false)
            .await?;
        tx.commit().await?;

        tracing::info!(channel_id = %channel_id, target = %target_id, role = %role, "role changed");
        Ok(())
    }

    /// Hand channel ownership to another subscriber. The old owner stays
    /// on as an admin.
    pub async fn make_owner(
        &self,
        channel_id: &ChannelId,
        actor_id: &UserId,
        target_id: &UserId,
    ) -> Result<()> {
        if actor_id == target_id {
            return Err(Error::Conflict("Already the owner".to_string()));
        }

        let actor = self
            .member_repo
            .get(channel_id, actor_id)
            .await?
            .ok_or_else(|| Error::NotFound("Not subscribed to this channel".to_string()))?;
        if !actor.is_owner {
            return Err(Error::PermissionDenied {
                missing: PermissionBits::DELETE_CHANNEL.bits(),
            });
        }

        let channel = self.get_channel(channel_id).await?;
        if channel.is_personal {
            return Err(Error::Conflict(
                "Personal channels cannot change owner".to_string(),
            ));
        }

        if self.member_repo.get(channel_id, target_id).await?.is_none() {
            return Err(Error::NotFound("Subscriber not found".to_string()));
        }

        let mut tx = self.member_repo.pool().begin().await?;
        self.member_repo
            .update_permissions_tx(
                &mut tx,
                channel_id,
                actor_id,
                Role::Admin.permissions(),
                false,
            )
            .await?;
        self.member_repo
            .update_permissions_tx(
                &mut tx,
                channel_id,
                target_id,
                Role::Owner.permissions(),
                true,
            )
            .await?;
        tx.commit().await?;

        tracing::info!(channel_id = %channel_id, old_owner = %actor_id, new_owner = %target_id, "ownership handed over");
        Ok(())
    }

    /// Members of a channel, optionally narrowed to a set of role masks.
    pub async fn list_members(
        &self,
        channel_id: &ChannelId,
        actor_id: &UserId,
        roles: Option<&[Role]>,
    ) -> Result<Vec<ChannelMember>> {
        let actor = self.resolve(channel_id, actor_id).await?;
        actor.require(PermissionBits::SEE_SUBSCRIBERS)?;

        let members = self.member_repo.list_by_channel(channel_id).await?;
        Ok(match roles {
            None => members,
            Some(roles) => members
                .into_iter()
                .filter(|m| roles.iter().any(|r| m.permissions == r.permissions()))
                .collect(),
        })
    }

    /// Channels the user is subscribed to, most recently joined first.
    pub async fn channels_of(&self, user_id: &UserId) -> Result<Vec<Channel>> {
        self.channel_repo.list_subscribed_by_user(user_id).await
    }

    async fn get_channel(&self, channel_id: &ChannelId) -> Result<Channel> {
        self.channel_repo
            .get_by_id(channel_id)
            .await?
            .ok_or_else(|| Error::NotFound("Channel not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_subscribe_public_channel_grants_member_role() {
        // Covered by integration runs against a live Postgres.
    }

    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_owner_unsubscribe_transfers_ownership() {
        // Covered by integration runs against a live Postgres.
    }
}
