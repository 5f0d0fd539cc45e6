//! Channel service
//!
//! Channel CRUD guarded by the membership resolver. Deactivated channels
//! keep their rows and can be recovered by the owner or staff.

use chrono::Utc;

use crate::{
    models::{
        channel::validate_channel_name, permission::Role, Channel, ChannelId, ChannelMember,
        ChannelUpdate, PermissionBits, UserId,
    },
    repository::{ChannelMemberRepository, ChannelRepository},
    service::membership::MembershipService,
    Error, Result,
};

/// Channel service
#[derive(Clone)]
pub struct ChannelService {
    channel_repo: ChannelRepository,
    member_repo: ChannelMemberRepository,
    membership: MembershipService,
}

impl std::fmt::Debug for ChannelService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelService").finish()
    }
}

impl ChannelService {
    pub fn new(
        channel_repo: ChannelRepository,
        member_repo: ChannelMemberRepository,
        membership: MembershipService,
    ) -> Self {
        Self {
            channel_repo,
            member_repo,
            membership,
        }
    }

    /// Create a channel; the creator becomes its owner member.
    pub async fn create(
        &self,
        creator_id: &UserId,
        name: String,
        description: Option<String>,
        is_public: bool,
    ) -> Result<Channel> {
        validate_channel_name(&name)?;

        let now = Utc::now();
        let channel = Channel {
            id: ChannelId::new(),
            name,
            description,
            members_cnt: 1,
            rating: None,
            is_personal: false,
            is_public,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let owner = ChannelMember {
            channel_id: channel.id.clone(),
            user_id: creator_id.clone(),
            date_of_join: now,
            permissions: Role::Owner.permissions(),
            is_owner: true,
            notify_about_meeting: false,
        };

        let mut tx = self.channel_repo.pool().begin().await?;
        let channel = self.channel_repo.create_tx(&mut tx, &channel).await?;
        self.member_repo.create_tx(&mut tx, &owner).await?;
        tx.commit().await?;

        tracing::info!(channel_id = %channel.id, owner = %creator_id, "channel created");
        Ok(channel)
    }

    pub async fn get(&self, channel_id: &ChannelId) -> Result<Channel> {
        self.channel_repo
            .get_by_id(channel_id)
            .await?
            .ok_or_else(|| Error::NotFound("Channel not found".to_string()))
    }

    pub async fn list_active(&self, limit: i64, offset: i64) -> Result<Vec<Channel>> {
        self.channel_repo.list_active(limit, offset).await
    }

    pub async fn update(
        &self,
        channel_id: &ChannelId,
        actor_id: &UserId,
        update: ChannelUpdate,
    ) -> Result<Channel> {
        let actor = self.membership.resolve(channel_id, actor_id).await?;
        actor.require(PermissionBits::UPDATE_CHANNEL)?;

        let mut channel = self.get(channel_id).await?;
        if let Some(name) = update.name {
            validate_channel_name(&name)?;
            channel.name = name;
        }
        if let Some(description) = update.description {
            channel.description = description;
        }
        if let Some(is_public) = update.is_public {
            if channel.is_personal && is_public {
                return Err(Error::ValidationFailed(
                    "Personal channels cannot be public".to_string(),
                ));
            }
            channel.is_public = is_public;
        }

        self.channel_repo.update(&channel).await
    }

    pub async fn deactivate(&self, channel_id: &ChannelId, actor_id: &UserId) -> Result<()> {
        let actor = self.membership.resolve(channel_id, actor_id).await?;
        actor.require(PermissionBits::DELETE_CHANNEL)?;

        let channel = self.get(channel_id).await?;
        if !channel.is_active {
            return Err(Error::Conflict("Channel is already deactivated".to_string()));
        }

        self.channel_repo.set_active(channel_id, false).await?;
        tracing::info!(channel_id = %channel_id, actor = %actor_id, "channel deactivated");
        Ok(())
    }

    /// Bring a deactivated channel back. Owner or staff only.
    pub async fn recover(
        &self,
        channel_id: &ChannelId,
        actor_id: &UserId,
        actor_is_staff: bool,
    ) -> Result<Channel> {
        let channel = self.get(channel_id).await?;
        if channel.is_active {
            return Err(Error::Conflict("Channel is already active".to_string()));
        }

        if !actor_is_staff {
            let member = self.member_repo.get(channel_id, actor_id).await?;
            if !member.is_some_and(|m| m.is_owner) {
                return Err(Error::PermissionDenied {
                    missing: PermissionBits::DELETE_CHANNEL.bits(),
                });
            }
        }

        self.channel_repo.set_active(channel_id, true).await?;
        tracing::info!(channel_id = %channel_id, actor = %actor_id, "channel recovered");
        self.get(channel_id).await
    }

    /// The caller's personal channel.
    pub async fn personal_channel(&self, user_id: &UserId) -> Result<Channel> {
        self.channel_repo
            .personal_channel_of(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Personal channel not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_create_makes_creator_the_owner() {
        // Covered by integration runs against a live Postgres.
    }

    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_recover_requires_owner_or_staff() {
        // Covered by integration runs against a live Postgres.
    }
}
