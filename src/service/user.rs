//! User account service
//!
//! Registration (with the personal channel), profile access under the
//! confidentiality mask, password changes and account deactivation with
//! its ownership cascade.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::{
    models::{
        permission::Role, user::Confidentiality, Channel, ChannelId, ChannelMember, Gender, User,
        UserId, UserProfile,
    },
    repository::{
        ChannelMemberRepository, ChannelRepository, RefreshTokenRepository, UserRepository,
    },
    service::auth,
    service::email::EmailService,
    service::ownership::{plan_owner_exit, OwnerExit},
    Error, Result,
};

/// Parameters for registering a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub referrer_id: Option<UserId>,
    pub username: Option<String>,
    pub telephone: String,
    pub email: String,
    pub password: String,
    pub firstname: String,
    pub patronymic: Option<String>,
    pub surname: String,
    pub other_names: Option<String>,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
}

/// Profile fields a user may change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub username: Option<Option<String>>,
    pub telephone: Option<String>,
    pub email: Option<String>,
    pub firstname: Option<String>,
    pub patronymic: Option<Option<String>>,
    pub surname: Option<String>,
    pub other_names: Option<Option<String>>,
    pub confidentiality: Option<Confidentiality>,
}

/// User account service
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    channel_repo: ChannelRepository,
    member_repo: ChannelMemberRepository,
    token_repo: RefreshTokenRepository,
    email: EmailService,
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService").finish()
    }
}

impl UserService {
    pub fn new(
        user_repo: UserRepository,
        channel_repo: ChannelRepository,
        member_repo: ChannelMemberRepository,
        token_repo: RefreshTokenRepository,
        email: EmailService,
    ) -> Self {
        Self {
            user_repo,
            channel_repo,
            member_repo,
            token_repo,
            email,
        }
    }

    /// Register a user. The account, their personal channel and the owner
    /// membership are created in one transaction; the confirmation email
    /// goes out in the background afterwards.
    pub async fn register(&self, new: NewUser) -> Result<User> {
        if let Some(username) = &new.username {
            crate::models::user::validate_username(username)?;
        }
        crate::models::user::validate_email(&new.email)?;
        crate::models::user::validate_password(&new.password)?;

        let password_hash = auth::hash_password(&new.password).await?;
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            referrer_id: new.referrer_id,
            username: new.username,
            telephone: new.telephone,
            email: new.email,
            password_hash,
            firstname: new.firstname,
            patronymic: new.patronymic,
            surname: new.surname,
            other_names: new.other_names,
            gender: new.gender,
            date_of_birth: new.date_of_birth,
            confidentiality: Confidentiality::default(),
            is_staff: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let personal_channel = Channel {
            id: ChannelId::new(),
            name: format!("{} {}", user.firstname, user.surname),
            description: None,
            members_cnt: 1,
            rating: None,
            is_personal: true,
            is_public: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let owner_member = ChannelMember {
            channel_id: personal_channel.id.clone(),
            user_id: user.id.clone(),
            date_of_join: now,
            permissions: Role::Owner.permissions(),
            is_owner: true,
            notify_about_meeting: false,
        };

        let mut tx = self.user_repo.pool().begin().await?;
        let user = self.user_repo.create_tx(&mut tx, &user).await?;
        self.channel_repo.create_tx(&mut tx, &personal_channel).await?;
        self.member_repo.create_tx(&mut tx, &owner_member).await?;
        tx.commit().await?;

        self.email
            .send_confirmation_in_background(user.email.clone(), user.firstname.clone());

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// A user's profile as the viewer is allowed to see it.
    pub async fn get_profile(
        &self,
        user_id: &UserId,
        viewer_id: &UserId,
        viewer_is_staff: bool,
    ) -> Result<UserProfile> {
        let user = self.get_user(user_id).await?;
        Ok(user.view_for(viewer_id, viewer_is_staff))
    }

    pub async fn update_profile(&self, user_id: &UserId, update: UserUpdate) -> Result<User> {
        let mut user = self.get_user(user_id).await?;

        if let Some(username) = update.username {
            if let Some(name) = &username {
                crate::models::user::validate_username(name)?;
            }
            user.username = username;
        }
        if let Some(telephone) = update.telephone {
            user.telephone = telephone;
        }
        if let Some(email) = update.email {
            crate::models::user::validate_email(&email)?;
            user.email = email;
        }
        if let Some(firstname) = update.firstname {
            user.firstname = firstname;
        }
        if let Some(patronymic) = update.patronymic {
            user.patronymic = patronymic;
        }
        if let Some(surname) = update.surname {
            user.surname = surname;
        }
        if let Some(other_names) = update.other_names {
            user.other_names = other_names;
        }
        if let Some(confidentiality) = update.confidentiality {
            user.confidentiality = confidentiality;
        }

        self.user_repo.update(&user).await
    }

    pub async fn change_password(
        &self,
        user_id: &UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let user = self.get_user(user_id).await?;
        if !auth::verify_password(current_password, &user.password_hash).await? {
            return Err(Error::Unauthorized("Current password is wrong".to_string()));
        }
        crate::models::user::validate_password(new_password)?;

        let password_hash = auth::hash_password(new_password).await?;
        self.user_repo.update_password(user_id, &password_hash).await
    }

    /// Deactivate an account.
    ///
    /// Every channel the user owns is handed over to its best remaining
    /// member; the old owner's row stays behind as an admin. Channels with
    /// nobody left, and personal channels always, are deactivated. The
    /// account is then flagged inactive and every session revoked, all in
    /// one transaction.
    pub async fn deactivate(&self, user_id: &UserId) -> Result<()> {
        let user = self.get_user(user_id).await?;
        if !user.is_active {
            return Err(Error::Conflict("Account is already deactivated".to_string()));
        }

        let mut tx = self.user_repo.pool().begin().await?;

        let owned = self
            .member_repo
            .list_owned_by_user_locked(&mut tx, user_id)
            .await?;
        for membership in &owned {
            let channel = self
                .channel_repo
                .get_by_id_locked(&mut tx, &membership.channel_id)
                .await?
                .ok_or_else(|| Error::NotFound("Channel not found".to_string()))?;

            if channel.is_personal {
                // Personal channels follow their owner, never transfer.
                self.channel_repo
                    .set_active_tx(&mut tx, &channel.id, false)
                    .await?;
                continue;
            }

            let members = self
                .member_repo
                .list_by_channel_locked(&mut tx, &channel.id)
                .await?;
            match plan_owner_exit(&members, user_id) {
                OwnerExit::Transfer { new_owner } => {
                    self.member_repo
                        .update_permissions_tx(
                            &mut tx,
                            &channel.id,
                            user_id,
                            Role::Admin.permissions(),
                            false,
                        )
                        .await?;
                    self.member_repo
                        .update_permissions_tx(
                            &mut tx,
                            &channel.id,
                            &new_owner.user_id,
                            Role::Owner.permissions(),
                            true,
                        )
                        .await?;
                    tracing::info!(
                        channel_id = %channel.id,
                        old_owner = %user_id,
                        new_owner = %new_owner.user_id,
                        "ownership transferred on deactivation"
                    );
                }
                OwnerExit::DeactivateChannel => {
                    self.channel_repo
                        .set_active_tx(&mut tx, &channel.id, false)
                        .await?;
                }
            }
        }

        self.user_repo.set_active_tx(&mut tx, user_id, false).await?;
        self.token_repo.revoke_all_for_user_tx(&mut tx, user_id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, owned_channels = owned.len(), "account deactivated");
        Ok(())
    }

    /// Active users, redacted for the viewer.
    pub async fn list(
        &self,
        viewer_id: &UserId,
        viewer_is_staff: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserProfile>> {
        let users = self.user_repo.list_active(limit, offset).await?;
        Ok(users
            .iter()
            .map(|u| u.view_for(viewer_id, viewer_is_staff))
            .collect())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User> {
        self.user_repo
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_register_creates_personal_channel() {
        // Covered by integration runs against a live Postgres.
    }

    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_deactivation_cascades_over_owned_channels() {
        // Covered by integration runs against a live Postgres.
    }
}
