use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};

use crate::{
    models::{ChannelId, ChannelMember, PermissionBits, UserId},
    Result,
};

const MEMBER_COLUMNS: &str =
    "channel_id, user_id, date_of_join, permissions, is_owner, notify_about_meeting";

/// Channel membership repository for database operations
#[derive(Clone)]
pub struct ChannelMemberRepository {
    pool: PgPool,
}

impl ChannelMemberRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        member: &ChannelMember,
    ) -> Result<ChannelMember> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO channel_members (channel_id, user_id, date_of_join, permissions,
                                         is_owner, notify_about_meeting)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MEMBER_COLUMNS}
            ",
        ))
        .bind(member.channel_id.as_str())
        .bind(member.user_id.as_str())
        .bind(member.date_of_join)
        .bind(member.permissions)
        .bind(member.is_owner)
        .bind(member.notify_about_meeting)
        .fetch_one(&mut **tx)
        .await?;

        row_to_member(&row)
    }

    pub async fn get(
        &self,
        channel_id: &ChannelId,
        user_id: &UserId,
    ) -> Result<Option<ChannelMember>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {MEMBER_COLUMNS}
            FROM channel_members
            WHERE channel_id = $1 AND user_id = $2
            ",
        ))
        .bind(channel_id.as_str())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_member).transpose()
    }

    pub async fn list_by_channel(&self, channel_id: &ChannelId) -> Result<Vec<ChannelMember>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {MEMBER_COLUMNS}
            FROM channel_members
            WHERE channel_id = $1
            ORDER BY date_of_join
            ",
        ))
        .bind(channel_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_member).collect()
    }

    /// Member set of a channel, locked for the duration of the transaction.
    /// Serializes concurrent ownership transfers on the same channel.
    pub async fn list_by_channel_locked(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        channel_id: &ChannelId,
    ) -> Result<Vec<ChannelMember>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {MEMBER_COLUMNS}
            FROM channel_members
            WHERE channel_id = $1
            ORDER BY date_of_join
            FOR UPDATE
            ",
        ))
        .bind(channel_id.as_str())
        .fetch_all(&mut **tx)
        .await?;

        rows.iter().map(row_to_member).collect()
    }

    /// Channels where the user is the owner, locked. Drives the
    /// deactivation cascade.
    pub async fn list_owned_by_user_locked(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: &UserId,
    ) -> Result<Vec<ChannelMember>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {MEMBER_COLUMNS}
            FROM channel_members
            WHERE user_id = $1 AND is_owner
            ORDER BY date_of_join
            FOR UPDATE
            ",
        ))
        .bind(user_id.as_str())
        .fetch_all(&mut **tx)
        .await?;

        rows.iter().map(row_to_member).collect()
    }

    pub async fn update_permissions_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        channel_id: &ChannelId,
        user_id: &UserId,
        permissions: PermissionBits,
        is_owner: bool,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE channel_members
            SET permissions = $3, is_owner = $4
            WHERE channel_id = $1 AND user_id = $2
            ",
        )
        .bind(channel_id.as_str())
        .bind(user_id.as_str())
        .bind(permissions)
        .bind(is_owner)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn delete_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        channel_id: &ChannelId,
        user_id: &UserId,
    ) -> Result<()> {
        sqlx::query(
            r"
            DELETE FROM channel_members
            WHERE channel_id = $1 AND user_id = $2
            ",
        )
        .bind(channel_id.as_str())
        .bind(user_id.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

pub(crate) fn row_to_member(row: &PgRow) -> Result<ChannelMember> {
    Ok(ChannelMember {
        channel_id: ChannelId::from_string(row.try_get("channel_id")?),
        user_id: UserId::from_string(row.try_get("user_id")?),
        date_of_join: row.try_get("date_of_join")?,
        permissions: row.try_get("permissions")?,
        is_owner: row.try_get("is_owner")?,
        notify_about_meeting: row.try_get("notify_about_meeting")?,
    })
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_member_set_lock_serializes_transfers() {
        // Covered by integration runs against a live Postgres.
    }
}
