use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};

use crate::{
    models::{Channel, ChannelId, UserId},
    Result,
};

const CHANNEL_COLUMNS: &str = "id, name, description, members_cnt, rating, is_personal, \
     is_public, is_active, created_at, updated_at";

/// Channel repository for database operations
#[derive(Clone)]
pub struct ChannelRepository {
    pool: PgPool,
}

impl ChannelRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a channel inside an open transaction (creation also inserts
    /// the owner membership).
    pub async fn create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        channel: &Channel,
    ) -> Result<Channel> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO channels (id, name, description, members_cnt, rating, is_personal,
                                  is_public, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {CHANNEL_COLUMNS}
            ",
        ))
        .bind(channel.id.as_str())
        .bind(&channel.name)
        .bind(&channel.description)
        .bind(channel.members_cnt)
        .bind(channel.rating)
        .bind(channel.is_personal)
        .bind(channel.is_public)
        .bind(channel.is_active)
        .bind(channel.created_at)
        .bind(channel.updated_at)
        .fetch_one(&mut **tx)
        .await?;

        row_to_channel(&row)
    }

    pub async fn get_by_id(&self, channel_id: &ChannelId) -> Result<Option<Channel>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {CHANNEL_COLUMNS}
            FROM channels
            WHERE id = $1
            ",
        ))
        .bind(channel_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_channel).transpose()
    }

    /// Same lookup inside an open transaction, with the row locked.
    pub async fn get_by_id_locked(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        channel_id: &ChannelId,
    ) -> Result<Option<Channel>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {CHANNEL_COLUMNS}
            FROM channels
            WHERE id = $1
            FOR UPDATE
            ",
        ))
        .bind(channel_id.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        row.as_ref().map(row_to_channel).transpose()
    }

    /// List active channels, most subscribed first.
    pub async fn list_active(&self, limit: i64, offset: i64) -> Result<Vec<Channel>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {CHANNEL_COLUMNS}
            FROM channels
            WHERE is_active
            ORDER BY members_cnt DESC, created_at DESC
            LIMIT $1 OFFSET $2
            ",
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_channel).collect()
    }

    /// The personal channel a user owns, if any.
    pub async fn personal_channel_of(&self, user_id: &UserId) -> Result<Option<Channel>> {
        let row = sqlx::query(
            r"
            SELECT c.id, c.name, c.description, c.members_cnt, c.rating, c.is_personal,
                   c.is_public, c.is_active, c.created_at, c.updated_at
            FROM channels c
            JOIN channel_members m ON m.channel_id = c.id
            WHERE m.user_id = $1 AND m.is_owner AND c.is_personal
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_channel).transpose()
    }

    /// Active channels the user is subscribed to, most recently joined
    /// first.
    pub async fn list_subscribed_by_user(&self, user_id: &UserId) -> Result<Vec<Channel>> {
        let rows = sqlx::query(
            r"
            SELECT c.id, c.name, c.description, c.members_cnt, c.rating, c.is_personal,
                   c.is_public, c.is_active, c.created_at, c.updated_at
            FROM channels c
            JOIN channel_members m ON m.channel_id = c.id
            WHERE m.user_id = $1 AND c.is_active
            ORDER BY m.date_of_join DESC
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_channel).collect()
    }

    pub async fn update(&self, channel: &Channel) -> Result<Channel> {
        let row = sqlx::query(&format!(
            r"
            UPDATE channels
            SET name = $2, description = $3, is_public = $4, updated_at = $5
            WHERE id = $1
            RETURNING {CHANNEL_COLUMNS}
            ",
        ))
        .bind(channel.id.as_str())
        .bind(&channel.name)
        .bind(&channel.description)
        .bind(channel.is_public)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        row_to_channel(&row)
    }

    pub async fn set_active(&self, channel_id: &ChannelId, is_active: bool) -> Result<()> {
        sqlx::query(
            r"
            UPDATE channels
            SET is_active = $2, updated_at = $3
            WHERE id = $1
            ",
        )
        .bind(channel_id.as_str())
        .bind(is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_active_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        channel_id: &ChannelId,
        is_active: bool,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE channels
            SET is_active = $2, updated_at = $3
            WHERE id = $1
            ",
        )
        .bind(channel_id.as_str())
        .bind(is_active)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Recompute the denormalized subscriber count from the membership rows.
    pub async fn recount_members_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        channel_id: &ChannelId,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE channels
            SET members_cnt = (
                SELECT COUNT(*) FROM channel_members WHERE channel_id = $1
            ),
            updated_at = $2
            WHERE id = $1
            ",
        )
        .bind(channel_id.as_str())
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

pub(crate) fn row_to_channel(row: &PgRow) -> Result<Channel> {
    Ok(Channel {
        id: ChannelId::from_string(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        members_cnt: row.try_get("members_cnt")?,
        rating: row.try_get("rating")?,
        is_personal: row.try_get("is_personal")?,
        is_public: row.try_get("is_public")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_recount_members_matches_rows() {
        // Covered by integration runs against a live Postgres.
    }
}
