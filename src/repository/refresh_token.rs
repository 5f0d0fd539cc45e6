use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    models::{RefreshToken, UserId},
    Result,
};

const TOKEN_COLUMNS: &str = "id, user_id, is_staff, issued_at, expires_at, is_active";

/// Refresh token repository for database operations
#[derive(Clone)]
pub struct RefreshTokenRepository {
    pool: PgPool,
}

impl RefreshTokenRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create(&self, token: &RefreshToken) -> Result<RefreshToken> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO refresh_tokens (id, user_id, is_staff, issued_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TOKEN_COLUMNS}
            ",
        ))
        .bind(token.id)
        .bind(token.user_id.as_str())
        .bind(token.is_staff)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.is_active)
        .fetch_one(&self.pool)
        .await?;

        row_to_token(&row)
    }

    pub async fn create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token: &RefreshToken,
    ) -> Result<RefreshToken> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO refresh_tokens (id, user_id, is_staff, issued_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TOKEN_COLUMNS}
            ",
        ))
        .bind(token.id)
        .bind(token.user_id.as_str())
        .bind(token.is_staff)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.is_active)
        .fetch_one(&mut **tx)
        .await?;

        row_to_token(&row)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<RefreshToken>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {TOKEN_COLUMNS}
            FROM refresh_tokens
            WHERE id = $1
            ",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_token).transpose()
    }

    /// Deactivate one token if it is still active. Returns false when the
    /// row was already used or revoked, which makes rotation single-use
    /// under concurrent refresh attempts.
    pub async fn deactivate_if_active_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE refresh_tokens
            SET is_active = FALSE
            WHERE id = $1 AND is_active
            ",
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn revoke_all_for_user(&self, user_id: &UserId) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE refresh_tokens
            SET is_active = FALSE
            WHERE user_id = $1 AND is_active
            ",
        )
        .bind(user_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn revoke_all_for_user_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: &UserId,
    ) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE refresh_tokens
            SET is_active = FALSE
            WHERE user_id = $1 AND is_active
            ",
        )
        .bind(user_id.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }
}

pub(crate) fn row_to_token(row: &PgRow) -> Result<RefreshToken> {
    Ok(RefreshToken {
        id: row.try_get("id")?,
        user_id: UserId::from_string(row.try_get("user_id")?),
        is_staff: row.try_get("is_staff")?,
        issued_at: row.try_get("issued_at")?,
        expires_at: row.try_get("expires_at")?,
        is_active: row.try_get("is_active")?,
    })
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_rotation_is_single_use() {
        // Covered by integration runs against a live Postgres.
    }
}
