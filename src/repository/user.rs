use std::str::FromStr;

use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};

use crate::{
    models::{Confidentiality, Gender, User, UserId},
    Result,
};

const USER_COLUMNS: &str = "id, referrer_id, username, telephone, email, password_hash, \
     firstname, patronymic, surname, other_names, gender, date_of_birth, confidentiality, \
     is_staff, is_active, created_at, updated_at";

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a new user inside an open transaction (registration creates
    /// the personal channel in the same unit of work).
    pub async fn create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: &User,
    ) -> Result<User> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO users (id, referrer_id, username, telephone, email, password_hash,
                               firstname, patronymic, surname, other_names, gender,
                               date_of_birth, confidentiality, is_staff, is_active,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {USER_COLUMNS}
            ",
        ))
        .bind(user.id.as_str())
        .bind(user.referrer_id.as_ref().map(UserId::as_str))
        .bind(&user.username)
        .bind(&user.telephone)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.firstname)
        .bind(&user.patronymic)
        .bind(&user.surname)
        .bind(&user.other_names)
        .bind(user.gender.as_str())
        .bind(user.date_of_birth)
        .bind(user.confidentiality.0)
        .bind(user.is_staff)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&mut **tx)
        .await?;

        row_to_user(&row)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, user_id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE id = $1
            ",
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    /// Get user by username, email or telephone (login lookup).
    pub async fn get_by_login(&self, login: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE username = $1 OR email = $1 OR telephone = $1
            ",
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    /// List active users, newest first.
    pub async fn list_active(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE is_active
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            ",
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_user).collect()
    }

    /// Update profile fields.
    pub async fn update(&self, user: &User) -> Result<User> {
        let row = sqlx::query(&format!(
            r"
            UPDATE users
            SET username = $2, telephone = $3, email = $4, firstname = $5, patronymic = $6,
                surname = $7, other_names = $8, gender = $9, date_of_birth = $10,
                confidentiality = $11, updated_at = $12
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            ",
        ))
        .bind(user.id.as_str())
        .bind(&user.username)
        .bind(&user.telephone)
        .bind(&user.email)
        .bind(&user.firstname)
        .bind(&user.patronymic)
        .bind(&user.surname)
        .bind(&user.other_names)
        .bind(user.gender.as_str())
        .bind(user.date_of_birth)
        .bind(user.confidentiality.0)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        row_to_user(&row)
    }

    pub async fn update_password(&self, user_id: &UserId, password_hash: &str) -> Result<()> {
        sqlx::query(
            r"
            UPDATE users
            SET password_hash = $2, updated_at = $3
            WHERE id = $1
            ",
        )
        .bind(user_id.as_str())
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Flip the active flag inside an open transaction (deactivation
    /// cascades over channels and tokens in the same unit of work).
    pub async fn set_active_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: &UserId,
        is_active: bool,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE users
            SET is_active = $2, updated_at = $3
            WHERE id = $1
            ",
        )
        .bind(user_id.as_str())
        .bind(is_active)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

pub(crate) fn row_to_user(row: &PgRow) -> Result<User> {
    let gender_str: String = row.try_get("gender")?;
    let confidentiality: i32 = row.try_get("confidentiality")?;

    let referrer_id: Option<String> = row.try_get("referrer_id")?;

    Ok(User {
        id: UserId::from_string(row.try_get("id")?),
        referrer_id: referrer_id.map(UserId::from_string),
        username: row.try_get("username")?,
        telephone: row.try_get("telephone")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        firstname: row.try_get("firstname")?,
        patronymic: row.try_get("patronymic")?,
        surname: row.try_get("surname")?,
        other_names: row.try_get("other_names")?,
        gender: Gender::from_str(&gender_str)?,
        date_of_birth: row.try_get("date_of_birth")?,
        confidentiality: Confidentiality(confidentiality),
        is_staff: row.try_get("is_staff")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_create_and_get_by_login() {
        // Covered by integration runs against a live Postgres.
    }
}
