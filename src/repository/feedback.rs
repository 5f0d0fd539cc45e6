use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};

use crate::{
    models::{Feedback, MeetingId, UserId},
    Result,
};

const FEEDBACK_COLUMNS: &str = "meeting_id, user_id, rate, comment, created_at";

/// Feedback repository for database operations
#[derive(Clone)]
pub struct FeedbackRepository {
    pool: PgPool,
}

impl FeedbackRepository {
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
        feedback: &Feedback,
    ) -> Result<Feedback> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO feedback (meeting_id, user_id, rate, comment, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {FEEDBACK_COLUMNS}
            ",
        ))
        .bind(feedback.meeting_id.as_str())
        .bind(feedback.user_id.as_str())
        .bind(feedback.rate)
        .bind(&feedback.comment)
        .bind(feedback.created_at)
        .fetch_one(&mut **tx)
        .await?;

        row_to_feedback(&row)
    }

    pub async fn get(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
    ) -> Result<Option<Feedback>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {FEEDBACK_COLUMNS}
            FROM feedback
            WHERE meeting_id = $1 AND user_id = $2
            ",
        ))
        .bind(meeting_id.as_str())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_feedback).transpose()
    }

    pub async fn list_by_meeting(&self, meeting_id: &MeetingId) -> Result<Vec<Feedback>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {FEEDBACK_COLUMNS}
            FROM feedback
            WHERE meeting_id = $1
            ORDER BY created_at
            ",
        ))
        .bind(meeting_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_feedback).collect()
    }

    pub async fn update_rate_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        meeting_id: &MeetingId,
        user_id: &UserId,
        rate: i16,
        comment: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE feedback
            SET rate = $3, comment = $4
            WHERE meeting_id = $1 AND user_id = $2
            ",
        )
        .bind(meeting_id.as_str())
        .bind(user_id.as_str())
        .bind(rate)
        .bind(comment)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn delete_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        meeting_id: &MeetingId,
        user_id: &UserId,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            DELETE FROM feedback
            WHERE meeting_id = $1 AND user_id = $2
            ",
        )
        .bind(meeting_id.as_str())
        .bind(user_id.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Recompute the meeting's denormalized average rating. Runs in the
    /// same transaction as the feedback change it reflects.
    pub async fn recompute_meeting_rating_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        meeting_id: &MeetingId,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE meetings
            SET rating = (
                SELECT AVG(rate)::float8 FROM feedback WHERE meeting_id = $1
            )
            WHERE id = $1
            ",
        )
        .bind(meeting_id.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

pub(crate) fn row_to_feedback(row: &PgRow) -> Result<Feedback> {
    Ok(Feedback {
        meeting_id: MeetingId::from_string(row.try_get("meeting_id")?),
        user_id: UserId::from_string(row.try_get("user_id")?),
        rate: row.try_get("rate")?,
        comment: row.try_get("comment")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_rating_recompute_tracks_feedback() {
        // Covered by integration runs against a live Postgres.
    }
}
