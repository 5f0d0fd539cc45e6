//! Meeting service
//!
//! Meeting CRUD, attendance and feedback, all guarded through the
//! channel membership resolver.

use chrono::Utc;

use crate::{
    models::{
        meeting::{ensure_capacity, ensure_feedback_open, validate_new_meeting},
        ChannelId, Feedback, Meeting, MeetingId, MeetingMember, MeetingUpdate, NewMeeting,
        PermissionBits, UserId,
    },
    repository::{FeedbackRepository, MeetingRepository},
    service::membership::MembershipService,
    Error, Result,
};

/// Meeting service
#[derive(Clone)]
pub struct MeetingService {
    meeting_repo: MeetingRepository,
    feedback_repo: FeedbackRepository,
    membership: MembershipService,
}

impl std::fmt::Debug for MeetingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeetingService").finish()
    }
}

impl MeetingService {
    pub fn new(
        meeting_repo: MeetingRepository,
        feedback_repo: FeedbackRepository,
        membership: MembershipService,
    ) -> Self {
        Self {
            meeting_repo,
            feedback_repo,
            membership,
        }
    }

    pub async fn create(&self, actor_id: &UserId, new: NewMeeting) -> Result<Meeting> {
        let actor = self.membership.resolve(&new.channel_id, actor_id).await?;
        actor.require(PermissionBits::CREATE_MEETING)?;

        let now = Utc::now();
        validate_new_meeting(&new, now)?;

        let meeting = Meeting {
            id: MeetingId::new(),
            channel_id: new.channel_id,
            title: new.title,
            description: new.description,
            start_at: new.start_at,
            duration_minutes: new.duration_minutes,
            address: new.address,
            capacity: new.capacity,
            price: new.price,
            minimum_age: new.minimum_age,
            maximum_age: new.maximum_age,
            students_only: new.students_only,
            residents_only: new.residents_only,
            rating: None,
            created_at: now,
            updated_at: now,
        };

        let meeting = self.meeting_repo.create(&meeting).await?;
        tracing::info!(meeting_id = %meeting.id, channel_id = %meeting.channel_id, "meeting created");
        Ok(meeting)
    }

    pub async fn get(&self, meeting_id: &MeetingId, actor_id: &UserId) -> Result<Meeting> {
        let meeting = self.get_meeting(meeting_id).await?;
        let actor = self
            .membership
            .resolve(&meeting.channel_id, actor_id)
            .await?;
        actor.require(PermissionBits::SEE_MEETINGS)?;
        Ok(meeting)
    }

    /// Upcoming meetings. Staff see everything; everyone else only the
    /// channels they are a confirmed member of.
    pub async fn list_upcoming(
        &self,
        actor_id: &UserId,
        actor_is_staff: bool,
        channel_id: Option<&ChannelId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Meeting>> {
        let now = Utc::now();
        if actor_is_staff {
            self.meeting_repo
                .list_upcoming(channel_id, now, limit, offset)
                .await
        } else {
            self.meeting_repo
                .list_upcoming_for_member(actor_id, channel_id, now, limit, offset)
                .await
        }
    }

    pub async fn update(
        &self,
        meeting_id: &MeetingId,
        actor_id: &UserId,
        update: MeetingUpdate,
    ) -> Result<Meeting> {
        let mut meeting = self.get_meeting(meeting_id).await?;
        let actor = self
            .membership
            .resolve(&meeting.channel_id, actor_id)
            .await?;
        actor.require(PermissionBits::UPDATE_MEETING)?;

        if let Some(title) = update.title {
            meeting.title = title;
        }
        if let Some(description) = update.description {
            meeting.description = description;
        }
        if let Some(start_at) = update.start_at {
            meeting.start_at = start_at;
        }
        if let Some(duration_minutes) = update.duration_minutes {
            meeting.duration_minutes = duration_minutes;
        }
        if let Some(address) = update.address {
            meeting.address = address;
        }
        if let Some(capacity) = update.capacity {
            if capacity <= 0 {
                return Err(Error::ValidationFailed(
                    "Capacity must be positive".to_string(),
                ));
            }
            meeting.capacity = capacity;
        }
        if let Some(price) = update.price {
            if price < 0 {
                return Err(Error::ValidationFailed(
                    "Price must not be negative".to_string(),
                ));
            }
            meeting.price = price;
        }
        if let Some(minimum_age) = update.minimum_age {
            meeting.minimum_age = minimum_age;
        }
        if let Some(maximum_age) = update.maximum_age {
            meeting.maximum_age = maximum_age;
        }
        if let Some(students_only) = update.students_only {
            meeting.students_only = students_only;
        }
        if let Some(residents_only) = update.residents_only {
            meeting.residents_only = residents_only;
        }
        if meeting.minimum_age < 0 || meeting.maximum_age < meeting.minimum_age {
            return Err(Error::ValidationFailed(
                "Invalid age restriction range".to_string(),
            ));
        }

        self.meeting_repo.update(&meeting).await
    }

    pub async fn delete(&self, meeting_id: &MeetingId, actor_id: &UserId) -> Result<()> {
        let meeting = self.get_meeting(meeting_id).await?;
        let actor = self
            .membership
            .resolve(&meeting.channel_id, actor_id)
            .await?;
        actor.require(PermissionBits::DELETE_MEETING)?;

        self.meeting_repo.delete(meeting_id).await?;
        tracing::info!(meeting_id = %meeting_id, actor = %actor_id, "meeting deleted");
        Ok(())
    }

    /// Join a meeting. Capacity is checked under a row lock so two
    /// concurrent joins cannot both squeeze into the last seat.
    pub async fn join(&self, meeting_id: &MeetingId, user_id: &UserId) -> Result<MeetingMember> {
        let meeting = self.get_meeting(meeting_id).await?;
        let member = self
            .membership
            .resolve(&meeting.channel_id, user_id)
            .await?;
        member.require(PermissionBits::JOIN_MEETING)?;

        if self
            .meeting_repo
            .get_member(meeting_id, user_id)
            .await?
            .is_some()
        {
            return Err(Error::Conflict("Already joined this meeting".to_string()));
        }

        let mut tx = self.meeting_repo.pool().begin().await?;
        let current = self
            .meeting_repo
            .count_members_locked(&mut tx, meeting_id)
            .await?;
        ensure_capacity(current, meeting.capacity)?;

        let attendance = MeetingMember {
            meeting_id: meeting_id.clone(),
            user_id: user_id.clone(),
            date_of_join: Utc::now(),
        };
        let attendance = self.meeting_repo.add_member_tx(&mut tx, &attendance).await?;
        tx.commit().await?;

        Ok(attendance)
    }

    pub async fn leave(&self, meeting_id: &MeetingId, user_id: &UserId) -> Result<()> {
        let removed = self.meeting_repo.remove_member(meeting_id, user_id).await?;
        if !removed {
            return Err(Error::NotFound("Not a member of this meeting".to_string()));
        }
        Ok(())
    }

    /// Remove another attendee from a meeting.
    pub async fn kick(
        &self,
        meeting_id: &MeetingId,
        actor_id: &UserId,
        target_id: &UserId,
    ) -> Result<()> {
        let meeting = self.get_meeting(meeting_id).await?;
        let actor = self
            .membership
            .resolve(&meeting.channel_id, actor_id)
            .await?;
        actor.require(PermissionBits::UPDATE_MEETING)?;

        let removed = self
            .meeting_repo
            .remove_member(meeting_id, target_id)
            .await?;
        if !removed {
            return Err(Error::NotFound("Not a member of this meeting".to_string()));
        }
        tracing::info!(meeting_id = %meeting_id, actor = %actor_id, target = %target_id, "attendee kicked");
        Ok(())
    }

    pub async fn list_members(
        &self,
        meeting_id: &MeetingId,
        actor_id: &UserId,
    ) -> Result<Vec<MeetingMember>> {
        let meeting = self.get_meeting(meeting_id).await?;
        let actor = self
            .membership
            .resolve(&meeting.channel_id, actor_id)
            .await?;
        actor.require(PermissionBits::SEE_MEETING_MEMBERS)?;

        self.meeting_repo.list_members(meeting_id).await
    }

    /// Meetings the caller has joined, soonest first.
    pub async fn list_joined(&self, user_id: &UserId) -> Result<Vec<Meeting>> {
        self.meeting_repo.list_for_attendee(user_id).await
    }

    /// Leave feedback on a meeting that has taken place. One row per
    /// attendee; the meeting's average rating follows in the same
    /// transaction.
    pub async fn leave_feedback(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
        rate: i16,
        comment: Option<String>,
    ) -> Result<Feedback> {
        crate::models::feedback::validate_rate(rate)?;
        let meeting = self.ensure_feedback_allowed(meeting_id, user_id).await?;

        if self
            .feedback_repo
            .get(meeting_id, user_id)
            .await?
            .is_some()
        {
            return Err(Error::Conflict(
                "Feedback already left for this meeting".to_string(),
            ));
        }

        let feedback = Feedback {
            meeting_id: meeting_id.clone(),
            user_id: user_id.clone(),
            rate,
            comment,
            created_at: Utc::now(),
        };

        let mut tx = self.feedback_repo.pool().begin().await?;
        let feedback = self.feedback_repo.create_tx(&mut tx, &feedback).await?;
        self.feedback_repo
            .recompute_meeting_rating_tx(&mut tx, &meeting.id)
            .await?;
        tx.commit().await?;

        Ok(feedback)
    }

    pub async fn update_feedback(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
        rate: i16,
        comment: Option<String>,
    ) -> Result<()> {
        crate::models::feedback::validate_rate(rate)?;
        self.ensure_feedback_allowed(meeting_id, user_id).await?;

        if self.feedback_repo.get(meeting_id, user_id).await?.is_none() {
            return Err(Error::NotFound("Feedback not found".to_string()));
        }

        let mut tx = self.feedback_repo.pool().begin().await?;
        self.feedback_repo
            .update_rate_tx(&mut tx, meeting_id, user_id, rate, comment.as_deref())
            .await?;
        self.feedback_repo
            .recompute_meeting_rating_tx(&mut tx, meeting_id)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    pub async fn delete_feedback(&self, meeting_id: &MeetingId, user_id: &UserId) -> Result<()> {
        let mut tx = self.feedback_repo.pool().begin().await?;
        let removed = self
            .feedback_repo
            .delete_tx(&mut tx, meeting_id, user_id)
            .await?;
        if !removed {
            return Err(Error::NotFound("Feedback not found".to_string()));
        }
        self.feedback_repo
            .recompute_meeting_rating_tx(&mut tx, meeting_id)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    /// The caller's own feedback on a meeting.
    pub async fn get_feedback(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
    ) -> Result<Feedback> {
        self.feedback_repo
            .get(meeting_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Feedback not found".to_string()))
    }

    /// All feedback on a meeting, visible to anyone who can see meetings.
    pub async fn list_feedback(
        &self,
        meeting_id: &MeetingId,
        actor_id: &UserId,
    ) -> Result<Vec<Feedback>> {
        let meeting = self.get_meeting(meeting_id).await?;
        let actor = self
            .membership
            .resolve(&meeting.channel_id, actor_id)
            .await?;
        actor.require(PermissionBits::SEE_MEETINGS)?;

        self.feedback_repo.list_by_meeting(meeting_id).await
    }

    async fn ensure_feedback_allowed(
        &self,
        meeting_id: &MeetingId,
        user_id: &UserId,
    ) -> Result<Meeting> {
        let meeting = self.get_meeting(meeting_id).await?;
        let attended = self
            .meeting_repo
            .get_member(meeting_id, user_id)
            .await?
            .is_some();
        ensure_feedback_open(&meeting, attended, Utc::now())?;
        Ok(meeting)
    }

    async fn get_meeting(&self, meeting_id: &MeetingId) -> Result<Meeting> {
        self.meeting_repo
            .get_by_id(meeting_id)
            .await?
            .ok_or_else(|| Error::NotFound("Meeting not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_join_rejects_when_capacity_full() {
        // Covered by integration runs against a live Postgres.
    }

    #[tokio::test]
    #[ignore = "Requires database"]
    async fn test_feedback_recomputes_meeting_rating() {
        // Covered by integration runs against a live Postgres.
    }
}
