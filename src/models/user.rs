use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::id::UserId;
use crate::error::Error;

/// Profile confidentiality bitmask. A set bit hides the field from
/// non-staff viewers other than the user themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidentiality(pub i32);

impl Confidentiality {
    pub const HIDE_AVATAR: Self = Self(0b1_0000_0000);
    pub const HIDE_USERNAME: Self = Self(0b0_1000_0000);
    pub const HIDE_PATRONYMIC: Self = Self(0b0_0100_0000);
    pub const HIDE_SURNAME: Self = Self(0b0_0010_0000);
    pub const HIDE_BIRTHDATE: Self = Self(0b0_0001_0000);
    pub const HIDE_TELEPHONE: Self = Self(0b0_0000_1000);
    pub const HIDE_EMAIL: Self = Self(0b0_0000_0100);
    pub const HIDE_CHANNELS: Self = Self(0b0_0000_0010);
    pub const HIDE_CATEGORIES: Self = Self(0b0_0000_0001);

    pub const ALL: Self = Self(0b1_1111_1111);

    #[must_use]
    pub const fn hides(self, flag: Self) -> bool {
        (self.0 & flag.0) != 0
    }
}

impl Default for Confidentiality {
    /// New accounts hide patronymic, telephone and email.
    fn default() -> Self {
        Self(Self::HIDE_PATRONYMIC.0 | Self::HIDE_TELEPHONE.0 | Self::HIDE_EMAIL.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            other => Err(Error::ValidationFailed(format!("Unknown gender: {other}"))),
        }
    }
}

/// User account row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// The user who invited this one, if any.
    pub referrer_id: Option<UserId>,

    // credentials
    pub username: Option<String>,
    pub telephone: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,

    // personal info
    pub firstname: String,
    pub patronymic: Option<String>,
    pub surname: String,
    pub other_names: Option<String>,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,

    pub confidentiality: Confidentiality,
    pub is_staff: bool,
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile as shown to another user, with confidential fields blanked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: Option<String>,
    pub telephone: Option<String>,
    pub email: Option<String>,
    pub firstname: String,
    pub patronymic: Option<String>,
    pub surname: Option<String>,
    pub other_names: Option<String>,
    pub gender: Gender,
    pub date_of_birth: Option<NaiveDate>,
    pub is_active: bool,
}

impl User {
    /// Full profile, as seen by staff or the user themselves.
    #[must_use]
    pub fn full_view(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            telephone: Some(self.telephone.clone()),
            email: Some(self.email.clone()),
            firstname: self.firstname.clone(),
            patronymic: self.patronymic.clone(),
            surname: Some(self.surname.clone()),
            other_names: self.other_names.clone(),
            gender: self.gender,
            date_of_birth: Some(self.date_of_birth),
            is_active: self.is_active,
        }
    }

    /// Profile with fields hidden per the confidentiality mask.
    #[must_use]
    pub fn public_view(&self) -> UserProfile {
        let conf = self.confidentiality;
        let mut view = self.full_view();
        if conf.hides(Confidentiality::HIDE_USERNAME) {
            view.username = None;
        }
        if conf.hides(Confidentiality::HIDE_PATRONYMIC) {
            view.patronymic = None;
        }
        if conf.hides(Confidentiality::HIDE_SURNAME) {
            view.surname = None;
        }
        if conf.hides(Confidentiality::HIDE_BIRTHDATE) {
            view.date_of_birth = None;
        }
        if conf.hides(Confidentiality::HIDE_TELEPHONE) {
            view.telephone = None;
        }
        if conf.hides(Confidentiality::HIDE_EMAIL) {
            view.email = None;
        }
        view
    }

    /// View selection for a given viewer. Staff and the user themselves
    /// bypass the confidentiality mask.
    #[must_use]
    pub fn view_for(&self, viewer_id: &UserId, viewer_is_staff: bool) -> UserProfile {
        if viewer_is_staff || viewer_id == &self.id {
            self.full_view()
        } else {
            self.public_view()
        }
    }
}

pub fn validate_username(username: &str) -> crate::error::Result<()> {
    if username.is_empty() || username.len() > 20 {
        return Err(Error::ValidationFailed(
            "Username must be 1-20 characters".to_string(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::ValidationFailed(
            "Username may only contain letters, digits, '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> crate::error::Result<()> {
    let valid = email.len() <= 320
        && email.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty() && !domain.is_empty() && domain.contains('.')
        });
    if valid {
        Ok(())
    } else {
        Err(Error::ValidationFailed("Invalid email address".to_string()))
    }
}

pub fn validate_password(password: &str) -> crate::error::Result<()> {
    if password.len() < 8 || password.len() > 128 {
        return Err(Error::ValidationFailed(
            "Password must be 8-128 characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::user_fixture;

    #[test]
    fn test_default_confidentiality_hides_contact_fields() {
        let conf = Confidentiality::default();
        assert!(conf.hides(Confidentiality::HIDE_PATRONYMIC));
        assert!(conf.hides(Confidentiality::HIDE_TELEPHONE));
        assert!(conf.hides(Confidentiality::HIDE_EMAIL));
        assert!(!conf.hides(Confidentiality::HIDE_USERNAME));
        assert!(!conf.hides(Confidentiality::HIDE_SURNAME));
    }

    #[test]
    fn test_public_view_blanks_hidden_fields() {
        let user = user_fixture("alice");
        let view = user.public_view();
        assert_eq!(view.username.as_deref(), Some("alice"));
        assert_eq!(view.telephone, None);
        assert_eq!(view.email, None);
        assert_eq!(view.patronymic, None);
        assert!(view.surname.is_some());
    }

    #[test]
    fn test_view_for_self_is_unredacted() {
        let user = user_fixture("alice");
        let view = user.view_for(&user.id, false);
        assert_eq!(view.email.as_deref(), Some("alice@example.com"));
        assert!(view.telephone.is_some());
    }

    #[test]
    fn test_view_for_staff_is_unredacted() {
        let user = user_fixture("alice");
        let view = user.view_for(&UserId::new(), true);
        assert_eq!(view, user.full_view());
    }

    #[test]
    fn test_view_for_stranger_is_redacted() {
        let user = user_fixture("alice");
        let view = user.view_for(&UserId::new(), false);
        assert_eq!(view, user.public_view());
    }

    #[test]
    fn test_hide_everything() {
        let mut user = user_fixture("alice");
        user.confidentiality = Confidentiality::ALL;
        let view = user.public_view();
        assert_eq!(view.username, None);
        assert_eq!(view.surname, None);
        assert_eq!(view.date_of_birth, None);
        // firstname is never hidden
        assert_eq!(view.firstname, user.firstname);
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice_01").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("a".repeat(21).as_str()).is_err());
        assert!(validate_username("bad name").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@b.com").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("@b.com").is_err());
        assert!(validate_email("a@nodot").is_err());
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password("short").is_err());
    }
}
