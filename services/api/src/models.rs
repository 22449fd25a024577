use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use mentorbook_common::{fits_money_column, BookingStatus, ExperienceLevel, SessionType, UserRole};
use mentorbook_database::{Expertise, User};

fn url_or_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || url::Url::parse(value).is_ok() {
        Ok(())
    } else {
        Err(ValidationError::new("url"))
    }
}

/// Rates are stored as `NUMERIC(10, 2)`.
fn money_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_zero() || fits_money_column(*value) {
        Ok(())
    } else {
        Err(ValidationError::new("range"))
    }
}

/// Applies a partial-update text field: absent leaves `target` alone, blank
/// clears it.
pub fn apply_text(target: &mut Option<String>, update: Option<String>) {
    if let Some(value) = update {
        *target = if value.trim().is_empty() { None } else { Some(value) };
    }
}

/// Normalizes an optional text field on create.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// Accounts and tokens

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 150))]
    pub username: String,

    #[serde(default)]
    #[validate(email)]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1, max = 128))]
    pub password: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,

    pub role: Option<UserRole>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserSummary,
    pub role: UserRole,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TokenRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub username: String,

    #[serde(default)]
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RefreshRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub refresh: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct VerifyRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_joined: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            date_joined: user.created_at,
        }
    }
}

// Profiles

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub profile_id: Uuid,
    pub user: UserSummary,
    pub role: UserRole,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `PUT`/`PATCH /profiles/{id}`. Absent fields are left unchanged.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 150))]
    pub first_name: Option<String>,

    #[validate(length(max = 150))]
    pub last_name: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    pub role: Option<UserRole>,

    #[validate(length(max = 15))]
    pub phone_number: Option<String>,

    pub bio: Option<String>,

    pub date_of_birth: Option<NaiveDate>,

    #[validate(length(max = 100))]
    pub location: Option<String>,

    #[validate(length(max = 200), custom = "url_or_blank")]
    pub website: Option<String>,

    #[validate(length(max = 200), custom = "url_or_blank")]
    pub linkedin: Option<String>,

    #[validate(length(max = 200), custom = "url_or_blank")]
    pub github: Option<String>,
}

// Expertise

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateExpertiseRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateExpertiseRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    pub description: Option<String>,
}

// Mentors

/// Body of mentor create and update. `is_verified`, `total_sessions` and
/// `rating` are not accepted from clients.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct MentorRequest {
    pub expertise_ids: Option<Vec<Uuid>>,

    #[validate(range(min = 0))]
    pub experience_years: Option<i32>,

    pub experience_level: Option<ExperienceLevel>,

    #[validate(length(max = 100))]
    pub company: Option<String>,

    #[validate(length(max = 100))]
    pub position: Option<String>,

    #[validate(custom = "money_amount")]
    pub hourly_rate: Option<Decimal>,

    pub availability: Option<String>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MentorResponse {
    pub mentor_id: Uuid,
    pub user: UserSummary,
    pub expertise: Vec<Expertise>,
    pub experience_years: i32,
    pub experience_level: ExperienceLevel,
    pub company: Option<String>,
    pub position: Option<String>,
    pub hourly_rate: Decimal,
    pub availability: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub total_sessions: i32,
    pub rating: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorSummary {
    pub mentor_id: Uuid,
    pub user: UserSummary,
    pub experience_level: ExperienceLevel,
    pub hourly_rate: Decimal,
    pub is_verified: bool,
    pub rating: Decimal,
    pub total_sessions: i32,
}

// Bookings

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateBookingRequest {
    #[validate(required)]
    pub mentor: Option<Uuid>,

    pub session_type: Option<SessionType>,

    #[validate(required)]
    pub session_date: Option<NaiveDate>,

    #[validate(required)]
    pub session_time: Option<NaiveTime>,

    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: Option<i32>,

    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub topic: String,

    pub description: Option<String>,

    #[validate(length(max = 200), custom = "url_or_blank")]
    pub meeting_link: Option<String>,

    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateBookingRequest {
    pub session_type: Option<SessionType>,

    pub session_date: Option<NaiveDate>,

    pub session_time: Option<NaiveTime>,

    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: Option<i32>,

    #[validate(length(min = 1, max = 200))]
    pub topic: Option<String>,

    pub description: Option<String>,

    #[validate(length(max = 200), custom = "url_or_blank")]
    pub meeting_link: Option<String>,

    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingResponse {
    pub booking_id: Uuid,
    pub mentee: UserSummary,
    pub mentor: MentorSummary,
    pub session_type: SessionType,
    pub session_date: NaiveDate,
    pub session_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: BookingStatus,
    pub topic: String,
    pub description: Option<String>,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
    pub total_amount: Decimal,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Reviews

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(required)]
    pub booking: Option<Uuid>,

    pub mentor: Option<Uuid>,

    #[validate(required, range(min = 1, max = 5))]
    pub rating: Option<i32>,

    #[validate(length(max = 200))]
    pub title: Option<String>,

    #[serde(default)]
    #[validate(length(min = 1))]
    pub comment: String,

    pub is_public: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i32>,

    #[validate(length(max = 200))]
    pub title: Option<String>,

    #[validate(length(min = 1))]
    pub comment: Option<String>,

    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    pub mentor: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub review_id: Uuid,
    pub mentee: UserSummary,
    pub mentor_id: Uuid,
    pub booking_id: Uuid,
    pub rating: i32,
    pub title: Option<String>,
    pub comment: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Statistics

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentorStats {
    pub total_sessions: u64,
    pub upcoming_sessions: u64,
    pub total_earnings: Decimal,
    pub average_rating: Decimal,
    pub total_reviews: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenteeStats {
    pub total_sessions: u64,
    pub upcoming_sessions: u64,
    pub total_hours: Decimal,
    pub unique_mentors: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserStats {
    Mentor(MentorStats),
    Mentee(MenteeStats),
}
