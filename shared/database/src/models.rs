use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use mentorbook_common::*;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub profile_id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
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

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Expertise {
    pub expertise_id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Mentor {
    pub mentor_id: Uuid,
    pub user_id: Uuid,
    pub expertise_ids: Vec<Uuid>,
    pub experience_years: i32,
    #[sqlx(try_from = "String")]
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

impl Mentor {
    pub const DEFAULT_HOURLY_RATE: Decimal = Decimal::from_parts(5000, 0, 0, false, 2);
    pub const DEFAULT_AVAILABILITY: &'static str = "Flexible";

    /// The record provisioned when a profile switches to the mentor role.
    pub fn provisioned_for(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            mentor_id: Uuid::new_v4(),
            user_id,
            expertise_ids: Vec::new(),
            experience_years: 0,
            experience_level: ExperienceLevel::Junior,
            company: None,
            position: None,
            hourly_rate: Self::DEFAULT_HOURLY_RATE,
            availability: Self::DEFAULT_AVAILABILITY.to_string(),
            is_verified: false,
            is_active: true,
            total_sessions: 0,
            rating: Decimal::new(0, 2),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub booking_id: Uuid,
    pub mentee_id: Uuid,
    pub mentor_id: Uuid,
    #[sqlx(try_from = "String")]
    pub session_type: SessionType,
    pub session_date: NaiveDate,
    pub session_time: NaiveTime,
    pub duration_minutes: i32,
    #[sqlx(try_from = "String")]
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

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub review_id: Uuid,
    pub mentee_id: Uuid,
    pub mentor_id: Uuid,
    pub booking_id: Uuid,
    pub rating: i32,
    pub title: Option<String>,
    pub comment: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An identity together with its 1:1 profile.
#[derive(Debug, Clone)]
pub struct Account {
    pub user: User,
    pub profile: Profile,
}

/// What the mentor reconcile step did while a profile was saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentorSync {
    Unchanged,
    Created,
    Removed { bookings: u64, reviews: u64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: u64,
    pub removed: u64,
}
