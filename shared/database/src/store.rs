//! Storage port shared by the HTTP service and the operator tooling.
//!
//! Every method is one logical write or read. Writes that touch several rows
//! (account creation, profile save with mentor reconcile, cascades) are atomic
//! inside the implementation.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use mentorbook_common::{AppError, BookingStatus, SessionType, UserRole};

use crate::models::*;

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone)]
pub struct NewExpertise {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub mentee_id: Uuid,
    pub mentor_id: Uuid,
    pub session_type: SessionType,
    pub session_date: NaiveDate,
    pub session_time: NaiveTime,
    pub duration_minutes: i32,
    pub topic: String,
    pub description: Option<String>,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub mentee_id: Uuid,
    pub mentor_id: Uuid,
    pub booking_id: Uuid,
    pub rating: i32,
    pub title: Option<String>,
    pub comment: String,
    pub is_public: bool,
}

/// Which bookings a caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingScope {
    All,
    Mentor(Uuid),
    Mentee(Uuid),
    Nothing,
}

impl BookingScope {
    pub fn admits(&self, booking: &Booking) -> bool {
        match self {
            BookingScope::All => true,
            BookingScope::Mentor(mentor_id) => booking.mentor_id == *mentor_id,
            BookingScope::Mentee(user_id) => booking.mentee_id == *user_id,
            BookingScope::Nothing => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewFilter {
    pub author: Option<Uuid>,
    pub mentor: Option<Uuid>,
    pub public_only: bool,
}

impl ReviewFilter {
    pub fn admits(&self, review: &Review) -> bool {
        self.author.map_or(true, |id| review.mentee_id == id)
            && self.mentor.map_or(true, |id| review.mentor_id == id)
            && (!self.public_only || review.is_public)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    // Accounts

    /// Creates the identity and its profile, then reconciles the mentor
    /// record for the requested role. Nothing is persisted on failure.
    async fn create_account(&self, account: NewAccount) -> Result<(Account, MentorSync), AppError>;

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn list_users(&self) -> Result<Vec<User>, AppError>;

    async fn find_profile(&self, profile_id: Uuid) -> Result<Option<Profile>, AppError>;

    async fn find_profile_by_user(&self, user_id: Uuid) -> Result<Option<Profile>, AppError>;

    async fn list_profiles(&self) -> Result<Vec<Profile>, AppError>;

    /// Writes the mutable user and profile columns and reconciles the mentor
    /// record against the saved role in the same transaction.
    async fn save_account(&self, user: &User, profile: &Profile) -> Result<(Account, MentorSync), AppError>;

    /// Applies the mentor reconcile to every stored profile.
    async fn reconcile_all_mentors(&self) -> Result<ReconcileReport, AppError>;

    // Expertise

    async fn list_expertise(&self) -> Result<Vec<Expertise>, AppError>;

    async fn find_expertise(&self, expertise_id: Uuid) -> Result<Option<Expertise>, AppError>;

    async fn find_expertise_by_name(&self, name: &str) -> Result<Option<Expertise>, AppError>;

    async fn create_expertise(&self, expertise: NewExpertise) -> Result<Expertise, AppError>;

    async fn save_expertise(&self, expertise: &Expertise) -> Result<Expertise, AppError>;

    async fn delete_expertise(&self, expertise_id: Uuid) -> Result<bool, AppError>;

    // Mentors

    async fn list_mentors(&self) -> Result<Vec<Mentor>, AppError>;

    async fn find_mentor(&self, mentor_id: Uuid) -> Result<Option<Mentor>, AppError>;

    async fn find_mentor_by_user(&self, user_id: Uuid) -> Result<Option<Mentor>, AppError>;

    /// Sets the owner's role to mentor and inserts `mentor` with its
    /// expertise set in one transaction. Fails without writing anything when
    /// the owner already has a mentor record or an expertise id is unknown.
    async fn become_mentor(&self, mentor: &Mentor) -> Result<Mentor, AppError>;

    /// Writes the editable mentor columns and replaces its expertise set.
    async fn save_mentor(&self, mentor: &Mentor) -> Result<Mentor, AppError>;

    async fn record_completed_session(&self, mentor_id: Uuid) -> Result<(), AppError>;

    /// Recomputes the mentor's aggregate rating from its reviews.
    async fn refresh_mentor_rating(&self, mentor_id: Uuid) -> Result<(), AppError>;

    // Bookings

    async fn list_bookings(
        &self,
        scope: BookingScope,
        statuses: Option<&[BookingStatus]>,
    ) -> Result<Vec<Booking>, AppError>;

    async fn find_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, AppError>;

    async fn create_booking(&self, booking: NewBooking) -> Result<Booking, AppError>;

    /// Writes the editable booking columns. Status, total and payment flag
    /// are left untouched.
    async fn save_booking(&self, booking: &Booking) -> Result<Booking, AppError>;

    async fn delete_booking(&self, booking_id: Uuid) -> Result<bool, AppError>;

    /// Moves the booking to `to` only if its current status is one of
    /// `from`. Returns `None` when the booking is missing or its status no
    /// longer matches.
    async fn transition_booking(
        &self,
        booking_id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<Option<Booking>, AppError>;

    // Reviews

    async fn list_reviews(&self, filter: ReviewFilter) -> Result<Vec<Review>, AppError>;

    async fn find_review(&self, review_id: Uuid) -> Result<Option<Review>, AppError>;

    async fn create_review(&self, review: NewReview) -> Result<Review, AppError>;

    async fn save_review(&self, review: &Review) -> Result<Review, AppError>;

    async fn delete_review(&self, review_id: Uuid) -> Result<bool, AppError>;
}
