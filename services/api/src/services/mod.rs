mod accounts;
mod bookings;
mod catalog;
mod reviews;
mod stats;

pub use accounts::AccountService;
pub use bookings::BookingService;
pub use catalog::{ExpertiseService, MentorService};
pub use reviews::ReviewService;
pub use stats::{mentee_stats, mentor_stats, StatsService};

use std::sync::Arc;

use tokio::sync::OnceCell;
use uuid::Uuid;

use mentorbook_auth::JwtService;
use mentorbook_common::AppError;
use mentorbook_database::{Booking, Mentor, MentorSync, Review, Store};

use crate::config::AppConfig;
use crate::models::{BookingResponse, MentorSummary, ReviewResponse, UserSummary};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jwt_service: JwtService,
    pub config: AppConfig,
    /// Hash checked for unknown usernames so failed logins cost the same.
    pub login_decoy: Arc<OnceCell<String>>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        Self {
            store,
            jwt_service: JwtService::new(&config.jwt),
            config,
            login_decoy: Arc::new(OnceCell::new()),
        }
    }
}

async fn user_summary(store: &dyn Store, user_id: Uuid) -> Result<UserSummary, AppError> {
    store
        .find_user(user_id)
        .await?
        .map(|user| UserSummary::from(&user))
        .ok_or_else(|| AppError::Internal(format!("user {} is missing", user_id)))
}

async fn mentor_summary(store: &dyn Store, mentor: &Mentor) -> Result<MentorSummary, AppError> {
    Ok(MentorSummary {
        mentor_id: mentor.mentor_id,
        user: user_summary(store, mentor.user_id).await?,
        experience_level: mentor.experience_level,
        hourly_rate: mentor.hourly_rate,
        is_verified: mentor.is_verified,
        rating: mentor.rating,
        total_sessions: mentor.total_sessions,
    })
}

async fn booking_response(store: &dyn Store, booking: Booking) -> Result<BookingResponse, AppError> {
    let mentor = store
        .find_mentor(booking.mentor_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("mentor {} is missing", booking.mentor_id)))?;

    Ok(BookingResponse {
        booking_id: booking.booking_id,
        mentee: user_summary(store, booking.mentee_id).await?,
        mentor: mentor_summary(store, &mentor).await?,
        session_type: booking.session_type,
        session_date: booking.session_date,
        session_time: booking.session_time,
        duration_minutes: booking.duration_minutes,
        status: booking.status,
        topic: booking.topic,
        description: booking.description,
        meeting_link: booking.meeting_link,
        notes: booking.notes,
        total_amount: booking.total_amount,
        is_paid: booking.is_paid,
        created_at: booking.created_at,
        updated_at: booking.updated_at,
    })
}

async fn review_response(store: &dyn Store, review: Review) -> Result<ReviewResponse, AppError> {
    Ok(ReviewResponse {
        review_id: review.review_id,
        mentee: user_summary(store, review.mentee_id).await?,
        mentor_id: review.mentor_id,
        booking_id: review.booking_id,
        rating: review.rating,
        title: review.title,
        comment: review.comment,
        is_public: review.is_public,
        created_at: review.created_at,
        updated_at: review.updated_at,
    })
}

fn log_mentor_sync(username: &str, sync: MentorSync) {
    match sync {
        MentorSync::Unchanged => {}
        MentorSync::Created => tracing::info!("Mentor record created for {}", username),
        MentorSync::Removed { bookings, reviews } => tracing::warn!(
            "Mentor record removed for {} ({} bookings and {} reviews deleted)",
            username,
            bookings,
            reviews
        ),
    }
}
