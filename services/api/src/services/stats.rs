use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};

use mentorbook_common::{AppError, BookingStatus, UserRole};
use mentorbook_database::{Booking, BookingScope, Review, ReviewFilter, Store};

use crate::middleware::CurrentUser;
use crate::models::{MenteeStats, MentorStats, UserStats};

use super::AppState;

fn round_to(value: Decimal, dp: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(dp);
    rounded
}

fn count_with(bookings: &[Booking], status: BookingStatus) -> u64 {
    bookings.iter().filter(|b| b.status == status).count() as u64
}

/// Totals for a mentor over the bookings made with them and the reviews they
/// received. `total_sessions` counts every booking whatever its status;
/// earnings use the stored total of completed ones.
pub fn mentor_stats(bookings: &[Booking], reviews: &[Review]) -> MentorStats {
    let total_earnings = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Completed)
        .map(|b| b.total_amount)
        .sum::<Decimal>();

    let average_rating = if reviews.is_empty() {
        Decimal::ZERO
    } else {
        let sum: i64 = reviews.iter().map(|r| r.rating as i64).sum();
        Decimal::from(sum) / Decimal::from(reviews.len() as i64)
    };

    MentorStats {
        total_sessions: bookings.len() as u64,
        upcoming_sessions: count_with(bookings, BookingStatus::Confirmed),
        total_earnings: round_to(total_earnings, 2),
        average_rating: round_to(average_rating, 1),
        total_reviews: reviews.len() as u64,
    }
}

/// Totals for a mentee over the bookings they made.
pub fn mentee_stats(bookings: &[Booking]) -> MenteeStats {
    let completed_minutes: i64 = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Completed)
        .map(|b| b.duration_minutes as i64)
        .sum();
    let unique_mentors = bookings.iter().map(|b| b.mentor_id).collect::<HashSet<_>>().len();

    MenteeStats {
        total_sessions: bookings.len() as u64,
        upcoming_sessions: count_with(bookings, BookingStatus::Confirmed),
        total_hours: round_to(Decimal::from(completed_minutes) / Decimal::from(60), 1),
        unique_mentors: unique_mentors as u64,
    }
}

pub struct StatsService {
    store: Arc<dyn Store>,
}

impl StatsService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn for_user(&self, caller: &CurrentUser) -> Result<UserStats, AppError> {
        if caller.role == UserRole::Mentor {
            if let Some(mentor) = self.store.find_mentor_by_user(caller.user_id).await? {
                let bookings = self
                    .store
                    .list_bookings(BookingScope::Mentor(mentor.mentor_id), None)
                    .await?;
                let reviews = self
                    .store
                    .list_reviews(ReviewFilter {
                        mentor: Some(mentor.mentor_id),
                        ..Default::default()
                    })
                    .await?;
                return Ok(UserStats::Mentor(mentor_stats(&bookings, &reviews)));
            }
        }

        let bookings = self
            .store
            .list_bookings(BookingScope::Mentee(caller.user_id), None)
            .await?;
        Ok(UserStats::Mentee(mentee_stats(&bookings)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use mentorbook_common::SessionType;
    use uuid::Uuid;

    fn booking(mentor_id: Uuid, status: BookingStatus, minutes: i32, amount: Decimal) -> Booking {
        let now = Utc::now();
        Booking {
            booking_id: Uuid::new_v4(),
            mentee_id: Uuid::new_v4(),
            mentor_id,
            session_type: SessionType::VideoCall,
            session_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            session_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            duration_minutes: minutes,
            status,
            topic: "Topic".into(),
            description: None,
            meeting_link: None,
            notes: None,
            total_amount: amount,
            is_paid: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn review(rating: i32) -> Review {
        let now = Utc::now();
        Review {
            review_id: Uuid::new_v4(),
            mentee_id: Uuid::new_v4(),
            mentor_id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            rating,
            title: None,
            comment: "ok".into(),
            is_public: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn mentor_earnings_use_stored_totals() {
        let mentor = Uuid::new_v4();
        let bookings = vec![
            booking(mentor, BookingStatus::Completed, 90, Decimal::new(9000, 2)),
            booking(mentor, BookingStatus::Completed, 30, Decimal::new(2550, 2)),
            booking(mentor, BookingStatus::Confirmed, 60, Decimal::new(6000, 2)),
            booking(mentor, BookingStatus::Cancelled, 60, Decimal::new(6000, 2)),
        ];
        let reviews = vec![review(5), review(4), review(4)];

        let stats = mentor_stats(&bookings, &reviews);
        assert_eq!(stats.total_sessions, 4);
        assert_eq!(stats.upcoming_sessions, 1);
        assert_eq!(stats.total_earnings.to_string(), "115.50");
        assert_eq!(stats.average_rating.to_string(), "4.3");
        assert_eq!(stats.total_reviews, 3);
    }

    #[test]
    fn mentor_without_reviews_rates_zero() {
        let stats = mentor_stats(&[], &[]);
        assert_eq!(stats.average_rating.to_string(), "0.0");
        assert_eq!(stats.total_earnings.to_string(), "0.00");
    }

    #[test]
    fn mentee_hours_and_unique_mentors() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let bookings = vec![
            booking(first, BookingStatus::Completed, 90, Decimal::ZERO),
            booking(first, BookingStatus::Completed, 45, Decimal::ZERO),
            booking(second, BookingStatus::Confirmed, 60, Decimal::ZERO),
            booking(second, BookingStatus::Pending, 60, Decimal::ZERO),
        ];

        let stats = mentee_stats(&bookings);
        assert_eq!(stats.total_sessions, 4);
        assert_eq!(stats.upcoming_sessions, 1);
        assert_eq!(stats.total_hours.to_string(), "2.3");
        assert_eq!(stats.unique_mentors, 2);
    }
}
