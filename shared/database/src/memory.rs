//! In-process store used by tests and by `STORAGE_BACKEND=memory`.
//!
//! Mirrors the constraints of the Postgres schema: unique usernames, emails,
//! expertise names and one review per booking, plus the cascades from mentor
//! and booking deletion.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use tokio::sync::RwLock;
use uuid::Uuid;

use mentorbook_common::{AppError, BookingStatus, UserRole};

use crate::models::*;
use crate::store::*;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, Profile>,
    expertise: HashMap<Uuid, Expertise>,
    mentors: HashMap<Uuid, Mentor>,
    bookings: HashMap<Uuid, Booking>,
    reviews: HashMap<Uuid, Review>,
}

impl Tables {
    fn check_user_unique(&self, user_id: Uuid, username: &str, email: &str) -> Result<(), AppError> {
        if self
            .users
            .values()
            .any(|u| u.user_id != user_id && u.username == username)
        {
            return Err(AppError::invalid_field(
                "username",
                "unique",
                "A user with that username already exists.",
            ));
        }
        if self
            .users
            .values()
            .any(|u| u.user_id != user_id && u.email == email)
        {
            return Err(AppError::invalid_field(
                "email",
                "unique",
                "A user with that email already exists.",
            ));
        }
        Ok(())
    }

    fn check_expertise_unique(&self, expertise_id: Uuid, name: &str) -> Result<(), AppError> {
        if self
            .expertise
            .values()
            .any(|e| e.expertise_id != expertise_id && e.name == name)
        {
            return Err(AppError::invalid_field(
                "name",
                "unique",
                "Expertise with this name already exists.",
            ));
        }
        Ok(())
    }

    fn check_expertise_ids(&self, ids: &[Uuid]) -> Result<(), AppError> {
        match ids.iter().find(|id| !self.expertise.contains_key(*id)) {
            Some(unknown) => Err(AppError::invalid_field(
                "expertise_ids",
                "does_not_exist",
                format!("Unknown expertise {}.", unknown),
            )),
            None => Ok(()),
        }
    }

    fn remove_booking(&mut self, booking_id: Uuid) -> bool {
        if self.bookings.remove(&booking_id).is_none() {
            return false;
        }
        self.reviews.retain(|_, r| r.booking_id != booking_id);
        true
    }

    fn remove_mentor(&mut self, mentor_id: Uuid) -> MentorSync {
        if self.mentors.remove(&mentor_id).is_none() {
            return MentorSync::Unchanged;
        }

        let booking_ids: Vec<Uuid> = self
            .bookings
            .values()
            .filter(|b| b.mentor_id == mentor_id)
            .map(|b| b.booking_id)
            .collect();
        let reviews_before = self.reviews.len();
        self.reviews
            .retain(|_, r| r.mentor_id != mentor_id && !booking_ids.contains(&r.booking_id));
        let reviews = (reviews_before - self.reviews.len()) as u64;

        for booking_id in &booking_ids {
            self.bookings.remove(booking_id);
        }

        MentorSync::Removed {
            bookings: booking_ids.len() as u64,
            reviews,
        }
    }

    /// Makes the mentor record agree with `role` for `user_id`.
    fn reconcile_mentor(&mut self, user_id: Uuid, role: UserRole) -> MentorSync {
        let existing = self
            .mentors
            .values()
            .find(|m| m.user_id == user_id)
            .map(|m| m.mentor_id);

        match (role, existing) {
            (UserRole::Mentor, Some(_)) => MentorSync::Unchanged,
            (UserRole::Mentor, None) => {
                let mentor = Mentor::provisioned_for(user_id);
                self.mentors.insert(mentor.mentor_id, mentor);
                MentorSync::Created
            }
            (_, Some(mentor_id)) => self.remove_mentor(mentor_id),
            (_, None) => MentorSync::Unchanged,
        }
    }
}

fn rating_of(reviews: &[i32]) -> Decimal {
    if reviews.is_empty() {
        return Decimal::new(0, 2);
    }
    let sum: i64 = reviews.iter().map(|&r| r as i64).sum();
    let mut mean = (Decimal::from(sum) / Decimal::from(reviews.len() as i64))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    mean.rescale(2);
    mean
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_account(&self, account: NewAccount) -> Result<(Account, MentorSync), AppError> {
        let mut tables = self.tables.write().await;
        let user_id = Uuid::new_v4();
        tables.check_user_unique(user_id, &account.username, &account.email)?;

        let now = Utc::now();
        let user = User {
            user_id,
            username: account.username,
            email: account.email,
            hashed_password: account.hashed_password,
            first_name: account.first_name,
            last_name: account.last_name,
            created_at: now,
            updated_at: now,
        };
        let profile = Profile {
            profile_id: Uuid::new_v4(),
            user_id,
            role: account.role,
            phone_number: None,
            bio: None,
            date_of_birth: None,
            location: None,
            website: None,
            linkedin: None,
            github: None,
            created_at: now,
            updated_at: now,
        };

        tables.users.insert(user_id, user.clone());
        tables.profiles.insert(profile.profile_id, profile.clone());
        let sync = tables.reconcile_mentor(user_id, profile.role);

        Ok((Account { user, profile }, sync))
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn find_profile(&self, profile_id: Uuid) -> Result<Option<Profile>, AppError> {
        Ok(self.tables.read().await.profiles.get(&profile_id).cloned())
    }

    async fn find_profile_by_user(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.profiles.values().find(|p| p.user_id == user_id).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, AppError> {
        let tables = self.tables.read().await;
        let mut profiles: Vec<Profile> = tables.profiles.values().cloned().collect();
        profiles.sort_by_key(|p| p.created_at);
        Ok(profiles)
    }

    async fn save_account(&self, user: &User, profile: &Profile) -> Result<(Account, MentorSync), AppError> {
        let mut tables = self.tables.write().await;
        tables.check_user_unique(user.user_id, &user.username, &user.email)?;

        let now = Utc::now();
        let saved_user = {
            let stored = tables
                .users
                .get_mut(&user.user_id)
                .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
            stored.username = user.username.clone();
            stored.email = user.email.clone();
            stored.first_name = user.first_name.clone();
            stored.last_name = user.last_name.clone();
            stored.updated_at = now;
            stored.clone()
        };

        let saved_profile = {
            let stored = tables
                .profiles
                .values_mut()
                .find(|p| p.user_id == user.user_id)
                .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
            stored.role = profile.role;
            stored.phone_number = profile.phone_number.clone();
            stored.bio = profile.bio.clone();
            stored.date_of_birth = profile.date_of_birth;
            stored.location = profile.location.clone();
            stored.website = profile.website.clone();
            stored.linkedin = profile.linkedin.clone();
            stored.github = profile.github.clone();
            stored.updated_at = now;
            stored.clone()
        };

        let sync = tables.reconcile_mentor(saved_user.user_id, saved_profile.role);

        Ok((
            Account {
                user: saved_user,
                profile: saved_profile,
            },
            sync,
        ))
    }

    async fn reconcile_all_mentors(&self) -> Result<ReconcileReport, AppError> {
        let mut tables = self.tables.write().await;
        let roles: Vec<(Uuid, UserRole)> = tables
            .profiles
            .values()
            .map(|p| (p.user_id, p.role))
            .collect();

        let mut report = ReconcileReport::default();
        for (user_id, role) in roles {
            match tables.reconcile_mentor(user_id, role) {
                MentorSync::Created => report.created += 1,
                MentorSync::Removed { .. } => report.removed += 1,
                MentorSync::Unchanged => {}
            }
        }

        // Mentor rows whose owner has no profile at all.
        let orphans: Vec<Uuid> = tables
            .mentors
            .values()
            .filter(|m| !tables.profiles.values().any(|p| p.user_id == m.user_id))
            .map(|m| m.mentor_id)
            .collect();
        for mentor_id in orphans {
            tables.remove_mentor(mentor_id);
            report.removed += 1;
        }

        Ok(report)
    }

    async fn list_expertise(&self) -> Result<Vec<Expertise>, AppError> {
        let tables = self.tables.read().await;
        let mut expertise: Vec<Expertise> = tables.expertise.values().cloned().collect();
        expertise.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(expertise)
    }

    async fn find_expertise(&self, expertise_id: Uuid) -> Result<Option<Expertise>, AppError> {
        Ok(self.tables.read().await.expertise.get(&expertise_id).cloned())
    }

    async fn find_expertise_by_name(&self, name: &str) -> Result<Option<Expertise>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.expertise.values().find(|e| e.name == name).cloned())
    }

    async fn create_expertise(&self, expertise: NewExpertise) -> Result<Expertise, AppError> {
        let mut tables = self.tables.write().await;
        let expertise_id = Uuid::new_v4();
        tables.check_expertise_unique(expertise_id, &expertise.name)?;

        let created = Expertise {
            expertise_id,
            name: expertise.name,
            description: expertise.description,
        };
        tables.expertise.insert(expertise_id, created.clone());
        Ok(created)
    }

    async fn save_expertise(&self, expertise: &Expertise) -> Result<Expertise, AppError> {
        let mut tables = self.tables.write().await;
        tables.check_expertise_unique(expertise.expertise_id, &expertise.name)?;

        let stored = tables
            .expertise
            .get_mut(&expertise.expertise_id)
            .ok_or_else(|| AppError::NotFound("Expertise not found".to_string()))?;
        *stored = expertise.clone();
        Ok(stored.clone())
    }

    async fn delete_expertise(&self, expertise_id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.expertise.remove(&expertise_id).is_none() {
            return Ok(false);
        }
        for mentor in tables.mentors.values_mut() {
            mentor.expertise_ids.retain(|id| *id != expertise_id);
        }
        Ok(true)
    }

    async fn list_mentors(&self) -> Result<Vec<Mentor>, AppError> {
        let tables = self.tables.read().await;
        let mut mentors: Vec<Mentor> = tables.mentors.values().cloned().collect();
        mentors.sort_by_key(|m| m.created_at);
        Ok(mentors)
    }

    async fn find_mentor(&self, mentor_id: Uuid) -> Result<Option<Mentor>, AppError> {
        Ok(self.tables.read().await.mentors.get(&mentor_id).cloned())
    }

    async fn find_mentor_by_user(&self, user_id: Uuid) -> Result<Option<Mentor>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.mentors.values().find(|m| m.user_id == user_id).cloned())
    }

    async fn become_mentor(&self, mentor: &Mentor) -> Result<Mentor, AppError> {
        let mut tables = self.tables.write().await;
        tables.check_expertise_ids(&mentor.expertise_ids)?;
        if tables.mentors.values().any(|m| m.user_id == mentor.user_id) {
            return Err(AppError::invalid_field(
                "user",
                "unique",
                "You already have a mentor profile",
            ));
        }

        let now = Utc::now();
        let profile = tables
            .profiles
            .values_mut()
            .find(|p| p.user_id == mentor.user_id)
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
        profile.role = UserRole::Mentor;
        profile.updated_at = now;

        let mut created = mentor.clone();
        created.expertise_ids.sort();
        created.expertise_ids.dedup();
        created.created_at = now;
        created.updated_at = now;
        tables.mentors.insert(created.mentor_id, created.clone());
        Ok(created)
    }

    async fn save_mentor(&self, mentor: &Mentor) -> Result<Mentor, AppError> {
        let mut tables = self.tables.write().await;
        tables.check_expertise_ids(&mentor.expertise_ids)?;

        let stored = tables
            .mentors
            .get_mut(&mentor.mentor_id)
            .ok_or_else(|| AppError::NotFound("Mentor not found".to_string()))?;

        let mut expertise_ids = mentor.expertise_ids.clone();
        expertise_ids.sort();
        expertise_ids.dedup();

        stored.expertise_ids = expertise_ids;
        stored.experience_years = mentor.experience_years;
        stored.experience_level = mentor.experience_level;
        stored.company = mentor.company.clone();
        stored.position = mentor.position.clone();
        stored.hourly_rate = mentor.hourly_rate;
        stored.availability = mentor.availability.clone();
        stored.is_active = mentor.is_active;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn record_completed_session(&self, mentor_id: Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if let Some(mentor) = tables.mentors.get_mut(&mentor_id) {
            mentor.total_sessions += 1;
            mentor.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn refresh_mentor_rating(&self, mentor_id: Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let ratings: Vec<i32> = tables
            .reviews
            .values()
            .filter(|r| r.mentor_id == mentor_id)
            .map(|r| r.rating)
            .collect();
        if let Some(mentor) = tables.mentors.get_mut(&mentor_id) {
            mentor.rating = rating_of(&ratings);
            mentor.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_bookings(
        &self,
        scope: BookingScope,
        statuses: Option<&[BookingStatus]>,
    ) -> Result<Vec<Booking>, AppError> {
        let tables = self.tables.read().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| scope.admits(b))
            .filter(|b| statuses.map_or(true, |s| s.contains(&b.status)))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| {
            (b.session_date, b.session_time, b.created_at).cmp(&(a.session_date, a.session_time, a.created_at))
        });
        Ok(bookings)
    }

    async fn find_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, AppError> {
        Ok(self.tables.read().await.bookings.get(&booking_id).cloned())
    }

    async fn create_booking(&self, booking: NewBooking) -> Result<Booking, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.mentors.contains_key(&booking.mentor_id) {
            return Err(AppError::invalid_field("mentor", "does_not_exist", "Mentor does not exist."));
        }

        let now = Utc::now();
        let created = Booking {
            booking_id: Uuid::new_v4(),
            mentee_id: booking.mentee_id,
            mentor_id: booking.mentor_id,
            session_type: booking.session_type,
            session_date: booking.session_date,
            session_time: booking.session_time,
            duration_minutes: booking.duration_minutes,
            status: BookingStatus::Pending,
            topic: booking.topic,
            description: booking.description,
            meeting_link: booking.meeting_link,
            notes: booking.notes,
            total_amount: booking.total_amount,
            is_paid: false,
            created_at: now,
            updated_at: now,
        };
        tables.bookings.insert(created.booking_id, created.clone());
        Ok(created)
    }

    async fn save_booking(&self, booking: &Booking) -> Result<Booking, AppError> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .bookings
            .get_mut(&booking.booking_id)
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        stored.session_type = booking.session_type;
        stored.session_date = booking.session_date;
        stored.session_time = booking.session_time;
        stored.duration_minutes = booking.duration_minutes;
        stored.topic = booking.topic.clone();
        stored.description = booking.description.clone();
        stored.meeting_link = booking.meeting_link.clone();
        stored.notes = booking.notes.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_booking(&self, booking_id: Uuid) -> Result<bool, AppError> {
        Ok(self.tables.write().await.remove_booking(booking_id))
    }

    async fn transition_booking(
        &self,
        booking_id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<Option<Booking>, AppError> {
        let mut tables = self.tables.write().await;
        match tables.bookings.get_mut(&booking_id) {
            Some(booking) if from.contains(&booking.status) => {
                booking.status = to;
                booking.updated_at = Utc::now();
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_reviews(&self, filter: ReviewFilter) -> Result<Vec<Review>, AppError> {
        let tables = self.tables.read().await;
        let mut reviews: Vec<Review> = tables
            .reviews
            .values()
            .filter(|r| filter.admits(r))
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn find_review(&self, review_id: Uuid) -> Result<Option<Review>, AppError> {
        Ok(self.tables.read().await.reviews.get(&review_id).cloned())
    }

    async fn create_review(&self, review: NewReview) -> Result<Review, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.bookings.contains_key(&review.booking_id) {
            return Err(AppError::invalid_field("booking", "does_not_exist", "Booking does not exist."));
        }
        if tables.reviews.values().any(|r| r.booking_id == review.booking_id) {
            return Err(AppError::invalid_field(
                "booking",
                "unique",
                "This booking has already been reviewed.",
            ));
        }

        let now = Utc::now();
        let created = Review {
            review_id: Uuid::new_v4(),
            mentee_id: review.mentee_id,
            mentor_id: review.mentor_id,
            booking_id: review.booking_id,
            rating: review.rating,
            title: review.title,
            comment: review.comment,
            is_public: review.is_public,
            created_at: now,
            updated_at: now,
        };
        tables.reviews.insert(created.review_id, created.clone());
        Ok(created)
    }

    async fn save_review(&self, review: &Review) -> Result<Review, AppError> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .reviews
            .get_mut(&review.review_id)
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        stored.rating = review.rating;
        stored.title = review.title.clone();
        stored.comment = review.comment.clone();
        stored.is_public = review.is_public;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_review(&self, review_id: Uuid) -> Result<bool, AppError> {
        Ok(self.tables.write().await.reviews.remove(&review_id).is_some())
    }
}
