use std::sync::Arc;

use uuid::Uuid;

use mentorbook_common::{session_total, AppError, BookingAction, BookingStatus, UserRole};
use mentorbook_database::{Booking, BookingScope, NewBooking, Store};

use crate::middleware::CurrentUser;
use crate::models::*;

use super::{booking_response, AppState};

pub struct BookingService {
    store: Arc<dyn Store>,
}

impl BookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    /// Admins see every booking, mentors the ones booked with them and
    /// everyone else the ones they booked.
    pub async fn scope_for(&self, caller: &CurrentUser) -> Result<BookingScope, AppError> {
        Ok(match caller.role {
            UserRole::Admin => BookingScope::All,
            UserRole::Mentor => match self.store.find_mentor_by_user(caller.user_id).await? {
                Some(mentor) => BookingScope::Mentor(mentor.mentor_id),
                None => BookingScope::Nothing,
            },
            UserRole::Mentee => BookingScope::Mentee(caller.user_id),
        })
    }

    pub async fn list(
        &self,
        caller: &CurrentUser,
        statuses: Option<&[BookingStatus]>,
    ) -> Result<Vec<BookingResponse>, AppError> {
        let scope = self.scope_for(caller).await?;
        let bookings = self.store.list_bookings(scope, statuses).await?;

        let mut responses = Vec::with_capacity(bookings.len());
        for booking in bookings {
            responses.push(booking_response(self.store.as_ref(), booking).await?);
        }
        Ok(responses)
    }

    pub async fn get(&self, caller: &CurrentUser, booking_id: Uuid) -> Result<BookingResponse, AppError> {
        let booking = self.find_visible(caller, booking_id).await?;
        booking_response(self.store.as_ref(), booking).await
    }

    pub async fn create(&self, caller: &CurrentUser, request: CreateBookingRequest) -> Result<BookingResponse, AppError> {
        let (mentor_id, session_date, session_time) =
            match (request.mentor, request.session_date, request.session_time) {
                (Some(mentor), Some(date), Some(time)) => (mentor, date, time),
                _ => {
                    return Err(AppError::invalid_field(
                        "mentor",
                        "required",
                        "mentor, session_date and session_time are required",
                    ))
                }
            };

        let mentor = self
            .store
            .find_mentor(mentor_id)
            .await?
            .ok_or_else(|| AppError::invalid_field("mentor", "does_not_exist", "Invalid mentor"))?;
        if mentor.user_id == caller.user_id {
            return Err(AppError::invalid_field(
                "mentor",
                "invalid",
                "You cannot book a session with yourself",
            ));
        }

        let duration_minutes = request.duration_minutes.unwrap_or(60);
        let total_amount = session_total(mentor.hourly_rate, duration_minutes)?;
        let booking = self
            .store
            .create_booking(NewBooking {
                mentee_id: caller.user_id,
                mentor_id: mentor.mentor_id,
                session_type: request.session_type.unwrap_or_default(),
                session_date,
                session_time,
                duration_minutes,
                topic: request.topic,
                description: non_blank(request.description),
                meeting_link: non_blank(request.meeting_link),
                notes: non_blank(request.notes),
                total_amount,
            })
            .await?;

        tracing::info!(
            "Booking {} created by {} with mentor {} ({})",
            booking.booking_id,
            caller.username,
            mentor.mentor_id,
            booking.total_amount
        );
        booking_response(self.store.as_ref(), booking).await
    }

    /// Edits the session details. Status, total and payment flag never change here.
    pub async fn update(
        &self,
        caller: &CurrentUser,
        booking_id: Uuid,
        request: UpdateBookingRequest,
    ) -> Result<BookingResponse, AppError> {
        let mut booking = self.find_visible(caller, booking_id).await?;

        if let Some(session_type) = request.session_type {
            booking.session_type = session_type;
        }
        if let Some(date) = request.session_date {
            booking.session_date = date;
        }
        if let Some(time) = request.session_time {
            booking.session_time = time;
        }
        if let Some(duration) = request.duration_minutes {
            booking.duration_minutes = duration;
        }
        if let Some(topic) = request.topic {
            booking.topic = topic;
        }
        apply_text(&mut booking.description, request.description);
        apply_text(&mut booking.meeting_link, request.meeting_link);
        apply_text(&mut booking.notes, request.notes);

        let saved = self.store.save_booking(&booking).await?;
        booking_response(self.store.as_ref(), saved).await
    }

    pub async fn delete(&self, caller: &CurrentUser, booking_id: Uuid) -> Result<(), AppError> {
        let booking = self.find_visible(caller, booking_id).await?;
        self.store.delete_booking(booking.booking_id).await?;
        tracing::info!("Booking {} deleted by {}", booking_id, caller.username);
        Ok(())
    }

    /// Runs one lifecycle action. The caller's part in the booking is checked
    /// before its status, and the status change itself is a conditional write.
    pub async fn transition(
        &self,
        caller: &CurrentUser,
        booking_id: Uuid,
        action: BookingAction,
    ) -> Result<BookingResponse, AppError> {
        let booking = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        let is_mentor = self
            .store
            .find_mentor(booking.mentor_id)
            .await?
            .map_or(false, |mentor| mentor.user_id == caller.user_id);
        let is_mentee = booking.mentee_id == caller.user_id;

        let allowed = if action.mentor_only() { is_mentor } else { is_mentor || is_mentee };
        if !allowed {
            tracing::warn!("{} may not {} booking {}", caller.username, action, booking_id);
            return Err(AppError::Authorization(action.forbidden_message().to_string()));
        }

        let target = action.next_status(booking.status)?;
        let updated = self
            .store
            .transition_booking(booking_id, action.allowed_from(), target)
            .await?
            .ok_or_else(|| AppError::StateConflict(action.conflict_message().to_string()))?;

        if action == BookingAction::Complete {
            self.store.record_completed_session(updated.mentor_id).await?;
        }

        tracing::info!(
            "Booking {} {}: {} -> {} by {}",
            booking_id,
            action,
            booking.status,
            updated.status,
            caller.username
        );
        booking_response(self.store.as_ref(), updated).await
    }

    /// Bookings outside the caller's scope are reported as missing.
    async fn find_visible(&self, caller: &CurrentUser, booking_id: Uuid) -> Result<Booking, AppError> {
        let scope = self.scope_for(caller).await?;
        self.store
            .find_booking(booking_id)
            .await?
            .filter(|booking| scope.admits(booking))
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }
}
