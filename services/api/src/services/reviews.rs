use std::sync::Arc;

use uuid::Uuid;

use mentorbook_common::{AppError, BookingStatus};
use mentorbook_database::{NewReview, Review, ReviewFilter, Store};

use crate::middleware::CurrentUser;
use crate::models::*;

use super::{review_response, AppState};

pub struct ReviewService {
    store: Arc<dyn Store>,
}

impl ReviewService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    fn filter_for(caller: &CurrentUser, mentor: Option<Uuid>) -> ReviewFilter {
        ReviewFilter {
            author: if caller.is_admin() { None } else { Some(caller.user_id) },
            mentor,
            public_only: false,
        }
    }

    pub async fn list(&self, caller: &CurrentUser, mentor: Option<Uuid>) -> Result<Vec<ReviewResponse>, AppError> {
        let reviews = self.store.list_reviews(Self::filter_for(caller, mentor)).await?;

        let mut responses = Vec::with_capacity(reviews.len());
        for review in reviews {
            responses.push(review_response(self.store.as_ref(), review).await?);
        }
        Ok(responses)
    }

    pub async fn get(&self, caller: &CurrentUser, review_id: Uuid) -> Result<ReviewResponse, AppError> {
        let review = self.find_visible(caller, review_id).await?;
        review_response(self.store.as_ref(), review).await
    }

    pub async fn create(&self, caller: &CurrentUser, request: CreateReviewRequest) -> Result<ReviewResponse, AppError> {
        let (booking_id, rating) = match (request.booking, request.rating) {
            (Some(booking), Some(rating)) => (booking, rating),
            _ => {
                return Err(AppError::invalid_field(
                    "booking",
                    "required",
                    "booking and rating are required",
                ))
            }
        };

        let booking = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::invalid_field("booking", "does_not_exist", "Invalid booking"))?;

        if booking.mentee_id != caller.user_id {
            return Err(AppError::Authorization(
                "You can only review your own bookings".to_string(),
            ));
        }
        if booking.status != BookingStatus::Completed {
            return Err(AppError::StateConflict(
                "Only completed bookings can be reviewed".to_string(),
            ));
        }
        if request.mentor.map_or(false, |mentor| mentor != booking.mentor_id) {
            return Err(AppError::invalid_field(
                "mentor",
                "mismatch",
                "Mentor does not match the booking",
            ));
        }

        let review = self
            .store
            .create_review(NewReview {
                mentee_id: caller.user_id,
                mentor_id: booking.mentor_id,
                booking_id: booking.booking_id,
                rating,
                title: non_blank(request.title),
                comment: request.comment,
                is_public: request.is_public.unwrap_or(true),
            })
            .await?;
        self.store.refresh_mentor_rating(review.mentor_id).await?;

        tracing::info!(
            "Review {} posted by {} for booking {}",
            review.review_id,
            caller.username,
            booking.booking_id
        );
        review_response(self.store.as_ref(), review).await
    }

    pub async fn update(
        &self,
        caller: &CurrentUser,
        review_id: Uuid,
        request: UpdateReviewRequest,
    ) -> Result<ReviewResponse, AppError> {
        let mut review = self.find_visible(caller, review_id).await?;

        if let Some(rating) = request.rating {
            review.rating = rating;
        }
        apply_text(&mut review.title, request.title);
        if let Some(comment) = request.comment {
            review.comment = comment;
        }
        if let Some(is_public) = request.is_public {
            review.is_public = is_public;
        }

        let saved = self.store.save_review(&review).await?;
        self.store.refresh_mentor_rating(saved.mentor_id).await?;
        review_response(self.store.as_ref(), saved).await
    }

    pub async fn delete(&self, caller: &CurrentUser, review_id: Uuid) -> Result<(), AppError> {
        let review = self.find_visible(caller, review_id).await?;
        self.store.delete_review(review.review_id).await?;
        self.store.refresh_mentor_rating(review.mentor_id).await?;
        Ok(())
    }

    async fn find_visible(&self, caller: &CurrentUser, review_id: Uuid) -> Result<Review, AppError> {
        let filter = Self::filter_for(caller, None);
        self.store
            .find_review(review_id)
            .await?
            .filter(|review| filter.admits(review))
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))
    }
}
