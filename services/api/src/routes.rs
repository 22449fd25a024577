use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::services::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // Registration and tokens
        .route("/register", post(handlers::register))
        .route("/token", post(handlers::obtain_token))
        .route("/token/refresh", post(handlers::refresh_token))
        .route("/token/verify", post(handlers::verify_token))

        // Users (admin only, except own stats)
        .route("/users", get(handlers::list_users))
        .route("/users/me/stats", get(handlers::my_stats))
        .route("/users/:user_id", get(handlers::get_user))

        // Profiles
        .route("/profiles", get(handlers::list_profiles))
        .route("/profiles/me", get(handlers::my_profile))
        .route(
            "/profiles/:profile_id",
            get(handlers::get_profile)
                .put(handlers::update_profile)
                .patch(handlers::update_profile),
        )

        // Expertise tags
        .route("/expertise", get(handlers::list_expertise).post(handlers::create_expertise))
        .route(
            "/expertise/:expertise_id",
            get(handlers::get_expertise)
                .put(handlers::update_expertise)
                .patch(handlers::update_expertise)
                .delete(handlers::delete_expertise),
        )

        // Mentor directory
        .route("/mentors", get(handlers::list_mentors).post(handlers::create_mentor))
        .route(
            "/mentors/:mentor_id",
            get(handlers::get_mentor)
                .put(handlers::update_mentor)
                .patch(handlers::update_mentor)
                .delete(handlers::delete_mentor),
        )
        .route("/mentors/:mentor_id/reviews", get(handlers::mentor_reviews))

        // Bookings
        .route("/bookings", get(handlers::list_bookings).post(handlers::create_booking))
        .route("/bookings/upcoming", get(handlers::upcoming_bookings))
        .route("/bookings/past", get(handlers::past_bookings))
        .route(
            "/bookings/:booking_id",
            get(handlers::get_booking)
                .put(handlers::update_booking)
                .patch(handlers::update_booking)
                .delete(handlers::delete_booking),
        )
        .route("/bookings/:booking_id/accept", post(handlers::accept_booking))
        .route("/bookings/:booking_id/decline", post(handlers::decline_booking))
        .route("/bookings/:booking_id/complete", post(handlers::complete_booking))
        .route("/bookings/:booking_id/cancel", post(handlers::cancel_booking))

        // Reviews
        .route("/reviews", get(handlers::list_reviews).post(handlers::create_review))
        .route(
            "/reviews/:review_id",
            get(handlers::get_review)
                .put(handlers::update_review)
                .patch(handlers::update_review)
                .delete(handlers::delete_review),
        )
}
