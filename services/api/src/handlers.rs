use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use mentorbook_auth::TokenPair;
use mentorbook_common::{ApiResponse, AppError, BookingAction, PAST_STATUSES, UPCOMING_STATUSES};
use mentorbook_database::Expertise;

use crate::middleware::{CurrentUser, ValidJson};
use crate::models::*;
use crate::services::*;

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

fn created<T>(data: T) -> Result<(StatusCode, Json<ApiResponse<T>>), AppError> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

// Health check
pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("Mentorbook API is healthy".to_string()))
}

// Registration and tokens

pub async fn register(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RegisterResponse>>), AppError> {
    created(AccountService::new(&state).register(request).await?)
}

pub async fn obtain_token(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<TokenRequest>,
) -> ApiResult<TokenPair> {
    ok(AccountService::new(&state).obtain_token(request).await?)
}

pub async fn refresh_token(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RefreshRequest>,
) -> ApiResult<TokenPair> {
    ok(AccountService::new(&state).refresh_token(request).await?)
}

pub async fn verify_token(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<VerifyRequest>,
) -> ApiResult<String> {
    AccountService::new(&state).verify_token(request)?;
    ok("Token is valid".to_string())
}

// Users

pub async fn list_users(State(state): State<AppState>, caller: CurrentUser) -> ApiResult<Vec<UserSummary>> {
    ok(AccountService::new(&state).list_users(&caller).await?)
}

pub async fn get_user(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<UserSummary> {
    ok(AccountService::new(&state).get_user(&caller, user_id).await?)
}

pub async fn my_stats(State(state): State<AppState>, caller: CurrentUser) -> ApiResult<UserStats> {
    ok(StatsService::new(&state).for_user(&caller).await?)
}

// Profiles

pub async fn list_profiles(State(state): State<AppState>, caller: CurrentUser) -> ApiResult<Vec<ProfileResponse>> {
    ok(AccountService::new(&state).list_profiles(&caller).await?)
}

pub async fn my_profile(State(state): State<AppState>, caller: CurrentUser) -> ApiResult<ProfileResponse> {
    ok(AccountService::new(&state).my_profile(&caller).await?)
}

pub async fn get_profile(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(profile_id): Path<Uuid>,
) -> ApiResult<ProfileResponse> {
    ok(AccountService::new(&state).get_profile(&caller, profile_id).await?)
}

pub async fn update_profile(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(profile_id): Path<Uuid>,
    ValidJson(request): ValidJson<UpdateProfileRequest>,
) -> ApiResult<ProfileResponse> {
    ok(AccountService::new(&state)
        .update_profile(&caller, profile_id, request)
        .await?)
}

// Expertise

pub async fn list_expertise(State(state): State<AppState>) -> ApiResult<Vec<Expertise>> {
    ok(ExpertiseService::new(&state).list().await?)
}

pub async fn get_expertise(State(state): State<AppState>, Path(expertise_id): Path<Uuid>) -> ApiResult<Expertise> {
    ok(ExpertiseService::new(&state).get(expertise_id).await?)
}

pub async fn create_expertise(
    State(state): State<AppState>,
    _caller: CurrentUser,
    ValidJson(request): ValidJson<CreateExpertiseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Expertise>>), AppError> {
    created(ExpertiseService::new(&state).create(request).await?)
}

pub async fn update_expertise(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Path(expertise_id): Path<Uuid>,
    ValidJson(request): ValidJson<UpdateExpertiseRequest>,
) -> ApiResult<Expertise> {
    ok(ExpertiseService::new(&state).update(expertise_id, request).await?)
}

pub async fn delete_expertise(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Path(expertise_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ExpertiseService::new(&state).delete(expertise_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Mentors

pub async fn list_mentors(State(state): State<AppState>) -> ApiResult<Vec<MentorResponse>> {
    ok(MentorService::new(&state).list().await?)
}

pub async fn get_mentor(State(state): State<AppState>, Path(mentor_id): Path<Uuid>) -> ApiResult<MentorResponse> {
    ok(MentorService::new(&state).get(mentor_id).await?)
}

pub async fn create_mentor(
    State(state): State<AppState>,
    caller: CurrentUser,
    ValidJson(request): ValidJson<MentorRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MentorResponse>>), AppError> {
    created(MentorService::new(&state).create(&caller, request).await?)
}

pub async fn update_mentor(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(mentor_id): Path<Uuid>,
    ValidJson(request): ValidJson<MentorRequest>,
) -> ApiResult<MentorResponse> {
    ok(MentorService::new(&state).update(&caller, mentor_id, request).await?)
}

pub async fn delete_mentor(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(mentor_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    MentorService::new(&state).delete(&caller, mentor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mentor_reviews(
    State(state): State<AppState>,
    Path(mentor_id): Path<Uuid>,
) -> ApiResult<Vec<ReviewResponse>> {
    ok(MentorService::new(&state).public_reviews(mentor_id).await?)
}

// Bookings

pub async fn list_bookings(State(state): State<AppState>, caller: CurrentUser) -> ApiResult<Vec<BookingResponse>> {
    ok(BookingService::new(&state).list(&caller, None).await?)
}

pub async fn upcoming_bookings(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> ApiResult<Vec<BookingResponse>> {
    ok(BookingService::new(&state)
        .list(&caller, Some(&UPCOMING_STATUSES[..]))
        .await?)
}

pub async fn past_bookings(State(state): State<AppState>, caller: CurrentUser) -> ApiResult<Vec<BookingResponse>> {
    ok(BookingService::new(&state)
        .list(&caller, Some(&PAST_STATUSES[..]))
        .await?)
}

pub async fn create_booking(
    State(state): State<AppState>,
    caller: CurrentUser,
    ValidJson(request): ValidJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BookingResponse>>), AppError> {
    created(BookingService::new(&state).create(&caller, request).await?)
}

pub async fn get_booking(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(booking_id): Path<Uuid>,
) -> ApiResult<BookingResponse> {
    ok(BookingService::new(&state).get(&caller, booking_id).await?)
}

pub async fn update_booking(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(booking_id): Path<Uuid>,
    ValidJson(request): ValidJson<UpdateBookingRequest>,
) -> ApiResult<BookingResponse> {
    ok(BookingService::new(&state)
        .update(&caller, booking_id, request)
        .await?)
}

pub async fn delete_booking(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(booking_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    BookingService::new(&state).delete(&caller, booking_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn run_transition(
    state: AppState,
    caller: CurrentUser,
    booking_id: Uuid,
    action: BookingAction,
) -> ApiResult<BookingResponse> {
    ok(BookingService::new(&state)
        .transition(&caller, booking_id, action)
        .await?)
}

pub async fn accept_booking(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(booking_id): Path<Uuid>,
) -> ApiResult<BookingResponse> {
    run_transition(state, caller, booking_id, BookingAction::Accept).await
}

pub async fn decline_booking(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(booking_id): Path<Uuid>,
) -> ApiResult<BookingResponse> {
    run_transition(state, caller, booking_id, BookingAction::Decline).await
}

pub async fn complete_booking(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(booking_id): Path<Uuid>,
) -> ApiResult<BookingResponse> {
    run_transition(state, caller, booking_id, BookingAction::Complete).await
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(booking_id): Path<Uuid>,
) -> ApiResult<BookingResponse> {
    run_transition(state, caller, booking_id, BookingAction::Cancel).await
}

// Reviews

pub async fn list_reviews(
    State(state): State<AppState>,
    caller: CurrentUser,
    Query(query): Query<ReviewQuery>,
) -> ApiResult<Vec<ReviewResponse>> {
    ok(ReviewService::new(&state).list(&caller, query.mentor).await?)
}

pub async fn create_review(
    State(state): State<AppState>,
    caller: CurrentUser,
    ValidJson(request): ValidJson<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReviewResponse>>), AppError> {
    created(ReviewService::new(&state).create(&caller, request).await?)
}

pub async fn get_review(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(review_id): Path<Uuid>,
) -> ApiResult<ReviewResponse> {
    ok(ReviewService::new(&state).get(&caller, review_id).await?)
}

pub async fn update_review(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(review_id): Path<Uuid>,
    ValidJson(request): ValidJson<UpdateReviewRequest>,
) -> ApiResult<ReviewResponse> {
    ok(ReviewService::new(&state)
        .update(&caller, review_id, request)
        .await?)
}

pub async fn delete_review(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(review_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    ReviewService::new(&state).delete(&caller, review_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
