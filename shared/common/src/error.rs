use std::borrow::Cow;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use validator::{ValidationError, ValidationErrors};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error_code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
}

impl ApiError {
    pub fn new(error_code: String, message: String) -> Self {
        Self {
            error_code,
            message,
            details: None,
            timestamp: Utc::now(),
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl AppError {
    /// Single-field validation failure, shaped like the ones `validator` produces.
    pub fn invalid_field(field: &'static str, code: &'static str, message: impl Into<String>) -> Self {
        let mut error = ValidationError::new(code);
        error.message = Some(Cow::Owned(message.into()));
        let mut errors = ValidationErrors::new();
        errors.add(field, error);
        AppError::Validation(errors)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::StateConflict(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Authentication(_) => "AUTHENTICATION_ERROR",
            AppError::Authorization(_) => "AUTHORIZATION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::StateConflict(_) => "STATE_CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn to_api_error(&self) -> ApiError {
        match self {
            AppError::Database(_) | AppError::Internal(_) => {
                tracing::error!("Request failed: {:?}", self);
                ApiError::new(self.error_code().to_string(), "Internal server error".to_string())
            }
            AppError::Validation(errors) => {
                let api_error = ApiError::new(self.error_code().to_string(), "Validation failed".to_string());
                match serde_json::to_value(errors.field_errors()) {
                    Ok(details) => api_error.with_details(details),
                    Err(_) => api_error,
                }
            }
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::StateConflict(msg)
            | AppError::NotFound(msg) => ApiError::new(self.error_code().to_string(), msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_api_error())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(AppError::Authentication("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Authorization("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::StateConflict("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::invalid_field("username", "unique", "taken").status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn field_errors_land_in_details() {
        let body = AppError::invalid_field("rating", "range", "Rating must be between 1 and 5").to_api_error();
        assert_eq!(body.error_code, "VALIDATION_ERROR");
        let details = body.details.expect("field details");
        assert_eq!(details["rating"][0]["code"], "range");
        assert_eq!(details["rating"][0]["message"], "Rating must be between 1 and 5");
    }

    #[test]
    fn internal_messages_are_redacted() {
        let body = AppError::Internal("pool exhausted on host db-1".into()).to_api_error();
        assert_eq!(body.message, "Internal server error");
    }
}
