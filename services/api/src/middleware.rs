use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use mentorbook_auth::{bearer_token, TokenKind};
use mentorbook_common::{AppError, UserRole};

use crate::services::AppState;

/// The authenticated caller. Handlers that take this extractor reject
/// requests without a valid access token with 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "You do not have permission to perform this action".to_string(),
            ))
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            AppError::Authentication("Authentication credentials were not provided".to_string())
        })?;

        let claims = state
            .jwt_service
            .validate_token(token, TokenKind::Access)
            .map_err(|err| {
                tracing::warn!("Rejected access token: {}", err);
                err
            })?;
        let user_id = claims.user_id()?;

        let user = state
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::Authentication("User not found".to_string()))?;

        // Role is read per request so profile changes apply without a new token.
        let role = state
            .store
            .find_profile_by_user(user_id)
            .await?
            .map(|profile| profile.role)
            .unwrap_or_default();

        Ok(CurrentUser {
            user_id,
            username: user.username,
            role,
        })
    }
}

/// JSON body that has been deserialized and run through `validator`.
/// Malformed bodies and failed rules both surface as 400 validation errors.
pub struct ValidJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::invalid_field("body", "invalid_json", rejection.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}
