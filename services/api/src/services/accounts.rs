use std::sync::Arc;

use tokio::sync::OnceCell;
use uuid::Uuid;

use mentorbook_auth::{JwtService, PasswordService, TokenKind, TokenPair};
use mentorbook_common::{AppError, UserRole};
use mentorbook_database::{Account, NewAccount, Store};

use crate::middleware::CurrentUser;
use crate::models::*;

use super::{log_mentor_sync, AppState};

pub struct AccountService {
    store: Arc<dyn Store>,
    jwt_service: JwtService,
    bcrypt_cost: u32,
    login_decoy: Arc<OnceCell<String>>,
}

impl AccountService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            jwt_service: state.jwt_service.clone(),
            bcrypt_cost: state.config.auth.bcrypt_cost,
            login_decoy: state.login_decoy.clone(),
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse, AppError> {
        let role = request.role.unwrap_or_default();
        if role == UserRole::Admin {
            return Err(AppError::invalid_field(
                "role",
                "invalid_choice",
                "Only mentor or mentee may be selected",
            ));
        }

        let hashed_password = PasswordService::hash_password(&request.password, self.bcrypt_cost)?;

        let (account, sync) = self
            .store
            .create_account(NewAccount {
                username: request.username,
                email: request.email,
                hashed_password,
                first_name: request.first_name,
                last_name: request.last_name,
                role,
            })
            .await?;

        tracing::info!("User registered: {} ({})", account.user.username, role);
        log_mentor_sync(&account.user.username, sync);

        Ok(RegisterResponse {
            message: "User registered successfully".to_string(),
            user: UserSummary::from(&account.user),
            role: account.profile.role,
        })
    }

    pub async fn obtain_token(&self, request: TokenRequest) -> Result<TokenPair, AppError> {
        let user = self.store.find_user_by_username(&request.username).await?;

        // Unknown usernames still pay for one bcrypt verification.
        let hashed_password = match &user {
            Some(user) => user.hashed_password.as_str(),
            None => self.decoy_hash().await?,
        };
        let password_ok = PasswordService::verify_password(&request.password, hashed_password)?;

        let user = match user {
            Some(user) if password_ok => user,
            _ => {
                tracing::warn!("Failed login for {}", request.username);
                return Err(AppError::Authentication("Invalid username or password".to_string()));
            }
        };

        self.jwt_service.issue_pair(user.user_id, &user.username)
    }

    async fn decoy_hash(&self) -> Result<&str, AppError> {
        let cost = self.bcrypt_cost;
        let hash = self
            .login_decoy
            .get_or_try_init(|| async move { PasswordService::hash_password(&Uuid::new_v4().to_string(), cost) })
            .await?;
        Ok(hash.as_str())
    }

    pub async fn refresh_token(&self, request: RefreshRequest) -> Result<TokenPair, AppError> {
        let claims = self.jwt_service.validate_token(&request.refresh, TokenKind::Refresh)?;
        let user = self
            .store
            .find_user(claims.user_id()?)
            .await?
            .ok_or_else(|| AppError::Authentication("User not found".to_string()))?;

        self.jwt_service.issue_pair(user.user_id, &user.username)
    }

    pub fn verify_token(&self, request: VerifyRequest) -> Result<(), AppError> {
        self.jwt_service.validate_token(&request.token, TokenKind::Access)?;
        Ok(())
    }

    pub async fn list_users(&self, caller: &CurrentUser) -> Result<Vec<UserSummary>, AppError> {
        caller.require_admin()?;
        let users = self.store.list_users().await?;
        Ok(users.iter().map(UserSummary::from).collect())
    }

    pub async fn get_user(&self, caller: &CurrentUser, user_id: Uuid) -> Result<UserSummary, AppError> {
        caller.require_admin()?;
        self.store
            .find_user(user_id)
            .await?
            .map(|user| UserSummary::from(&user))
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn list_profiles(&self, caller: &CurrentUser) -> Result<Vec<ProfileResponse>, AppError> {
        let profiles = if caller.is_admin() {
            self.store.list_profiles().await?
        } else {
            self.store
                .find_profile_by_user(caller.user_id)
                .await?
                .into_iter()
                .collect()
        };

        let mut responses = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let account = self.load_account(profile.user_id).await?;
            responses.push(profile_response(&account));
        }
        Ok(responses)
    }

    pub async fn my_profile(&self, caller: &CurrentUser) -> Result<ProfileResponse, AppError> {
        let account = self.load_account(caller.user_id).await?;
        Ok(profile_response(&account))
    }

    pub async fn get_profile(&self, caller: &CurrentUser, profile_id: Uuid) -> Result<ProfileResponse, AppError> {
        let account = self.visible_account(caller, profile_id).await?;
        Ok(profile_response(&account))
    }

    pub async fn update_profile(
        &self,
        caller: &CurrentUser,
        profile_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<ProfileResponse, AppError> {
        let Account { mut user, mut profile } = self.visible_account(caller, profile_id).await?;

        if let Some(role) = request.role {
            if role == UserRole::Admin && profile.role != UserRole::Admin && !caller.is_admin() {
                return Err(AppError::Authorization(
                    "Only administrators can assign the admin role".to_string(),
                ));
            }
            profile.role = role;
        }

        if let Some(first_name) = request.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = request.last_name {
            user.last_name = last_name;
        }
        if let Some(email) = request.email {
            user.email = email;
        }

        apply_text(&mut profile.phone_number, request.phone_number);
        apply_text(&mut profile.bio, request.bio);
        apply_text(&mut profile.location, request.location);
        apply_text(&mut profile.website, request.website);
        apply_text(&mut profile.linkedin, request.linkedin);
        apply_text(&mut profile.github, request.github);
        if request.date_of_birth.is_some() {
            profile.date_of_birth = request.date_of_birth;
        }

        let (account, sync) = self.store.save_account(&user, &profile).await?;
        log_mentor_sync(&account.user.username, sync);

        Ok(profile_response(&account))
    }

    async fn load_account(&self, user_id: Uuid) -> Result<Account, AppError> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let profile = self
            .store
            .find_profile_by_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
        Ok(Account { user, profile })
    }

    /// Profiles other than the caller's own are only visible to admins.
    async fn visible_account(&self, caller: &CurrentUser, profile_id: Uuid) -> Result<Account, AppError> {
        let profile = self
            .store
            .find_profile(profile_id)
            .await?
            .filter(|profile| caller.is_admin() || profile.user_id == caller.user_id)
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

        self.load_account(profile.user_id).await
    }
}

fn profile_response(account: &Account) -> ProfileResponse {
    let profile = &account.profile;
    ProfileResponse {
        profile_id: profile.profile_id,
        user: UserSummary::from(&account.user),
        role: profile.role,
        phone_number: profile.phone_number.clone(),
        bio: profile.bio.clone(),
        date_of_birth: profile.date_of_birth,
        location: profile.location.clone(),
        website: profile.website.clone(),
        linkedin: profile.linkedin.clone(),
        github: profile.github.clone(),
        created_at: profile.created_at,
        updated_at: profile.updated_at,
    }
}
