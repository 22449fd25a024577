use std::sync::Arc;

use uuid::Uuid;

use mentorbook_common::{AppError, UserRole};
use mentorbook_database::{Expertise, Mentor, NewExpertise, ReviewFilter, Store};

use crate::middleware::CurrentUser;
use crate::models::*;

use super::{log_mentor_sync, review_response, user_summary, AppState};

pub struct ExpertiseService {
    store: Arc<dyn Store>,
}

impl ExpertiseService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn list(&self) -> Result<Vec<Expertise>, AppError> {
        self.store.list_expertise().await
    }

    pub async fn get(&self, expertise_id: Uuid) -> Result<Expertise, AppError> {
        self.store
            .find_expertise(expertise_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Expertise not found".to_string()))
    }

    pub async fn create(&self, request: CreateExpertiseRequest) -> Result<Expertise, AppError> {
        let expertise = self
            .store
            .create_expertise(NewExpertise {
                name: request.name,
                description: non_blank(request.description),
            })
            .await?;

        tracing::info!("Expertise created: {}", expertise.name);
        Ok(expertise)
    }

    pub async fn update(&self, expertise_id: Uuid, request: UpdateExpertiseRequest) -> Result<Expertise, AppError> {
        let mut expertise = self.get(expertise_id).await?;
        if let Some(name) = request.name {
            expertise.name = name;
        }
        apply_text(&mut expertise.description, request.description);

        self.store.save_expertise(&expertise).await
    }

    pub async fn delete(&self, expertise_id: Uuid) -> Result<(), AppError> {
        if self.store.delete_expertise(expertise_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound("Expertise not found".to_string()))
        }
    }
}

pub struct MentorService {
    store: Arc<dyn Store>,
}

impl MentorService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn list(&self) -> Result<Vec<MentorResponse>, AppError> {
        let mentors = self.store.list_mentors().await?;
        let expertise = self.store.list_expertise().await?;

        let mut responses = Vec::with_capacity(mentors.len());
        for mentor in mentors {
            responses.push(self.to_response(mentor, &expertise).await?);
        }
        Ok(responses)
    }

    pub async fn get(&self, mentor_id: Uuid) -> Result<MentorResponse, AppError> {
        let mentor = self.find(mentor_id).await?;
        let expertise = self.store.list_expertise().await?;
        self.to_response(mentor, &expertise).await
    }

    /// Turns the caller into a mentor with the submitted fields. The role
    /// change and the new record are written together or not at all.
    pub async fn create(&self, caller: &CurrentUser, request: MentorRequest) -> Result<MentorResponse, AppError> {
        if self.store.find_mentor_by_user(caller.user_id).await?.is_some() {
            return Err(AppError::invalid_field(
                "user",
                "unique",
                "You already have a mentor profile",
            ));
        }
        if caller.is_admin() {
            return Err(AppError::invalid_field(
                "role",
                "invalid_choice",
                "Administrator accounts cannot become mentors",
            ));
        }

        let mut mentor = Mentor::provisioned_for(caller.user_id);
        apply_mentor(&mut mentor, request);

        let saved = self.store.become_mentor(&mentor).await?;
        tracing::info!("Mentor record created for {}", caller.username);

        let expertise = self.store.list_expertise().await?;
        self.to_response(saved, &expertise).await
    }

    pub async fn update(
        &self,
        caller: &CurrentUser,
        mentor_id: Uuid,
        request: MentorRequest,
    ) -> Result<MentorResponse, AppError> {
        let mut mentor = self.find(mentor_id).await?;
        authorize_owner(caller, &mentor)?;

        apply_mentor(&mut mentor, request);
        let saved = self.store.save_mentor(&mentor).await?;
        let expertise = self.store.list_expertise().await?;
        self.to_response(saved, &expertise).await
    }

    /// Reverts the owner to a mentee; the role sync deletes the record and
    /// everything booked against it.
    pub async fn delete(&self, caller: &CurrentUser, mentor_id: Uuid) -> Result<(), AppError> {
        let mentor = self.find(mentor_id).await?;
        authorize_owner(caller, &mentor)?;

        let user = self
            .store
            .find_user(mentor.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let mut profile = self
            .store
            .find_profile_by_user(mentor.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
        profile.role = UserRole::Mentee;

        let (_, sync) = self.store.save_account(&user, &profile).await?;
        log_mentor_sync(&user.username, sync);
        Ok(())
    }

    pub async fn public_reviews(&self, mentor_id: Uuid) -> Result<Vec<ReviewResponse>, AppError> {
        self.find(mentor_id).await?;

        let reviews = self
            .store
            .list_reviews(ReviewFilter {
                mentor: Some(mentor_id),
                public_only: true,
                ..Default::default()
            })
            .await?;

        let mut responses = Vec::with_capacity(reviews.len());
        for review in reviews {
            responses.push(review_response(self.store.as_ref(), review).await?);
        }
        Ok(responses)
    }

    async fn find(&self, mentor_id: Uuid) -> Result<Mentor, AppError> {
        self.store
            .find_mentor(mentor_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Mentor not found".to_string()))
    }

    async fn to_response(&self, mentor: Mentor, catalog: &[Expertise]) -> Result<MentorResponse, AppError> {
        let expertise = catalog
            .iter()
            .filter(|e| mentor.expertise_ids.contains(&e.expertise_id))
            .cloned()
            .collect();

        Ok(MentorResponse {
            mentor_id: mentor.mentor_id,
            user: user_summary(self.store.as_ref(), mentor.user_id).await?,
            expertise,
            experience_years: mentor.experience_years,
            experience_level: mentor.experience_level,
            company: mentor.company,
            position: mentor.position,
            hourly_rate: mentor.hourly_rate,
            availability: mentor.availability,
            is_verified: mentor.is_verified,
            is_active: mentor.is_active,
            total_sessions: mentor.total_sessions,
            rating: mentor.rating,
            created_at: mentor.created_at,
            updated_at: mentor.updated_at,
        })
    }
}

fn authorize_owner(caller: &CurrentUser, mentor: &Mentor) -> Result<(), AppError> {
    if caller.is_admin() || mentor.user_id == caller.user_id {
        Ok(())
    } else {
        Err(AppError::Authorization(
            "You can only modify your own mentor profile".to_string(),
        ))
    }
}

fn apply_mentor(mentor: &mut Mentor, request: MentorRequest) {
    if let Some(ids) = request.expertise_ids {
        mentor.expertise_ids = ids;
    }
    if let Some(years) = request.experience_years {
        mentor.experience_years = years;
    }
    if let Some(level) = request.experience_level {
        mentor.experience_level = level;
    }
    apply_text(&mut mentor.company, request.company);
    apply_text(&mut mentor.position, request.position);
    if let Some(rate) = request.hourly_rate {
        mentor.hourly_rate = rate;
    }
    if let Some(availability) = request.availability {
        mentor.availability = availability;
    }
    if let Some(is_active) = request.is_active {
        mentor.is_active = is_active;
    }
}
