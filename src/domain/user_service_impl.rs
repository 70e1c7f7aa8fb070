use crate::domain::{UserError, UserService};
use crate::domain_model::{OwnProfile, ProfilePatch, PublicUser, UserId};
use crate::domain_port::{ParticipantRepo, UserRepo};
use chrono::{DateTime, Utc};
use std::sync::Arc;

const SEARCH_LIMIT: u16 = 20;

pub struct RealUserService {
    user_repo: Arc<dyn UserRepo>,
    participant_repo: Arc<dyn ParticipantRepo>,
}

impl RealUserService {
    pub fn new(user_repo: Arc<dyn UserRepo>, participant_repo: Arc<dyn ParticipantRepo>) -> Self {
        Self {
            user_repo,
            participant_repo,
        }
    }

    fn validate_patch(patch: &ProfilePatch) -> Result<(), UserError> {
        if patch.is_empty() {
            return Err(UserError::Validation("Nothing to update".into()));
        }
        if let Some(name) = &patch.display_name {
            let len = name.chars().count();
            if len == 0 || len > 50 {
                return Err(UserError::Validation(
                    "Display name must be 1-50 characters".into(),
                ));
            }
        }
        if let Some(bio) = &patch.bio {
            if bio.chars().count() > 200 {
                return Err(UserError::Validation(
                    "Bio must be at most 200 characters".into(),
                ));
            }
        }
        if let Some(url) = &patch.avatar_url {
            if url.len() > 500 {
                return Err(UserError::Validation("Avatar URL is too long".into()));
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserService for RealUserService {
    async fn own_profile(&self, user_id: UserId) -> Result<OwnProfile, UserError> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound)?;
        Ok(user.own_profile())
    }

    async fn public_profile(&self, user_id: UserId) -> Result<PublicUser, UserError> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound)?;
        Ok(user.public())
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        patch: ProfilePatch,
    ) -> Result<OwnProfile, UserError> {
        Self::validate_patch(&patch)?;
        self.user_repo.update_profile(user_id, &patch).await?;
        self.own_profile(user_id).await
    }

    async fn search(&self, caller: UserId, query: &str) -> Result<Vec<PublicUser>, UserError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let users = self.user_repo.search(query, caller, SEARCH_LIMIT).await?;
        Ok(users.iter().map(|u| u.public()).collect())
    }

    async fn set_online(&self, user_id: UserId) -> Result<(), UserError> {
        self.user_repo.set_online(user_id).await?;
        Ok(())
    }

    async fn set_offline(&self, user_id: UserId) -> Result<DateTime<Utc>, UserError> {
        let last_seen = Utc::now();
        self.user_repo.set_offline(user_id, last_seen).await?;
        Ok(last_seen)
    }

    async fn neighbor_user_ids(&self, user_id: UserId) -> Result<Vec<UserId>, UserError> {
        Ok(self.participant_repo.neighbor_user_ids(user_id).await?)
    }
}
