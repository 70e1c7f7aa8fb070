use crate::domain::{ContactError, ContactService};
use crate::domain_model::{ContactEntry, PublicUser, UserId};
use crate::domain_port::{BlockRepo, ContactInsert, ContactRepo, UserRepo};
use chrono::Utc;
use std::sync::Arc;

pub struct RealContactService {
    user_repo: Arc<dyn UserRepo>,
    contact_repo: Arc<dyn ContactRepo>,
    block_repo: Arc<dyn BlockRepo>,
}

impl RealContactService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        contact_repo: Arc<dyn ContactRepo>,
        block_repo: Arc<dyn BlockRepo>,
    ) -> Self {
        Self {
            user_repo,
            contact_repo,
            block_repo,
        }
    }
}

#[async_trait::async_trait]
impl ContactService for RealContactService {
    async fn add_contact(
        &self,
        me: UserId,
        other: UserId,
        nickname: Option<String>,
    ) -> Result<ContactEntry, ContactError> {
        if me == other {
            return Err(ContactError::Validation(
                "Cannot add yourself as a contact".into(),
            ));
        }
        let user = self
            .user_repo
            .get_by_id(other)
            .await?
            .ok_or(ContactError::NotFound)?;

        let now = Utc::now();
        match self
            .contact_repo
            .insert(me, other, nickname.as_deref(), now)
            .await?
        {
            ContactInsert::Inserted => Ok(ContactEntry {
                user: user.public(),
                nickname,
                created_at: now,
            }),
            ContactInsert::Duplicate => {
                Err(ContactError::Validation("Already in contacts".into()))
            }
        }
    }

    async fn list_contacts(&self, me: UserId) -> Result<Vec<ContactEntry>, ContactError> {
        Ok(self.contact_repo.list(me).await?)
    }

    async fn remove_contact(&self, me: UserId, other: UserId) -> Result<(), ContactError> {
        if !self.contact_repo.delete(me, other).await? {
            return Err(ContactError::NotFound);
        }
        Ok(())
    }

    async fn block_user(&self, me: UserId, other: UserId) -> Result<(), ContactError> {
        if me == other {
            return Err(ContactError::Validation("Cannot block yourself".into()));
        }
        if self.user_repo.get_by_id(other).await?.is_none() {
            return Err(ContactError::NotFound);
        }
        self.block_repo.insert(me, other, Utc::now()).await?;
        Ok(())
    }

    async fn unblock_user(&self, me: UserId, other: UserId) -> Result<(), ContactError> {
        if !self.block_repo.delete(me, other).await? {
            return Err(ContactError::NotFound);
        }
        Ok(())
    }

    async fn list_blocks(&self, me: UserId) -> Result<Vec<PublicUser>, ContactError> {
        Ok(self.block_repo.list(me).await?)
    }
}
