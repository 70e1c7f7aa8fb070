use crate::domain_model::{ProfilePatch, UserId, UserRecord};
use crate::domain_port::{StorageTx, StoreError};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
}

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    async fn create_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        user: &NewUser,
    ) -> Result<(), StoreError>;

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError>;

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError>;

    /// How many of `ids` exist. Used to validate member lists in one query.
    async fn count_existing_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        ids: &[UserId],
    ) -> Result<u64, StoreError>;

    async fn display_names_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        ids: &[UserId],
    ) -> Result<Vec<(UserId, String)>, StoreError>;

    async fn update_profile(
        &self,
        user_id: UserId,
        patch: &ProfilePatch,
    ) -> Result<(), StoreError>;

    /// Case-insensitive substring search over username and display name,
    /// excluding `exclude`.
    async fn search(
        &self,
        query: &str,
        exclude: UserId,
        limit: u16,
    ) -> Result<Vec<UserRecord>, StoreError>;

    async fn set_online(&self, user_id: UserId) -> Result<(), StoreError>;

    async fn set_offline(
        &self,
        user_id: UserId,
        last_seen: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
