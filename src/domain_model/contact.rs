use crate::domain_model::PublicUser;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Contact row joined with the public user fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactEntry {
    #[serde(flatten)]
    pub user: PublicUser,
    pub nickname: Option<String>,
    pub created_at: DateTime<Utc>,
}
