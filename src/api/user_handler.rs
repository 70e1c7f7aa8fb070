use crate::api::error::ApiError;
use crate::domain_model::{ProfilePatch, UserId};
use crate::server::ServiceRegistry;
use serde::Deserialize;
use std::sync::Arc;
use warp::reject;

pub async fn me(
    user_id: UserId,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let profile = services
        .user_service
        .own_profile(user_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&profile))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

pub async fn update_me(
    user_id: UserId,
    body: UpdateProfileRequest,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let patch = ProfilePatch {
        display_name: body.display_name,
        avatar_url: body.avatar_url,
        bio: body.bio,
    };
    let profile = services
        .user_service
        .update_profile(user_id, patch)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&profile))
}

pub async fn get_user(
    target: UserId,
    _user_id: UserId,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let profile = services
        .user_service
        .public_profile(target)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&profile))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

pub async fn search(
    query: SearchQuery,
    user_id: UserId,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let users = services
        .user_service
        .search(user_id, &query.q)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&users))
}
