use crate::api::error::ApiError;
use crate::domain_model::UserId;
use crate::server::ServiceRegistry;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reject;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddContactRequest {
    pub user_id: UserId,
    pub nickname: Option<String>,
}

pub async fn add_contact(
    user_id: UserId,
    body: AddContactRequest,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let entry = services
        .contact_service
        .add_contact(user_id, body.user_id, body.nickname)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::with_status(
        warp::reply::json(&entry),
        StatusCode::CREATED,
    ))
}

pub async fn list_contacts(
    user_id: UserId,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let contacts = services
        .contact_service
        .list_contacts(user_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&contacts))
}

pub async fn remove_contact(
    target: UserId,
    user_id: UserId,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    services
        .contact_service
        .remove_contact(user_id, target)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRequest {
    pub user_id: UserId,
}

pub async fn block(
    user_id: UserId,
    body: BlockRequest,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    services
        .contact_service
        .block_user(user_id, body.user_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "success": true })),
        StatusCode::CREATED,
    ))
}

pub async fn unblock(
    target: UserId,
    user_id: UserId,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    services
        .contact_service
        .unblock_user(user_id, target)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&json!({ "success": true })))
}

pub async fn list_blocks(
    user_id: UserId,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let blocked = services
        .contact_service
        .list_blocks(user_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&blocked))
}
