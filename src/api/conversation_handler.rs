use crate::api::error::ApiError;
use crate::domain_model::{ConversationId, MessageId, PageSize, UserId};
use crate::server::ServiceRegistry;
use serde::Deserialize;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reject;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDirectRequest {
    pub user_id: UserId,
}

pub async fn create_direct(
    user_id: UserId,
    body: CreateDirectRequest,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let summary = services
        .conversation_service
        .get_or_create_direct(user_id, body.user_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&summary),
        StatusCode::CREATED,
    ))
}

pub async fn list(
    user_id: UserId,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let summaries = services
        .conversation_service
        .list_conversations(user_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&summaries))
}

pub async fn get(
    conversation_id: ConversationId,
    user_id: UserId,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let summary = services
        .conversation_service
        .get_conversation(user_id, conversation_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&summary))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub cursor: Option<MessageId>,
    pub limit: Option<u16>,
}

pub async fn messages(
    conversation_id: ConversationId,
    query: MessagesQuery,
    user_id: UserId,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let limit = query.limit.map(PageSize).unwrap_or_default();
    let page = services
        .conversation_service
        .get_messages(user_id, conversation_id, query.cursor, limit)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&page))
}
