use crate::api::error::ApiError;
use crate::domain_model::{
    ChatDeleted, ChatEdited, ConversationId, MessageId, OutboundFrame, UserId, frame_type,
};
use crate::server::{RealtimeContext, fan_out};
use serde::Deserialize;
use std::sync::Arc;
use warp::reject;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageRequest {
    pub content: String,
}

pub async fn edit(
    message_id: MessageId,
    user_id: UserId,
    body: EditMessageRequest,
    ctx: Arc<RealtimeContext>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let broadcast = ctx
        .services
        .message_service
        .edit_message(user_id, message_id, body.content)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    let record = &broadcast.record;
    if let Some(edited_at) = record.edited_at {
        let frame = OutboundFrame::event(
            frame_type::CHAT_EDITED,
            &ChatEdited {
                message_id: record.message_id,
                conversation_id: record.conversation_id,
                new_content: record.content.clone(),
                edited_at,
            },
        );
        for &participant in &broadcast.participant_ids {
            if participant != user_id {
                ctx.hub.send_to_user(participant, &frame);
            }
        }
    }

    Ok(warp::reply::json(record))
}

pub async fn delete(
    message_id: MessageId,
    user_id: UserId,
    ctx: Arc<RealtimeContext>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let broadcast = ctx
        .services
        .message_service
        .delete_message(user_id, message_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    // Everyone hears about the tombstone, the deleting sender included.
    let record = &broadcast.record;
    let frame = OutboundFrame::event(
        frame_type::CHAT_DELETED,
        &ChatDeleted {
            message_id: record.message_id,
            conversation_id: record.conversation_id,
        },
    );
    for &participant in &broadcast.participant_ids {
        ctx.hub.send_to_user(participant, &frame);
    }

    Ok(warp::reply::json(record))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequest {
    pub message_id: MessageId,
    pub conversation_ids: Vec<ConversationId>,
}

pub async fn forward(
    user_id: UserId,
    body: ForwardRequest,
    ctx: Arc<RealtimeContext>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let forwarded = ctx
        .services
        .message_service
        .forward_message(user_id, body.message_id, body.conversation_ids)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    for sent in &forwarded {
        fan_out(&ctx, sent).await;
    }

    let records: Vec<_> = forwarded.into_iter().map(|sent| sent.record).collect();
    Ok(warp::reply::json(&records))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub q: String,
    pub conversation_id: Option<ConversationId>,
}

pub async fn search(
    query: SearchQuery,
    user_id: UserId,
    ctx: Arc<RealtimeContext>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let results = ctx
        .services
        .message_service
        .search(user_id, &query.q, query.conversation_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&results))
}

pub async fn unread(
    user_id: UserId,
    ctx: Arc<RealtimeContext>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let summary = ctx
        .services
        .message_service
        .unread_summary(user_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&summary))
}
