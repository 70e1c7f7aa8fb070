use crate::api::error::ApiError;
use crate::domain::CreateGroupInput;
use crate::domain_model::{GroupId, GroupPatch, ParticipantRole, UserId};
use crate::server::{RealtimeContext, fan_out};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reject;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub member_ids: Vec<UserId>,
}

pub async fn create(
    user_id: UserId,
    body: CreateGroupRequest,
    ctx: Arc<RealtimeContext>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let creation = ctx
        .services
        .group_service
        .create_group(
            user_id,
            CreateGroupInput {
                name: body.name,
                description: body.description,
                member_ids: body.member_ids,
            },
        )
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    // Online members learn about the new group through its SYSTEM message.
    fan_out(&ctx, &creation.system_message).await;

    Ok(warp::reply::with_status(
        warp::reply::json(&creation.detail),
        StatusCode::CREATED,
    ))
}

pub async fn get(
    group_id: GroupId,
    user_id: UserId,
    ctx: Arc<RealtimeContext>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let detail = ctx
        .services
        .group_service
        .get_group(user_id, group_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&detail))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
}

pub async fn update(
    group_id: GroupId,
    user_id: UserId,
    body: UpdateGroupRequest,
    ctx: Arc<RealtimeContext>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let update = ctx
        .services
        .group_service
        .update_group(
            user_id,
            group_id,
            GroupPatch {
                name: body.name,
                description: body.description,
                icon_url: body.icon_url,
            },
        )
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    if let Some(system_message) = &update.system_message {
        fan_out(&ctx, system_message).await;
    }
    Ok(warp::reply::json(&update.group))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMembersRequest {
    pub member_ids: Vec<UserId>,
}

pub async fn add_members(
    group_id: GroupId,
    user_id: UserId,
    body: AddMembersRequest,
    ctx: Arc<RealtimeContext>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let change = ctx
        .services
        .group_service
        .add_members(user_id, group_id, body.member_ids)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    fan_out(&ctx, &change.system_message).await;
    Ok(warp::reply::json(&change.added))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMemberResponse {
    pub removed: UserId,
    pub promoted_admin: Option<UserId>,
}

pub async fn remove_member(
    group_id: GroupId,
    target: UserId,
    user_id: UserId,
    ctx: Arc<RealtimeContext>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let removal = ctx
        .services
        .group_service
        .remove_member(user_id, group_id, target)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    fan_out(&ctx, &removal.system_message).await;
    Ok(warp::reply::json(&RemoveMemberResponse {
        removed: removal.removed,
        promoted_admin: removal.promoted_admin,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub role: ParticipantRole,
}

pub async fn update_role(
    group_id: GroupId,
    target: UserId,
    user_id: UserId,
    body: UpdateRoleRequest,
    ctx: Arc<RealtimeContext>,
) -> Result<impl warp::Reply, warp::Rejection> {
    ctx.services
        .group_service
        .update_role(user_id, group_id, target, body.role)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&serde_json::json!({ "success": true })))
}
