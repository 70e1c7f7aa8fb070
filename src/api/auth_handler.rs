use crate::api::error::ApiError;
use crate::domain::{LoginInput, RegisterInput};
use crate::server::ServiceRegistry;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reject;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
}

pub async fn register(
    body: RegisterRequest,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let session = services
        .auth_service
        .register(RegisterInput {
            username: body.username,
            email: body.email,
            password: body.password,
            display_name: body.display_name,
        })
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&session),
        StatusCode::CREATED,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    body: LoginRequest,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let session = services
        .auth_service
        .login(LoginInput {
            email: body.email,
            password: body.password,
        })
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&session))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    body: RefreshRequest,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let tokens = services
        .auth_service
        .refresh(&body.refresh_token)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&tokens))
}

pub async fn logout(
    body: RefreshRequest,
    services: Arc<ServiceRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    services
        .auth_service
        .logout(&body.refresh_token)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&json!({ "success": true })))
}
