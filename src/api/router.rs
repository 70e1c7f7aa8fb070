use super::error::ApiError;
use super::{
    auth_handler, contact_handler, conversation_handler, group_handler, message_handler,
    user_handler, ws_handler,
};
use crate::api::error::ErrorKind;
use crate::domain::AuthService;
use crate::domain_model::UserId;
use crate::server::{RealtimeContext, Server, ServiceRegistry};
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, reject};

/// Full route tree: `/health` unauthenticated, everything else under `/api`.
pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let health = warp::get()
        .and(warp::path!("health"))
        .and(with(server.clone()))
        .and_then(health);

    let api = warp::path("api").and(
        auth_routes(server.services.clone())
            .or(user_routes(server.services.clone()))
            .or(conversation_routes(server.services.clone()))
            .or(group_routes(server.realtime.clone(), server.services.clone()))
            .or(message_routes(server.realtime.clone(), server.services.clone()))
            .or(contact_routes(server.services.clone()))
            .or(ws_route(server.realtime.clone())),
    );

    health.or(api)
}

async fn health(server: Arc<Server>) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&server.health()))
}

fn auth_routes(
    services: Arc<ServiceRegistry>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let register = warp::post()
        .and(warp::path!("auth" / "register"))
        .and(warp::body::json())
        .and(with(services.clone()))
        .and_then(auth_handler::register);

    let login = warp::post()
        .and(warp::path!("auth" / "login"))
        .and(warp::body::json())
        .and(with(services.clone()))
        .and_then(auth_handler::login);

    let refresh = warp::post()
        .and(warp::path!("auth" / "refresh"))
        .and(warp::body::json())
        .and(with(services.clone()))
        .and_then(auth_handler::refresh);

    let logout = warp::post()
        .and(warp::path!("auth" / "logout"))
        .and(warp::body::json())
        .and(with(services))
        .and_then(auth_handler::logout);

    register.or(login).or(refresh).or(logout)
}

fn user_routes(
    services: Arc<ServiceRegistry>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let me = warp::get()
        .and(warp::path!("users" / "me"))
        .and(with_verification(services.auth_service.clone()))
        .and(with(services.clone()))
        .and_then(user_handler::me);

    let update_me = warp::put()
        .and(warp::path!("users" / "me"))
        .and(with_verification(services.auth_service.clone()))
        .and(warp::body::json())
        .and(with(services.clone()))
        .and_then(user_handler::update_me);

    let search = warp::get()
        .and(warp::path!("users" / "search"))
        .and(warp::query())
        .and(with_verification(services.auth_service.clone()))
        .and(with(services.clone()))
        .and_then(user_handler::search);

    let get_user = warp::get()
        .and(warp::path!("users" / UserId))
        .and(with_verification(services.auth_service.clone()))
        .and(with(services))
        .and_then(user_handler::get_user);

    // `users/search` must win over the `users/:id` parameter match.
    me.or(update_me).or(search).or(get_user)
}

fn conversation_routes(
    services: Arc<ServiceRegistry>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    use crate::domain_model::ConversationId;

    let create_direct = warp::post()
        .and(warp::path!("conversations" / "direct"))
        .and(with_verification(services.auth_service.clone()))
        .and(warp::body::json())
        .and(with(services.clone()))
        .and_then(conversation_handler::create_direct);

    let list = warp::get()
        .and(warp::path!("conversations"))
        .and(with_verification(services.auth_service.clone()))
        .and(with(services.clone()))
        .and_then(conversation_handler::list);

    let get = warp::get()
        .and(warp::path!("conversations" / ConversationId))
        .and(with_verification(services.auth_service.clone()))
        .and(with(services.clone()))
        .and_then(conversation_handler::get);

    let messages = warp::get()
        .and(warp::path!("conversations" / ConversationId / "messages"))
        .and(warp::query())
        .and(with_verification(services.auth_service.clone()))
        .and(with(services))
        .and_then(conversation_handler::messages);

    create_direct.or(list).or(messages).or(get)
}

fn group_routes(
    realtime: Arc<RealtimeContext>,
    services: Arc<ServiceRegistry>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    use crate::domain_model::GroupId;

    let create = warp::post()
        .and(warp::path!("groups"))
        .and(with_verification(services.auth_service.clone()))
        .and(warp::body::json())
        .and(with(realtime.clone()))
        .and_then(group_handler::create);

    let get = warp::get()
        .and(warp::path!("groups" / GroupId))
        .and(with_verification(services.auth_service.clone()))
        .and(with(realtime.clone()))
        .and_then(group_handler::get);

    let update = warp::put()
        .and(warp::path!("groups" / GroupId))
        .and(with_verification(services.auth_service.clone()))
        .and(warp::body::json())
        .and(with(realtime.clone()))
        .and_then(group_handler::update);

    let add_members = warp::post()
        .and(warp::path!("groups" / GroupId / "members"))
        .and(with_verification(services.auth_service.clone()))
        .and(warp::body::json())
        .and(with(realtime.clone()))
        .and_then(group_handler::add_members);

    let remove_member = warp::delete()
        .and(warp::path!("groups" / GroupId / "members" / UserId))
        .and(with_verification(services.auth_service.clone()))
        .and(with(realtime.clone()))
        .and_then(group_handler::remove_member);

    let update_role = warp::put()
        .and(warp::path!("groups" / GroupId / "members" / UserId / "role"))
        .and(with_verification(services.auth_service.clone()))
        .and(warp::body::json())
        .and(with(realtime))
        .and_then(group_handler::update_role);

    create
        .or(get)
        .or(update)
        .or(add_members)
        .or(remove_member)
        .or(update_role)
}

fn message_routes(
    realtime: Arc<RealtimeContext>,
    services: Arc<ServiceRegistry>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    use crate::domain_model::MessageId;

    let edit = warp::put()
        .and(warp::path!("messages" / MessageId))
        .and(with_verification(services.auth_service.clone()))
        .and(warp::body::json())
        .and(with(realtime.clone()))
        .and_then(message_handler::edit);

    let delete = warp::delete()
        .and(warp::path!("messages" / MessageId))
        .and(with_verification(services.auth_service.clone()))
        .and(with(realtime.clone()))
        .and_then(message_handler::delete);

    let forward = warp::post()
        .and(warp::path!("messages" / "forward"))
        .and(with_verification(services.auth_service.clone()))
        .and(warp::body::json())
        .and(with(realtime.clone()))
        .and_then(message_handler::forward);

    let search = warp::get()
        .and(warp::path!("messages" / "search"))
        .and(warp::query())
        .and(with_verification(services.auth_service.clone()))
        .and(with(realtime.clone()))
        .and_then(message_handler::search);

    let unread = warp::get()
        .and(warp::path!("notifications" / "unread"))
        .and(with_verification(services.auth_service.clone()))
        .and(with(realtime))
        .and_then(message_handler::unread);

    forward.or(search).or(edit).or(delete).or(unread)
}

fn contact_routes(
    services: Arc<ServiceRegistry>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let add = warp::post()
        .and(warp::path!("contacts"))
        .and(with_verification(services.auth_service.clone()))
        .and(warp::body::json())
        .and(with(services.clone()))
        .and_then(contact_handler::add_contact);

    let list = warp::get()
        .and(warp::path!("contacts"))
        .and(with_verification(services.auth_service.clone()))
        .and(with(services.clone()))
        .and_then(contact_handler::list_contacts);

    let remove = warp::delete()
        .and(warp::path!("contacts" / UserId))
        .and(with_verification(services.auth_service.clone()))
        .and(with(services.clone()))
        .and_then(contact_handler::remove_contact);

    let block = warp::post()
        .and(warp::path!("blocks"))
        .and(with_verification(services.auth_service.clone()))
        .and(warp::body::json())
        .and(with(services.clone()))
        .and_then(contact_handler::block);

    let unblock = warp::delete()
        .and(warp::path!("blocks" / UserId))
        .and(with_verification(services.auth_service.clone()))
        .and(with(services.clone()))
        .and_then(contact_handler::unblock);

    let list_blocks = warp::get()
        .and(warp::path!("blocks"))
        .and(with_verification(services.auth_service.clone()))
        .and(with(services))
        .and_then(contact_handler::list_blocks);

    add.or(list).or(remove).or(block).or(unblock).or(list_blocks)
}

fn ws_route(
    realtime: Arc<RealtimeContext>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::get()
        .and(warp::path!("ws"))
        .and(warp::ws())
        .and(with(realtime))
        .map(|ws: warp::ws::Ws, ctx: Arc<RealtimeContext>| {
            ws.on_upgrade(move |socket| ws_handler::join(socket, ctx))
        })
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Bearer access-token gate; extracts the authenticated user id.
fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (UserId,), Error = warp::Rejection> + Clone {
    warp::header::<String>(warp::http::header::AUTHORIZATION.as_ref()).and_then(
        move |header: String| {
            let auth_service = auth_service.clone();
            async move {
                let Some(token) = header.strip_prefix("Bearer ") else {
                    return Err(reject::custom(ApiError::new(
                        ErrorKind::Authentication,
                        "Invalid authorization header",
                    )));
                };
                let claims = auth_service
                    .verify_access(token)
                    .await
                    .map_err(ApiError::from)
                    .map_err(reject::custom)?;
                Ok::<UserId, warp::Rejection>(claims.user_id)
            }
        },
    )
}
