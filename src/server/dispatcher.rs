use crate::domain_model::{
    AuthFailure, AuthPayload, AuthSuccess, CLOSE_AUTH_FAILED, ChatReadPayload, ChatSendPayload,
    ChatTypingPayload, ConnectionId, ErrorBody, InboundFrame, OutboundFrame, frame_type,
};
use crate::server::{
    ConnMessage, RealtimeContext, chat_handler, presence, receipt_handler,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;

// Error frame codes surfaced over the socket.
pub const ERR_INVALID_MESSAGE: &str = "INVALID_MESSAGE";
pub const ERR_NOT_AUTHENTICATED: &str = "NOT_AUTHENTICATED";
pub const ERR_INVALID_PAYLOAD: &str = "INVALID_PAYLOAD";
pub const ERR_UNKNOWN_TYPE: &str = "UNKNOWN_TYPE";
pub const ERR_SEND_FAILED: &str = "SEND_FAILED";
pub const ERR_NOT_FOUND: &str = "NOT_FOUND";

pub(crate) async fn send_frame(reply: &Sender<ConnMessage>, frame: &OutboundFrame) {
    let _ = reply.send(ConnMessage::Text(frame.to_text())).await;
}

pub(crate) async fn send_error(
    reply: &Sender<ConnMessage>,
    code: &'static str,
    message: impl Into<String>,
    reply_to: Option<&str>,
) {
    let body = ErrorBody {
        code,
        message: message.into(),
    };
    let frame = match reply_to {
        Some(id) => OutboundFrame::reply(frame_type::ERROR, &body, id),
        None => OutboundFrame::event(frame_type::ERROR, &body),
    };
    send_frame(reply, &frame).await;
}

fn decode<T: DeserializeOwned>(payload: serde_json::Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(payload)
}

/// Inbound frame pipeline: parse, envelope shape, auth gate, per-type
/// payload schema, route. Each stage answers with its own error code and
/// echoes the client frame id where it is known.
pub async fn dispatch_frame(
    ctx: &Arc<RealtimeContext>,
    conn_id: ConnectionId,
    text: &str,
    reply: &Sender<ConnMessage>,
) {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(_) => {
            send_error(reply, ERR_INVALID_MESSAGE, "Malformed frame", None).await;
            return;
        }
    };
    if !frame.envelope_is_valid() {
        send_error(reply, ERR_INVALID_MESSAGE, "Malformed frame envelope", None).await;
        return;
    }

    let authed = ctx.hub.user_of(conn_id);
    if authed.is_none() && frame.kind != frame_type::AUTH {
        send_error(
            reply,
            ERR_NOT_AUTHENTICATED,
            "Authentication required",
            Some(&frame.id),
        )
        .await;
        return;
    }

    match frame.kind.as_str() {
        frame_type::AUTH => match decode::<AuthPayload>(frame.payload) {
            Ok(payload) => handle_auth(ctx, conn_id, &frame.id, payload, reply).await,
            Err(_) => send_error(reply, ERR_INVALID_PAYLOAD, "Invalid payload", Some(&frame.id)).await,
        },
        frame_type::CHAT_SEND => {
            let Some(user_id) = authed else { return };
            match decode::<ChatSendPayload>(frame.payload) {
                Ok(payload) => {
                    chat_handler::handle_chat_send(ctx, user_id, &frame.id, payload, reply).await
                }
                Err(_) => {
                    send_error(reply, ERR_INVALID_PAYLOAD, "Invalid payload", Some(&frame.id)).await
                }
            }
        }
        frame_type::CHAT_READ => {
            let Some(user_id) = authed else { return };
            match decode::<ChatReadPayload>(frame.payload) {
                Ok(payload) => receipt_handler::handle_chat_read(ctx, user_id, payload).await,
                Err(_) => {
                    send_error(reply, ERR_INVALID_PAYLOAD, "Invalid payload", Some(&frame.id)).await
                }
            }
        }
        frame_type::CHAT_TYPING => {
            let Some(user_id) = authed else { return };
            match decode::<ChatTypingPayload>(frame.payload) {
                Ok(payload) => presence::handle_typing(ctx, user_id, payload).await,
                Err(_) => {
                    send_error(reply, ERR_INVALID_PAYLOAD, "Invalid payload", Some(&frame.id)).await
                }
            }
        }
        unknown => {
            send_error(
                reply,
                ERR_UNKNOWN_TYPE,
                format!("Unknown frame type: {unknown}"),
                Some(&frame.id),
            )
            .await;
        }
    }
}

async fn handle_auth(
    ctx: &Arc<RealtimeContext>,
    conn_id: ConnectionId,
    frame_id: &str,
    payload: AuthPayload,
    reply: &Sender<ConnMessage>,
) {
    let claims = match ctx.services.auth_service.verify_access(&payload.token).await {
        Ok(claims) => claims,
        Err(e) => {
            let frame = OutboundFrame::reply(
                frame_type::AUTH_ERROR,
                &AuthFailure {
                    message: e.to_string(),
                },
                frame_id,
            );
            send_frame(reply, &frame).await;
            let _ = reply
                .send(ConnMessage::CloseWith(
                    CLOSE_AUTH_FAILED,
                    "invalid token".into(),
                ))
                .await;
            return;
        }
    };

    let first_connection = match ctx.hub.authenticate(conn_id, claims.user_id) {
        Some(first) => first,
        None => return, // connection already gone
    };

    let frame = OutboundFrame::reply(
        frame_type::AUTH_SUCCESS,
        &AuthSuccess {
            user_id: claims.user_id,
        },
        frame_id,
    );
    send_frame(reply, &frame).await;

    // Only the first device of a user flips them online; further devices
    // attach silently.
    if first_connection {
        presence::broadcast_online(ctx, claims.user_id).await;
    }
}

/// Error-frame mapping for the send path.
pub(crate) fn chat_error_code(e: &crate::domain::ChatError) -> &'static str {
    use crate::domain::ChatError;
    match e {
        ChatError::Validation(_) => ERR_INVALID_PAYLOAD,
        ChatError::NotParticipant | ChatError::Blocked => ERR_SEND_FAILED,
        ChatError::ConversationNotFound
        | ChatError::MessageNotFound
        | ChatError::UserNotFound => ERR_NOT_FOUND,
        ChatError::Store(_) => ERR_SEND_FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::session_hub::accept_connection;
    use crate::server::testkit::{TEST_TOKEN, test_context};
    use tokio::sync::mpsc;

    async fn open(
        ctx: &Arc<RealtimeContext>,
    ) -> (mpsc::Sender<ConnMessage>, mpsc::Receiver<ConnMessage>) {
        let (client_tx, server_rx) = mpsc::channel::<ConnMessage>(64);
        let (server_tx, client_rx) = mpsc::channel::<ConnMessage>(64);
        accept_connection(ctx.clone(), Box::new(server_tx), Box::new(server_rx)).await;
        (client_tx, client_rx)
    }

    async fn next_json(rx: &mut mpsc::Receiver<ConnMessage>) -> serde_json::Value {
        loop {
            match rx.recv().await.expect("connection closed") {
                ConnMessage::Text(t) => return serde_json::from_str(&t).unwrap(),
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn malformed_json_yields_invalid_message() {
        let ctx = test_context();
        let (tx, mut rx) = open(&ctx).await;
        tx.send(ConnMessage::Text("{not json".into())).await.unwrap();
        let frame = next_json(&mut rx).await;
        assert_eq!(frame["type"], "error");
        assert_eq!(frame["payload"]["code"], ERR_INVALID_MESSAGE);
        assert!(frame.get("replyTo").is_none());
    }

    #[tokio::test]
    async fn unauthenticated_frames_are_gated() {
        let ctx = test_context();
        let (tx, mut rx) = open(&ctx).await;
        tx.send(ConnMessage::Text(
            r#"{"id":"c9","type":"chat:typing","payload":{"conversationId":"00000000-0000-0000-0000-000000000009","isTyping":true},"timestamp":0}"#.into(),
        ))
        .await
        .unwrap();
        let frame = next_json(&mut rx).await;
        assert_eq!(frame["payload"]["code"], ERR_NOT_AUTHENTICATED);
        assert_eq!(frame["replyTo"], "c9");
    }

    #[tokio::test]
    async fn unknown_type_and_bad_payload_are_rejected() {
        let ctx = test_context();
        let (tx, mut rx) = open(&ctx).await;
        tx.send(ConnMessage::Text(format!(
            r#"{{"id":"a1","type":"auth","payload":{{"token":"{TEST_TOKEN}"}},"timestamp":0}}"#
        )))
        .await
        .unwrap();
        assert_eq!(next_json(&mut rx).await["type"], "auth:success");

        tx.send(ConnMessage::Text(
            r#"{"id":"c2","type":"chat:shout","payload":{},"timestamp":0}"#.into(),
        ))
        .await
        .unwrap();
        let frame = next_json(&mut rx).await;
        assert_eq!(frame["payload"]["code"], ERR_UNKNOWN_TYPE);
        assert_eq!(frame["replyTo"], "c2");

        // chat:send without a conversationId fails the payload schema.
        tx.send(ConnMessage::Text(
            r#"{"id":"c3","type":"chat:send","payload":{"content":"hi"},"timestamp":0}"#.into(),
        ))
        .await
        .unwrap();
        let frame = next_json(&mut rx).await;
        assert_eq!(frame["payload"]["code"], ERR_INVALID_PAYLOAD);
        assert_eq!(frame["replyTo"], "c3");
    }

    #[tokio::test]
    async fn invalid_token_closes_with_4001() {
        let ctx = test_context();
        let (tx, mut rx) = open(&ctx).await;
        tx.send(ConnMessage::Text(
            r#"{"id":"a1","type":"auth","payload":{"token":"garbage"},"timestamp":0}"#.into(),
        ))
        .await
        .unwrap();
        let frame = next_json(&mut rx).await;
        assert_eq!(frame["type"], "auth:error");
        loop {
            match rx.recv().await.expect("expected close") {
                ConnMessage::CloseWith(code, _) => {
                    assert_eq!(code, CLOSE_AUTH_FAILED);
                    break;
                }
                _ => continue,
            }
        }
    }
}
