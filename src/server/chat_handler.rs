use crate::domain::SentMessage;
use crate::domain_model::{
    ChatDelivered, ChatReceive, ChatSendPayload, ChatSent, OutboundFrame, UserId, frame_type,
};
use crate::server::dispatcher::{chat_error_code, send_frame, send_error};
use crate::server::{ConnMessage, RealtimeContext};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;

/// chat:send — persist, ACK the sender, fan out, record deliveries.
pub async fn handle_chat_send(
    ctx: &Arc<RealtimeContext>,
    sender: UserId,
    frame_id: &str,
    payload: ChatSendPayload,
    reply: &Sender<ConnMessage>,
) {
    let sent = match ctx
        .services
        .conversation_service
        .send_message(
            sender,
            payload.conversation_id,
            payload.content,
            payload.content_type,
            payload.reply_to_message_id,
        )
        .await
    {
        Ok(sent) => sent,
        Err(e) => {
            tracing::debug!(%sender, "chat:send rejected: {e}");
            send_error(reply, chat_error_code(&e), e.to_string(), Some(frame_id)).await;
            return;
        }
    };

    // The ACK carries the client's frame id both in the payload and as
    // replyTo, so optimistic local messages reconcile either way.
    let ack = OutboundFrame::reply(
        frame_type::CHAT_SENT,
        &ChatSent {
            client_message_id: frame_id.to_owned(),
            message_id: sent.record.message_id,
            timestamp: sent.record.created_at,
        },
        frame_id,
    );
    send_frame(reply, &ack).await;

    fan_out(ctx, &sent).await;
}

/// Push a persisted message to every online recipient and record DELIVERED
/// for each socket write that landed. Best-effort per recipient: one bad
/// recipient never fails the send.
pub async fn fan_out(ctx: &Arc<RealtimeContext>, sent: &SentMessage) {
    let record = &sent.record;
    let receive = OutboundFrame::event(
        frame_type::CHAT_RECEIVE,
        &ChatReceive {
            message_id: record.message_id,
            sender_id: record.sender_id,
            sender_name: sent.sender_name.clone(),
            conversation_id: record.conversation_id,
            content: record.content.clone(),
            content_type: record.content_type,
            timestamp: record.created_at,
            reply_to: sent.reply_preview.clone(),
        },
    );

    for &recipient in &sent.recipients {
        if !ctx.hub.send_to_user(recipient, &receive) {
            continue; // offline; they will pull history later
        }

        if let Err(e) = ctx
            .services
            .conversation_service
            .record_delivered(record.message_id, recipient)
            .await
        {
            tracing::warn!(%recipient, "recording delivery failed: {e}");
            continue;
        }

        let delivered = OutboundFrame::event(
            frame_type::CHAT_DELIVERED,
            &ChatDelivered {
                message_id: record.message_id,
                conversation_id: record.conversation_id,
            },
        );
        ctx.hub.send_to_user(record.sender_id, &delivered);
    }
}
