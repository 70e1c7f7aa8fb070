use crate::domain_model::{ChatReadNotice, ChatReadPayload, OutboundFrame, UserId, frame_type};
use crate::server::RealtimeContext;
use std::sync::Arc;

/// chat:read — bulk-mark READ up to the target message, then tell each
/// original sender. The marking happens in the store; a missing target is
/// silently ignored (the client may be racing a deletion).
pub async fn handle_chat_read(
    ctx: &Arc<RealtimeContext>,
    reader: UserId,
    payload: ChatReadPayload,
) {
    let targets = match ctx
        .services
        .conversation_service
        .mark_read_up_to(reader, payload.conversation_id, payload.message_id)
        .await
    {
        Ok(targets) => targets,
        Err(e) => {
            tracing::warn!(%reader, "chat:read failed: {e}");
            return;
        }
    };

    // Ascending created_at, one frame per message to its sender.
    for target in targets {
        let frame = OutboundFrame::event(
            frame_type::CHAT_READ,
            &ChatReadNotice {
                message_id: target.message_id,
                conversation_id: payload.conversation_id,
                read_by: reader,
            },
        );
        ctx.hub.send_to_user(target.sender_id, &frame);
    }
}
