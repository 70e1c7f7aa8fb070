use crate::domain_model::{
    ChatTypingNotice, ChatTypingPayload, ConversationId, OutboundFrame, PresenceUpdate, UserId,
    frame_type,
};
use crate::server::RealtimeContext;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// A typing indicator that is not refreshed clears itself after this long.
pub const TYPING_EXPIRY: Duration = Duration::from_secs(5);

pub type TypingKey = (UserId, ConversationId);

struct TypingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// In-memory auto-expiry timers for typing indicators, keyed by
/// (user, conversation). Never persisted. The generation counter keeps a
/// stale timer that lost the re-arm race from clearing its replacement.
pub struct TypingTracker {
    timers: DashMap<TypingKey, TypingTimer>,
    seq: AtomicU64,
}

impl TypingTracker {
    pub fn new() -> Self {
        TypingTracker {
            timers: DashMap::new(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn next_generation(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Replace any existing timer for the key; the old task is aborted.
    pub fn install(&self, key: TypingKey, generation: u64, handle: JoinHandle<()>) {
        if let Some(previous) = self.timers.insert(key, TypingTimer { generation, handle }) {
            previous.handle.abort();
        }
    }

    pub fn cancel(&self, key: &TypingKey) {
        if let Some((_, timer)) = self.timers.remove(key) {
            timer.handle.abort();
        }
    }

    /// Called by an expiring timer task. True only when the slot still
    /// belongs to this generation; losers were replaced and must not fire.
    pub fn claim_expiry(&self, key: &TypingKey, generation: u64) -> bool {
        self.timers
            .remove_if(key, |_, timer| timer.generation == generation)
            .is_some()
    }

    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// chat:typing — rebroadcast to the other participants and (re)arm the
/// auto-clear timer. Non-participants broadcast nothing.
pub async fn handle_typing(ctx: &Arc<RealtimeContext>, user_id: UserId, payload: ChatTypingPayload) {
    let conversation_id = payload.conversation_id;
    let others = match participants_without(ctx, user_id, conversation_id).await {
        Some(others) => others,
        None => return,
    };

    let frame = OutboundFrame::event(
        frame_type::CHAT_TYPING,
        &ChatTypingNotice {
            conversation_id,
            user_id,
            is_typing: payload.is_typing,
        },
    );
    for &other in &others {
        ctx.hub.send_to_user(other, &frame);
    }

    let key = (user_id, conversation_id);
    if payload.is_typing {
        let generation = ctx.typing.next_generation();
        let timer_ctx = ctx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(TYPING_EXPIRY).await;
            if !timer_ctx.typing.claim_expiry(&key, generation) {
                return;
            }
            // The user may have disconnected while the timer ran.
            if !timer_ctx.hub.is_user_online(user_id) {
                return;
            }
            expire_typing(&timer_ctx, user_id, conversation_id).await;
        });
        ctx.typing.install(key, generation, handle);
    } else {
        ctx.typing.cancel(&key);
    }
}

async fn expire_typing(ctx: &Arc<RealtimeContext>, user_id: UserId, conversation_id: ConversationId) {
    // Roster re-read at fire time; membership may have changed in 5 s.
    let others = match participants_without(ctx, user_id, conversation_id).await {
        Some(others) => others,
        None => return,
    };
    let frame = OutboundFrame::event(
        frame_type::CHAT_TYPING,
        &ChatTypingNotice {
            conversation_id,
            user_id,
            is_typing: false,
        },
    );
    for &other in &others {
        ctx.hub.send_to_user(other, &frame);
    }
}

async fn participants_without(
    ctx: &Arc<RealtimeContext>,
    user_id: UserId,
    conversation_id: ConversationId,
) -> Option<Vec<UserId>> {
    match ctx
        .services
        .conversation_service
        .participant_user_ids(user_id, conversation_id)
        .await
    {
        Ok(ids) => Some(ids.into_iter().filter(|&u| u != user_id).collect()),
        Err(e) => {
            tracing::debug!(%user_id, "typing ignored: {e}");
            None
        }
    }
}

/// Authenticated-online transition: flip the store flag, then tell everyone
/// who shares a conversation. Strangers never hear presence.
pub async fn broadcast_online(ctx: &Arc<RealtimeContext>, user_id: UserId) {
    if let Err(e) = ctx.services.user_service.set_online(user_id).await {
        tracing::warn!(%user_id, "marking user online failed: {e}");
    }
    let neighbors = match ctx.services.user_service.neighbor_user_ids(user_id).await {
        Ok(neighbors) => neighbors,
        Err(e) => {
            tracing::warn!(%user_id, "presence neighbor lookup failed: {e}");
            return;
        }
    };

    let frame = OutboundFrame::event(
        frame_type::PRESENCE_UPDATE,
        &PresenceUpdate::online(user_id),
    );
    for neighbor in neighbors {
        ctx.hub.send_to_user(neighbor, &frame);
    }
}

/// Last-connection-closed transition.
pub async fn broadcast_offline(ctx: &Arc<RealtimeContext>, user_id: UserId) {
    let last_seen = match ctx.services.user_service.set_offline(user_id).await {
        Ok(last_seen) => last_seen,
        Err(e) => {
            tracing::warn!(%user_id, "marking user offline failed: {e}");
            return;
        }
    };
    let neighbors = match ctx.services.user_service.neighbor_user_ids(user_id).await {
        Ok(neighbors) => neighbors,
        Err(e) => {
            tracing::warn!(%user_id, "presence neighbor lookup failed: {e}");
            return;
        }
    };

    let frame = OutboundFrame::event(
        frame_type::PRESENCE_UPDATE,
        &PresenceUpdate::offline(user_id, last_seen),
    );
    for neighbor in neighbors {
        ctx.hub.send_to_user(neighbor, &frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::session_hub::accept_connection;
    use crate::server::testkit::{TestContextBuilder, token_for, user};
    use crate::server::ConnMessage;
    use tokio::sync::mpsc;

    async fn open_authed(
        ctx: &Arc<RealtimeContext>,
        user_id: UserId,
    ) -> (mpsc::Sender<ConnMessage>, mpsc::Receiver<ConnMessage>) {
        let (client_tx, server_rx) = mpsc::channel::<ConnMessage>(64);
        let (server_tx, mut client_rx) = mpsc::channel::<ConnMessage>(64);
        accept_connection(ctx.clone(), Box::new(server_tx), Box::new(server_rx)).await;
        let auth = format!(
            r#"{{"id":"a","type":"auth","payload":{{"token":"{}"}},"timestamp":0}}"#,
            token_for(user_id)
        );
        client_tx.send(ConnMessage::Text(auth)).await.unwrap();
        loop {
            if let ConnMessage::Text(t) = client_rx.recv().await.unwrap() {
                let v: serde_json::Value = serde_json::from_str(&t).unwrap();
                assert_eq!(v["type"], "auth:success");
                break;
            }
        }
        (client_tx, client_rx)
    }

    async fn next_typing(rx: &mut mpsc::Receiver<ConnMessage>) -> serde_json::Value {
        loop {
            if let ConnMessage::Text(t) = rx.recv().await.expect("closed") {
                let v: serde_json::Value = serde_json::from_str(&t).unwrap();
                if v["type"] == "chat:typing" {
                    return v;
                }
            }
        }
    }

    fn typing_frame(conversation: ConversationId, is_typing: bool) -> String {
        format!(
            r#"{{"id":"t","type":"chat:typing","payload":{{"conversationId":"{}","isTyping":{}}},"timestamp":0}}"#,
            conversation.0, is_typing
        )
    }

    #[tokio::test(start_paused = true)]
    async fn typing_auto_clears_after_five_seconds() {
        let alice = user(1);
        let bob = user(2);
        let conversation = ConversationId(uuid::Uuid::from_u128(99));
        let ctx = TestContextBuilder::new()
            .participants(vec![alice, bob])
            .build();

        let (alice_tx, _alice_rx) = open_authed(&ctx, alice).await;
        let (_bob_tx, mut bob_rx) = open_authed(&ctx, bob).await;

        alice_tx
            .send(ConnMessage::Text(typing_frame(conversation, true)))
            .await
            .unwrap();

        let frame = next_typing(&mut bob_rx).await;
        assert_eq!(frame["payload"]["isTyping"], true);
        assert_eq!(frame["payload"]["userId"], alice.to_string());
        assert_eq!(ctx.typing.active_count(), 1);

        tokio::time::advance(TYPING_EXPIRY + Duration::from_millis(50)).await;
        let frame = next_typing(&mut bob_rx).await;
        assert_eq!(frame["payload"]["isTyping"], false);
        assert_eq!(ctx.typing.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_stop_cancels_the_timer() {
        let alice = user(1);
        let bob = user(2);
        let conversation = ConversationId(uuid::Uuid::from_u128(99));
        let ctx = TestContextBuilder::new()
            .participants(vec![alice, bob])
            .build();

        let (alice_tx, _alice_rx) = open_authed(&ctx, alice).await;
        let (_bob_tx, mut bob_rx) = open_authed(&ctx, bob).await;

        alice_tx
            .send(ConnMessage::Text(typing_frame(conversation, true)))
            .await
            .unwrap();
        assert_eq!(next_typing(&mut bob_rx).await["payload"]["isTyping"], true);

        alice_tx
            .send(ConnMessage::Text(typing_frame(conversation, false)))
            .await
            .unwrap();
        assert_eq!(next_typing(&mut bob_rx).await["payload"]["isTyping"], false);
        assert_eq!(ctx.typing.active_count(), 0);

        // No auto-fire later: the explicit stop tore the timer down.
        tokio::time::advance(TYPING_EXPIRY * 2).await;
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_extends_the_expiry() {
        let alice = user(1);
        let bob = user(2);
        let conversation = ConversationId(uuid::Uuid::from_u128(99));
        let ctx = TestContextBuilder::new()
            .participants(vec![alice, bob])
            .build();

        let (alice_tx, _alice_rx) = open_authed(&ctx, alice).await;
        let (_bob_tx, mut bob_rx) = open_authed(&ctx, bob).await;

        alice_tx
            .send(ConnMessage::Text(typing_frame(conversation, true)))
            .await
            .unwrap();
        assert_eq!(next_typing(&mut bob_rx).await["payload"]["isTyping"], true);

        tokio::time::advance(Duration::from_secs(3)).await;
        alice_tx
            .send(ConnMessage::Text(typing_frame(conversation, true)))
            .await
            .unwrap();
        assert_eq!(next_typing(&mut bob_rx).await["payload"]["isTyping"], true);
        assert_eq!(ctx.typing.active_count(), 1);

        // 4 s after the re-arm (7 s after the first frame): still armed.
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(bob_rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(next_typing(&mut bob_rx).await["payload"]["isTyping"], false);
        assert_eq!(ctx.typing.active_count(), 0);
    }
}
