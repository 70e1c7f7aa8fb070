use crate::domain::{
    AuthService, ContactService, ConversationService, GroupService, MessageService, UserService,
};
use crate::domain_model::{
    AuthFailure, CLOSE_AUTH_FAILED, CLOSE_GOING_AWAY, ConnectionId, OutboundFrame, UserId,
    frame_type,
};
use crate::server::{ConnMessage, ConnReceiver, ConnSender, TypingTracker, dispatcher, presence};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const MAILBOX_CAP: usize = 256;

/// One ticker visits every socket; a socket that missed a whole interval is
/// torn down, everyone else gets a fresh ping.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// A connection must authenticate this soon after the upgrade.
pub const AUTH_DEADLINE: Duration = Duration::from_secs(5);

pub struct ServiceRegistry {
    pub auth_service: Arc<dyn AuthService>,
    pub user_service: Arc<dyn UserService>,
    pub conversation_service: Arc<dyn ConversationService>,
    pub group_service: Arc<dyn GroupService>,
    pub message_service: Arc<dyn MessageService>,
    pub contact_service: Arc<dyn ContactService>,
}

/// Everything a realtime handler needs, built once at startup and passed
/// around explicitly.
pub struct RealtimeContext {
    pub hub: Arc<SessionHub>,
    pub services: Arc<ServiceRegistry>,
    pub typing: Arc<TypingTracker>,
}

pub struct ClientRecord {
    user_id: Mutex<Option<UserId>>,
    alive: Arc<AtomicBool>,
    control: Sender<ConnMessage>,
    mailbox: Sender<ConnMessage>,
    actor_handle: Mutex<Option<JoinHandle<()>>>,
    cancellation_token: CancellationToken,
    auth_timer: CancellationToken,
}

/// Live-session registry. The `connections` map owns every record; the
/// per-user index is derived from it and rebuilt entry by entry as
/// connections authenticate and drop.
pub struct SessionHub {
    connections: DashMap<ConnectionId, ClientRecord>,
    user_index: DashMap<UserId, HashSet<ConnectionId>>,
}

impl SessionHub {
    pub fn new() -> Self {
        SessionHub {
            connections: DashMap::new(),
            user_index: DashMap::new(),
        }
    }

    /// Bind an authenticated user to a connection. Returns whether this is
    /// the user's first live connection (i.e. they just came online), or
    /// None when the connection is already gone.
    pub fn authenticate(&self, conn_id: ConnectionId, user_id: UserId) -> Option<bool> {
        {
            let record = self.connections.get(&conn_id)?;
            if let Ok(mut slot) = record.user_id.lock() {
                *slot = Some(user_id);
            }
            record.auth_timer.cancel();
        }

        let mut entry = self.user_index.entry(user_id).or_default();
        let first = entry.is_empty();
        entry.insert(conn_id);
        Some(first)
    }

    /// Detach a connection from both indices; returns the user it carried.
    /// A still-pending auth deadline dies with the connection.
    pub fn remove(&self, conn_id: ConnectionId) -> Option<UserId> {
        let (_, record) = self.connections.remove(&conn_id)?;
        record.auth_timer.cancel();
        let user_id = record.user_id.lock().ok().and_then(|slot| *slot);

        if let Some(user_id) = user_id {
            if let Some(mut set) = self.user_index.get_mut(&user_id) {
                set.remove(&conn_id);
            }
            self.user_index.remove_if(&user_id, |_, set| set.is_empty());
        }
        user_id
    }

    pub fn user_of(&self, conn_id: ConnectionId) -> Option<UserId> {
        self.connections
            .get(&conn_id)?
            .user_id
            .lock()
            .ok()
            .and_then(|slot| *slot)
    }

    pub fn is_user_online(&self, user_id: UserId) -> bool {
        self.user_index
            .get(&user_id)
            .map(|set| !set.is_empty())
            .unwrap_or(false)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn online_user_count(&self) -> usize {
        self.user_index.len()
    }

    /// Best-effort write to every live socket of the user. A full mailbox
    /// (slow consumer) drops the frame rather than stalling the caller.
    /// Returns whether at least one socket took it.
    pub fn send_to_user(&self, user_id: UserId, frame: &OutboundFrame) -> bool {
        let conn_ids: Vec<ConnectionId> = match self.user_index.get(&user_id) {
            Some(set) => set.iter().copied().collect(),
            None => return false,
        };

        let text = frame.to_text();
        let mut delivered = false;
        for conn_id in conn_ids {
            if let Some(record) = self.connections.get(&conn_id) {
                match record.mailbox.try_send(ConnMessage::Text(text.clone())) {
                    Ok(()) => delivered = true,
                    Err(e) => {
                        tracing::debug!(%conn_id, "dropping frame for slow connection: {e}")
                    }
                }
            }
        }
        delivered
    }

    /// One heartbeat pass: terminate sockets that never answered the
    /// previous ping, re-arm everyone else.
    pub fn heartbeat_tick(&self) {
        for entry in self.connections.iter() {
            if !entry.alive.swap(false, Ordering::SeqCst) {
                tracing::debug!(conn_id = %entry.key(), "terminating unresponsive connection");
                entry.cancellation_token.cancel();
            } else {
                let _ = entry.control.try_send(ConnMessage::Ping);
            }
        }
    }

    pub fn spawn_heartbeat(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let hub = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // the immediate tick
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => hub.heartbeat_tick(),
                }
            }
        })
    }

    pub async fn shutdown(&self) {
        tracing::info!("SessionHub shutting down...");

        // Every socket gets a 1001 close; a connection whose outbound queue
        // is wedged is cancelled outright.
        for entry in self.connections.iter() {
            let close = ConnMessage::CloseWith(CLOSE_GOING_AWAY, "server shutdown".into());
            if entry.control.try_send(close).is_err() {
                entry.cancellation_token.cancel();
            }
        }

        let mut handles = Vec::new();
        for entry in self.connections.iter() {
            if let Ok(mut lock) = entry.actor_handle.lock() {
                if let Some(handle) = lock.take() {
                    handles.push(handle);
                }
            }
        }
        for handle in handles {
            let _ = handle.await;
        }

        tracing::info!("all connection actors shut down");
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Register a fresh (unauthenticated) socket and start its actor. The auth
/// deadline is armed here and cancelled by `SessionHub::authenticate`.
pub async fn accept_connection(
    ctx: Arc<RealtimeContext>,
    s2c_channel: Box<dyn ConnSender>,
    c2s_channel: Box<dyn ConnReceiver>,
) -> ConnectionId {
    let hub = ctx.hub.clone();
    let conn_id = ConnectionId::new();

    let (control_tx, control_rx) = tokio::sync::mpsc::channel(MAILBOX_CAP);
    let (mailbox_tx, mailbox_rx) = tokio::sync::mpsc::channel(MAILBOX_CAP);
    let actor_cancel = CancellationToken::new();
    let auth_timer = CancellationToken::new();
    let alive = Arc::new(AtomicBool::new(true));
    let notify = Arc::new(Notify::new());

    let actor_handle = tokio::spawn(client_actor(
        ctx.clone(),
        conn_id,
        s2c_channel,
        c2s_channel,
        control_tx.clone(),
        control_rx,
        mailbox_rx,
        alive.clone(),
        actor_cancel.clone(),
        notify.clone(),
    ));

    let record = ClientRecord {
        user_id: Mutex::new(None),
        alive,
        control: control_tx.clone(),
        mailbox: mailbox_tx,
        actor_handle: Mutex::new(Some(actor_handle)),
        cancellation_token: actor_cancel,
        auth_timer: auth_timer.clone(),
    };
    hub.connections.insert(conn_id, record);
    notify.notify_one();

    tokio::spawn(async move {
        tokio::select! {
            _ = auth_timer.cancelled() => {}
            _ = tokio::time::sleep(AUTH_DEADLINE) => {
                tracing::debug!(%conn_id, "authentication deadline expired");
                let frame = OutboundFrame::event(
                    frame_type::AUTH_ERROR,
                    &AuthFailure {
                        message: "Authentication timeout".into(),
                    },
                );
                let _ = control_tx.send(ConnMessage::Text(frame.to_text())).await;
                let _ = control_tx
                    .send(ConnMessage::CloseWith(
                        CLOSE_AUTH_FAILED,
                        "authentication timeout".into(),
                    ))
                    .await;
            }
        }
    });

    conn_id
}

#[allow(clippy::too_many_arguments)]
async fn client_actor(
    ctx: Arc<RealtimeContext>,
    conn_id: ConnectionId,
    s2c_channel: Box<dyn ConnSender>,
    c2s_channel: Box<dyn ConnReceiver>,
    control_tx: Sender<ConnMessage>,
    control_rx: Receiver<ConnMessage>,
    mailbox_rx: Receiver<ConnMessage>,
    alive: Arc<AtomicBool>,
    actor_cancel: CancellationToken,
    notify: Arc<Notify>,
) {
    notify.notified().await;
    tracing::debug!(%conn_id, "connection actor starting");

    let sender_handle = tokio::spawn(outbound_sender(
        s2c_channel,
        control_rx,
        mailbox_rx,
        actor_cancel.clone(),
    ));

    let receiver_handle = tokio::spawn(inbound_receiver(
        ctx.clone(),
        conn_id,
        c2s_channel,
        control_tx,
        alive,
        actor_cancel.clone(),
    ));

    tokio::select! {
        _ = sender_handle => {
            tracing::trace!(%conn_id, "sender task ended first");
        },
        _ = receiver_handle => {
            tracing::trace!(%conn_id, "receiver task ended first");
        }
    }
    actor_cancel.cancel();

    // Detach from the hub; the last connection to go takes the user offline.
    if let Some(user_id) = ctx.hub.remove(conn_id) {
        if !ctx.hub.is_user_online(user_id) {
            presence::broadcast_offline(&ctx, user_id).await;
        }
    }
    tracing::debug!(%conn_id, "connection actor finished");
}

async fn outbound_sender(
    mut s2c_channel: Box<dyn ConnSender>,
    mut control_rx: Receiver<ConnMessage>,
    mut mailbox_rx: Receiver<ConnMessage>,
    actor_cancel: CancellationToken,
) {
    while let Some(msg) = tokio::select! {
        biased;
        _ = actor_cancel.cancelled() => None,
        m = control_rx.recv() => m,
        m = mailbox_rx.recv() => m,
    } {
        tracing::trace!("outbound_sender: {:?}", msg);
        let closing = matches!(msg, ConnMessage::Close | ConnMessage::CloseWith(..));
        if s2c_channel.send(msg).await.is_err() || closing {
            actor_cancel.cancel();
            break;
        }
    }
}

/// Inbound frames are handled one at a time: a send is fully persisted and
/// acknowledged before the next frame of the same connection is looked at,
/// which is what keeps per-connection ACK order aligned with persist order.
async fn inbound_receiver(
    ctx: Arc<RealtimeContext>,
    conn_id: ConnectionId,
    mut c2s_channel: Box<dyn ConnReceiver>,
    control_tx: Sender<ConnMessage>,
    alive: Arc<AtomicBool>,
    actor_cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = actor_cancel.cancelled() => {
                tracing::trace!(%conn_id, "receiver shutdown by cancel");
                break;
            },

            maybe_message = c2s_channel.next() => {
                let conn_msg = match maybe_message {
                    Some(Ok(m)) => m,
                    Some(Err(_)) | None => break, // low-level error or closed
                };

                match conn_msg {
                    ConnMessage::Text(text) => {
                        dispatcher::dispatch_frame(&ctx, conn_id, &text, &control_tx).await;
                    }
                    ConnMessage::Ping => {
                        let _ = control_tx.send(ConnMessage::Pong).await;
                    }
                    ConnMessage::Pong => {
                        alive.store(true, Ordering::SeqCst);
                    }
                    ConnMessage::Binary(_) => {
                        tracing::debug!(%conn_id, "ignoring binary frame");
                    }
                    ConnMessage::Close | ConnMessage::CloseWith(..) => break,
                }
            }
        }
    }
    actor_cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::testkit::{test_context, TEST_TOKEN, test_user_id};
    use tokio::sync::mpsc;

    /// A fake socket: we keep the far ends of both channels.
    async fn open_connection(
        ctx: &Arc<RealtimeContext>,
    ) -> (
        ConnectionId,
        mpsc::Sender<ConnMessage>,
        mpsc::Receiver<ConnMessage>,
    ) {
        let (client_tx, server_rx) = mpsc::channel::<ConnMessage>(64);
        let (server_tx, client_rx) = mpsc::channel::<ConnMessage>(64);
        let conn_id =
            accept_connection(ctx.clone(), Box::new(server_tx), Box::new(server_rx)).await;
        (conn_id, client_tx, client_rx)
    }

    async fn next_text(client_rx: &mut mpsc::Receiver<ConnMessage>) -> serde_json::Value {
        loop {
            match client_rx.recv().await.expect("connection closed") {
                ConnMessage::Text(t) => return serde_json::from_str(&t).unwrap(),
                _ => continue,
            }
        }
    }

    fn auth_frame() -> String {
        format!(
            r#"{{"id":"a1","type":"auth","payload":{{"token":"{TEST_TOKEN}"}},"timestamp":0}}"#
        )
    }

    #[tokio::test]
    async fn authenticate_indexes_connection_by_user() {
        let ctx = test_context();
        let (conn_id, client_tx, mut client_rx) = open_connection(&ctx).await;

        assert_eq!(ctx.hub.connection_count(), 1);
        assert!(ctx.hub.user_of(conn_id).is_none());

        client_tx
            .send(ConnMessage::Text(auth_frame()))
            .await
            .unwrap();
        let reply = next_text(&mut client_rx).await;
        assert_eq!(reply["type"], "auth:success");
        assert_eq!(reply["replyTo"], "a1");

        assert_eq!(ctx.hub.user_of(conn_id), Some(test_user_id()));
        assert!(ctx.hub.is_user_online(test_user_id()));
        assert_eq!(ctx.hub.online_user_count(), 1);
    }

    #[tokio::test]
    async fn multi_device_send_reaches_every_socket() {
        let ctx = test_context();
        let (_c1, tx1, mut rx1) = open_connection(&ctx).await;
        let (_c2, tx2, mut rx2) = open_connection(&ctx).await;

        tx1.send(ConnMessage::Text(auth_frame())).await.unwrap();
        tx2.send(ConnMessage::Text(auth_frame())).await.unwrap();
        next_text(&mut rx1).await;
        next_text(&mut rx2).await;

        assert_eq!(ctx.hub.connection_count(), 2);
        assert_eq!(ctx.hub.online_user_count(), 1);

        let frame = OutboundFrame::event(
            frame_type::PRESENCE_UPDATE,
            &crate::domain_model::PresenceUpdate::online(test_user_id()),
        );
        assert!(ctx.hub.send_to_user(test_user_id(), &frame));
        assert_eq!(next_text(&mut rx1).await["type"], "presence:update");
        assert_eq!(next_text(&mut rx2).await["type"], "presence:update");

        assert!(!ctx.hub.send_to_user(UserId::new(), &frame));
    }

    #[tokio::test]
    async fn closing_last_connection_takes_user_offline() {
        let ctx = test_context();
        let (conn1, tx1, mut rx1) = open_connection(&ctx).await;
        let (conn2, tx2, mut rx2) = open_connection(&ctx).await;
        tx1.send(ConnMessage::Text(auth_frame())).await.unwrap();
        tx2.send(ConnMessage::Text(auth_frame())).await.unwrap();
        next_text(&mut rx1).await;
        next_text(&mut rx2).await;

        drop(tx1); // first device goes away
        while ctx.hub.connection_count() == 2 {
            tokio::task::yield_now().await;
        }
        assert!(ctx.hub.is_user_online(test_user_id()));
        assert!(ctx.hub.user_of(conn1).is_none());

        drop(tx2);
        while ctx.hub.connection_count() > 0 {
            tokio::task::yield_now().await;
        }
        assert!(!ctx.hub.is_user_online(test_user_id()));
        assert!(ctx.hub.user_of(conn2).is_none());
        assert_eq!(ctx.hub.online_user_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthenticated_connection_is_closed_with_4001() {
        let ctx = test_context();
        let (_conn, _client_tx, mut client_rx) = open_connection(&ctx).await;

        tokio::time::advance(AUTH_DEADLINE + Duration::from_millis(10)).await;

        let frame = next_text(&mut client_rx).await;
        assert_eq!(frame["type"], "auth:error");

        // After the error the hub closes with the auth application code.
        loop {
            match client_rx.recv().await.expect("expected close") {
                ConnMessage::CloseWith(code, _) => {
                    assert_eq!(code, CLOSE_AUTH_FAILED);
                    break;
                }
                _ => continue,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn authentication_cancels_the_deadline() {
        let ctx = test_context();
        let (_conn, client_tx, mut client_rx) = open_connection(&ctx).await;

        client_tx
            .send(ConnMessage::Text(auth_frame()))
            .await
            .unwrap();
        assert_eq!(next_text(&mut client_rx).await["type"], "auth:success");

        tokio::time::advance(AUTH_DEADLINE * 3).await;
        // Nothing else must arrive; the deadline task is gone.
        assert!(client_rx.try_recv().is_err());
        assert_eq!(ctx.hub.connection_count(), 1);
    }

    #[tokio::test]
    async fn heartbeat_pings_live_and_reaps_silent_connections() {
        let ctx = test_context();
        let (conn_id, client_tx, mut client_rx) = open_connection(&ctx).await;
        client_tx
            .send(ConnMessage::Text(auth_frame()))
            .await
            .unwrap();
        next_text(&mut client_rx).await;

        // First pass: alive flag was true, so the hub clears it and pings.
        ctx.hub.heartbeat_tick();
        loop {
            match client_rx.recv().await.unwrap() {
                ConnMessage::Ping => break,
                _ => continue,
            }
        }

        // Client answers; the flag flips back and the next pass pings again.
        client_tx.send(ConnMessage::Pong).await.unwrap();
        while !ctx
            .hub
            .connections
            .get(&conn_id)
            .map(|r| r.alive.load(Ordering::SeqCst))
            .unwrap_or(false)
        {
            tokio::task::yield_now().await;
        }
        ctx.hub.heartbeat_tick();
        assert_eq!(ctx.hub.connection_count(), 1);

        // No pong this time: the second pass reaps the connection.
        ctx.hub.heartbeat_tick();
        while ctx.hub.connection_count() > 0 {
            tokio::task::yield_now().await;
        }
        assert!(!ctx.hub.is_user_online(test_user_id()));
    }
}
