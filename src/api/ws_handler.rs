use crate::server::{RealtimeContext, accept_connection};
use futures_util::StreamExt;
use std::sync::Arc;

/// Post-upgrade entry point. The socket starts unauthenticated; the hub's
/// dispatcher takes it from here (auth frame within 5 s or a 4001 close).
pub async fn join(socket: warp::ws::WebSocket, ctx: Arc<RealtimeContext>) {
    let (s2c, c2s) = socket.split();
    accept_connection(ctx, Box::new(s2c), Box::new(c2s)).await;
}
