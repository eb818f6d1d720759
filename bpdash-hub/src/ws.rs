/**
 * STATE-SYNC CHANNEL ENDPOINT - one WebSocket per viewer
 *
 * Inbound text frames are commands, handed to the SyncHub. Outbound frames
 * are the deltas the hub broadcasts, the viewer's own included. A viewer
 * that falls behind the broadcast buffer is closed with code 1013: it has
 * missed deltas and can only recover by reloading.
 */

use crate::hub::SyncHub;
use crate::state::AppState;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use bpdash_core::Command;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_viewer(socket, app.hub))
}

async fn serve_viewer(socket: WebSocket, hub: SyncHub) {
    let viewer = Uuid::new_v4();
    // subscribe before counting the viewer so nothing applied after it shows
    // up as connected can be missed
    let mut deltas = hub.subscribe();
    hub.health_tracker().viewer_connected();
    info!(target: "hub", "viewer {viewer} connected");

    let (mut sink, mut stream) = socket.split();
    let reason = loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => handle_command(&hub, viewer, text.as_str()),
                Some(Ok(Message::Close(_))) | None => break "closed by viewer".to_string(),
                Some(Ok(_)) => {}
                Some(Err(e)) => break format!("read error: {e}"),
            },
            outbound = deltas.recv() => match outbound {
                Ok(delta) => {
                    let text = match serde_json::to_string(&delta) {
                        Ok(text) => text,
                        Err(e) => {
                            error!(target: "hub", "cannot encode delta: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        break format!("write error: {e}");
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    let reason = format!("viewer lagged behind by {missed} deltas");
                    let frame = CloseFrame {
                        code: close_code::AGAIN,
                        reason: reason.clone().into(),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    break reason;
                }
                Err(RecvError::Closed) => break "hub shutting down".to_string(),
            },
        }
    };

    hub.health_tracker().viewer_disconnected();
    info!(target: "hub", "viewer {viewer} disconnected: {reason}");
}

fn handle_command(hub: &SyncHub, viewer: Uuid, text: &str) {
    match serde_json::from_str::<Command>(text) {
        Ok(cmd) => {
            debug!(target: "hub", "viewer {viewer} -> {}/{}", cmd.env, cmd.key());
            // rejections are logged and counted by the hub
            let _ = hub.submit(&cmd);
        }
        Err(e) => warn!(target: "hub", "viewer {viewer} sent malformed command: {e}"),
    }
}
