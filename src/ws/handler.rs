//! WebSocket upgrade handler for dashboard viewers

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::util::rate_limit::ViewerRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before taking the snapshot so no tick falls between the two.
    // Updates queued in that window are dropped by the writer.
    let updates_rx = state.broadcaster.subscribe();
    info!(viewers = state.broadcaster.viewer_count(), "Viewer connected");

    let snapshot = state.world.snapshot();
    let initial_tick = snapshot.tick;
    if let Err(e) = send_msg(&mut ws_sink, &ServerMsg::StateSnapshot(snapshot)).await {
        error!(error = %e, "Failed to send initial snapshot");
        return;
    }

    run_session(&state, ws_sink, ws_stream, updates_rx, initial_tick).await;

    info!("Viewer disconnected");
}

/// Run the viewer session with read/write split
async fn run_session(
    state: &AppState,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut updates_rx: broadcast::Receiver<ServerMsg>,
    initial_tick: u64,
) {
    let rate_limiter = ViewerRateLimiter::new();

    // Writer task: broadcast snapshots -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match updates_rx.recv().await {
                Ok(msg) if is_stale_update(&msg, initial_tick) => {
                    debug!("Skipping update already covered by the initial snapshot");
                }
                Ok(msg) => {
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_count = n, "Viewer lagged, skipping {} updates", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Update channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> world
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!("Rate limited viewer message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => handle_client_msg(state, msg),
                    Err(e) => warn!(error = %e, "Failed to parse viewer message"),
                }
            }
            Ok(Message::Binary(_)) => {
                warn!("Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                debug!("Viewer initiated close");
                break;
            }
            Err(e) => {
                error!(error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Apply one viewer request. Unknown or blank player ids are ignored.
pub fn handle_client_msg(state: &AppState, msg: ClientMsg) {
    match msg {
        ClientMsg::ResetScore(reset) => {
            let player_id = reset.player_id.trim();
            if player_id.is_empty() {
                return;
            }

            match state.world.reset_score(player_id) {
                Some(snapshot) => {
                    info!(player_id = %player_id, "Score reset");
                    state.broadcaster.send(ServerMsg::StateUpdate(snapshot));
                }
                None => debug!(player_id = %player_id, "Score reset for unknown player ignored"),
            }
        }
    }
}

/// An update no newer than the snapshot a viewer was greeted with
fn is_stale_update(msg: &ServerMsg, initial_tick: u64) -> bool {
    match msg {
        ServerMsg::StateUpdate(snapshot) => snapshot.tick <= initial_tick,
        ServerMsg::StateSnapshot(_) => false,
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
