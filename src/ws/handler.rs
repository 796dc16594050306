//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::rules::{PlayerConfig, ARENA_HEIGHT, ARENA_WIDTH, GROUND_Y};
use crate::game::RoomHandle;
use crate::util::rate_limit::SessionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ArenaInfo, ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn arena_info() -> ArenaInfo {
    ArenaInfo {
        width: ARENA_WIDTH,
        height: ARENA_HEIGHT,
        ground_y: GROUND_Y,
        player_width: PlayerConfig::WIDTH,
        player_height: PlayerConfig::HEIGHT,
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4().simple().to_string();
    info!(session_id = %session_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let (room, ack) = match state.rooms.join_or_create(&session_id).await {
        Ok(joined) => joined,
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to join a room");
            let _ = send_msg(&mut ws_sink, &ServerMsg::error(e.code(), e.to_string())).await;
            return;
        }
    };
    let welcome = ServerMsg::Welcome {
        session_id: session_id.clone(),
        room_id: room.id,
        server_time: unix_millis(),
        arena: arena_info(),
        state: ack.state,
    };
    let event_rx = ack.events;

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(session_id = %session_id, error = %e, "Failed to send welcome");
        room.leave(&session_id).await;
        return;
    }

    run_session(&session_id, &room, ws_sink, ws_stream, event_rx).await;

    // Cleanup on disconnect
    room.leave(&session_id).await;

    info!(session_id = %session_id, room_id = %room.id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    session_id: &str,
    room: &RoomHandle,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut event_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = SessionRateLimiter::new();
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMsg>(16);

    // Spawn writer task: room broadcasts and direct replies -> WebSocket
    let writer_session_id = session_id.to_string();
    let writer_room = room.clone();
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                direct = direct_rx.recv() => match direct {
                    Some(msg) => msg,
                    None => break,
                },
                event = event_rx.recv() => match event {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        match resync_after_lag(&writer_room, &mut event_rx, n).await {
                            Some(msg) => msg,
                            None => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(session_id = %writer_session_id, "Room channel closed");
                        break;
                    }
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(session_id = %writer_session_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> room
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMsg>(&text) {
                Ok(ClientMsg::PlayerInput { input }) => {
                    if !rate_limiter.check_input() {
                        warn!(session_id = %session_id, "Rate limited input message");
                        continue;
                    }
                    if room.send_input(session_id, input).await.is_err() {
                        debug!(session_id = %session_id, "Room channel closed");
                        break;
                    }
                }
                Ok(ClientMsg::Ping { t }) => {
                    let _ = direct_tx.send(ServerMsg::Pong { t }).await;
                }
                Ok(ClientMsg::Leave) => {
                    info!(session_id = %session_id, "Client requested leave");
                    break;
                }
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                }
            },
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(session_id = %session_id, "Received ping/pong frame");
            }
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Replace a lagged receiver and produce the full state to send instead.
///
/// Patches only carry changes, so skipped ones cannot be replayed; the new
/// receiver starts right after the returned state.
async fn resync_after_lag(
    room: &RoomHandle,
    event_rx: &mut broadcast::Receiver<ServerMsg>,
    skipped: u64,
) -> Option<ServerMsg> {
    warn!(
        room_id = %room.id,
        lagged_count = skipped,
        "Client lagged, resyncing full state"
    );
    let sync = room.resync().await.ok()?;
    *event_rx = sync.events;
    Some(ServerMsg::FullState { state: sync.state })
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
