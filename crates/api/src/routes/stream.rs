use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, instrument, warn};

use promptlink_common::{EventSource, SessionId, StatusEvent};
use promptlink_network::Session;

use crate::{error::ApiError, server::AppState};

/// WebSocket stream of a session's status events.
///
/// The socket closes after the terminal event. Unknown sessions are
/// rejected with 404 before the upgrade.
#[instrument(skip(ws, state), fields(session_id = %session_id))]
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let id = SessionId::from_string(session_id);
    let (events, snapshot) = state.orchestrator.subscribe(&id).await?;
    info!("WebSocket connection upgrade requested");

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, id, events, snapshot)))
}

async fn handle_socket(
    socket: WebSocket,
    id: SessionId,
    mut events: broadcast::Receiver<StatusEvent>,
    snapshot: Session,
) {
    let (mut sender, mut receiver) = socket.split();

    // Finished before we connected: replay how it ended and close
    if snapshot.finalized {
        if let Some(event) = snapshot.terminal_event() {
            let event = StatusEvent::new(&id, EventSource::Orchestrator, event);
            if let Ok(json) = serde_json::to_string(&event) {
                let _ = sender.send(Message::Text(json)).await;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    let session_label = id.to_string();
    let mut sender_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WebSocket client lagging, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize status event: {}", e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(json)).await {
                debug!("Failed to send WebSocket message: {}", e);
                return;
            }
            if event.is_terminal() {
                break;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    let mut receiver_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut sender_task => receiver_task.abort(),
        _ = &mut receiver_task => sender_task.abort(),
    }

    info!(session_id = %session_label, "WebSocket connection closed");
}
