//! Page WebSocket routes
//!
//! Browser pages connect here with a session id. The server pushes command
//! frames down the socket and feeds reply frames back into the page
//! registry, where the originating tool call is waiting.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;

use crate::state::AppState;

/// Query parameters for the page WebSocket endpoint
#[derive(Debug, Deserialize)]
pub struct PageWsQuery {
    #[serde(default = "default_session_id")]
    pub session_id: String,
}

fn default_session_id() -> String {
    "default".to_string()
}

/// WebSocket upgrade handler for page sessions
///
/// # WebSocket Protocol
/// - Server → Page: JSON command frames, e.g. `{"id":"...","type":"confirm","message":"..."}`
/// - Page → Server: JSON reply frames, echoing `id` when possible
/// - Page → Server: text "ping" expects "pong" (keepalive)
#[utoipa::path(
    get,
    path = "/ws",
    tag = "pages",
    params(
        ("session_id" = Option<String>, Query, description = "Page session identifier, defaults to 'default'")
    ),
    responses(
        (status = 101, description = "WebSocket upgrade successful")
    )
)]
pub async fn page_websocket_handler(
    State(state): State<AppState>,
    Query(query): Query<PageWsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    tracing::info!("WebSocket connection request for session '{}'", query.session_id);
    ws.on_upgrade(move |socket| handle_page_socket(socket, state, query.session_id))
}

/// Handle a page's WebSocket connection
///
/// Uses graceful shutdown via broadcast channel to avoid abrupt task cancellation.
async fn handle_page_socket(socket: WebSocket, state: AppState, session_id: String) {
    let (mut sender, mut receiver) = socket.split();

    // Registering hands us the outbound command frames for this session,
    // plus the generation our cleanup is allowed to remove
    let (mut command_rx, generation) = state.pages.register(&session_id);

    // Channel for sending messages from multiple tasks
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Message>();

    // Shutdown signal for graceful termination
    let (shutdown_tx, mut shutdown_rx1) = tokio::sync::broadcast::channel::<()>(1);
    let mut shutdown_rx2 = shutdown_tx.subscribe();
    let mut shutdown_rx3 = shutdown_tx.subscribe();

    let session_forward = session_id.clone();
    let session_receive = session_id.clone();

    // Task 1: Forward command frames from the registry to the send channel
    let tx_clone = tx.clone();
    let forward_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx1.recv() => {
                    tracing::debug!("Forward task shutting down for session '{}'", session_forward);
                    break;
                }
                frame = command_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if tx_clone.send(Message::Text(frame.into())).is_err() {
                                tracing::debug!("Send channel closed for session '{}'", session_forward);
                                break;
                            }
                        }
                        None => {
                            // Registry dropped our sender (connection replaced)
                            break;
                        }
                    }
                }
            }
        }
    });

    // Task 2: Handle incoming reply frames (and ping/pong keepalive)
    let tx_clone = tx.clone();
    let shutdown_tx_clone = shutdown_tx.clone();
    let pages = state.pages.clone();
    let receive_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx2.recv() => {
                    tracing::debug!("Receive task shutting down for session '{}'", session_receive);
                    break;
                }
                msg_opt = receiver.next() => {
                    match msg_opt {
                        Some(Ok(Message::Text(text))) => {
                            if text.trim() == "ping" {
                                let _ = tx_clone.send(Message::Text("pong".into()));
                                continue;
                            }

                            if let Err(e) = pages.resolve(&session_receive, &text) {
                                tracing::warn!(
                                    "Unmatched reply from session '{}': {}",
                                    session_receive,
                                    e
                                );
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::debug!(
                                "WebSocket close received from session '{}'",
                                session_receive
                            );
                            let _ = shutdown_tx_clone.send(());
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::debug!("WebSocket receive error: {}", e);
                            let _ = shutdown_tx_clone.send(());
                            break;
                        }
                        None => {
                            // Stream ended
                            let _ = shutdown_tx_clone.send(());
                            break;
                        }
                        _ => {
                            // Ignore other message types (Binary, Ping, Pong)
                        }
                    }
                }
            }
        }
    });

    // Task 3: Send messages from channel to WebSocket
    let shutdown_tx_clone = shutdown_tx.clone();
    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx3.recv() => {
                    // Try to send close frame gracefully
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                msg_opt = rx.recv() => {
                    match msg_opt {
                        Some(msg) => {
                            if let Err(e) = sender.send(msg).await {
                                tracing::debug!("WebSocket send error (page likely disconnected): {}", e);
                                let _ = shutdown_tx_clone.send(());
                                break;
                            }
                        }
                        None => {
                            // Channel closed
                            break;
                        }
                    }
                }
            }
        }
    });

    // Wait for all tasks to complete gracefully
    let _ = tokio::join!(forward_task, receive_task, send_task);

    state.pages.unregister(&session_id, generation);
    tracing::info!("WebSocket connection closed for session '{}'", session_id);
}
