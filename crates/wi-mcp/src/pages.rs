//! Page session registry
//!
//! Browser pages connect over WebSocket, one connection per session id.
//! Tool execution sends a command frame to the page and waits for the
//! matching reply. Commands carry a correlation id; replies that echo it
//! are matched directly, replies without one (pages speaking the original
//! wire format) resolve the oldest pending command for the session.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;
use wi_types::{AppError, AppResult};

/// Default seconds to wait for a page reply
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;

/// A command sent to the connected page
///
/// Serialized shape matches what the page-side script expects:
/// `{"type":"snapshot","action":"capture"}`, `{"type":"confirm",...}`,
/// `{"type":"prompt",...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageCommand {
    /// Capture the page's current HTML
    Snapshot { action: SnapshotAction },

    /// Show a confirmation alert and report the user's choice
    Confirm { message: String },

    /// Show a question popup and report the user's answer
    Prompt { question: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotAction {
    Capture,
}

impl PageCommand {
    pub fn snapshot() -> Self {
        Self::Snapshot {
            action: SnapshotAction::Capture,
        }
    }
}

/// Outbound frame: a command plus its correlation id
#[derive(Debug, Clone, Serialize)]
struct OutboundFrame<'a> {
    id: &'a str,
    #[serde(flatten)]
    command: &'a PageCommand,
}

/// Page lifecycle events, broadcast to SSE subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Connected { session_id: String },
    Disconnected { session_id: String },
}

impl PageEvent {
    /// The session this event refers to
    pub fn session_id(&self) -> &str {
        match self {
            PageEvent::Connected { session_id } | PageEvent::Disconnected { session_id } => {
                session_id
            }
        }
    }

    /// Render as a JSON-RPC notification for external transports
    pub fn to_notification(&self) -> crate::protocol::JsonRpcNotification {
        let (method, session_id) = match self {
            PageEvent::Connected { session_id } => ("page/connected", session_id),
            PageEvent::Disconnected { session_id } => ("page/disconnected", session_id),
        };
        crate::protocol::JsonRpcNotification::new(
            method.to_string(),
            Some(serde_json::json!({ "session_id": session_id })),
        )
    }
}

/// One connected page
#[derive(Debug)]
struct PageConnection {
    /// Serialized frames destined for the WebSocket send task
    tx: mpsc::UnboundedSender<String>,

    /// When this page connected
    connected_at: Instant,

    /// Correlation ids awaiting a reply, oldest first
    pending_order: Mutex<VecDeque<String>>,

    /// Registration generation, handed back to the socket handler so a
    /// stale handler cannot tear down a replacement connection
    generation: u64,
}

/// A command waiting for its page reply
#[derive(Debug)]
struct PendingCommand {
    session_id: String,
    reply_tx: oneshot::Sender<Value>,
}

/// Registry of connected page sessions and in-flight commands
pub struct PageRegistry {
    connections: Arc<DashMap<String, Arc<PageConnection>>>,

    /// Correlation id -> waiting caller
    pending: Arc<DashMap<String, PendingCommand>>,

    /// Seconds to wait for a page reply before giving up
    command_timeout_secs: u64,

    /// Connect/disconnect event broadcast
    events: broadcast::Sender<PageEvent>,

    /// Source of registration generations
    next_generation: AtomicU64,
}

impl PageRegistry {
    /// Create a registry with the given reply timeout
    pub fn new(command_timeout_secs: u64) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            connections: Arc::new(DashMap::new()),
            pending: Arc::new(DashMap::new()),
            command_timeout_secs,
            events,
            next_generation: AtomicU64::new(0),
        }
    }

    /// Subscribe to page connect/disconnect events
    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    /// Register a page connection for a session id
    ///
    /// Returns the receiver side of the outbound frame channel plus a
    /// registration generation; the caller (the WebSocket send task)
    /// drains the receiver onto the socket and hands the generation back
    /// to `unregister` on disconnect. A prior connection under the same
    /// session id is replaced and its pending commands are cancelled.
    pub fn register(&self, session_id: &str) -> (mpsc::UnboundedReceiver<String>, u64) {
        let (tx, rx) = mpsc::unbounded_channel();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let connection = Arc::new(PageConnection {
            tx,
            connected_at: Instant::now(),
            pending_order: Mutex::new(VecDeque::new()),
            generation,
        });

        if let Some(old) = self.connections.insert(session_id.to_string(), connection) {
            warn!(
                "Replacing existing page connection for session '{}'",
                session_id
            );
            self.cancel_pending_for(&old);
        }

        info!("Page connected for session '{}'", session_id);
        let _ = self.events.send(PageEvent::Connected {
            session_id: session_id.to_string(),
        });

        (rx, generation)
    }

    /// Remove a page connection and cancel its in-flight commands
    ///
    /// Only removes the entry that `register` handed out `generation` for.
    /// A handler whose connection was already replaced by a reconnect
    /// finds a newer generation in place and leaves it alone.
    pub fn unregister(&self, session_id: &str, generation: u64) {
        let removed = self
            .connections
            .remove_if(session_id, |_, connection| {
                connection.generation == generation
            });

        match removed {
            Some((_, connection)) => {
                self.cancel_pending_for(&connection);
                info!("Page disconnected for session '{}'", session_id);
                let _ = self.events.send(PageEvent::Disconnected {
                    session_id: session_id.to_string(),
                });
            }
            None => {
                debug!(
                    "Skipping unregister for session '{}': connection already replaced",
                    session_id
                );
            }
        }
    }

    /// Drop every pending command registered on a connection
    ///
    /// Dropping the oneshot sender wakes the waiting caller with a
    /// connection-closed error rather than letting it run out the timeout.
    fn cancel_pending_for(&self, connection: &PageConnection) {
        let ids: Vec<String> = connection.pending_order.lock().drain(..).collect();
        for id in ids {
            self.pending.remove(&id);
        }
    }

    /// Whether a page is connected for the given session
    pub fn is_connected(&self, session_id: &str) -> bool {
        self.connections.contains_key(session_id)
    }

    /// Connected session ids with their connection ages
    pub fn sessions(&self) -> Vec<(String, Duration)> {
        self.connections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().connected_at.elapsed()))
            .collect()
    }

    /// Number of connected pages
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of commands awaiting a reply
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Send a command to the page and wait for its reply
    ///
    /// Errors distinguish three failures: no page connected for the
    /// session, the page disconnecting mid-command, and the page not
    /// answering within the timeout.
    pub async fn send_and_await(
        &self,
        session_id: &str,
        command: PageCommand,
    ) -> AppResult<Value> {
        let connection = self
            .connections
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::PageNotConnected(session_id.to_string()))?;

        let request_id = Uuid::new_v4().to_string();
        let frame = serde_json::to_string(&OutboundFrame {
            id: &request_id,
            command: &command,
        })?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(
            request_id.clone(),
            PendingCommand {
                session_id: session_id.to_string(),
                reply_tx,
            },
        );
        connection.pending_order.lock().push_back(request_id.clone());

        debug!(
            "Sending command {} to page session '{}': {}",
            request_id, session_id, frame
        );

        if connection.tx.send(frame).is_err() {
            self.remove_pending(&request_id);
            return Err(AppError::PageSession(format!(
                "Page connection for session '{}' is closed",
                session_id
            )));
        }

        match tokio::time::timeout(Duration::from_secs(self.command_timeout_secs), reply_rx).await
        {
            Ok(Ok(reply)) => {
                debug!("Received reply for command {}: {}", request_id, reply);
                self.forget_order_entry(session_id, &request_id);
                Ok(reply)
            }
            Ok(Err(_)) => {
                // Sender dropped: connection went away while we waited
                Err(AppError::PageSession(format!(
                    "Page for session '{}' disconnected before answering",
                    session_id
                )))
            }
            Err(_) => {
                warn!(
                    "Command {} to session '{}' timed out after {}s",
                    request_id, session_id, self.command_timeout_secs
                );
                self.remove_pending(&request_id);
                Err(AppError::PageTimeout(self.command_timeout_secs))
            }
        }
    }

    /// Resolve a pending command with a raw reply frame from the page
    ///
    /// Called by the WebSocket receive loop. Replies carrying an `id` that
    /// matches a pending command resolve it directly; replies without one
    /// resolve the session's oldest pending command.
    pub fn resolve(&self, session_id: &str, raw_reply: &str) -> AppResult<()> {
        let reply: Value = serde_json::from_str(raw_reply)
            .map_err(|e| AppError::PageSession(format!("Unparseable page reply: {}", e)))?;

        let request_id = match reply.get("id").and_then(Value::as_str) {
            Some(id) if self.pending.contains_key(id) => id.to_string(),
            _ => self
                .oldest_pending(session_id)
                .ok_or_else(|| {
                    AppError::PageSession(format!(
                        "Reply from session '{}' matches no pending command",
                        session_id
                    ))
                })?,
        };

        self.forget_order_entry(session_id, &request_id);

        match self.pending.remove(&request_id) {
            Some((_, pending)) => {
                if pending.reply_tx.send(reply).is_err() {
                    // Caller already gave up (timeout); nothing left to do
                    debug!("Reply for {} arrived after the caller left", request_id);
                }
                Ok(())
            }
            None => Err(AppError::PageSession(format!(
                "Pending command {} vanished before resolution",
                request_id
            ))),
        }
    }

    /// The oldest live pending correlation id for a session, if any
    ///
    /// Entries whose caller already went away (dropped `send_and_await`
    /// future, closed reply channel) are purged on the way, so an id-less
    /// reply never resolves a command nobody is waiting on.
    fn oldest_pending(&self, session_id: &str) -> Option<String> {
        let connection = self.connections.get(session_id)?;
        let mut order = connection.pending_order.lock();

        while let Some(id) = order.front().cloned() {
            let alive = self
                .pending
                .get(&id)
                .map(|pending| !pending.reply_tx.is_closed())
                .unwrap_or(false);
            if alive {
                return Some(id);
            }
            order.pop_front();
            self.pending.remove(&id);
        }

        None
    }

    /// Drop a pending entry and its ordering record
    fn remove_pending(&self, request_id: &str) {
        if let Some((_, pending)) = self.pending.remove(request_id) {
            self.forget_order_entry(&pending.session_id, request_id);
        }
    }

    fn forget_order_entry(&self, session_id: &str, request_id: &str) {
        if let Some(connection) = self.connections.get(session_id) {
            connection
                .pending_order
                .lock()
                .retain(|id| id != request_id);
        }
    }
}

impl Default for PageRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_wire_format() {
        let snapshot = serde_json::to_value(PageCommand::snapshot()).unwrap();
        assert_eq!(snapshot, json!({"type": "snapshot", "action": "capture"}));

        let confirm = serde_json::to_value(PageCommand::Confirm {
            message: "Delete?".to_string(),
        })
        .unwrap();
        assert_eq!(confirm, json!({"type": "confirm", "message": "Delete?"}));

        let prompt = serde_json::to_value(PageCommand::Prompt {
            question: "Name?".to_string(),
        })
        .unwrap();
        assert_eq!(prompt, json!({"type": "prompt", "question": "Name?"}));
    }

    #[tokio::test]
    async fn test_send_without_connection_fails_fast() {
        let registry = PageRegistry::new(60);
        let result = registry.send_and_await("default", PageCommand::snapshot()).await;
        assert!(matches!(result, Err(AppError::PageNotConnected(_))));
    }

    #[tokio::test]
    async fn test_send_and_resolve_by_id() {
        let registry = Arc::new(PageRegistry::new(60));
        let (mut rx, _gen) = registry.register("default");

        let reg = registry.clone();
        let call = tokio::spawn(async move {
            reg.send_and_await("default", PageCommand::snapshot()).await
        });

        // The WebSocket side sees the outbound frame...
        let frame = rx.recv().await.unwrap();
        let sent: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(sent["type"], "snapshot");
        let id = sent["id"].as_str().unwrap().to_string();

        // ...and answers, echoing the correlation id
        let reply = json!({"id": id, "success": true, "html": "<html></html>"});
        registry.resolve("default", &reply.to_string()).unwrap();

        let result = call.await.unwrap().unwrap();
        assert_eq!(result["success"], json!(true));
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_without_id_uses_oldest_pending() {
        let registry = Arc::new(PageRegistry::new(60));
        let (mut rx, _gen) = registry.register("default");

        let reg = registry.clone();
        let call = tokio::spawn(async move {
            reg.send_and_await(
                "default",
                PageCommand::Confirm {
                    message: "OK?".to_string(),
                },
            )
            .await
        });

        let _frame = rx.recv().await.unwrap();

        // Original wire format: reply with no correlation id
        registry
            .resolve("default", r#"{"confirmed": true}"#)
            .unwrap();

        let result = call.await.unwrap().unwrap();
        assert_eq!(result["confirmed"], json!(true));
    }

    #[tokio::test]
    async fn test_timeout() {
        let registry = Arc::new(PageRegistry::new(1));
        let (_rx, _gen) = registry.register("default");

        let result = registry.send_and_await("default", PageCommand::snapshot()).await;
        assert!(matches!(result, Err(AppError::PageTimeout(1))));
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unregister_cancels_pending() {
        let registry = Arc::new(PageRegistry::new(60));
        let (_rx, generation) = registry.register("default");

        let reg = registry.clone();
        let call = tokio::spawn(async move {
            reg.send_and_await("default", PageCommand::snapshot()).await
        });

        // Give the command time to land in the pending map
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(registry.pending_count(), 1);

        registry.unregister("default", generation);

        let result = call.await.unwrap();
        assert!(matches!(result, Err(AppError::PageSession(_))));
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_reconnect_replaces_connection() {
        let registry = PageRegistry::new(60);
        let mut events = registry.subscribe();

        let (_rx1, _) = registry.register("default");
        let (_rx2, _) = registry.register("default");
        assert_eq!(registry.connection_count(), 1);

        assert_eq!(
            events.recv().await.unwrap(),
            PageEvent::Connected {
                session_id: "default".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_resolve_unmatched_reply_errors() {
        let registry = PageRegistry::new(60);
        let (_rx, _gen) = registry.register("default");

        let result = registry.resolve("default", r#"{"confirmed": false}"#);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stale_unregister_keeps_replacement() {
        let registry = Arc::new(PageRegistry::new(60));
        let (_rx_old, old_generation) = registry.register("default");
        let (mut rx_new, _new_generation) = registry.register("default");

        // The replaced socket's handler finishes last and cleans up; the
        // live replacement must survive it
        registry.unregister("default", old_generation);
        assert!(registry.is_connected("default"));
        assert_eq!(registry.connection_count(), 1);

        let reg = registry.clone();
        let call = tokio::spawn(async move {
            reg.send_and_await("default", PageCommand::snapshot()).await
        });

        let frame = rx_new.recv().await.unwrap();
        let sent: Value = serde_json::from_str(&frame).unwrap();
        let id = sent["id"].as_str().unwrap().to_string();
        registry
            .resolve("default", &json!({"id": id, "success": true}).to_string())
            .unwrap();

        let result = call.await.unwrap().unwrap();
        assert_eq!(result["success"], json!(true));
    }

    #[tokio::test]
    async fn test_abandoned_caller_does_not_swallow_reply() {
        let registry = Arc::new(PageRegistry::new(60));
        let (mut rx, _gen) = registry.register("default");

        // First caller goes away before its reply arrives
        let reg = registry.clone();
        let abandoned = tokio::spawn(async move {
            reg.send_and_await("default", PageCommand::snapshot()).await
        });
        let _first_frame = rx.recv().await.unwrap();
        abandoned.abort();
        let _ = abandoned.await;

        let reg = registry.clone();
        let call = tokio::spawn(async move {
            reg.send_and_await(
                "default",
                PageCommand::Confirm {
                    message: "OK?".to_string(),
                },
            )
            .await
        });
        let _second_frame = rx.recv().await.unwrap();

        // An id-less reply must reach the live caller, not the dead entry
        registry
            .resolve("default", r#"{"confirmed": true}"#)
            .unwrap();

        let result = call.await.unwrap().unwrap();
        assert_eq!(result["confirmed"], json!(true));
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_event_notification_rendering() {
        let event = PageEvent::Connected {
            session_id: "abc".to_string(),
        };
        let notification = event.to_notification();
        assert_eq!(notification.method, "page/connected");
        assert_eq!(notification.params.unwrap()["session_id"], json!("abc"));
    }
}
