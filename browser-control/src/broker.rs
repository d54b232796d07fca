//! Broker-side server: owns the WebSocket listener, the active extension
//! connection and the pending-request table.
//!
//! Every outbound command gets a fresh correlation id and a oneshot waiter;
//! the reader task resolves waiters as responses arrive, in arrival order,
//! regardless of how many callers are suspended in [`BrowserControlServer::send`].

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::errors::ControlError;
use crate::policy::SecurityGate;
use crate::protocol::{
    Command, CommandRequest, ExtensionMessage, ResourceKind, ResourceMessage,
};

/// A reply is either the typed resource or the peer's error message.
type ReplyResult = Result<ResourceMessage, String>;

#[derive(Debug)]
struct PendingRequest {
    expected: ResourceKind,
    tx: oneshot::Sender<ReplyResult>,
}

type PendingMap = HashMap<String, PendingRequest>;
type Pending = Arc<Mutex<PendingMap>>;

#[derive(Debug)]
struct ActiveClient {
    conn_id: u64,
    sender: mpsc::UnboundedSender<Message>,
}

/// Newest connection wins; replacing the slot abandons requests in flight
/// against the old connection.
type Active = Arc<Mutex<Option<ActiveClient>>>;

#[derive(Debug)]
pub struct BrowserControlServer {
    accept_task: JoinHandle<()>,
    local_addr: SocketAddr,
    active: Active,
    pending: Pending,
    gate: Arc<SecurityGate>,
    response_timeout: Option<Duration>,
}

impl BrowserControlServer {
    /// Bind the listener and start accepting extension connections.
    ///
    /// A bind failure (typically the configured port already in use) is a
    /// construction failure and is returned, not retried.
    pub async fn bind(
        config: &BridgeConfig,
        gate: Arc<SecurityGate>,
    ) -> Result<BrowserControlServer, ControlError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ControlError::Transport(format!("failed to bind {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ControlError::Transport(format!("listener address: {e}")))?;
        tracing::info!("Browser control server listening on {}", local_addr);

        let active: Active = Arc::new(Mutex::new(None));
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let accept_active = active.clone();
        let accept_pending = pending.clone();
        let accept_task = tokio::spawn(async move {
            let mut next_conn_id: u64 = 0;
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!("ws accept error: {}", e);
                        continue;
                    }
                };
                next_conn_id += 1;
                let conn_id = next_conn_id;
                let conn_active = accept_active.clone();
                let conn_pending = accept_pending.clone();
                tokio::spawn(async move {
                    let ws_stream = match accept_async(stream).await {
                        Ok(s) => s,
                        Err(e) => {
                            tracing::warn!("ws handshake error: {}", e);
                            return;
                        }
                    };
                    tracing::info!(conn_id, %peer, "Extension connected");
                    let (mut sink, mut stream) = ws_stream.split();
                    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

                    // writer task
                    let writer = tokio::spawn(async move {
                        while let Some(msg) = rx.recv().await {
                            if let Err(e) = sink.send(msg).await {
                                tracing::warn!("ws send error: {}", e);
                                break;
                            }
                        }
                    });

                    // newest connection replaces the previous one
                    {
                        let mut active = conn_active.lock().await;
                        if active.is_some() {
                            tracing::warn!(
                                conn_id,
                                "New extension connection replaces the previous one; \
                                 requests in flight on the old connection stay pending"
                            );
                        }
                        *active = Some(ActiveClient {
                            conn_id,
                            sender: tx.clone(),
                        });
                    }

                    // reader loop
                    while let Some(Ok(msg)) = stream.next().await {
                        if !msg.is_text() {
                            continue;
                        }
                        let txt = msg.into_text().unwrap_or_default();
                        handle_incoming(&conn_pending, &txt).await;
                    }

                    // drop the reference only if it is still ours
                    {
                        let mut active = conn_active.lock().await;
                        if matches!(&*active, Some(client) if client.conn_id == conn_id) {
                            *active = None;
                        }
                    }
                    tracing::info!(conn_id, "Extension connection closed");
                    writer.abort();
                });
            }
        });

        Ok(BrowserControlServer {
            accept_task,
            local_addr,
            active,
            pending,
            gate,
            response_timeout: config.response_timeout,
        })
    }

    /// Address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn gate(&self) -> &Arc<SecurityGate> {
        &self.gate
    }

    pub async fn is_client_connected(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Number of requests currently awaiting a reply.
    pub async fn pending_request_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Send one command and wait for its correlated reply.
    ///
    /// Policy runs before anything touches the wire: a disabled command or a
    /// deny-listed explicit destination is rejected locally. With no
    /// response timeout configured the caller waits for as long as it takes;
    /// a configured timeout removes the pending entry on expiry and a late
    /// reply is dropped as an orphan.
    pub async fn send(&self, command: Command) -> Result<ResourceMessage, ControlError> {
        if !self.gate.is_command_allowed(&command) {
            tracing::warn!(tool_id = command.tool_id(), "Command disabled by policy");
            return Err(ControlError::CommandDisabled(command.tool_id()));
        }
        if let Some(url) = command.explicit_url() {
            if !url.starts_with("https://") {
                return Err(ControlError::InvalidArgument(format!("Invalid URL: {url}")));
            }
            if self.gate.is_destination_denied(url) {
                tracing::warn!(%url, "Destination denied by policy");
                return Err(ControlError::DestinationDenied(url.to_string()));
            }
        }

        let correlation_id = Uuid::new_v4().to_string();
        let request = CommandRequest {
            command,
            correlation_id: correlation_id.clone(),
        };
        let payload = serde_json::to_string(&request)
            .map_err(|e| ControlError::Internal(format!("serialize request: {e}")))?;

        let (tx, rx) = oneshot::channel::<ReplyResult>();
        {
            let mut pending = self.pending.lock().await;
            let prev = pending.insert(
                correlation_id.clone(),
                PendingRequest {
                    expected: request.command.expected_resource(),
                    tx,
                },
            );
            debug_assert!(prev.is_none(), "correlation id collision");
        }

        let sent = {
            let active = self.active.lock().await;
            match &*active {
                Some(client) => client.sender.send(Message::Text(payload)).is_ok(),
                None => false,
            }
        };
        if !sent {
            self.pending.lock().await.remove(&correlation_id);
            return Err(ControlError::NotConnected);
        }
        tracing::debug!(
            id = %correlation_id,
            cmd = request.command.name(),
            "Request sent to extension"
        );

        let reply = match self.response_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(reply) => reply,
                Err(_elapsed) => {
                    // Races safely against a late resolution: whoever removes
                    // the entry first wins, the other side is a no-op.
                    self.pending.lock().await.remove(&correlation_id);
                    tracing::warn!(id = %correlation_id, "Timed out waiting for extension reply");
                    return Err(ControlError::ResponseTimeout);
                }
            },
            None => rx.await,
        };
        match reply {
            Ok(Ok(msg)) => Ok(msg),
            Ok(Err(error_message)) => Err(ControlError::Extension(error_message)),
            Err(_canceled) => Err(ControlError::Internal(
                "pending request dropped without resolution".into(),
            )),
        }
    }
}

impl Drop for BrowserControlServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Resolve or reject the matching pending entry for one incoming frame.
///
/// Anomalies never propagate: an orphan reply, a resource kind that does not
/// match the request, or an undecodable frame are logged and dropped. A
/// mismatched resource leaves the pending entry untouched.
async fn handle_incoming(pending: &Pending, raw: &str) {
    match serde_json::from_str::<ExtensionMessage>(raw) {
        Ok(ExtensionMessage::Error(envelope)) => {
            let mut pending = pending.lock().await;
            match pending.remove(&envelope.correlation_id) {
                Some(entry) => {
                    tracing::debug!(
                        id = %envelope.correlation_id,
                        error = %envelope.error_message,
                        "Extension rejected request"
                    );
                    let _ = entry.tx.send(Err(envelope.error_message));
                }
                None => {
                    tracing::warn!(
                        id = %envelope.correlation_id,
                        "Error envelope for unknown correlation id"
                    );
                }
            }
        }
        Ok(ExtensionMessage::Resource(msg)) => {
            let kind = msg.resource.kind();
            let mut pending = pending.lock().await;
            let Some(entry) = pending.get(&msg.correlation_id) else {
                tracing::warn!(
                    id = %msg.correlation_id,
                    resource = kind.as_str(),
                    "Dropping response with no pending request"
                );
                return;
            };
            if entry.expected != kind {
                tracing::warn!(
                    id = %msg.correlation_id,
                    expected = entry.expected.as_str(),
                    got = kind.as_str(),
                    "Resource mismatch, leaving request pending"
                );
                return;
            }
            if let Some(entry) = pending.remove(&msg.correlation_id) {
                let _ = entry.tx.send(Ok(msg));
            }
        }
        Err(e) => tracing::warn!("Invalid incoming JSON: {}", e),
    }
}
