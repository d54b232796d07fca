//! Executor-side transport: a reconnecting WebSocket client that feeds
//! incoming requests to the [`Dispatcher`](crate::dispatch::Dispatcher).
//!
//! Reconnection is a fixed-interval retry. A connect attempt that is still
//! unresolved after two intervals is abandoned and restarted instead of
//! being left to the socket library's own backoff.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::ClientConfig;
use crate::dispatch::Dispatcher;
use crate::protocol::CommandRequest;

/// Connect attempts still pending after this many reconnect intervals are
/// forcibly restarted.
const STUCK_CONNECT_TICKS: u32 = 2;

pub struct ExtensionClient;

impl ExtensionClient {
    /// Run one client per configured port, all sharing the dispatcher.
    pub fn spawn_all(dispatcher: Arc<Dispatcher>, config: &ClientConfig) -> Vec<JoinHandle<()>> {
        config
            .ports
            .iter()
            .map(|port| {
                ExtensionClient::spawn(
                    dispatcher.clone(),
                    format!("ws://127.0.0.1:{port}"),
                    config.reconnect_interval,
                )
            })
            .collect()
    }

    /// Keep a connection to `url` alive until the returned handle is
    /// aborted, serving requests while connected.
    pub fn spawn(
        dispatcher: Arc<Dispatcher>,
        url: String,
        reconnect_interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(run_client(dispatcher, url, reconnect_interval))
    }
}

async fn run_client(dispatcher: Arc<Dispatcher>, url: String, reconnect_interval: Duration) {
    let stuck_after = reconnect_interval * STUCK_CONNECT_TICKS;
    loop {
        match tokio::time::timeout(stuck_after, connect_async(url.as_str())).await {
            Ok(Ok((ws_stream, _))) => {
                tracing::info!(%url, "Connected to control server");
                serve_connection(dispatcher.clone(), ws_stream).await;
                tracing::info!(%url, "Control server connection closed");
            }
            Ok(Err(e)) => {
                tracing::debug!(%url, "connect failed: {}", e);
            }
            Err(_elapsed) => {
                tracing::warn!(%url, "Connect attempt stuck, restarting");
            }
        }
        tokio::time::sleep(reconnect_interval).await;
    }
}

/// Read requests until the connection drops. Each request is dispatched on
/// its own task so a slow command never holds up the read loop.
async fn serve_connection(
    dispatcher: Arc<Dispatcher>,
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
) {
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

    while let Some(Ok(msg)) = stream.next().await {
        if !msg.is_text() {
            continue;
        }
        let txt = msg.into_text().unwrap_or_default();
        let request: CommandRequest = match serde_json::from_str(&txt) {
            Ok(request) => request,
            Err(e) => {
                // Unknown or malformed command: log and drop, never crash
                // the loop. There is no correlation id worth answering to.
                tracing::warn!("Ignoring unrecognized request: {}", e);
                continue;
            }
        };
        let dispatcher = dispatcher.clone();
        let reply_tx = tx.clone();
        tokio::spawn(async move {
            let reply = dispatcher.dispatch(request).await;
            match serde_json::to_string(&reply) {
                Ok(payload) => {
                    let _ = reply_tx.send(Message::Text(payload));
                }
                Err(e) => tracing::warn!("serialize reply: {}", e),
            }
        });
    }

    writer.abort();
}
