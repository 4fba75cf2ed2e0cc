//! WebSocket endpoint: `GET /ws`
//!
//! The upgrade request is the CONNECT: its `Authorization` header is checked
//! before the socket is accepted. Afterwards the client drives subscriptions
//! with JSON frames (see [`crate::protocol`]).
//!
//! Each subscription gets its own forwarding task reading the topic's
//! broadcast channel; all tasks write through one bounded outbound queue
//! drained by the socket writer. Closing the socket aborts every forwarder
//! and releases topics left without subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, header::AUTHORIZATION},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, broadcast::error::RecvError, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::distribution::{Connection, DistributionGateway};
use crate::error::GatewayError;
use crate::protocol::{ClientFrame, ServerFrame};
use crate::state::AppState;

const OUTBOUND_BUFFER: usize = 256;
/// Live subscriptions allowed per connection.
const MAX_SUBSCRIPTIONS: usize = 64;

pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, GatewayError> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let connection = state.gateway.connect(authorization).await?;

    let gateway = state.gateway.clone();
    let connection_id = connection.id;
    Ok(ws
        .on_failed_upgrade(move |e| {
            warn!(connection = %connection_id, error = %e, "WebSocket upgrade failed");
            gateway.disconnect(&connection_id);
        })
        .on_upgrade(move |socket| handle_socket(socket, state.gateway, connection)))
}

async fn handle_socket(socket: WebSocket, gateway: Arc<DistributionGateway>, connection: Connection) {
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break; // Client disconnected
            }
        }
    });

    let mut session = Session::new(gateway.clone(), connection.clone(), out_tx.clone());
    let connected = ServerFrame::Connected {
        session: connection.id.to_string(),
        user: connection.principal.subject.clone(),
    };

    if out_tx.send(connected.to_json()).await.is_ok() {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let reply = session.handle_text(text.as_str()).await;
                    if out_tx.send(reply.to_json()).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    warn!(connection = %connection.id, error = %e, "WebSocket error");
                    break;
                }
                _ => {} // Ignore ping/pong/binary
            }
        }
    }

    session.shutdown().await;
    drop(out_tx);
    writer.abort();
    gateway.disconnect(&connection.id);
}

/// Subscription bookkeeping for one connection.
struct Session {
    gateway: Arc<DistributionGateway>,
    connection: Connection,
    outbound: mpsc::Sender<String>,
    subscriptions: HashMap<String, JoinHandle<()>>,
}

impl Session {
    fn new(
        gateway: Arc<DistributionGateway>,
        connection: Connection,
        outbound: mpsc::Sender<String>,
    ) -> Self {
        Self {
            gateway,
            connection,
            outbound,
            subscriptions: HashMap::new(),
        }
    }

    /// Apply one client frame and return the reply frame.
    async fn handle_text(&mut self, text: &str) -> ServerFrame {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(connection = %self.connection.id, "Invalid frame: {}", e);
                return ServerFrame::error(GatewayError::Protocol(e.to_string()).to_string());
            }
        };

        match frame {
            ClientFrame::Subscribe { id, destination } => {
                if self.subscriptions.contains_key(&id) {
                    return ServerFrame::error(
                        GatewayError::Protocol(format!("Subscription id {} already in use", id))
                            .to_string(),
                    );
                }
                if self.subscriptions.len() >= MAX_SUBSCRIPTIONS {
                    return ServerFrame::error(
                        GatewayError::Protocol(format!(
                            "At most {} subscriptions per connection",
                            MAX_SUBSCRIPTIONS
                        ))
                        .to_string(),
                    );
                }
                match self
                    .gateway
                    .subscribe(Some(&self.connection.principal), &destination)
                {
                    Ok(rx) => {
                        let task = spawn_forwarder(
                            id.clone(),
                            destination.trim().to_string(),
                            rx,
                            self.outbound.clone(),
                        );
                        self.subscriptions.insert(id.clone(), task);
                        ServerFrame::Receipt { receipt_id: id }
                    }
                    Err(e) => ServerFrame::error(e.to_string()),
                }
            }
            ClientFrame::Unsubscribe { id } => match self.subscriptions.remove(&id) {
                Some(task) => {
                    stop_forwarder(task).await;
                    self.gateway.release_idle_topics();
                    ServerFrame::Receipt { receipt_id: id }
                }
                None => ServerFrame::error(
                    GatewayError::Protocol(format!("Unknown subscription id {}", id)).to_string(),
                ),
            },
        }
    }

    /// Stop every forwarder and release the topics they held.
    async fn shutdown(&mut self) {
        for (_, task) in self.subscriptions.drain() {
            stop_forwarder(task).await;
        }
        self.gateway.release_idle_topics();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for (_, task) in self.subscriptions.drain() {
            task.abort();
        }
    }
}

/// Abort a forwarder and wait until its receiver has been dropped.
async fn stop_forwarder(task: JoinHandle<()>) {
    task.abort();
    let _ = task.await;
}

fn spawn_forwarder(
    subscription: String,
    destination: String,
    mut rx: broadcast::Receiver<String>,
    outbound: mpsc::Sender<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(payload) => {
                    let Some(frame) = ServerFrame::message(&subscription, &destination, payload)
                    else {
                        warn!(destination = %destination, "Dropping non-JSON payload");
                        continue;
                    };
                    if outbound.send(frame.to_json()).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    debug!(destination = %destination, "Subscriber lagged by {} messages", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
