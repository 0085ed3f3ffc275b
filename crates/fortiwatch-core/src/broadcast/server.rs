// ── WebSocket server ──
//
// One task per connection. Each task multiplexes the client's outbound
// queue, its inbound control frames, and a heartbeat timer. Dropping
// out of the loop for any reason unregisters the client.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::hub::Hub;
use super::protocol::{ClientMessage, ServerMessage};
use crate::config::BroadcastConfig;
use crate::error::CoreError;

pub struct BroadcastServer {
    listener: TcpListener,
    hub: Hub,
    heartbeat_interval: Duration,
    client_timeout: Duration,
}

impl BroadcastServer {
    pub async fn bind(config: &BroadcastConfig, hub: Hub) -> Result<Self, CoreError> {
        let listener = TcpListener::bind(config.bind)
            .await
            .map_err(|source| CoreError::Bind {
                addr: config.bind.to_string(),
                source,
            })?;
        Ok(Self {
            listener,
            hub,
            heartbeat_interval: config.heartbeat_interval,
            client_timeout: config.client_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, CoreError> {
        self.listener
            .local_addr()
            .map_err(|e| CoreError::Internal(format!("listener has no local address: {e}")))
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Accept connections until `cancel` fires, then close every client
    /// and wait for their tasks.
    pub async fn run(self, cancel: CancellationToken) {
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "real-time server listening");
        }
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let session = Session {
                            hub: self.hub.clone(),
                            heartbeat_interval: self.heartbeat_interval,
                            client_timeout: self.client_timeout,
                            cancel: cancel.child_token(),
                        };
                        connections.spawn(session.serve(stream, peer));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        while connections.join_next().await.is_some() {}
        debug!("real-time server stopped");
    }
}

// ── Per-connection session ─────────────────────────────────────────

struct Session {
    hub: Hub,
    heartbeat_interval: Duration,
    client_timeout: Duration,
    cancel: CancellationToken,
}

impl Session {
    async fn serve(self, stream: TcpStream, peer: SocketAddr) {
        let ws = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                debug!(%peer, error = %e, "WebSocket handshake failed");
                return;
            }
        };

        let (id, outbound) = self.hub.register();
        info!(client = %id, %peer, "client connected");

        match self.pump(ws, id, outbound).await {
            Ok(reason) => info!(client = %id, reason, "client disconnected"),
            Err(e) => debug!(client = %id, error = %e, "client connection error"),
        }
        self.hub.disconnect(id);
    }

    async fn pump(
        &self,
        ws: tokio_tungstenite::WebSocketStream<TcpStream>,
        id: Uuid,
        mut outbound: tokio::sync::mpsc::Receiver<super::Frame>,
    ) -> Result<&'static str, tungstenite::Error> {
        let (mut sink, mut inbound) = ws.split();

        let hello = ServerMessage::Connected {
            server_time: Utc::now(),
            client_id: id,
        };
        sink.send(Message::text(hello.to_text())).await?;

        let mut heartbeat = tokio::time::interval(self.heartbeat_interval);
        heartbeat.tick().await; // consume the immediate first tick
        let mut last_heard = Instant::now();

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok("server shutting down");
                }
                frame = outbound.recv() => {
                    let Some(frame) = frame else { return Ok("unregistered") };
                    sink.send(Message::text(frame.as_ref().to_owned())).await?;
                }
                msg = inbound.next() => {
                    let Some(msg) = msg else { return Ok("stream ended") };
                    last_heard = Instant::now();
                    match msg? {
                        Message::Text(text) => {
                            for reply in self.handle(id, text.as_str()) {
                                sink.send(Message::text(reply)).await?;
                            }
                        }
                        Message::Close(_) => return Ok("closed by client"),
                        // Pings are answered by tungstenite; pongs only
                        // refresh `last_heard`.
                        _ => {}
                    }
                }
                _ = heartbeat.tick() => {
                    if last_heard.elapsed() > self.client_timeout {
                        warn!(client = %id, "client silent past timeout");
                        return Ok("heartbeat timeout");
                    }
                    sink.send(Message::Ping(Vec::new().into())).await?;
                }
            }
        }
    }

    /// Replies to one client text frame, in send order.
    fn handle(&self, id: Uuid, text: &str) -> Vec<String> {
        let msg = match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(client = %id, error = %e, "unparsable client message");
                return vec![
                    ServerMessage::Error {
                        message: format!("invalid message: {e}"),
                    }
                    .to_text(),
                ];
            }
        };

        match msg {
            ClientMessage::Subscribe { channel } => {
                if !self.hub.subscribe(id, channel) {
                    return Vec::new();
                }
                std::iter::once(ServerMessage::Subscribed { channel }.to_text())
                    .chain(
                        self.hub
                            .replay(channel)
                            .into_iter()
                            .map(|f| f.as_ref().to_owned()),
                    )
                    .collect()
            }
            ClientMessage::Unsubscribe { channel } => {
                self.hub.unsubscribe(id, channel);
                vec![ServerMessage::Unsubscribed { channel }.to_text()]
            }
            ClientMessage::Ping => vec![
                ServerMessage::Pong {
                    timestamp: Utc::now(),
                }
                .to_text(),
            ],
        }
    }
}
