#![allow(clippy::unwrap_used)]
// Real-time server over a loopback socket.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use fortiwatch_core::{BroadcastConfig, BroadcastServer, Channel, Hub};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Helpers ─────────────────────────────────────────────────────────

fn loopback(heartbeat: Duration, timeout: Duration) -> BroadcastConfig {
    BroadcastConfig {
        bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        heartbeat_interval: heartbeat,
        client_timeout: timeout,
        client_buffer: 8,
    }
}

async fn start(config: &BroadcastConfig) -> (Hub, SocketAddr, CancellationToken) {
    let hub = Hub::new(config.client_buffer);
    let server = BroadcastServer::bind(config, hub.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let cancel = CancellationToken::new();
    tokio::spawn(server.run(cancel.clone()));
    (hub, addr, cancel)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .unwrap();
    ws
}

/// Next JSON text frame, skipping control frames.
async fn next_json(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send(ws: &mut Client, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

async fn wait_for_clients(hub: &Hub, expected: usize) {
    for _ in 0..100 {
        if hub.client_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {expected} clients, found {}", hub.client_count());
}

// ── Protocol ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_subscribe_ack_then_latest_then_live_updates() {
    let cfg = loopback(Duration::from_secs(30), Duration::from_secs(90));
    let (hub, addr, cancel) = start(&cfg).await;

    hub.publish_update(Channel::Fortiaps, 1, Utc::now(), &json!([{ "name": "AP-1" }]))
        .unwrap();

    let mut ws = connect(addr).await;
    let hello = next_json(&mut ws).await;
    assert_eq!(hello["type"], "connected");
    assert!(hello["client_id"].is_string());
    assert!(hello["server_time"].is_string());

    send(&mut ws, json!({ "type": "subscribe", "channel": "fortiaps" })).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({ "type": "subscribed", "channel": "fortiaps" })
    );
    let replay = next_json(&mut ws).await;
    assert_eq!(replay["type"], "fortiaps:update");
    assert_eq!(replay["cycle"], 1);
    assert_eq!(replay["data"][0]["name"], "AP-1");

    // Other channels are not delivered.
    hub.publish_update(Channel::Topology, 2, Utc::now(), &json!({})).unwrap();
    hub.publish_update(Channel::Fortiaps, 2, Utc::now(), &json!([])).unwrap();
    let update = next_json(&mut ws).await;
    assert_eq!(update["type"], "fortiaps:update");
    assert_eq!(update["cycle"], 2);

    send(&mut ws, json!({ "type": "ping" })).await;
    assert_eq!(next_json(&mut ws).await["type"], "pong");

    send(&mut ws, json!({ "type": "unsubscribe", "channel": "fortiaps" })).await;
    assert_eq!(next_json(&mut ws).await["type"], "unsubscribed");
    assert_eq!(hub.active_channels(), 0);

    cancel.cancel();
}

#[tokio::test]
async fn test_repeat_subscribe_gets_no_second_ack_or_replay() {
    let cfg = loopback(Duration::from_secs(30), Duration::from_secs(90));
    let (hub, addr, cancel) = start(&cfg).await;
    hub.publish_update(Channel::Devices, 1, Utc::now(), &json!({})).unwrap();

    let mut ws = connect(addr).await;
    next_json(&mut ws).await;

    send(&mut ws, json!({ "type": "subscribe", "channel": "devices" })).await;
    assert_eq!(next_json(&mut ws).await["type"], "subscribed");
    assert_eq!(next_json(&mut ws).await["type"], "devices:update");

    send(&mut ws, json!({ "type": "subscribe", "channel": "devices" })).await;
    send(&mut ws, json!({ "type": "ping" })).await;
    assert_eq!(next_json(&mut ws).await["type"], "pong");
    assert_eq!(hub.subscriber_count(Channel::Devices), 1);

    cancel.cancel();
}

#[tokio::test]
async fn test_invalid_message_gets_error_frame() {
    let cfg = loopback(Duration::from_secs(30), Duration::from_secs(90));
    let (_hub, addr, cancel) = start(&cfg).await;

    let mut ws = connect(addr).await;
    next_json(&mut ws).await;

    ws.send(Message::text("not json")).await.unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "error");

    send(&mut ws, json!({ "type": "subscribe", "channel": "everything" })).await;
    assert_eq!(next_json(&mut ws).await["type"], "error");

    cancel.cancel();
}

#[tokio::test]
async fn test_catch_all_replays_every_channel() {
    let cfg = loopback(Duration::from_secs(30), Duration::from_secs(90));
    let (hub, addr, cancel) = start(&cfg).await;
    for channel in Channel::PUBLISHED {
        hub.publish_update(channel, 4, Utc::now(), &json!(null)).unwrap();
    }

    let mut ws = connect(addr).await;
    next_json(&mut ws).await;
    send(&mut ws, json!({ "type": "subscribe", "channel": "all" })).await;
    assert_eq!(next_json(&mut ws).await["type"], "subscribed");

    let mut types = Vec::new();
    for _ in 0..Channel::PUBLISHED.len() {
        types.push(next_json(&mut ws).await["type"].as_str().unwrap().to_owned());
    }
    assert_eq!(
        types,
        [
            "fortiaps:update",
            "fortiswitches:update",
            "devices:update",
            "topology:update",
            "history:update"
        ]
    );

    cancel.cancel();
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_unregisters_client() {
    let cfg = loopback(Duration::from_secs(30), Duration::from_secs(90));
    let (hub, addr, cancel) = start(&cfg).await;

    let mut ws = connect(addr).await;
    next_json(&mut ws).await;
    send(&mut ws, json!({ "type": "subscribe", "channel": "devices" })).await;
    next_json(&mut ws).await;
    assert_eq!(hub.subscriber_count(Channel::Devices), 1);

    ws.close(None).await.unwrap();
    wait_for_clients(&hub, 0).await;
    assert_eq!(hub.active_channels(), 0);

    cancel.cancel();
}

#[tokio::test]
async fn test_silent_client_is_dropped_after_timeout() {
    let cfg = loopback(Duration::from_millis(50), Duration::from_millis(150));
    let (hub, addr, cancel) = start(&cfg).await;

    // Connect but never read again, so server pings go unanswered.
    let _ws = connect(addr).await;
    wait_for_clients(&hub, 1).await;
    wait_for_clients(&hub, 0).await;

    cancel.cancel();
}

#[tokio::test]
async fn test_shutdown_closes_clients() {
    let cfg = loopback(Duration::from_secs(30), Duration::from_secs(90));
    let (hub, addr, cancel) = start(&cfg).await;

    let mut ws = connect(addr).await;
    next_json(&mut ws).await;
    cancel.cancel();

    let end = tokio::time::timeout(Duration::from_secs(2), ws.next()).await.unwrap();
    assert!(matches!(end, Some(Ok(Message::Close(_))) | None | Some(Err(_))));
    wait_for_clients(&hub, 0).await;
}
