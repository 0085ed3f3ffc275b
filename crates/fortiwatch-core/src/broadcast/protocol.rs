// ── Real-time wire protocol ──
//
// JSON text frames tagged by `type`. Clients subscribe to named
// channels; the server pushes `<channel>:update` frames after each cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

/// A named broadcast channel. `All` receives every publish.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    Fortiaps,
    Fortiswitches,
    Devices,
    Topology,
    /// Per-cycle metrics samples, oldest first.
    History,
    All,
}

impl Channel {
    /// Channels that carry their own payloads, in publish order.
    pub const PUBLISHED: [Channel; 5] = [
        Channel::Fortiaps,
        Channel::Fortiswitches,
        Channel::Devices,
        Channel::Topology,
        Channel::History,
    ];

    pub fn update_type(self) -> String {
        format!("{self}:update")
    }
}

/// Client → server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { channel: Channel },
    Unsubscribe { channel: Channel },
    Ping,
}

/// Server → client control frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        server_time: DateTime<Utc>,
        client_id: Uuid,
    },
    Subscribed {
        channel: Channel,
    },
    Unsubscribed {
        channel: Channel,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn to_text(&self) -> String {
        // Every variant is plain data; encoding cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A per-cycle data frame. Encoded once per publish and shared by every
/// recipient.
#[derive(Debug, Serialize)]
pub struct UpdateFrame<'a> {
    #[serde(rename = "type")]
    pub kind: String,
    pub channel: Channel,
    pub cycle: u64,
    pub timestamp: DateTime<Utc>,
    pub data: &'a Value,
}

impl<'a> UpdateFrame<'a> {
    pub fn new(channel: Channel, cycle: u64, timestamp: DateTime<Utc>, data: &'a Value) -> Self {
        Self {
            kind: channel.update_type(),
            channel,
            cycle,
            timestamp,
            data,
        }
    }
}
