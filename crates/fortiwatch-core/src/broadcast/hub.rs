// ── Subscription registry and fan-out ──
//
// Each connected client owns a bounded outbound queue. Publishing never
// awaits: a full queue drops that frame for that client only, a closed
// queue unregisters the client.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use super::protocol::{Channel, UpdateFrame};

/// An encoded text frame, shared across recipients.
pub type Frame = Arc<str>;

pub const DEFAULT_CLIENT_BUFFER: usize = 32;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub delivered: usize,
    /// Skipped because the client's queue was full.
    pub dropped: usize,
    /// Recipients found gone and unregistered.
    pub closed: usize,
}

/// Channel registry shared by the server and the orchestrator.
///
/// Cheaply cloneable; all clones see the same clients.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    clients: DashMap<Uuid, mpsc::Sender<Frame>>,
    channels: DashMap<Channel, HashSet<Uuid>>,
    latest: DashMap<Channel, Frame>,
    client_buffer: usize,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_BUFFER)
    }
}

impl Hub {
    pub fn new(client_buffer: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                clients: DashMap::new(),
                channels: DashMap::new(),
                latest: DashMap::new(),
                client_buffer: client_buffer.max(1),
            }),
        }
    }

    /// Add a client and hand back its id and outbound queue.
    pub fn register(&self) -> (Uuid, mpsc::Receiver<Frame>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.inner.client_buffer);
        self.inner.clients.insert(id, tx);
        debug!(client = %id, "client registered");
        (id, rx)
    }

    /// Returns `true` only when this adds a new subscription: `false` for
    /// an unknown (already disconnected) client or a repeat subscribe.
    pub fn subscribe(&self, client: Uuid, channel: Channel) -> bool {
        if !self.inner.clients.contains_key(&client) {
            return false;
        }
        let added = self.inner.channels.entry(channel).or_default().insert(client);
        if added {
            debug!(client = %client, %channel, "subscribed");
        }
        added
    }

    pub fn unsubscribe(&self, client: Uuid, channel: Channel) {
        if let Some(mut members) = self.inner.channels.get_mut(&channel) {
            members.remove(&client);
        }
        self.inner
            .channels
            .remove_if(&channel, |_, members| members.is_empty());
    }

    /// Drop the client from every channel and prune channels left empty.
    pub fn disconnect(&self, client: Uuid) {
        self.inner.clients.remove(&client);
        self.inner.channels.retain(|_, members| {
            members.remove(&client);
            !members.is_empty()
        });
        debug!(client = %client, "client unregistered");
    }

    /// Encode one `<channel>:update` frame, remember it as the channel's
    /// latest, and fan it out.
    pub fn publish_update(
        &self,
        channel: Channel,
        cycle: u64,
        timestamp: DateTime<Utc>,
        data: &Value,
    ) -> Result<PublishStats, serde_json::Error> {
        let text = serde_json::to_string(&UpdateFrame::new(channel, cycle, timestamp, data))?;
        Ok(self.publish(channel, Frame::from(text)))
    }

    /// Fan `frame` out to subscribers of `channel` and of `All`.
    pub fn publish(&self, channel: Channel, frame: Frame) -> PublishStats {
        self.inner.latest.insert(channel, Arc::clone(&frame));

        let mut recipients: HashSet<Uuid> = HashSet::new();
        for ch in [channel, Channel::All] {
            if let Some(members) = self.inner.channels.get(&ch) {
                recipients.extend(members.iter().copied());
            }
        }

        let senders: Vec<(Uuid, mpsc::Sender<Frame>)> = recipients
            .into_iter()
            .filter_map(|id| self.inner.clients.get(&id).map(|tx| (id, tx.clone())))
            .collect();

        let mut stats = PublishStats::default();
        let mut gone = Vec::new();
        for (id, tx) in senders {
            match tx.try_send(Arc::clone(&frame)) {
                Ok(()) => stats.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(client = %id, %channel, "client queue full, dropping update");
                    stats.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => gone.push(id),
            }
        }
        stats.closed = gone.len();
        for id in gone {
            self.disconnect(id);
        }
        stats
    }

    /// Most recent frame published on `channel`.
    pub fn latest(&self, channel: Channel) -> Option<Frame> {
        self.inner.latest.get(&channel).map(|f| Arc::clone(&f))
    }

    /// Latest frames a new subscriber to `channel` should receive.
    pub fn replay(&self, channel: Channel) -> Vec<Frame> {
        match channel {
            Channel::All => Channel::PUBLISHED
                .iter()
                .filter_map(|ch| self.latest(*ch))
                .collect(),
            ch => self.latest(ch).into_iter().collect(),
        }
    }

    pub fn client_count(&self) -> usize {
        self.inner.clients.len()
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.inner.channels.get(&channel).map_or(0, |m| m.len())
    }

    /// Channels with at least one subscriber.
    pub fn active_channels(&self) -> usize {
        self.inner.channels.len()
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("clients", &self.client_count())
            .field("channels", &self.active_channels())
            .finish_non_exhaustive()
    }
}
