// ── Latest-cycle store ──
//
// Holds the most recent completed snapshot for readers plus a bounded
// ring of per-cycle metrics. Readers never trigger a fetch.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::model::{FleetSnapshot, MetricsSample};

pub struct SnapshotStore {
    latest: watch::Sender<Option<Arc<FleetSnapshot>>>,
    history: Mutex<VecDeque<MetricsSample>>,
    capacity: usize,
}

impl SnapshotStore {
    pub fn new(capacity: usize) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            latest,
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Replace the current snapshot and append its sample to the history.
    pub fn publish(&self, snapshot: Arc<FleetSnapshot>) {
        if self.capacity > 0 {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            while history.len() >= self.capacity {
                history.pop_front();
            }
            history.push_back(snapshot.sample());
        }
        self.latest.send_replace(Some(snapshot));
    }

    pub fn latest(&self) -> Option<Arc<FleetSnapshot>> {
        self.latest.borrow().clone()
    }

    /// Samples oldest first.
    pub fn history(&self) -> Vec<MetricsSample> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("cycle", &self.latest().map(|s| s.cycle))
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
