// ── Refresh orchestrator ──
//
// Owns the refresh state machine and drives one cycle end to end:
// concurrent per-resource resolution through the fallback chain, then
// normalize → evaluate/infer → store → broadcast, strictly in order.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use fortiwatch_api::{GatewayClient, Resource};
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use strum::{Display, IntoEnumIterator};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broadcast::{Channel, Hub, PublishStats};
use crate::cache::{CacheLayer, DiskCache, MemoryCache, Recall};
use crate::config::MonitorConfig;
use crate::error::CoreError;
use crate::fallback::FallbackStore;
use crate::health;
use crate::model::{
    DataSource, Device, DevicesView, FleetSnapshot, MetricsSample, SourceOrigin, SourceReport,
};
use crate::normalize;
use crate::store::SnapshotStore;
use crate::topology::TopologyEngine;

// ── State machine ────────────────────────────────────────────────

/// Refresh state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RefreshState {
    Idle,
    Refreshing,
    /// Every resource fell through to the static dataset or nothing.
    /// Transient: the machine returns to `Idle` once the cycle is out.
    Faulted,
}

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Trigger {
    Timer,
    Manual,
}

/// Summary of one completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub trigger: Trigger,
    pub data_source: DataSource,
    pub sources: SourceReport,
    pub faulted: bool,
    pub alerts: usize,
    pub elapsed: Duration,
    pub published: PublishStats,
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Completed(CycleReport),
    /// A cycle was already in flight; this trigger was dropped.
    Rejected,
}

impl RefreshOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Rejected => None,
        }
    }
}

/// Returns the machine to `Idle` however the cycle ends.
struct RefreshGuard<'a>(&'a watch::Sender<RefreshState>);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(RefreshState::Idle);
    }
}

/// Outcome of walking the fallback chain for one resource.
struct Resolved {
    resource: Resource,
    origin: SourceOrigin,
    payload: Option<Arc<Value>>,
    stale_disk: Option<Duration>,
}

// ── Orchestrator ─────────────────────────────────────────────────

/// The pipeline's entry point.
///
/// Cheaply cloneable via `Arc<OrchestratorInner>`. Call
/// [`start()`](Self::start) for the long-running monitor, or
/// [`oneshot()`](Self::oneshot) for a single cycle.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    config: MonitorConfig,
    client: GatewayClient,
    cache: CacheLayer,
    fallback: FallbackStore,
    topology: TopologyEngine,
    hub: Hub,
    store: SnapshotStore,
    state: watch::Sender<RefreshState>,
    cycles: AtomicU64,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Build the pipeline. Does NOT contact the gateway.
    pub fn new(config: MonitorConfig) -> Result<Self, CoreError> {
        let client = GatewayClient::new(
            config.url.clone(),
            config.vdom.clone(),
            config.auth.clone().into(),
            &config.transport(),
            config.retry,
        )?;

        let disk = config
            .cache
            .dir
            .as_ref()
            .map(|dir| DiskCache::new(dir, config.cache.max_staleness));
        let cache = CacheLayer::new(MemoryCache::new(config.cache.memory_ttl), disk);

        let fallback = match &config.fallback_path {
            Some(path) => FallbackStore::from_path(path),
            None => FallbackStore::bundled(),
        };

        let (state, _) = watch::channel(RefreshState::Idle);

        Ok(Self {
            inner: Arc::new(OrchestratorInner {
                topology: TopologyEngine::new(config.topology.clone()),
                hub: Hub::new(config.broadcast.client_buffer),
                store: SnapshotStore::new(config.history_capacity),
                client,
                cache,
                fallback,
                state,
                cycles: AtomicU64::new(0),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
                config,
            }),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn hub(&self) -> &Hub {
        &self.inner.hub
    }

    /// A token cancelled by [`shutdown()`](Self::shutdown).
    pub fn cancellation(&self) -> CancellationToken {
        self.inner.cancel.child_token()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Log in, run the first cycle, and spawn the refresh timer.
    ///
    /// A failed login is not fatal: cycles still serve cached or
    /// fallback data.
    pub async fn start(&self) -> RefreshOutcome {
        if let Err(e) = self.inner.client.login().await {
            warn!(error = %e, "gateway login failed, continuing with cached data");
        }

        let outcome = self.trigger(Trigger::Manual).await;

        let interval = self.inner.config.refresh_interval;
        if !interval.is_zero() {
            let orchestrator = self.clone();
            let cancel = self.inner.cancel.clone();
            self.inner
                .task_handles
                .lock()
                .await
                .push(tokio::spawn(refresh_task(orchestrator, interval, cancel)));
        }
        info!(url = %self.inner.config.url, interval = ?interval, "monitor started");
        outcome
    }

    /// Cancel background tasks, wait for them, and end the session.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        if self.inner.client.credentials().is_session() {
            if let Err(e) = self.inner.client.logout().await {
                warn!(error = %e, "logout failed (non-fatal)");
            }
        }
        debug!("monitor stopped");
    }

    /// One cycle without background tasks. Used by the CLI read commands.
    pub async fn oneshot(config: MonitorConfig) -> Result<Arc<FleetSnapshot>, CoreError> {
        let mut cfg = config;
        cfg.refresh_interval = Duration::ZERO;

        let orchestrator = Self::new(cfg)?;
        let outcome = orchestrator.start().await;
        orchestrator.shutdown().await;

        if let RefreshOutcome::Completed(report) = &outcome {
            debug!(cycle = report.cycle, source = %report.data_source, "oneshot cycle done");
        }
        orchestrator
            .inner
            .store
            .latest()
            .ok_or_else(|| CoreError::Internal("oneshot cycle produced no snapshot".into()))
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Run one cycle, unless one is already running.
    pub async fn trigger(&self, trigger: Trigger) -> RefreshOutcome {
        let acquired = self.inner.state.send_if_modified(|state| {
            if *state == RefreshState::Refreshing {
                false
            } else {
                *state = RefreshState::Refreshing;
                true
            }
        });
        if !acquired {
            debug!(%trigger, "refresh already in progress, trigger dropped");
            return RefreshOutcome::Rejected;
        }

        let _guard = RefreshGuard(&self.inner.state);
        RefreshOutcome::Completed(self.run_cycle(trigger).await)
    }

    async fn run_cycle(&self, trigger: Trigger) -> CycleReport {
        let started = Instant::now();
        let cycle = self.inner.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(cycle, %trigger, "refresh cycle started");

        let purged = self.inner.cache.memory().purge_expired();
        if purged > 0 {
            debug!(purged, "expired memory cache entries removed");
        }

        // Fan out; nothing downstream starts until every resource resolves.
        let resolved = join_all(Resource::iter().map(|r| self.resolve(r))).await;

        let mut sources = SourceReport::default();
        let mut payloads: HashMap<Resource, Arc<Value>> = HashMap::new();
        for r in resolved {
            sources.record(r.resource, r.origin);
            if let Some(age) = r.stale_disk {
                sources.record_stale(r.resource, age);
            }
            if r.origin == SourceOrigin::Fallback {
                sources.fallback_version = self.inner.fallback.version().map(str::to_owned);
            }
            if let Some(payload) = r.payload {
                payloads.insert(r.resource, payload);
            }
        }

        let empty = Value::Null;
        let raw = |r: Resource| payloads.get(&r).map_or(&empty, |p| &**p);

        let gateway = normalize::normalize_gateway(raw(Resource::SystemStatus));
        let access_points = normalize::normalize_access_points(raw(Resource::AccessPoints));
        let switches = normalize::normalize_switches(raw(Resource::Switches));
        let endpoints = normalize::normalize_endpoints(raw(Resource::Endpoints));
        let usage = normalize::normalize_usage(raw(Resource::ResourceUsage));

        let devices: Vec<Device> = access_points
            .iter()
            .cloned()
            .map(Device::from)
            .chain(switches.iter().cloned().map(Device::from))
            .collect();
        let (metrics, alerts) = health::evaluate(&devices, &sources);
        let topology = self.inner.topology.infer(&gateway, &devices, &endpoints);

        let faulted = sources.all_exhausted();
        let data_source = sources.data_source();
        let snapshot = Arc::new(FleetSnapshot {
            cycle,
            generated_at: Utc::now(),
            data_source,
            sources: sources.clone(),
            faulted,
            gateway,
            access_points,
            switches,
            endpoints,
            metrics,
            alerts,
            topology,
            usage,
        });

        if faulted {
            self.inner.state.send_replace(RefreshState::Faulted);
            error!(cycle, %data_source, "no live or cached data for any resource");
        }

        self.inner.store.publish(Arc::clone(&snapshot));
        let published = self.broadcast(&snapshot);

        let report = CycleReport {
            cycle,
            trigger,
            data_source,
            sources,
            faulted,
            alerts: snapshot.alerts.len(),
            elapsed: started.elapsed(),
            published,
        };
        info!(
            cycle,
            %trigger,
            %data_source,
            access_points = snapshot.access_points.len(),
            switches = snapshot.switches.len(),
            alerts = report.alerts,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "refresh cycle complete"
        );
        report
    }

    /// Walk live → memory → fresh disk → static fallback for one resource.
    async fn resolve(&self, resource: Resource) -> Resolved {
        let key = resource.cache_key();

        match self.inner.client.fetch(resource).await {
            Ok(value) => {
                let payload = Arc::new(value);
                self.inner.cache.store(key, Arc::clone(&payload)).await;
                return Resolved {
                    resource,
                    origin: SourceOrigin::Live,
                    payload: Some(payload),
                    stale_disk: None,
                };
            }
            Err(e) => {
                let e = CoreError::from(e);
                warn!(%resource, error = %e, "live fetch failed, trying cache");
            }
        }

        let stale_disk = match self.inner.cache.recall(key).await {
            Recall::Memory(hit) => {
                return Resolved {
                    resource,
                    origin: SourceOrigin::MemoryCache {
                        age_secs: hit.age.as_secs(),
                    },
                    payload: Some(hit.payload),
                    stale_disk: None,
                };
            }
            Recall::Disk(hit) => {
                return Resolved {
                    resource,
                    origin: SourceOrigin::DiskCache {
                        age_secs: hit.age.as_secs(),
                    },
                    payload: Some(hit.payload),
                    stale_disk: None,
                };
            }
            Recall::Miss { stale_disk } => stale_disk,
        };

        match self.inner.fallback.payload(resource) {
            Ok(value) => {
                warn!(%resource, "no usable cache, serving static fallback");
                Resolved {
                    resource,
                    origin: SourceOrigin::Fallback,
                    payload: Some(Arc::new(value)),
                    stale_disk,
                }
            }
            Err(e) => {
                error!(%resource, error = %e, "every data source failed");
                Resolved {
                    resource,
                    origin: SourceOrigin::Unavailable,
                    payload: None,
                    stale_disk,
                }
            }
        }
    }

    /// Publish the cycle to every channel, in a fixed order.
    fn broadcast(&self, snapshot: &FleetSnapshot) -> PublishStats {
        let payloads = [
            (Channel::Fortiaps, serde_json::to_value(&snapshot.access_points)),
            (Channel::Fortiswitches, serde_json::to_value(&snapshot.switches)),
            (Channel::Devices, serde_json::to_value(DevicesView::from(snapshot))),
            (Channel::Topology, serde_json::to_value(&snapshot.topology)),
            (Channel::History, serde_json::to_value(self.inner.store.history())),
        ];

        let mut total = PublishStats::default();
        for (channel, value) in payloads {
            let published = value.and_then(|data| {
                self.inner
                    .hub
                    .publish_update(channel, snapshot.cycle, snapshot.generated_at, &data)
            });
            match published {
                Ok(stats) => {
                    total.delivered += stats.delivered;
                    total.dropped += stats.dropped;
                    total.closed += stats.closed;
                }
                Err(e) => warn!(%channel, error = %e, "cannot encode channel payload"),
            }
        }
        total
    }

    // ── State observation ────────────────────────────────────────

    pub fn state(&self) -> watch::Receiver<RefreshState> {
        self.inner.state.subscribe()
    }

    pub fn current_state(&self) -> RefreshState {
        *self.inner.state.borrow()
    }

    /// Cycles started so far. Rejected triggers do not count.
    pub fn cycle_count(&self) -> u64 {
        self.inner.cycles.load(Ordering::SeqCst)
    }

    pub fn latest(&self) -> Option<Arc<FleetSnapshot>> {
        self.inner.store.latest()
    }

    pub fn history(&self) -> Vec<MetricsSample> {
        self.inner.store.history()
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Trigger a cycle every `period` until cancelled.
async fn refresh_task(orchestrator: Orchestrator, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let RefreshOutcome::Rejected = orchestrator.trigger(Trigger::Timer).await {
                    debug!("timer tick skipped, manual refresh in progress");
                }
            }
        }
    }
}
