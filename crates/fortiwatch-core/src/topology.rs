// ── Topology inference ──
//
// Builds the gateway-rooted tree from switch port neighbour data. All
// neighbour resolution goes through a single port lookup built in one
// pass over every switch's ports; nothing here scans switches per AP.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{
    AccessPoint, Device, DeviceStatus, Endpoint, GATEWAY_NODE_ID, GatewayInfo, LinkStatus,
    NodeKind, Switch, TopologyEdge, TopologyGraph, TopologyNode,
};

/// Model prefixes that mark a core/aggregation switch.
pub const DEFAULT_CORE_MODELS: &[&str] = &["FS-448", "FS-548", "FS-1024", "FS-1048", "FS-3032"];

/// Ports a switch is assumed to have when scattering synthesized ports.
const SCATTER_PORT_RANGE: u32 = 48;

const GATEWAY_UPLINK: &str = "fortilink";
const WIRELESS_LINK: &str = "wifi";
const DEFAULT_LAN: &str = "lan";

/// How to label the port of an AP no switch reports as a neighbour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PortSynthesis {
    /// Next free number on the upstream switch, after its highest
    /// reported numeric port.
    #[default]
    Sequential,
    /// A stable pseudo-random port in `1..=48` derived from the seed and
    /// the AP name.
    Scattered { seed: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyOptions {
    pub core_models: Vec<String>,
    pub port_synthesis: PortSynthesis,
}

impl Default for TopologyOptions {
    fn default() -> Self {
        Self {
            core_models: DEFAULT_CORE_MODELS.iter().map(|m| (*m).to_owned()).collect(),
            port_synthesis: PortSynthesis::default(),
        }
    }
}

pub fn switch_node_id(name: &str) -> String {
    format!("switch:{name}")
}

pub fn ap_node_id(name: &str) -> String {
    format!("ap:{name}")
}

pub fn endpoint_node_id(identity: &str) -> String {
    format!("endpoint:{identity}")
}

// ── Port lookup ────────────────────────────────────────────────────

/// Where a neighbour was seen: switch index plus port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRef<'a> {
    pub switch: usize,
    pub port_id: &'a str,
    pub link: LinkStatus,
}

/// Lower-cased neighbour identifier → the first port that reported it.
#[derive(Debug, Default)]
pub struct PortLookup<'a> {
    by_peer: HashMap<String, PortRef<'a>>,
}

impl<'a> PortLookup<'a> {
    pub fn build(switches: &[&'a Switch]) -> Self {
        let capacity = switches.iter().map(|s| s.ports.len()).sum();
        let mut by_peer = HashMap::with_capacity(capacity);
        for (idx, sw) in switches.iter().enumerate() {
            for port in &sw.ports {
                let Some(peer) = port.connected_device.as_deref() else {
                    continue;
                };
                by_peer
                    .entry(peer.trim().to_ascii_lowercase())
                    .or_insert(PortRef {
                        switch: idx,
                        port_id: port.port_id.as_str(),
                        link: port.link,
                    });
            }
        }
        Self { by_peer }
    }

    pub fn get(&self, key: &str) -> Option<PortRef<'a>> {
        self.by_peer.get(&key.trim().to_ascii_lowercase()).copied()
    }

    /// First key that resolves, in order.
    pub fn resolve<'k>(&self, keys: impl IntoIterator<Item = &'k str>) -> Option<PortRef<'a>> {
        keys.into_iter().find_map(|k| self.get(k))
    }

    pub fn len(&self) -> usize {
        self.by_peer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_peer.is_empty()
    }
}

// ── Engine ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct TopologyEngine {
    options: TopologyOptions,
}

impl TopologyEngine {
    pub fn new(options: TopologyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TopologyOptions {
        &self.options
    }

    /// Index of the core switch: first whose name contains "core", else
    /// first whose model starts with a core family.
    pub fn core_switch(&self, switches: &[&Switch]) -> Option<usize> {
        switches
            .iter()
            .position(|s| s.name.to_ascii_lowercase().contains("core"))
            .or_else(|| {
                switches.iter().position(|s| {
                    let model = s.model.to_ascii_uppercase();
                    self.options
                        .core_models
                        .iter()
                        .any(|family| model.starts_with(&family.to_ascii_uppercase()))
                })
            })
    }

    pub fn infer(
        &self,
        gateway: &GatewayInfo,
        devices: &[Device],
        endpoints: &[Endpoint],
    ) -> TopologyGraph {
        let mut builder = Builder::new(gateway);

        // Duplicate names would break the one-parent invariant; keep the first.
        let mut seen = HashSet::new();
        let switches: Vec<&Switch> = devices
            .iter()
            .filter_map(Device::as_switch)
            .filter(|s| dedup(&mut seen, "switch", &s.name))
            .collect();
        let access_points: Vec<&AccessPoint> = devices
            .iter()
            .filter_map(Device::as_access_point)
            .filter(|a| dedup(&mut seen, "access point", &a.name))
            .collect();

        let lookup = PortLookup::build(&switches);
        let core = self.core_switch(&switches);
        debug!(
            switches = switches.len(),
            access_points = access_points.len(),
            lookup = lookup.len(),
            core = core.map(|i| switches[i].name.as_str()),
            "inferring topology"
        );

        for sw in &switches {
            builder.node(switch_node_id(&sw.name), &sw.name, NodeKind::Switch, Some(sw.status));
        }
        for (idx, sw) in switches.iter().enumerate() {
            let (from, via) = match core {
                Some(c) if c != idx => {
                    let core_sw = switches[c];
                    let via = lookup
                        .get(&sw.name)
                        .filter(|p| p.switch == c)
                        .map_or(GATEWAY_UPLINK, |p| p.port_id);
                    (switch_node_id(&core_sw.name), via.to_owned())
                }
                _ => (GATEWAY_NODE_ID.to_owned(), GATEWAY_UPLINK.to_owned()),
            };
            builder.edge(from, switch_node_id(&sw.name), via, sw.status.into(), false);
        }

        let mut synth = PortSynthesizer::new(self.options.port_synthesis, &switches);
        for ap in &access_points {
            let id = ap_node_id(&ap.name);
            builder.node(id.clone(), &ap.name, NodeKind::AccessPoint, Some(ap.status));

            let keys = [
                Some(ap.name.as_str()),
                Some(ap.serial.as_str()),
                ap.mac.as_deref(),
                Some(ap.model.as_str()),
            ];
            if let Some(port) = lookup.resolve(keys.into_iter().flatten()) {
                let status = link_status(port.link, ap.status);
                builder.edge(
                    switch_node_id(&switches[port.switch].name),
                    id,
                    port.port_id.to_owned(),
                    status,
                    false,
                );
                continue;
            }

            let parent = core.or(if switches.is_empty() { None } else { Some(0) });
            let via = synth.next(parent, &ap.name);
            let from = parent.map_or_else(
                || GATEWAY_NODE_ID.to_owned(),
                |i| switch_node_id(&switches[i].name),
            );
            debug!(ap = %ap.name, %from, %via, "no switch reports this AP, synthesizing port");
            builder.edge(from, id, via, ap.status.into(), true);
        }

        let ap_ids: HashSet<&str> = access_points.iter().map(|a| a.name.as_str()).collect();
        for endpoint in endpoints {
            let Some(identity) = endpoint.identity() else {
                continue;
            };
            let id = endpoint_node_id(&identity);
            if builder.has_node(&id) {
                continue;
            }
            let label = endpoint.hostname.clone().unwrap_or_else(|| identity.clone());
            let status = if endpoint.online {
                DeviceStatus::Up
            } else {
                DeviceStatus::Down
            };
            builder.node(id.clone(), &label, NodeKind::Endpoint, Some(status));

            let keys = [endpoint.mac.as_deref(), endpoint.hostname.as_deref()];
            let (from, via) = if let Some(port) = lookup.resolve(keys.into_iter().flatten()) {
                (
                    switch_node_id(&switches[port.switch].name),
                    port.port_id.to_owned(),
                )
            } else if let Some(ap) = endpoint.ap.as_deref().filter(|a| ap_ids.contains(a)) {
                (ap_node_id(ap), WIRELESS_LINK.to_owned())
            } else {
                (
                    GATEWAY_NODE_ID.to_owned(),
                    endpoint
                        .interface
                        .clone()
                        .unwrap_or_else(|| DEFAULT_LAN.to_owned()),
                )
            };
            builder.edge(from, id, via, status.into(), false);
        }

        let graph = builder.finish();
        if let Err(violation) = graph.validate() {
            warn!(%violation, "inferred topology failed validation");
        }
        graph
    }
}

fn dedup(seen: &mut HashSet<(&'static str, String)>, kind: &'static str, name: &str) -> bool {
    let fresh = seen.insert((kind, name.to_owned()));
    if !fresh {
        warn!(kind, name, "duplicate device name, keeping the first");
    }
    fresh
}

fn link_status(port: LinkStatus, device: DeviceStatus) -> LinkStatus {
    if port == LinkStatus::Up && device.is_reachable() {
        LinkStatus::Up
    } else {
        LinkStatus::Down
    }
}

struct Builder {
    graph: TopologyGraph,
    ids: HashSet<String>,
}

impl Builder {
    fn new(gateway: &GatewayInfo) -> Self {
        let mut builder = Self {
            graph: TopologyGraph::default(),
            ids: HashSet::new(),
        };
        builder.node(
            GATEWAY_NODE_ID.to_owned(),
            &gateway.hostname,
            NodeKind::Gateway,
            None,
        );
        builder
    }

    fn has_node(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn node(&mut self, id: String, label: &str, kind: NodeKind, status: Option<DeviceStatus>) {
        self.ids.insert(id.clone());
        self.graph.nodes.push(TopologyNode {
            id,
            label: label.to_owned(),
            kind,
            status,
        });
    }

    fn edge(&mut self, from: String, to: String, via: String, status: LinkStatus, synthesized: bool) {
        self.graph.edges.push(TopologyEdge {
            from,
            to,
            via,
            status,
            synthesized,
        });
    }

    fn finish(self) -> TopologyGraph {
        self.graph
    }
}

// ── Port synthesis ─────────────────────────────────────────────────

struct PortSynthesizer {
    mode: PortSynthesis,
    /// Next free port per upstream; `None` is the gateway.
    next_free: HashMap<Option<usize>, u32>,
}

impl PortSynthesizer {
    fn new(mode: PortSynthesis, switches: &[&Switch]) -> Self {
        let next_free = switches
            .iter()
            .enumerate()
            .map(|(i, sw)| {
                let highest = sw
                    .ports
                    .iter()
                    .filter_map(|p| port_number(&p.port_id))
                    .max()
                    .unwrap_or(0);
                (Some(i), highest + 1)
            })
            .collect();
        Self { mode, next_free }
    }

    fn next(&mut self, upstream: Option<usize>, ap_name: &str) -> String {
        let number = match self.mode {
            PortSynthesis::Sequential => {
                let slot = self.next_free.entry(upstream).or_insert(1);
                let n = *slot;
                *slot += 1;
                n
            }
            PortSynthesis::Scattered { seed } => scatter(seed, ap_name),
        };
        format!("port{number}")
    }
}

/// Trailing digits of a port id: `port12` → 12, `1/0/7` → 7.
fn port_number(port_id: &str) -> Option<u32> {
    let digits: String = port_id
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

/// FNV-1a over seed and name, folded into `1..=48`.
fn scatter(seed: u64, name: &str) -> u32 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    let hash = seed
        .to_le_bytes()
        .iter()
        .chain(name.as_bytes())
        .fold(OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(PRIME));
    let slot = u32::try_from(hash % u64::from(SCATTER_PORT_RANGE)).unwrap_or(0);
    slot + 1
}

// ── Tests ────────────────────────────────────────────────────────────
