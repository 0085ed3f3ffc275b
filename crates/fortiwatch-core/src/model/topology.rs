// ── Topology graph ──

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use super::device::{DeviceStatus, LinkStatus};

/// Node id of the single root.
pub const GATEWAY_NODE_ID: &str = "gateway";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeKind {
    Gateway,
    Switch,
    AccessPoint,
    Endpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeviceStatus>,
}

/// A directed parent → child link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyEdge {
    pub from: String,
    pub to: String,
    /// Port or interface the link runs over.
    pub via: String,
    pub status: LinkStatus,
    /// The port was invented because no switch reported this neighbour.
    #[serde(default)]
    pub synthesized: bool,
}

/// Inferred physical connectivity, a tree rooted at the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyGraph {
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyViolation {
    #[error("graph has no gateway node")]
    MissingGateway,
    #[error("duplicate node id {0}")]
    DuplicateNode(String),
    #[error("edge {from} -> {to} references an unknown node")]
    DanglingEdge { from: String, to: String },
    #[error("gateway has an inbound edge from {0}")]
    GatewayHasParent(String),
    #[error("node {id} has {count} inbound edges")]
    InboundCount { id: String, count: usize },
    #[error("node {0} is not reachable from the gateway")]
    Unreachable(String),
}

impl TopologyGraph {
    pub fn node(&self, id: &str) -> Option<&TopologyNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The single inbound edge of `id`, if any.
    pub fn parent_edge(&self, id: &str) -> Option<&TopologyEdge> {
        self.edges.iter().find(|e| e.to == id)
    }

    pub fn children(&self, id: &str) -> impl Iterator<Item = &TopologyEdge> {
        self.edges.iter().filter(move |e| e.from == id)
    }

    /// Check the tree invariants: one gateway root, every other node
    /// has exactly one inbound edge, and everything is reachable.
    pub fn validate(&self) -> Result<(), TopologyViolation> {
        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(TopologyViolation::DuplicateNode(node.id.clone()));
            }
        }
        if !ids.contains(GATEWAY_NODE_ID) {
            return Err(TopologyViolation::MissingGateway);
        }

        let mut inbound: HashMap<&str, usize> = HashMap::with_capacity(self.nodes.len());
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            if !ids.contains(edge.from.as_str()) || !ids.contains(edge.to.as_str()) {
                return Err(TopologyViolation::DanglingEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                });
            }
            if edge.to == GATEWAY_NODE_ID {
                return Err(TopologyViolation::GatewayHasParent(edge.from.clone()));
            }
            *inbound.entry(edge.to.as_str()).or_default() += 1;
            adjacency
                .entry(edge.from.as_str())
                .or_default()
                .push(edge.to.as_str());
        }

        for node in self.nodes.iter().filter(|n| n.id != GATEWAY_NODE_ID) {
            let count = inbound.get(node.id.as_str()).copied().unwrap_or(0);
            if count != 1 {
                return Err(TopologyViolation::InboundCount {
                    id: node.id.clone(),
                    count,
                });
            }
        }

        // With one parent each, reaching every node from the root also
        // rules out cycles.
        let mut seen: HashSet<&str> = HashSet::with_capacity(ids.len());
        let mut queue = VecDeque::from([GATEWAY_NODE_ID]);
        while let Some(id) = queue.pop_front() {
            if seen.insert(id) {
                if let Some(next) = adjacency.get(id) {
                    queue.extend(next.iter().copied());
                }
            }
        }
        if let Some(node) = self.nodes.iter().find(|n| !seen.contains(n.id.as_str())) {
            return Err(TopologyViolation::Unreachable(node.id.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, kind: NodeKind) -> TopologyNode {
        TopologyNode {
            id: id.into(),
            label: id.into(),
            kind,
            status: None,
        }
    }

    fn edge(from: &str, to: &str) -> TopologyEdge {
        TopologyEdge {
            from: from.into(),
            to: to.into(),
            via: "port1".into(),
            status: LinkStatus::Up,
            synthesized: false,
        }
    }

    #[test]
    fn valid_tree_passes() {
        let graph = TopologyGraph {
            nodes: vec![
                node("gateway", NodeKind::Gateway),
                node("switch:core", NodeKind::Switch),
                node("ap:lobby", NodeKind::AccessPoint),
            ],
            edges: vec![edge("gateway", "switch:core"), edge("switch:core", "ap:lobby")],
        };
        assert_eq!(graph.validate(), Ok(()));
    }

    #[test]
    fn orphan_is_rejected() {
        let graph = TopologyGraph {
            nodes: vec![node("gateway", NodeKind::Gateway), node("ap:x", NodeKind::AccessPoint)],
            edges: vec![],
        };
        assert_eq!(
            graph.validate(),
            Err(TopologyViolation::InboundCount {
                id: "ap:x".into(),
                count: 0
            })
        );
    }

    #[test]
    fn detached_cycle_is_unreachable() {
        let graph = TopologyGraph {
            nodes: vec![
                node("gateway", NodeKind::Gateway),
                node("switch:a", NodeKind::Switch),
                node("switch:b", NodeKind::Switch),
            ],
            edges: vec![edge("switch:a", "switch:b"), edge("switch:b", "switch:a")],
        };
        assert!(matches!(
            graph.validate(),
            Err(TopologyViolation::Unreachable(_))
        ));
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let graph = TopologyGraph {
            nodes: vec![node("gateway", NodeKind::Gateway)],
            edges: vec![edge("gateway", "switch:ghost")],
        };
        assert!(matches!(
            graph.validate(),
            Err(TopologyViolation::DanglingEdge { .. })
        ));
    }
}
