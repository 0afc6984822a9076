//! Navigation graph: an id-indexed node table plus an edge table keyed by
//! ordered id pairs.
//!
//! Topology is fixed once the builder finishes. Only the hazard attributes
//! (`blocked`, `smoke_level`) change during a scenario. Lookups of unknown
//! ids log a warning and do nothing.
//!
//! An edge counts as blocked when its own flag is set *or* either endpoint
//! is blocked. Blocking a node therefore blocks every incident edge, and
//! unblocking it restores exactly the previous edge state, including edges
//! that collapsed independently.

use crate::constants::{routing, NodeType};
use crate::layout::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Ordered endpoint pair used as the edge table key.
pub type EdgeKey = (String, String);

/// Build the canonical key for an undirected edge.
pub fn edge_key(a: &str, b: &str) -> EdgeKey {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Format an edge key as the `"from-to"` string used in descriptors and state.
pub fn edge_label(key: &EdgeKey) -> String {
    format!("{}-{}", key.0, key.1)
}

/// A navigable point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub position: Vec3,
    pub floor: i32,
    pub node_type: NodeType,
    pub neighbors: BTreeSet<String>,
    pub blocked: bool,
    /// Smoke density in [0, 1].
    pub smoke_level: f32,
    pub room_label: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, position: Vec3, floor: i32, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            position,
            floor,
            node_type,
            neighbors: BTreeSet::new(),
            blocked: false,
            smoke_level: 0.0,
            room_label: None,
        }
    }

    pub fn with_room_label(mut self, label: impl Into<String>) -> Self {
        self.room_label = Some(label.into());
        self
    }
}

/// An undirected connection. `from <= to` by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    /// Geometric cost before hazard penalties.
    pub weight: f32,
    /// Set by collapse or explicit scenario input, independent of endpoint
    /// state. Use `Graph::is_edge_blocked` or `Graph::edge_state` for
    /// effective passability.
    pub blocked: bool,
}

/// The navigation graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: BTreeMap<String, Node>,
    edges: BTreeMap<EdgeKey, Edge>,
    floors: BTreeMap<i32, Vec<String>>,
    exits: BTreeSet<String>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Construction ────────────────────────────────────────────────────

    /// Insert a node. A duplicate id is rejected with a warning.
    pub fn add_node(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(&node.id) {
            log::warn!("Node {} already exists, ignoring duplicate", node.id);
            return false;
        }
        self.floors
            .entry(node.floor)
            .or_default()
            .push(node.id.clone());
        if node.node_type.is_exit() {
            self.exits.insert(node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node);
        true
    }

    /// Connect two existing nodes. Re-adding an edge keeps the lower weight.
    pub fn add_edge(&mut self, a: &str, b: &str, weight: f32) -> bool {
        if a == b {
            return false;
        }
        if !self.nodes.contains_key(a) || !self.nodes.contains_key(b) {
            log::warn!("Cannot add edge {}-{}: unknown endpoint", a, b);
            return false;
        }
        let weight = weight.max(0.0);
        let key = edge_key(a, b);
        match self.edges.get_mut(&key) {
            Some(edge) => edge.weight = edge.weight.min(weight),
            None => {
                self.edges.insert(
                    key.clone(),
                    Edge {
                        from: key.0.clone(),
                        to: key.1.clone(),
                        weight,
                        blocked: false,
                    },
                );
            }
        }
        if let Some(node) = self.nodes.get_mut(a) {
            node.neighbors.insert(b.to_string());
        }
        if let Some(node) = self.nodes.get_mut(b) {
            node.neighbors.insert(a.to_string());
        }
        true
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// The stored edge. Its `blocked` flag is only the edge's own flag; an
    /// edge touching a blocked node still reads `false` here.
    pub fn edge(&self, a: &str, b: &str) -> Option<&Edge> {
        self.edges.get(&edge_key(a, b))
    }

    /// Copy of an edge with `blocked` resolved against its endpoints, for
    /// snapshots handed to external consumers.
    pub fn edge_state(&self, a: &str, b: &str) -> Option<Edge> {
        let edge = self.edges.get(&edge_key(a, b))?;
        Some(Edge {
            blocked: self.is_edge_blocked(a, b),
            ..edge.clone()
        })
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn floors(&self) -> impl Iterator<Item = i32> + '_ {
        self.floors.keys().copied()
    }

    pub fn nodes_on_floor(&self, floor: i32) -> Vec<&Node> {
        self.floors
            .get(&floor)
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn exit_ids(&self) -> &BTreeSet<String> {
        &self.exits
    }

    pub fn exit_nodes(&self) -> Vec<&Node> {
        self.exits
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    pub fn is_exit(&self, id: &str) -> bool {
        self.exits.contains(id)
    }

    /// Neighbor ids of a node (empty for unknown ids).
    pub fn neighbors(&self, id: &str) -> impl Iterator<Item = &str> {
        self.nodes
            .get(id)
            .into_iter()
            .flat_map(|n| n.neighbors.iter().map(String::as_str))
    }

    /// Neighbors reachable over an unblocked edge into an unblocked node.
    pub fn unblocked_neighbors(&self, id: &str) -> Vec<&str> {
        if self.is_node_blocked(id) {
            return Vec::new();
        }
        self.neighbors(id)
            .filter(|n| !self.is_edge_blocked(id, n))
            .collect()
    }

    pub fn is_node_blocked(&self, id: &str) -> bool {
        self.nodes.get(id).map(|n| n.blocked).unwrap_or(false)
    }

    /// True if the edge is missing, flagged, or touches a blocked node.
    pub fn is_edge_blocked(&self, a: &str, b: &str) -> bool {
        match self.edges.get(&edge_key(a, b)) {
            Some(edge) => edge.blocked || self.is_node_blocked(a) || self.is_node_blocked(b),
            None => true,
        }
    }

    pub fn smoke_level(&self, id: &str) -> f32 {
        self.nodes.get(id).map(|n| n.smoke_level).unwrap_or(0.0)
    }

    /// Traversal cost of `a -> b`: base weight scaled up by the mean endpoint
    /// smoke. Infinite if the edge is missing or blocked.
    pub fn effective_weight(&self, a: &str, b: &str) -> f32 {
        let Some(edge) = self.edges.get(&edge_key(a, b)) else {
            log::warn!("No edge {}-{}", a, b);
            return f32::INFINITY;
        };
        let (Some(na), Some(nb)) = (self.nodes.get(a), self.nodes.get(b)) else {
            return f32::INFINITY;
        };
        if edge.blocked || na.blocked || nb.blocked {
            return f32::INFINITY;
        }
        let mean_smoke = (na.smoke_level + nb.smoke_level) / 2.0;
        edge.weight * (1.0 + routing::SMOKE_PENALTY_FACTOR * mean_smoke)
    }

    /// Closest node to a position, across all floors.
    pub fn nearest_node(&self, position: &Vec3) -> Option<&Node> {
        nearest(self.nodes.values(), position)
    }

    /// Closest node on a given floor.
    pub fn nearest_node_on_floor(&self, position: &Vec3, floor: i32) -> Option<&Node> {
        nearest(self.nodes_on_floor(floor).into_iter(), position)
    }

    /// Resolve a `"from-to"` string into an edge key. Ids may themselves
    /// contain `-`, so every split point is tried against the node table.
    pub fn parse_edge_key(&self, label: &str) -> Option<EdgeKey> {
        label
            .match_indices('-')
            .map(|(i, _)| (&label[..i], &label[i + 1..]))
            .find(|(a, b)| self.edges.contains_key(&edge_key(a, b)))
            .map(|(a, b)| edge_key(a, b))
    }

    // ── Hazard mutation ─────────────────────────────────────────────────

    /// Block a node; every incident edge reports blocked from now on.
    pub fn block_node(&mut self, id: &str) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.blocked = true;
                true
            }
            None => {
                log::warn!("Cannot block unknown node {}", id);
                false
            }
        }
    }

    pub fn unblock_node(&mut self, id: &str) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.blocked = false;
                true
            }
            None => {
                log::warn!("Cannot unblock unknown node {}", id);
                false
            }
        }
    }

    pub fn block_edge(&mut self, a: &str, b: &str) -> bool {
        match self.edges.get_mut(&edge_key(a, b)) {
            Some(edge) => {
                edge.blocked = true;
                true
            }
            None => {
                log::warn!("Cannot block unknown edge {}-{}", a, b);
                false
            }
        }
    }

    pub fn unblock_edge(&mut self, a: &str, b: &str) -> bool {
        match self.edges.get_mut(&edge_key(a, b)) {
            Some(edge) => {
                edge.blocked = false;
                true
            }
            None => {
                log::warn!("Cannot unblock unknown edge {}-{}", a, b);
                false
            }
        }
    }

    /// Set a node's smoke level, clamped to [0, 1].
    pub fn set_smoke_level(&mut self, id: &str, level: f32) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.smoke_level = if level.is_nan() {
                    0.0
                } else {
                    level.clamp(0.0, 1.0)
                };
                true
            }
            None => {
                log::warn!("Cannot set smoke on unknown node {}", id);
                false
            }
        }
    }

    /// Edges that are currently passable, in key order.
    pub fn unblocked_edge_keys(&self) -> Vec<EdgeKey> {
        self.edges
            .iter()
            .filter(|(key, _)| !self.is_edge_blocked(&key.0, &key.1))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Clear every blocked flag and smoke level. Topology is untouched.
    pub fn clear_hazards(&mut self) {
        for node in self.nodes.values_mut() {
            node.blocked = false;
            node.smoke_level = 0.0;
        }
        for edge in self.edges.values_mut() {
            edge.blocked = false;
        }
    }

    /// Check structural invariants. Returns one message per violation.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (key, edge) in &self.edges {
            for end in [&key.0, &key.1] {
                if !self.nodes.contains_key(end) {
                    problems.push(format!(
                        "Edge {} references missing node {}",
                        edge_label(key),
                        end
                    ));
                }
            }
            if edge.weight.is_nan() || edge.weight < 0.0 {
                problems.push(format!(
                    "Edge {} has invalid weight {}",
                    edge_label(key),
                    edge.weight
                ));
            }
        }
        for node in self.nodes.values() {
            for n in &node.neighbors {
                if !self.edges.contains_key(&edge_key(&node.id, n)) {
                    problems.push(format!("Node {} lists {} without an edge", node.id, n));
                }
            }
            if !(0.0..=1.0).contains(&node.smoke_level) {
                problems.push(format!(
                    "Node {} smoke {} out of range",
                    node.id, node.smoke_level
                ));
            }
        }
        problems
    }
}

fn nearest<'a>(nodes: impl Iterator<Item = &'a Node>, position: &Vec3) -> Option<&'a Node> {
    nodes.min_by(|a, b| {
        a.position
            .distance(position)
            .total_cmp(&b.position.distance(position))
    })
}
