//! Scenario descriptor (input from the scenario generator) and the
//! scenario state snapshot (output to UI, telemetry and scoring).
//!
//! Descriptors are read defensively: every list defaults to empty, and an
//! empty `availableExits` is filled in by the simulation from the start
//! floor's exits.
//!
//! ```
//! use evacsim_logic::scenario::ScenarioDescriptor;
//!
//! let d = ScenarioDescriptor::from_json(r#"{ "startPosition": { "x": 4.0, "y": 6.0 } }"#).unwrap();
//! assert!(d.fire_locations.is_empty());
//! assert!(d.available_exits.is_empty());
//! ```

use crate::error::ScenarioError;
use crate::layout::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A fire the generator placed in the building.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireLocation {
    pub position: Vec3,
    pub intensity: f32,
    #[serde(default)]
    pub description: String,
}

/// A smoke-filled area. Either explicit node ids, a room/region label, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmokeAreaSpec {
    #[serde(default)]
    pub nodes: Vec<String>,
    pub level: f32,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Initial hazard/exit layout for one run, as produced by the generator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDescriptor {
    #[serde(default)]
    pub scenario_id: Option<String>,
    pub start_position: Vec3,
    #[serde(default)]
    pub fire_locations: Vec<FireLocation>,
    #[serde(default)]
    pub smoke_areas: Vec<SmokeAreaSpec>,
    #[serde(default)]
    pub blocked_nodes: Vec<String>,
    /// Edges as `"fromId-toId"` strings.
    #[serde(default)]
    pub blocked_paths: Vec<String>,
    #[serde(default)]
    pub available_exits: Vec<String>,
    #[serde(default)]
    pub correct_path: Vec<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Seconds a competent evacuee should need.
    #[serde(default)]
    pub estimated_time_to_safety: f32,
}

impl ScenarioDescriptor {
    /// A hazard-free scenario starting at `start_position`.
    pub fn new(start_position: Vec3) -> Self {
        Self {
            start_position,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A live fire in the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireInstance {
    pub position: Vec3,
    /// Intensity in [0, 1]. Never decreases.
    pub intensity: f32,
    pub node_id: Option<String>,
    pub created_at: f32,
    /// Seconds since ignition.
    pub age: f32,
}

/// A live smoke area. `level` mirrors onto every covered node each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmokeArea {
    pub nodes: Vec<String>,
    pub level: f32,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    NotStarted,
    InProgress,
    Completed,
}

/// How a completed scenario ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Reached an available exit alive.
    Safe,
    /// Left through a registered exit the scenario did not offer.
    Unsafe,
    Timeout,
    Death,
    /// No unblocked route to any available exit remains.
    Trapped,
}

/// Everything external layers see about a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioState {
    pub scenario_id: String,
    pub start_time: f32,
    pub current_time: f32,
    pub player_position: Vec3,
    pub player_node: Option<String>,
    pub current_floor: i32,
    pub fire_instances: Vec<FireInstance>,
    pub smoke_areas: Vec<SmokeArea>,
    pub blocked_nodes: BTreeSet<String>,
    /// Blocked edges as `"from-to"` labels.
    pub blocked_edges: BTreeSet<String>,
    /// Nodes currently on fire (ignition points and spread).
    pub burning_nodes: BTreeSet<String>,
    pub available_exits: Vec<String>,
    /// Visited nodes in first-visit order, no repeats.
    pub path_taken: Vec<String>,
    pub status: ScenarioStatus,
    pub outcome: Option<Outcome>,
    pub time_to_safety: Option<f32>,
    pub estimated_time_to_safety: f32,
    pub player_health: f32,
    pub player_alive: bool,
}

impl ScenarioState {
    pub fn new(scenario_id: impl Into<String>, player_position: Vec3) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            start_time: 0.0,
            current_time: 0.0,
            player_position,
            player_node: None,
            current_floor: 0,
            fire_instances: Vec::new(),
            smoke_areas: Vec::new(),
            blocked_nodes: BTreeSet::new(),
            blocked_edges: BTreeSet::new(),
            burning_nodes: BTreeSet::new(),
            available_exits: Vec::new(),
            path_taken: Vec::new(),
            status: ScenarioStatus::NotStarted,
            outcome: None,
            time_to_safety: None,
            estimated_time_to_safety: 0.0,
            player_health: crate::constants::vitals::MAX_HEALTH,
            player_alive: true,
        }
    }

    /// Simulated seconds since the run started.
    pub fn elapsed(&self) -> f32 {
        self.current_time - self.start_time
    }

    pub fn is_complete(&self) -> bool {
        self.status == ScenarioStatus::Completed
    }

    pub fn is_exit_available(&self, node_id: &str) -> bool {
        self.available_exits.iter().any(|e| e == node_id)
    }

    /// Densest smoke covering a node, 0 if none.
    pub fn smoke_level_at(&self, node_id: &str) -> f32 {
        self.smoke_areas
            .iter()
            .filter(|a| a.nodes.iter().any(|n| n == node_id))
            .map(|a| a.level)
            .fold(0.0, f32::max)
    }

    /// Append a node to the visited path unless already present.
    pub fn record_visit(&mut self, node_id: &str) -> bool {
        if self.path_taken.iter().any(|n| n == node_id) {
            return false;
        }
        self.path_taken.push(node_id.to_string());
        true
    }
}
