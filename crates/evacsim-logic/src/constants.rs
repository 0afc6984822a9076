//! Simulation constants — node types, grid tuning, hazard rates and thresholds.
//!
//! Plain values with no runtime dependency. The builder, pathfinder,
//! simulation and evaluator all read from here so a tuning change lands
//! in one place.

use serde::{Deserialize, Serialize};

/// Kind of navigable point in the building graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Hallway,
    Room,
    Exit,
    Stair,
    Elevator,
}

impl NodeType {
    pub fn is_exit(self) -> bool {
        matches!(self, Self::Exit)
    }

    /// Vertical circulation (stairs, elevators).
    pub fn is_vertical(self) -> bool {
        matches!(self, Self::Stair | Self::Elevator)
    }
}

/// Graph construction tuning.
pub mod grid {
    /// Default spacing between candidate grid points, in building units.
    pub const DEFAULT_RESOLUTION: f32 = 2.0;
    /// Points closer than `resolution * NEIGHBOR_FACTOR` get an edge (covers diagonals).
    pub const NEIGHBOR_FACTOR: f32 = 1.5;
    /// Exits and stairs link to every floor node within this radius.
    pub const EXIT_CONNECT_RADIUS: f32 = 5.0;
    /// Cost of moving one floor through a stairwell, regardless of horizontal distance.
    pub const STAIR_COST_PER_FLOOR: f32 = 10.0;
}

/// Routing constants.
pub mod routing {
    /// Traversal seconds per unit of effective weight.
    pub const SECONDS_PER_UNIT: f32 = 0.75;
    /// Weight multiplier applied per unit of mean endpoint smoke.
    pub const SMOKE_PENALTY_FACTOR: f32 = 4.0;
    /// Paths touching a node above this smoke level are flagged unsafe.
    pub const UNSAFE_SMOKE_LEVEL: f32 = 0.7;
}

/// Fire and smoke evolution.
pub mod hazard {
    /// Intensity gained per tick is `age * FIRE_GROWTH_RATE`.
    pub const FIRE_GROWTH_RATE: f32 = 0.01;
    /// Fires only spread once they are older than this many seconds.
    pub const FIRE_SPREAD_MIN_AGE: f32 = 10.0;
    /// Per-neighbor spread chance is `intensity * FIRE_SPREAD_FACTOR`.
    pub const FIRE_SPREAD_FACTOR: f32 = 0.1;
    /// Smoke level gained per elapsed second.
    pub const SMOKE_GROWTH_RATE: f32 = 0.001;
    /// Path collapse starts after this many simulated seconds.
    pub const COLLAPSE_DELAY_SECS: f32 = 30.0;
    /// Per-tick chance of one random edge collapsing.
    pub const COLLAPSE_CHANCE: f64 = 0.01;
    /// Scenario times out after this many simulated seconds.
    pub const MAX_SCENARIO_SECS: f32 = 300.0;
    /// Largest tick delta accepted before clamping.
    pub const MAX_TICK_SECS: f32 = 5.0;
    /// Nodes within this distance of an active fire count as fire exposure for scoring.
    pub const FIRE_DANGER_RADIUS: f32 = 2.5;
}

/// Player vitals.
pub mod vitals {
    pub const MAX_HEALTH: f32 = 100.0;
    /// Health lost per second standing in fire.
    pub const FIRE_DAMAGE_PER_SEC: f32 = 10.0;
    /// Smoke above this level starts to hurt.
    pub const SMOKE_DAMAGE_THRESHOLD: f32 = 0.7;
    /// Smoke damage per second at full smoke (ramps from zero at the threshold).
    pub const MAX_SMOKE_DAMAGE_PER_SEC: f32 = 1.0;
    pub const MIN_VISIBILITY: f32 = 0.1;
    pub const MIN_SPEED: f32 = 0.3;
    /// Visibility lost per second per unit of smoke.
    pub const VISIBILITY_DECAY_RATE: f32 = 0.5;
    /// Speed lost per second per unit of smoke.
    pub const SPEED_DECAY_RATE: f32 = 0.3;
    /// Visibility and speed regained per second in clean air.
    pub const RECOVERY_RATE: f32 = 0.2;
    /// Exposure charged for stepping onto a node, in seconds.
    pub const ENTRY_EXPOSURE_SECS: f32 = 0.5;
}

/// Scoring.
pub mod scoring {
    pub const BASE_SCORE: i32 = 100;
    pub const CRITICAL_PENALTY: i32 = 30;
    pub const HIGH_PENALTY: i32 = 20;
    pub const MEDIUM_PENALTY: i32 = 10;
    pub const LOW_PENALTY: i32 = 5;
    /// Chosen path may be at most this many times the reference length.
    pub const MAX_LENGTH_RATIO: f32 = 1.5;
    /// Time taken may be at most this many times the estimate.
    pub const MAX_TIME_RATIO: f32 = 1.5;
    /// Beyond this multiple of the estimate the run counts as delayed.
    pub const MAX_DELAY_RATIO: f32 = 2.0;
    /// Fraction of reference nodes the chosen path must share to count as correct.
    pub const MIN_OVERLAP: f32 = 0.7;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_classification() {
        assert!(NodeType::Exit.is_exit());
        assert!(!NodeType::Hallway.is_exit());
        assert!(NodeType::Stair.is_vertical());
        assert!(NodeType::Elevator.is_vertical());
        assert!(!NodeType::Room.is_vertical());
    }

    #[test]
    fn test_thresholds_in_range() {
        assert!(routing::UNSAFE_SMOKE_LEVEL > 0.0 && routing::UNSAFE_SMOKE_LEVEL < 1.0);
        assert!(vitals::MIN_VISIBILITY < 1.0);
        assert!(vitals::MIN_SPEED < 1.0);
        assert!(scoring::MAX_TIME_RATIO < scoring::MAX_DELAY_RATIO);
    }

    #[test]
    fn test_node_type_serde_names() {
        let json = serde_json::to_string(&NodeType::Hallway).unwrap();
        assert_eq!(json, "\"hallway\"");
        let t: NodeType = serde_json::from_str("\"elevator\"").unwrap();
        assert_eq!(t, NodeType::Elevator);
    }
}
