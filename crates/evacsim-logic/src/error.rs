//! Error types for static configuration and descriptor parsing.
//!
//! Only configuration mistakes are errors. Missing graph entities at runtime
//! are logged no-ops, and "no path" is a normal `None`.

use thiserror::Error;

/// A fault in the static building layout or its exit/stair registries.
///
/// Raised while loading or building, never while a scenario is running.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to parse building layout: {0}")]
    Json(#[from] serde_json::Error),
    #[error("floor {0} is defined more than once")]
    DuplicateFloor(i32),
    #[error("grid resolution must be positive, got {0}")]
    InvalidResolution(f32),
    #[error("{kind} '{id}' is on floor {floor}, which is not in the layout")]
    UnknownFloor {
        kind: &'static str,
        id: String,
        floor: i32,
    },
    #[error("stairwell '{id}' connects to floor {floor}, which is not in the layout")]
    StairTargetMissing { id: String, floor: i32 },
    #[error("stairwell '{id}' connects to floor {floor}, which has no stairwell")]
    NoStairOnFloor { id: String, floor: i32 },
    #[error("node id '{0}' is registered more than once")]
    DuplicateId(String),
}

/// A scenario descriptor that could not be read at all.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to parse scenario descriptor: {0}")]
    Parse(#[from] serde_json::Error),
}
