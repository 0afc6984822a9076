//! Static building geometry and the exit/stairwell registries.
//!
//! A `BuildingLayout` is loaded once (usually from JSON) and passed by
//! reference into the graph builder. Nothing here changes while a
//! scenario runs.
//!
//! ```
//! use evacsim_logic::layout::BuildingLayout;
//!
//! let layout = BuildingLayout::embedded().unwrap();
//! assert!(!layout.floors.is_empty());
//! assert!(layout.validate().is_ok());
//! ```

use crate::constants::grid;
use crate::error::BuildError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const EMBEDDED_LAYOUT_JSON: &str = include_str!("../../../data/building.json");

/// A point in building space. `z` is elevation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance ignoring elevation.
    pub fn planar_distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned rectangle, `(x, y)` is the minimum corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inclusive containment (edges count as inside).
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.max_x() && y >= self.y && y <= self.max_y()
    }

    /// Strict interior test. Points on a wall stay walkable.
    pub fn contains_strict(&self, x: f32, y: f32) -> bool {
        x > self.x && x < self.max_x() && y > self.y && y < self.max_y()
    }

    /// Distance from a point to the nearest point of the rectangle (0 inside).
    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        let dx = (self.x - x).max(0.0).max(x - self.max_x());
        let dy = (self.y - y).max(0.0).max(y - self.max_y());
        (dx * dx + dy * dy).sqrt()
    }
}

/// A rectangular wing of a floor with a hallway running along its long axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub bounds: Rect,
    /// Width of the hallway band centred on the section's long axis.
    pub hallway_width: f32,
}

impl Section {
    /// The hallway band: a strip of `hallway_width` centred along the long axis.
    pub fn hallway_band(&self) -> Rect {
        let b = &self.bounds;
        let (cx, cy) = b.center();
        let half = self.hallway_width / 2.0;
        if b.width >= b.height {
            Rect::new(b.x, cy - half, b.width, self.hallway_width)
        } else {
            Rect::new(cx - half, b.y, self.hallway_width, b.height)
        }
    }
}

/// An enclosed room. Grid points strictly inside are not walkable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRect {
    pub label: String,
    pub bounds: Rect,
}

/// Geometry for one floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorPlan {
    pub floor: i32,
    /// Height of this floor; becomes node `z`.
    #[serde(default)]
    pub elevation: f32,
    /// Horizontal shift applied to this floor's grid points and to the exits
    /// and stairs registered on it.
    #[serde(default)]
    pub offset_x: f32,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub rooms: Vec<RoomRect>,
}

/// A registered fire exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitDef {
    pub id: String,
    pub floor: i32,
    pub position: Vec3,
    pub label: String,
}

/// Which way a stairwell leads from its floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StairDirection {
    Up,
    Down,
    Both,
}

/// A registered stairwell landing on one floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StairDef {
    pub id: String,
    pub floor: i32,
    pub position: Vec3,
    pub direction: StairDirection,
    /// Floors this landing connects to vertically.
    #[serde(default)]
    pub connects_to: Vec<i32>,
}

fn default_resolution() -> f32 {
    grid::DEFAULT_RESOLUTION
}

/// Complete static description of a building.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingLayout {
    pub name: String,
    #[serde(default = "default_resolution")]
    pub grid_resolution: f32,
    pub floors: Vec<FloorPlan>,
    #[serde(default)]
    pub exits: Vec<ExitDef>,
    #[serde(default)]
    pub stairs: Vec<StairDef>,
}

impl BuildingLayout {
    /// Parse and validate a layout from JSON.
    pub fn from_json(json: &str) -> Result<Self, BuildError> {
        let layout: BuildingLayout = serde_json::from_str(json)?;
        layout.validate()?;
        Ok(layout)
    }

    /// The layout bundled with the crate.
    pub fn embedded() -> Result<Self, BuildError> {
        Self::from_json(EMBEDDED_LAYOUT_JSON)
    }

    pub fn floor(&self, floor: i32) -> Option<&FloorPlan> {
        self.floors.iter().find(|f| f.floor == floor)
    }

    pub fn has_floor(&self, floor: i32) -> bool {
        self.floor(floor).is_some()
    }

    pub fn exits_on_floor(&self, floor: i32) -> impl Iterator<Item = &ExitDef> {
        self.exits.iter().filter(move |e| e.floor == floor)
    }

    pub fn stairs_on_floor(&self, floor: i32) -> impl Iterator<Item = &StairDef> {
        self.stairs.iter().filter(move |s| s.floor == floor)
    }

    /// Check registry consistency. Called by `from_json` and by the builder.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.grid_resolution.is_nan() || self.grid_resolution <= 0.0 {
            return Err(BuildError::InvalidResolution(self.grid_resolution));
        }

        let mut seen_floors = HashSet::new();
        for plan in &self.floors {
            if !seen_floors.insert(plan.floor) {
                return Err(BuildError::DuplicateFloor(plan.floor));
            }
        }

        let mut seen_ids = HashSet::new();
        for exit in &self.exits {
            if !self.has_floor(exit.floor) {
                return Err(BuildError::UnknownFloor {
                    kind: "exit",
                    id: exit.id.clone(),
                    floor: exit.floor,
                });
            }
            if !seen_ids.insert(exit.id.as_str()) {
                return Err(BuildError::DuplicateId(exit.id.clone()));
            }
        }

        for stair in &self.stairs {
            if !self.has_floor(stair.floor) {
                return Err(BuildError::UnknownFloor {
                    kind: "stairwell",
                    id: stair.id.clone(),
                    floor: stair.floor,
                });
            }
            if !seen_ids.insert(stair.id.as_str()) {
                return Err(BuildError::DuplicateId(stair.id.clone()));
            }
            for &target in &stair.connects_to {
                if !self.has_floor(target) {
                    return Err(BuildError::StairTargetMissing {
                        id: stair.id.clone(),
                        floor: target,
                    });
                }
                if self.stairs_on_floor(target).next().is_none() {
                    return Err(BuildError::NoStairOnFloor {
                        id: stair.id.clone(),
                        floor: target,
                    });
                }
            }
        }

        Ok(())
    }
}
