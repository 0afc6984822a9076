//! Pure simulation logic for building evacuation drills.
//!
//! This crate contains all evacuation logic that is independent of any
//! renderer, transport, or runtime. Functions take plain data and return
//! results, making them unit-testable and portable across headless tools,
//! servers, and any future front end.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`builder`] | Navigation graph from floor geometry, exits and stairwells |
//! | [`constants`] | Node types, grid, routing, hazard, vitals and scoring tunables |
//! | [`error`] | Layout and descriptor loading errors |
//! | [`evaluation`] | Rule-based route scoring with itemised feedback |
//! | [`graph`] | Navigable graph: nodes, weighted edges, blocking and smoke |
//! | [`layout`] | Static building geometry and exit/stair registries |
//! | [`pathfinding`] | A* routing, nearest-exit search, reachability |
//! | [`player`] | Player health, visibility and speed under exposure |
//! | [`scenario`] | Scenario descriptor input and state snapshot output |
//! | [`simulation`] | Hazard evolution and the terminal-outcome state machine |

pub mod builder;
pub mod constants;
pub mod error;
pub mod evaluation;
pub mod graph;
pub mod layout;
pub mod pathfinding;
pub mod player;
pub mod scenario;
pub mod simulation;
