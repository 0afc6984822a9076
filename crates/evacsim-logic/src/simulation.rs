//! Scenario state manager: applies a descriptor to the graph, evolves the
//! hazard field tick by tick and runs the terminal-outcome state machine.
//!
//! Lifecycle is `NotStarted -> InProgress -> Completed(outcome)`. Once
//! completed, nothing changes until `reset` or `load`.
//!
//! Every random decision (fire spread, path collapse) draws from the manager's
//! own `Rng`, so a seed fully determines a run.
//!
//! ```
//! use evacsim_logic::builder::build_graph;
//! use evacsim_logic::layout::{BuildingLayout, Vec3};
//! use evacsim_logic::scenario::{ScenarioDescriptor, ScenarioStatus};
//! use evacsim_logic::simulation::{ScenarioManager, SimulationConfig};
//!
//! let graph = build_graph(&BuildingLayout::embedded().unwrap()).unwrap();
//! let descriptor = ScenarioDescriptor::new(Vec3::new(10.0, 6.0, 0.0));
//! let mut sim = ScenarioManager::new(graph, descriptor, SimulationConfig::default(), 7);
//!
//! sim.start();
//! assert_eq!(sim.evolve(1.0), ScenarioStatus::InProgress);
//! assert!(sim.guidance().is_some());
//! ```

use crate::constants::{hazard, vitals};
use crate::graph::{edge_label, Graph};
use crate::layout::Vec3;
use crate::pathfinding::{Path, Pathfinder};
use crate::player::{sanitize_delta, PlayerStateManager, PlayerVitals};
use crate::scenario::{
    FireInstance, Outcome, ScenarioDescriptor, ScenarioState, ScenarioStatus, SmokeArea,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Per-run tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Randomly collapse passages once the run is old enough.
    pub path_collapse: bool,
    pub max_duration_secs: f32,
    pub collapse_delay_secs: f32,
    /// Chance per tick of one collapse, once past the delay.
    pub collapse_chance: f64,
    /// Longer tick deltas are clamped to this.
    pub max_tick_secs: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            path_collapse: false,
            max_duration_secs: hazard::MAX_SCENARIO_SECS,
            collapse_delay_secs: hazard::COLLAPSE_DELAY_SECS,
            collapse_chance: hazard::COLLAPSE_CHANCE,
            max_tick_secs: hazard::MAX_TICK_SECS,
        }
    }
}

/// Clamp to [0, 1], mapping NaN to 0.
fn unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Per-neighbor ignition chance for one tick.
pub fn propagation_chance(fire: &FireInstance) -> f64 {
    f64::from(unit(fire.intensity * hazard::FIRE_SPREAD_FACTOR))
}

/// Roll fire spread from one fire into each unblocked neighbor of its node.
/// Fires younger than the spread age never spread. Returns the newly
/// blocked node ids.
pub fn spread_from<R: Rng + ?Sized>(
    graph: &mut Graph,
    fire: &FireInstance,
    rng: &mut R,
) -> Vec<String> {
    if fire.age <= hazard::FIRE_SPREAD_MIN_AGE {
        return Vec::new();
    }
    let Some(origin) = fire.node_id.as_deref() else {
        return Vec::new();
    };
    let chance = propagation_chance(fire);
    let candidates: Vec<String> = graph
        .neighbors(origin)
        .filter(|n| !graph.is_node_blocked(n))
        .map(str::to_string)
        .collect();

    let mut ignited = Vec::new();
    for id in candidates {
        if rng.gen_bool(chance) {
            graph.block_node(&id);
            log::debug!("Fire spread {} -> {} (p={:.3})", origin, id, chance);
            ignited.push(id);
        }
    }
    ignited
}

/// Owns the graph, the player and the scenario state for one run.
pub struct ScenarioManager<R = StdRng> {
    graph: Graph,
    descriptor: ScenarioDescriptor,
    config: SimulationConfig,
    player: PlayerStateManager,
    state: ScenarioState,
    rng: R,
    ticking: bool,
}

impl ScenarioManager<StdRng> {
    /// Create a manager with a `StdRng` seeded from `seed`.
    pub fn new(
        graph: Graph,
        descriptor: ScenarioDescriptor,
        config: SimulationConfig,
        seed: u64,
    ) -> Self {
        Self::with_rng(graph, descriptor, config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ScenarioManager<R> {
    pub fn with_rng(
        graph: Graph,
        descriptor: ScenarioDescriptor,
        config: SimulationConfig,
        rng: R,
    ) -> Self {
        let start = descriptor.start_position;
        let mut manager = Self {
            graph,
            descriptor,
            config,
            player: PlayerStateManager::new(start),
            state: ScenarioState::new("", start),
            rng,
            ticking: false,
        };
        manager.apply_descriptor();
        manager
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn state(&self) -> &ScenarioState {
        &self.state
    }

    /// Owned copy of the current state for external consumers.
    pub fn snapshot(&self) -> ScenarioState {
        self.state.clone()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn descriptor(&self) -> &ScenarioDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn vitals(&self) -> &PlayerVitals {
        self.player.vitals()
    }

    pub fn status(&self) -> ScenarioStatus {
        self.state.status
    }

    /// True while ticks are being accepted.
    pub fn is_running(&self) -> bool {
        self.ticking && self.state.status == ScenarioStatus::InProgress
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Begin the run, or resume ticking after `stop`.
    pub fn start(&mut self) {
        match self.state.status {
            ScenarioStatus::NotStarted => {
                self.state.status = ScenarioStatus::InProgress;
                self.state.start_time = self.state.current_time;
                self.ticking = true;
                log::info!(
                    "Scenario {} started: {} fires, {} available exits",
                    self.state.scenario_id,
                    self.state.fire_instances.len(),
                    self.state.available_exits.len()
                );
            }
            ScenarioStatus::InProgress => {
                if !self.ticking {
                    log::info!("Scenario {} resumed", self.state.scenario_id);
                }
                self.ticking = true;
            }
            ScenarioStatus::Completed => {
                log::warn!(
                    "Scenario {} already completed, reset before starting",
                    self.state.scenario_id
                );
            }
        }
    }

    /// Halt future ticks. The last computed state is kept as is.
    pub fn stop(&mut self) {
        if self.ticking {
            log::info!(
                "Scenario {} stopped at {:.1}s",
                self.state.scenario_id,
                self.state.elapsed()
            );
        }
        self.ticking = false;
    }

    /// Fresh run of the same descriptor on the same topology.
    pub fn reset(&mut self) {
        self.ticking = false;
        self.apply_descriptor();
        log::info!("Scenario {} reset", self.state.scenario_id);
    }

    /// Replace the descriptor and reset.
    pub fn load(&mut self, descriptor: ScenarioDescriptor) {
        self.descriptor = descriptor;
        self.reset();
    }

    // ── Descriptor application ──────────────────────────────────────────

    fn apply_descriptor(&mut self) {
        self.graph.clear_hazards();
        let d = &self.descriptor;
        let scenario_id = d
            .scenario_id
            .clone()
            .unwrap_or_else(|| "scenario".to_string());
        let mut state = ScenarioState::new(scenario_id, d.start_position);
        state.estimated_time_to_safety = d.estimated_time_to_safety;

        match self.graph.nearest_node(&d.start_position) {
            Some(node) => {
                state.player_node = Some(node.id.clone());
                state.current_floor = node.floor;
                state.record_visit(&node.id);
            }
            None => log::warn!("Graph is empty, player has no start node"),
        }

        for fire in &d.fire_locations {
            let node_id = self
                .graph
                .nearest_node(&fire.position)
                .map(|n| n.id.clone());
            if let Some(id) = &node_id {
                self.graph.block_node(id);
                state.blocked_nodes.insert(id.clone());
                state.burning_nodes.insert(id.clone());
            }
            state.fire_instances.push(FireInstance {
                position: fire.position,
                intensity: unit(fire.intensity),
                node_id,
                created_at: state.current_time,
                age: 0.0,
            });
        }

        for id in &d.blocked_nodes {
            if self.graph.block_node(id) {
                state.blocked_nodes.insert(id.clone());
            }
        }

        for label in &d.blocked_paths {
            match self.graph.parse_edge_key(label) {
                Some(key) => {
                    self.graph.block_edge(&key.0, &key.1);
                    state.blocked_edges.insert(edge_label(&key));
                }
                None => log::warn!("Ignoring blocked path '{}': no such edge", label),
            }
        }

        for spec in &d.smoke_areas {
            let mut nodes = Vec::new();
            for id in &spec.nodes {
                if self.graph.has_node(id) {
                    nodes.push(id.clone());
                } else {
                    log::warn!("Smoke area names unknown node {}", id);
                }
            }
            if let Some(region) = &spec.region {
                let before = nodes.len();
                for node in self.graph.nodes() {
                    if node.room_label.as_deref() == Some(region.as_str())
                        && !nodes.contains(&node.id)
                    {
                        nodes.push(node.id.clone());
                    }
                }
                if nodes.len() == before {
                    log::warn!("Smoke region '{}' matches no nodes", region);
                }
            }
            state.smoke_areas.push(SmokeArea {
                nodes,
                level: unit(spec.level),
                region: spec.region.clone(),
            });
        }

        state.available_exits = self.resolve_available_exits(state.current_floor);
        if state.available_exits.is_empty() {
            log::warn!("Scenario {} has no reachable exit ids", state.scenario_id);
        }

        self.player.reset(d.start_position);
        self.state = state;
        self.mirror_smoke();
    }

    /// Descriptor exits that exist, else the start floor's exits, else all.
    fn resolve_available_exits(&self, start_floor: i32) -> Vec<String> {
        let mut exits = Vec::new();
        for id in &self.descriptor.available_exits {
            if self.graph.is_exit(id) {
                if !exits.contains(id) {
                    exits.push(id.clone());
                }
            } else {
                log::warn!("Available exit {} is not a registered exit", id);
            }
        }
        if !exits.is_empty() {
            return exits;
        }
        let on_floor: Vec<String> = self
            .graph
            .exit_nodes()
            .into_iter()
            .filter(|n| n.floor == start_floor)
            .map(|n| n.id.clone())
            .collect();
        if !on_floor.is_empty() {
            return on_floor;
        }
        self.graph.exit_ids().iter().cloned().collect()
    }

    /// Write each covered node's densest smoke level onto the graph.
    fn mirror_smoke(&mut self) {
        let mut levels: BTreeMap<&str, f32> = BTreeMap::new();
        for area in &self.state.smoke_areas {
            for id in &area.nodes {
                let entry = levels.entry(id.as_str()).or_insert(0.0);
                *entry = entry.max(area.level);
            }
        }
        for (id, level) in levels {
            self.graph.set_smoke_level(id, level);
        }
    }

    // ── Ticking ─────────────────────────────────────────────────────────

    /// Advance the scenario by `elapsed` simulated seconds.
    ///
    /// Ignored unless the run is in progress and not stopped. Non-positive or
    /// non-finite deltas are skipped; longer ones are clamped to
    /// `max_tick_secs`.
    pub fn evolve(&mut self, elapsed: f32) -> ScenarioStatus {
        if !self.is_running() {
            return self.state.status;
        }
        let max_tick = self.config.max_tick_secs;
        let Some(dt) = sanitize_delta(elapsed).and_then(|dt| sanitize_delta(dt.min(max_tick)))
        else {
            if elapsed != 0.0 {
                log::warn!("Ignoring anomalous tick delta {}", elapsed);
            }
            return self.state.status;
        };
        self.state.current_time += dt;

        self.expose(dt);
        if !self.state.player_alive {
            self.complete(Outcome::Death);
            return self.state.status;
        }

        self.evolve_fires(dt);
        self.evolve_smoke(dt);
        if self.config.path_collapse && self.state.elapsed() > self.config.collapse_delay_secs {
            self.maybe_collapse();
        }

        if self.state.elapsed() > self.config.max_duration_secs {
            self.complete(Outcome::Timeout);
        }
        self.state.status
    }

    /// Apply `dt` seconds of exposure at the player's current node.
    fn expose(&mut self, dt: f32) {
        let (in_fire, smoke) = match &self.state.player_node {
            Some(id) => (
                self.state.burning_nodes.contains(id),
                self.graph.smoke_level(id),
            ),
            None => (false, 0.0),
        };
        self.player.update(in_fire, smoke, dt);
        let vitals = self.player.vitals();
        self.state.player_health = vitals.health;
        self.state.player_alive = vitals.alive;
    }

    fn evolve_fires(&mut self, dt: f32) {
        let graph = &mut self.graph;
        let rng = &mut self.rng;
        let state = &mut self.state;
        for fire in state.fire_instances.iter_mut() {
            fire.age += dt;
            fire.intensity = unit(fire.intensity + fire.age * hazard::FIRE_GROWTH_RATE);
            for id in spread_from(graph, fire, rng) {
                state.blocked_nodes.insert(id.clone());
                state.burning_nodes.insert(id);
            }
        }
    }

    fn evolve_smoke(&mut self, dt: f32) {
        for area in &mut self.state.smoke_areas {
            area.level = unit(area.level + dt * hazard::SMOKE_GROWTH_RATE);
        }
        self.mirror_smoke();
    }

    fn maybe_collapse(&mut self) {
        let chance = self.config.collapse_chance.clamp(0.0, 1.0);
        if !self.rng.gen_bool(chance) {
            return;
        }
        let candidates = self.graph.unblocked_edge_keys();
        if candidates.is_empty() {
            return;
        }
        let key = &candidates[self.rng.gen_range(0..candidates.len())];
        self.graph.block_edge(&key.0, &key.1);
        let label = edge_label(key);
        log::debug!(
            "Passage {} collapsed at {:.1}s",
            label,
            self.state.elapsed()
        );
        self.state.blocked_edges.insert(label);
    }

    fn complete(&mut self, outcome: Outcome) {
        self.state.status = ScenarioStatus::Completed;
        self.state.outcome = Some(outcome);
        self.ticking = false;
        if outcome == Outcome::Safe {
            self.state.time_to_safety = Some(self.state.elapsed());
        }
        log::info!(
            "Scenario {} completed: {:?} after {:.1}s, health {:.0}",
            self.state.scenario_id,
            outcome,
            self.state.elapsed(),
            self.state.player_health
        );
    }

    // ── Player movement ─────────────────────────────────────────────────

    /// Move the player onto `node_id` and check terminal conditions.
    ///
    /// Stepping onto a different node charges `ENTRY_EXPOSURE_SECS` of that
    /// node's fire and smoke. Time spent standing there is charged by
    /// `evolve`. Position updates before start only relocate the player.
    /// After completion they are ignored.
    pub fn update_player_position(&mut self, position: Vec3, node_id: &str) -> ScenarioStatus {
        if self.state.is_complete() {
            return self.state.status;
        }
        let Some(floor) = self.graph.node(node_id).map(|n| n.floor) else {
            log::warn!("Player moved to unknown node {}", node_id);
            return self.state.status;
        };
        let entered = self.state.player_node.as_deref() != Some(node_id);
        self.state.player_position = position;
        self.player.set_position(position);
        self.state.player_node = Some(node_id.to_string());
        self.state.current_floor = floor;
        self.state.record_visit(node_id);

        if self.state.status != ScenarioStatus::InProgress {
            return self.state.status;
        }
        if entered {
            self.expose(vitals::ENTRY_EXPOSURE_SECS);
        }

        if self.state.player_alive && self.state.is_exit_available(node_id) {
            self.complete(Outcome::Safe);
        } else if !self.state.player_alive {
            self.complete(Outcome::Death);
        } else if self.graph.is_exit(node_id) {
            self.complete(Outcome::Unsafe);
        } else if !self.exits_reachable_from(node_id) {
            self.complete(Outcome::Trapped);
        }
        self.state.status
    }

    fn exits_reachable_from(&self, node_id: &str) -> bool {
        let targets: HashSet<String> = self.state.available_exits.iter().cloned().collect();
        Pathfinder::new(&self.graph).can_reach_any(node_id, &targets)
    }

    /// Best current route from the player to an available exit.
    pub fn guidance(&self) -> Option<Path> {
        let start = self.state.player_node.as_deref()?;
        Pathfinder::new(&self.graph).find_path_to_nearest_of(
            start,
            self.state.available_exits.iter().map(String::as_str),
        )
    }
}
