//! Evacuation Headless Simulation Harness
//!
//! Validates the evacuation logic end to end against the bundled building
//! and scenario. Runs entirely in-process: no renderer, no networking.
//!
//! Usage:
//!   cargo run -p evacsim-simtest
//!   cargo run -p evacsim-simtest -- --verbose --seed 7
//!   RUST_LOG=debug cargo run -p evacsim-simtest

use evacsim_logic::builder::build_graph;
use evacsim_logic::evaluation::SafetyEvaluator;
use evacsim_logic::graph::Graph;
use evacsim_logic::layout::{BuildingLayout, Vec3};
use evacsim_logic::pathfinding::Pathfinder;
use evacsim_logic::scenario::{FireLocation, Outcome, ScenarioDescriptor, ScenarioState};
use evacsim_logic::simulation::{ScenarioManager, SimulationConfig};

// ── Sample scenario (as the external generator emits it) ────────────────
const SCENARIO_JSON: &str = include_str!("../../../data/scenario_office_fire.json");

const TICK_SECS: f32 = 1.0;
const MAX_TICKS: usize = 400;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    }
}

fn parse_seed() -> u64 {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| a == "--seed")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(42)
}

fn main() {
    env_logger::init();
    let verbose = std::env::args().any(|a| a == "--verbose");
    let seed = parse_seed();
    println!("=== Evacuation Simulation Harness (seed {}) ===\n", seed);

    let mut results = Vec::new();

    // 1. Building layout and graph construction
    let graph = match load_building(&mut results) {
        Some(g) => g,
        None => {
            report(&results, verbose);
            std::process::exit(1);
        }
    };

    // 2. Routing on the built graph
    results.extend(validate_routing(&graph, verbose));

    // 3. Full guided run of the sample scenario
    results.extend(run_sample_scenario(&graph, seed, verbose));

    // 4. Terminal outcomes other than escape
    results.extend(validate_terminal_outcomes(&graph, seed));

    // 5. Seeded reproducibility
    results.extend(validate_determinism(&graph, seed));

    if !report(&results, verbose) {
        std::process::exit(1);
    }
}

/// Print the summary. Returns true if everything passed.
fn report(results: &[TestResult], verbose: bool) -> bool {
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;

    for r in results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed,
        results.len(),
        failed
    );
    failed == 0
}

// ── 1. Building ─────────────────────────────────────────────────────────

fn load_building(results: &mut Vec<TestResult>) -> Option<Graph> {
    println!("--- Building ---");
    let layout = match BuildingLayout::embedded() {
        Ok(l) => l,
        Err(e) => {
            results.push(check("layout_parse", false, e.to_string()));
            return None;
        }
    };
    results.push(check(
        "layout_parse",
        true,
        format!("'{}' with {} floors", layout.name, layout.floors.len()),
    ));

    let graph = match build_graph(&layout) {
        Ok(g) => g,
        Err(e) => {
            results.push(check("graph_build", false, e.to_string()));
            return None;
        }
    };
    results.push(check(
        "graph_build",
        graph.node_count() > 100,
        format!(
            "{} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        ),
    ));

    let problems = graph.validate();
    results.push(check(
        "graph_invariants",
        problems.is_empty(),
        if problems.is_empty() {
            "no invariant violations".to_string()
        } else {
            problems.join("; ")
        },
    ));

    let isolated: Vec<&str> = graph
        .exit_nodes()
        .into_iter()
        .filter(|n| n.neighbors.is_empty())
        .map(|n| n.id.as_str())
        .collect();
    results.push(check(
        "exits_connected",
        isolated.is_empty() && graph.exit_ids().len() == layout.exits.len(),
        if isolated.is_empty() {
            format!("{} exits, all linked", graph.exit_ids().len())
        } else {
            format!("isolated exits: {}", isolated.join(", "))
        },
    ));

    let floors: Vec<i32> = graph.floors().collect();
    results.push(check(
        "all_floors_present",
        floors.len() == layout.floors.len(),
        format!("floors {:?}", floors),
    ));

    Some(graph)
}

// ── 2. Routing ──────────────────────────────────────────────────────────

fn validate_routing(graph: &Graph, verbose: bool) -> Vec<TestResult> {
    println!("--- Routing ---");
    let mut results = Vec::new();
    let finder = Pathfinder::new(graph);

    // Every node on the upper floor must reach some exit.
    let stranded: Vec<&str> = graph
        .nodes_on_floor(1)
        .into_iter()
        .filter(|n| finder.find_path_to_nearest_exit(&n.id).is_none())
        .map(|n| n.id.as_str())
        .collect();
    results.push(check(
        "upper_floor_evacuable",
        stranded.is_empty(),
        format!("{} stranded nodes on floor 1", stranded.len()),
    ));

    let Some(start) = graph.nearest_node(&Vec3::new(20.0, 6.0, 4.0)) else {
        results.push(check("route_from_upper_floor", false, "no node near start"));
        return results;
    };
    let route = finder.find_path_to_nearest_exit(&start.id);
    results.push(check(
        "route_from_upper_floor",
        route.as_ref().map_or(false, |p| p.is_safe && p.total_cost > 0.0),
        match &route {
            Some(p) => format!(
                "{} -> {} in {} steps, cost {:.1}, ~{:.0}s",
                start.id,
                p.destination().unwrap_or("?"),
                p.len(),
                p.total_cost,
                p.estimated_time
            ),
            None => "no route".to_string(),
        },
    ));
    if verbose {
        if let Some(p) = &route {
            println!("    route: {}", p.nodes.join(" -> "));
        }
    }

    // Blocking an interior node of the best route must never make it cheaper.
    if let Some(p) = &route {
        if let Some(middle) = p.nodes.get(p.len() / 2) {
            let mut blocked = graph.clone();
            blocked.block_node(middle);
            let detour = Pathfinder::new(&blocked).find_path_to_nearest_exit(&start.id);
            results.push(check(
                "detour_not_cheaper",
                detour.as_ref().map_or(true, |d| {
                    d.total_cost >= p.total_cost && !d.nodes.contains(middle)
                }),
                match &detour {
                    Some(d) => format!("detour cost {:.1} around {}", d.total_cost, middle),
                    None => format!("no route once {} is blocked", middle),
                },
            ));
        }
    }

    results
}

// ── 3. Guided run ───────────────────────────────────────────────────────

fn run_sample_scenario(graph: &Graph, seed: u64, verbose: bool) -> Vec<TestResult> {
    println!("--- Sample Scenario ---");
    let mut results = Vec::new();

    let descriptor = match ScenarioDescriptor::from_json(SCENARIO_JSON) {
        Ok(d) => d,
        Err(e) => {
            results.push(check("scenario_parse", false, e.to_string()));
            return results;
        }
    };
    results.push(check(
        "scenario_parse",
        true,
        format!(
            "{} fires, {} smoke areas",
            descriptor.fire_locations.len(),
            descriptor.smoke_areas.len()
        ),
    ));

    let config = SimulationConfig {
        path_collapse: true,
        ..SimulationConfig::default()
    };
    let mut sim = ScenarioManager::new(graph.clone(), descriptor, config, seed);
    let reference = sim.guidance().map(|p| p.nodes).unwrap_or_default();
    results.push(check(
        "initial_guidance",
        !reference.is_empty(),
        format!("{} step reference route", reference.len()),
    ));

    let state = walk_guided(&mut sim);
    results.push(check(
        "player_escaped",
        state.outcome == Some(Outcome::Safe),
        format!(
            "{:?} after {:.0}s, health {:.0}, {} nodes visited",
            state.outcome,
            state.elapsed(),
            state.player_health,
            state.path_taken.len()
        ),
    ));

    let evaluation =
        SafetyEvaluator::with_graph(sim.graph()).evaluate(&state.path_taken, &reference, &state);
    results.push(check(
        "route_evaluation",
        evaluation.correct && evaluation.score >= 70,
        format!("score {}, {}", evaluation.score, evaluation.feedback),
    ));
    if verbose {
        for line in &evaluation.detailed_feedback {
            println!("    {}", line);
        }
        if let Ok(json) = serde_json::to_string_pretty(&evaluation) {
            log::debug!("Evaluation result:\n{}", json);
        }
    }

    results
}

/// Tick the scenario, stepping the player one node along the current
/// guidance route after each tick.
fn walk_guided(sim: &mut ScenarioManager) -> ScenarioState {
    sim.start();
    for _ in 0..MAX_TICKS {
        sim.evolve(TICK_SECS);
        if !sim.is_running() {
            break;
        }
        let Some(next) = sim.guidance().and_then(|p| p.nodes.get(1).cloned()) else {
            continue;
        };
        let Some(position) = sim.graph().node(&next).map(|n| n.position) else {
            continue;
        };
        sim.update_player_position(position, &next);
    }
    sim.snapshot()
}

// ── 4. Terminal outcomes ────────────────────────────────────────────────

fn validate_terminal_outcomes(graph: &Graph, seed: u64) -> Vec<TestResult> {
    println!("--- Terminal Outcomes ---");
    let mut results = Vec::new();

    // Standing in a fire is fatal within ten seconds.
    let start = Vec3::new(20.0, 6.0, 0.0);
    let mut burning = ScenarioDescriptor::new(start);
    burning.fire_locations.push(FireLocation {
        position: start,
        intensity: 0.5,
        description: "Fire at the player's feet".into(),
    });
    let mut sim = ScenarioManager::new(graph.clone(), burning, SimulationConfig::default(), seed);
    sim.start();
    let mut ticks = 0;
    while sim.is_running() && ticks < MAX_TICKS {
        sim.evolve(TICK_SECS);
        ticks += 1;
    }
    results.push(check(
        "death_in_fire",
        sim.state().outcome == Some(Outcome::Death) && ticks == 10,
        format!("{:?} after {} ticks", sim.state().outcome, ticks),
    ));

    // Nobody moves: the clock runs out.
    let idle = ScenarioDescriptor::new(Vec3::new(20.0, 6.0, 4.0));
    let mut sim = ScenarioManager::new(graph.clone(), idle, SimulationConfig::default(), seed);
    sim.start();
    let mut ticks = 0;
    while sim.is_running() && ticks < MAX_TICKS {
        sim.evolve(5.0);
        ticks += 1;
    }
    results.push(check(
        "idle_timeout",
        sim.state().outcome == Some(Outcome::Timeout),
        format!("{:?} at {:.0}s", sim.state().outcome, sim.state().elapsed()),
    ));

    results
}

// ── 5. Determinism ──────────────────────────────────────────────────────

fn validate_determinism(graph: &Graph, seed: u64) -> Vec<TestResult> {
    println!("--- Determinism ---");
    let descriptor = match ScenarioDescriptor::from_json(SCENARIO_JSON) {
        Ok(d) => d,
        Err(e) => return vec![check("seeded_replay", false, e.to_string())],
    };
    let config = SimulationConfig {
        path_collapse: true,
        collapse_chance: 0.2,
        ..SimulationConfig::default()
    };
    let run = || {
        let mut sim = ScenarioManager::new(graph.clone(), descriptor.clone(), config.clone(), seed);
        sim.start();
        for _ in 0..90 {
            sim.evolve(TICK_SECS);
        }
        sim.snapshot()
    };
    let first = run();
    let second = run();
    vec![check(
        "seeded_replay",
        first == second,
        format!(
            "{} burning nodes, {} collapsed passages",
            first.burning_nodes.len(),
            first.blocked_edges.len()
        ),
    )]
}
