//! Graph construction from static floor geometry.
//!
//! Per floor:
//! 1. Lay a lattice of candidate points (spacing = grid resolution) over
//!    every section. The lattice is global to the floor, so overlapping
//!    sections share points instead of duplicating them.
//! 2. Drop points strictly inside a room rectangle.
//! 3. Classify survivors: inside any hallway band → hallway, otherwise a
//!    room-adjacent node labelled with the closest room.
//! 4. Connect points closer than `1.5 × resolution` (the 8-neighbourhood).
//! 5. Splice in registered exits and stair landings, linking each to every
//!    candidate within `EXIT_CONNECT_RADIUS` plus the nearest hallway node.
//!
//! Finally, stair landings are joined across floors with a fixed per-floor
//! cost that never undercuts the straight-line distance, so the A*
//! heuristic stays admissible.

use crate::constants::{grid, NodeType};
use crate::error::BuildError;
use crate::graph::{Graph, Node};
use crate::layout::{BuildingLayout, FloorPlan, StairDef, Vec3};
use std::collections::HashMap;

const LATTICE_EPSILON: f32 = 1e-4;

/// Builds a `Graph` from a validated layout.
pub struct GraphBuilder<'a> {
    layout: &'a BuildingLayout,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(layout: &'a BuildingLayout) -> Self {
        Self { layout }
    }

    /// Build the full multi-floor graph.
    ///
    /// Fails only on registry mistakes (see `BuildingLayout::validate`).
    pub fn build(&self) -> Result<Graph, BuildError> {
        self.layout.validate()?;
        let resolution = self.layout.grid_resolution;
        let mut graph = Graph::new();

        for plan in &self.layout.floors {
            let candidates = self.add_floor_grid(&mut graph, plan, resolution);
            self.splice_registered_nodes(&mut graph, plan, &candidates)?;
        }
        self.connect_stairwells(&mut graph)?;

        log::info!(
            "Built navigation graph for '{}': {} nodes, {} edges, {} exits",
            self.layout.name,
            graph.node_count(),
            graph.edge_count(),
            graph.exit_ids().len()
        );
        Ok(graph)
    }

    /// Lay the lattice for one floor. Returns the ids of the candidate nodes.
    fn add_floor_grid(
        &self,
        graph: &mut Graph,
        plan: &FloorPlan,
        resolution: f32,
    ) -> Vec<String> {
        let bands: Vec<_> = plan.sections.iter().map(|s| s.hallway_band()).collect();
        let mut lattice: HashMap<(i32, i32), String> = HashMap::new();
        let mut order: Vec<(i32, i32)> = Vec::new();

        for section in &plan.sections {
            let b = &section.bounds;
            let ix_min = ((b.x / resolution) - LATTICE_EPSILON).ceil() as i32;
            let ix_max = ((b.max_x() / resolution) + LATTICE_EPSILON).floor() as i32;
            let iy_min = ((b.y / resolution) - LATTICE_EPSILON).ceil() as i32;
            let iy_max = ((b.max_y() / resolution) + LATTICE_EPSILON).floor() as i32;

            for ix in ix_min..=ix_max {
                for iy in iy_min..=iy_max {
                    if lattice.contains_key(&(ix, iy)) {
                        continue;
                    }
                    let lx = ix as f32 * resolution;
                    let ly = iy as f32 * resolution;
                    if plan.rooms.iter().any(|r| r.bounds.contains_strict(lx, ly)) {
                        continue;
                    }

                    let id = format!("f{}_g{}_{}", plan.floor, ix, iy);
                    let position = Vec3::new(lx + plan.offset_x, ly, plan.elevation);
                    let node = if bands.iter().any(|band| band.contains(lx, ly)) {
                        Node::new(id.clone(), position, plan.floor, NodeType::Hallway)
                    } else {
                        let node = Node::new(id.clone(), position, plan.floor, NodeType::Room);
                        match nearest_room_label(plan, lx, ly) {
                            Some(label) => node.with_room_label(label),
                            None => node,
                        }
                    };
                    if graph.add_node(node) {
                        lattice.insert((ix, iy), id);
                        order.push((ix, iy));
                    }
                }
            }
        }

        // 8-neighbourhood == every lattice pair within 1.5 × resolution.
        let max_link = resolution * grid::NEIGHBOR_FACTOR;
        for &(ix, iy) in &order {
            let Some(id) = lattice.get(&(ix, iy)) else {
                continue;
            };
            for (dx, dy) in [(1, 0), (0, 1), (1, 1), (1, -1)] {
                let Some(other) = lattice.get(&(ix + dx, iy + dy)) else {
                    continue;
                };
                let distance = link_distance(graph, id, other);
                if distance <= max_link {
                    graph.add_edge(id, other, distance);
                }
            }
        }

        order
            .iter()
            .filter_map(|key| lattice.get(key).cloned())
            .collect()
    }

    /// Add this floor's exits and stair landings and tie them into the grid.
    fn splice_registered_nodes(
        &self,
        graph: &mut Graph,
        plan: &FloorPlan,
        candidates: &[String],
    ) -> Result<(), BuildError> {
        // Registry positions are floor-local, like the lattice.
        let place = |p: &Vec3| Vec3::new(p.x + plan.offset_x, p.y, plan.elevation);
        let mut registered: Vec<Node> = Vec::new();
        for exit in self.layout.exits_on_floor(plan.floor) {
            let position = place(&exit.position);
            registered.push(
                Node::new(exit.id.clone(), position, plan.floor, NodeType::Exit)
                    .with_room_label(exit.label.clone()),
            );
        }
        for stair in self.layout.stairs_on_floor(plan.floor) {
            let position = place(&stair.position);
            registered.push(Node::new(
                stair.id.clone(),
                position,
                plan.floor,
                NodeType::Stair,
            ));
        }

        for node in registered {
            let id = node.id.clone();
            let position = node.position;
            if !graph.add_node(node) {
                return Err(BuildError::DuplicateId(id));
            }

            let mut linked = 0usize;
            let mut nearest_hallway: Option<(&String, f32)> = None;
            let mut nearest_any: Option<(&String, f32)> = None;
            for candidate in candidates {
                let Some(c) = graph.node(candidate) else {
                    continue;
                };
                let distance = c.position.planar_distance(&position);
                let is_hallway = c.node_type == NodeType::Hallway;
                if distance <= grid::EXIT_CONNECT_RADIUS {
                    graph.add_edge(&id, candidate, distance);
                    linked += 1;
                }
                if is_hallway && nearest_hallway.map_or(true, |(_, d)| distance < d) {
                    nearest_hallway = Some((candidate, distance));
                }
                if nearest_any.map_or(true, |(_, d)| distance < d) {
                    nearest_any = Some((candidate, distance));
                }
            }

            // Fallback keeps far-flung exits reachable.
            match nearest_hallway.or(if linked == 0 { nearest_any } else { None }) {
                Some((target, distance)) => {
                    graph.add_edge(&id, target, distance);
                }
                None => log::warn!("Registered node {} has no floor grid to attach to", id),
            }
        }
        Ok(())
    }

    /// Join stair landings vertically per their `connects_to` lists.
    fn connect_stairwells(&self, graph: &mut Graph) -> Result<(), BuildError> {
        for stair in &self.layout.stairs {
            for &target_floor in &stair.connects_to {
                let target = self
                    .matching_landing(stair, target_floor)
                    .ok_or_else(|| BuildError::NoStairOnFloor {
                        id: stair.id.clone(),
                        floor: target_floor,
                    })?;
                let (Some(a), Some(b)) = (graph.node(&stair.id), graph.node(&target.id)) else {
                    continue;
                };
                let floors = (stair.floor - target_floor).unsigned_abs() as f32;
                let cost =
                    (grid::STAIR_COST_PER_FLOOR * floors).max(a.position.distance(&b.position));
                graph.add_edge(&stair.id, &target.id, cost);
            }
        }
        Ok(())
    }

    /// The landing on `floor` that shares a shaft with `stair` (closest in plan).
    fn matching_landing(&self, stair: &StairDef, floor: i32) -> Option<&'a StairDef> {
        self.layout.stairs_on_floor(floor).min_by(|a, b| {
            a.position
                .planar_distance(&stair.position)
                .total_cmp(&b.position.planar_distance(&stair.position))
        })
    }
}

/// Convenience wrapper: build a graph straight from a layout.
pub fn build_graph(layout: &BuildingLayout) -> Result<Graph, BuildError> {
    GraphBuilder::new(layout).build()
}

fn nearest_room_label(plan: &FloorPlan, x: f32, y: f32) -> Option<String> {
    plan.rooms
        .iter()
        .min_by(|a, b| a.bounds.distance_to(x, y).total_cmp(&b.bounds.distance_to(x, y)))
        .map(|r| r.label.clone())
}

fn link_distance(graph: &Graph, a: &str, b: &str) -> f32 {
    match (graph.node(a), graph.node(b)) {
        (Some(na), Some(nb)) => na.position.distance(&nb.position),
        _ => f32::INFINITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ExitDef, RoomRect, Rect, Section, StairDirection};

    fn corridor_layout() -> BuildingLayout {
        BuildingLayout {
            name: "corridor".into(),
            grid_resolution: 2.0,
            floors: vec![FloorPlan {
                floor: 0,
                elevation: 0.0,
                offset_x: 0.0,
                sections: vec![Section {
                    name: "main".into(),
                    bounds: Rect::new(0.0, 0.0, 20.0, 8.0),
                    hallway_width: 4.0,
                }],
                rooms: vec![RoomRect {
                    label: "office".into(),
                    bounds: Rect::new(1.0, 0.0, 6.0, 1.5),
                }],
            }],
            exits: vec![ExitDef {
                id: "exit_far".into(),
                floor: 0,
                position: Vec3::new(30.0, 4.0, 0.0),
                label: "Far Exit".into(),
            }],
            stairs: vec![],
        }
    }

    fn two_floor_layout() -> BuildingLayout {
        let mut layout = corridor_layout();
        let mut upper = layout.floors[0].clone();
        upper.floor = 1;
        upper.elevation = 4.0;
        layout.floors.push(upper);
        layout.stairs = vec![
            StairDef {
                id: "stair_a0".into(),
                floor: 0,
                position: Vec3::new(2.0, 4.0, 0.0),
                direction: StairDirection::Up,
                connects_to: vec![1],
            },
            StairDef {
                id: "stair_a1".into(),
                floor: 1,
                position: Vec3::new(2.0, 4.0, 0.0),
                direction: StairDirection::Down,
                connects_to: vec![0],
            },
        ];
        layout
    }

    #[test]
    fn test_grid_points_and_room_exclusion() {
        let graph = build_graph(&corridor_layout()).unwrap();
        // The office sits on the y=0 wall, so no lattice point is strictly inside it.
        assert!(graph.node("f0_g0_0").is_some());
        assert!(graph.node("f0_g10_4").is_some());
        assert!(graph.validate().is_empty());
    }

    #[test]
    fn test_room_interior_points_removed() {
        let mut layout = corridor_layout();
        layout.floors[0].rooms[0].bounds = Rect::new(1.0, -1.0, 6.0, 2.5);
        let graph = build_graph(&layout).unwrap();
        // (2,0), (4,0), (6,0) are strictly inside the room now.
        assert!(graph.node("f0_g1_0").is_none());
        assert!(graph.node("f0_g2_0").is_none());
        assert!(graph.node("f0_g3_0").is_none());
        assert!(graph.node("f0_g0_0").is_some());
        assert!(graph.node("f0_g4_0").is_some());
    }

    #[test]
    fn test_hallway_classification() {
        let graph = build_graph(&corridor_layout()).unwrap();
        // Hallway band is y ∈ [2, 6].
        assert_eq!(graph.node("f0_g3_2").unwrap().node_type, NodeType::Hallway);
        assert_eq!(graph.node("f0_g3_1").unwrap().node_type, NodeType::Hallway);
        let room_side = graph.node("f0_g3_4").unwrap();
        assert_eq!(room_side.node_type, NodeType::Room);
        assert_eq!(room_side.room_label.as_deref(), Some("office"));
    }

    #[test]
    fn test_grid_edges_use_distance() {
        let graph = build_graph(&corridor_layout()).unwrap();
        let straight = graph.edge("f0_g0_0", "f0_g1_0").unwrap();
        assert!((straight.weight - 2.0).abs() < 1e-5);
        let diagonal = graph.edge("f0_g0_0", "f0_g1_1").unwrap();
        assert!((diagonal.weight - 8f32.sqrt()).abs() < 1e-4);
        // Two lattice steps apart is beyond 1.5 × resolution.
        assert!(graph.edge("f0_g0_0", "f0_g2_0").is_none());
    }

    #[test]
    fn test_far_exit_gets_fallback_link() {
        let graph = build_graph(&corridor_layout()).unwrap();
        let exit = graph.node("exit_far").unwrap();
        assert_eq!(exit.node_type, NodeType::Exit);
        assert_eq!(exit.neighbors.len(), 1);
        let anchor = exit.neighbors.iter().next().unwrap();
        assert_eq!(graph.node(anchor).unwrap().node_type, NodeType::Hallway);
        assert!(graph.is_exit("exit_far"));
    }

    #[test]
    fn test_exit_links_within_radius() {
        let mut layout = corridor_layout();
        layout.exits[0].position = Vec3::new(20.0, 4.0, 0.0);
        let graph = build_graph(&layout).unwrap();
        let exit = graph.node("exit_far").unwrap();
        assert!(exit.neighbors.len() > 1);
        for n in &exit.neighbors {
            let d = graph.node(n).unwrap().position.planar_distance(&exit.position);
            assert!(d <= grid::EXIT_CONNECT_RADIUS + 1e-4);
        }
    }

    #[test]
    fn test_stairwells_connect_floors() {
        let graph = build_graph(&two_floor_layout()).unwrap();
        let edge = graph.edge("stair_a0", "stair_a1").unwrap();
        assert!((edge.weight - grid::STAIR_COST_PER_FLOOR).abs() < 1e-5);
        assert_eq!(graph.node("stair_a1").unwrap().position.z, 4.0);
        // Floor 0 additionally holds the exit.
        assert_eq!(graph.nodes_on_floor(1).len() + 1, graph.nodes_on_floor(0).len());
    }

    #[test]
    fn test_stair_registry_error_fails_fast() {
        let mut layout = two_floor_layout();
        layout.stairs[0].connects_to = vec![7];
        assert!(matches!(
            build_graph(&layout),
            Err(BuildError::StairTargetMissing { floor: 7, .. })
        ));
    }

    #[test]
    fn test_offset_shifts_positions() {
        let mut layout = corridor_layout();
        layout.floors[0].offset_x = 100.0;
        let graph = build_graph(&layout).unwrap();
        assert_eq!(graph.node("f0_g0_0").unwrap().position.x, 100.0);
    }

    #[test]
    fn test_offset_moves_exit_with_floor() {
        let mut layout = corridor_layout();
        layout.floors[0].offset_x = 100.0;
        layout.exits[0].position = Vec3::new(20.0, 4.0, 0.0);
        let graph = build_graph(&layout).unwrap();
        let exit = graph.node("exit_far").unwrap();
        assert_eq!(exit.position.x, 120.0);
        assert!(exit.neighbors.len() > 1);
        for n in &exit.neighbors {
            let d = graph.node(n).unwrap().position.planar_distance(&exit.position);
            assert!(d <= grid::EXIT_CONNECT_RADIUS + 1e-4);
        }
    }

    #[test]
    fn test_offset_floors_keep_stair_link() {
        let mut layout = two_floor_layout();
        layout.floors[1].offset_x = 50.0;
        let graph = build_graph(&layout).unwrap();
        let upper = graph.node("stair_a1").unwrap();
        let lower = graph.node("stair_a0").unwrap();
        assert_eq!(upper.position.x - lower.position.x, 50.0);
        assert!(graph.edge("stair_a0", "stair_a1").is_some());
        assert!(upper.neighbors.iter().any(|n| n.starts_with("f1_g")));
    }

    #[test]
    fn test_embedded_building_every_exit_reachable() {
        let layout = BuildingLayout::embedded().unwrap();
        let graph = build_graph(&layout).unwrap();
        assert!(graph.validate().is_empty());
        for exit in graph.exit_nodes() {
            assert!(!exit.neighbors.is_empty(), "exit {} is isolated", exit.id);
        }
    }
}
