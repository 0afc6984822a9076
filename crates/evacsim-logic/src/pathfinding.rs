//! A* routing over the navigation graph.
//!
//! Edge cost is `Graph::effective_weight` (distance × smoke penalty, infinite
//! when blocked). The heuristic is straight-line 3D distance. Every edge
//! weight is at least the distance between its endpoints, so the heuristic
//! is consistent and the first time the goal is popped its cost is optimal.
//!
//! Ties on f-score are broken by the lexically smallest node id, which makes
//! results reproducible across runs.
//!
//! ```
//! use evacsim_logic::constants::NodeType;
//! use evacsim_logic::graph::{Graph, Node};
//! use evacsim_logic::layout::Vec3;
//! use evacsim_logic::pathfinding::Pathfinder;
//!
//! let mut graph = Graph::new();
//! graph.add_node(Node::new("s", Vec3::new(0.0, 0.0, 0.0), 0, NodeType::Hallway));
//! graph.add_node(Node::new("e", Vec3::new(3.0, 0.0, 0.0), 0, NodeType::Exit));
//! graph.add_edge("s", "e", 3.0);
//!
//! let path = Pathfinder::new(&graph).find_path_to_nearest_exit("s").unwrap();
//! assert_eq!(path.nodes, vec!["s", "e"]);
//! assert_eq!(path.total_cost, 3.0);
//! ```

use crate::constants::routing;
use crate::graph::Graph;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

/// A route through the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Path {
    pub nodes: Vec<String>,
    pub total_cost: f32,
    /// Walking time in seconds at the nominal pace.
    pub estimated_time: f32,
    /// False if any node on the route is blocked or heavily smoked.
    pub is_safe: bool,
}

impl Path {
    pub fn destination(&self) -> Option<&str> {
        self.nodes.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Whether a node sequence avoids blocked and heavily smoked nodes.
pub fn assess_safety(graph: &Graph, nodes: &[String]) -> bool {
    nodes.iter().all(|id| match graph.node(id) {
        Some(n) => !n.blocked && n.smoke_level <= routing::UNSAFE_SMOKE_LEVEL,
        None => false,
    })
}

/// Open-set entry ordered so `BinaryHeap` pops the lowest f-score first,
/// then the smallest id.
#[derive(Debug)]
struct OpenEntry {
    f: f32,
    id: String,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Read-only router borrowing a graph.
pub struct Pathfinder<'a> {
    graph: &'a Graph,
}

impl<'a> Pathfinder<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        Self { graph }
    }

    /// Cheapest route from `start` to `goal`, or `None` if either end is
    /// unknown or blocked, or the goal is unreachable.
    pub fn find_path(&self, start: &str, goal: &str) -> Option<Path> {
        let graph = self.graph;
        let (Some(start_node), Some(goal_node)) = (graph.node(start), graph.node(goal)) else {
            log::debug!("find_path: unknown endpoint {} -> {}", start, goal);
            return None;
        };
        if start_node.blocked || goal_node.blocked {
            return None;
        }
        if start == goal {
            return Some(self.make_path(vec![start.to_string()], 0.0));
        }

        let goal_pos = goal_node.position;
        let heuristic = |id: &str| {
            graph
                .node(id)
                .map(|n| n.position.distance(&goal_pos))
                .unwrap_or(0.0)
        };

        let mut open = BinaryHeap::new();
        let mut g_score: HashMap<String, f32> = HashMap::new();
        let mut came_from: HashMap<String, String> = HashMap::new();
        let mut closed: HashSet<String> = HashSet::new();

        g_score.insert(start.to_string(), 0.0);
        open.push(OpenEntry {
            f: heuristic(start),
            id: start.to_string(),
        });

        while let Some(OpenEntry { id: current, .. }) = open.pop() {
            if current == goal {
                let cost = g_score.get(&current).copied().unwrap_or(0.0);
                return Some(self.make_path(reconstruct(&came_from, current), cost));
            }
            if !closed.insert(current.clone()) {
                continue;
            }
            let current_g = g_score.get(&current).copied().unwrap_or(f32::INFINITY);

            for next in graph.neighbors(&current) {
                if closed.contains(next) {
                    continue;
                }
                let weight = graph.effective_weight(&current, next);
                if !weight.is_finite() {
                    continue;
                }
                let tentative = current_g + weight;
                if tentative < g_score.get(next).copied().unwrap_or(f32::INFINITY) {
                    g_score.insert(next.to_string(), tentative);
                    came_from.insert(next.to_string(), current.clone());
                    open.push(OpenEntry {
                        f: tentative + heuristic(next),
                        id: next.to_string(),
                    });
                }
            }
        }

        None
    }

    /// Cheapest route to any registered exit.
    pub fn find_path_to_nearest_exit(&self, start: &str) -> Option<Path> {
        self.find_path_to_nearest_of(start, self.graph.exit_ids().iter().map(String::as_str))
    }

    /// Cheapest route to any of `targets`. Equal costs keep the first target
    /// in iteration order.
    pub fn find_path_to_nearest_of<'t>(
        &self,
        start: &str,
        targets: impl IntoIterator<Item = &'t str>,
    ) -> Option<Path> {
        let mut best: Option<Path> = None;
        for target in targets {
            if let Some(path) = self.find_path(start, target) {
                if best.as_ref().map_or(true, |b| path.total_cost < b.total_cost) {
                    best = Some(path);
                }
            }
        }
        best
    }

    /// Breadth-first reachability over unblocked nodes and edges.
    ///
    /// The start node itself may be blocked (the player can be standing in
    /// fire); only the nodes and edges leaving it must be passable.
    pub fn can_reach_any(&self, start: &str, targets: &HashSet<String>) -> bool {
        if !self.graph.has_node(start) {
            return false;
        }
        if targets.contains(start) {
            return true;
        }
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for next in self.passable_from(current) {
                if targets.contains(next) {
                    return true;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    fn passable_from(&self, id: &str) -> Vec<&'a str> {
        let graph = self.graph;
        graph
            .neighbors(id)
            .filter(|n| {
                !graph.is_node_blocked(n) && graph.edge(id, n).map_or(false, |e| !e.blocked)
            })
            .collect()
    }

    fn make_path(&self, nodes: Vec<String>, total_cost: f32) -> Path {
        let is_safe = assess_safety(self.graph, &nodes);
        Path {
            nodes,
            total_cost,
            estimated_time: total_cost * routing::SECONDS_PER_UNIT,
            is_safe,
        }
    }
}

fn reconstruct(came_from: &HashMap<String, String>, goal: String) -> Vec<String> {
    let mut path = vec![goal];
    while let Some(prev) = path.last().and_then(|id| came_from.get(id)) {
        path.push(prev.clone());
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NodeType;
    use crate::graph::Node;
    use crate::layout::Vec3;

    fn add(g: &mut Graph, id: &str, x: f32, y: f32, t: NodeType) {
        g.add_node(Node::new(id, Vec3::new(x, y, 0.0), 0, t));
    }

    /// S at the origin with two exits: E1 four units east, E2 nine units west
    /// (reached via W).
    fn two_exit_graph() -> Graph {
        let mut g = Graph::new();
        add(&mut g, "S", 0.0, 0.0, NodeType::Hallway);
        add(&mut g, "M", 2.0, 0.0, NodeType::Hallway);
        add(&mut g, "E1", 4.0, 0.0, NodeType::Exit);
        add(&mut g, "W", -5.0, 0.0, NodeType::Hallway);
        add(&mut g, "E2", -9.0, 0.0, NodeType::Exit);
        g.add_edge("S", "M", 2.0);
        g.add_edge("M", "E1", 2.0);
        g.add_edge("S", "W", 5.0);
        g.add_edge("W", "E2", 4.0);
        g
    }

    #[test]
    fn test_nearest_exit_picks_cheapest() {
        let g = two_exit_graph();
        let path = Pathfinder::new(&g).find_path_to_nearest_exit("S").unwrap();
        assert_eq!(path.destination(), Some("E1"));
        assert!((path.total_cost - 4.0).abs() < 1e-5);
        assert!((path.estimated_time - 4.0 * routing::SECONDS_PER_UNIT).abs() < 1e-5);
        assert!(path.is_safe);
    }

    #[test]
    fn test_find_path_sequence() {
        let g = two_exit_graph();
        let path = Pathfinder::new(&g).find_path("S", "E2").unwrap();
        assert_eq!(path.nodes, vec!["S", "W", "E2"]);
        assert!((path.total_cost - 9.0).abs() < 1e-5);
    }

    #[test]
    fn test_blocked_middle_means_no_path() {
        let mut g = Graph::new();
        add(&mut g, "S", 0.0, 0.0, NodeType::Hallway);
        add(&mut g, "M", 1.0, 0.0, NodeType::Hallway);
        add(&mut g, "X", 2.0, 0.0, NodeType::Exit);
        g.add_edge("S", "M", 1.0);
        g.add_edge("M", "X", 1.0);
        g.block_node("M");
        assert!(Pathfinder::new(&g).find_path("S", "X").is_none());
        assert!(Pathfinder::new(&g).find_path_to_nearest_exit("S").is_none());
    }

    #[test]
    fn test_blocked_endpoints_and_unknown_ids() {
        let mut g = two_exit_graph();
        let pf = Pathfinder::new(&g);
        assert!(pf.find_path("S", "nowhere").is_none());
        assert!(pf.find_path("nowhere", "S").is_none());
        g.block_node("E1");
        let pf = Pathfinder::new(&g);
        assert!(pf.find_path("S", "E1").is_none());
        // Falls back to the other exit.
        let path = pf.find_path_to_nearest_exit("S").unwrap();
        assert_eq!(path.destination(), Some("E2"));
    }

    #[test]
    fn test_same_start_and_goal() {
        let g = two_exit_graph();
        let path = Pathfinder::new(&g).find_path("S", "S").unwrap();
        assert_eq!(path.nodes, vec!["S"]);
        assert_eq!(path.total_cost, 0.0);
    }

    #[test]
    fn test_smoke_diverts_route() {
        // Two parallel routes of equal length; smoke on the upper one.
        let mut g = Graph::new();
        add(&mut g, "S", 0.0, 0.0, NodeType::Hallway);
        add(&mut g, "U", 1.0, 1.0, NodeType::Hallway);
        add(&mut g, "D", 1.0, -1.0, NodeType::Hallway);
        add(&mut g, "E", 2.0, 0.0, NodeType::Exit);
        let side = 2f32.sqrt();
        g.add_edge("S", "U", side);
        g.add_edge("U", "E", side);
        g.add_edge("S", "D", side);
        g.add_edge("D", "E", side);
        g.set_smoke_level("D", 0.5);
        let path = Pathfinder::new(&g).find_path("S", "E").unwrap();
        assert_eq!(path.nodes, vec!["S", "U", "E"]);
        assert!(path.is_safe);
    }

    #[test]
    fn test_heavy_smoke_marks_unsafe() {
        let mut g = Graph::new();
        add(&mut g, "S", 0.0, 0.0, NodeType::Hallway);
        add(&mut g, "E", 1.0, 0.0, NodeType::Exit);
        g.add_edge("S", "E", 1.0);
        g.set_smoke_level("E", 0.8);
        let path = Pathfinder::new(&g).find_path("S", "E").unwrap();
        assert!(!path.is_safe);
    }

    #[test]
    fn test_equal_cost_tie_break_is_stable() {
        let mut g = Graph::new();
        add(&mut g, "S", 0.0, 0.0, NodeType::Hallway);
        add(&mut g, "b", 1.0, 1.0, NodeType::Hallway);
        add(&mut g, "a", 1.0, -1.0, NodeType::Hallway);
        add(&mut g, "E", 2.0, 0.0, NodeType::Exit);
        let side = 2f32.sqrt();
        for mid in ["a", "b"] {
            g.add_edge("S", mid, side);
            g.add_edge(mid, "E", side);
        }
        let first = Pathfinder::new(&g).find_path("S", "E").unwrap();
        for _ in 0..10 {
            assert_eq!(Pathfinder::new(&g).find_path("S", "E").unwrap(), first);
        }
    }

    #[test]
    fn test_can_reach_any() {
        let mut g = two_exit_graph();
        let exits: HashSet<String> = ["E1".to_string(), "E2".to_string()].into();
        assert!(Pathfinder::new(&g).can_reach_any("S", &exits));
        g.block_node("M");
        g.block_edge("W", "E2");
        assert!(!Pathfinder::new(&g).can_reach_any("S", &exits));
        g.unblock_edge("W", "E2");
        assert!(Pathfinder::new(&g).can_reach_any("S", &exits));
    }

    #[test]
    fn test_can_reach_from_blocked_start() {
        let mut g = two_exit_graph();
        let exits: HashSet<String> = ["E1".to_string()].into();
        g.block_node("S");
        assert!(Pathfinder::new(&g).can_reach_any("S", &exits));
        assert!(!Pathfinder::new(&g).can_reach_any("nowhere", &exits));
    }

    #[test]
    fn test_open_entry_ordering() {
        let mut heap = BinaryHeap::new();
        heap.push(OpenEntry { f: 2.0, id: "a".into() });
        heap.push(OpenEntry { f: 1.0, id: "z".into() });
        heap.push(OpenEntry { f: 1.0, id: "m".into() });
        assert_eq!(heap.pop().unwrap().id, "m");
        assert_eq!(heap.pop().unwrap().id, "z");
        assert_eq!(heap.pop().unwrap().id, "a");
    }
}
