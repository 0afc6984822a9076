//! Rule-based scoring of an evacuation route.
//!
//! The evaluator reads a chosen path, a reference path and a scenario
//! snapshot. It never touches live simulation state.
//!
//! Score starts at 100 and each failed rule deducts by severity:
//!
//! | Rule | Severity | Fails when |
//! |------|----------|------------|
//! | `avoid-fire` | critical | a node is burning or within the danger radius of a fire |
//! | `avoid-blocked` | critical | a node is in the blocked set |
//! | `minimize-smoke` | high | a node's smoke exceeds 0.7 |
//! | `use-nearest-exit` | medium | chosen length > 1.5 × reference length |
//! | `time-efficiency` | medium | time taken > 1.5 × estimate |
//! | `no-unnecessary-delay` | low | time taken > 2 × estimate |
//!
//! A route is `correct` if it overlaps the reference by at least 70%, or if
//! it breaks no rule and ends at an available exit.

use crate::constants::{hazard, routing, scoring};
use crate::graph::Graph;
use crate::scenario::ScenarioState;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn penalty(self) -> i32 {
        match self {
            Severity::Critical => scoring::CRITICAL_PENALTY,
            Severity::High => scoring::HIGH_PENALTY,
            Severity::Medium => scoring::MEDIUM_PENALTY,
            Severity::Low => scoring::LOW_PENALTY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SafetyRule {
    AvoidFire,
    MinimizeSmoke,
    UseNearestExit,
    AvoidBlocked,
    TimeEfficiency,
    NoUnnecessaryDelay,
}

impl SafetyRule {
    pub const ALL: [SafetyRule; 6] = [
        SafetyRule::AvoidFire,
        SafetyRule::MinimizeSmoke,
        SafetyRule::UseNearestExit,
        SafetyRule::AvoidBlocked,
        SafetyRule::TimeEfficiency,
        SafetyRule::NoUnnecessaryDelay,
    ];

    pub fn id(self) -> &'static str {
        match self {
            SafetyRule::AvoidFire => "avoid-fire",
            SafetyRule::MinimizeSmoke => "minimize-smoke",
            SafetyRule::UseNearestExit => "use-nearest-exit",
            SafetyRule::AvoidBlocked => "avoid-blocked",
            SafetyRule::TimeEfficiency => "time-efficiency",
            SafetyRule::NoUnnecessaryDelay => "no-unnecessary-delay",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            SafetyRule::AvoidFire | SafetyRule::AvoidBlocked => Severity::Critical,
            SafetyRule::MinimizeSmoke => Severity::High,
            SafetyRule::UseNearestExit | SafetyRule::TimeEfficiency => Severity::Medium,
            SafetyRule::NoUnnecessaryDelay => Severity::Low,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SafetyRule::AvoidFire => "Stay away from active fire",
            SafetyRule::MinimizeSmoke => "Avoid dense smoke",
            SafetyRule::UseNearestExit => "Head for the nearest safe exit",
            SafetyRule::AvoidBlocked => "Do not attempt blocked passages",
            SafetyRule::TimeEfficiency => "Evacuate promptly",
            SafetyRule::NoUnnecessaryDelay => "Do not linger",
        }
    }

    /// Advice shown when the rule is broken.
    fn safety_note(self) -> &'static str {
        match self {
            SafetyRule::AvoidFire => "Never route through or next to a fire. Find another way out.",
            SafetyRule::MinimizeSmoke => {
                "Smoke kills before flames do. Stay low and choose clearer corridors."
            }
            SafetyRule::UseNearestExit => "Know the closest exits before an emergency happens.",
            SafetyRule::AvoidBlocked => "Blocked routes waste time you may not have.",
            SafetyRule::TimeEfficiency => "Move with purpose. Every second counts in a fire.",
            SafetyRule::NoUnnecessaryDelay => "Leave belongings behind and go.",
        }
    }
}

/// One broken rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleViolation {
    pub rule: SafetyRule,
    pub severity: Severity,
    pub message: String,
}

/// Score and itemised feedback for one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub correct: bool,
    /// 0..=100.
    pub score: i32,
    pub feedback: String,
    pub detailed_feedback: Vec<String>,
    pub safety_notes: Vec<String>,
    pub violations: Vec<RuleViolation>,
}

impl EvaluationResult {
    pub fn violated(&self, rule: SafetyRule) -> bool {
        self.violations.iter().any(|v| v.rule == rule)
    }
}

/// Fraction of `reference` nodes that also appear in `chosen`.
pub fn path_overlap(chosen: &[String], reference: &[String]) -> f32 {
    if reference.is_empty() {
        return 0.0;
    }
    let chosen: HashSet<&str> = chosen.iter().map(String::as_str).collect();
    let shared = reference
        .iter()
        .filter(|id| chosen.contains(id.as_str()))
        .count();
    shared as f32 / reference.len() as f32
}

/// Scores routes. With a graph attached, fire proximity is measured by node
/// position; without one only burning nodes count.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyEvaluator<'a> {
    graph: Option<&'a Graph>,
}

impl<'a> SafetyEvaluator<'a> {
    pub fn new() -> Self {
        Self { graph: None }
    }

    pub fn with_graph(graph: &'a Graph) -> Self {
        Self { graph: Some(graph) }
    }

    pub fn evaluate(
        &self,
        chosen: &[String],
        reference: &[String],
        state: &ScenarioState,
    ) -> EvaluationResult {
        let mut violations = Vec::new();
        let mut detailed = Vec::new();

        for rule in SafetyRule::ALL {
            match self.check(rule, chosen, reference, state) {
                Some(message) => {
                    detailed.push(format!("FAIL {}: {}", rule.id(), message));
                    violations.push(RuleViolation {
                        rule,
                        severity: rule.severity(),
                        message,
                    });
                }
                None => detailed.push(format!("PASS {}: {}", rule.id(), rule.description())),
            }
        }

        let penalty: i32 = violations.iter().map(|v| v.severity.penalty()).sum();
        let score = (scoring::BASE_SCORE - penalty).max(0);

        let overlap = path_overlap(chosen, reference);
        let ends_at_exit = chosen
            .last()
            .map_or(false, |last| state.is_exit_available(last));
        let correct =
            overlap >= scoring::MIN_OVERLAP || (violations.is_empty() && ends_at_exit);

        if !reference.is_empty() {
            detailed.push(format!(
                "Route overlap with the recommended path: {:.0}%",
                overlap * 100.0
            ));
        }

        let feedback = if chosen.is_empty() {
            "No route was taken.".to_string()
        } else if correct && violations.is_empty() {
            "Excellent. You chose a safe evacuation route.".to_string()
        } else if correct {
            format!(
                "You made it out, but broke {} safety rule(s).",
                violations.len()
            )
        } else if !ends_at_exit {
            "Your route did not end at a safe exit.".to_string()
        } else {
            "Your route reached an exit but took unnecessary risks.".to_string()
        };

        let safety_notes = violations
            .iter()
            .map(|v| v.rule.safety_note().to_string())
            .collect();

        EvaluationResult {
            correct,
            score,
            feedback,
            detailed_feedback: detailed,
            safety_notes,
            violations,
        }
    }

    /// `Some(reason)` if the rule is broken.
    fn check(
        &self,
        rule: SafetyRule,
        chosen: &[String],
        reference: &[String],
        state: &ScenarioState,
    ) -> Option<String> {
        match rule {
            SafetyRule::AvoidFire => chosen
                .iter()
                .find(|id| self.near_fire(id, state))
                .map(|id| format!("Route passes through fire at {}", id)),
            SafetyRule::MinimizeSmoke => chosen
                .iter()
                .map(|id| (id, self.smoke_at(id, state)))
                .find(|(_, level)| *level > routing::UNSAFE_SMOKE_LEVEL)
                .map(|(id, level)| format!("Heavy smoke ({:.0}%) at {}", level * 100.0, id)),
            SafetyRule::UseNearestExit => {
                let limit = reference.len() as f32 * scoring::MAX_LENGTH_RATIO;
                if !reference.is_empty() && chosen.len() as f32 > limit {
                    Some(format!(
                        "Route has {} steps, the nearest exit needs {}",
                        chosen.len(),
                        reference.len()
                    ))
                } else {
                    None
                }
            }
            SafetyRule::AvoidBlocked => chosen
                .iter()
                .find(|id| state.blocked_nodes.contains(id.as_str()))
                .map(|id| format!("Route uses blocked node {}", id)),
            SafetyRule::TimeEfficiency => {
                self.time_over(state, scoring::MAX_TIME_RATIO)
                    .map(|(taken, estimate)| {
                        format!("Took {:.0}s, expected about {:.0}s", taken, estimate)
                    })
            }
            SafetyRule::NoUnnecessaryDelay => {
                self.time_over(state, scoring::MAX_DELAY_RATIO)
                    .map(|(taken, _)| format!("Took {:.0}s, more than double the estimate", taken))
            }
        }
    }

    fn near_fire(&self, id: &str, state: &ScenarioState) -> bool {
        if state.burning_nodes.contains(id) {
            return true;
        }
        if state
            .fire_instances
            .iter()
            .any(|f| f.node_id.as_deref() == Some(id))
        {
            return true;
        }
        let Some(node) = self.graph.and_then(|g| g.node(id)) else {
            return false;
        };
        state
            .fire_instances
            .iter()
            .any(|f| f.position.distance(&node.position) <= hazard::FIRE_DANGER_RADIUS)
    }

    fn smoke_at(&self, id: &str, state: &ScenarioState) -> f32 {
        let live = self.graph.map_or(0.0, |g| g.smoke_level(id));
        state.smoke_level_at(id).max(live)
    }

    /// `(taken, estimate)` when time taken exceeds `ratio` × estimate.
    fn time_over(&self, state: &ScenarioState, ratio: f32) -> Option<(f32, f32)> {
        let estimate = state.estimated_time_to_safety;
        if estimate <= 0.0 {
            return None;
        }
        let taken = state.time_to_safety.unwrap_or_else(|| state.elapsed());
        (taken > estimate * ratio).then_some((taken, estimate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NodeType;
    use crate::graph::Node;
    use crate::layout::Vec3;
    use crate::scenario::{FireInstance, SmokeArea};

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn state(taken: f32, estimate: f32) -> ScenarioState {
        let mut s = ScenarioState::new("eval", Vec3::default());
        s.available_exits = ids(&["e"]);
        s.time_to_safety = Some(taken);
        s.estimated_time_to_safety = estimate;
        s
    }

    fn fire(x: f32, node: Option<&str>) -> FireInstance {
        FireInstance {
            position: Vec3::new(x, 0.0, 0.0),
            intensity: 0.5,
            node_id: node.map(str::to_string),
            created_at: 0.0,
            age: 0.0,
        }
    }

    #[test]
    fn test_perfect_route() {
        let route = ids(&["s", "a", "e"]);
        let r = SafetyEvaluator::new().evaluate(&route, &route, &state(8.0, 10.0));
        assert!(r.correct);
        assert_eq!(r.score, 100);
        assert!(r.violations.is_empty());
        assert!(r.safety_notes.is_empty());
        assert_eq!(r.detailed_feedback.len(), 7);
    }

    #[test]
    fn test_blocked_node_is_critical() {
        let mut s = state(8.0, 10.0);
        s.blocked_nodes.insert("a".into());
        let route = ids(&["s", "a", "e"]);
        let r = SafetyEvaluator::new().evaluate(&route, &route, &s);
        assert!(r.violated(SafetyRule::AvoidBlocked));
        assert_eq!(r.score, 70);
        // Full overlap with the reference still counts as correct.
        assert!(r.correct);
    }

    #[test]
    fn test_burning_node_fails_both_fire_and_blocked() {
        let mut s = state(8.0, 10.0);
        s.fire_instances.push(fire(2.0, Some("a")));
        s.burning_nodes.insert("a".into());
        s.blocked_nodes.insert("a".into());
        let r = SafetyEvaluator::new().evaluate(&ids(&["s", "a", "e"]), &[], &s);
        assert!(r.violated(SafetyRule::AvoidFire));
        assert!(r.violated(SafetyRule::AvoidBlocked));
        assert_eq!(r.score, 40);
        assert!(!r.correct);
    }

    #[test]
    fn test_fire_proximity_needs_graph() {
        let mut g = Graph::new();
        g.add_node(Node::new("s", Vec3::new(0.0, 0.0, 0.0), 0, NodeType::Hallway));
        g.add_node(Node::new("a", Vec3::new(2.0, 0.0, 0.0), 0, NodeType::Hallway));
        g.add_node(Node::new("e", Vec3::new(8.0, 0.0, 0.0), 0, NodeType::Exit));
        let mut s = state(8.0, 10.0);
        s.fire_instances.push(fire(4.0, None));
        let route = ids(&["s", "a", "e"]);

        let blind = SafetyEvaluator::new().evaluate(&route, &[], &s);
        assert!(!blind.violated(SafetyRule::AvoidFire));

        let sighted = SafetyEvaluator::with_graph(&g).evaluate(&route, &[], &s);
        assert!(sighted.violated(SafetyRule::AvoidFire));
        assert!(sighted.safety_notes[0].contains("fire"));
    }

    #[test]
    fn test_smoke_threshold() {
        let mut s = state(8.0, 10.0);
        s.smoke_areas.push(SmokeArea {
            nodes: ids(&["a"]),
            level: 0.7,
            region: None,
        });
        let route = ids(&["s", "a", "e"]);
        let r = SafetyEvaluator::new().evaluate(&route, &[], &s);
        assert!(!r.violated(SafetyRule::MinimizeSmoke));

        s.smoke_areas[0].level = 0.75;
        let r = SafetyEvaluator::new().evaluate(&route, &[], &s);
        assert!(r.violated(SafetyRule::MinimizeSmoke));
        assert_eq!(r.score, 80);
    }

    #[test]
    fn test_detour_fails_nearest_exit() {
        let reference = ids(&["s", "a", "b", "e"]);
        let ok = ids(&["s", "a", "x", "y", "b", "e"]);
        let long = ids(&["s", "a", "x", "y", "z", "b", "e"]);
        let s = state(8.0, 10.0);
        let eval = SafetyEvaluator::new();
        assert!(!eval.evaluate(&ok, &reference, &s).violated(SafetyRule::UseNearestExit));
        let r = eval.evaluate(&long, &reference, &s);
        assert!(r.violated(SafetyRule::UseNearestExit));
        assert_eq!(r.score, 90);
    }

    #[test]
    fn test_time_rules() {
        let route = ids(&["s", "e"]);
        let eval = SafetyEvaluator::new();

        let slow = eval.evaluate(&route, &route, &state(16.0, 10.0));
        assert!(slow.violated(SafetyRule::TimeEfficiency));
        assert!(!slow.violated(SafetyRule::NoUnnecessaryDelay));
        assert_eq!(slow.score, 90);

        let dawdle = eval.evaluate(&route, &route, &state(25.0, 10.0));
        assert!(dawdle.violated(SafetyRule::NoUnnecessaryDelay));
        assert_eq!(dawdle.score, 85);

        // No estimate, no time rules.
        let r = eval.evaluate(&route, &route, &state(500.0, 0.0));
        assert_eq!(r.score, 100);
    }

    #[test]
    fn test_elapsed_used_without_time_to_safety() {
        let mut s = state(0.0, 10.0);
        s.time_to_safety = None;
        s.current_time = 30.0;
        let r = SafetyEvaluator::new().evaluate(&ids(&["s"]), &[], &s);
        assert!(r.violated(SafetyRule::TimeEfficiency));
        assert!(r.violated(SafetyRule::NoUnnecessaryDelay));
    }

    #[test]
    fn test_correct_without_overlap() {
        let reference = ids(&["s", "a", "b", "e"]);
        let other = ids(&["s", "c", "d", "e"]);
        let r = SafetyEvaluator::new().evaluate(&other, &reference, &state(8.0, 10.0));
        assert!((path_overlap(&other, &reference) - 0.5).abs() < 1e-6);
        assert!(r.correct);
    }

    #[test]
    fn test_wrong_exit_not_correct() {
        let reference = ids(&["s", "a", "b", "e"]);
        let other = ids(&["s", "c", "w"]);
        let r = SafetyEvaluator::new().evaluate(&other, &reference, &state(8.0, 10.0));
        assert!(!r.correct);
        assert_eq!(r.feedback, "Your route did not end at a safe exit.");
    }

    #[test]
    fn test_score_never_negative() {
        let mut s = state(100.0, 10.0);
        s.burning_nodes.insert("a".into());
        s.blocked_nodes.insert("a".into());
        s.smoke_areas.push(SmokeArea {
            nodes: ids(&["a"]),
            level: 1.0,
            region: None,
        });
        let chosen = ids(&["s", "a", "b", "c", "d", "e"]);
        let r = SafetyEvaluator::new().evaluate(&chosen, &ids(&["s", "e"]), &s);
        assert_eq!(r.violations.len(), 6);
        assert_eq!(r.score, 0);
    }

    #[test]
    fn test_result_json_shape() {
        let route = ids(&["s", "e"]);
        let mut s = state(8.0, 10.0);
        s.blocked_nodes.insert("s".into());
        let r = SafetyEvaluator::new().evaluate(&route, &route, &s);
        let json = serde_json::to_value(&r).unwrap();
        assert!(json["detailedFeedback"].is_array());
        assert!(json["safetyNotes"].is_array());
        assert_eq!(json["violations"][0]["rule"], "avoid-blocked");
        assert_eq!(json["violations"][0]["severity"], "critical");
    }
}
