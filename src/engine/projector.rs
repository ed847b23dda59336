// Projector - Petri net back to an acyclic task graph

//! # Projector
//!
//! Projection turns a verified net into the [`TaskDag`] an executor or a
//! visualization layer consumes. Each non-connector transition becomes
//! exactly one task node; edges express **immediate** precedence between
//! transitions as implied by shared places, after transitive reduction.
//!
//! ## Algorithm
//!
//! 1. Drop transitions flagged `isDependencyConnector` (compilation
//!    helpers with no business meaning).
//! 2. Build the precedence relation: A precedes B iff some place p
//!    carries arcs A -> p and p -> B; remember p per edge.
//! 3. Reject cyclic precedence with `CyclicPrecedence` - the compiler
//!    never produces one from a valid intent, so a cycle here means the
//!    net was hand-built for cyclic execution and has no DAG view.
//! 4. Transitively reduce: an edge A -> C disappears when C is reachable
//!    from A through at least one intermediate retained transition.
//! 5. Emit nodes and edges; each edge carries its realising places, and
//!    each node mirrors them under `incomingEdges` metadata for
//!    cross-highlighting.

use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::models::dag::META_INCOMING_EDGES;
use crate::models::{DagEdge, PetriNet, TaskDag, TaskNode, Transition};
use crate::{PetriflowError, Result};

/// Projects nets onto task DAGs
#[derive(Debug, Clone, Default)]
pub struct DagProjector;

impl DagProjector {
    pub fn new() -> Self {
        DagProjector
    }

    /// Project `net` onto its task DAG
    pub fn project(&self, net: &PetriNet) -> Result<TaskDag> {
        let retained: Vec<&Transition> = net
            .transitions
            .iter()
            .filter(|t| !t.is_dependency_connector())
            .collect();
        let retained_ids: BTreeSet<&str> = retained.iter().map(|t| t.id.as_str()).collect();

        // Precedence with realising places: A -> B through place p when
        // arcs A -> p and p -> B both exist
        let mut places_by_edge: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
        for producing in &net.arcs {
            if !retained_ids.contains(producing.from.as_str()) {
                continue;
            }
            let place = &producing.to;
            for consuming in net.arcs.iter().filter(|a| &a.from == place) {
                if !retained_ids.contains(consuming.to.as_str()) {
                    continue;
                }
                if producing.from == consuming.to {
                    // A self-loop is a cycle of length one
                    return Err(PetriflowError::CyclicPrecedence {
                        transition: producing.from.clone(),
                    });
                }
                places_by_edge
                    .entry((producing.from.clone(), consuming.to.clone()))
                    .or_default()
                    .insert(place.clone());
            }
        }

        // Adjacency of the precedence relation, keys and lists sorted
        let mut successors: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (a, b) in places_by_edge.keys() {
            successors.entry(a.clone()).or_default().push(b.clone());
        }

        // Cycle check before reduction; reduction assumes acyclicity
        if let Some(on_cycle) = find_cycle(&retained_ids, &successors) {
            return Err(PetriflowError::CyclicPrecedence {
                transition: on_cycle,
            });
        }

        // Transitive reduction: drop A -> C when some other successor B
        // of A reaches C
        let mut reduced: Vec<(String, String)> = Vec::new();
        for (a, c) in places_by_edge.keys() {
            let redundant = successors
                .get(a)
                .map(|nexts| {
                    nexts
                        .iter()
                        .filter(|b| *b != c)
                        .any(|b| reaches(b, c, &successors))
                })
                .unwrap_or(false);
            if !redundant {
                reduced.push((a.clone(), c.clone()));
            }
        }

        let edges: Vec<DagEdge> = reduced
            .iter()
            .map(|(from, to)| DagEdge {
                from: from.clone(),
                to: to.clone(),
                places: places_by_edge[&(from.clone(), to.clone())]
                    .iter()
                    .cloned()
                    .collect(),
            })
            .collect();

        let mut depends_on: HashMap<&str, Vec<String>> = HashMap::new();
        for edge in &edges {
            depends_on
                .entry(edge.to.as_str())
                .or_default()
                .push(edge.from.clone());
        }

        let nodes: Vec<TaskNode> = retained
            .iter()
            .map(|t| {
                let mut metadata = t.metadata.clone();
                let incoming: Vec<_> = edges
                    .iter()
                    .filter(|e| e.to == t.id.as_str())
                    .map(|e| json!({ "from": e.from, "places": e.places }))
                    .collect();
                if !incoming.is_empty() {
                    metadata.insert(META_INCOMING_EDGES.to_string(), json!(incoming));
                }

                TaskNode {
                    id: t.id.as_str().to_string(),
                    action: t
                        .action
                        .clone()
                        .unwrap_or_else(|| "custom_action".to_string()),
                    input_params: HashMap::new(),
                    metadata,
                    depends_on: depends_on.remove(t.id.as_str()).unwrap_or_default(),
                    max_retries: t.retry_policy.as_ref().map(|p| p.max_retries).unwrap_or(0),
                }
            })
            .collect();

        let roots: Vec<&TaskNode> = nodes.iter().filter(|n| n.depends_on.is_empty()).collect();
        let root_node_id = match roots.as_slice() {
            [single] => Some(single.id.clone()),
            _ => None,
        };

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            "projected net onto task graph"
        );

        Ok(TaskDag {
            id: format!("dag_{}", net.id.trim_start_matches("petri_")),
            name: net.name.clone(),
            derived_from_petri_net_id: net.id.clone(),
            metadata: net.metadata.clone(),
            nodes,
            edges,
            root_node_id,
        })
    }
}

/// Whether `to` is reachable from `from` along the precedence relation
fn reaches(from: &str, to: &str, successors: &BTreeMap<String, Vec<String>>) -> bool {
    let mut stack: Vec<&str> = vec![from];
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    while let Some(current) = stack.pop() {
        if current == to {
            return true;
        }
        if seen.insert(current) {
            if let Some(nexts) = successors.get(current) {
                stack.extend(nexts.iter().map(String::as_str));
            }
        }
    }
    false
}

// Colors for the cycle search: unseen, on the current path, finished
#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Find a transition on a precedence cycle, if any
fn find_cycle(ids: &BTreeSet<&str>, successors: &BTreeMap<String, Vec<String>>) -> Option<String> {
    let mut colors: BTreeMap<String, Color> = ids
        .iter()
        .map(|id| (id.to_string(), Color::White))
        .collect();

    for id in ids {
        if colors.get(*id).copied() == Some(Color::White) {
            if let Some(found) = visit(id, &mut colors, successors) {
                return Some(found);
            }
        }
    }
    None
}

fn visit(
    node: &str,
    colors: &mut BTreeMap<String, Color>,
    successors: &BTreeMap<String, Vec<String>>,
) -> Option<String> {
    colors.insert(node.to_string(), Color::Gray);
    if let Some(nexts) = successors.get(node) {
        for next in nexts {
            match colors.get(next).copied().unwrap_or(Color::White) {
                Color::Gray => return Some(next.clone()),
                Color::White => {
                    if let Some(found) = visit(next, colors, successors) {
                        return Some(found);
                    }
                }
                Color::Black => {}
            }
        }
    }
    colors.insert(node.to_string(), Color::Black);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::compiler::AutomationGrammar;
    use crate::models::transition::META_IS_DEPENDENCY_CONNECTOR;
    use crate::models::{Arc, IntentSpec, IntentStep, Place};
    use serde_json::json;

    /// A hand-built net whose precedence is A -> B, B -> C, A -> C
    fn diamond_shortcut_net() -> PetriNet {
        PetriNet::builder("shortcut")
            .add_place(Place::new("p_start", "Start"))
            .add_place(Place::new("p_ab", "A to B"))
            .add_place(Place::new("p_bc", "B to C"))
            .add_place(Place::new("p_ac", "A to C"))
            .add_place(Place::new("p_end", "End"))
            .add_transition(Transition::new("t_a", "A"))
            .add_transition(Transition::new("t_b", "B"))
            .add_transition(Transition::new("t_c", "C"))
            .add_arc(Arc::new("p_start", "t_a"))
            .add_arc(Arc::new("t_a", "p_ab"))
            .add_arc(Arc::new("t_a", "p_ac"))
            .add_arc(Arc::new("p_ab", "t_b"))
            .add_arc(Arc::new("t_b", "p_bc"))
            .add_arc(Arc::new("p_bc", "t_c"))
            .add_arc(Arc::new("p_ac", "t_c"))
            .add_arc(Arc::new("t_c", "p_end"))
            .initial_tokens("p_start", 1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_transitive_reduction_drops_shortcut() {
        let dag = DagProjector::new().project(&diamond_shortcut_net()).unwrap();

        let edge_pairs: Vec<(&str, &str)> = dag
            .edges
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        // A -> C is implied by A -> B -> C and must be gone
        assert!(edge_pairs.contains(&("t_a", "t_b")));
        assert!(edge_pairs.contains(&("t_b", "t_c")));
        assert!(!edge_pairs.contains(&("t_a", "t_c")));
        assert_eq!(dag.edges.len(), 2);

        // Dependencies mirror the reduced edges
        assert_eq!(dag.node("t_c").unwrap().depends_on, vec!["t_b".to_string()]);
        assert_eq!(dag.root_node_id.as_deref(), Some("t_a"));
        assert!(dag.validate().is_empty());
    }

    #[test]
    fn test_edges_carry_realising_places() {
        let dag = DagProjector::new().project(&diamond_shortcut_net()).unwrap();
        let ab = dag
            .edges
            .iter()
            .find(|e| e.from == "t_a" && e.to == "t_b")
            .unwrap();
        assert_eq!(ab.places, vec!["p_ab".to_string()]);
    }

    #[test]
    fn test_incoming_edges_metadata() {
        let dag = DagProjector::new().project(&diamond_shortcut_net()).unwrap();

        let b = dag.node("t_b").unwrap();
        assert_eq!(
            b.metadata.get(META_INCOMING_EDGES),
            Some(&json!([{ "from": "t_a", "places": ["p_ab"] }]))
        );
        // Roots carry no incoming-edge metadata
        assert!(dag
            .node("t_a")
            .unwrap()
            .metadata
            .get(META_INCOMING_EDGES)
            .is_none());
    }

    #[test]
    fn test_connector_transitions_are_dropped() {
        let net = PetriNet::builder("with connector")
            .add_place(Place::new("p_1", "P1"))
            .add_place(Place::new("p_2", "P2"))
            .add_place(Place::new("p_3", "P3"))
            .add_place(Place::new("p_4", "P4"))
            .add_transition(Transition::new("t_real_a", "Real A"))
            .add_transition(
                Transition::new("t_helper", "Helper")
                    .with_metadata(META_IS_DEPENDENCY_CONNECTOR, json!(true)),
            )
            .add_transition(Transition::new("t_real_b", "Real B"))
            .add_arc(Arc::new("p_1", "t_real_a"))
            .add_arc(Arc::new("t_real_a", "p_2"))
            .add_arc(Arc::new("p_2", "t_helper"))
            .add_arc(Arc::new("t_helper", "p_3"))
            .add_arc(Arc::new("p_3", "t_real_b"))
            .add_arc(Arc::new("t_real_b", "p_4"))
            .initial_tokens("p_1", 1)
            .build()
            .unwrap();

        let dag = DagProjector::new().project(&net).unwrap();
        assert!(dag.node("t_helper").is_none());
        assert_eq!(dag.nodes.len(), 2);
        // The helper breaks direct precedence: no edge survives it
        assert!(dag.edges.is_empty());
    }

    #[test]
    fn test_cyclic_precedence_is_rejected() {
        // t_x -> p -> t_y and t_y -> q -> t_x
        let net = PetriNet::builder("cycle")
            .add_place(Place::new("p", "P"))
            .add_place(Place::new("q", "Q"))
            .add_transition(Transition::new("t_x", "X"))
            .add_transition(Transition::new("t_y", "Y"))
            .add_arc(Arc::new("t_x", "p"))
            .add_arc(Arc::new("p", "t_y"))
            .add_arc(Arc::new("t_y", "q"))
            .add_arc(Arc::new("q", "t_x"))
            .initial_tokens("p", 1)
            .build()
            .unwrap();

        let err = DagProjector::new().project(&net).unwrap_err();
        match err {
            PetriflowError::CyclicPrecedence { transition } => {
                assert!(transition == "t_x" || transition == "t_y");
            }
            other => panic!("expected CyclicPrecedence, got {:?}", other),
        }
    }

    #[test]
    fn test_self_loop_is_rejected() {
        let net = PetriNet::builder("self loop")
            .add_place(Place::new("p", "P"))
            .add_transition(Transition::new("t", "T"))
            .add_arc(Arc::new("p", "t"))
            .add_arc(Arc::new("t", "p"))
            .initial_tokens("p", 1)
            .build()
            .unwrap();

        let err = DagProjector::new().project(&net).unwrap_err();
        assert!(matches!(err, PetriflowError::CyclicPrecedence { .. }));
    }

    #[test]
    fn test_compiled_linear_intent_projects_to_chain() {
        let intent = IntentSpec::new("chain")
            .with_step(IntentStep::action("s1", "Fetch the report file"))
            .with_step(IntentStep::action("s2", "Send email summary").depends_on("s1"))
            .with_step(IntentStep::action("s3", "Post to slack").depends_on("s2"));
        let net = AutomationGrammar::new().compile(&intent).unwrap();

        let dag = DagProjector::new().project(&net).unwrap();
        assert_eq!(dag.nodes.len(), 3);
        assert_eq!(dag.edges.len(), 2);
        assert_eq!(dag.root_node_id.as_deref(), Some("t_s1"));
        assert_eq!(dag.derived_from_petri_net_id, net.id);

        // The realising place of the first edge is the shared place
        let first = dag
            .edges
            .iter()
            .find(|e| e.from == "t_s1" && e.to == "t_s2")
            .unwrap();
        assert_eq!(first.places, vec!["p_shared_s1_s2".to_string()]);

        // Action labels survive projection
        assert_eq!(dag.node("t_s2").unwrap().action, "send_email");
        assert_eq!(dag.node("t_s3").unwrap().action, "post_slack");
    }

    #[test]
    fn test_max_retries_carried_from_retry_policy() {
        let mut step = IntentStep::action("s1", "Retry-prone work");
        step.retry_policy
            .insert("maxRetries".to_string(), json!(7));
        let net = AutomationGrammar::new()
            .compile(&IntentSpec::new("retries").with_step(step))
            .unwrap();

        let dag = DagProjector::new().project(&net).unwrap();
        assert_eq!(dag.node("t_s1").unwrap().max_retries, 7);
    }

    #[test]
    fn test_multiple_roots_leave_root_unset() {
        let intent = IntentSpec::new("two roots")
            .with_step(IntentStep::action("a", "Left root"))
            .with_step(IntentStep::action("b", "Right root"));
        let net = AutomationGrammar::new().compile(&intent).unwrap();

        let dag = DagProjector::new().project(&net).unwrap();
        assert_eq!(dag.roots().len(), 2);
        assert!(dag.root_node_id.is_none());
    }

    #[test]
    fn test_parallel_compiles_to_fork_then_join() {
        let intent =
            IntentSpec::new("par").with_step(IntentStep::parallel("pf", "Fan out the work"));
        let net = AutomationGrammar::new().compile(&intent).unwrap();

        let dag = DagProjector::new().project(&net).unwrap();
        let edge = dag
            .edges
            .iter()
            .find(|e| e.from == "t_fork_pf" && e.to == "t_join_pf")
            .unwrap();
        // Both branch places realise the single fork -> join edge
        assert_eq!(
            edge.places,
            vec![
                "p_parallel_branch_pf_1".to_string(),
                "p_parallel_branch_pf_2".to_string()
            ]
        );
    }
}
