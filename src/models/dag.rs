// Task DAG model - the acyclic execution view of a net

//! # Task DAGs
//!
//! A `TaskDag` is the projection of a Petri net back into an acyclic task
//! graph: one node per non-connector transition, one edge per immediate
//! precedence. It is what an execution scheduler or a visualization layer
//! consumes.
//!
//! ## Cross-highlighting
//!
//! Every edge records the net places that realise it, and each node's
//! metadata mirrors the same information under `incomingEdges` as a list
//! of `{from, places}` objects. A UI can therefore highlight an edge and
//! the underlying places (or the reverse) without re-deriving the mapping.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Metadata key under which a node mirrors its incoming edges
pub const META_INCOMING_EDGES: &str = "incomingEdges";

/// One executable task, derived from a net transition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    /// Node id; equals the originating transition id
    pub id: String,

    /// Action label ("send_email", "process_file", ...)
    pub action: String,

    /// Input parameters for the action
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub input_params: HashMap<String, Value>,

    /// Free-form metadata, including `incomingEdges`
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,

    /// Ids of nodes this task waits for (the reduced precedence)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Maximum retry attempts carried over from the transition
    #[serde(default)]
    pub max_retries: u32,
}

/// One immediate-precedence edge with its realising places
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagEdge {
    /// Source node id
    pub from: String,

    /// Target node id
    pub to: String,

    /// Net places through which the precedence flows
    pub places: Vec<String>,
}

/// The projected task graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDag {
    /// Graph id
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// The net this DAG was projected from
    pub derived_from_petri_net_id: String,

    /// Free-form metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,

    /// All task nodes
    pub nodes: Vec<TaskNode>,

    /// The transitively reduced precedence edges
    pub edges: Vec<DagEdge>,

    /// Set when exactly one node has no predecessors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_node_id: Option<String>,
}

impl TaskDag {
    /// Look up a node by id
    pub fn node(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Nodes with no predecessors
    pub fn roots(&self) -> Vec<&TaskNode> {
        self.nodes
            .iter()
            .filter(|n| n.depends_on.is_empty())
            .collect()
    }

    /// Direct successors of a node
    pub fn successors(&self, id: &str) -> Vec<&TaskNode> {
        self.edges
            .iter()
            .filter(|e| e.from == id)
            .filter_map(|e| self.node(&e.to))
            .collect()
    }

    /// Check graph well-formedness: unique node ids, resolvable edges and
    /// dependencies, and acyclicity. Returns every problem found.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let mut ids: HashSet<&str> = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                errors.push(format!("duplicate node id '{}'", node.id));
            }
        }

        for node in &self.nodes {
            for dep in &node.depends_on {
                if !ids.contains(dep.as_str()) {
                    errors.push(format!(
                        "node '{}' depends on unknown node '{}'",
                        node.id, dep
                    ));
                }
            }
        }

        for edge in &self.edges {
            if !ids.contains(edge.from.as_str()) || !ids.contains(edge.to.as_str()) {
                errors.push(format!(
                    "edge {} -> {} references an unknown node",
                    edge.from, edge.to
                ));
            }
        }

        if self.has_cycle() {
            errors.push("task graph contains a cycle".to_string());
        }

        errors
    }

    fn has_cycle(&self) -> bool {
        // Kahn's algorithm: a cycle exists iff topological sorting stalls
        let mut in_degree: HashMap<&str, usize> =
            self.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
        for edge in &self.edges {
            if let Some(d) = in_degree.get_mut(edge.to.as_str()) {
                *d += 1;
            }
        }

        let mut queue: Vec<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut emitted = 0;

        while let Some(id) = queue.pop() {
            emitted += 1;
            for edge in self.edges.iter().filter(|e| e.from == id) {
                if let Some(d) = in_degree.get_mut(edge.to.as_str()) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push(edge.to.as_str());
                    }
                }
            }
        }

        emitted != self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, deps: &[&str]) -> TaskNode {
        TaskNode {
            id: id.to_string(),
            action: "custom_action".to_string(),
            input_params: HashMap::new(),
            metadata: HashMap::new(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            max_retries: 0,
        }
    }

    fn edge(from: &str, to: &str) -> DagEdge {
        DagEdge {
            from: from.to_string(),
            to: to.to_string(),
            places: vec![format!("p_shared_{}_{}", from, to)],
        }
    }

    fn chain() -> TaskDag {
        TaskDag {
            id: "dag_chain".to_string(),
            name: "chain".to_string(),
            derived_from_petri_net_id: "petri_000000000000".to_string(),
            metadata: HashMap::new(),
            nodes: vec![node("a", &[]), node("b", &["a"]), node("c", &["b"])],
            edges: vec![edge("a", "b"), edge("b", "c")],
            root_node_id: Some("a".to_string()),
        }
    }

    #[test]
    fn test_valid_chain() {
        let dag = chain();
        assert!(dag.validate().is_empty());
        assert_eq!(dag.roots().len(), 1);
        assert_eq!(dag.successors("a").len(), 1);
        assert_eq!(dag.successors("c").len(), 0);
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut dag = chain();
        dag.nodes[0].depends_on = vec!["c".to_string()];
        dag.edges.push(edge("c", "a"));

        let errors = dag.validate();
        assert!(errors.iter().any(|e| e.contains("cycle")));
    }

    #[test]
    fn test_dangling_references_are_reported() {
        let mut dag = chain();
        dag.nodes[1].depends_on.push("ghost".to_string());
        dag.edges.push(edge("a", "phantom"));

        let errors = dag.validate();
        assert!(errors.iter().any(|e| e.contains("unknown node 'ghost'")));
        assert!(errors.iter().any(|e| e.contains("a -> phantom")));
    }

    #[test]
    fn test_edges_carry_places() {
        let dag = chain();
        assert_eq!(dag.edges[0].places, vec!["p_shared_a_b".to_string()]);
    }
}
