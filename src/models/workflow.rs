// Workflow model - one facade over the two workflow representations

//! # Workflow Models
//!
//! A workflow exists in two representations: the formal Petri net the
//! engine verifies and simulates, and the acyclic task graph an executor
//! consumes. `WorkflowModel` is the sum type over both, exposing the
//! shared capability set `{id, name, description, validate}` so callers
//! that only need those can hold either without caring which.

use serde::{Deserialize, Serialize};

use super::dag::TaskDag;
use super::net::PetriNet;

/// Either representation of a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WorkflowModel {
    /// The formal Petri net
    Petri(PetriNet),

    /// The projected task graph
    Dag(TaskDag),
}

impl WorkflowModel {
    /// The model's id
    pub fn id(&self) -> &str {
        match self {
            WorkflowModel::Petri(net) => &net.id,
            WorkflowModel::Dag(dag) => &dag.id,
        }
    }

    /// The model's display name
    pub fn name(&self) -> &str {
        match self {
            WorkflowModel::Petri(net) => &net.name,
            WorkflowModel::Dag(dag) => &dag.name,
        }
    }

    /// The model's prose description; DAGs have none of their own
    pub fn description(&self) -> &str {
        match self {
            WorkflowModel::Petri(net) => &net.description,
            WorkflowModel::Dag(_) => "",
        }
    }

    /// Validate whichever representation this is, as human-readable
    /// messages
    pub fn validate(&self) -> Vec<String> {
        match self {
            WorkflowModel::Petri(net) => {
                net.validate().iter().map(|e| e.to_string()).collect()
            }
            WorkflowModel::Dag(dag) => dag.validate(),
        }
    }

    /// Whether this is the Petri-net representation
    pub fn is_petri(&self) -> bool {
        matches!(self, WorkflowModel::Petri(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::arc::Arc;
    use crate::models::place::Place;
    use crate::models::transition::Transition;
    use std::collections::HashMap;

    #[test]
    fn test_petri_side() {
        let net = PetriNet::builder("net under test")
            .description("a tiny net")
            .add_place(Place::new("p_in", "In"))
            .add_transition(Transition::new("t_go", "Go"))
            .add_arc(Arc::new("p_in", "t_go"))
            .initial_tokens("p_in", 1)
            .build()
            .unwrap();

        let model = WorkflowModel::Petri(net);
        assert!(model.is_petri());
        assert_eq!(model.name(), "net under test");
        assert_eq!(model.description(), "a tiny net");
        assert!(model.id().starts_with("petri_"));
        assert!(model.validate().is_empty());
    }

    #[test]
    fn test_dag_side() {
        let dag = TaskDag {
            id: "dag_1".to_string(),
            name: "projected".to_string(),
            derived_from_petri_net_id: "petri_000000000000".to_string(),
            metadata: HashMap::new(),
            nodes: vec![],
            edges: vec![],
            root_node_id: None,
        };

        let model = WorkflowModel::Dag(dag);
        assert!(!model.is_petri());
        assert_eq!(model.id(), "dag_1");
        assert_eq!(model.description(), "");
        assert!(model.validate().is_empty());
    }
}
