// Petri net model - immutable nets with content-addressed identity

//! # Petri Nets
//!
//! A `PetriNet` is the complete formal model of a workflow: places,
//! transitions, weighted arcs, and an initial marking. Nets are built
//! through [`PetriNetBuilder`] and are **immutable once built** - the
//! validator, simulator, and projector all consume the same sealed value
//! and never mutate it.
//!
//! ## Structural invariants
//!
//! `build()` refuses to seal a net that violates any of these:
//!
//! - at least one place and at least one transition;
//! - unique, non-empty element ids (no id doubles as place and transition);
//! - every arc endpoint exists and arcs alternate kind
//!   (place -> transition or transition -> place, never same-kind);
//! - arc weights are at least 1; inhibitor arcs only enter transitions;
//! - the initial marking only names existing places and respects declared
//!   capacities.
//!
//! ## Stable identity
//!
//! When no id is supplied, the builder derives one from the net's content:
//! `petri_<first-12-hex-of-SHA1>` over a canonical JSON form in which
//! places and transitions are sorted by id, arcs by `(from, to)`, and the
//! initial marking is included. Two nets that differ only in the insertion
//! order of their elements therefore get the same id, across processes.
//!
//! ## Enablement and firing
//!
//! `is_enabled` is purely structural: token counts against arc weights
//! (inhibitor arcs reverse the test) plus capacity room on output places.
//! Guard expressions and inhibitor *conditions* are evaluated by the
//! simulator, which holds a context; the validator deliberately ignores
//! them so it can enumerate the structural state space.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::arc::Arc;
use super::ids::{PlaceId, TransitionId};
use super::marking::Marking;
use super::place::Place;
use super::transition::Transition;
use crate::{PetriflowError, Result};

/// A single structural defect found while validating a net
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralError {
    /// What is wrong
    pub message: String,

    /// The offending element, when one can be named
    pub element_id: Option<String>,
}

impl StructuralError {
    fn new<M: Into<String>>(message: M, element_id: Option<String>) -> Self {
        StructuralError {
            message: message.into(),
            element_id,
        }
    }
}

impl std::fmt::Display for StructuralError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(id) = &self.element_id {
            write!(f, "[{}] {}", id, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// An immutable Petri net
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetriNet {
    /// Content-addressed unless explicitly supplied
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// What this net models, in prose
    #[serde(default)]
    pub description: String,

    /// All places, in insertion order
    pub places: Vec<Place>,

    /// All transitions, in insertion order
    pub transitions: Vec<Transition>,

    /// All arcs, in insertion order
    pub arcs: Vec<Arc>,

    /// Where tokens start
    pub initial_marking: Marking,

    /// Version of the net schema this value conforms to
    pub schema_version: String,

    /// Free-form metadata (compiler lineage, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,

    /// Set when this net was derived from a task DAG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from_dag_id: Option<String>,
}

impl PetriNet {
    /// Start building a net
    pub fn builder<N: Into<String>>(name: N) -> PetriNetBuilder {
        PetriNetBuilder::new(name)
    }

    /// Look up a place by id
    pub fn place(&self, id: &str) -> Option<&Place> {
        self.places.iter().find(|p| p.id.as_str() == id)
    }

    /// Look up a transition by id
    pub fn transition(&self, id: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.id.as_str() == id)
    }

    /// Places feeding the given transition (inhibitor arcs included)
    pub fn input_places(&self, t: &TransitionId) -> Vec<&Place> {
        self.arcs
            .iter()
            .filter(|a| a.to == t.as_str())
            .filter_map(|a| self.place(&a.from))
            .collect()
    }

    /// Places the given transition produces into
    pub fn output_places(&self, t: &TransitionId) -> Vec<&Place> {
        self.arcs
            .iter()
            .filter(|a| a.from == t.as_str())
            .filter_map(|a| self.place(&a.to))
            .collect()
    }

    /// Transitions producing into the given place
    pub fn input_transitions(&self, p: &PlaceId) -> Vec<&Transition> {
        self.arcs
            .iter()
            .filter(|a| a.to == p.as_str())
            .filter_map(|a| self.transition(&a.from))
            .collect()
    }

    /// Transitions consuming from the given place
    pub fn output_transitions(&self, p: &PlaceId) -> Vec<&Transition> {
        self.arcs
            .iter()
            .filter(|a| a.from == p.as_str())
            .filter_map(|a| self.transition(&a.to))
            .collect()
    }

    /// The arc between two elements, if any
    pub fn arc(&self, from: &str, to: &str) -> Option<&Arc> {
        self.arcs.iter().find(|a| a.from == from && a.to == to)
    }

    /// Arc weight between two elements; 0 when no arc exists
    pub fn arc_weight(&self, from: &str, to: &str) -> u64 {
        self.arc(from, to).map(|a| a.weight).unwrap_or(0)
    }

    /// Places with no outgoing transitions
    pub fn sink_places(&self) -> Vec<&Place> {
        self.places
            .iter()
            .filter(|p| self.output_transitions(&p.id).is_empty())
            .collect()
    }

    /// Places seeded by the initial marking
    pub fn source_places(&self) -> Vec<&Place> {
        self.places
            .iter()
            .filter(|p| self.initial_marking.tokens(p.id.as_str()) > 0)
            .collect()
    }

    /// Structural enablement of a transition under a marking
    ///
    /// True iff every input place satisfies its arc (at least `weight`
    /// tokens for normal and test arcs, *fewer* than `weight` for
    /// inhibitor arcs) and every output place with a declared capacity can
    /// absorb the produced tokens. Guards are not consulted here.
    pub fn is_enabled(&self, t: &TransitionId, marking: &Marking) -> bool {
        if self.transition(t.as_str()).is_none() {
            return false;
        }

        for arc in self.arcs.iter().filter(|a| a.to == t.as_str()) {
            let have = marking.tokens(&arc.from);
            if arc.is_inhibitor {
                if have >= arc.weight {
                    return false;
                }
            } else if have < arc.weight {
                return false;
            }
        }

        for arc in self.arcs.iter().filter(|a| a.from == t.as_str()) {
            if let Some(cap) = self.place(&arc.to).and_then(|p| p.capacity) {
                if marking.tokens(&arc.to) + arc.weight > cap {
                    return false;
                }
            }
        }

        true
    }

    /// All structurally enabled transitions, ordered by
    /// (descending priority, ascending id) - the deterministic tie-break
    /// shared by the validator and the simulator.
    pub fn enabled(&self, marking: &Marking) -> Vec<&Transition> {
        let mut enabled: Vec<&Transition> = self
            .transitions
            .iter()
            .filter(|t| self.is_enabled(&t.id, marking))
            .collect();
        enabled.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.id.cmp(&b.id))
        });
        enabled
    }

    /// Fire a transition, producing the successor marking
    ///
    /// Consumes `weight` tokens along every normal input arc (test and
    /// inhibitor arcs consume nothing) and produces `weight` tokens along
    /// every output arc. Fails with [`PetriflowError::NotEnabled`] when
    /// the transition is not enabled under `marking`.
    pub fn fire(&self, t: &TransitionId, marking: &Marking) -> Result<Marking> {
        if !self.is_enabled(t, marking) {
            return Err(PetriflowError::NotEnabled {
                transition: t.as_str().to_string(),
            });
        }

        let mut next = marking.clone();
        for arc in self.arcs.iter().filter(|a| a.to == t.as_str()) {
            if !arc.is_inhibitor && !arc.is_test {
                next = next.minus(&arc.from, arc.weight);
            }
        }
        for arc in self.arcs.iter().filter(|a| a.from == t.as_str()) {
            next = next.plus(&arc.to, arc.weight);
        }
        Ok(next)
    }

    /// Whether a marking is terminal: nothing is enabled and every token
    /// rests in a sink place. Nothing enabled with tokens in a *non-sink*
    /// place is a deadlock, not a terminal.
    pub fn is_terminal(&self, marking: &Marking) -> bool {
        if !self.enabled(marking).is_empty() {
            return false;
        }
        marking
            .marked_places()
            .all(|p| self.output_transitions(&PlaceId::from(p)).is_empty())
    }

    /// Check every structural invariant, returning all violations
    pub fn validate(&self) -> Vec<StructuralError> {
        let mut errors = Vec::new();

        if self.places.is_empty() {
            errors.push(StructuralError::new(
                "net must contain at least one place",
                None,
            ));
        }
        if self.transitions.is_empty() {
            errors.push(StructuralError::new(
                "net must contain at least one transition",
                None,
            ));
        }

        let mut place_ids: HashSet<&str> = HashSet::new();
        for place in &self.places {
            if place.id.as_str().is_empty() {
                errors.push(StructuralError::new("place has an empty id", None));
                continue;
            }
            if !place_ids.insert(place.id.as_str()) {
                errors.push(StructuralError::new(
                    "duplicate place id",
                    Some(place.id.as_str().to_string()),
                ));
            }
        }

        let mut transition_ids: HashSet<&str> = HashSet::new();
        for transition in &self.transitions {
            if transition.id.as_str().is_empty() {
                errors.push(StructuralError::new("transition has an empty id", None));
                continue;
            }
            if !transition_ids.insert(transition.id.as_str()) {
                errors.push(StructuralError::new(
                    "duplicate transition id",
                    Some(transition.id.as_str().to_string()),
                ));
            }
            if place_ids.contains(transition.id.as_str()) {
                errors.push(StructuralError::new(
                    "id used by both a place and a transition",
                    Some(transition.id.as_str().to_string()),
                ));
            }
        }

        for arc in &self.arcs {
            let from_is_place = place_ids.contains(arc.from.as_str());
            let from_is_transition = transition_ids.contains(arc.from.as_str());
            let to_is_place = place_ids.contains(arc.to.as_str());
            let to_is_transition = transition_ids.contains(arc.to.as_str());
            let label = format!("{} -> {}", arc.from, arc.to);

            if !from_is_place && !from_is_transition {
                errors.push(StructuralError::new(
                    "arc source references a missing element",
                    Some(label.clone()),
                ));
                continue;
            }
            if !to_is_place && !to_is_transition {
                errors.push(StructuralError::new(
                    "arc target references a missing element",
                    Some(label.clone()),
                ));
                continue;
            }
            if from_is_place == to_is_place {
                errors.push(StructuralError::new(
                    "arc must connect a place to a transition or a transition to a place",
                    Some(label.clone()),
                ));
            }
            if arc.weight == 0 {
                errors.push(StructuralError::new(
                    "arc weight must be at least 1",
                    Some(label.clone()),
                ));
            }
            if arc.is_inhibitor && !(from_is_place && to_is_transition) {
                errors.push(StructuralError::new(
                    "inhibitor arc must run from a place into a transition",
                    Some(label),
                ));
            }
        }

        for (place, count) in self.initial_marking.as_map() {
            match self.place(place) {
                None => errors.push(StructuralError::new(
                    "initial marking references a missing place",
                    Some(place.clone()),
                )),
                Some(p) => {
                    if let Some(cap) = p.capacity {
                        if *count > cap {
                            errors.push(StructuralError::new(
                                format!("initial marking exceeds capacity ({} > {})", count, cap),
                                Some(place.clone()),
                            ));
                        }
                    }
                }
            }
        }

        errors
    }

    /// The canonical JSON form used for the stable id: places and
    /// transitions sorted by id, arcs by (from, to), marking included.
    fn canonical_value(&self) -> Result<Value> {
        let mut places = self.places.clone();
        places.sort_by(|a, b| a.id.cmp(&b.id));
        let mut transitions = self.transitions.clone();
        transitions.sort_by(|a, b| a.id.cmp(&b.id));
        let mut arcs = self.arcs.clone();
        arcs.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));

        Ok(json!({
            "name": self.name,
            "description": self.description,
            "places": serde_json::to_value(&places)?,
            "transitions": serde_json::to_value(&transitions)?,
            "arcs": serde_json::to_value(&arcs)?,
            "initialMarking": serde_json::to_value(&self.initial_marking)?,
            "schemaVersion": self.schema_version,
        }))
    }

    /// Derive the content-addressed id `petri_<first-12-hex-of-SHA1>`
    pub fn derive_stable_id(&self) -> Result<String> {
        let canonical = to_canonical_json(&self.canonical_value()?);
        let digest = Sha1::digest(canonical.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Ok(format!("petri_{}", &hex[..12]))
    }
}

/// Serialize a JSON value canonically: object keys sorted, no redundant
/// whitespace. Feeds the stable-id hash.
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => serde_json::to_string(s).unwrap_or_default(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let mut tree = BTreeMap::new();
            for (k, v) in map {
                tree.insert(k, to_canonical_json(v));
            }
            let items: Vec<String> = tree
                .into_iter()
                .map(|(k, v)| {
                    format!("{}:{}", serde_json::to_string(&k).unwrap_or_default(), v)
                })
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

/// Builder for [`PetriNet`]
///
/// Mutable while assembling; `build()` validates and seals the value.
#[derive(Debug, Clone, Default)]
pub struct PetriNetBuilder {
    id: Option<String>,
    name: String,
    description: String,
    places: Vec<Place>,
    transitions: Vec<Transition>,
    arcs: Vec<Arc>,
    initial_marking: Marking,
    schema_version: Option<String>,
    metadata: HashMap<String, Value>,
    derived_from_dag_id: Option<String>,
}

impl PetriNetBuilder {
    /// Start a builder for a net with the given name
    pub fn new<N: Into<String>>(name: N) -> Self {
        PetriNetBuilder {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Supply an explicit id instead of deriving one from content
    pub fn id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the prose description
    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Add a place
    pub fn add_place(mut self, place: Place) -> Self {
        self.places.push(place);
        self
    }

    /// Add a transition
    pub fn add_transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Add an arc
    pub fn add_arc(mut self, arc: Arc) -> Self {
        self.arcs.push(arc);
        self
    }

    /// Seed the initial marking with `count` tokens at `place`
    pub fn initial_tokens<P: Into<PlaceId>>(mut self, place: P, count: u64) -> Self {
        self.initial_marking = self.initial_marking.with_tokens(place, count);
        self
    }

    /// Override the schema version (defaults to "1.0")
    pub fn schema_version<S: Into<String>>(mut self, version: S) -> Self {
        self.schema_version = Some(version.into());
        self
    }

    /// Attach a metadata entry
    pub fn metadata<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Record the DAG this net was derived from
    pub fn derived_from_dag<S: Into<String>>(mut self, dag_id: S) -> Self {
        self.derived_from_dag_id = Some(dag_id.into());
        self
    }

    /// Validate and seal the net
    ///
    /// Fails with [`PetriflowError::InvalidNet`] carrying every structural
    /// error, never just the first one.
    pub fn build(self) -> Result<PetriNet> {
        let mut net = PetriNet {
            id: self.id.unwrap_or_default(),
            name: self.name,
            description: self.description,
            places: self.places,
            transitions: self.transitions,
            arcs: self.arcs,
            initial_marking: self.initial_marking,
            schema_version: self.schema_version.unwrap_or_else(|| "1.0".to_string()),
            metadata: self.metadata,
            derived_from_dag_id: self.derived_from_dag_id,
        };

        let errors = net.validate();
        if !errors.is_empty() {
            return Err(PetriflowError::InvalidNet { errors });
        }

        if net.id.is_empty() {
            net.id = net.derive_stable_id()?;
        }
        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// p_in --(t_go)--> p_out, one token waiting in p_in
    fn linear_net() -> PetriNet {
        PetriNet::builder("linear")
            .add_place(Place::new("p_in", "In"))
            .add_place(Place::new("p_out", "Out"))
            .add_transition(Transition::new("t_go", "Go"))
            .add_arc(Arc::new("p_in", "t_go"))
            .add_arc(Arc::new("t_go", "p_out"))
            .initial_tokens("p_in", 1)
            .build()
            .expect("linear net is valid")
    }

    #[test]
    fn test_build_and_lookups() {
        let net = linear_net();
        assert!(net.place("p_in").is_some());
        assert!(net.place("p_missing").is_none());
        assert!(net.transition("t_go").is_some());
        assert_eq!(net.arc_weight("p_in", "t_go"), 1);
        assert_eq!(net.arc_weight("p_out", "t_go"), 0);
    }

    #[test]
    fn test_neighborhood_queries() {
        let net = linear_net();
        let t = TransitionId::from("t_go");

        let inputs = net.input_places(&t);
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].id.as_str(), "p_in");

        let outputs = net.output_places(&t);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].id.as_str(), "p_out");

        assert_eq!(net.input_transitions(&PlaceId::from("p_out")).len(), 1);
        assert_eq!(net.output_transitions(&PlaceId::from("p_out")).len(), 0);
    }

    #[test]
    fn test_fire_moves_tokens() {
        let net = linear_net();
        let t = TransitionId::from("t_go");

        assert!(net.is_enabled(&t, &net.initial_marking));
        let after = net.fire(&t, &net.initial_marking).unwrap();

        assert_eq!(after.tokens("p_in"), 0);
        assert_eq!(after.tokens("p_out"), 1);
        // The initial marking is untouched
        assert_eq!(net.initial_marking.tokens("p_in"), 1);
    }

    #[test]
    fn test_fire_conserves_token_arithmetic() {
        // Sum after firing = sum before - input weights + output weights
        let net = PetriNet::builder("weighted")
            .add_place(Place::new("p_a", "A"))
            .add_place(Place::new("p_b", "B"))
            .add_transition(Transition::new("t_x", "X"))
            .add_arc(Arc::with_weight("p_a", "t_x", 2))
            .add_arc(Arc::with_weight("t_x", "p_b", 3))
            .initial_tokens("p_a", 5)
            .build()
            .unwrap();

        let t = TransitionId::from("t_x");
        let before = &net.initial_marking;
        let after = net.fire(&t, before).unwrap();
        assert_eq!(after.total_tokens(), before.total_tokens() - 2 + 3);
    }

    #[test]
    fn test_fire_not_enabled() {
        let net = linear_net();
        let t = TransitionId::from("t_go");
        let empty = Marking::empty();

        assert!(!net.is_enabled(&t, &empty));
        let err = net.fire(&t, &empty).unwrap_err();
        assert!(matches!(err, PetriflowError::NotEnabled { transition } if transition == "t_go"));
    }

    #[test]
    fn test_weighted_arc_blocks_when_underfunded() {
        // Scenario: arc weight 2 but only 1 token - permanently stuck
        let net = PetriNet::builder("stuck")
            .add_place(Place::new("p1", "P1"))
            .add_place(Place::new("p2", "P2"))
            .add_transition(Transition::new("t1", "T1"))
            .add_arc(Arc::with_weight("p1", "t1", 2))
            .add_arc(Arc::new("t1", "p2"))
            .initial_tokens("p1", 1)
            .build()
            .unwrap();

        assert!(!net.is_enabled(&TransitionId::from("t1"), &net.initial_marking));
        assert!(net.enabled(&net.initial_marking).is_empty());
        // p1 has an outgoing transition, so this is a deadlock, not terminal
        assert!(!net.is_terminal(&net.initial_marking));
    }

    #[test]
    fn test_capacity_blocks_enablement() {
        let net = PetriNet::builder("capped")
            .add_place(Place::new("p_src", "Source"))
            .add_place(Place::new("p_full", "Full").with_capacity(1))
            .add_transition(Transition::new("t_fill", "Fill"))
            .add_arc(Arc::new("p_src", "t_fill"))
            .add_arc(Arc::new("t_fill", "p_full"))
            .initial_tokens("p_src", 2)
            .initial_tokens("p_full", 1)
            .build()
            .unwrap();

        let t = TransitionId::from("t_fill");
        // p_full is at capacity: firing would overflow it
        assert!(!net.is_enabled(&t, &net.initial_marking));
        assert!(matches!(
            net.fire(&t, &net.initial_marking),
            Err(PetriflowError::NotEnabled { .. })
        ));

        // With room, the same transition is enabled
        let roomy = net.initial_marking.minus("p_full", 1);
        assert!(net.is_enabled(&t, &roomy));
    }

    #[test]
    fn test_inhibitor_arc_reverses_test() {
        let net = PetriNet::builder("inhibited")
            .add_place(Place::new("p_go", "Go"))
            .add_place(Place::new("p_block", "Block"))
            .add_place(Place::new("p_done", "Done"))
            .add_transition(Transition::new("t_run", "Run"))
            .add_arc(Arc::new("p_go", "t_run"))
            .add_arc(Arc::inhibitor("p_block", "t_run", 1))
            .add_arc(Arc::new("t_run", "p_done"))
            .initial_tokens("p_go", 1)
            .build()
            .unwrap();

        let t = TransitionId::from("t_run");
        // No token in p_block: enabled
        assert!(net.is_enabled(&t, &net.initial_marking));

        // A token in p_block inhibits
        let blocked = net.initial_marking.plus("p_block", 1);
        assert!(!net.is_enabled(&t, &blocked));

        // Firing does not consume from the inhibitor place
        let after = net.fire(&t, &net.initial_marking).unwrap();
        assert_eq!(after.tokens("p_block"), 0);
        assert_eq!(after.tokens("p_done"), 1);
    }

    #[test]
    fn test_test_arc_checks_without_consuming() {
        let net = PetriNet::builder("tested")
            .add_place(Place::new("p_lock", "Lock"))
            .add_place(Place::new("p_in", "In"))
            .add_place(Place::new("p_out", "Out"))
            .add_transition(Transition::new("t_read", "Read"))
            .add_arc(Arc::test_arc("p_lock", "t_read", 1))
            .add_arc(Arc::new("p_in", "t_read"))
            .add_arc(Arc::new("t_read", "p_out"))
            .initial_tokens("p_lock", 1)
            .initial_tokens("p_in", 1)
            .build()
            .unwrap();

        let t = TransitionId::from("t_read");
        let after = net.fire(&t, &net.initial_marking).unwrap();
        // Lock token survives the firing
        assert_eq!(after.tokens("p_lock"), 1);
        assert_eq!(after.tokens("p_in"), 0);
        assert_eq!(after.tokens("p_out"), 1);

        // Without the lock token the test arc blocks
        let unlocked = net.initial_marking.minus("p_lock", 1);
        assert!(!net.is_enabled(&t, &unlocked));
    }

    #[test]
    fn test_enabled_ordering_priority_then_id() {
        let net = PetriNet::builder("ordered")
            .add_place(Place::new("p_in", "In"))
            .add_place(Place::new("p_out", "Out"))
            .add_transition(Transition::new("t_b", "B"))
            .add_transition(Transition::new("t_a", "A"))
            .add_transition(Transition::new("t_c", "C").with_priority(10))
            .add_arc(Arc::new("p_in", "t_a"))
            .add_arc(Arc::new("p_in", "t_b"))
            .add_arc(Arc::new("p_in", "t_c"))
            .add_arc(Arc::new("t_a", "p_out"))
            .add_arc(Arc::new("t_b", "p_out"))
            .add_arc(Arc::new("t_c", "p_out"))
            .initial_tokens("p_in", 1)
            .build()
            .unwrap();

        let order: Vec<&str> = net
            .enabled(&net.initial_marking)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        // Highest priority first, then ascending id
        assert_eq!(order, vec!["t_c", "t_a", "t_b"]);
    }

    #[test]
    fn test_terminal_vs_deadlock() {
        let net = linear_net();
        let t = TransitionId::from("t_go");
        let done = net.fire(&t, &net.initial_marking).unwrap();

        // All tokens in p_out, which has no outgoing transitions
        assert!(net.is_terminal(&done));

        // is_terminal <=> enabled empty AND marked places are sinks
        assert!(net.enabled(&done).is_empty());
        assert!(done
            .marked_places()
            .all(|p| net.output_transitions(&PlaceId::from(p)).is_empty()));
    }

    #[test]
    fn test_validate_missing_transition() {
        let net = PetriNet {
            id: "petri_manual".to_string(),
            name: "broken".to_string(),
            description: String::new(),
            places: vec![Place::new("p_only", "Only")],
            transitions: vec![],
            arcs: vec![],
            initial_marking: Marking::empty(),
            schema_version: "1.0".to_string(),
            metadata: HashMap::new(),
            derived_from_dag_id: None,
        };

        let errors = net.validate();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("at least one transition")));
    }

    #[test]
    fn test_validate_collects_every_error() {
        let net = PetriNet {
            id: "petri_manual".to_string(),
            name: "broken".to_string(),
            description: String::new(),
            places: vec![Place::new("p_a", "A"), Place::new("p_a", "A again")],
            transitions: vec![Transition::new("t_x", "X")],
            arcs: vec![
                Arc::new("p_a", "p_a"),        // place -> place
                Arc::new("p_ghost", "t_x"),    // missing source
                Arc::with_weight("p_a", "t_x", 0), // zero weight
            ],
            initial_marking: Marking::single("p_ghost"),
            schema_version: "1.0".to_string(),
            metadata: HashMap::new(),
            derived_from_dag_id: None,
        };

        let errors = net.validate();
        assert!(errors.len() >= 4, "expected every defect reported: {:?}", errors);
        assert!(errors.iter().any(|e| e.message.contains("duplicate place")));
        assert!(errors
            .iter()
            .any(|e| e.message.contains("place to a transition")));
        assert!(errors.iter().any(|e| e.message.contains("missing element")));
        assert!(errors.iter().any(|e| e.message.contains("weight")));
        assert!(errors
            .iter()
            .any(|e| e.message.contains("initial marking references")));
    }

    #[test]
    fn test_builder_rejects_invalid_net() {
        let result = PetriNet::builder("no transitions")
            .add_place(Place::new("p_only", "Only"))
            .build();

        match result {
            Err(PetriflowError::InvalidNet { errors }) => {
                assert!(errors
                    .iter()
                    .any(|e| e.message.contains("at least one transition")));
            }
            other => panic!("expected InvalidNet, got {:?}", other),
        }
    }

    #[test]
    fn test_stable_id_ignores_insertion_order() {
        let forward = PetriNet::builder("same")
            .add_place(Place::new("p_a", "A"))
            .add_place(Place::new("p_b", "B"))
            .add_transition(Transition::new("t_x", "X"))
            .add_arc(Arc::new("p_a", "t_x"))
            .add_arc(Arc::new("t_x", "p_b"))
            .initial_tokens("p_a", 1)
            .build()
            .unwrap();

        let reversed = PetriNet::builder("same")
            .add_place(Place::new("p_b", "B"))
            .add_place(Place::new("p_a", "A"))
            .add_transition(Transition::new("t_x", "X"))
            .add_arc(Arc::new("t_x", "p_b"))
            .add_arc(Arc::new("p_a", "t_x"))
            .initial_tokens("p_a", 1)
            .build()
            .unwrap();

        assert_eq!(forward.id, reversed.id);
        assert!(forward.id.starts_with("petri_"));
        // "petri_" plus 12 hex characters
        assert_eq!(forward.id.len(), "petri_".len() + 12);
    }

    #[test]
    fn test_stable_id_changes_with_content() {
        let base = linear_net();
        let heavier = PetriNet::builder("linear")
            .add_place(Place::new("p_in", "In"))
            .add_place(Place::new("p_out", "Out"))
            .add_transition(Transition::new("t_go", "Go"))
            .add_arc(Arc::with_weight("p_in", "t_go", 2))
            .add_arc(Arc::new("t_go", "p_out"))
            .initial_tokens("p_in", 1)
            .build()
            .unwrap();

        assert_ne!(base.id, heavier.id);
    }

    #[test]
    fn test_explicit_id_is_kept() {
        let net = PetriNet::builder("named")
            .id("petri_explicit")
            .add_place(Place::new("p_in", "In"))
            .add_transition(Transition::new("t_go", "Go"))
            .add_arc(Arc::new("p_in", "t_go"))
            .build()
            .unwrap();
        assert_eq!(net.id, "petri_explicit");
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value = json!({ "b": 2, "a": 1 });
        assert_eq!(to_canonical_json(&value), "{\"a\":1,\"b\":2}");

        let nested = json!({ "z": [ { "y": true }, null ], "a": { "x": 10 } });
        assert_eq!(
            to_canonical_json(&nested),
            "{\"a\":{\"x\":10},\"z\":[{\"y\":true},null]}"
        );
    }
}
