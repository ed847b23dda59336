// Intent model - the workflow description the compiler consumes

//! # Intent Specs
//!
//! An `IntentSpec` is the structured form of a workflow description - the
//! output of YAML parsing or of a higher-level intent tree, normalized to
//! one shape. It is the compiler's only input: an ordered list of steps,
//! each with a type, dependencies, and optional guard/retry/timeout
//! decoration.
//!
//! ## Step types
//!
//! The core patterns are ACTION, SEQUENCE, CHOICE, PARALLEL, and SYNC.
//! The remaining types (LOOP, CIRCUIT_BREAKER, ...) are advanced patterns:
//! the compiler emits a recognisable fragment for them but their full
//! semantics are deliberately left open.
//!
//! ## Validation
//!
//! `validate` reports **every** problem it finds - an author fixing a
//! workflow wants the whole list, not a ping-pong of single errors.
//! Dependency cycles are found with a depth-first search carrying the
//! recursion path, so the error can name a step on the cycle.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// What kind of net fragment a step compiles to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    Action,
    Sequence,
    Choice,
    Parallel,
    Sync,
    NestedConditional,
    Loop,
    EventTrigger,
    ErrorHandler,
    Compensation,
    CircuitBreaker,
    FanOutFanIn,
    PipelineStage,
    ResourceConstrained,
}

impl StepType {
    /// Advanced patterns compile to an ACTION-shaped fragment plus a
    /// recognisable metadata flag; see the compiler.
    pub fn is_advanced(&self) -> bool {
        !matches!(
            self,
            StepType::Action
                | StepType::Sequence
                | StepType::Choice
                | StepType::Parallel
                | StepType::Sync
        )
    }
}

/// One step of an intent spec
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentStep {
    /// Unique step id within the spec
    pub id: String,

    /// What fragment this step compiles to
    pub step_type: StepType,

    /// What the step does, in prose; also drives action-label inference
    #[serde(default)]
    pub description: String,

    /// Ids of steps that must complete before this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Free-form condition map
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub conditions: HashMap<String, Value>,

    /// Guard expression; compiled onto the step's transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,

    /// Free-form step metadata (choice `paths` live here)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,

    /// Loop continuation condition, for LOOP steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_condition: Option<String>,

    /// Error-handling configuration
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub error_handling: HashMap<String, Value>,

    /// Compensation step ids
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compensation: Vec<String>,

    /// Wall-clock budget in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Retry configuration (maxRetries, backoffMultiplier, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub retry_policy: HashMap<String, Value>,

    /// Resource constraints for RESOURCE_CONSTRAINED steps
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub resource_constraints: HashMap<String, Value>,
}

impl IntentStep {
    /// Create a step of the given type
    pub fn new<I: Into<String>, D: Into<String>>(
        id: I,
        step_type: StepType,
        description: D,
    ) -> Self {
        IntentStep {
            id: id.into(),
            step_type,
            description: description.into(),
            depends_on: Vec::new(),
            conditions: HashMap::new(),
            when: None,
            metadata: HashMap::new(),
            loop_condition: None,
            error_handling: HashMap::new(),
            compensation: Vec::new(),
            timeout_ms: None,
            retry_policy: HashMap::new(),
            resource_constraints: HashMap::new(),
        }
    }

    /// Shorthand for an ACTION step
    pub fn action<I: Into<String>, D: Into<String>>(id: I, description: D) -> Self {
        IntentStep::new(id, StepType::Action, description)
    }

    /// Shorthand for a CHOICE step
    pub fn choice<I: Into<String>, D: Into<String>>(id: I, description: D) -> Self {
        IntentStep::new(id, StepType::Choice, description)
    }

    /// Shorthand for a PARALLEL step
    pub fn parallel<I: Into<String>, D: Into<String>>(id: I, description: D) -> Self {
        IntentStep::new(id, StepType::Parallel, description)
    }

    /// Shorthand for a SYNC step
    pub fn sync<I: Into<String>, D: Into<String>>(id: I, description: D) -> Self {
        IntentStep::new(id, StepType::Sync, description)
    }

    /// Add a dependency on another step
    pub fn depends_on<S: Into<String>>(mut self, step_id: S) -> Self {
        self.depends_on.push(step_id.into());
        self
    }

    /// Attach a guard expression
    pub fn when<S: Into<String>>(mut self, guard: S) -> Self {
        self.when = Some(guard.into());
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Set the timeout budget
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Whether this step has no dependencies
    pub fn is_root(&self) -> bool {
        self.depends_on.is_empty()
    }
}

/// A complete workflow description
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentSpec {
    /// Workflow name, non-empty
    pub name: String,

    /// What the workflow does, in prose
    #[serde(default)]
    pub description: String,

    /// The natural-language prompt this spec was derived from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_prompt: Option<String>,

    /// Template the spec was instantiated from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,

    /// Free-form metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,

    /// Schema version, defaults to "1.0"
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// The ordered steps
    pub steps: Vec<IntentStep>,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

impl IntentSpec {
    /// Create an empty spec with the given name
    pub fn new<N: Into<String>>(name: N) -> Self {
        IntentSpec {
            name: name.into(),
            description: String::new(),
            original_prompt: None,
            template_id: None,
            metadata: HashMap::new(),
            schema_version: default_schema_version(),
            steps: Vec::new(),
        }
    }

    /// Set the prose description
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Append a step
    pub fn with_step(mut self, step: IntentStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Look up a step by id
    pub fn step(&self, id: &str) -> Option<&IntentStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// All steps of the given type
    pub fn steps_by_type(&self, step_type: StepType) -> Vec<&IntentStep> {
        self.steps
            .iter()
            .filter(|s| s.step_type == step_type)
            .collect()
    }

    /// Steps that depend on the given step
    pub fn dependents_of(&self, id: &str) -> Vec<&IntentStep> {
        self.steps
            .iter()
            .filter(|s| s.depends_on.iter().any(|d| d == id))
            .collect()
    }

    /// Steps with no dependencies; these receive the initial tokens
    pub fn root_steps(&self) -> Vec<&IntentStep> {
        self.steps.iter().filter(|s| s.is_root()).collect()
    }

    /// Steps using an advanced pattern type
    pub fn advanced_steps(&self) -> Vec<&IntentStep> {
        self.steps
            .iter()
            .filter(|s| s.step_type.is_advanced())
            .collect()
    }

    /// Check the spec, returning **every** problem found
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("intent name must not be empty".to_string());
        }
        if self.steps.is_empty() {
            errors.push("intent must contain at least one step".to_string());
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                errors.push("step has an empty id".to_string());
            } else if !seen.insert(step.id.as_str()) {
                errors.push(format!("duplicate step id '{}'", step.id));
            }
        }

        for step in &self.steps {
            for dep in &step.depends_on {
                if self.step(dep).is_none() {
                    errors.push(format!(
                        "step '{}' depends on unknown step '{}'",
                        step.id, dep
                    ));
                }
            }
        }

        // Cycle detection: DFS with the recursion path, so the report can
        // name a step that actually sits on a cycle
        let mut visited: HashSet<&str> = HashSet::new();
        let mut on_path: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            if !visited.contains(step.id.as_str()) {
                if let Some(cyclic) = self.find_cycle(step.id.as_str(), &mut visited, &mut on_path)
                {
                    errors.push(format!("dependency cycle involving step '{}'", cyclic));
                }
            }
        }

        errors
    }

    fn find_cycle<'a>(
        &'a self,
        id: &'a str,
        visited: &mut HashSet<&'a str>,
        on_path: &mut HashSet<&'a str>,
    ) -> Option<&'a str> {
        visited.insert(id);
        on_path.insert(id);

        if let Some(step) = self.step(id) {
            for dep in &step.depends_on {
                if on_path.contains(dep.as_str()) {
                    return Some(dep.as_str());
                }
                if !visited.contains(dep.as_str()) {
                    if let Some(cyclic) = self.find_cycle(dep.as_str(), visited, on_path) {
                        return Some(cyclic);
                    }
                }
            }
        }

        on_path.remove(id);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_step_spec() -> IntentSpec {
        IntentSpec::new("notify pipeline")
            .with_step(IntentStep::action("fetch", "Fetch the report file"))
            .with_step(IntentStep::action("notify", "Send email to the team").depends_on("fetch"))
    }

    #[test]
    fn test_valid_spec_has_no_errors() {
        assert!(two_step_spec().validate().is_empty());
    }

    #[test]
    fn test_empty_spec_reports_name_and_steps() {
        let spec = IntentSpec::new("");
        let errors = spec.validate();
        assert!(errors.iter().any(|e| e.contains("name must not be empty")));
        assert!(errors.iter().any(|e| e.contains("at least one step")));
    }

    #[test]
    fn test_duplicate_step_ids() {
        let spec = IntentSpec::new("dup")
            .with_step(IntentStep::action("s1", "First"))
            .with_step(IntentStep::action("s1", "Second"));
        let errors = spec.validate();
        assert!(errors.iter().any(|e| e.contains("duplicate step id 's1'")));
    }

    #[test]
    fn test_dangling_dependency() {
        let spec = IntentSpec::new("dangling")
            .with_step(IntentStep::action("s1", "Only step").depends_on("ghost"));
        let errors = spec.validate();
        assert!(errors
            .iter()
            .any(|e| e.contains("depends on unknown step 'ghost'")));
    }

    #[test]
    fn test_dependency_cycle_names_a_step() {
        let spec = IntentSpec::new("cyclic")
            .with_step(IntentStep::action("a", "A").depends_on("c"))
            .with_step(IntentStep::action("b", "B").depends_on("a"))
            .with_step(IntentStep::action("c", "C").depends_on("b"));

        let errors = spec.validate();
        let cycle_error = errors
            .iter()
            .find(|e| e.contains("dependency cycle"))
            .expect("cycle must be reported");
        // The named step is actually on the cycle
        assert!(
            cycle_error.contains("'a'") || cycle_error.contains("'b'") || cycle_error.contains("'c'")
        );
    }

    #[test]
    fn test_validation_collects_all_problems() {
        let spec = IntentSpec::new("")
            .with_step(IntentStep::action("s1", "First").depends_on("ghost"))
            .with_step(IntentStep::action("s1", "Dup"));

        let errors = spec.validate();
        // Name, duplicate, and dangling dep reported together
        assert!(errors.len() >= 3, "got {:?}", errors);
    }

    #[test]
    fn test_queries() {
        let spec = IntentSpec::new("mixed")
            .with_step(IntentStep::action("fetch", "Fetch data"))
            .with_step(
                IntentStep::choice("route", "Route by size")
                    .with_metadata("paths", json!(["small", "large"]))
                    .depends_on("fetch"),
            )
            .with_step(IntentStep::new("retry_loop", StepType::Loop, "Retry").depends_on("route"));

        assert_eq!(spec.steps_by_type(StepType::Action).len(), 1);
        assert_eq!(spec.steps_by_type(StepType::Choice).len(), 1);
        assert_eq!(spec.dependents_of("fetch").len(), 1);
        assert_eq!(spec.dependents_of("retry_loop").len(), 0);
        assert_eq!(spec.root_steps().len(), 1);
        assert_eq!(spec.advanced_steps().len(), 1);
        assert!(spec.step("route").is_some());
        assert!(spec.step("missing").is_none());
    }

    #[test]
    fn test_step_type_wire_names() {
        // The wire format uses SCREAMING_SNAKE_CASE discriminators
        assert_eq!(
            serde_json::to_string(&StepType::FanOutFanIn).unwrap(),
            "\"FAN_OUT_FAN_IN\""
        );
        let parsed: StepType = serde_json::from_str("\"CIRCUIT_BREAKER\"").unwrap();
        assert_eq!(parsed, StepType::CircuitBreaker);
    }

    #[test]
    fn test_schema_version_defaults() {
        let spec: IntentSpec =
            serde_json::from_value(json!({ "name": "n", "steps": [] })).unwrap();
        assert_eq!(spec.schema_version, "1.0");
    }
}
