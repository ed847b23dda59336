// Transition model - active net nodes with guards, retries, and flags

//! # Transitions
//!
//! A `Transition` is an active node of a Petri net. When it fires it
//! atomically consumes tokens from its input places and produces tokens in
//! its output places. Transitions carry everything the engine needs to
//! decide *whether* and *when* they may fire:
//!
//! - an optional **guard** expression, evaluated against a simulation
//!   context (see `engine::guard`);
//! - **inhibitor conditions**, a map of context keys to values that block
//!   the transition when matched;
//! - a **retry policy** and timing hints, which ride along into the
//!   projected task graph;
//! - **semantic flags** stored in metadata under fixed keys, so that a
//!   transition survives serialization without losing its compiled role.
//!
//! ## Semantic flags
//!
//! The compiler marks transitions with `isChoice`, `isFork`, `isJoin`,
//! `isDependencyConnector`, `isTimed`, `isImmediate`, an integer
//! `priority` (default 0), and `choiceCondition`. The accessors on this
//! type are the only supported way to read them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::ids::TransitionId;

/// Metadata key for choice-branch transitions
pub const META_IS_CHOICE: &str = "isChoice";
/// Metadata key for parallel fork transitions
pub const META_IS_FORK: &str = "isFork";
/// Metadata key for join/synchronization transitions
pub const META_IS_JOIN: &str = "isJoin";
/// Metadata key for helper transitions introduced during compilation
pub const META_IS_DEPENDENCY_CONNECTOR: &str = "isDependencyConnector";
/// Metadata key for timed transitions
pub const META_IS_TIMED: &str = "isTimed";
/// Metadata key for immediate (zero-delay) transitions
pub const META_IS_IMMEDIATE: &str = "isImmediate";
/// Metadata key for the conflict-resolution priority
pub const META_PRIORITY: &str = "priority";
/// Metadata key for the branch condition of a choice transition
pub const META_CHOICE_CONDITION: &str = "choiceCondition";

/// Retry behaviour attached to a transition
///
/// The verification core never *executes* retries - the policy is carried
/// through compilation and projection so the surrounding execution runtime
/// can honour it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first failure
    pub max_retries: u32,

    /// Multiplier applied to the delay after each attempt
    pub backoff_multiplier: f64,

    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound on the computed delay, in milliseconds
    pub max_delay_ms: u64,

    /// Error classes that are worth retrying
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retry_on: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            backoff_multiplier: 2.0,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            retry_on: Vec::new(),
        }
    }
}

/// An active node of the net
///
/// Two transitions compare equal iff their ids match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    /// Stable identifier, non-empty and trimmed
    pub id: TransitionId,

    /// Human-readable display name
    pub name: String,

    /// What this transition does, in prose
    #[serde(default)]
    pub description: String,

    /// Action label for the projected task node ("send_email", ...)
    pub action: Option<String>,

    /// Guard expression; `None` means always allowed
    pub guard: Option<String>,

    /// Free-form metadata, including the semantic flags
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,

    /// Wall-clock budget for the projected task, in milliseconds
    pub timeout_ms: Option<u64>,

    /// Base delay before firing, in milliseconds
    pub delay_ms: Option<u64>,

    /// Retry behaviour for the projected task
    pub retry_policy: Option<RetryPolicy>,

    /// Context key -> expected value; a match inhibits the transition
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub inhibitor_conditions: HashMap<String, Value>,
}

impl Transition {
    /// Create a new transition with the given id and display name
    pub fn new<I: Into<TransitionId>, N: Into<String>>(id: I, name: N) -> Self {
        let id = id.into();
        Transition {
            id: TransitionId::new(id.as_str().trim()),
            name: name.into(),
            description: String::new(),
            action: None,
            guard: None,
            metadata: HashMap::new(),
            timeout_ms: None,
            delay_ms: None,
            retry_policy: None,
            inhibitor_conditions: HashMap::new(),
        }
    }

    /// Set the prose description
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Set the action label
    pub fn with_action<S: Into<String>>(mut self, action: S) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Attach a guard expression
    pub fn with_guard<S: Into<String>>(mut self, guard: S) -> Self {
        self.guard = Some(guard.into());
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Set the conflict-resolution priority (stored in metadata)
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.metadata
            .insert(META_PRIORITY.to_string(), Value::from(priority));
        self
    }

    /// Set the timeout budget in milliseconds
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the base delay in milliseconds
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    /// Attach a retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Add an inhibitor condition (`key` matching `expected` blocks firing)
    pub fn with_inhibitor_condition<K: Into<String>>(mut self, key: K, expected: Value) -> Self {
        self.inhibitor_conditions.insert(key.into(), expected);
        self
    }

    fn flag(&self, key: &str) -> bool {
        matches!(self.metadata.get(key), Some(Value::Bool(true)))
    }

    /// Is this a branch of an exclusive choice?
    pub fn is_choice(&self) -> bool {
        self.flag(META_IS_CHOICE)
    }

    /// Is this a parallel fork?
    pub fn is_fork(&self) -> bool {
        self.flag(META_IS_FORK)
    }

    /// Is this a join / synchronization point?
    pub fn is_join(&self) -> bool {
        self.flag(META_IS_JOIN)
    }

    /// Is this a helper introduced during compilation? The projector drops
    /// these from the task graph.
    pub fn is_dependency_connector(&self) -> bool {
        self.flag(META_IS_DEPENDENCY_CONNECTOR)
    }

    /// Does this transition carry timing semantics?
    pub fn is_timed(&self) -> bool {
        self.flag(META_IS_TIMED)
    }

    /// Should this transition fire with zero delay?
    pub fn is_immediate(&self) -> bool {
        self.flag(META_IS_IMMEDIATE)
    }

    /// Conflict-resolution priority; transitions with a higher priority
    /// are preferred when several are enabled. Defaults to 0.
    pub fn priority(&self) -> i64 {
        self.metadata
            .get(META_PRIORITY)
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    /// The branch condition of a choice transition, if any
    pub fn choice_condition(&self) -> Option<&str> {
        self.metadata.get(META_CHOICE_CONDITION).and_then(Value::as_str)
    }
}

// Identity is the id alone
impl PartialEq for Transition {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Transition {}

impl std::hash::Hash for Transition {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transition_creation() {
        let t = Transition::new("t_deploy", "Deploy")
            .with_description("Deploy the build to production")
            .with_action("deploy")
            .with_guard("approved == true")
            .with_timeout_ms(60_000)
            .with_delay_ms(500);

        assert_eq!(t.id.as_str(), "t_deploy");
        assert_eq!(t.name, "Deploy");
        assert_eq!(t.action.as_deref(), Some("deploy"));
        assert_eq!(t.guard.as_deref(), Some("approved == true"));
        assert_eq!(t.timeout_ms, Some(60_000));
        assert_eq!(t.delay_ms, Some(500));
    }

    #[test]
    fn test_semantic_flags_default_off() {
        let t = Transition::new("t_x", "X");

        assert!(!t.is_choice());
        assert!(!t.is_fork());
        assert!(!t.is_join());
        assert!(!t.is_dependency_connector());
        assert!(!t.is_timed());
        assert!(!t.is_immediate());
        assert_eq!(t.priority(), 0);
        assert_eq!(t.choice_condition(), None);
    }

    #[test]
    fn test_semantic_flags_from_metadata() {
        let t = Transition::new("t_branch_a", "Branch A")
            .with_metadata(META_IS_CHOICE, json!(true))
            .with_metadata(META_CHOICE_CONDITION, json!("a"))
            .with_priority(5);

        assert!(t.is_choice());
        assert_eq!(t.choice_condition(), Some("a"));
        assert_eq!(t.priority(), 5);

        // A non-boolean value does not count as a set flag
        let odd = Transition::new("t_odd", "Odd").with_metadata(META_IS_FORK, json!("yes"));
        assert!(!odd.is_fork());
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.backoff_multiplier, 2.0);
        assert_eq!(policy.initial_delay_ms, 1_000);
        assert_eq!(policy.max_delay_ms, 30_000);
        assert!(policy.retry_on.is_empty());
    }

    #[test]
    fn test_transition_equality_is_by_id() {
        let a = Transition::new("t_x", "One").with_priority(9);
        let b = Transition::new("t_x", "Two");
        assert_eq!(a, b);
    }

    #[test]
    fn test_inhibitor_conditions() {
        let t = Transition::new("t_x", "X")
            .with_inhibitor_condition("failures", json!(3))
            .with_inhibitor_condition("circuit_open", json!(true));

        assert_eq!(t.inhibitor_conditions.len(), 2);
        assert_eq!(t.inhibitor_conditions.get("failures"), Some(&json!(3)));
    }
}
