// Net validator - bounded state-space exploration and checks

//! # Validator
//!
//! The validator answers the static questions about a net: can it
//! deadlock, does it reach its goal, does every transition participate,
//! do token counts stay bounded, and is the workflow sound. All of them
//! reduce to properties of the **reachability graph**, which the
//! validator enumerates breadth-first from the initial marking.
//!
//! ## Over-approximation
//!
//! Exploration uses *structural* enablement only - guards and inhibitor
//! conditions are ignored. That over-approximates the reachable set,
//! which is safe for deadlock and boundedness (anything found is really
//! reachable structurally) but means guard-dependent paths are not
//! distinguished; the simulator is the tool for those.
//!
//! ## Bounded exploration
//!
//! The state space of a net with weighted arcs need not be finite.
//! Exploration therefore halts at `k_bound` distinct markings or
//! `max_time_ms` of wall-clock, whichever comes first. Checks that could
//! not conclude under a hit limit report UNKNOWN, never a false PASS, and
//! the result carries a hint telling the caller which knob to raise.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;
use tracing::{debug, warn};

use crate::models::{Marking, PetriNet};

/// Default bound on distinct explored markings
pub const DEFAULT_K_BOUND: usize = 200;

/// Default wall-clock budget for exploration, in milliseconds
pub const DEFAULT_MAX_TIME_MS: u64 = 30_000;

/// The individual checks; each can be toggled via the config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckType {
    Deadlock,
    Reachability,
    Liveness,
    Boundedness,
    Soundness,
}

/// Outcome of one check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Pass,
    Fail,
    Unknown,
    Skipped,
}

/// Overall verification outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pass,
    Fail,
    Unknown,
}

/// Which exploration limit was hit, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExplorationLimit {
    KBound,
    Timeout,
}

/// Validator configuration
///
/// Zero values for the numeric knobs mean "use the default", matching
/// the configuration surface of the surrounding service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    /// Bound on distinct explored markings; 0 selects the default
    pub k_bound: usize,

    /// Wall-clock budget in milliseconds; 0 selects the default
    pub max_time_ms: u64,

    /// Checks to run; `None` runs all of them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_checks: Option<HashSet<CheckType>>,

    /// Marking the reachability check looks for; `None` means any
    /// terminal marking counts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_marking: Option<Marking>,

    /// Boundedness bound for places without a declared capacity;
    /// `None` leaves them unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_bound: Option<u64>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            k_bound: DEFAULT_K_BOUND,
            max_time_ms: DEFAULT_MAX_TIME_MS,
            enabled_checks: None,
            goal_marking: None,
            token_bound: None,
        }
    }
}

impl ValidationConfig {
    /// Resolve zero values to their defaults
    pub fn normalized(mut self) -> Self {
        if self.k_bound == 0 {
            self.k_bound = DEFAULT_K_BOUND;
        }
        if self.max_time_ms == 0 {
            self.max_time_ms = DEFAULT_MAX_TIME_MS;
        }
        self
    }

    fn runs(&self, check: CheckType) -> bool {
        self.enabled_checks
            .as_ref()
            .map(|set| set.contains(&check))
            .unwrap_or(true)
    }
}

/// Outcome of one check, with free-form details
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    #[serde(rename = "type")]
    pub check_type: CheckType,
    pub status: CheckStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, Value>,
    pub execution_time_ms: u64,
}

/// A concrete witness of a failed check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterExample {
    /// What this marking witnesses
    pub description: String,

    /// The failing marking, as place -> count
    pub marking: Marking,

    /// Transitions enabled at the failing marking (empty for deadlocks)
    pub enabled_transitions: Vec<String>,

    /// Transition ids fired from the initial marking to get here
    pub path: Vec<String>,
}

/// The full verification result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Net that was verified
    pub petri_net_id: String,

    /// Overall status
    pub petri_status: VerificationStatus,

    /// True iff the overall status is PASS
    pub is_valid: bool,

    /// Distinct markings discovered
    pub states_explored: usize,

    /// Per-check outcomes, in check order
    pub checks: Vec<CheckResult>,

    /// Witness of the first failing check, when one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter_example: Option<CounterExample>,

    /// Human-readable context, always present when a limit was hit
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,

    /// Actionable follow-ups for failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,

    /// Which exploration limit was hit, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<ExplorationLimit>,

    /// Wall-clock time spent exploring, in milliseconds
    pub exploration_time_ms: u64,
}

impl VerificationResult {
    /// Outcome of a specific check, when it ran
    pub fn check(&self, check_type: CheckType) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.check_type == check_type)
    }
}

/// The explored prefix of the reachability graph
struct Exploration {
    /// Arena of discovered markings; index 0 is the initial marking
    states: Vec<Marking>,

    /// Marking -> arena index, for deduplication
    index: HashMap<Marking, usize>,

    /// How each state was first reached: (predecessor index, transition)
    parents: Vec<Option<(usize, String)>>,

    /// Indices of deadlocked states, in discovery order
    deadlocks: Vec<usize>,

    /// Indices of terminal states, in discovery order
    terminals: Vec<usize>,

    /// Transition ids observed firing at least once
    fired: HashSet<String>,

    /// Per-place maximum observed token count and the state showing it
    max_tokens: HashMap<String, (u64, usize)>,

    /// Set when exploration was cut short
    limit: Option<ExplorationLimit>,

    /// Wall-clock exploration time
    elapsed_ms: u64,
}

impl Exploration {
    /// Breadth-first enumeration from the initial marking
    fn run(net: &PetriNet, k_bound: usize, max_time_ms: u64) -> Self {
        let started = Instant::now();
        let mut exploration = Exploration {
            states: Vec::new(),
            index: HashMap::new(),
            parents: Vec::new(),
            deadlocks: Vec::new(),
            terminals: Vec::new(),
            fired: HashSet::new(),
            max_tokens: HashMap::new(),
            limit: None,
            elapsed_ms: 0,
        };

        exploration.insert(net.initial_marking.clone(), None);
        let mut frontier: VecDeque<usize> = VecDeque::new();
        frontier.push_back(0);

        'explore: while let Some(state_idx) = frontier.pop_front() {
            if started.elapsed().as_millis() as u64 >= max_time_ms {
                exploration.limit = Some(ExplorationLimit::Timeout);
                warn!(
                    states = exploration.states.len(),
                    "exploration timed out before draining the frontier"
                );
                break;
            }

            let marking = exploration.states[state_idx].clone();
            let enabled = net.enabled(&marking);

            if enabled.is_empty() {
                if net.is_terminal(&marking) {
                    exploration.terminals.push(state_idx);
                } else {
                    exploration.deadlocks.push(state_idx);
                }
                continue;
            }

            for transition in enabled {
                let successor = net
                    .fire(&transition.id, &marking)
                    .expect("enabled transition fires");
                exploration.fired.insert(transition.id.as_str().to_string());

                if exploration.index.contains_key(&successor) {
                    continue;
                }
                if exploration.states.len() >= k_bound {
                    exploration.limit = Some(ExplorationLimit::KBound);
                    break 'explore;
                }
                let successor_idx = exploration
                    .insert(successor, Some((state_idx, transition.id.as_str().to_string())));
                frontier.push_back(successor_idx);
            }
        }

        exploration.elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(
            states = exploration.states.len(),
            deadlocks = exploration.deadlocks.len(),
            limit = ?exploration.limit,
            "exploration finished"
        );
        exploration
    }

    fn insert(&mut self, marking: Marking, parent: Option<(usize, String)>) -> usize {
        let idx = self.states.len();
        for (place, count) in marking.as_map() {
            let entry = self.max_tokens.entry(place.clone()).or_insert((0, idx));
            if *count > entry.0 {
                *entry = (*count, idx);
            }
        }
        self.index.insert(marking.clone(), idx);
        self.states.push(marking);
        self.parents.push(parent);
        idx
    }

    /// Transition path from the initial marking to a state
    fn path_to(&self, mut idx: usize) -> Vec<String> {
        let mut path = Vec::new();
        while let Some((parent, transition)) = &self.parents[idx] {
            path.push(transition.clone());
            idx = *parent;
        }
        path.reverse();
        path
    }

    fn truncated(&self) -> bool {
        self.limit.is_some()
    }
}

/// Runs the configured checks over a net
#[derive(Debug, Clone, Default)]
pub struct NetValidator {
    config: ValidationConfig,
}

impl NetValidator {
    /// A validator with explicit configuration
    pub fn new(config: ValidationConfig) -> Self {
        NetValidator {
            config: config.normalized(),
        }
    }

    /// A validator with the default configuration
    pub fn with_defaults() -> Self {
        NetValidator::new(ValidationConfig::default())
    }

    /// Explore the net and run every enabled check
    pub fn verify(&self, net: &PetriNet) -> VerificationResult {
        let exploration = Exploration::run(net, self.config.k_bound, self.config.max_time_ms);

        let mut checks = Vec::new();
        let mut counter_example = None;
        let mut suggestions = Vec::new();

        if self.config.runs(CheckType::Deadlock) {
            let (result, witness) = self.check_deadlock(net, &exploration);
            if counter_example.is_none() {
                counter_example = witness;
            }
            if result.status == CheckStatus::Fail {
                suggestions.push(
                    "inspect arc weights and input places along the counter-example path"
                        .to_string(),
                );
            }
            checks.push(result);
        }
        if self.config.runs(CheckType::Reachability) {
            checks.push(self.check_reachability(&exploration));
        }
        if self.config.runs(CheckType::Liveness) {
            let result = self.check_liveness(net, &exploration);
            if result.status == CheckStatus::Fail {
                suggestions
                    .push("connect or remove the transitions that never fire".to_string());
            }
            checks.push(result);
        }
        if self.config.runs(CheckType::Boundedness) {
            let (result, witness) = self.check_boundedness(net, &exploration);
            if counter_example.is_none() {
                counter_example = witness;
            }
            checks.push(result);
        }
        if self.config.runs(CheckType::Soundness) {
            checks.push(self.check_soundness(net, &exploration));
        }

        let any_fail = checks.iter().any(|c| c.status == CheckStatus::Fail);
        let any_unknown = checks.iter().any(|c| c.status == CheckStatus::Unknown);
        let petri_status = if any_fail {
            VerificationStatus::Fail
        } else if any_unknown {
            VerificationStatus::Unknown
        } else {
            VerificationStatus::Pass
        };

        let mut hints = Vec::new();
        if exploration.truncated() {
            hints.push(format!(
                "explored {} states in {} ms; increase kBound or maxTimeMs to proceed",
                exploration.states.len(),
                exploration.elapsed_ms
            ));
        }

        VerificationResult {
            petri_net_id: net.id.clone(),
            petri_status,
            is_valid: petri_status == VerificationStatus::Pass,
            states_explored: exploration.states.len(),
            checks,
            counter_example,
            hints,
            suggestions,
            limit: exploration.limit,
            exploration_time_ms: exploration.elapsed_ms,
        }
    }

    fn check_deadlock(
        &self,
        net: &PetriNet,
        exploration: &Exploration,
    ) -> (CheckResult, Option<CounterExample>) {
        let started = Instant::now();

        if let Some(&idx) = exploration.deadlocks.first() {
            let marking = exploration.states[idx].clone();
            let path = exploration.path_to(idx);
            let witness = CounterExample {
                description: format!("deadlock: no transition enabled at {}", marking),
                marking: marking.clone(),
                enabled_transitions: Vec::new(),
                path: path.clone(),
            };
            let result = CheckResult {
                check_type: CheckType::Deadlock,
                status: CheckStatus::Fail,
                message: format!(
                    "reachable deadlock at {} after firing [{}]",
                    marking,
                    path.join(", ")
                ),
                details: HashMap::from([
                    ("marking".to_string(), json!(marking.as_map())),
                    ("path".to_string(), json!(path)),
                ]),
                execution_time_ms: started.elapsed().as_millis() as u64,
            };
            return (result, Some(witness));
        }

        let (status, message) = if exploration.truncated() {
            (
                CheckStatus::Unknown,
                format!(
                    "no deadlock within the explored prefix of {} states",
                    exploration.states.len()
                ),
            )
        } else {
            (
                CheckStatus::Pass,
                format!(
                    "no deadlock in any of the {} reachable states",
                    exploration.states.len()
                ),
            )
        };
        (
            CheckResult {
                check_type: CheckType::Deadlock,
                status,
                message,
                details: HashMap::new(),
                execution_time_ms: started.elapsed().as_millis() as u64,
            },
            None,
        )
    }

    fn check_reachability(&self, exploration: &Exploration) -> CheckResult {
        let started = Instant::now();

        let (found, target) = match &self.config.goal_marking {
            Some(goal) => (
                exploration.index.contains_key(goal),
                format!("goal marking {}", goal),
            ),
            None => (
                !exploration.terminals.is_empty(),
                "a terminal marking".to_string(),
            ),
        };

        let (status, message) = if found {
            // A positive witness stays valid under truncation
            (CheckStatus::Pass, format!("{} is reachable", target))
        } else if exploration.truncated() {
            (
                CheckStatus::Unknown,
                format!("{} not found within the explored prefix", target),
            )
        } else {
            (CheckStatus::Fail, format!("{} is not reachable", target))
        };

        CheckResult {
            check_type: CheckType::Reachability,
            status,
            message,
            details: HashMap::new(),
            execution_time_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn check_liveness(&self, net: &PetriNet, exploration: &Exploration) -> CheckResult {
        let started = Instant::now();

        let unfired: Vec<String> = net
            .transitions
            .iter()
            .map(|t| t.id.as_str().to_string())
            .filter(|id| !exploration.fired.contains(id))
            .collect();

        let (status, message, details) = if unfired.is_empty() {
            (
                CheckStatus::Pass,
                "every transition fires in at least one explored trace".to_string(),
                HashMap::new(),
            )
        } else if exploration.truncated() {
            (
                CheckStatus::Unknown,
                format!(
                    "{} transition(s) not yet observed firing within the explored prefix",
                    unfired.len()
                ),
                HashMap::from([("unfired".to_string(), json!(unfired))]),
            )
        } else {
            (
                CheckStatus::Fail,
                format!("transitions never fire: [{}]", unfired.join(", ")),
                HashMap::from([("unfired".to_string(), json!(unfired))]),
            )
        };

        CheckResult {
            check_type: CheckType::Liveness,
            status,
            message,
            details,
            execution_time_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn check_boundedness(
        &self,
        net: &PetriNet,
        exploration: &Exploration,
    ) -> (CheckResult, Option<CounterExample>) {
        let started = Instant::now();

        let mut violation: Option<(&str, u64, u64, usize)> = None;
        for place in &net.places {
            let bound = place.capacity.or(self.config.token_bound);
            let Some(bound) = bound else { continue };
            if let Some((max, state_idx)) = exploration.max_tokens.get(place.id.as_str()) {
                if *max > bound {
                    violation = Some((place.id.as_str(), *max, bound, *state_idx));
                    break;
                }
            }
        }

        if let Some((place, count, bound, state_idx)) = violation {
            let marking = exploration.states[state_idx].clone();
            let path = exploration.path_to(state_idx);
            let witness = CounterExample {
                description: format!(
                    "place '{}' holds {} tokens, exceeding its bound of {}",
                    place, count, bound
                ),
                marking: marking.clone(),
                enabled_transitions: net
                    .enabled(&marking)
                    .iter()
                    .map(|t| t.id.as_str().to_string())
                    .collect(),
                path,
            };
            let result = CheckResult {
                check_type: CheckType::Boundedness,
                status: CheckStatus::Fail,
                message: format!(
                    "place '{}' reaches {} tokens (bound {})",
                    place, count, bound
                ),
                details: HashMap::from([
                    ("place".to_string(), json!(place)),
                    ("count".to_string(), json!(count)),
                    ("bound".to_string(), json!(bound)),
                ]),
                execution_time_ms: started.elapsed().as_millis() as u64,
            };
            return (result, Some(witness));
        }

        let (status, message) = if exploration.truncated() {
            (
                CheckStatus::Unknown,
                "no bound exceeded within the explored prefix".to_string(),
            )
        } else {
            (
                CheckStatus::Pass,
                "no place exceeds its bound in any reachable state".to_string(),
            )
        };
        (
            CheckResult {
                check_type: CheckType::Boundedness,
                status,
                message,
                details: HashMap::new(),
                execution_time_ms: started.elapsed().as_millis() as u64,
            },
            None,
        )
    }

    fn check_soundness(&self, net: &PetriNet, exploration: &Exploration) -> CheckResult {
        let started = Instant::now();
        let finish = |status, message: String, details| CheckResult {
            check_type: CheckType::Soundness,
            status,
            message,
            details,
            execution_time_ms: started.elapsed().as_millis() as u64,
        };

        let sinks: HashSet<&str> = net
            .sink_places()
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        if sinks.is_empty() {
            return finish(
                CheckStatus::Skipped,
                "net declares no sink place; workflow soundness not applicable".to_string(),
                HashMap::new(),
            );
        }

        if net.initial_marking.total_tokens() != 1 {
            return finish(
                CheckStatus::Fail,
                format!(
                    "workflow soundness requires a single-token initial marking, found {}",
                    net.initial_marking.total_tokens()
                ),
                HashMap::new(),
            );
        }

        let proper_completion = exploration.terminals.iter().any(|&idx| {
            let marking = &exploration.states[idx];
            marking.total_tokens() == 1
                && marking.marked_places().all(|p| sinks.contains(p))
        });
        let all_fired = net
            .transitions
            .iter()
            .all(|t| exploration.fired.contains(t.id.as_str()));

        if proper_completion && all_fired {
            return finish(
                CheckStatus::Pass,
                "a single-token final marking is reachable and every transition is live"
                    .to_string(),
                HashMap::new(),
            );
        }
        if exploration.truncated() {
            return finish(
                CheckStatus::Unknown,
                "soundness not established within the explored prefix".to_string(),
                HashMap::new(),
            );
        }

        let mut problems = Vec::new();
        if !proper_completion {
            problems.push("no reachable marking places exactly one token in a sink".to_string());
        }
        if !all_fired {
            problems.push("some transitions never fire".to_string());
        }
        finish(
            CheckStatus::Fail,
            problems.join("; "),
            HashMap::new(),
        )
    }
}
