// Simulator - seeded, reproducible token firing with a full trace

//! # Simulator
//!
//! The simulator drives a net from its initial marking and records an
//! observable, reproducible **trace**. It is logically sequential: at
//! most one transition fires at a time.
//!
//! ## Determinism contract
//!
//! When several transitions are enabled, the simulator orders them by
//! (descending priority, ascending id) and picks one with a seeded PRNG.
//! The generator is SplitMix64 with its published constants, embedded
//! here rather than taken from a library so the stream is fixed by this
//! file alone: the same (net, seed) produces the same firing sequence on
//! every run and on any conforming implementation.
//!
//! ## Guards and choices
//!
//! Unlike the validator, the simulator evaluates guards and inhibitor
//! conditions against its context before firing, failing closed on
//! evaluation errors. One carve-out keeps exclusive choices runnable: a
//! transition flagged `isChoice` whose `choice` context key is absent
//! stays a candidate, and the seeded PRNG resolves the branch. With the
//! key present the guard decides, as usual.
//!
//! ## Controls
//!
//! `pause` makes `step` a no-op until `resume`; `stop` is terminal and
//! makes the next step emit a single CANCELLED event; `reset` rewinds to
//! the initial marking with a fresh PRNG from the same seed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::guard::{evaluate_guard, is_inhibited, GuardContext};
use crate::models::{Marking, PetriNet, Transition, TransitionId};
use crate::{PetriflowError, Result};

/// Default step budget
pub const DEFAULT_MAX_STEPS: usize = 1_000;

/// Default conflict-resolution seed
pub const DEFAULT_SEED: u64 = 42;

/// SplitMix64, the fixed conflict-resolution generator
///
/// The constants are the published ones; the stream for a given seed is
/// part of the simulator's public contract.
#[derive(Debug, Clone)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        SplitMix64 { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Pick an index below `len`
    pub fn choose(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        (self.next_u64() % len as u64) as usize
    }
}

/// How the simulation is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationMode {
    /// Runs without human input; never blocks
    Deterministic,

    /// Pauses between steps for an external decision point; may animate
    Interactive,
}

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Seed for conflict resolution
    pub seed: u64,

    /// Driving mode
    pub mode: SimulationMode,

    /// Step budget; 0 selects the default of 1000
    pub max_steps: usize,

    /// Sleep between animated interactive steps, in milliseconds
    pub step_delay_ms: u64,

    /// Record events into the result trace
    pub enable_tracing: bool,

    /// Sleep `step_delay_ms` between interactive steps
    pub enable_animation: bool,

    /// In interactive mode, pause instead of finishing on a deadlock so
    /// the caller can amend the context and resume
    pub pause_on_deadlock: bool,

    /// Log every fired transition at info level
    pub verbose: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            seed: DEFAULT_SEED,
            mode: SimulationMode::Deterministic,
            max_steps: DEFAULT_MAX_STEPS,
            step_delay_ms: 0,
            enable_tracing: true,
            enable_animation: false,
            pause_on_deadlock: false,
            verbose: false,
        }
    }
}

impl SimulationConfig {
    /// Resolve zero values to their defaults
    pub fn normalized(mut self) -> Self {
        if self.max_steps == 0 {
            self.max_steps = DEFAULT_MAX_STEPS;
        }
        self
    }
}

/// Kinds of trace events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceEventType {
    TransitionFired,
    Deadlock,
    Terminated,
    MaxStepsReached,
    Cancelled,
}

/// One entry of the simulation trace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    /// Strictly increasing, starting at 1
    pub sequence: u64,

    /// When the event was recorded
    pub timestamp: DateTime<Utc>,

    /// What happened
    #[serde(rename = "type")]
    pub event_type: TraceEventType,

    /// Fired transition, for TRANSITION_FIRED events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_id: Option<String>,

    /// Display name of the fired transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_name: Option<String>,

    /// Marking before the event
    pub marking_before: Marking,

    /// Marking after the event
    pub marking_after: Marking,

    /// Input places tokens were consumed from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumed_from: Vec<String>,

    /// Output places tokens were produced into
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub produced_to: Vec<String>,

    /// Human-readable summary
    pub description: String,

    /// The seed driving this simulation
    pub seed: u64,
}

/// Final status of a simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationStatus {
    Completed,
    Deadlocked,
    MaxStepsReached,
    Cancelled,
    Error,
}

/// The observable outcome of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// Simulation instance id
    pub simulation_id: String,

    /// Net that was simulated
    pub petri_net_id: String,

    /// How the run ended
    pub status: SimulationStatus,

    /// True iff the run completed normally
    pub success: bool,

    /// Human-readable summary
    pub message: String,

    /// Transitions fired
    pub steps_executed: usize,

    /// Marking the run started from
    pub initial_marking: Marking,

    /// Marking the run ended on
    pub final_marking: Marking,

    /// Start of the run, ISO-8601 UTC
    pub started_at: DateTime<Utc>,

    /// End of the run, ISO-8601 UTC
    pub ended_at: DateTime<Utc>,

    /// Seed the run was driven by
    pub seed: u64,

    /// The ordered trace (empty when tracing is disabled)
    pub trace: Vec<TraceEvent>,
}

impl SimulationResult {
    /// Ids of fired transitions, in firing order
    pub fn fired_transitions(&self) -> Vec<&str> {
        self.trace
            .iter()
            .filter(|e| e.event_type == TraceEventType::TransitionFired)
            .filter_map(|e| e.transition_id.as_deref())
            .collect()
    }
}

/// What one call to `step` did
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// A transition fired
    Fired(TraceEvent),

    /// The run ended with the given status
    Finished(SimulationStatus, TraceEvent),

    /// The simulation is paused; nothing happened
    Paused,

    /// The run already ended; nothing happened
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlState {
    Running,
    Paused,
    Stopped,
}

/// A stepping simulation over one net
#[derive(Debug, Clone)]
pub struct Simulation {
    id: String,
    net: PetriNet,
    config: SimulationConfig,
    context: GuardContext,
    initial_marking: Marking,
    current_marking: Marking,
    steps_executed: usize,
    started_at: DateTime<Utc>,
    rng: SplitMix64,
    control: ControlState,
    outcome: Option<SimulationStatus>,
    trace: Vec<TraceEvent>,
    next_sequence: u64,
}

impl Simulation {
    /// Start a simulation of `net` under `config`
    pub fn new(net: &PetriNet, config: SimulationConfig) -> Self {
        let config = config.normalized();
        Simulation {
            id: format!("sim_{}", Uuid::new_v4()),
            initial_marking: net.initial_marking.clone(),
            current_marking: net.initial_marking.clone(),
            net: net.clone(),
            rng: SplitMix64::new(config.seed),
            config,
            context: GuardContext::new(),
            steps_executed: 0,
            started_at: Utc::now(),
            control: ControlState::Running,
            outcome: None,
            trace: Vec::new(),
            next_sequence: 1,
        }
    }

    /// The simulation instance id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The marking the simulation currently sits on
    pub fn current_marking(&self) -> &Marking {
        &self.current_marking
    }

    /// Steps fired so far
    pub fn steps_executed(&self) -> usize {
        self.steps_executed
    }

    /// Whether the run has ended
    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// The guard context, for seeding before or between steps
    pub fn context_mut(&mut self) -> &mut GuardContext {
        &mut self.context
    }

    /// Set one guard-context value
    pub fn set_context<K: Into<String>>(&mut self, key: K, value: serde_json::Value) {
        self.context.insert(key.into(), value);
    }

    /// Pause: `step` becomes a no-op until `resume`
    pub fn pause(&mut self) {
        if self.control == ControlState::Running {
            self.control = ControlState::Paused;
        }
    }

    /// Resume a paused simulation
    pub fn resume(&mut self) {
        if self.control == ControlState::Paused {
            self.control = ControlState::Running;
        }
    }

    /// Stop: terminal; the next step emits a single CANCELLED event
    pub fn stop(&mut self) {
        if self.outcome.is_none() {
            self.control = ControlState::Stopped;
        }
    }

    /// Rewind to the initial marking with a fresh PRNG from the same seed
    pub fn reset(&mut self) {
        self.current_marking = self.initial_marking.clone();
        self.steps_executed = 0;
        self.rng = SplitMix64::new(self.config.seed);
        self.control = ControlState::Running;
        self.outcome = None;
        self.trace.clear();
        self.next_sequence = 1;
        self.started_at = Utc::now();
    }

    /// Transitions that may fire right now: structurally enabled, guard
    /// passes, not inhibited. Ordered by (priority desc, id asc).
    pub fn candidates(&self) -> Vec<&Transition> {
        self.net
            .enabled(&self.current_marking)
            .into_iter()
            .filter(|t| self.passes_guard(t) && !is_inhibited(&t.inhibitor_conditions, &self.context))
            .collect()
    }

    fn passes_guard(&self, transition: &Transition) -> bool {
        let Some(guard) = &transition.guard else {
            return true;
        };
        // Exclusive-choice carve-out: without a 'choice' context key the
        // branch guards cannot decide, and the PRNG resolves the conflict
        if transition.is_choice() && !self.context.contains_key("choice") {
            return true;
        }
        evaluate_guard(guard, &self.context)
    }

    /// Execute one step under the deterministic rule
    pub fn step(&mut self) -> StepOutcome {
        self.step_inner(None)
            .expect("deterministic step cannot reject a choice")
    }

    /// Execute one step, firing the caller's chosen transition
    ///
    /// Interactive mode's external decision point. Fails with
    /// [`PetriflowError::NotEnabled`] when the chosen transition is not a
    /// candidate; with no choice the deterministic rule applies.
    pub fn step_with_choice(&mut self, choice: Option<&TransitionId>) -> Result<StepOutcome> {
        self.step_inner(choice)
    }

    fn step_inner(&mut self, choice: Option<&TransitionId>) -> Result<StepOutcome> {
        if self.outcome.is_some() {
            return Ok(StepOutcome::Idle);
        }
        match self.control {
            ControlState::Paused => return Ok(StepOutcome::Paused),
            ControlState::Stopped => {
                let event = self.emit(
                    TraceEventType::Cancelled,
                    self.current_marking.clone(),
                    "stopped by the caller".to_string(),
                );
                self.outcome = Some(SimulationStatus::Cancelled);
                return Ok(StepOutcome::Finished(SimulationStatus::Cancelled, event));
            }
            ControlState::Running => {}
        }

        let candidate_ids: Vec<TransitionId> = self
            .candidates()
            .into_iter()
            .map(|t| t.id.clone())
            .collect();

        if candidate_ids.is_empty() {
            let (event_type, status, description) = if self.net.is_terminal(&self.current_marking)
            {
                (
                    TraceEventType::Terminated,
                    SimulationStatus::Completed,
                    format!("terminated normally at {}", self.current_marking),
                )
            } else {
                (
                    TraceEventType::Deadlock,
                    SimulationStatus::Deadlocked,
                    format!("deadlock at {}", self.current_marking),
                )
            };

            let event = self.emit(event_type, self.current_marking.clone(), description);

            if event_type == TraceEventType::Deadlock
                && self.config.pause_on_deadlock
                && self.config.mode == SimulationMode::Interactive
            {
                // Leave the run open: the caller may amend the context
                // and resume
                warn!(marking = %self.current_marking, "deadlock; pausing for inspection");
                self.control = ControlState::Paused;
                return Ok(StepOutcome::Finished(SimulationStatus::Deadlocked, event));
            }

            self.outcome = Some(status);
            return Ok(StepOutcome::Finished(status, event));
        }

        let transition_id = match choice {
            Some(id) => {
                if !candidate_ids.contains(id) {
                    return Err(PetriflowError::NotEnabled {
                        transition: id.as_str().to_string(),
                    });
                }
                id.clone()
            }
            None => candidate_ids[self.rng.choose(candidate_ids.len())].clone(),
        };
        let transition_name = self
            .net
            .transition(transition_id.as_str())
            .map(|t| t.name.clone())
            .unwrap_or_default();

        let before = self.current_marking.clone();
        let after = self.net.fire(&transition_id, &before)?;

        let consumed_from: Vec<String> = self
            .net
            .arcs
            .iter()
            .filter(|a| a.to == transition_id.as_str() && !a.is_inhibitor && !a.is_test)
            .map(|a| a.from.clone())
            .collect();
        let produced_to: Vec<String> = self
            .net
            .arcs
            .iter()
            .filter(|a| a.from == transition_id.as_str())
            .map(|a| a.to.clone())
            .collect();

        self.current_marking = after.clone();
        self.steps_executed += 1;

        if self.config.verbose {
            info!(
                transition = %transition_id,
                step = self.steps_executed,
                "fired"
            );
        } else {
            debug!(transition = %transition_id, "fired");
        }

        let event = self.record(TraceEvent {
            sequence: 0, // assigned by record
            timestamp: Utc::now(),
            event_type: TraceEventType::TransitionFired,
            transition_id: Some(transition_id.as_str().to_string()),
            transition_name: Some(transition_name),
            marking_before: before,
            marking_after: after,
            consumed_from,
            produced_to,
            description: format!("fired {}", transition_id),
            seed: self.config.seed,
        });

        if self.config.mode == SimulationMode::Interactive
            && self.config.enable_animation
            && self.config.step_delay_ms > 0
        {
            std::thread::sleep(Duration::from_millis(self.config.step_delay_ms));
        }

        if self.steps_executed >= self.config.max_steps {
            let stop_event = self.emit(
                TraceEventType::MaxStepsReached,
                self.current_marking.clone(),
                format!("step budget of {} exhausted", self.config.max_steps),
            );
            self.outcome = Some(SimulationStatus::MaxStepsReached);
            return Ok(StepOutcome::Finished(
                SimulationStatus::MaxStepsReached,
                stop_event,
            ));
        }

        Ok(StepOutcome::Fired(event))
    }

    /// Record a non-firing event at the current marking
    fn emit(
        &mut self,
        event_type: TraceEventType,
        marking: Marking,
        description: String,
    ) -> TraceEvent {
        self.record(TraceEvent {
            sequence: 0, // assigned by record
            timestamp: Utc::now(),
            event_type,
            transition_id: None,
            transition_name: None,
            marking_before: marking.clone(),
            marking_after: marking,
            consumed_from: Vec::new(),
            produced_to: Vec::new(),
            description,
            seed: self.config.seed,
        })
    }

    /// Assign the next sequence number and append to the trace
    fn record(&mut self, mut event: TraceEvent) -> TraceEvent {
        event.sequence = self.next_sequence;
        self.next_sequence += 1;
        if self.config.enable_tracing {
            self.trace.push(event.clone());
        }
        event
    }

    /// Drive steps until the run ends and collect the result
    pub fn run(&mut self) -> SimulationResult {
        let status = loop {
            match self.step() {
                StepOutcome::Fired(_) => continue,
                StepOutcome::Finished(status, _) => break status,
                // Only reachable when an interactive driver paused the
                // run; the deterministic driver reports what it saw
                StepOutcome::Paused | StepOutcome::Idle => {
                    break self.outcome.unwrap_or(SimulationStatus::Deadlocked)
                }
            }
        };
        self.result(status)
    }

    /// Snapshot the run as a result value
    pub fn result(&self, status: SimulationStatus) -> SimulationResult {
        let message = match status {
            SimulationStatus::Completed => {
                format!("completed after {} step(s)", self.steps_executed)
            }
            SimulationStatus::Deadlocked => format!(
                "deadlocked after {} step(s) at {}",
                self.steps_executed, self.current_marking
            ),
            SimulationStatus::MaxStepsReached => {
                format!("stopped at the step budget of {}", self.config.max_steps)
            }
            SimulationStatus::Cancelled => {
                format!("cancelled after {} step(s)", self.steps_executed)
            }
            SimulationStatus::Error => "simulation error".to_string(),
        };

        SimulationResult {
            simulation_id: self.id.clone(),
            petri_net_id: self.net.id.clone(),
            status,
            success: status == SimulationStatus::Completed,
            message,
            steps_executed: self.steps_executed,
            initial_marking: self.initial_marking.clone(),
            final_marking: self.current_marking.clone(),
            started_at: self.started_at,
            ended_at: Utc::now(),
            seed: self.config.seed,
            trace: self.trace.clone(),
        }
    }
}

/// Convenience facade: configure once, simulate many nets
#[derive(Debug, Clone, Default)]
pub struct Simulator {
    config: SimulationConfig,
}

impl Simulator {
    pub fn new(config: SimulationConfig) -> Self {
        Simulator {
            config: config.normalized(),
        }
    }

    pub fn with_defaults() -> Self {
        Simulator::new(SimulationConfig::default())
    }

    /// Run a whole simulation of `net`
    pub fn simulate(&self, net: &PetriNet) -> SimulationResult {
        Simulation::new(net, self.config.clone()).run()
    }

    /// Begin a stepping simulation of `net`
    pub fn begin(&self, net: &PetriNet) -> Simulation {
        Simulation::new(net, self.config.clone())
    }
}
