// Intent-to-net compiler - workflow patterns as Petri-net fragments

//! # Automation Grammar
//!
//! `AutomationGrammar` translates an [`IntentSpec`] into a [`PetriNet`].
//! Each step type maps to a small net fragment; fragments are then
//! stitched together through **shared places** derived from the step
//! dependencies, and every root step receives an initial token in its
//! entry place.
//!
//! ## Fragments
//!
//! - **ACTION**: `p_pre_<id> -> t_<id> -> p_post_<id>`. The pre-place arc
//!   is only wired for root steps; a dependent step is activated through
//!   its shared places instead, and the pre-place remains as the
//!   injection point it would be if the step ever became a root.
//! - **CHOICE**: one input place, one `isChoice` transition per path with
//!   guard `choice == '<path>'`, one output place per path.
//! - **PARALLEL**: `isFork` transition splitting into two branch places,
//!   `isJoin` transition merging them into the output place.
//! - **SYNC**: an `isJoin` transition with an output place; its inputs
//!   arrive through stitching.
//! - **SEQUENCE**: nothing - the step is transparent, and dependents of a
//!   sequence depend on the sequence's own dependencies.
//! - **Advanced patterns** (LOOP, CIRCUIT_BREAKER, ...): an ACTION-shaped
//!   fragment plus `pattern` and per-type metadata flags, so downstream
//!   tooling can recognise them while their full semantics stay open.
//!
//! ## Stitching
//!
//! For each step B depending on step A: allocate `p_shared_<A>_<B>`, arc
//! every exit transition of A into it, and arc it into every entry
//! transition of B. All step types participate - a choice or parallel
//! aggregate routes from its terminal transitions like any action does.
//!
//! A SYNC step with no dependencies has nothing to feed its join; the
//! grammar repairs that case with a seeded `p_sync_input_<id>` and logs a
//! warning, instead of emitting a join that can never fire.

use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::models::transition::{
    META_CHOICE_CONDITION, META_IS_CHOICE, META_IS_FORK, META_IS_JOIN,
};
use crate::models::{
    Arc, IntentSpec, IntentStep, Marking, PetriNet, Place, RetryPolicy, StepType, Transition,
};
use crate::{PetriflowError, Result};

/// Keyword -> action-label table, searched in order; the first match wins
/// so that compilation is deterministic when several keywords apply.
const ACTION_KEYWORDS: &[(&str, &str)] = &[
    ("email", "send_email"),
    ("file", "process_file"),
    ("slack", "post_slack"),
    ("remind", "schedule_reminder"),
    ("analyze", "analyze_data"),
    ("generate", "generate_content"),
];

/// Fallback label when no keyword matches
const DEFAULT_ACTION: &str = "custom_action";

/// Paths assumed for a CHOICE step that declares none
const DEFAULT_CHOICE_PATHS: [&str; 2] = ["a", "b"];

/// Derive an action label from a step description
fn action_label(description: &str) -> String {
    let lowered = description.to_lowercase();
    ACTION_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(*keyword))
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| DEFAULT_ACTION.to_string())
}

/// How a compiled fragment connects to the rest of the net
#[derive(Debug, Clone, Default)]
struct FragmentInterface {
    /// Transitions activated when the step starts
    entry_transitions: Vec<String>,

    /// Transitions whose firing means the step completed
    exit_transitions: Vec<String>,

    /// The place seeded when the step is a root; `None` for fragments
    /// that only create it on demand (SYNC)
    entry_place: Option<String>,
}

/// The intent-to-net compiler
#[derive(Debug, Clone, Default)]
pub struct AutomationGrammar;

impl AutomationGrammar {
    pub fn new() -> Self {
        AutomationGrammar
    }

    /// Compile an intent spec into a sealed Petri net
    ///
    /// Fails with [`PetriflowError::InvalidIntent`] carrying every
    /// validation error when the spec is not well-formed.
    pub fn compile(&self, intent: &IntentSpec) -> Result<PetriNet> {
        let errors = intent.validate();
        if !errors.is_empty() {
            return Err(PetriflowError::InvalidIntent { errors });
        }

        let mut net = NetAssembly::default();
        let mut interfaces: HashMap<String, FragmentInterface> = HashMap::new();

        // A step with dependents completes into its shared places; only a
        // step nothing depends on completes into its own post place, so
        // the final marking of a run is exactly the leaves' tokens
        let mut has_dependents: HashSet<String> = HashSet::new();
        for step in &intent.steps {
            if step.step_type != StepType::Sequence {
                for dep in effective_dependencies(intent, step) {
                    has_dependents.insert(dep);
                }
            }
        }

        // Pass 1: emit one fragment per step
        for step in &intent.steps {
            let terminal = !has_dependents.contains(&step.id);
            let interface = match step.step_type {
                StepType::Sequence => FragmentInterface::default(),
                StepType::Choice => self.emit_choice(step, terminal, &mut net),
                StepType::Parallel => self.emit_parallel(step, terminal, &mut net),
                StepType::Sync => self.emit_sync(step, terminal, &mut net),
                // ACTION and every advanced pattern share the
                // pre/transition/post shape
                _ => self.emit_action(step, terminal, &mut net),
            };
            interfaces.insert(step.id.clone(), interface);
        }

        // Pass 2: stitch dependencies through shared places. SEQUENCE
        // steps are transparent, so dependencies are expanded through
        // them first.
        for step in &intent.steps {
            if step.step_type == StepType::Sequence {
                continue;
            }
            let entries = &interfaces[&step.id].entry_transitions;
            for dep in effective_dependencies(intent, step) {
                let exits = &interfaces[&dep].exit_transitions;
                if exits.is_empty() {
                    continue;
                }
                let shared = format!("p_shared_{}_{}", dep, step.id);
                net.places.push(
                    Place::new(shared.clone(), format!("{} -> {}", dep, step.id))
                        .with_metadata("fromStep", json!(dep))
                        .with_metadata("toStep", json!(step.id)),
                );
                for exit in exits {
                    net.arcs.push(Arc::new(exit.clone(), shared.clone()));
                }
                for entry in entries {
                    net.arcs.push(Arc::new(shared.clone(), entry.clone()));
                }
            }
        }

        // Pass 3: seed and wire the roots
        for step in &intent.steps {
            if step.step_type == StepType::Sequence {
                continue;
            }
            if !effective_dependencies(intent, step).is_empty() {
                continue;
            }

            let interface = interfaces.get_mut(&step.id).expect("fragment emitted");
            let entry_place = match &interface.entry_place {
                Some(place) => place.clone(),
                None => {
                    // A root SYNC has no token source; repair it with a
                    // seeded input rather than emit a dead join
                    warn!(
                        step = %step.id,
                        "SYNC step has no dependencies; seeding a synthetic input place"
                    );
                    let place = format!("p_sync_input_{}", step.id);
                    net.places
                        .push(Place::new(place.clone(), format!("Sync input for {}", step.id)));
                    interface.entry_place = Some(place.clone());
                    place
                }
            };

            for entry in &interface.entry_transitions {
                net.arcs.push(Arc::new(entry_place.clone(), entry.clone()));
            }
            net.initial_marking = net.initial_marking.plus(&entry_place, 1);
        }

        debug!(
            steps = intent.steps.len(),
            places = net.places.len(),
            transitions = net.transitions.len(),
            "compiled intent"
        );

        net.seal(intent)
    }

    /// ACTION fragment; also the shape of every advanced pattern
    fn emit_action(
        &self,
        step: &IntentStep,
        terminal: bool,
        net: &mut NetAssembly,
    ) -> FragmentInterface {
        let pre = format!("p_pre_{}", step.id);
        let post = format!("p_post_{}", step.id);
        let t_id = format!("t_{}", step.id);

        net.places.push(Place::new(pre.clone(), format!("Before {}", step.id)));
        net.places.push(Place::new(post.clone(), format!("After {}", step.id)));

        let mut transition = Transition::new(t_id.clone(), display_name(step))
            .with_description(step.description.clone())
            .with_action(action_label(&step.description));
        if let Some(guard) = &step.when {
            transition = transition.with_guard(guard.clone());
        }
        if let Some(timeout) = step.timeout_ms {
            transition = transition.with_timeout_ms(timeout);
        }
        if let Some(policy) = retry_policy_from(&step.retry_policy) {
            transition = transition.with_retry_policy(policy);
        }
        if step.step_type.is_advanced() {
            transition = mark_advanced(transition, step);
        }
        net.transitions.push(transition);

        // Root steps get the pre-place arc in pass 3; dependents are fed
        // by shared places and leave the pre-place dormant. Completion
        // flows into the post place only when nothing depends on this
        // step; otherwise the shared places carry it.
        if terminal {
            net.arcs.push(Arc::new(t_id.clone(), post));
        }

        FragmentInterface {
            entry_transitions: vec![t_id.clone()],
            exit_transitions: vec![t_id],
            entry_place: Some(pre),
        }
    }

    /// CHOICE fragment: one guarded transition per path
    fn emit_choice(
        &self,
        step: &IntentStep,
        terminal: bool,
        net: &mut NetAssembly,
    ) -> FragmentInterface {
        let input = format!("p_choice_input_{}", step.id);
        net.places
            .push(Place::new(input.clone(), format!("Choice input for {}", step.id)));

        let mut entries = Vec::new();
        for path in choice_paths(step) {
            let t_id = format!("t_{}_{}", step.id, path);
            let output = format!("p_choice_output_{}_{}", step.id, path);

            net.places
                .push(Place::new(output.clone(), format!("Choice output {} / {}", step.id, path)));
            net.transitions.push(
                Transition::new(t_id.clone(), format!("{} [{}]", display_name(step), path))
                    .with_description(step.description.clone())
                    .with_guard(format!("choice == '{}'", path))
                    .with_metadata(META_IS_CHOICE, json!(true))
                    .with_metadata(META_CHOICE_CONDITION, json!(path)),
            );
            // The input arc is wired in pass 3 for roots; dependent
            // choices read their token from the shared place instead
            if terminal {
                net.arcs.push(Arc::new(t_id.clone(), output));
            }
            entries.push(t_id);
        }

        FragmentInterface {
            entry_transitions: entries.clone(),
            exit_transitions: entries,
            entry_place: Some(input),
        }
    }

    /// PARALLEL fragment: fork into two branches, join back
    fn emit_parallel(
        &self,
        step: &IntentStep,
        terminal: bool,
        net: &mut NetAssembly,
    ) -> FragmentInterface {
        let input = format!("p_parallel_input_{}", step.id);
        let branch1 = format!("p_parallel_branch_{}_1", step.id);
        let branch2 = format!("p_parallel_branch_{}_2", step.id);
        let output = format!("p_parallel_output_{}", step.id);
        let fork = format!("t_fork_{}", step.id);
        let join = format!("t_join_{}", step.id);

        net.places
            .push(Place::new(input.clone(), format!("Parallel input for {}", step.id)));
        net.places
            .push(Place::new(branch1.clone(), format!("Branch 1 of {}", step.id)));
        net.places
            .push(Place::new(branch2.clone(), format!("Branch 2 of {}", step.id)));
        net.places
            .push(Place::new(output.clone(), format!("Parallel output for {}", step.id)));

        net.transitions.push(
            Transition::new(fork.clone(), format!("Fork {}", step.id))
                .with_description(step.description.clone())
                .with_metadata(META_IS_FORK, json!(true)),
        );
        net.transitions.push(
            Transition::new(join.clone(), format!("Join {}", step.id))
                .with_metadata(META_IS_JOIN, json!(true)),
        );

        net.arcs.push(Arc::new(fork.clone(), branch1.clone()));
        net.arcs.push(Arc::new(fork.clone(), branch2.clone()));
        net.arcs.push(Arc::new(branch1, join.clone()));
        net.arcs.push(Arc::new(branch2, join.clone()));
        if terminal {
            net.arcs.push(Arc::new(join.clone(), output));
        }

        FragmentInterface {
            entry_transitions: vec![fork],
            exit_transitions: vec![join],
            entry_place: Some(input),
        }
    }

    /// SYNC fragment: a bare join; inputs arrive through stitching
    fn emit_sync(
        &self,
        step: &IntentStep,
        terminal: bool,
        net: &mut NetAssembly,
    ) -> FragmentInterface {
        let t_id = format!("t_sync_{}", step.id);
        let output = format!("p_sync_output_{}", step.id);

        net.places
            .push(Place::new(output.clone(), format!("Sync output for {}", step.id)));
        net.transitions.push(
            Transition::new(t_id.clone(), format!("Sync {}", step.id))
                .with_description(step.description.clone())
                .with_metadata(META_IS_JOIN, json!(true)),
        );
        if terminal {
            net.arcs.push(Arc::new(t_id.clone(), output));
        }

        FragmentInterface {
            entry_transitions: vec![t_id.clone()],
            exit_transitions: vec![t_id],
            entry_place: None,
        }
    }
}

/// Expand dependencies through transparent SEQUENCE steps, deduplicated,
/// in first-mention order
fn effective_dependencies(intent: &IntentSpec, step: &IntentStep) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack: Vec<&str> = step.depends_on.iter().rev().map(String::as_str).collect();

    while let Some(dep) = stack.pop() {
        let Some(dep_step) = intent.step(dep) else {
            continue;
        };
        if dep_step.step_type == StepType::Sequence {
            for inner in dep_step.depends_on.iter().rev() {
                stack.push(inner);
            }
        } else if seen.insert(dep.to_string()) {
            out.push(dep.to_string());
        }
    }

    out
}

/// Display name for a step's main transition
fn display_name(step: &IntentStep) -> String {
    if step.description.trim().is_empty() {
        step.id.clone()
    } else {
        step.description.clone()
    }
}

/// The paths of a CHOICE step, from metadata, with a two-way default
fn choice_paths(step: &IntentStep) -> Vec<String> {
    step.metadata
        .get("paths")
        .and_then(Value::as_array)
        .map(|paths| {
            paths
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|paths| !paths.is_empty())
        .unwrap_or_else(|| DEFAULT_CHOICE_PATHS.iter().map(|p| p.to_string()).collect())
}

/// Flag an advanced-pattern transition so tooling can recognise it
fn mark_advanced(transition: Transition, step: &IntentStep) -> Transition {
    let (pattern, flag) = match step.step_type {
        StepType::NestedConditional => ("NESTED_CONDITIONAL", "isNestedConditional"),
        StepType::Loop => ("LOOP", "isLoop"),
        StepType::EventTrigger => ("EVENT_TRIGGER", "isEventTrigger"),
        StepType::ErrorHandler => ("ERROR_HANDLER", "isErrorHandler"),
        StepType::Compensation => ("COMPENSATION", "isCompensation"),
        StepType::CircuitBreaker => ("CIRCUIT_BREAKER", "isCircuitBreaker"),
        StepType::FanOutFanIn => ("FAN_OUT_FAN_IN", "isFanOutFanIn"),
        StepType::PipelineStage => ("PIPELINE_STAGE", "isPipelineStage"),
        StepType::ResourceConstrained => ("RESOURCE_CONSTRAINED", "isResourceConstrained"),
        _ => return transition,
    };

    let mut transition = transition
        .with_metadata("pattern", json!(pattern))
        .with_metadata(flag, json!(true));
    if let Some(condition) = &step.loop_condition {
        transition = transition.with_metadata("loopCondition", json!(condition));
    }
    if !step.resource_constraints.is_empty() {
        transition = transition.with_metadata(
            "resourceConstraints",
            json!(step.resource_constraints.clone()),
        );
    }
    transition
}

/// Read a retry policy out of a step's loose configuration map
fn retry_policy_from(config: &HashMap<String, Value>) -> Option<RetryPolicy> {
    if config.is_empty() {
        return None;
    }
    let defaults = RetryPolicy::default();
    Some(RetryPolicy {
        max_retries: config
            .get("maxRetries")
            .and_then(Value::as_u64)
            .map(|n| n as u32)
            .unwrap_or(defaults.max_retries),
        backoff_multiplier: config
            .get("backoffMultiplier")
            .and_then(Value::as_f64)
            .unwrap_or(defaults.backoff_multiplier),
        initial_delay_ms: config
            .get("initialDelayMs")
            .and_then(Value::as_u64)
            .unwrap_or(defaults.initial_delay_ms),
        max_delay_ms: config
            .get("maxDelayMs")
            .and_then(Value::as_u64)
            .unwrap_or(defaults.max_delay_ms),
        retry_on: config
            .get("retryOn")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    })
}

/// Accumulates net elements across the compilation passes
#[derive(Debug, Default)]
struct NetAssembly {
    places: Vec<Place>,
    transitions: Vec<Transition>,
    arcs: Vec<Arc>,
    initial_marking: Marking,
}

impl NetAssembly {
    /// Flag sinks/sources and seal the net through the builder
    fn seal(self, intent: &IntentSpec) -> Result<PetriNet> {
        let NetAssembly {
            places,
            transitions,
            arcs,
            initial_marking,
        } = self;

        let has_outgoing: HashSet<&str> = arcs.iter().map(|a| a.from.as_str()).collect();

        let mut builder = PetriNet::builder(intent.name.clone())
            .description(intent.description.clone())
            .schema_version(intent.schema_version.clone())
            .metadata("compiledFrom", json!(intent.name))
            .metadata("stepCount", json!(intent.steps.len()));

        for place in places {
            let is_source = initial_marking.tokens(place.id.as_str()) > 0;
            let is_sink = !has_outgoing.contains(place.id.as_str());
            let mut place = place;
            place.is_source = is_source;
            place.is_sink = is_sink;
            builder = builder.add_place(place);
        }
        for transition in transitions {
            builder = builder.add_transition(transition);
        }
        for arc in arcs {
            builder = builder.add_arc(arc);
        }
        for (place, count) in initial_marking.as_map() {
            builder = builder.initial_tokens(place.clone(), *count);
        }

        builder.build()
    }
}
