// petriflow - workflow verification powered by Petri Nets

//! # Petriflow
//!
//! A workflow-verification engine. Petriflow takes a workflow description
//! (an intent spec distilled from a YAML automation spec), compiles it
//! into a formal **Petri net**, and answers "is this workflow structurally
//! correct, bounded, deadlock-free, and what would it do?" before any
//! side-effecting execution is attempted.
//!
//! ## Pipeline
//!
//! ```text
//! IntentSpec --AutomationGrammar--> PetriNet --+--> NetValidator  (verify)
//!                                              +--> Simulator     (simulate)
//!                                              +--> DagProjector  (project)
//! ```
//!
//! All three consumers operate on the same immutable net value; they
//! never mutate it.
//!
//! ## Example
//!
//! ```rust
//! use petriflow::{
//!     AutomationGrammar, DagProjector, IntentSpec, IntentStep, NetValidator, Simulator,
//! };
//!
//! let intent = IntentSpec::new("report pipeline")
//!     .with_step(IntentStep::action("fetch", "Fetch the report file"))
//!     .with_step(IntentStep::action("notify", "Send email summary").depends_on("fetch"));
//!
//! let net = AutomationGrammar::new().compile(&intent).unwrap();
//!
//! let verification = NetValidator::with_defaults().verify(&net);
//! assert!(verification.is_valid);
//!
//! let simulation = Simulator::with_defaults().simulate(&net);
//! assert!(simulation.success);
//!
//! let dag = DagProjector::new().project(&net).unwrap();
//! assert_eq!(dag.nodes.len(), 2);
//! ```
//!
//! ## Scope
//!
//! The core consumes structured values and returns structured values: no
//! CLI, no files, no environment variables, no I/O. Transport,
//! persistence, and the execution runtime are collaborators of the
//! surrounding service, not part of this crate. Logging goes through
//! `tracing`; installing a subscriber is the caller's job.

// Core domain models (places, transitions, nets, intents, DAGs)
pub mod models;

// The verification engine (compiler, validator, simulator, projector)
pub mod engine;

// Re-export the domain types for a flat API
pub use models::{
    Arc,            // Weighted place<->transition connection
    DagEdge,        // Reduced precedence edge with realising places
    IntentSpec,     // Compiler input
    IntentStep,     // One step of an intent
    Marking,        // Immutable token snapshot
    PetriNet,       // The sealed net value
    PetriNetBuilder,
    Place,          // Passive node
    PlaceId,
    RetryPolicy,    // Retry decoration carried to the task graph
    StepType,       // Intent step discriminator
    StructuralError,
    TaskDag,        // Projector output
    TaskNode,
    Transition,     // Active node
    TransitionId,
    WorkflowModel,  // Sum type over net and DAG
};

// Re-export the engine entry points
pub use engine::{
    AutomationGrammar,  // Intent -> net compiler
    CheckResult,
    CheckStatus,
    CheckType,
    CounterExample,
    DagProjector,       // Net -> DAG projector
    GuardContext,
    NetValidator,       // Bounded state-space verification
    Simulation,
    SimulationConfig,
    SimulationMode,
    SimulationResult,
    SimulationStatus,
    Simulator,          // Seeded deterministic simulation
    TraceEvent,
    TraceEventType,
    ValidationConfig,
    VerificationResult,
    VerificationStatus,
};

use thiserror::Error;

/// Error taxonomy of the verification core
///
/// Every surfaced failure is one of these variants; the core never aborts
/// the process. Deadlocks, exploration limits, and cancellation are *not*
/// errors - they are reported as statuses inside result values. Guard
/// evaluation failures are recovered locally (fail-closed) by the
/// simulator and only appear here when a caller parses guards directly.
#[derive(Error, Debug)]
pub enum PetriflowError {
    /// The intent spec failed validation; compilation was aborted
    #[error("invalid intent spec: {}", errors.join("; "))]
    InvalidIntent { errors: Vec<String> },

    /// A constructed net violates its structural invariants
    #[error("invalid net: {}", errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    InvalidNet { errors: Vec<StructuralError> },

    /// `fire` was called on a transition not enabled in the marking
    #[error("transition '{transition}' is not enabled")]
    NotEnabled { transition: String },

    /// Non-acyclic precedence between non-connector transitions
    #[error("cyclic precedence through transition '{transition}'")]
    CyclicPrecedence { transition: String },

    /// A guard expression could not be parsed or evaluated
    #[error("guard evaluation failed: {0}")]
    GuardEval(String),

    /// JSON (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias over [`PetriflowError`]
pub type Result<T> = std::result::Result<T, PetriflowError>;
