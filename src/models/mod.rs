// Core domain models for petriflow
// Generic, immutable value types shared by every engine component

//! # Domain Models Module
//!
//! The value types of the verification engine. Everything here is plain
//! data: serializable, immutable after construction, and free of engine
//! behaviour. The compiler, validator, simulator, and projector all
//! operate on these values and never mutate them in place.
//!
//! ## Layout
//!
//! - `ids` - `PlaceId` / `TransitionId` string newtypes
//! - `place`, `transition`, `arc` - the net elements
//! - `marking` - immutable token-count snapshots
//! - `net` - the sealed `PetriNet` plus its builder and validation
//! - `intent` - the workflow description the compiler consumes
//! - `dag` - the projected task graph
//! - `workflow` - the sum type over both workflow representations

// Element identifiers
pub mod ids;

// Net elements
pub mod arc;
pub mod place;
pub mod transition;

// Token-count snapshots
pub mod marking;

// The net itself
pub mod net;

// Compiler input
pub mod intent;

// Projector output
pub mod dag;

// The facade over both representations
pub mod workflow;

// Re-export the main types for a flat API: users write
// `petriflow::PetriNet`, not `petriflow::models::net::PetriNet`.

/// Re-export the element identifiers
pub use ids::{PlaceId, TransitionId};

/// Re-export the net elements
pub use arc::Arc;
pub use place::Place;
pub use transition::{RetryPolicy, Transition};

/// Re-export markings
pub use marking::Marking;

/// Re-export the net, its builder, and structural errors
pub use net::{PetriNet, PetriNetBuilder, StructuralError};

/// Re-export the intent model
pub use intent::{IntentSpec, IntentStep, StepType};

/// Re-export the task graph
pub use dag::{DagEdge, TaskDag, TaskNode};

/// Re-export the workflow facade
pub use workflow::WorkflowModel;
