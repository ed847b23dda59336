// Arc model - weighted connections between places and transitions

//! # Arcs
//!
//! An `Arc` is a directed, weighted connection between a place and a
//! transition. Arcs never connect two places or two transitions; the net
//! builder enforces that endpoints alternate kind, because only the net
//! knows the full id universe.
//!
//! ## Variants
//!
//! - **Normal arc** (place -> transition): the transition needs `weight`
//!   tokens in the place and consumes them on firing.
//! - **Normal arc** (transition -> place): the transition produces
//!   `weight` tokens in the place.
//! - **Inhibitor arc** (`is_inhibitor`): reverses the input test - the
//!   transition is enabled only while the place holds *fewer* than
//!   `weight` tokens. Nothing is consumed.
//! - **Test arc** (`is_test`): the input test applies but tokens are not
//!   consumed (read-only dependency).

use serde::{Deserialize, Serialize};

/// A directed, weighted connection between a place and a transition
///
/// Endpoints are element ids; the net validates that `from`/`to` exist and
/// alternate kind. Weight is at least 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Arc {
    /// Source element id (a place or a transition)
    pub from: String,

    /// Target element id (a transition or a place)
    pub to: String,

    /// Token multiplicity, >= 1
    pub weight: u64,

    /// Inhibitor semantics: enabled only while tokens < weight
    #[serde(default)]
    pub is_inhibitor: bool,

    /// Test semantics: tokens are required but not consumed
    #[serde(default)]
    pub is_test: bool,
}

impl Arc {
    /// Create a normal arc with weight 1
    pub fn new<F: Into<String>, T: Into<String>>(from: F, to: T) -> Self {
        Arc {
            from: from.into(),
            to: to.into(),
            weight: 1,
            is_inhibitor: false,
            is_test: false,
        }
    }

    /// Create a normal arc with an explicit weight
    pub fn with_weight<F: Into<String>, T: Into<String>>(from: F, to: T, weight: u64) -> Self {
        Arc {
            weight,
            ..Arc::new(from, to)
        }
    }

    /// Create an inhibitor arc (place -> transition only)
    pub fn inhibitor<F: Into<String>, T: Into<String>>(from: F, to: T, weight: u64) -> Self {
        Arc {
            weight,
            is_inhibitor: true,
            ..Arc::new(from, to)
        }
    }

    /// Create a test arc (tokens checked but not consumed)
    pub fn test_arc<F: Into<String>, T: Into<String>>(from: F, to: T, weight: u64) -> Self {
        Arc {
            weight,
            is_test: true,
            ..Arc::new(from, to)
        }
    }
}
