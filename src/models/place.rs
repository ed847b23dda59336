// Place model - passive net nodes with capacity and role flags

//! # Places
//!
//! A `Place` is a passive node of a Petri net: a location where tokens
//! reside. Places represent conditions, intermediate results, or resource
//! pools in the modeled workflow.
//!
//! ## Capacity
//!
//! A place may declare an integer capacity. A transition is only enabled
//! when every output place can absorb the tokens it would produce; this is
//! how resource pools ("at most one deployment in flight") are modeled.
//! `None` means unbounded.
//!
//! ## Role flags
//!
//! `is_source` marks places seeded by the initial marking; `is_sink` marks
//! places with no outgoing transitions. Both are informational - terminal
//! detection is computed structurally from the arc list, not from flags.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::ids::PlaceId;

/// A passive node of the net
///
/// Two places compare equal iff their ids match; name, capacity, and
/// metadata do not participate in identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    /// Stable identifier, non-empty and trimmed
    pub id: PlaceId,

    /// Human-readable display name
    pub name: String,

    /// Maximum token count this place can hold; `None` = unbounded
    pub capacity: Option<u64>,

    /// Free-form metadata (compiler lineage, UI hints, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,

    /// Seeded by the initial marking
    #[serde(default)]
    pub is_source: bool,

    /// No outgoing transitions; tokens that arrive here rest
    #[serde(default)]
    pub is_sink: bool,
}

impl Place {
    /// Create a new place with the given id and display name
    ///
    /// The id is trimmed; emptiness is checked by the net builder, which
    /// knows how to report structural errors in bulk.
    pub fn new<I: Into<PlaceId>, N: Into<String>>(id: I, name: N) -> Self {
        let id = id.into();
        Place {
            id: PlaceId::new(id.as_str().trim()),
            name: name.into(),
            capacity: None,
            metadata: HashMap::new(),
            is_source: false,
            is_sink: false,
        }
    }

    /// Declare a token capacity for this place
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Mark this place as a source (seeded by the initial marking)
    pub fn as_source(mut self) -> Self {
        self.is_source = true;
        self
    }

    /// Mark this place as a sink (tokens rest here)
    pub fn as_sink(mut self) -> Self {
        self.is_sink = true;
        self
    }
}

// Identity is the id alone
impl PartialEq for Place {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Place {}

impl std::hash::Hash for Place {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
