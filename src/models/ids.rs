// Petri net element identifiers - stable string identities
//
// ## Identity Model Overview
//
// Every element of a Petri net is addressed by a stable string id:
//
// **Places (PlaceId)**: Passive nodes where tokens reside.
// - Example: "p_pre_fetch", "p_post_fetch", "p_shared_fetch_notify"
// - A place's identity never changes once the net is built
//
// **Transitions (TransitionId)**: Active nodes that fire atomically.
// - Example: "t_fetch", "t_choice_a", "t_join_parallel"
// - Transitions consume tokens from input places and produce tokens in
//   output places
//
// Ids are the *only* cross-reference between net elements: arcs, markings,
// and trace events all refer to places and transitions by id, never by
// object reference. This keeps the net flat, serializable, and free of
// cyclic ownership.
//
// ### Implementation Notes:
//
// - PlaceId and TransitionId are simple string wrappers
// - Two places (or two transitions) compare equal iff their ids match
// - Ids sort lexically, which gives the engine its deterministic tie-break

use serde::{Deserialize, Serialize};

/// **Place identifier** - addresses a passive node of the net
///
/// A place holds a non-negative number of tokens. The id is the place's
/// whole identity: markings map `PlaceId -> token count`, and arcs name
/// their place endpoint by id.
///
/// ## Examples:
///
/// Compiled nets use structured ids such as `p_pre_<step>`,
/// `p_post_<step>`, `p_choice_input_<step>`, `p_shared_<a>_<b>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlaceId(pub String);

impl PlaceId {
    /// Get the place identifier as a string slice
    ///
    /// ```rust
    /// # use petriflow::PlaceId;
    /// let place = PlaceId::from("p_pre_fetch");
    /// assert_eq!(place.as_str(), "p_pre_fetch");
    /// ```
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create a new place id from any string-like input
    ///
    /// ```rust
    /// # use petriflow::PlaceId;
    /// let p1 = PlaceId::new("p_pool");
    /// let p2 = PlaceId::from("p_pool");
    /// assert_eq!(p1, p2);
    /// ```
    pub fn new<S: Into<String>>(id: S) -> Self {
        PlaceId(id.into())
    }
}

impl From<&str> for PlaceId {
    fn from(s: &str) -> Self {
        PlaceId(s.to_string())
    }
}

impl From<String> for PlaceId {
    fn from(s: String) -> Self {
        PlaceId(s)
    }
}

impl std::fmt::Display for PlaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// **Transition identifier** - addresses an active node of the net
///
/// A transition fires atomically: it consumes tokens from its input places
/// and produces tokens in its output places. Enablement ties break on
/// (descending priority, ascending id), so the lexical ordering of
/// transition ids is part of the engine's determinism contract.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransitionId(pub String);

impl TransitionId {
    /// Get the transition identifier as a string slice
    ///
    /// ```rust
    /// # use petriflow::TransitionId;
    /// let t = TransitionId::from("t_fetch");
    /// assert_eq!(t.as_str(), "t_fetch");
    /// ```
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create a new transition id from any string-like input
    ///
    /// ```rust
    /// # use petriflow::TransitionId;
    /// let t1 = TransitionId::new("t_notify");
    /// let t2 = TransitionId::from("t_notify");
    /// assert_eq!(t1, t2);
    /// ```
    pub fn new<S: Into<String>>(id: S) -> Self {
        TransitionId(id.into())
    }
}

impl From<&str> for TransitionId {
    fn from(s: &str) -> Self {
        TransitionId(s.to_string())
    }
}

impl From<String> for TransitionId {
    fn from(s: String) -> Self {
        TransitionId(s)
    }
}

impl std::fmt::Display for TransitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
