// Marking model - immutable token-count snapshots

//! # Markings
//!
//! A `Marking` maps place ids to non-negative token counts; it is a
//! snapshot of the net's state. Markings are **value objects**: every
//! firing produces a new marking and never mutates the old one, which is
//! what lets the validator keep thousands of them in its visited set and
//! lets trace events capture before/after pairs for free.
//!
//! ## Normalization
//!
//! Zero counts are never stored. Absent keys read as 0, so two markings
//! compare equal exactly when they agree on every place with a non-zero
//! count - the derived equality over the normalized map is the semantic
//! equality the validator needs for deduplication.
//!
//! The backing store is a `BTreeMap`, so iteration order, serialization,
//! and the canonical form used for the stable net id are all deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::PlaceId;

/// An immutable snapshot of token counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Marking {
    counts: BTreeMap<String, u64>,
}

// Deserialization re-normalizes: explicit zero counts on the wire must
// not break marking equality
impl<'de> Deserialize<'de> for Marking {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let counts = BTreeMap::<String, u64>::deserialize(deserializer)?;
        Ok(Marking {
            counts: counts.into_iter().filter(|(_, c)| *c > 0).collect(),
        })
    }
}

impl Marking {
    /// The empty marking (every place holds 0 tokens)
    pub fn empty() -> Self {
        Marking {
            counts: BTreeMap::new(),
        }
    }

    /// A marking with a single token in one place
    pub fn single<P: Into<PlaceId>>(place: P) -> Self {
        Marking::empty().with_tokens(place, 1)
    }

    /// Build a marking from (place, count) pairs; zero counts are dropped
    pub fn from_pairs<P: Into<PlaceId>, I: IntoIterator<Item = (P, u64)>>(pairs: I) -> Self {
        let mut marking = Marking::empty();
        for (place, count) in pairs {
            marking = marking.with_tokens(place, count);
        }
        marking
    }

    /// Token count at a place; absent keys are 0
    pub fn tokens<P: AsRef<str>>(&self, place: P) -> u64 {
        self.counts.get(place.as_ref()).copied().unwrap_or(0)
    }

    /// A new marking with the count at `place` replaced by `count`
    pub fn with_tokens<P: Into<PlaceId>>(&self, place: P, count: u64) -> Self {
        let mut counts = self.counts.clone();
        let place = place.into();
        if count == 0 {
            counts.remove(place.as_str());
        } else {
            counts.insert(place.0, count);
        }
        Marking { counts }
    }

    /// A new marking with `n` tokens added at `place`
    ///
    /// Panics on u64 overflow; token counts overflowing is an internal
    /// invariant violation, not a recoverable condition.
    pub fn plus<P: AsRef<str>>(&self, place: P, n: u64) -> Self {
        let place = place.as_ref();
        let current = self.tokens(place);
        let next = current
            .checked_add(n)
            .expect("token count overflow while adding tokens");
        self.with_tokens(place, next)
    }

    /// A new marking with `n` tokens removed at `place`
    ///
    /// Panics when fewer than `n` tokens are present; `fire` checks
    /// enablement before consuming, so underflow means a broken caller.
    pub fn minus<P: AsRef<str>>(&self, place: P, n: u64) -> Self {
        let place = place.as_ref();
        let current = self.tokens(place);
        let next = current
            .checked_sub(n)
            .expect("token count underflow while consuming tokens");
        self.with_tokens(place, next)
    }

    /// Total number of tokens across all places
    pub fn total_tokens(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Place ids that hold at least one token, in id order
    pub fn marked_places(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// Whether no place holds a token
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The underlying (place id -> count) map, zero entries elided
    pub fn as_map(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }
}

impl std::fmt::Display for Marking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (place, count)) in self.counts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", place, count)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_keys_read_as_zero() {
        let marking = Marking::single("p_a");
        assert_eq!(marking.tokens("p_a"), 1);
        assert_eq!(marking.tokens("p_never_mentioned"), 0);
    }

    #[test]
    fn test_zero_counts_are_not_stored() {
        // A marking built with an explicit zero equals one that never
        // mentioned the place at all
        let explicit = Marking::empty().with_tokens("p_a", 1).with_tokens("p_b", 0);
        let implicit = Marking::empty().with_tokens("p_a", 1);

        assert_eq!(explicit, implicit);
        assert_eq!(explicit.as_map().len(), 1);
    }

    #[test]
    fn test_markings_are_values() {
        let before = Marking::single("p_a");
        let after = before.minus("p_a", 1).plus("p_b", 1);

        // The original is untouched
        assert_eq!(before.tokens("p_a"), 1);
        assert_eq!(before.tokens("p_b"), 0);
        assert_eq!(after.tokens("p_a"), 0);
        assert_eq!(after.tokens("p_b"), 1);
    }

    #[test]
    fn test_total_tokens() {
        let marking = Marking::from_pairs(vec![("p_a", 2), ("p_b", 3), ("p_c", 0)]);
        assert_eq!(marking.total_tokens(), 5);
        assert_eq!(
            marking.marked_places().collect::<Vec<_>>(),
            vec!["p_a", "p_b"]
        );
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn test_minus_below_zero_panics() {
        let marking = Marking::single("p_a");
        let _ = marking.minus("p_a", 2);
    }

    #[test]
    fn test_deserialization_drops_zero_counts() {
        let from_wire: Marking = serde_json::from_str(r#"{"p_a": 1, "p_b": 0}"#).unwrap();
        assert_eq!(from_wire, Marking::single("p_a"));
    }

    #[test]
    fn test_display() {
        let marking = Marking::from_pairs(vec![("p_b", 1), ("p_a", 2)]);
        // BTreeMap ordering makes the rendering deterministic
        assert_eq!(marking.to_string(), "{p_a: 2, p_b: 1}");
    }
}
