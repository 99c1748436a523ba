use serde::{Deserialize, Serialize};
use std::hash::Hash;

use super::petri_net_struct::PlaceID;

/// A token-count snapshot over places, stored as a sorted list of non-zero
/// entries so it can be hashed and compared by value (used as a cache key
/// throughout the replay and silent-planner caches).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Marking {
    entries: Vec<(PlaceID, u64)>,
}

impl Marking {
    /// Creates an empty marking (zero tokens everywhere).
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens on `place`, or 0 if the place holds none.
    pub fn tokens_at(&self, place: PlaceID) -> u64 {
        self.entries
            .binary_search_by_key(&place, |(p, _)| *p)
            .map(|idx| self.entries[idx].1)
            .unwrap_or(0)
    }

    /// Overwrites the token count of `place`. A count of 0 removes the entry.
    pub fn set(&mut self, place: PlaceID, count: u64) {
        match self.entries.binary_search_by_key(&place, |(p, _)| *p) {
            Ok(idx) => {
                if count == 0 {
                    self.entries.remove(idx);
                } else {
                    self.entries[idx].1 = count;
                }
            }
            Err(idx) => {
                if count != 0 {
                    self.entries.insert(idx, (place, count));
                }
            }
        }
    }

    /// Adds (or removes, for negative `delta`) tokens on `place`. Returns
    /// `None` if the result would be negative.
    #[must_use]
    pub fn add_tokens(&mut self, place: PlaceID, delta: i64) -> Option<()> {
        let current = self.tokens_at(place) as i64;
        let updated = current + delta;
        if updated < 0 {
            return None;
        }
        self.set(place, updated as u64);
        Some(())
    }

    /// True iff `self` dominates `other` everywhere: every place with
    /// non-zero tokens in `other` holds at least as many in `self`.
    pub fn contains(&self, other: &Marking) -> bool {
        other
            .entries
            .iter()
            .all(|(place, count)| self.tokens_at(*place) >= *count)
    }

    /// Sum of tokens across all places.
    pub fn total_tokens(&self) -> u64 {
        self.entries.iter().map(|(_, c)| *c).sum()
    }

    /// Iterates the non-zero (place, count) entries in place-id order.
    pub fn iter(&self) -> impl Iterator<Item = (PlaceID, u64)> + '_ {
        self.entries.iter().copied()
    }

    /// True iff no place holds any tokens.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(PlaceID, u64)> for Marking {
    fn from_iter<I: IntoIterator<Item = (PlaceID, u64)>>(iter: I) -> Self {
        let mut m = Marking::new();
        for (place, count) in iter {
            // Accumulate rather than overwrite: callers may supply duplicate
            // place entries (e.g. when merging two markings place by place).
            let existing = m.tokens_at(place);
            m.set(place, existing + count);
        }
        m
    }
}
