use std::collections::HashMap;

use crate::petri_net::Marking;

/// Accumulated fitness-replay counters. See the module-level totals in
/// [`crate::calculate_fitness`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayCounters {
    /// Tokens inserted to force-enable a transition.
    pub missing: u64,
    /// Tokens left over places (other than the final marking) at trace end.
    pub remaining: u64,
    /// Tokens ever placed.
    pub produced: u64,
    /// Tokens ever removed.
    pub consumed: u64,
}

impl ReplayCounters {
    /// Component-wise sum.
    pub fn combine(&self, other: &ReplayCounters) -> ReplayCounters {
        ReplayCounters {
            missing: self.missing + other.missing,
            remaining: self.remaining + other.remaining,
            produced: self.produced + other.produced,
            consumed: self.consumed + other.consumed,
        }
    }

    /// Adds `other` into `self` in place.
    pub fn add_assign(&mut self, other: &ReplayCounters) {
        *self = self.combine(other);
    }
}

/// Accumulated precision-replay counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrecisionCounters {
    /// Visible activities eventually-enabled at a point that the log does
    /// not actually continue with there.
    pub escaping_edges: u64,
    /// Visible activities eventually-enabled, summed across all points.
    pub allowed_tasks: u64,
}

impl PrecisionCounters {
    /// Component-wise sum.
    pub fn combine(&self, other: &PrecisionCounters) -> PrecisionCounters {
        PrecisionCounters {
            escaping_edges: self.escaping_edges + other.escaping_edges,
            allowed_tasks: self.allowed_tasks + other.allowed_tasks,
        }
    }
}

/// Caches, per (marking, transition name), a previously found silent
/// firing sequence that enables that transition. Shared across traces: the
/// same enabling problem recurs constantly on a real log.
#[derive(Debug, Clone, Default)]
pub struct ActivityCache {
    entries: HashMap<(Marking, String), Vec<crate::petri_net::TransitionID>>,
}

impl ActivityCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a previously found enabling sequence.
    pub fn lookup(
        &self,
        marking: &Marking,
        transition_name: &str,
    ) -> Option<&Vec<crate::petri_net::TransitionID>> {
        self.entries.get(&(marking.clone(), transition_name.to_string()))
    }

    /// Records a found enabling sequence.
    pub fn insert(
        &mut self,
        marking: Marking,
        transition_name: impl Into<String>,
        sequence: Vec<crate::petri_net::TransitionID>,
    ) {
        self.entries.insert((marking, transition_name.into()), sequence);
    }
}

/// Caches, per marking, the set of visible activity names eventually
/// enabled from it (used by precision accounting).
#[derive(Debug, Clone, Default)]
pub struct AllowedTasksCache {
    entries: HashMap<Marking, std::collections::HashSet<String>>,
}

impl AllowedTasksCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached set for `marking`, computing and storing it via
    /// `compute` on a miss.
    pub fn get_or_compute(
        &mut self,
        marking: &Marking,
        compute: impl FnOnce() -> std::collections::HashSet<String>,
    ) -> std::collections::HashSet<String> {
        if let Some(cached) = self.entries.get(marking) {
            return cached.clone();
        }
        let computed = compute();
        self.entries.insert(marking.clone(), computed.clone());
        computed
    }
}

/// A trie over comma-joined activity prefixes, storing the replay state
/// reached at each prefix actually observed during replay. Lookup walks
/// the trie following a trace's activities and returns the deepest node
/// with a stored entry — the longest cached prefix — stopping at the
/// first activity with no matching child, since prefixes are written in
/// left-to-right insertion order and a missing prefix implies every
/// longer one is missing too.
#[derive(Debug, Clone)]
pub struct PrefixCache {
    nodes: Vec<PrefixNode>,
    /// Prefixes whose comma-joined encoded length exceeds this are not
    /// written (kept small and frequently-hit rather than exhaustive).
    max_encoded_length: usize,
}

#[derive(Debug, Clone, Default)]
struct PrefixNode {
    children: HashMap<String, usize>,
    entry: Option<(ReplayCounters, Marking)>,
    encoded_length: usize,
}

impl PrefixCache {
    /// Creates an empty cache with the given prefix length budget.
    pub fn new(max_encoded_length: usize) -> Self {
        PrefixCache {
            nodes: vec![PrefixNode::default()],
            max_encoded_length,
        }
    }

    /// The longest cached prefix of `activities`, if any, as `(depth,
    /// counters, marking)` where `depth` is how many activities were
    /// consumed to reach it.
    pub fn longest_prefix(
        &self,
        activities: &[&str],
    ) -> Option<(usize, ReplayCounters, Marking)> {
        let mut node_idx = 0;
        let mut best: Option<(usize, ReplayCounters, Marking)> = None;
        for (depth, activity) in activities.iter().enumerate() {
            let Some(&child_idx) = self.nodes[node_idx].children.get(*activity) else {
                break;
            };
            node_idx = child_idx;
            if let Some((counters, marking)) = &self.nodes[node_idx].entry {
                best = Some((depth + 1, *counters, marking.clone()));
            }
        }
        best
    }

    /// Inserts the state reached after replaying `activities` in full,
    /// provided the encoded prefix stays within budget.
    pub fn insert(&mut self, activities: &[&str], counters: ReplayCounters, marking: Marking) {
        let encoded_length: usize = activities.iter().map(|a| a.len() + 1).sum();
        if encoded_length > self.max_encoded_length {
            return;
        }
        let mut node_idx = 0;
        for activity in activities {
            node_idx = *self.nodes[node_idx]
                .children
                .entry(activity.to_string())
                .or_insert_with(|| {
                    self.nodes.push(PrefixNode::default());
                    self.nodes.len() - 1
                });
        }
        self.nodes[node_idx].entry = Some((counters, marking));
        self.nodes[node_idx].encoded_length = encoded_length;
    }
}

/// Key into the global suffix cache: the marking the suffix started from,
/// plus the comma-joined activities of the suffix itself.
pub type SuffixKey = (Marking, String);

/// Caches, per `(marking, postfix)`, the counter deltas and resulting
/// marking from replaying that postfix starting at that marking.
#[derive(Debug, Clone, Default)]
pub struct SuffixCache {
    global: HashMap<SuffixKey, (ReplayCounters, Marking)>,
    max_postfix_len: usize,
}

impl SuffixCache {
    /// Creates an empty cache with the given postfix length budget.
    pub fn new(max_postfix_len: usize) -> Self {
        SuffixCache {
            global: HashMap::new(),
            max_postfix_len,
        }
    }

    /// Looks up a cached postfix replay.
    pub fn lookup(&self, marking: &Marking, postfix: &str) -> Option<&(ReplayCounters, Marking)> {
        self.global.get(&(marking.clone(), postfix.to_string()))
    }

    /// Starts a fresh per-trace write buffer.
    pub fn new_local(&self) -> LocalSuffixCache {
        LocalSuffixCache { entries: Vec::new() }
    }

    /// Folds a trace's local buffer into the shared cache, dropping entries
    /// whose postfix exceeds the configured budget.
    pub fn merge_local(&mut self, local: LocalSuffixCache) {
        for (key, value) in local.entries {
            if key.1.len() <= self.max_postfix_len {
                self.global.entry(key).or_insert(value);
            }
        }
    }
}

/// Per-trace suffix-cache write buffer. Every still-open entry has its
/// counters incremented and its postfix extended on every subsequent
/// firing, so each entry always correctly reflects "replay this postfix
/// from this marking".
#[derive(Debug, Clone, Default)]
pub struct LocalSuffixCache {
    entries: Vec<(SuffixKey, (ReplayCounters, Marking))>,
}

impl LocalSuffixCache {
    /// Records one fired event: extends every open entry's postfix and
    /// counters, then opens a fresh entry starting at `marking_before`.
    pub fn record_firing(
        &mut self,
        marking_before: Marking,
        activity: &str,
        delta: ReplayCounters,
        marking_after: Marking,
    ) {
        for (key, value) in &mut self.entries {
            if key.1.is_empty() {
                key.1 = activity.to_string();
            } else {
                key.1.push(',');
                key.1.push_str(activity);
            }
            value.0 = value.0.combine(&delta);
            value.1 = marking_after.clone();
        }
        self.entries.push((
            (marking_before, activity.to_string()),
            (delta, marking_after),
        ));
    }
}
