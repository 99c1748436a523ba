use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::marking::Marking;

/// Identifies the literal-string prefix that marks a transition as silent.
pub const SILENT_PREFIX: &str = "tau";

/// Identity of a [`Place`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlaceID(pub Uuid);

/// Identity of a [`Transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransitionID(pub Uuid);

/// A named token-holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    /// Unique identity.
    pub id: PlaceID,
    /// Human-readable name, not required to be unique.
    pub name: String,
}

/// A named arc-endpoint. Silent iff its name begins with [`SILENT_PREFIX`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Unique identity.
    pub id: TransitionID,
    /// Activity name; the sole discriminator of silence.
    pub name: String,
}

impl Transition {
    /// True iff this transition has no corresponding log event.
    pub fn is_silent(&self) -> bool {
        self.name.starts_with(SILENT_PREFIX)
    }
}

/// The two directions an [`Arc`] can connect a place and a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArcType {
    /// Consumption arc: place -> transition.
    PlaceToTransition { from: PlaceID, to: TransitionID },
    /// Production arc: transition -> place.
    TransitionToPlace { from: TransitionID, to: PlaceID },
}

impl ArcType {
    /// Builds a consumption arc (place -> transition).
    pub fn place_to_transition(from: PlaceID, to: TransitionID) -> Self {
        ArcType::PlaceToTransition { from, to }
    }

    /// Builds a production arc (transition -> place).
    pub fn transition_to_place(from: TransitionID, to: PlaceID) -> Self {
        ArcType::TransitionToPlace { from, to }
    }
}

/// A directed weighted edge between a place and a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arc {
    /// Direction and endpoints.
    pub arc_type: ArcType,
    /// Number of tokens consumed/produced per firing; at least 1.
    pub weight: u32,
}

/// Errors raised by the net mutator that abort replay of the current trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    /// An event referenced an activity with no matching transition.
    UnknownTransition(String),
    /// A firing would have removed more tokens than a place holds.
    TokenUnderflow(PlaceID),
}

impl std::fmt::Display for NetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetError::UnknownTransition(name) => write!(f, "unknown transition: {name}"),
            NetError::TokenUnderflow(place) => write!(f, "token underflow on place {place:?}"),
        }
    }
}

impl std::error::Error for NetError {}

/// A Petri net plus the single mutable marking the replay engine walks
/// forward. `initial_marking` and `final_marking` are the net's fixed
/// configuration; `current_marking` is working state, reset at the start
/// of every trace replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PetriNet {
    /// All places, keyed by id for O(1) lookup.
    pub places: std::collections::HashMap<PlaceID, Place>,
    /// All transitions, keyed by id for O(1) lookup.
    pub transitions: std::collections::HashMap<TransitionID, Transition>,
    /// All arcs. Pre/postset queries scan this list linearly, matching the
    /// unindexed style of the net this crate's mutator is descended from.
    pub arcs: Vec<Arc>,
    /// Marking the net starts every trace replay from.
    pub initial_marking: Option<Marking>,
    /// Marking a trace is expected to end in.
    pub final_marking: Option<Marking>,
    #[serde(skip)]
    current_marking: Marking,
}

impl PetriNet {
    /// Creates an empty net.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a place and returns its fresh id.
    pub fn add_place(&mut self, name: impl Into<String>) -> PlaceID {
        let id = PlaceID(Uuid::new_v4());
        self.places.insert(
            id,
            Place {
                id,
                name: name.into(),
            },
        );
        id
    }

    /// Adds a transition and returns its fresh id.
    pub fn add_transition(&mut self, name: impl Into<String>) -> TransitionID {
        let id = TransitionID(Uuid::new_v4());
        self.transitions.insert(
            id,
            Transition {
                id,
                name: name.into(),
            },
        );
        id
    }

    /// Adds an arc. `weight` defaults to 1 if `None`.
    pub fn add_arc(&mut self, arc_type: ArcType, weight: Option<u32>) {
        self.arcs.push(Arc {
            arc_type,
            weight: weight.unwrap_or(1),
        });
    }

    /// Finds the (first) transition with the given name.
    pub fn transition_by_name(&self, name: &str) -> Option<TransitionID> {
        self.transitions
            .values()
            .find(|t| t.name == name)
            .map(|t| t.id)
    }

    /// Places with a consumption arc into `t`, each paired with the arc weight.
    pub fn preset_of_transition(&self, t: TransitionID) -> Vec<(PlaceID, u32)> {
        self.arcs
            .iter()
            .filter_map(|arc| match arc.arc_type {
                ArcType::PlaceToTransition { from, to } if to == t => Some((from, arc.weight)),
                _ => None,
            })
            .collect()
    }

    /// Places with a production arc out of `t`, each paired with the arc weight.
    pub fn postset_of_transition(&self, t: TransitionID) -> Vec<(PlaceID, u32)> {
        self.arcs
            .iter()
            .filter_map(|arc| match arc.arc_type {
                ArcType::TransitionToPlace { from, to } if from == t => Some((to, arc.weight)),
                _ => None,
            })
            .collect()
    }

    /// Transitions with a consumption arc out of `p`.
    pub fn postset_of_place(&self, p: PlaceID) -> Vec<TransitionID> {
        self.arcs
            .iter()
            .filter_map(|arc| match arc.arc_type {
                ArcType::PlaceToTransition { from, to } if from == p => Some(to),
                _ => None,
            })
            .collect()
    }

    /// Transitions with a production arc into `p`.
    pub fn preset_of_place(&self, p: PlaceID) -> Vec<TransitionID> {
        self.arcs
            .iter()
            .filter_map(|arc| match arc.arc_type {
                ArcType::TransitionToPlace { from, to } if to == p => Some(from),
                _ => None,
            })
            .collect()
    }

    /// The smallest marking that enables `t`, treating every preset arc as
    /// unit weight (used as the silent planner's unweighted goal abstraction).
    pub fn marking_enabling(&self, t: TransitionID) -> Marking {
        self.preset_of_transition(t)
            .into_iter()
            .map(|(p, _)| (p, 1))
            .collect()
    }

    /// Current working marking.
    pub fn current_marking(&self) -> Marking {
        self.current_marking.clone()
    }

    /// Overwrites the current working marking.
    pub fn set_marking(&mut self, marking: Marking) {
        self.current_marking = marking;
    }

    /// True iff every consumption arc of `t` is satisfied by the current marking.
    pub fn can_fire(&self, t: TransitionID) -> bool {
        self.preset_of_transition(t)
            .into_iter()
            .all(|(p, w)| self.current_marking.tokens_at(p) >= w as u64)
    }

    /// Fires `t`, consuming/producing along its arcs and accumulating the
    /// consumed/produced totals. Fails if `t` is not currently fireable.
    pub fn fire(
        &mut self,
        t: TransitionID,
        consumed: &mut u64,
        produced: &mut u64,
    ) -> Result<(), NetError> {
        if !self.can_fire(t) {
            let (first_short, _) = self
                .preset_of_transition(t)
                .into_iter()
                .find(|(p, w)| self.current_marking.tokens_at(*p) < *w as u64)
                .unwrap_or((PlaceID(Uuid::nil()), 0));
            return Err(NetError::TokenUnderflow(first_short));
        }
        for (p, w) in self.preset_of_transition(t) {
            self.current_marking
                .add_tokens(p, -(w as i64))
                .expect("can_fire guaranteed sufficient tokens");
            *consumed += w as u64;
        }
        for (p, w) in self.postset_of_transition(t) {
            self.current_marking
                .add_tokens(p, w as i64)
                .expect("token addition never underflows");
            *produced += w as u64;
        }
        Ok(())
    }

    /// Fires a full sequence, failing (and leaving the marking at the point
    /// of failure) at the first transition that cannot fire.
    pub fn fire_sequence(
        &mut self,
        ts: &[TransitionID],
        consumed: &mut u64,
        produced: &mut u64,
    ) -> Result<(), NetError> {
        for t in ts {
            self.fire(*t, consumed, produced)?;
        }
        Ok(())
    }

    /// Fires as much of the sequence as is enabled, stopping silently at the
    /// first blocked transition. Returns how many transitions fired.
    pub fn fire_sequence_partial(
        &mut self,
        ts: &[TransitionID],
        consumed: &mut u64,
        produced: &mut u64,
    ) -> usize {
        let mut fired = 0;
        for t in ts {
            if self.fire(*t, consumed, produced).is_err() {
                break;
            }
            fired += 1;
        }
        fired
    }

    /// Every visible transition name directly enabled, or enabled after
    /// firing zero or more silent transitions, starting from `from` —
    /// without touching the net's own current marking.
    pub fn visibly_enabled_eventually(&self, from: &Marking) -> HashSet<String> {
        let mut result = HashSet::new();
        let mut visited: HashSet<(TransitionID, Marking)> = HashSet::new();
        let mut queue: Vec<(TransitionID, Marking)> = self
            .transitions
            .keys()
            .copied()
            .filter(|t| self.is_enabled_in(*t, from))
            .map(|t| (t, from.clone()))
            .collect();

        while let Some((t, marking)) = queue.pop() {
            if !visited.insert((t, marking.clone())) {
                continue;
            }
            let transition = &self.transitions[&t];
            if !transition.is_silent() {
                result.insert(transition.name.clone());
                continue;
            }
            if !self.is_enabled_in(t, &marking) {
                continue;
            }
            let next = self.simulate_fire(t, &marking);
            for candidate in self.transitions.keys().copied() {
                if self.is_enabled_in(candidate, &next) {
                    queue.push((candidate, next.clone()));
                }
            }
        }
        result
    }

    /// True iff `t` is fireable from `marking` (not the net's current marking).
    pub fn is_enabled_in(&self, t: TransitionID, marking: &Marking) -> bool {
        self.preset_of_transition(t)
            .into_iter()
            .all(|(p, w)| marking.tokens_at(p) >= w as u64)
    }

    /// Marking resulting from firing `t` from `marking`, without mutating `self`.
    pub fn simulate_fire(&self, t: TransitionID, marking: &Marking) -> Marking {
        let mut next = marking.clone();
        for (p, w) in self.preset_of_transition(t) {
            next.add_tokens(p, -(w as i64))
                .expect("enabled_in guaranteed sufficient tokens");
        }
        for (p, w) in self.postset_of_transition(t) {
            next.add_tokens(p, w as i64)
                .expect("token addition never underflows");
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_sequential_net() -> (PetriNet, PlaceID, PlaceID, PlaceID, TransitionID, TransitionID) {
        let mut net = PetriNet::new();
        let start = net.add_place("start");
        let mid = net.add_place("mid");
        let end = net.add_place("end");
        let a = net.add_transition("a");
        let b = net.add_transition("b");
        net.add_arc(ArcType::place_to_transition(start, a), None);
        net.add_arc(ArcType::transition_to_place(a, mid), None);
        net.add_arc(ArcType::place_to_transition(mid, b), None);
        net.add_arc(ArcType::transition_to_place(b, end), None);
        (net, start, mid, end, a, b)
    }

    #[test]
    fn can_fire_requires_preset_tokens() {
        let (mut net, start, _, _, a, _) = small_sequential_net();
        let mut initial = Marking::new();
        initial.set(start, 1);
        net.set_marking(initial);
        assert!(net.can_fire(a));
    }

    #[test]
    fn fire_moves_tokens_and_tracks_counters() {
        let (mut net, start, mid, _, a, _) = small_sequential_net();
        let mut initial = Marking::new();
        initial.set(start, 1);
        net.set_marking(initial);

        let mut consumed = 0;
        let mut produced = 0;
        net.fire(a, &mut consumed, &mut produced).unwrap();
        assert_eq!(consumed, 1);
        assert_eq!(produced, 1);
        assert_eq!(net.current_marking().tokens_at(start), 0);
        assert_eq!(net.current_marking().tokens_at(mid), 1);
    }

    #[test]
    fn fire_without_tokens_is_rejected() {
        let (mut net, _, _, _, a, _) = small_sequential_net();
        let mut consumed = 0;
        let mut produced = 0;
        assert!(net.fire(a, &mut consumed, &mut produced).is_err());
    }

    #[test]
    fn silent_transition_detection() {
        let mut net = PetriNet::new();
        let tau = net.add_transition("tau_1");
        let visible = net.add_transition("A");
        assert!(net.transitions[&tau].is_silent());
        assert!(!net.transitions[&visible].is_silent());
    }

    #[test]
    fn visibly_enabled_eventually_crosses_silent_transitions() {
        let mut net = PetriNet::new();
        let p1 = net.add_place("p1");
        let p2 = net.add_place("p2");
        let tau = net.add_transition("tau_1");
        let c = net.add_transition("C");
        net.add_arc(ArcType::place_to_transition(p1, tau), None);
        net.add_arc(ArcType::transition_to_place(tau, p2), None);
        net.add_arc(ArcType::place_to_transition(p2, c), None);

        let mut from = Marking::new();
        from.set(p1, 1);
        let enabled = net.visibly_enabled_eventually(&from);
        assert_eq!(enabled, HashSet::from(["C".to_string()]));
    }
}
