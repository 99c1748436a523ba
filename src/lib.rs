#![warn(missing_debug_implementations, rust_2018_idioms)]

///
/// Event logs: traces, events, attributes, and activity-sequence
/// deduplication.
///
pub mod event_log {
    /// Collapses an event log into unique activity sequences with
    /// multiplicities.
    pub mod activity_projection;
    /// Reserved attribute keys.
    pub mod constants;
    /// [`EventLog`] struct and sub-structs.
    pub mod event_log_struct;

    pub use activity_projection::EventLogActivityProjection;
    pub use event_log_struct::{
        Attribute, AttributeAddable, AttributeValue, Attributes, Event, EventLog,
        EventLogClassifier, Trace,
    };
}

///
/// Petri nets: places, transitions, arcs, and the value-semantics
/// [`Marking`] type used throughout as a cache key.
///
pub mod petri_net {
    /// Value-semantics token snapshot.
    pub mod marking;
    /// [`PetriNet`] struct and its mutator operations.
    pub mod petri_net_struct;

    pub use marking::Marking;
    pub use petri_net_struct::{
        Arc, ArcType, NetError, PetriNet, Place, PlaceID, Transition, TransitionID,
    };
}

///
/// Conformance checking: token-based replay extended with silent
/// transitions, and the cache hierarchy that makes it fast on real logs.
///
pub mod conformance {
    /// Per-marking memoized caches plus the counter types they store.
    pub mod caches;
    /// Bounded allowed-tasks accounting for precision.
    pub mod precision;
    /// Per-event replay state machine, all four caching modes.
    pub mod replay;
    /// Silent-transition reachability planning.
    pub mod silent_planner;
    /// Top-level `calculate_fitness` / `calculate_precision` entry points.
    pub mod token_based_replay;

    pub use replay::ReplayConfig;
    pub use token_based_replay::{calculate_fitness, calculate_precision};
}

#[doc(inline)]
pub use conformance::{calculate_fitness, calculate_precision};
#[doc(inline)]
pub use event_log::EventLog;
#[doc(inline)]
pub use petri_net::PetriNet;

///
/// Serializes a [`PetriNet`] as a JSON [`String`].
///
pub fn petrinet_to_json(net: &PetriNet) -> String {
    serde_json::to_string(net).expect("PetriNet always serializes")
}

///
/// Deserializes a [`PetriNet`] from a JSON [`String`].
///
pub fn json_to_petrinet(net_json: &str) -> Result<PetriNet, serde_json::Error> {
    serde_json::from_str(net_json)
}
