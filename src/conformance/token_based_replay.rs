use crate::event_log::{EventLog, EventLogActivityProjection};
use crate::petri_net::PetriNet;

use super::caches::{ActivityCache, AllowedTasksCache, PrecisionCounters, ReplayCounters};
use super::precision::{compute_prefix_next_activities, replay_trace_precision};
use super::replay::{replay_trace, ReplayConfig};
use super::silent_planner::{build_shortest_path_table, DeficitSurplusPlanner};

/// Computes the fitness of `net` against `log` via token-based replay
/// extended with silent transitions. `prefix_caching`/`suffix_caching`
/// select one of the four replay modes; all four agree on the result
/// (see the cache-neutrality test below), they differ only in how much
/// redundant work across traces is amortized.
///
/// With the `parallel` feature enabled and both caching flags left off,
/// distinct trace signatures are replayed across a `rayon` pool instead
/// (see [`replay_all_traces_parallel`]); prefix/suffix caching requests
/// always fall back to the sequential path, since those caches are
/// write-sequential across traces by construction.
pub fn calculate_fitness(
    log: &EventLog,
    net: &PetriNet,
    prefix_caching: bool,
    suffix_caching: bool,
) -> f64 {
    let config = ReplayConfig::default();
    let spt = build_shortest_path_table(net, config.shortest_path_depth);
    let planner = DeficitSurplusPlanner;
    let projection = EventLogActivityProjection::from_event_log(log);

    #[cfg(feature = "parallel")]
    {
        if !prefix_caching && !suffix_caching {
            return compute_fitness(&replay_all_traces_parallel(&projection, net, &spt, &config));
        }
    }

    let mut activity_cache = ActivityCache::new();
    let mut prefix_cache = prefix_caching.then(|| super::caches::PrefixCache::new(config.max_prefix_length));
    let mut suffix_cache = suffix_caching.then(|| super::caches::SuffixCache::new(config.max_suffix_length));

    let mut totals = ReplayCounters::default();

    for (signature, count) in &projection.traces {
        let activities = projection.names(signature);
        let mut net_copy = net.clone();
        let counters = replay_trace(
            &mut net_copy,
            &activities,
            &spt,
            &planner,
            &mut activity_cache,
            &config,
            prefix_cache.as_mut(),
            suffix_cache.as_mut(),
        )
        .expect("every event activity must name a known transition");

        totals.produced += counters.produced * count;
        totals.consumed += counters.consumed * count;
        totals.missing += counters.missing * count;
        totals.remaining += counters.remaining * count;
    }

    compute_fitness(&totals)
}

fn compute_fitness(totals: &ReplayCounters) -> f64 {
    let missing_term = if totals.consumed == 0 {
        0.0
    } else {
        1.0 - totals.missing as f64 / totals.consumed as f64
    };
    let remaining_term = if totals.produced == 0 {
        0.0
    } else {
        1.0 - totals.remaining as f64 / totals.produced as f64
    };
    0.5 * missing_term + 0.5 * remaining_term
}

/// Replays every distinct trace signature across a `rayon` pool, sharding
/// choice (a) from the spec's parallelisation rule: each worker gets its
/// own cloned net and a private [`ActivityCache`], and the prefix/suffix
/// caches are simply not used here, only the read-only shortest-path
/// table is shared across workers.
#[cfg(feature = "parallel")]
fn replay_all_traces_parallel(
    projection: &EventLogActivityProjection,
    net: &PetriNet,
    spt: &super::silent_planner::ShortestPathTable,
    config: &ReplayConfig,
) -> ReplayCounters {
    use rayon::prelude::*;

    projection
        .traces
        .par_iter()
        .map(|(signature, count)| {
            let activities = projection.names(signature);
            let mut net_copy = net.clone();
            let planner = DeficitSurplusPlanner;
            let mut activity_cache = ActivityCache::new();
            let counters = replay_trace(
                &mut net_copy,
                &activities,
                spt,
                &planner,
                &mut activity_cache,
                config,
                None,
                None,
            )
            .expect("every event activity must name a known transition");

            ReplayCounters {
                missing: counters.missing * count,
                remaining: counters.remaining * count,
                produced: counters.produced * count,
                consumed: counters.consumed * count,
            }
        })
        .reduce(ReplayCounters::default, |a, b| a.combine(&b))
}

/// Computes the precision of `net` against `log`: one minus the ratio of
/// escaping edges to allowed tasks, accumulated while replaying every
/// unique trace.
pub fn calculate_precision(log: &EventLog, net: &PetriNet) -> f64 {
    let config = ReplayConfig::default();
    let spt = build_shortest_path_table(net, config.shortest_path_depth);
    let planner = DeficitSurplusPlanner;
    let projection = EventLogActivityProjection::from_event_log(log);
    let prefix_next_activities = compute_prefix_next_activities(log);

    let mut activity_cache = ActivityCache::new();
    let mut allowed_tasks_cache = AllowedTasksCache::new();
    let mut totals = PrecisionCounters::default();

    for (signature, count) in &projection.traces {
        let activities = projection.names(signature);
        let mut net_copy = net.clone();
        let counters = replay_trace_precision(
            &mut net_copy,
            &activities,
            &prefix_next_activities,
            &spt,
            &planner,
            &mut activity_cache,
            &mut allowed_tasks_cache,
            &config,
        )
        .expect("every event activity must name a known transition");

        totals.escaping_edges += counters.escaping_edges * count;
        totals.allowed_tasks += counters.allowed_tasks * count;
    }

    if totals.allowed_tasks == 0 {
        0.0
    } else {
        1.0 - totals.escaping_edges as f64 / totals.allowed_tasks as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::{Event, Trace};
    use crate::petri_net::{ArcType, Marking};

    fn trace_of(activities: &[&str]) -> Trace {
        let mut trace = Trace::new();
        for a in activities {
            trace.events.push(Event::new(*a));
        }
        trace
    }

    fn log_of(traces: &[&[&str]]) -> EventLog {
        let mut log = EventLog::new();
        for acts in traces {
            log.traces.push(trace_of(acts));
        }
        log
    }

    /// Scenario 1: `start -> A -> p1 -> B -> p2 -> C -> end`, three
    /// identical `ABC` traces. A perfectly fitting, fully precise model.
    #[test]
    fn scenario_simple_sequence_fits_and_is_precise() {
        let mut net = PetriNet::new();
        let start = net.add_place("start");
        let p1 = net.add_place("p1");
        let p2 = net.add_place("p2");
        let end = net.add_place("end");
        let a = net.add_transition("A");
        let b = net.add_transition("B");
        let c = net.add_transition("C");
        net.add_arc(ArcType::place_to_transition(start, a), None);
        net.add_arc(ArcType::transition_to_place(a, p1), None);
        net.add_arc(ArcType::place_to_transition(p1, b), None);
        net.add_arc(ArcType::transition_to_place(b, p2), None);
        net.add_arc(ArcType::place_to_transition(p2, c), None);
        net.add_arc(ArcType::transition_to_place(c, end), None);

        let mut initial = Marking::new();
        initial.set(start, 1);
        net.initial_marking = Some(initial);
        let mut fin = Marking::new();
        fin.set(end, 1);
        net.final_marking = Some(fin);

        let log = log_of(&[&["A", "B", "C"], &["A", "B", "C"], &["A", "B", "C"]]);

        for (prefix, suffix) in [(false, false), (true, false), (false, true), (true, true)] {
            let fitness = calculate_fitness(&log, &net, prefix, suffix);
            assert!((fitness - 1.0).abs() < 1e-9, "mode ({prefix},{suffix}) fitness={fitness}");
        }
        assert!((calculate_precision(&log, &net) - 1.0).abs() < 1e-9);
    }

    /// Scenario 3: `start -> A -> p1 -> tau_1 -> p2 -> C -> end`; log
    /// skips the silent step entirely, as it must.
    #[test]
    fn scenario_silent_tail_is_transparently_bridged() {
        let mut net = PetriNet::new();
        let start = net.add_place("start");
        let p1 = net.add_place("p1");
        let p2 = net.add_place("p2");
        let end = net.add_place("end");
        let a = net.add_transition("A");
        let tau = net.add_transition("tau_1");
        let c = net.add_transition("C");
        net.add_arc(ArcType::place_to_transition(start, a), None);
        net.add_arc(ArcType::transition_to_place(a, p1), None);
        net.add_arc(ArcType::place_to_transition(p1, tau), None);
        net.add_arc(ArcType::transition_to_place(tau, p2), None);
        net.add_arc(ArcType::place_to_transition(p2, c), None);
        net.add_arc(ArcType::transition_to_place(c, end), None);

        let mut initial = Marking::new();
        initial.set(start, 1);
        net.initial_marking = Some(initial);
        let mut fin = Marking::new();
        fin.set(end, 1);
        net.final_marking = Some(fin);

        let log = log_of(&[&["A", "C"]]);
        let fitness = calculate_fitness(&log, &net, false, false);
        assert!((fitness - 1.0).abs() < 1e-9);
    }

    /// Scenario 4: `start -> tau_1 -> p1`, then a choice of `A`/`B` into
    /// `p2`, then `p2 -> tau_2 -> end`. Trace `AB` fires both branches,
    /// which the model only allows one of; exactly one missing token is
    /// needed, yielding fitness 0.8.
    #[test]
    fn scenario_silent_before_end_yields_point_eight_fitness() {
        let mut net = PetriNet::new();
        let start = net.add_place("start");
        let p1 = net.add_place("p1");
        let p2 = net.add_place("p2");
        let end = net.add_place("end");
        let tau1 = net.add_transition("tau_1");
        let a = net.add_transition("A");
        let b = net.add_transition("B");
        let tau2 = net.add_transition("tau_2");
        net.add_arc(ArcType::place_to_transition(start, tau1), None);
        net.add_arc(ArcType::transition_to_place(tau1, p1), None);
        net.add_arc(ArcType::place_to_transition(p1, a), None);
        net.add_arc(ArcType::transition_to_place(a, p2), None);
        net.add_arc(ArcType::place_to_transition(p1, b), None);
        net.add_arc(ArcType::transition_to_place(b, p2), None);
        net.add_arc(ArcType::place_to_transition(p2, tau2), None);
        net.add_arc(ArcType::transition_to_place(tau2, end), None);

        let mut initial = Marking::new();
        initial.set(start, 1);
        net.initial_marking = Some(initial);
        let mut fin = Marking::new();
        fin.set(end, 1);
        net.final_marking = Some(fin);

        let log = log_of(&[&["A", "B"]]);
        let fitness = calculate_fitness(&log, &net, false, false);
        assert!((fitness - 0.8).abs() < 1e-9, "fitness={fitness}");
    }

    #[test]
    fn duplicate_traces_do_not_change_fitness() {
        let mut net = PetriNet::new();
        let start = net.add_place("start");
        let end = net.add_place("end");
        let a = net.add_transition("A");
        net.add_arc(ArcType::place_to_transition(start, a), None);
        net.add_arc(ArcType::transition_to_place(a, end), None);
        let mut initial = Marking::new();
        initial.set(start, 1);
        net.initial_marking = Some(initial);
        let mut fin = Marking::new();
        fin.set(end, 1);
        net.final_marking = Some(fin);

        let small_log = log_of(&[&["A"]]);
        let big_log = log_of(&[&["A"], &["A"], &["A"]]);

        assert_eq!(
            calculate_fitness(&small_log, &net, false, false),
            calculate_fitness(&big_log, &net, false, false)
        );
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_entry_point_agrees_with_the_helper_it_wraps() {
        let mut net = PetriNet::new();
        let start = net.add_place("start");
        let p1 = net.add_place("p1");
        let p2 = net.add_place("p2");
        let end = net.add_place("end");
        let a = net.add_transition("A");
        let b = net.add_transition("B");
        let c = net.add_transition("C");
        net.add_arc(ArcType::place_to_transition(start, a), None);
        net.add_arc(ArcType::transition_to_place(a, p1), None);
        net.add_arc(ArcType::place_to_transition(p1, b), None);
        net.add_arc(ArcType::transition_to_place(b, p2), None);
        net.add_arc(ArcType::place_to_transition(p2, c), None);
        net.add_arc(ArcType::transition_to_place(c, end), None);

        let mut initial = Marking::new();
        initial.set(start, 1);
        net.initial_marking = Some(initial);
        let mut fin = Marking::new();
        fin.set(end, 1);
        net.final_marking = Some(fin);

        let log = log_of(&[&["A", "B", "C"], &["A", "B", "C"], &["A", "B"]]);

        let serial = calculate_fitness(&log, &net, false, false);
        let projection = EventLogActivityProjection::from_event_log(&log);
        let spt = build_shortest_path_table(&net, 8);
        let parallel = replay_all_traces_parallel(&projection, &net, &spt, &ReplayConfig::default());
        assert!((serial - compute_fitness(&parallel)).abs() < 1e-9);
    }
}
