use crate::petri_net::{NetError, PetriNet};

use super::caches::{ActivityCache, PrefixCache, ReplayCounters, SuffixCache};
use super::silent_planner::{ShortestPathTable, SilentPlanner};

/// Depth/iteration/length knobs shared by the replay engine and the silent
/// planner. Grouped into one struct (mirroring how XES import options are
/// grouped) rather than left as scattered magic numbers.
#[derive(Debug, Clone, Copy)]
pub struct ReplayConfig {
    /// Bound on the recursive DFS building the silent shortest-path table.
    pub shortest_path_depth: usize,
    /// Bound on deficit/surplus planner iterations per enabling attempt.
    pub planner_max_iterations: usize,
    /// Bound on the alternative hypergraph planner's search depth.
    pub hypergraph_max_depth: usize,
    /// Prefixes whose encoded (comma-joined) length exceeds this are not cached.
    pub max_prefix_length: usize,
    /// Postfixes whose encoded length exceeds this are not cached.
    pub max_suffix_length: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig {
            shortest_path_depth: 8,
            planner_max_iterations: 10,
            hypergraph_max_depth: 3,
            max_prefix_length: 10_000,
            max_suffix_length: 5,
        }
    }
}

/// Replays one trace (given as its activity sequence) against `net`,
/// starting from its initial marking, optionally fast-forwarding through a
/// [`PrefixCache`] and/or short-circuiting through a [`SuffixCache`].
/// Implements all four fitness-replay modes from a single inner loop,
/// since caching is orthogonal to the enabling/firing logic itself.
pub fn replay_trace(
    net: &mut PetriNet,
    activities: &[&str],
    spt: &ShortestPathTable,
    planner: &dyn SilentPlanner,
    activity_cache: &mut ActivityCache,
    config: &ReplayConfig,
    mut prefix_cache: Option<&mut PrefixCache>,
    mut suffix_cache: Option<&mut SuffixCache>,
) -> Result<ReplayCounters, NetError> {
    let initial_marking = net.initial_marking.clone().unwrap_or_default();
    let final_marking = net.final_marking.clone().unwrap_or_default();

    let mut counters = ReplayCounters {
        produced: initial_marking.total_tokens(),
        ..Default::default()
    };
    net.set_marking(initial_marking);

    let mut index = 0;
    if let Some(cache) = prefix_cache.as_deref() {
        if let Some((depth, cached_counters, marking)) = cache.longest_prefix(activities) {
            counters = cached_counters;
            net.set_marking(marking);
            index = depth;
        }
    }

    let mut local_suffix = suffix_cache.as_deref().map(|cache| cache.new_local());

    while index < activities.len() {
        if let Some(cache) = suffix_cache.as_deref() {
            let postfix = activities[index..].join(",");
            if let Some((delta, marking_after)) = cache.lookup(&net.current_marking(), &postfix) {
                counters.add_assign(delta);
                net.set_marking(marking_after.clone());
                break;
            }
        }

        let activity = activities[index];
        let t = net
            .transition_by_name(activity)
            .ok_or_else(|| NetError::UnknownTransition(activity.to_string()))?;

        let counters_before_step = counters;
        let marking_before = net.current_marking();

        if !net.can_fire(t) {
            let cached = activity_cache.lookup(&marking_before, activity).cloned();
            let sequence = match cached {
                Some(seq) => seq,
                None => {
                    let (ok, seq) = planner.enable(net, spt, t, config.planner_max_iterations);
                    if ok {
                        activity_cache.insert(marking_before.clone(), activity, seq.clone());
                    }
                    seq
                }
            };
            let (mut c, mut p) = (0, 0);
            net.fire_sequence_partial(&sequence, &mut c, &mut p);
            counters.consumed += c;
            counters.produced += p;
        }

        if !net.can_fire(t) {
            let mut marking = net.current_marking();
            for (place, _) in net.preset_of_transition(t) {
                if marking.tokens_at(place) == 0 {
                    marking.add_tokens(place, 1).expect("adding a token never underflows");
                    counters.missing += 1;
                }
            }
            net.set_marking(marking);
        }

        let (mut c, mut p) = (0, 0);
        net.fire(t, &mut c, &mut p)
            .expect("preset places were just topped up to enable this transition");
        counters.consumed += c;
        counters.produced += p;

        let marking_after = net.current_marking();
        let step_delta = ReplayCounters {
            missing: counters.missing - counters_before_step.missing,
            remaining: counters.remaining - counters_before_step.remaining,
            produced: counters.produced - counters_before_step.produced,
            consumed: counters.consumed - counters_before_step.consumed,
        };

        if let Some(local) = local_suffix.as_mut() {
            local.record_firing(marking_before, activity, step_delta, marking_after.clone());
        }
        if let Some(cache) = prefix_cache.as_deref_mut() {
            cache.insert(&activities[..=index], counters, marking_after);
        }

        index += 1;
    }

    if let (Some(cache), Some(local)) = (suffix_cache.as_deref_mut(), local_suffix) {
        cache.merge_local(local);
    }

    counters.consumed += final_marking.total_tokens();
    let (_, sequence) = planner.reach_final(net, spt, &final_marking, config.planner_max_iterations);
    if !sequence.is_empty() {
        let (mut c, mut p) = (0, 0);
        net.fire_sequence_partial(&sequence, &mut c, &mut p);
        counters.consumed += c;
        counters.produced += p;
    }

    let mut current = net.current_marking();
    for (place, required) in final_marking.iter() {
        let have = current.tokens_at(place);
        if have < required {
            let deficit = required - have;
            current
                .add_tokens(place, deficit as i64)
                .expect("adding a token never underflows");
            counters.missing += deficit;
        }
    }
    net.set_marking(current.clone());
    counters.remaining += current.total_tokens().saturating_sub(final_marking.total_tokens());

    Ok(counters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::silent_planner::{build_shortest_path_table, DeficitSurplusPlanner};
    use crate::petri_net::ArcType;

    fn sequential_abc_net() -> PetriNet {
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

        let mut initial = crate::petri_net::Marking::new();
        initial.set(start, 1);
        net.initial_marking = Some(initial);
        let mut fin = crate::petri_net::Marking::new();
        fin.set(end, 1);
        net.final_marking = Some(fin);
        net
    }

    #[test]
    fn perfect_replay_has_no_missing_or_remaining() {
        let mut net = sequential_abc_net();
        let spt = build_shortest_path_table(&net, 8);
        let planner = DeficitSurplusPlanner;
        let mut activity_cache = ActivityCache::new();
        let config = ReplayConfig::default();

        let counters = replay_trace(
            &mut net,
            &["A", "B", "C"],
            &spt,
            &planner,
            &mut activity_cache,
            &config,
            None,
            None,
        )
        .unwrap();

        assert_eq!(counters.missing, 0);
        assert_eq!(counters.remaining, 0);
        assert_eq!(counters.produced, counters.consumed);
    }

    #[test]
    fn unknown_activity_is_a_fatal_error() {
        let mut net = sequential_abc_net();
        let spt = build_shortest_path_table(&net, 8);
        let planner = DeficitSurplusPlanner;
        let mut activity_cache = ActivityCache::new();
        let config = ReplayConfig::default();

        let result = replay_trace(
            &mut net,
            &["A", "Z"],
            &spt,
            &planner,
            &mut activity_cache,
            &config,
            None,
            None,
        );
        assert!(matches!(result, Err(NetError::UnknownTransition(_))));
    }

    #[test]
    fn all_four_cache_modes_agree_on_totals() {
        let activities = ["A", "B", "C"];
        let mut totals = Vec::new();
        for (use_prefix, use_suffix) in [(false, false), (true, false), (false, true), (true, true)] {
            let mut net = sequential_abc_net();
            let spt = build_shortest_path_table(&net, 8);
            let planner = DeficitSurplusPlanner;
            let mut activity_cache = ActivityCache::new();
            let config = ReplayConfig::default();
            let mut prefix_cache = PrefixCache::new(config.max_prefix_length);
            let mut suffix_cache = SuffixCache::new(config.max_suffix_length);

            let counters = replay_trace(
                &mut net,
                &activities,
                &spt,
                &planner,
                &mut activity_cache,
                &config,
                use_prefix.then_some(&mut prefix_cache),
                use_suffix.then_some(&mut suffix_cache),
            )
            .unwrap();
            totals.push((counters.missing, counters.remaining, counters.produced, counters.consumed));
        }
        assert!(totals.windows(2).all(|w| w[0] == w[1]));
    }
}
