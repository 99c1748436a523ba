use std::collections::{HashMap, HashSet};

use crate::event_log::EventLog;
use crate::petri_net::{NetError, PetriNet};

use super::caches::{ActivityCache, AllowedTasksCache, PrecisionCounters};
use super::replay::ReplayConfig;
use super::silent_planner::{ShortestPathTable, SilentPlanner};

/// Maps every prefix (including the empty one) observed in the log to the
/// set of activities that immediately follow it anywhere in the log. Built
/// once per [`crate::calculate_precision`] call.
pub fn compute_prefix_next_activities(log: &EventLog) -> HashMap<String, HashSet<String>> {
    let mut next_activities: HashMap<String, HashSet<String>> = HashMap::new();
    for trace in &log.traces {
        let activities = trace.activities();
        if let Some(first) = activities.first() {
            next_activities
                .entry(String::new())
                .or_default()
                .insert(first.to_string());
        }
        for i in 0..activities.len() {
            let prefix = activities[..=i].join(",");
            let next = activities.get(i + 1).map(|s| s.to_string()).unwrap_or_default();
            if !next.is_empty() {
                next_activities.entry(prefix).or_default().insert(next);
            }
        }
    }
    next_activities
}

/// Replays one trace's activities purely for precision accounting:
/// escaping edges (eventually-enabled activities the log doesn't actually
/// continue with) and allowed tasks (eventually-enabled activities,
/// summed over every point in the trace). Stops replaying (without
/// inserting tokens) the first time a transition cannot be enabled even
/// after planning — the `PrecisionDeadlock` disposition.
#[allow(clippy::too_many_arguments)]
pub fn replay_trace_precision(
    net: &mut PetriNet,
    activities: &[&str],
    prefix_next_activities: &HashMap<String, HashSet<String>>,
    spt: &ShortestPathTable,
    planner: &dyn SilentPlanner,
    activity_cache: &mut ActivityCache,
    allowed_tasks_cache: &mut AllowedTasksCache,
    config: &ReplayConfig,
) -> Result<PrecisionCounters, NetError> {
    let initial_marking = net.initial_marking.clone().unwrap_or_default();
    net.set_marking(initial_marking);

    let mut counters = PrecisionCounters::default();
    let mut prefix_so_far = String::new();

    for (index, activity) in activities.iter().enumerate() {
        let marking = net.current_marking();
        let allowed = allowed_tasks_cache
            .get_or_compute(&marking, || net.visibly_enabled_eventually(&marking));

        let empty = HashSet::new();
        let key = if index == 0 { "" } else { prefix_so_far.as_str() };
        let next = prefix_next_activities.get(key).unwrap_or(&empty);
        counters.allowed_tasks += allowed.len() as u64;
        counters.escaping_edges += allowed.difference(next).count() as u64;

        let t = net
            .transition_by_name(activity)
            .ok_or_else(|| NetError::UnknownTransition(activity.to_string()))?;

        if !net.can_fire(t) {
            let cached = activity_cache.lookup(&marking, activity).cloned();
            let sequence = match cached {
                Some(seq) => seq,
                None => {
                    let (ok, seq) = planner.enable(net, spt, t, config.planner_max_iterations);
                    if ok {
                        activity_cache.insert(marking.clone(), activity.to_string(), seq.clone());
                    }
                    seq
                }
            };
            let (mut c, mut p) = (0, 0);
            net.fire_sequence_partial(&sequence, &mut c, &mut p);
        }

        if !net.can_fire(t) {
            // PrecisionDeadlock: stop replaying this trace for precision,
            // no token insertion.
            break;
        }

        let (mut c, mut p) = (0, 0);
        net.fire(t, &mut c, &mut p)
            .expect("can_fire was just checked to hold");

        if prefix_so_far.is_empty() {
            prefix_so_far.push_str(activity);
        } else {
            prefix_so_far.push(',');
            prefix_so_far.push_str(activity);
        }
    }

    Ok(counters)
}
