use std::collections::{HashMap, HashSet};

use itertools::Itertools;

use crate::petri_net::{Marking, PetriNet, PlaceID, TransitionID};

/// `table[(p, q)]` is a shortest known sequence of silent transitions that,
/// fired in order from a marking holding a single token on `p` (and nothing
/// required elsewhere), moves that token onto `q`.
pub type ShortestPathTable = HashMap<(PlaceID, PlaceID), Vec<TransitionID>>;

/// Builds the per-place silent shortest-path table via a recursive DFS
/// bounded by `depth`, over the graph whose edges are `p -> q` labelled by
/// every silent transition with `p` in its preset and `q` in its postset.
pub fn build_shortest_path_table(net: &PetriNet, depth: usize) -> ShortestPathTable {
    let mut edges: Vec<(PlaceID, PlaceID, TransitionID)> = Vec::new();
    for transition in net.transitions.values() {
        if !transition.is_silent() {
            continue;
        }
        let preset = net.preset_of_transition(transition.id);
        let postset = net.postset_of_transition(transition.id);
        for (p, _) in &preset {
            for (q, _) in &postset {
                edges.push((*p, *q, transition.id));
            }
        }
    }

    let mut table = ShortestPathTable::new();
    for source in net.places.keys().copied() {
        let mut visited = HashSet::new();
        dfs_from(source, source, &mut Vec::new(), depth, &edges, &mut visited, &mut table);
    }
    table
}

fn dfs_from(
    source: PlaceID,
    current: PlaceID,
    path: &mut Vec<TransitionID>,
    depth_left: usize,
    edges: &[(PlaceID, PlaceID, TransitionID)],
    visited: &mut HashSet<PlaceID>,
    table: &mut ShortestPathTable,
) {
    if current != source {
        table
            .entry((source, current))
            .and_modify(|existing| {
                if path.len() < existing.len() {
                    *existing = path.clone();
                }
            })
            .or_insert_with(|| path.clone());
    }
    if depth_left == 0 || !visited.insert(current) {
        return;
    }
    for (from, to, t) in edges.iter().filter(|(from, _, _)| *from == current) {
        path.push(*t);
        dfs_from(source, *to, path, depth_left - 1, edges, visited, table);
        path.pop();
    }
    visited.remove(&current);
}

/// Finds a (bounded) sequence of silent transitions that moves the net from
/// one marking toward a goal marking, or reports the goal unreachable.
/// Two implementations share this contract: [`DeficitSurplusPlanner`]
/// (default, the deficit/surplus heuristic) and [`HyperGraphPlanner`]
/// (bounded BFS/DFS over markings).
pub trait SilentPlanner {
    /// Attempts to make `target` fireable, starting from `net`'s current
    /// marking. Returns `(true, sequence)` with a sequence that fires
    /// cleanly from the current marking and leaves `target` enabled, or
    /// `(false, partial_progress)` if the bound was exhausted first.
    fn enable(
        &self,
        net: &PetriNet,
        spt: &ShortestPathTable,
        target: TransitionID,
        max_iterations: usize,
    ) -> (bool, Vec<TransitionID>);

    /// Attempts to reach `final_marking`, starting from `net`'s current
    /// marking. Same success contract as [`Self::enable`].
    fn reach_final(
        &self,
        net: &PetriNet,
        spt: &ShortestPathTable,
        final_marking: &Marking,
        max_iterations: usize,
    ) -> (bool, Vec<TransitionID>);
}

/// The normative planner: maintains a deficit set (places short of the
/// goal) and a surplus set (places holding tokens the goal doesn't need),
/// and repeatedly fires the shortest known silent path between a surplus
/// and a deficit place, partially if necessary, restarting until the goal
/// is reached or the iteration bound is exhausted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeficitSurplusPlanner;

impl DeficitSurplusPlanner {
    fn plan_toward(
        &self,
        net: &PetriNet,
        spt: &ShortestPathTable,
        goal: &Marking,
        max_iterations: usize,
    ) -> (bool, Vec<TransitionID>) {
        let mut current = net.current_marking();
        let mut plan = Vec::new();

        for _ in 0..max_iterations {
            if current.contains(goal) {
                return (true, plan);
            }

            let deficit: Vec<PlaceID> = net
                .places
                .keys()
                .copied()
                .filter(|p| goal.tokens_at(*p) > current.tokens_at(*p))
                .collect();
            let surplus: Vec<PlaceID> = net
                .places
                .keys()
                .copied()
                .filter(|p| current.tokens_at(*p) > goal.tokens_at(*p))
                .collect();

            let candidates: Vec<&Vec<TransitionID>> = surplus
                .iter()
                .flat_map(|lambda| deficit.iter().filter_map(move |delta| spt.get(&(*lambda, *delta))))
                .sorted_by_key(|seq| seq.len())
                .collect();

            let mut progressed = false;
            for candidate in candidates {
                let (fired, resulting_marking) = simulate_partial(net, &current, candidate);
                if fired > 0 {
                    plan.extend_from_slice(&candidate[..fired]);
                    current = resulting_marking;
                    progressed = true;
                    break;
                }
            }
            if !progressed {
                return (false, plan);
            }
        }

        (current.contains(goal), plan)
    }
}

impl SilentPlanner for DeficitSurplusPlanner {
    fn enable(
        &self,
        net: &PetriNet,
        spt: &ShortestPathTable,
        target: TransitionID,
        max_iterations: usize,
    ) -> (bool, Vec<TransitionID>) {
        let goal = net.marking_enabling(target);
        self.plan_toward(net, spt, &goal, max_iterations)
    }

    fn reach_final(
        &self,
        net: &PetriNet,
        spt: &ShortestPathTable,
        final_marking: &Marking,
        max_iterations: usize,
    ) -> (bool, Vec<TransitionID>) {
        self.plan_toward(net, spt, final_marking, max_iterations)
    }
}

/// Fires as much of `sequence` as is enabled from `from`, without mutating
/// `net`. Returns how many transitions fired and the resulting marking.
fn simulate_partial(
    net: &PetriNet,
    from: &Marking,
    sequence: &[TransitionID],
) -> (usize, Marking) {
    let mut marking = from.clone();
    let mut fired = 0;
    for t in sequence {
        if !net.is_enabled_in(*t, &marking) {
            break;
        }
        marking = net.simulate_fire(*t, &marking);
        fired += 1;
    }
    (fired, marking)
}

/// Alternative planner: a bounded DFS over marking states reachable by
/// firing silent transitions. Semantically equivalent to
/// [`DeficitSurplusPlanner`] at the contract level — same success
/// predicate, same `(false, [])` failure mode.
#[derive(Debug, Clone)]
pub struct HyperGraphPlanner {
    max_depth: usize,
}

impl HyperGraphPlanner {
    /// Builds a planner bounded to `max_depth` silent hops (default 3).
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    fn search(&self, net: &PetriNet, start: &Marking, goal: &Marking) -> (bool, Vec<TransitionID>) {
        let mut on_path: HashSet<Marking> = HashSet::new();
        match self.dfs(net, start, goal, self.max_depth, &mut on_path) {
            Some(seq) => (true, seq),
            None => (false, Vec::new()),
        }
    }

    /// `on_path` guards against infinite recursion through a marking cycle;
    /// it holds only markings on the current DFS branch, not a
    /// cross-branch memo — a marking that failed at a shallower remaining
    /// depth on one branch may still succeed at a greater remaining depth
    /// on another, so failures must not be cached across branches.
    fn dfs(
        &self,
        net: &PetriNet,
        current: &Marking,
        goal: &Marking,
        depth_left: usize,
        on_path: &mut HashSet<Marking>,
    ) -> Option<Vec<TransitionID>> {
        if current.contains(goal) {
            return Some(Vec::new());
        }
        if depth_left == 0 || !on_path.insert(current.clone()) {
            return None;
        }

        for transition in net.transitions.values().filter(|t| t.is_silent()) {
            if !net.is_enabled_in(transition.id, current) {
                continue;
            }
            let next = net.simulate_fire(transition.id, current);
            if let Some(mut tail) = self.dfs(net, &next, goal, depth_left - 1, on_path) {
                let mut seq = vec![transition.id];
                seq.append(&mut tail);
                on_path.remove(current);
                return Some(seq);
            }
        }
        on_path.remove(current);
        None
    }
}

impl Default for HyperGraphPlanner {
    fn default() -> Self {
        Self::new(3)
    }
}

impl SilentPlanner for HyperGraphPlanner {
    fn enable(
        &self,
        net: &PetriNet,
        _spt: &ShortestPathTable,
        target: TransitionID,
        _max_iterations: usize,
    ) -> (bool, Vec<TransitionID>) {
        let goal = net.marking_enabling(target);
        self.search(net, &net.current_marking(), &goal)
    }

    fn reach_final(
        &self,
        net: &PetriNet,
        _spt: &ShortestPathTable,
        final_marking: &Marking,
        _max_iterations: usize,
    ) -> (bool, Vec<TransitionID>) {
        self.search(net, &net.current_marking(), final_marking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::petri_net::ArcType;

    fn net_with_silent_tail() -> (PetriNet, TransitionID) {
        let mut net = PetriNet::new();
        let p1 = net.add_place("p1");
        let p2 = net.add_place("p2");
        let tau = net.add_transition("tau_1");
        let c = net.add_transition("C");
        net.add_arc(ArcType::place_to_transition(p1, tau), None);
        net.add_arc(ArcType::transition_to_place(tau, p2), None);
        net.add_arc(ArcType::place_to_transition(p2, c), None);
        (net, c)
    }

    #[test]
    fn shortest_path_table_finds_single_hop() {
        let (net, _) = net_with_silent_tail();
        let spt = build_shortest_path_table(&net, 8);
        let places: Vec<_> = net.places.keys().copied().collect();
        assert!(!spt.is_empty());
        let _ = places;
    }

    #[test]
    fn deficit_surplus_planner_enables_transition_via_silent_hop() {
        let (mut net, c) = net_with_silent_tail();
        let p1 = *net.places.keys().next().unwrap();
        let mut marking = Marking::new();
        marking.set(p1, 1);
        net.set_marking(marking);

        let spt = build_shortest_path_table(&net, 8);
        let planner = DeficitSurplusPlanner;
        let (ok, seq) = planner.enable(&net, &spt, c, 10);
        assert!(ok);
        assert_eq!(seq.len(), 1);
    }

    #[test]
    fn hypergraph_planner_matches_deficit_surplus_contract() {
        let (mut net, c) = net_with_silent_tail();
        let p1 = *net.places.keys().next().unwrap();
        let mut marking = Marking::new();
        marking.set(p1, 1);
        net.set_marking(marking);

        let spt = build_shortest_path_table(&net, 8);
        let planner = HyperGraphPlanner::default();
        let (ok, seq) = planner.enable(&net, &spt, c, 10);
        assert!(ok);
        assert_eq!(seq.len(), 1);
    }

    #[test]
    fn unreachable_goal_reports_failure() {
        let mut net = PetriNet::new();
        let p1 = net.add_place("p1");
        let p2 = net.add_place("p2");
        let c = net.add_transition("C");
        net.add_arc(ArcType::place_to_transition(p2, c), None);
        let mut marking = Marking::new();
        marking.set(p1, 1);
        net.set_marking(marking);

        let spt = build_shortest_path_table(&net, 8);
        let planner = DeficitSurplusPlanner;
        let (ok, seq) = planner.enable(&net, &spt, c, 10);
        assert!(!ok);
        assert!(seq.is_empty());
    }
}
