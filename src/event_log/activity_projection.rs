use std::collections::HashMap;

use super::event_log_struct::{EventLog, EventLogClassifier};

/// An event log collapsed to integer-indexed activity sequences with
/// multiplicities, so that the many repeated traces real logs contain are
/// replayed (and cached) exactly once.
#[derive(Debug, Clone, Default)]
pub struct EventLogActivityProjection {
    /// Activity names, indexed by their interned position.
    pub activities: Vec<String>,
    /// Reverse lookup from activity name to its interned position.
    pub act_to_index: HashMap<String, usize>,
    /// Each distinct trace signature (as an index sequence) paired with how
    /// many traces in the original log shared that exact sequence.
    pub traces: Vec<(Vec<usize>, u64)>,
}

impl EventLogActivityProjection {
    /// Projects `log` using the default (activity-name) classifier.
    pub fn from_event_log(log: &EventLog) -> Self {
        Self::from_event_log_with_classifier(log, &EventLogClassifier::default())
    }

    /// Projects `log`, deriving each event's activity via `classifier`.
    pub fn from_event_log_with_classifier(log: &EventLog, classifier: &EventLogClassifier) -> Self {
        let mut activities = Vec::new();
        let mut act_to_index = HashMap::new();
        let mut signature_counts: HashMap<Vec<usize>, u64> = HashMap::new();
        let mut signature_order = Vec::new();

        for trace in &log.traces {
            let signature: Vec<usize> = trace
                .events
                .iter()
                .map(|event| {
                    let name = classifier.get_class_identity(event);
                    *act_to_index.entry(name.clone()).or_insert_with(|| {
                        activities.push(name);
                        activities.len() - 1
                    })
                })
                .collect();

            if let Some(count) = signature_counts.get_mut(&signature) {
                *count += 1;
            } else {
                signature_order.push(signature.clone());
                signature_counts.insert(signature, 1);
            }
        }

        let traces = signature_order
            .into_iter()
            .map(|sig| {
                let count = signature_counts[&sig];
                (sig, count)
            })
            .collect();

        EventLogActivityProjection {
            activities,
            act_to_index,
            traces,
        }
    }

    /// The number of distinct trace signatures (i.e. unique traces).
    pub fn unique_trace_count(&self) -> usize {
        self.traces.len()
    }

    /// Renders an index sequence back to activity names.
    pub fn names(&self, signature: &[usize]) -> Vec<&str> {
        signature.iter().map(|i| self.activities[*i].as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::event_log_struct::{Event, Trace};

    fn log_of(traces: &[&[&str]]) -> EventLog {
        let mut log = EventLog::new();
        for acts in traces {
            let mut trace = Trace::new();
            for a in *acts {
                trace.events.push(Event::new(*a));
            }
            log.traces.push(trace);
        }
        log
    }

    #[test]
    fn duplicate_traces_collapse_with_multiplicity() {
        let log = log_of(&[&["A", "B"], &["A", "B"], &["A", "C"]]);
        let projection = EventLogActivityProjection::from_event_log(&log);
        assert_eq!(projection.unique_trace_count(), 2);
        let total: u64 = projection.traces.iter().map(|(_, c)| *c).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn activity_indices_are_stable_within_a_projection() {
        let log = log_of(&[&["A", "B", "A"]]);
        let projection = EventLogActivityProjection::from_event_log(&log);
        let (sig, _) = &projection.traces[0];
        assert_eq!(sig[0], sig[2]);
        assert_ne!(sig[0], sig[1]);
    }
}
