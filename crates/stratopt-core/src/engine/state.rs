use super::config::Mode;
use serde::Serialize;

/// One evaluation of the objective, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialRecord {
    pub iteration: usize,
    /// Raw combined result; the sentinel for failed trials.
    pub raw: f64,
    /// Value handed back to the search backend.
    pub objective: f64,
    pub multipliers: Vec<f64>,
    pub mass: Option<f64>,
    /// Response variables in `w1..wN` order; empty for failed trials.
    pub responses: Vec<(String, f64)>,
    pub failed: bool,
}

/// Snapshot of the best trial so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestState {
    pub iteration: usize,
    pub raw: f64,
    pub multipliers: Vec<f64>,
    pub mass: Option<f64>,
    /// Stem of the model artifact kept for this trial.
    pub artifact: String,
}

/// Holds the single current-best snapshot and replaces it only on strict improvement.
#[derive(Debug, Clone)]
pub struct BestTracker {
    mode: Mode,
    best: Option<BestState>,
}

impl BestTracker {
    pub fn new(mode: Mode) -> Self {
        Self { mode, best: None }
    }

    /// Replaces the current best with `candidate` if its raw result is strictly better.
    ///
    /// # Return
    ///
    /// Returns `true` if the candidate became the new best.
    pub fn offer(&mut self, candidate: BestState) -> bool {
        if self
            .mode
            .is_better(candidate.raw, self.best.as_ref().map(|b| b.raw))
        {
            self.best = Some(candidate);
            true
        } else {
            false
        }
    }

    pub fn best(&self) -> Option<&BestState> {
        self.best.as_ref()
    }

    pub fn best_raw(&self) -> Option<f64> {
        self.best.as_ref().map(|b| b.raw)
    }

    pub fn into_best(self) -> Option<BestState> {
        self.best
    }
}

/// Append-only log of every trial of a run.
#[derive(Debug, Clone, Default)]
pub struct History {
    records: Vec<TrialRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TrialRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<TrialRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(iteration: usize, raw: f64) -> BestState {
        BestState {
            iteration,
            raw,
            multipliers: vec![1.0],
            mass: None,
            artifact: format!("opt_{iteration}"),
        }
    }

    #[test]
    fn target_mode_keeps_smallest_deviation_regardless_of_order() {
        let mut tracker = BestTracker::new(Mode::Target(1.0));
        let updates: Vec<bool> = [3.0, 0.5, 1.2]
            .iter()
            .enumerate()
            .map(|(i, &raw)| tracker.offer(state(i + 1, raw)))
            .collect();
        assert_eq!(updates, vec![true, true, true]);
        assert_eq!(tracker.best_raw(), Some(1.2));
        assert_eq!(tracker.best().unwrap().artifact, "opt_3");
    }

    #[test]
    fn resubmitting_a_seen_value_changes_nothing() {
        let mut tracker = BestTracker::new(Mode::Minimize);
        assert!(tracker.offer(state(1, 2.0)));
        assert!(!tracker.offer(state(2, 2.0)));
        assert!(!tracker.offer(state(3, 2.0)));
        assert_eq!(tracker.best().unwrap().iteration, 1);
    }

    #[test]
    fn maximize_never_regresses() {
        let mut tracker = BestTracker::new(Mode::Maximize);
        tracker.offer(state(1, 5.0));
        assert!(!tracker.offer(state(2, 4.0)));
        assert!(tracker.offer(state(3, 6.0)));
        assert_eq!(tracker.into_best().unwrap().raw, 6.0);
    }

    #[test]
    fn history_is_append_only() {
        let mut history = History::new();
        assert!(history.is_empty());
        history.push(TrialRecord {
            iteration: 1,
            raw: 1e10,
            objective: 1e10,
            multipliers: vec![1.0],
            mass: None,
            responses: vec![],
            failed: true,
        });
        assert_eq!(history.len(), 1);
        assert!(history.records()[0].failed);
    }
}
