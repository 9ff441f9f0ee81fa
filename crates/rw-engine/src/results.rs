//! Mutex-guarded accumulation counters for a simulation run.

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultsSnapshot {
    pub trials: u64,
    pub sum_steps: u64,
    pub success_leq_k: u64,
}

/// Per-cell trial counters, one triple per grid cell, guarded by a single
/// mutex. Reads and writes both take the same lock: the counters are
/// updated in small bursts by worker threads and read in bulk by snapshot
/// and persistence requests, so there is no benefit to finer-grained
/// locking.
pub struct Results {
    cells: Mutex<Vec<ResultsSnapshot>>,
}

impl Results {
    pub fn new(cell_count: u32) -> Self {
        Results { cells: Mutex::new(vec![ResultsSnapshot::default(); cell_count as usize]) }
    }

    pub fn clear(&self) {
        let mut cells = self.cells.lock().unwrap();
        for c in cells.iter_mut() {
            *c = ResultsSnapshot::default();
        }
    }

    /// Record the outcome of one random walk started from `origin_idx`.
    /// Steps are only added to the running total on success: a walk that
    /// exhausts its budget without reaching the origin contributes a trial
    /// but no step count, keeping `sum_steps[i] == 0` wherever
    /// `success_leq_k[i] == 0`.
    pub fn update(&self, origin_idx: u32, steps_taken: u64, succeeded: bool) {
        let mut cells = self.cells.lock().unwrap();
        if let Some(cell) = cells.get_mut(origin_idx as usize) {
            cell.trials += 1;
            if succeeded {
                cell.sum_steps += steps_taken;
                cell.success_leq_k += 1;
            }
        }
    }

    pub fn snapshot(&self) -> Vec<ResultsSnapshot> {
        self.cells.lock().unwrap().clone()
    }

    pub fn trials(&self) -> Vec<u64> {
        self.cells.lock().unwrap().iter().map(|c| c.trials).collect()
    }

    pub fn sum_steps(&self) -> Vec<u64> {
        self.cells.lock().unwrap().iter().map(|c| c.sum_steps).collect()
    }

    pub fn success_leq_k(&self) -> Vec<u64> {
        self.cells.lock().unwrap().iter().map(|c| c.success_leq_k).collect()
    }

    /// Replace the counters wholesale, as when loading a persisted results file.
    pub fn load(&self, trials: &[u64], sum_steps: &[u64], success_leq_k: &[u64]) {
        let mut cells = self.cells.lock().unwrap();
        for (i, cell) in cells.iter_mut().enumerate() {
            cell.trials = trials.get(i).copied().unwrap_or(0);
            cell.sum_steps = sum_steps.get(i).copied().unwrap_or(0);
            cell.success_leq_k = success_leq_k.get(i).copied().unwrap_or(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_accumulates_per_cell() {
        let r = Results::new(4);
        r.update(0, 5, true);
        r.update(0, 3, false);
        r.update(2, 10, true);
        let snap = r.snapshot();
        assert_eq!(snap[0].trials, 2);
        assert_eq!(snap[0].sum_steps, 8);
        assert_eq!(snap[0].success_leq_k, 1);
        assert_eq!(snap[2].trials, 1);
        assert_eq!(snap[1].trials, 0);
    }

    #[test]
    fn failed_trial_does_not_contribute_steps() {
        let r = Results::new(1);
        r.update(0, 50, false);
        let snap = r.snapshot();
        assert_eq!(snap[0].trials, 1);
        assert_eq!(snap[0].success_leq_k, 0);
        assert_eq!(snap[0].sum_steps, 0);
    }

    #[test]
    fn clear_resets_all_cells() {
        let r = Results::new(2);
        r.update(0, 5, true);
        r.clear();
        let snap = r.snapshot();
        assert_eq!(snap[0].trials, 0);
        assert_eq!(snap[0].sum_steps, 0);
    }

    #[test]
    fn load_replaces_counters() {
        let r = Results::new(3);
        r.load(&[1, 2, 3], &[10, 20, 30], &[1, 0, 1]);
        let snap = r.snapshot();
        assert_eq!(snap[1].trials, 2);
        assert_eq!(snap[2].success_leq_k, 1);
    }
}
