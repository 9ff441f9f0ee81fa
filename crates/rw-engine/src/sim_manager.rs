//! The replication loop: fans cell jobs out to a worker pool, one
//! replication at a time, and reports progress between them.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::random_walk::{run_walk, MoveProbs};
use crate::results::Results;
use crate::world::{Pos, World};
use crate::worker_pool::WorkerPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    Lobby,
    Running,
    Finished,
}

pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

struct RunHandle {
    thread: JoinHandle<()>,
    stop_requested: Arc<AtomicBool>,
}

/// Owns the sim thread lifecycle and current replication counters. The
/// world and results data structures it operates on are shared with the
/// session layer via `Arc`, so a snapshot or persistence request can read
/// them while a run is in flight.
pub struct SimManager {
    world: Arc<World>,
    results: Arc<Results>,
    num_workers: usize,
    queue_capacity: usize,
    state: Arc<Mutex<SimState>>,
    current_rep: Arc<AtomicU32>,
    total_reps: Arc<AtomicU32>,
    run: Mutex<Option<RunHandle>>,
}

impl SimManager {
    pub fn new(world: Arc<World>, results: Arc<Results>, num_workers: usize, queue_capacity: usize) -> Self {
        let num_workers = if num_workers == 0 { DEFAULT_WORKERS } else { num_workers };
        let queue_capacity = if queue_capacity == 0 { DEFAULT_QUEUE_CAPACITY } else { queue_capacity }.max(16);
        SimManager {
            world,
            results,
            num_workers,
            queue_capacity,
            state: Arc::new(Mutex::new(SimState::Lobby)),
            current_rep: Arc::new(AtomicU32::new(0)),
            total_reps: Arc::new(AtomicU32::new(0)),
            run: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SimState {
        *self.state.lock().unwrap()
    }

    pub fn current_rep(&self) -> u32 {
        self.current_rep.load(Ordering::Acquire)
    }

    pub fn total_reps(&self) -> u32 {
        self.total_reps.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.state() == SimState::Running
    }

    /// Start a fresh run of `total_reps` replications using `probs`/`k_max_steps`.
    /// `on_end(stopped)` fires once the run transitions to FINISHED, whether
    /// by natural completion or by a stop request.
    pub fn start<F>(&self, total_reps: u32, probs: MoveProbs, k_max_steps: u32, on_progress: F, on_end: impl FnOnce(bool) + Send + 'static)
    where
        F: Fn(u32, u32) + Send + 'static,
    {
        {
            let mut state = self.state.lock().unwrap();
            if *state == SimState::Running {
                return;
            }
            *state = SimState::Running;
        }
        self.current_rep.store(0, Ordering::Release);
        self.total_reps.store(total_reps, Ordering::Release);
        self.results.clear();

        let stop_requested = Arc::new(AtomicBool::new(false));
        let world = Arc::clone(&self.world);
        let results = Arc::clone(&self.results);
        let state = Arc::clone(&self.state);
        let current_rep = Arc::clone(&self.current_rep);
        let num_workers = self.num_workers;
        let queue_capacity = self.queue_capacity;
        let stop_flag = Arc::clone(&stop_requested);

        let thread = std::thread::Builder::new()
            .name("rw-sim-manager".to_string())
            .spawn(move || {
                let stopped = run_replications(
                    world,
                    results,
                    num_workers,
                    queue_capacity,
                    total_reps,
                    probs,
                    k_max_steps,
                    &stop_flag,
                    &current_rep,
                    &on_progress,
                );
                *state.lock().unwrap() = SimState::Finished;
                on_end(stopped);
            })
            .expect("failed to spawn simulation manager thread");

        *self.run.lock().unwrap() = Some(RunHandle { thread, stop_requested });
    }

    /// Restart from FINISHED with a new replication count, reusing the same
    /// world/results/worker configuration.
    pub fn restart<F>(&self, total_reps: u32, probs: MoveProbs, k_max_steps: u32, on_progress: F, on_end: impl FnOnce(bool) + Send + 'static)
    where
        F: Fn(u32, u32) + Send + 'static,
    {
        self.start(total_reps, probs, k_max_steps, on_progress, on_end)
    }

    /// Request a cooperative stop. No-op if no run is in flight.
    pub fn request_stop(&self) {
        if let Some(run) = self.run.lock().unwrap().as_ref() {
            run.stop_requested.store(true, Ordering::Release);
        }
    }

    /// Join the current run's thread, if any, blocking the caller.
    pub fn join(&self) {
        let handle = self.run.lock().unwrap().take();
        if let Some(run) = handle {
            let _ = run.thread.join();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_replications(
    world: Arc<World>,
    results: Arc<Results>,
    num_workers: usize,
    queue_capacity: usize,
    total_reps: u32,
    probs: MoveProbs,
    k_max_steps: u32,
    stop_requested: &AtomicBool,
    current_rep: &AtomicU32,
    on_progress: &(dyn Fn(u32, u32) + Send),
) -> bool {
    let mut pool = WorkerPool::new(num_workers, queue_capacity);
    let mut stopped = false;

    'outer: for rep in 1..=total_reps {
        for y in 0..world.size.height as i32 {
            for x in 0..world.size.width as i32 {
                if world.is_obstacle_xy(x, y) {
                    continue;
                }
                let origin = Pos { x, y };
                let origin_idx = world.index(x, y);
                let world = Arc::clone(&world);
                let results = Arc::clone(&results);
                pool.submit(Box::new(move |rng| {
                    let outcome = run_walk(&world, origin, probs, k_max_steps, rng);
                    results.update(origin_idx, outcome.steps_taken, outcome.succeeded);
                }));
            }
            if stop_requested.load(Ordering::Acquire) {
                break;
            }
        }
        pool.wait_all();

        current_rep.store(rep, Ordering::Release);
        on_progress(rep, total_reps);

        if stop_requested.load(Ordering::Acquire) {
            stopped = true;
            break 'outer;
        }
    }

    pool.stop();
    stopped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::WorldSize;
    use std::sync::atomic::AtomicU32 as TestCounter;
    use std::sync::mpsc;

    fn even_probs() -> MoveProbs {
        MoveProbs { up: 0.25, down: 0.25, left: 0.25, right: 0.25 }
    }

    #[test]
    fn completes_all_replications_and_reports_finished() {
        let world = Arc::new(World::new(crate::world::WorldKind::Wrap, WorldSize { width: 3, height: 3 }).unwrap());
        let results = Arc::new(Results::new(world.cell_count()));
        let mgr = SimManager::new(Arc::clone(&world), Arc::clone(&results), 2, 64);

        let (tx, rx) = mpsc::channel();
        let progress_count = Arc::new(TestCounter::new(0));
        let progress_count_cb = Arc::clone(&progress_count);

        mgr.start(
            3,
            even_probs(),
            5,
            move |_rep, _total| {
                progress_count_cb.fetch_add(1, Ordering::Relaxed);
            },
            move |stopped| {
                let _ = tx.send(stopped);
            },
        );

        let stopped = rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        mgr.join();
        assert!(!stopped);
        assert_eq!(mgr.state(), SimState::Finished);
        assert_eq!(mgr.current_rep(), 3);
        assert_eq!(progress_count.load(Ordering::Relaxed), 3);

        let trials = results.trials();
        assert!(trials.iter().all(|&t| t == 3));
    }

    #[test]
    fn stop_request_halts_before_all_reps_complete() {
        let world = Arc::new(World::new(crate::world::WorldKind::Wrap, WorldSize { width: 2, height: 2 }).unwrap());
        let results = Arc::new(Results::new(world.cell_count()));
        let mgr = SimManager::new(Arc::clone(&world), Arc::clone(&results), 1, 16);

        let (tx, rx) = mpsc::channel();
        mgr.start(1_000_000, even_probs(), 3, |_, _| {}, move |stopped| {
            let _ = tx.send(stopped);
        });
        mgr.request_stop();

        let stopped = rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        mgr.join();
        assert!(stopped);
    }
}
