//! Bounded FIFO job queue backed by a fixed pool of named OS worker threads.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::rng::Rng;

pub type Job = Box<dyn FnOnce(&mut Rng) + Send + 'static>;

struct Shared {
    queue: Mutex<VecDeque<Job>>,
    not_empty: Condvar,
    in_flight: AtomicUsize,
    done: Condvar,
    done_mtx: Mutex<()>,
    stop: AtomicBool,
    capacity: usize,
}

/// A fixed pool of worker threads draining a bounded queue.
///
/// Submission on a full queue busy-yields rather than waiting on a
/// not-full condvar: the queue is meant to stay shallow in normal
/// operation, and a producer that outruns the pool should feel the
/// backpressure directly instead of being parked.
pub struct WorkerPool {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(num_workers: usize, capacity: usize) -> Self {
        let capacity = capacity.max(16);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            in_flight: AtomicUsize::new(0),
            done: Condvar::new(),
            done_mtx: Mutex::new(()),
            stop: AtomicBool::new(false),
            capacity,
        });

        let mut handles = Vec::with_capacity(num_workers);
        for idx in 0..num_workers.max(1) {
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("rw-worker-{idx}"))
                .spawn(move || worker_loop(shared, idx as u64))
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }

        WorkerPool { shared, handles }
    }

    /// Enqueue a job, spinning with a thread yield while the queue is full.
    /// Returns `false` if the pool has been told to stop.
    pub fn submit(&self, job: Job) -> bool {
        loop {
            if self.shared.stop.load(Ordering::Acquire) {
                return false;
            }
            {
                let mut queue = self.shared.queue.lock().unwrap();
                if queue.len() < self.shared.capacity {
                    queue.push_back(job);
                    self.shared.in_flight.fetch_add(1, Ordering::AcqRel);
                    self.shared.not_empty.notify_one();
                    return true;
                }
            }
            thread::yield_now();
        }
    }

    /// Block until every submitted job has completed.
    pub fn wait_all(&self) {
        let guard = self.shared.done_mtx.lock().unwrap();
        let _unused = self
            .shared
            .done
            .wait_while(guard, |_| self.shared.in_flight.load(Ordering::Acquire) != 0)
            .unwrap();
    }

    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Cooperative stop: wakes every parked worker so it can observe the
    /// flag and exit. Does not drain or cancel queued jobs.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.not_empty.notify_all();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.shared.stop.load(Ordering::Acquire) {
            self.stop();
        }
    }
}

fn worker_loop(shared: Arc<Shared>, worker_id: u64) {
    let mut rng = Rng::from_time_pid_thread(worker_id);
    loop {
        let job = {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if let Some(job) = queue.pop_front() {
                    break Some(job);
                }
                if shared.stop.load(Ordering::Acquire) {
                    break None;
                }
                queue = shared.not_empty.wait(queue).unwrap();
            }
        };

        match job {
            Some(job) => {
                job(&mut rng);
                let remaining = shared.in_flight.fetch_sub(1, Ordering::AcqRel) - 1;
                if remaining == 0 {
                    let _guard = shared.done_mtx.lock().unwrap();
                    shared.done.notify_all();
                }
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn jobs_all_run_and_wait_all_blocks_until_done() {
        let pool = WorkerPool::new(4, 64);
        let counter = Arc::new(AtomicU64::new(0));
        for _ in 0..200 {
            let counter = Arc::clone(&counter);
            assert!(pool.submit(Box::new(move |_rng| {
                counter.fetch_add(1, Ordering::Relaxed);
            })));
        }
        pool.wait_all();
        assert_eq!(counter.load(Ordering::Relaxed), 200);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn stop_prevents_further_submission() {
        let mut pool = WorkerPool::new(2, 16);
        pool.stop();
        assert!(!pool.submit(Box::new(|_rng| {})));
    }
}
