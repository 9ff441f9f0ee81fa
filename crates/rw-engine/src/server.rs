//! Top-level server handle: the shared world/results slots a session
//! mutates in the lobby, plus the simulation manager for whichever run is
//! currently active (or most recently finished).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::context::ServerContext;
use crate::results::Results;
use crate::sim_manager::SimManager;
use crate::world::{World, WorldKind, WorldSize};

/// Owns the mutable slots a `CREATE_SIM`/`LOAD_WORLD`/`LOAD_RESULTS`
/// command swaps wholesale, and the handle to whichever `SimManager` most
/// recently ran. World and results are each behind their own lock so a
/// snapshot or persistence request can read the live `Arc` without racing
/// a concurrent replace; the session layer only ever replaces them while
/// the simulation is not running.
pub struct Server {
    pub ctx: ServerContext,
    world: Mutex<Arc<World>>,
    results: Mutex<Arc<Results>>,
    manager: Mutex<Option<Arc<SimManager>>>,
    next_snapshot_id: AtomicU32,
    num_workers: usize,
    queue_capacity: usize,
}

impl Server {
    pub fn new(world_kind: WorldKind, width: u32, height: u32, num_workers: usize, queue_capacity: usize) -> Self {
        let world = World::new(world_kind, WorldSize { width, height }).expect("startup world dimensions must be nonzero");
        let cell_count = world.cell_count();
        Server {
            ctx: ServerContext::new(world_kind, width, height),
            world: Mutex::new(Arc::new(world)),
            results: Mutex::new(Arc::new(Results::new(cell_count))),
            manager: Mutex::new(None),
            next_snapshot_id: AtomicU32::new(1),
            num_workers,
            queue_capacity,
        }
    }

    pub fn world(&self) -> Arc<World> {
        Arc::clone(&self.world.lock().unwrap())
    }

    pub fn results(&self) -> Arc<Results> {
        Arc::clone(&self.results.lock().unwrap())
    }

    /// Replace the world wholesale and clear results to match its cell
    /// count. Callers must have already verified the simulation is not
    /// running.
    pub fn replace_world(&self, world: World) {
        let cell_count = world.cell_count();
        *self.world.lock().unwrap() = Arc::new(world);
        *self.results.lock().unwrap() = Arc::new(Results::new(cell_count));
    }

    /// Replace both world and results wholesale, as when a full results
    /// file is loaded.
    pub fn replace_world_and_results(&self, world: World, results: Results) {
        *self.world.lock().unwrap() = Arc::new(world);
        *self.results.lock().unwrap() = Arc::new(results);
    }

    pub fn next_snapshot_id(&self) -> u32 {
        self.next_snapshot_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn manager(&self) -> Option<Arc<SimManager>> {
        self.manager.lock().unwrap().clone()
    }

    /// Construct a fresh `SimManager` bound to the current world/results
    /// and stash it as the active one. Called once per `START_SIM` or
    /// `RESTART_SIM`: a prior manager's thread, if any, has already been
    /// joined by the time this runs (checked via `sim_state`), so there is
    /// nothing to reconcile with the manager it replaces.
    pub fn new_manager(&self) -> Arc<SimManager> {
        let mgr = Arc::new(SimManager::new(self.world(), self.results(), self.num_workers, self.queue_capacity));
        *self.manager.lock().unwrap() = Some(Arc::clone(&mgr));
        mgr
    }
}
