//! World model, worker pool, simulation manager, server context, and
//! persistence for the random-walk engine's server side.

pub mod context;
pub mod error;
pub mod persist;
pub mod random_walk;
pub mod results;
pub mod rng;
pub mod server;
pub mod session;
pub mod sim_manager;
pub mod snapshot;
pub mod worker_pool;
pub mod world;

pub use error::{EngineError, PersistError, Result};
