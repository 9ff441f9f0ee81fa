//! Client-side connection handshake, single-reader dispatcher, and
//! chunked snapshot reassembler for the random-walk engine.

pub mod connect;
pub mod dispatcher;
pub mod error;
pub mod reassembler;

pub use connect::connect;
pub use dispatcher::Dispatcher;
pub use error::{ClientError, Result};
pub use reassembler::Snapshot;
