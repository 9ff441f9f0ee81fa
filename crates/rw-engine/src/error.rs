//! Errors produced by the world/results/worker-pool/simulation layer.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum EngineError {
    /// A width/height of zero was supplied to world or results init.
    InvalidDimensions,
    /// The simulation manager is already running.
    AlreadyRunning,
    /// `restart` was called with total_reps == 0.
    InvalidRepetitionCount,
    /// A results/world persistence file failed to open, read, write, or
    /// validate (magic/version mismatch).
    Persistence(PersistError),
}

#[derive(Debug)]
pub enum PersistError {
    Io(io::Error),
    BadMagic,
    BadVersion(u32),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimensions => write!(f, "world/results dimensions must be nonzero"),
            Self::AlreadyRunning => write!(f, "simulation manager is already running"),
            Self::InvalidRepetitionCount => write!(f, "total_reps must be nonzero"),
            Self::Persistence(e) => write!(f, "persistence error: {}", e),
        }
    }
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{}", e),
            Self::BadMagic => write!(f, "bad magic bytes in results/world file"),
            Self::BadVersion(v) => write!(f, "unsupported file version {}", v),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Persistence(PersistError::Io(e)) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for PersistError {}

impl From<io::Error> for PersistError {
    fn from(e: io::Error) -> Self {
        PersistError::Io(e)
    }
}

impl From<PersistError> for EngineError {
    fn from(e: PersistError) -> Self {
        EngineError::Persistence(e)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
