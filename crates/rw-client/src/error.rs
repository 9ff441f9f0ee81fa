//! Errors produced by the client-side dispatcher and snapshot reassembler.

use std::fmt;

use rw_protocol::ProtocolError;

#[derive(Debug)]
pub enum ClientError {
    /// The reader thread hit a fatal socket/framing error; no further
    /// requests can be served on this connection.
    ReaderFailed(ProtocolError),
    /// `send_and_wait` exceeded its caller-supplied timeout.
    Timeout,
    /// The server closed the connection while a request was in flight.
    Closed,
    /// A reply arrived but its type wasn't in the caller's expected set.
    UnexpectedType(u16),
    /// The server sent an ERROR message in reply to a request.
    ServerError { code: u32, message: String },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReaderFailed(e) => write!(f, "dispatcher reader failed: {}", e),
            Self::Timeout => write!(f, "request timed out"),
            Self::Closed => write!(f, "connection closed"),
            Self::UnexpectedType(t) => write!(f, "unexpected reply type {}", t),
            Self::ServerError { code, message } => write!(f, "server error {}: {}", code, message),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReaderFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProtocolError> for ClientError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Closed => ClientError::Closed,
            other => ClientError::ReaderFailed(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
