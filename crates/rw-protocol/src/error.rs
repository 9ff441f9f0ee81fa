//! Errors produced by wire framing and message (de)serialization.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum ProtocolError {
    /// The peer closed the connection (or a short read hit EOF) mid-frame.
    Closed,
    /// A non-blocking send could not complete without blocking.
    WouldBlock,
    /// A lower-level socket I/O error occurred.
    Io(io::Error),
    /// The header declared a payload length that doesn't match the
    /// expected fixed-size struct for its message type.
    BadPayloadLen { msg_type: u16, got: u32, want: u32 },
    /// A header carried a message type this side doesn't recognize.
    UnknownType(u16),
    /// A non-zero payload was declared but no payload bytes were given to
    /// `send_msg`, or vice versa.
    NullPayload,
    /// A string field (path, error message) was not valid UTF-8 or didn't
    /// fit its fixed wire width.
    BadString,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "connection closed"),
            Self::WouldBlock => write!(f, "send would block"),
            Self::Io(e) => write!(f, "socket I/O error: {}", e),
            Self::BadPayloadLen { msg_type, got, want } => write!(
                f,
                "message type {} has payload_len {} but expected {}",
                msg_type, got, want
            ),
            Self::UnknownType(t) => write!(f, "unknown message type {}", t),
            Self::NullPayload => write!(f, "null payload with nonzero declared length"),
            Self::BadString => write!(f, "malformed fixed-width string field"),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(e: io::Error) -> Self {
        ProtocolError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
