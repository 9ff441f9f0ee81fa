//! JOIN/WELCOME handshake: performed once per connection, before the
//! dispatcher reader thread takes over the socket.

use std::os::unix::net::UnixStream;
use std::path::Path;

use rw_protocol::frame::{recv_hdr, recv_payload, send_msg};
use rw_protocol::wire::{Join, MsgType, Welcome};
use rw_protocol::ProtocolError;

use crate::error::{ClientError, Result};

/// Connect to the server at `path`, send JOIN with this process's pid,
/// and wait for WELCOME. The connection is rejected (closed) by the
/// server on any framing or type mismatch, which surfaces here as an
/// error.
pub fn connect(path: &Path) -> Result<(UnixStream, Welcome)> {
    let mut stream = UnixStream::connect(path).map_err(ProtocolError::Io)?;

    let join = Join { pid: std::process::id() };
    send_msg(&mut stream, MsgType::Join as u16, &join.encode())?;

    let hdr = recv_hdr(&mut stream)?;
    let payload = recv_payload(&mut stream, hdr.payload_len)?;

    if hdr.msg_type != MsgType::Welcome as u16 {
        return Err(ClientError::UnexpectedType(hdr.msg_type));
    }
    let welcome = Welcome::decode(&payload).map_err(ClientError::from)?;

    Ok((stream, welcome))
}
