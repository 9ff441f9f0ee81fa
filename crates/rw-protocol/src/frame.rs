//! Blocking and best-effort framed send/recv over a connected stream socket.

use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;

use crate::error::{ProtocolError, Result};
use crate::wire::MsgHeader;

/// Write a complete framed message: header then payload.
///
/// `std::io::Write::write_all` already retries on `ErrorKind::Interrupted`
/// and on short writes, so a single call does what a hand-rolled
/// write-all-bytes loop would.
pub fn send_msg(stream: &mut UnixStream, msg_type: u16, payload: &[u8]) -> Result<()> {
    let hdr = MsgHeader { msg_type, payload_len: payload.len() as u32 };
    stream.write_all(&hdr.encode())?;
    if !payload.is_empty() {
        stream.write_all(payload)?;
    }
    Ok(())
}

/// Read exactly one message header. Early EOF is reported as `Closed`.
pub fn recv_hdr(stream: &mut UnixStream) -> Result<MsgHeader> {
    let mut buf = [0u8; MsgHeader::WIRE_LEN];
    match stream.read_exact(&mut buf) {
        Ok(()) => Ok(MsgHeader::decode(&buf)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(ProtocolError::Closed),
        Err(e) => Err(ProtocolError::Io(e)),
    }
}

/// Read exactly `len` payload bytes.
pub fn recv_payload(stream: &mut UnixStream, len: u32) -> Result<Vec<u8>> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let mut buf = vec![0u8; len as usize];
    match stream.read_exact(&mut buf) {
        Ok(()) => Ok(buf),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(ProtocolError::Closed),
        Err(e) => Err(ProtocolError::Io(e)),
    }
}

/// Best-effort framed send used for broadcast notifications: a single
/// non-blocking `send(2)` call per chunk via `MSG_DONTWAIT`. Unlike toggling
/// `O_NONBLOCK` on the stream, this doesn't perturb the blocking mode seen
/// by other threads that may be reading/writing the same fd concurrently.
///
/// Returns `WouldBlock` (the caller should drop the notification for this
/// client) rather than blocking the producer.
pub fn send_msg_noblock(stream: &UnixStream, msg_type: u16, payload: &[u8]) -> Result<()> {
    let hdr = MsgHeader { msg_type, payload_len: payload.len() as u32 };
    let mut buf = Vec::with_capacity(MsgHeader::WIRE_LEN + payload.len());
    buf.extend_from_slice(&hdr.encode());
    buf.extend_from_slice(payload);
    send_all_noblock(stream, &buf)
}

fn send_all_noblock(stream: &UnixStream, buf: &[u8]) -> Result<()> {
    let fd = stream.as_raw_fd();
    let mut sent = 0usize;
    while sent < buf.len() {
        let ptr = buf[sent..].as_ptr() as *const libc::c_void;
        let remaining = buf.len() - sent;
        let n = unsafe { libc::send(fd, ptr, remaining, libc::MSG_DONTWAIT) };
        if n > 0 {
            sent += n as usize;
            continue;
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            continue;
        }
        if err.raw_os_error() == Some(libc::EAGAIN) || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
            return Err(ProtocolError::WouldBlock);
        }
        return Err(ProtocolError::Io(err));
    }
    Ok(())
}
