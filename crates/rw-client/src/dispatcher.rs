//! Single-reader dispatcher: one thread owns every post-handshake read on
//! the connection, routing async notifications and snapshot chunks while
//! serializing exactly one in-flight synchronous request at a time.

use std::os::unix::net::UnixStream;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rw_protocol::frame::{recv_hdr, recv_payload, send_msg};
use rw_protocol::wire::{MsgHeader, MsgType, SnapshotBegin, SnapshotChunk};

use crate::error::{ClientError, Result};
use crate::reassembler::{Reassembler, Snapshot};

/// What arrived for a caller waiting on `send_and_wait`.
struct ResponseSlot {
    reply: Option<(MsgHeader, Vec<u8>)>,
    reader_failed: Option<ProtocolFailure>,
}

#[derive(Clone, Debug)]
struct ProtocolFailure(String);

struct Shared {
    stream: Mutex<UnixStream>,
    slot: Mutex<ResponseSlot>,
    slot_ready: Condvar,
    /// Serializes callers of `send_and_wait`: only one may have an
    /// outstanding request at a time.
    request_gate: Mutex<()>,
    expected: Mutex<Vec<u16>>,
    reassembler: Mutex<Reassembler>,
    latest_snapshot: Mutex<Option<Snapshot>>,
}

pub struct Dispatcher {
    shared: Arc<Shared>,
    reader: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start the reader thread. `stream` must already be past the
    /// JOIN/WELCOME handshake.
    pub fn spawn(stream: UnixStream) -> Result<Self> {
        let reader_stream = stream.try_clone().map_err(rw_protocol::ProtocolError::Io)?;
        let shared = Arc::new(Shared {
            stream: Mutex::new(stream),
            slot: Mutex::new(ResponseSlot { reply: None, reader_failed: None }),
            slot_ready: Condvar::new(),
            request_gate: Mutex::new(()),
            expected: Mutex::new(Vec::new()),
            reassembler: Mutex::new(Reassembler::new()),
            latest_snapshot: Mutex::new(None),
        });

        let reader_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("rw-client-dispatcher".to_string())
            .spawn(move || reader_loop(reader_shared, reader_stream))
            .expect("failed to spawn dispatcher reader thread");

        Ok(Dispatcher { shared, reader: Some(handle) })
    }

    /// Send `req_type`/`payload` and wait for a reply whose type is in
    /// `expected_types`, up to `timeout_ms` (0 = wait indefinitely).
    pub fn send_and_wait(&self, req_type: u16, payload: &[u8], expected_types: &[u16], timeout_ms: u64) -> Result<(MsgHeader, Vec<u8>)> {
        let _gate = self.shared.request_gate.lock().unwrap();

        {
            let mut expected = self.shared.expected.lock().unwrap();
            *expected = expected_types.to_vec();
            let mut slot = self.shared.slot.lock().unwrap();
            slot.reply = None;
        }

        {
            let mut stream = self.shared.stream.lock().unwrap();
            send_msg(&mut stream, req_type, payload)?;
        }

        let mut slot = self.shared.slot.lock().unwrap();
        let deadline = if timeout_ms == 0 { None } else { Some(Instant::now() + Duration::from_millis(timeout_ms)) };

        loop {
            if let Some(failure) = slot.reader_failed.clone() {
                return Err(ClientError::ReaderFailed(rw_protocol::ProtocolError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    failure.0,
                ))));
            }
            if let Some((hdr, payload)) = slot.reply.take() {
                return Ok((hdr, payload));
            }
            match deadline {
                None => {
                    slot = self.shared.slot_ready.wait(slot).unwrap();
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ClientError::Timeout);
                    }
                    let (new_slot, timeout) = self.shared.slot_ready.wait_timeout(slot, deadline - now).unwrap();
                    slot = new_slot;
                    if timeout.timed_out() && slot.reply.is_none() && slot.reader_failed.is_none() {
                        return Err(ClientError::Timeout);
                    }
                }
            }
        }
    }

    pub fn latest_snapshot(&self) -> Option<Snapshot> {
        self.shared.latest_snapshot.lock().unwrap().take()
    }

    pub fn send_fire_and_forget(&self, msg_type: u16, payload: &[u8]) -> Result<()> {
        let mut stream = self.shared.stream.lock().unwrap();
        send_msg(&mut stream, msg_type, payload)?;
        Ok(())
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Ok(stream) = self.shared.stream.lock() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

fn reader_loop(shared: Arc<Shared>, mut stream: UnixStream) {
    loop {
        let hdr = match recv_hdr(&mut stream) {
            Ok(hdr) => hdr,
            Err(e) => {
                fail_waiters(&shared, &e.to_string());
                return;
            }
        };
        let payload = match recv_payload(&mut stream, hdr.payload_len) {
            Ok(p) => p,
            Err(e) => {
                fail_waiters(&shared, &e.to_string());
                return;
            }
        };

        route(&shared, hdr, payload);
    }
}

fn route(shared: &Shared, hdr: MsgHeader, payload: Vec<u8>) {
    match MsgType::from_u16(hdr.msg_type) {
        Ok(MsgType::Progress) | Ok(MsgType::End) | Ok(MsgType::GlobalModeChanged) => {
            // Silently consumed: the interactive prompt doesn't block on these.
        }
        Ok(MsgType::SnapshotBegin) => {
            if let Ok(begin) = SnapshotBegin::decode(&payload) {
                shared.reassembler.lock().unwrap().begin(&begin);
            }
        }
        Ok(MsgType::SnapshotChunk) => {
            if let Ok(chunk) = SnapshotChunk::decode(&payload) {
                shared.reassembler.lock().unwrap().chunk(&chunk);
            }
        }
        Ok(MsgType::SnapshotEnd) => {
            if let Some(snap) = shared.reassembler.lock().unwrap().end() {
                *shared.latest_snapshot.lock().unwrap() = Some(snap);
            }
        }
        _ => {
            let expected = shared.expected.lock().unwrap();
            if expected.contains(&hdr.msg_type) {
                drop(expected);
                let mut slot = shared.slot.lock().unwrap();
                slot.reply = Some((hdr, payload));
                drop(slot);
                shared.slot_ready.notify_all();
            }
            // else: no caller waiting, or wrong type for the current
            // caller — the message is dropped.
        }
    }
}

fn fail_waiters(shared: &Shared, message: &str) {
    let mut slot = shared.slot.lock().unwrap();
    slot.reader_failed = Some(ProtocolFailure(message.to_string()));
    drop(slot);
    shared.slot_ready.notify_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rw_protocol::frame::send_msg;

    #[test]
    fn send_and_wait_returns_matching_reply() {
        let (client_sock, mut server_sock) = UnixStream::pair().unwrap();
        let server = std::thread::spawn(move || {
            let hdr = recv_hdr(&mut server_sock).unwrap();
            let _payload = recv_payload(&mut server_sock, hdr.payload_len).unwrap();
            send_msg(&mut server_sock, MsgType::Ack as u16, &[0, 0, 0, 0]).unwrap();
        });

        let dispatcher = Dispatcher::spawn(client_sock).unwrap();
        let (hdr, _payload) = dispatcher
            .send_and_wait(MsgType::QueryStatus as u16, &[], &[MsgType::Ack as u16, MsgType::Status as u16], 2000)
            .unwrap();
        assert_eq!(hdr.msg_type, MsgType::Ack as u16);

        server.join().unwrap();
    }

    #[test]
    fn progress_and_end_are_consumed_silently() {
        let (client_sock, mut server_sock) = UnixStream::pair().unwrap();
        let server = std::thread::spawn(move || {
            send_msg(&mut server_sock, MsgType::Progress as u16, &[1, 0, 0, 0, 2, 0, 0, 0]).unwrap();
            let hdr = recv_hdr(&mut server_sock).unwrap();
            let _payload = recv_payload(&mut server_sock, hdr.payload_len).unwrap();
            send_msg(&mut server_sock, MsgType::Ack as u16, &[0, 0, 0, 0]).unwrap();
        });

        let dispatcher = Dispatcher::spawn(client_sock).unwrap();
        let (hdr, _payload) = dispatcher
            .send_and_wait(MsgType::QueryStatus as u16, &[], &[MsgType::Ack as u16], 2000)
            .unwrap();
        assert_eq!(hdr.msg_type, MsgType::Ack as u16);

        server.join().unwrap();
    }

    #[test]
    fn timeout_elapses_when_no_reply_arrives() {
        let (client_sock, server_sock) = UnixStream::pair().unwrap();
        let dispatcher = Dispatcher::spawn(client_sock).unwrap();
        let result = dispatcher.send_and_wait(MsgType::QueryStatus as u16, &[], &[MsgType::Ack as u16], 100);
        assert!(matches!(result, Err(ClientError::Timeout)));
        drop(server_sock);
    }
}
