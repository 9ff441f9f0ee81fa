//! Message type registry and manual little-endian (de)serialization.
//!
//! Every payload struct here mirrors a packed C struct: fields are encoded
//! in declaration order, little-endian, with no implicit padding. There is
//! no serde in this crate — encoding is hand-rolled to keep the wire layout
//! exactly under our control.

use crate::error::{ProtocolError, Result};

pub const PATH_MAX: usize = 256;
pub const ERROR_MSG_MAX: usize = 256;
pub const SNAPSHOT_CHUNK_MAX: usize = 4096;

/// Fixed header that precedes every message's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    pub msg_type: u16,
    pub payload_len: u32,
}

impl MsgHeader {
    pub const WIRE_LEN: usize = 8;

    pub fn encode(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0..2].copy_from_slice(&self.msg_type.to_le_bytes());
        buf[2..4].copy_from_slice(&0u16.to_le_bytes()); // reserved, must be 0
        buf[4..8].copy_from_slice(&self.payload_len.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; Self::WIRE_LEN]) -> Self {
        let msg_type = u16::from_le_bytes([buf[0], buf[1]]);
        let payload_len = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        MsgHeader { msg_type, payload_len }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MsgType {
    Join = 1,
    Welcome = 2,
    SetGlobalMode = 3,
    GlobalModeChanged = 4,
    Progress = 5,
    SnapshotBegin = 6,
    SnapshotChunk = 7,
    SnapshotEnd = 8,
    StopSim = 9,
    End = 10,
    QueryStatus = 11,
    Status = 12,
    CreateSim = 13,
    LoadWorld = 14,
    StartSim = 15,
    RequestSnapshot = 16,
    RestartSim = 17,
    LoadResults = 18,
    SaveResults = 19,
    Quit = 20,
    Ack = 21,
    Error = 255,
}

impl MsgType {
    pub fn from_u16(v: u16) -> Result<Self> {
        use MsgType::*;
        Ok(match v {
            1 => Join,
            2 => Welcome,
            3 => SetGlobalMode,
            4 => GlobalModeChanged,
            5 => Progress,
            6 => SnapshotBegin,
            7 => SnapshotChunk,
            8 => SnapshotEnd,
            9 => StopSim,
            10 => End,
            11 => QueryStatus,
            12 => Status,
            13 => CreateSim,
            14 => LoadWorld,
            15 => StartSim,
            16 => RequestSnapshot,
            17 => RestartSim,
            18 => LoadResults,
            19 => SaveResults,
            20 => Quit,
            21 => Ack,
            255 => Error,
            other => return Err(ProtocolError::UnknownType(other)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum WorldKind {
    Wrap = 1,
    Obstacles = 2,
}

impl WorldKind {
    pub fn from_u32(v: u32) -> Self {
        if v == WorldKind::Obstacles as u32 {
            WorldKind::Obstacles
        } else {
            WorldKind::Wrap
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GlobalMode {
    Interactive = 1,
    Summary = 2,
}

impl GlobalMode {
    pub fn from_u32(v: u32) -> Self {
        if v == GlobalMode::Summary as u32 {
            GlobalMode::Summary
        } else {
            GlobalMode::Interactive
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SimState {
    Lobby = 1,
    Running = 2,
    Finished = 3,
}

impl SimState {
    pub fn from_u32(v: u32) -> Self {
        match v {
            2 => SimState::Running,
            3 => SimState::Finished,
            _ => SimState::Lobby,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SnapshotField {
    Obstacles = 1,
    Trials = 2,
    SumSteps = 3,
    SuccLeqK = 4,
}

impl SnapshotField {
    pub fn from_u16(v: u16) -> Option<Self> {
        Some(match v {
            1 => SnapshotField::Obstacles,
            2 => SnapshotField::Trials,
            3 => SnapshotField::SumSteps,
            4 => SnapshotField::SuccLeqK,
            _ => return None,
        })
    }

    pub fn bit(self) -> u32 {
        1u32 << ((self as u16) - 1)
    }

    pub fn element_size(self) -> usize {
        match self {
            SnapshotField::Obstacles => 1,
            SnapshotField::Trials => 4,
            SnapshotField::SumSteps => 8,
            SnapshotField::SuccLeqK => 4,
        }
    }
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}
fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}
fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}
fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}
fn put_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(ProtocolError::BadPayloadLen {
                msg_type: 0,
                got: self.buf.len() as u32,
                want: (self.pos + n) as u32,
            });
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }
    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_le_bytes(a))
    }
    fn i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
    fn f64(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(f64::from_le_bytes(a))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveProbs {
    pub p_up: f64,
    pub p_down: f64,
    pub p_left: f64,
    pub p_right: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WirePos {
    pub x: i32,
    pub y: i32,
}

fn put_size(buf: &mut Vec<u8>, s: WireSize) {
    put_u32(buf, s.width);
    put_u32(buf, s.height);
}
fn get_size(r: &mut Reader) -> Result<WireSize> {
    Ok(WireSize { width: r.u32()?, height: r.u32()? })
}
fn put_probs(buf: &mut Vec<u8>, p: MoveProbs) {
    put_f64(buf, p.p_up);
    put_f64(buf, p.p_down);
    put_f64(buf, p.p_left);
    put_f64(buf, p.p_right);
}
fn get_probs(r: &mut Reader) -> Result<MoveProbs> {
    Ok(MoveProbs {
        p_up: r.f64()?,
        p_down: r.f64()?,
        p_left: r.f64()?,
        p_right: r.f64()?,
    })
}
fn put_path(buf: &mut Vec<u8>, path: &str) -> Result<()> {
    let bytes = path.as_bytes();
    if bytes.len() >= PATH_MAX {
        return Err(ProtocolError::BadString);
    }
    let start = buf.len();
    buf.resize(start + PATH_MAX, 0);
    buf[start..start + bytes.len()].copy_from_slice(bytes);
    Ok(())
}
fn get_path(r: &mut Reader) -> Result<String> {
    let b = r.take(PATH_MAX)?;
    let nul = b.iter().position(|&c| c == 0).unwrap_or(b.len());
    std::str::from_utf8(&b[..nul])
        .map(|s| s.to_string())
        .map_err(|_| ProtocolError::BadString)
}

#[derive(Debug, Clone, Copy)]
pub struct Join {
    pub pid: u32,
}
impl Join {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4);
        put_u32(&mut buf, self.pid);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        Ok(Join { pid: r.u32()? })
    }
    pub const WIRE_LEN: u32 = 4;
}

#[derive(Debug, Clone, Copy)]
pub struct Welcome {
    pub world_kind: WorldKind,
    pub size: WireSize,
    pub probs: MoveProbs,
    pub k_max_steps: u32,
    pub total_reps: u32,
    pub current_rep: u32,
    pub global_mode: GlobalMode,
    pub origin: WirePos,
}
impl Welcome {
    pub const WIRE_LEN: u32 = 4 + 8 + 32 + 4 + 4 + 4 + 4 + 8;
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::WIRE_LEN as usize);
        put_u32(&mut buf, self.world_kind as u32);
        put_size(&mut buf, self.size);
        put_probs(&mut buf, self.probs);
        put_u32(&mut buf, self.k_max_steps);
        put_u32(&mut buf, self.total_reps);
        put_u32(&mut buf, self.current_rep);
        put_u32(&mut buf, self.global_mode as u32);
        put_i32(&mut buf, self.origin.x);
        put_i32(&mut buf, self.origin.y);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        let world_kind = WorldKind::from_u32(r.u32()?);
        let size = get_size(&mut r)?;
        let probs = get_probs(&mut r)?;
        let k_max_steps = r.u32()?;
        let total_reps = r.u32()?;
        let current_rep = r.u32()?;
        let global_mode = GlobalMode::from_u32(r.u32()?);
        let origin = WirePos { x: r.i32()?, y: r.i32()? };
        Ok(Welcome { world_kind, size, probs, k_max_steps, total_reps, current_rep, global_mode, origin })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SetGlobalMode {
    pub new_mode: GlobalMode,
}
impl SetGlobalMode {
    pub const WIRE_LEN: u32 = 4;
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4);
        put_u32(&mut buf, self.new_mode as u32);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        Ok(SetGlobalMode { new_mode: GlobalMode::from_u32(r.u32()?) })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GlobalModeChanged {
    pub new_mode: GlobalMode,
    pub changed_by_pid: u32,
}
impl GlobalModeChanged {
    pub const WIRE_LEN: u32 = 8;
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        put_u32(&mut buf, self.new_mode as u32);
        put_u32(&mut buf, self.changed_by_pid);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        Ok(GlobalModeChanged { new_mode: GlobalMode::from_u32(r.u32()?), changed_by_pid: r.u32()? })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub current_rep: u32,
    pub total_reps: u32,
}
impl Progress {
    pub const WIRE_LEN: u32 = 8;
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        put_u32(&mut buf, self.current_rep);
        put_u32(&mut buf, self.total_reps);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        Ok(Progress { current_rep: r.u32()?, total_reps: r.u32()? })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SnapshotBegin {
    pub snapshot_id: u32,
    pub size: WireSize,
    pub world_kind: WorldKind,
    pub cell_count: u32,
    pub included_fields: u32,
}
impl SnapshotBegin {
    pub const WIRE_LEN: u32 = 4 + 8 + 4 + 4 + 4;
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::WIRE_LEN as usize);
        put_u32(&mut buf, self.snapshot_id);
        put_size(&mut buf, self.size);
        put_u32(&mut buf, self.world_kind as u32);
        put_u32(&mut buf, self.cell_count);
        put_u32(&mut buf, self.included_fields);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        let snapshot_id = r.u32()?;
        let size = get_size(&mut r)?;
        let world_kind = WorldKind::from_u32(r.u32()?);
        let cell_count = r.u32()?;
        let included_fields = r.u32()?;
        Ok(SnapshotBegin { snapshot_id, size, world_kind, cell_count, included_fields })
    }
}

/// A snapshot chunk. `data` holds exactly `data_len` valid bytes; the wire
/// encoding only ever writes those bytes (never the full 4096-byte slack).
#[derive(Debug, Clone)]
pub struct SnapshotChunk {
    pub snapshot_id: u32,
    pub field: u16,
    pub offset_bytes: u32,
    pub data: Vec<u8>,
}
impl SnapshotChunk {
    pub const FIXED_LEN: u32 = 4 + 2 + 2 + 4 + 4; // snapshot_id,field,reserved,offset,data_len

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::FIXED_LEN as usize + self.data.len());
        put_u32(&mut buf, self.snapshot_id);
        put_u16(&mut buf, self.field);
        put_u16(&mut buf, 0);
        put_u32(&mut buf, self.offset_bytes);
        put_u32(&mut buf, self.data.len() as u32);
        buf.extend_from_slice(&self.data);
        buf
    }

    pub fn decode(b: &[u8]) -> Result<Self> {
        if (b.len() as u32) < Self::FIXED_LEN {
            return Err(ProtocolError::BadPayloadLen {
                msg_type: MsgType::SnapshotChunk as u16,
                got: b.len() as u32,
                want: Self::FIXED_LEN,
            });
        }
        let mut r = Reader::new(b);
        let snapshot_id = r.u32()?;
        let field = r.u16()?;
        let _reserved = r.u16()?;
        let offset_bytes = r.u32()?;
        let data_len = r.u32()? as usize;
        let rest = &b[Self::FIXED_LEN as usize..];
        if rest.len() < data_len || data_len > SNAPSHOT_CHUNK_MAX {
            return Err(ProtocolError::BadPayloadLen {
                msg_type: MsgType::SnapshotChunk as u16,
                got: rest.len() as u32,
                want: data_len as u32,
            });
        }
        Ok(SnapshotChunk {
            snapshot_id,
            field,
            offset_bytes,
            data: rest[..data_len].to_vec(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StopSim {
    pub pid: u32,
}
impl StopSim {
    pub const WIRE_LEN: u32 = 4;
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4);
        put_u32(&mut buf, self.pid);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        Ok(StopSim { pid: r.u32()? })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct End {
    pub reason: u32,
}
impl End {
    pub const WIRE_LEN: u32 = 4;
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4);
        put_u32(&mut buf, self.reason);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        Ok(End { reason: r.u32()? })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryStatus {
    pub pid: u32,
}
impl QueryStatus {
    pub const WIRE_LEN: u32 = 4;
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4);
        put_u32(&mut buf, self.pid);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        Ok(QueryStatus { pid: r.u32()? })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Status {
    pub world_kind: WorldKind,
    pub size: WireSize,
    pub probs: MoveProbs,
    pub k_max_steps: u32,
    pub total_reps: u32,
    pub current_rep: u32,
    pub global_mode: GlobalMode,
    pub sim_state: SimState,
    pub multi_user: bool,
    pub can_control: bool,
}
impl Status {
    pub const WIRE_LEN: u32 = 4 + 8 + 32 + 4 + 4 + 4 + 4 + 4 + 1 + 1 + 2;
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::WIRE_LEN as usize);
        put_u32(&mut buf, self.world_kind as u32);
        put_size(&mut buf, self.size);
        put_probs(&mut buf, self.probs);
        put_u32(&mut buf, self.k_max_steps);
        put_u32(&mut buf, self.total_reps);
        put_u32(&mut buf, self.current_rep);
        put_u32(&mut buf, self.global_mode as u32);
        put_u32(&mut buf, self.sim_state as u32);
        buf.push(self.multi_user as u8);
        buf.push(self.can_control as u8);
        put_u16(&mut buf, 0);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        let world_kind = WorldKind::from_u32(r.u32()?);
        let size = get_size(&mut r)?;
        let probs = get_probs(&mut r)?;
        let k_max_steps = r.u32()?;
        let total_reps = r.u32()?;
        let current_rep = r.u32()?;
        let global_mode = GlobalMode::from_u32(r.u32()?);
        let sim_state = SimState::from_u32(r.u32()?);
        let multi_user = r.take(1)?[0] != 0;
        let can_control = r.take(1)?[0] != 0;
        let _reserved = r.u16()?;
        Ok(Status {
            world_kind, size, probs, k_max_steps, total_reps, current_rep,
            global_mode, sim_state, multi_user, can_control,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CreateSim {
    pub world_kind: WorldKind,
    pub size: WireSize,
    pub probs: MoveProbs,
    pub k_max_steps: u32,
    pub total_reps: u32,
    pub multi_user: bool,
}
impl CreateSim {
    pub const WIRE_LEN: u32 = 4 + 8 + 32 + 4 + 4 + 1 + 3;
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::WIRE_LEN as usize);
        put_u32(&mut buf, self.world_kind as u32);
        put_size(&mut buf, self.size);
        put_probs(&mut buf, self.probs);
        put_u32(&mut buf, self.k_max_steps);
        put_u32(&mut buf, self.total_reps);
        buf.push(self.multi_user as u8);
        buf.extend_from_slice(&[0, 0, 0]);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        let world_kind = WorldKind::from_u32(r.u32()?);
        let size = get_size(&mut r)?;
        let probs = get_probs(&mut r)?;
        let k_max_steps = r.u32()?;
        let total_reps = r.u32()?;
        let multi_user = r.take(1)?[0] != 0;
        let _pad = r.take(3)?;
        Ok(CreateSim { world_kind, size, probs, k_max_steps, total_reps, multi_user })
    }
}

#[derive(Debug, Clone)]
pub struct LoadWorld {
    pub path: String,
    pub multi_user: bool,
}
impl LoadWorld {
    pub const WIRE_LEN: u32 = PATH_MAX as u32 + 1 + 3;
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::WIRE_LEN as usize);
        put_path(&mut buf, &self.path)?;
        buf.push(self.multi_user as u8);
        buf.extend_from_slice(&[0, 0, 0]);
        Ok(buf)
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        let path = get_path(&mut r)?;
        let multi_user = r.take(1)?[0] != 0;
        let _pad = r.take(3)?;
        Ok(LoadWorld { path, multi_user })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequestSnapshot {
    pub pid: u32,
}
impl RequestSnapshot {
    pub const WIRE_LEN: u32 = 4;
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4);
        put_u32(&mut buf, self.pid);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        Ok(RequestSnapshot { pid: r.u32()? })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RestartSim {
    pub total_reps: u32,
}
impl RestartSim {
    pub const WIRE_LEN: u32 = 4;
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4);
        put_u32(&mut buf, self.total_reps);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        Ok(RestartSim { total_reps: r.u32()? })
    }
}

#[derive(Debug, Clone)]
pub struct LoadResults {
    pub path: String,
}
impl LoadResults {
    pub const WIRE_LEN: u32 = PATH_MAX as u32;
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::WIRE_LEN as usize);
        put_path(&mut buf, &self.path)?;
        Ok(buf)
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        Ok(LoadResults { path: get_path(&mut r)? })
    }
}

#[derive(Debug, Clone)]
pub struct SaveResults {
    pub path: String,
}
impl SaveResults {
    pub const WIRE_LEN: u32 = PATH_MAX as u32;
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::WIRE_LEN as usize);
        put_path(&mut buf, &self.path)?;
        Ok(buf)
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        Ok(SaveResults { path: get_path(&mut r)? })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Quit {
    pub pid: u32,
    pub stop_if_owner: bool,
}
impl Quit {
    pub const WIRE_LEN: u32 = 4 + 1 + 3;
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::WIRE_LEN as usize);
        put_u32(&mut buf, self.pid);
        buf.push(self.stop_if_owner as u8);
        buf.extend_from_slice(&[0, 0, 0]);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        let pid = r.u32()?;
        let stop_if_owner = r.take(1)?[0] != 0;
        let _pad = r.take(3)?;
        Ok(Quit { pid, stop_if_owner })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ack {
    pub request_type: u16,
    pub status: u16,
}
impl Ack {
    pub const WIRE_LEN: u32 = 4;
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4);
        put_u16(&mut buf, self.request_type);
        put_u16(&mut buf, self.status);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        Ok(Ack { request_type: r.u16()?, status: r.u16()? })
    }
}

#[derive(Debug, Clone)]
pub struct WireError {
    pub code: u32,
    pub message: String,
}
impl WireError {
    pub const WIRE_LEN: u32 = 4 + ERROR_MSG_MAX as u32;
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::WIRE_LEN as usize);
        put_u32(&mut buf, self.code);
        let bytes = self.message.as_bytes();
        let n = bytes.len().min(ERROR_MSG_MAX - 1);
        let start = buf.len();
        buf.resize(start + ERROR_MSG_MAX, 0);
        buf[start..start + n].copy_from_slice(&bytes[..n]);
        buf
    }
    pub fn decode(b: &[u8]) -> Result<Self> {
        let mut r = Reader::new(b);
        let code = r.u32()?;
        let msg_bytes = r.take(ERROR_MSG_MAX)?;
        let nul = msg_bytes.iter().position(|&c| c == 0).unwrap_or(msg_bytes.len());
        let message = std::str::from_utf8(&msg_bytes[..nul])
            .map(|s| s.to_string())
            .map_err(|_| ProtocolError::BadString)?;
        Ok(WireError { code, message })
    }
}
