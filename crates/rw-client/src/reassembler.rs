//! Client-side reconstruction of a chunked snapshot stream.

use std::collections::HashMap;

use rw_protocol::wire::{SnapshotBegin, SnapshotChunk, SnapshotField};

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub snapshot_id: u32,
    pub width: u32,
    pub height: u32,
    pub included_fields: u32,
    pub buffers: HashMap<u16, Vec<u8>>,
}

impl Snapshot {
    pub fn field(&self, field: SnapshotField) -> Option<&[u8]> {
        self.buffers.get(&(field as u16)).map(|v| v.as_slice())
    }
}

/// Tracks one in-progress snapshot assembly. `begin` starts a new one
/// (discarding any prior incomplete assembly), `chunk` copies bounds-checked
/// data into the right field buffer, `end` hands back the finished result.
#[derive(Default)]
pub struct Reassembler {
    current: Option<InProgress>,
}

struct InProgress {
    snapshot_id: u32,
    width: u32,
    height: u32,
    cell_count: u32,
    included_fields: u32,
    buffers: HashMap<u16, Vec<u8>>,
}

impl Reassembler {
    pub fn new() -> Self {
        Reassembler { current: None }
    }

    pub fn begin(&mut self, begin: &SnapshotBegin) {
        let mut buffers = HashMap::new();
        for field in [
            SnapshotField::Obstacles,
            SnapshotField::Trials,
            SnapshotField::SumSteps,
            SnapshotField::SuccLeqK,
        ] {
            if begin.included_fields & field.bit() != 0 {
                let len = begin.cell_count as usize * field.element_size();
                buffers.insert(field as u16, vec![0u8; len]);
            }
        }
        self.current = Some(InProgress {
            snapshot_id: begin.snapshot_id,
            width: begin.size.width,
            height: begin.size.height,
            cell_count: begin.cell_count,
            included_fields: begin.included_fields,
            buffers,
        });
    }

    /// A chunk for a snapshot id that doesn't match the in-progress one is
    /// silently dropped: it is a late arrival from a stream that has
    /// already ended or been superseded.
    pub fn chunk(&mut self, chunk: &SnapshotChunk) {
        let Some(in_progress) = self.current.as_mut() else { return };
        if chunk.snapshot_id != in_progress.snapshot_id {
            return;
        }
        let Some(buf) = in_progress.buffers.get_mut(&chunk.field) else { return };
        let offset = chunk.offset_bytes as usize;
        let end = offset.saturating_add(chunk.data.len());
        if end > buf.len() {
            return;
        }
        buf[offset..end].copy_from_slice(&chunk.data);
    }

    /// Finalize the in-progress snapshot, if any, and clear assembly state.
    pub fn end(&mut self) -> Option<Snapshot> {
        let in_progress = self.current.take()?;
        Some(Snapshot {
            snapshot_id: in_progress.snapshot_id,
            width: in_progress.width,
            height: in_progress.height,
            included_fields: in_progress.included_fields,
            buffers: in_progress.buffers,
        })
    }

    pub fn cell_count_in_progress(&self) -> Option<u32> {
        self.current.as_ref().map(|p| p.cell_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rw_protocol::wire::{WireSize, WorldKind};

    fn begin_msg(cell_count: u32, fields: u32) -> SnapshotBegin {
        SnapshotBegin {
            snapshot_id: 1,
            size: WireSize { width: 4, height: 4 },
            world_kind: WorldKind::Wrap,
            cell_count,
            included_fields: fields,
        }
    }

    #[test]
    fn reassembles_full_field_from_chunks() {
        let mut r = Reassembler::new();
        r.begin(&begin_msg(16, SnapshotField::Obstacles.bit()));
        r.chunk(&SnapshotChunk { snapshot_id: 1, field: SnapshotField::Obstacles as u16, offset_bytes: 0, data: vec![1; 8] });
        r.chunk(&SnapshotChunk { snapshot_id: 1, field: SnapshotField::Obstacles as u16, offset_bytes: 8, data: vec![2; 8] });
        let snap = r.end().unwrap();
        let buf = snap.field(SnapshotField::Obstacles).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(buf[0], 1);
        assert_eq!(buf[15], 2);
    }

    #[test]
    fn stale_snapshot_id_chunk_is_ignored() {
        let mut r = Reassembler::new();
        r.begin(&begin_msg(4, SnapshotField::Trials.bit()));
        r.chunk(&SnapshotChunk { snapshot_id: 999, field: SnapshotField::Trials as u16, offset_bytes: 0, data: vec![9; 4] });
        let snap = r.end().unwrap();
        let buf = snap.field(SnapshotField::Trials).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn out_of_bounds_chunk_is_dropped() {
        let mut r = Reassembler::new();
        r.begin(&begin_msg(2, SnapshotField::SuccLeqK.bit()));
        r.chunk(&SnapshotChunk { snapshot_id: 1, field: SnapshotField::SuccLeqK as u16, offset_bytes: 6, data: vec![1, 2, 3, 4] });
        let snap = r.end().unwrap();
        let buf = snap.field(SnapshotField::SuccLeqK).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn begin_discards_prior_incomplete_assembly() {
        let mut r = Reassembler::new();
        r.begin(&begin_msg(4, SnapshotField::Trials.bit()));
        r.begin(&begin_msg(8, SnapshotField::SumSteps.bit()));
        assert_eq!(r.cell_count_in_progress(), Some(8));
    }
}
