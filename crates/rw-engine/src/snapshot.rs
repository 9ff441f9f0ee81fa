//! Server-side snapshot serialization: turns a world + results pair into
//! the BEGIN/CHUNK.../END byte sequence a session streams to a client.

use crate::results::Results;
use crate::world::World;

pub const CHUNK_MAX: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Obstacles,
    Trials,
    SumSteps,
    SuccLeqK,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Obstacles, Field::Trials, Field::SumSteps, Field::SuccLeqK];

    pub fn bit(self) -> u32 {
        1 << (self.wire_id() - 1)
    }

    pub fn wire_id(self) -> u16 {
        match self {
            Field::Obstacles => 1,
            Field::Trials => 2,
            Field::SumSteps => 3,
            Field::SuccLeqK => 4,
        }
    }

    pub fn element_size(self) -> usize {
        match self {
            Field::Obstacles => 1,
            Field::Trials => 4,
            Field::SumSteps => 8,
            Field::SuccLeqK => 4,
        }
    }
}

pub struct SnapshotBegin {
    pub snapshot_id: u32,
    pub cell_count: u32,
    pub included_fields: u32,
}

pub struct SnapshotChunk {
    pub field: Field,
    pub offset_bytes: u32,
    pub data: Vec<u8>,
}

/// Build the begin metadata plus every chunk (never larger than
/// `CHUNK_MAX` bytes of payload data) for the requested fields, in field
/// order. Chunks of different fields are independent and may be streamed
/// or interleaved by the caller; ordering within one field is preserved.
pub fn build(world: &World, results: &Results, snapshot_id: u32, fields: &[Field]) -> (SnapshotBegin, Vec<SnapshotChunk>) {
    let cell_count = world.cell_count();
    let mut included = 0u32;
    for f in fields {
        included |= f.bit();
    }

    let begin = SnapshotBegin { snapshot_id, cell_count, included_fields: included };

    let mut chunks = Vec::new();
    for &field in fields {
        let bytes = field_bytes(world, results, field);
        for start in (0..bytes.len()).step_by(CHUNK_MAX) {
            let end = (start + CHUNK_MAX).min(bytes.len());
            chunks.push(SnapshotChunk { field, offset_bytes: start as u32, data: bytes[start..end].to_vec() });
        }
    }

    (begin, chunks)
}

fn field_bytes(world: &World, results: &Results, field: Field) -> Vec<u8> {
    match field {
        Field::Obstacles => world.obstacle_bytes(),
        Field::Trials => results.trials().iter().flat_map(|&v| (v as u32).to_le_bytes()).collect(),
        Field::SumSteps => results.sum_steps().iter().flat_map(|&v| v.to_le_bytes()).collect(),
        Field::SuccLeqK => results.success_leq_k().iter().flat_map(|&v| (v as u32).to_le_bytes()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{WorldKind, WorldSize};

    #[test]
    fn chunks_never_exceed_max_and_cover_whole_field() {
        let world = World::new(WorldKind::Wrap, WorldSize { width: 40, height: 40 }).unwrap();
        let results = Results::new(world.cell_count());
        results.update(0, 3, true);
        let (begin, chunks) = build(&world, &results, 1, &[Field::SumSteps]);
        assert_eq!(begin.included_fields, Field::SumSteps.bit());

        let total_expected = world.cell_count() as usize * Field::SumSteps.element_size();
        let mut reassembled = vec![0u8; total_expected];
        for chunk in &chunks {
            assert!(chunk.data.len() <= CHUNK_MAX);
            let off = chunk.offset_bytes as usize;
            reassembled[off..off + chunk.data.len()].copy_from_slice(&chunk.data);
        }
        assert_eq!(reassembled.len(), total_expected);
    }

    #[test]
    fn included_fields_bitmask_matches_requested_set() {
        let world = World::new(WorldKind::Wrap, WorldSize { width: 2, height: 2 }).unwrap();
        let results = Results::new(world.cell_count());
        let (begin, _chunks) = build(&world, &results, 1, &[Field::Obstacles, Field::SuccLeqK]);
        assert_eq!(begin.included_fields, Field::Obstacles.bit() | Field::SuccLeqK.bit());
        assert_eq!(begin.included_fields & Field::Trials.bit(), 0);
    }
}
