//! Wire framing and message definitions for the random-walk engine's local
//! IPC protocol (`AF_UNIX`, `SOCK_STREAM`).

pub mod error;
pub mod frame;
pub mod logging;
pub mod wire;

pub use error::{ProtocolError, Result};
pub use wire::{MsgHeader, MsgType};

#[cfg(test)]
mod tests {
    use super::wire::*;
    use super::ProtocolError;

    #[test]
    fn header_roundtrip() {
        let hdr = MsgHeader { msg_type: MsgType::Status as u16, payload_len: 123 };
        let bytes = hdr.encode();
        let back = MsgHeader::decode(&bytes);
        assert_eq!(hdr, back);
        // reserved field must be zero in the wire encoding
        assert_eq!(bytes[2], 0);
        assert_eq!(bytes[3], 0);
    }

    #[test]
    fn welcome_roundtrip() {
        let w = Welcome {
            world_kind: WorldKind::Obstacles,
            size: WireSize { width: 4, height: 4 },
            probs: MoveProbs { p_up: 0.25, p_down: 0.25, p_left: 0.25, p_right: 0.25 },
            k_max_steps: 10,
            total_reps: 3,
            current_rep: 0,
            global_mode: GlobalMode::Interactive,
            origin: WirePos { x: 0, y: 0 },
        };
        let bytes = w.encode();
        assert_eq!(bytes.len(), Welcome::WIRE_LEN as usize);
        let back = Welcome::decode(&bytes).unwrap();
        assert_eq!(back.size.width, 4);
        assert_eq!(back.k_max_steps, 10);
        assert_eq!(back.probs.p_up, 0.25);
        assert_eq!(back.world_kind, WorldKind::Obstacles);
    }

    #[test]
    fn snapshot_chunk_only_encodes_declared_len() {
        let chunk = SnapshotChunk {
            snapshot_id: 7,
            field: SnapshotField::Trials as u16,
            offset_bytes: 16,
            data: vec![1, 2, 3, 4],
        };
        let bytes = chunk.encode();
        // fixed prefix + exactly data.len(), never the 4096-byte max.
        assert_eq!(bytes.len(), SnapshotChunk::FIXED_LEN as usize + 4);
        let back = SnapshotChunk::decode(&bytes).unwrap();
        assert_eq!(back.snapshot_id, 7);
        assert_eq!(back.offset_bytes, 16);
        assert_eq!(back.data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn load_world_path_roundtrip() {
        let req = LoadWorld { path: "/tmp/world.bin".to_string(), multi_user: true };
        let bytes = req.encode().unwrap();
        assert_eq!(bytes.len(), LoadWorld::WIRE_LEN as usize);
        let back = LoadWorld::decode(&bytes).unwrap();
        assert_eq!(back.path, "/tmp/world.bin");
        assert!(back.multi_user);
    }

    #[test]
    fn snapshot_field_bit_positions() {
        assert_eq!(SnapshotField::Obstacles.bit(), 0b0001);
        assert_eq!(SnapshotField::Trials.bit(), 0b0010);
        assert_eq!(SnapshotField::SumSteps.bit(), 0b0100);
        assert_eq!(SnapshotField::SuccLeqK.bit(), 0b1000);
    }

    #[test]
    fn unknown_type_rejected() {
        match MsgType::from_u16(999) {
            Err(ProtocolError::UnknownType(999)) => {}
            other => panic!("expected UnknownType, got {:?}", other),
        }
    }
}
