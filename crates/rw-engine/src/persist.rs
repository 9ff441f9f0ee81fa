//! Binary persistence for results files and world-only files.
//!
//! Both share a fixed 36-byte header; a results file continues with the
//! obstacle bitmap and all three results arrays, while a world-only file
//! stops after the obstacle bitmap. World files are read-only from this
//! engine's side: `LOAD_WORLD` reads one, but nothing here ever writes one.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{PersistError, Result};
use crate::results::Results;
use crate::world::{World, WorldKind, WorldSize};

const MAGIC: &[u8; 8] = b"RWRES\0\0\0";
const VERSION: u32 = 1;

pub struct Header {
    pub world_kind: WorldKind,
    pub size: WorldSize,
    pub probs: [f64; 4],
    pub k_max_steps: u32,
    pub total_reps: u32,
}

fn write_header(out: &mut Vec<u8>, h: &Header) {
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    let kind = match h.world_kind {
        WorldKind::Wrap => 1u32,
        WorldKind::Obstacles => 2u32,
    };
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(&h.size.width.to_le_bytes());
    out.extend_from_slice(&h.size.height.to_le_bytes());
    for p in h.probs {
        out.extend_from_slice(&p.to_le_bytes());
    }
    out.extend_from_slice(&h.k_max_steps.to_le_bytes());
    out.extend_from_slice(&h.total_reps.to_le_bytes());
}

const HEADER_LEN: usize = 8 + 4 + 4 + 4 + 4 + 8 * 4 + 4 + 4;

fn read_header(buf: &[u8]) -> Result<Header> {
    if buf.len() < HEADER_LEN {
        return Err(PersistError::BadMagic.into());
    }
    if &buf[0..8] != MAGIC {
        return Err(PersistError::BadMagic.into());
    }
    let version = u32::from_le_bytes(buf[8..12].try_into().unwrap());
    if version != VERSION {
        return Err(PersistError::BadVersion(version).into());
    }
    let kind_raw = u32::from_le_bytes(buf[12..16].try_into().unwrap());
    let world_kind = if kind_raw == 2 { WorldKind::Obstacles } else { WorldKind::Wrap };
    let width = u32::from_le_bytes(buf[16..20].try_into().unwrap());
    let height = u32::from_le_bytes(buf[20..24].try_into().unwrap());
    let mut probs = [0.0f64; 4];
    for (i, p) in probs.iter_mut().enumerate() {
        let off = 24 + i * 8;
        *p = f64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
    }
    let k_max_steps = u32::from_le_bytes(buf[56..60].try_into().unwrap());
    let total_reps = u32::from_le_bytes(buf[60..64].try_into().unwrap());
    Ok(Header { world_kind, size: WorldSize { width, height }, probs, k_max_steps, total_reps })
}

/// Write a full results file: header, obstacle bitmap, then the three
/// per-cell results arrays.
pub fn save_results(path: &Path, header: &Header, world: &World, results: &Results) -> Result<()> {
    let mut buf = Vec::new();
    write_header(&mut buf, header);
    buf.extend_from_slice(&world.obstacle_bytes());

    let trials = results.trials();
    let sum_steps = results.sum_steps();
    let success_leq_k = results.success_leq_k();
    for &t in &trials {
        buf.extend_from_slice(&(t as u32).to_le_bytes());
    }
    for &s in &sum_steps {
        buf.extend_from_slice(&s.to_le_bytes());
    }
    for &s in &success_leq_k {
        buf.extend_from_slice(&(s as u32).to_le_bytes());
    }

    let mut file = File::create(path).map_err(PersistError::from)?;
    file.write_all(&buf).map_err(PersistError::from)?;
    Ok(())
}

pub struct LoadedResults {
    pub header: Header,
    pub world: World,
    pub trials: Vec<u64>,
    pub sum_steps: Vec<u64>,
    pub success_leq_k: Vec<u64>,
}

/// Read a full results file back into a fresh world and counter arrays,
/// reinitializing dimensions to whatever the file stored.
pub fn load_results(path: &Path) -> Result<LoadedResults> {
    let mut buf = Vec::new();
    File::open(path).map_err(PersistError::from)?.read_to_end(&mut buf).map_err(PersistError::from)?;
    let header = read_header(&buf)?;
    let cell_count = (header.size.width as usize) * (header.size.height as usize);

    let mut off = HEADER_LEN;
    let obstacles = buf.get(off..off + cell_count).ok_or(PersistError::BadMagic)?.to_vec();
    off += cell_count;

    let mut world = World::new(header.world_kind, header.size).map_err(|_| PersistError::BadMagic)?;
    world.load_obstacle_bytes(&obstacles);

    let trials = read_u32_array(&buf, &mut off, cell_count)?.into_iter().map(|v| v as u64).collect();
    let sum_steps = read_u64_array(&buf, &mut off, cell_count)?;
    let success_leq_k = read_u32_array(&buf, &mut off, cell_count)?.into_iter().map(|v| v as u64).collect();

    Ok(LoadedResults { header, world, trials, sum_steps, success_leq_k })
}

pub struct LoadedWorld {
    pub header: Header,
    pub world: World,
}

/// Read a world-only file: the shared header followed by just the
/// obstacle bitmap, with no results arrays expected afterward.
pub fn load_world(path: &Path) -> Result<LoadedWorld> {
    let mut buf = Vec::new();
    File::open(path).map_err(PersistError::from)?.read_to_end(&mut buf).map_err(PersistError::from)?;
    let header = read_header(&buf)?;
    let cell_count = (header.size.width as usize) * (header.size.height as usize);
    let obstacles = buf.get(HEADER_LEN..HEADER_LEN + cell_count).ok_or(PersistError::BadMagic)?.to_vec();

    let mut world = World::new(header.world_kind, header.size).map_err(|_| PersistError::BadMagic)?;
    world.load_obstacle_bytes(&obstacles);

    Ok(LoadedWorld { header, world })
}

fn read_u32_array(buf: &[u8], off: &mut usize, count: usize) -> Result<Vec<u32>> {
    let bytes_needed = count * 4;
    let slice = buf.get(*off..*off + bytes_needed).ok_or(PersistError::BadMagic)?;
    *off += bytes_needed;
    Ok(slice.chunks_exact(4).map(|c| u32::from_le_bytes(c.try_into().unwrap())).collect())
}

fn read_u64_array(buf: &[u8], off: &mut usize, count: usize) -> Result<Vec<u64>> {
    let bytes_needed = count * 8;
    let slice = buf.get(*off..*off + bytes_needed).ok_or(PersistError::BadMagic)?;
    *off += bytes_needed;
    Ok(slice.chunks_exact(8).map(|c| u64::from_le_bytes(c.try_into().unwrap())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::WorldKind;

    fn tmp_path(name: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("rw-engine-test-{}-{}", std::process::id(), name));
        p
    }

    #[test]
    fn results_file_roundtrips() {
        let mut world = World::new(WorldKind::Obstacles, WorldSize { width: 3, height: 2 }).unwrap();
        world.set_obstacle(1, 0, true);
        let results = Results::new(world.cell_count());
        results.update(0, 5, true);
        results.update(3, 2, false);

        let header = Header {
            world_kind: WorldKind::Obstacles,
            size: world.size,
            probs: [0.25, 0.25, 0.25, 0.25],
            k_max_steps: 10,
            total_reps: 1,
        };
        let path = tmp_path("results.bin");
        save_results(&path, &header, &world, &results).unwrap();
        let loaded = load_results(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.header.size.width, 3);
        assert_eq!(loaded.world.is_obstacle_xy(1, 0), true);
        assert_eq!(loaded.trials[0], 1);
        assert_eq!(loaded.sum_steps[0], 5);
        assert_eq!(loaded.trials[3], 1);
    }

    #[test]
    fn world_only_file_has_no_results_arrays() {
        let mut world = World::new(WorldKind::Wrap, WorldSize { width: 2, height: 2 }).unwrap();
        world.set_obstacle(0, 1, true);
        let header = Header {
            world_kind: WorldKind::Wrap,
            size: world.size,
            probs: [0.25, 0.25, 0.25, 0.25],
            k_max_steps: 5,
            total_reps: 1,
        };

        // No save_world exists (world files are read-only from this engine's
        // side); build the on-disk bytes directly the way an external tool
        // producing a world file would.
        let mut buf = Vec::new();
        write_header(&mut buf, &header);
        buf.extend_from_slice(&world.obstacle_bytes());
        let path = tmp_path("world.bin");
        std::fs::write(&path, &buf).unwrap();

        let on_disk = std::fs::metadata(&path).unwrap().len() as usize;
        assert_eq!(on_disk, HEADER_LEN + world.cell_count() as usize);

        let loaded = load_world(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(loaded.world.is_obstacle_xy(0, 1));
    }

    #[test]
    fn bad_magic_rejected() {
        let path = tmp_path("garbage.bin");
        std::fs::write(&path, b"not a valid header at all").unwrap();
        let err = load_results(&path);
        std::fs::remove_file(&path).ok();
        assert!(err.is_err());
    }
}
