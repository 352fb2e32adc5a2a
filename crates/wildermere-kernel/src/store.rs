//! Persistence seam for chunks, metadata, and buildings.
//!
//! The kernel talks to storage through the [`WorldStore`] trait. Carved
//! chunks are persisted in a compressed binary envelope; re-carving from
//! metadata is deterministic, so the envelope is a cache, not the source
//! of truth for generated content. Player-visible mutations (seen flags,
//! opened doors) survive only through the envelope.

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};
use wildermere_common::{
    BuildingId, ChunkCoord, LocalCoord, WildermereError, WildermereResult, WorldError,
};
use wildermere_worldgen::{ChunkMeta, MetaStore, StructureKind};

use crate::chunk::Chunk;

/// A registered building reachable through a chunk exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Stable building identity.
    pub id: BuildingId,
    /// Which prefab was stamped.
    pub kind: StructureKind,
    /// Chunk the building stands in.
    pub chunk: ChunkCoord,
    /// Door position within the chunk.
    pub door: LocalCoord,
}

/// Storage backend for world data.
///
/// Implementations must be callable from the generation worker thread and
/// the owning thread at once.
pub trait WorldStore: MetaStore {
    /// Whether a carved chunk is persisted at a coordinate.
    fn has_chunk(&self, coord: ChunkCoord) -> bool;

    /// Loads a persisted chunk.
    fn chunk(&self, coord: ChunkCoord) -> WildermereResult<Chunk>;

    /// Persists a carved chunk, replacing any previous envelope.
    fn put_chunk(&self, chunk: &Chunk) -> WildermereResult<()>;

    /// Looks up a registered building.
    fn building(&self, id: BuildingId) -> Option<Building>;

    /// Registers a building.
    fn put_building(&self, building: Building);
}

/// Encodes a chunk into its persisted envelope.
///
/// bincode for layout, lz4 with a prepended size for the wire bytes.
pub fn encode_chunk(chunk: &Chunk) -> WildermereResult<Vec<u8>> {
    let raw = bincode::serialize(chunk)
        .map_err(|e| WildermereError::Serialization(e.to_string()))?;
    Ok(lz4_flex::compress_prepend_size(&raw))
}

/// Decodes a chunk from its persisted envelope.
pub fn decode_chunk(bytes: &[u8]) -> WildermereResult<Chunk> {
    let raw = lz4_flex::decompress_size_prepended(bytes)
        .map_err(|e| WildermereError::Serialization(e.to_string()))?;
    bincode::deserialize(&raw).map_err(|e| WildermereError::Serialization(e.to_string()))
}

/// In-memory store used by tests and headless generation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    meta: RwLock<AHashMap<ChunkCoord, ChunkMeta>>,
    chunks: RwLock<AHashMap<ChunkCoord, Vec<u8>>>,
    buildings: RwLock<AHashMap<BuildingId, Building>>,
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted chunk envelopes.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.read().len()
    }

    /// Number of persisted metadata records.
    #[must_use]
    pub fn meta_count(&self) -> usize {
        self.meta.read().len()
    }
}

impl MetaStore for MemoryStore {
    fn chunk_meta(&self, coord: ChunkCoord) -> Option<ChunkMeta> {
        self.meta.read().get(&coord).cloned()
    }

    fn put_chunk_meta_batch(&self, batch: Vec<ChunkMeta>) {
        let mut meta = self.meta.write();
        for record in batch {
            meta.insert(record.coord, record);
        }
    }
}

impl WorldStore for MemoryStore {
    fn has_chunk(&self, coord: ChunkCoord) -> bool {
        self.chunks.read().contains_key(&coord)
    }

    fn chunk(&self, coord: ChunkCoord) -> WildermereResult<Chunk> {
        let bytes = self
            .chunks
            .read()
            .get(&coord)
            .cloned()
            .ok_or(WorldError::ChunkNotFound { x: coord.x, y: coord.y })?;
        decode_chunk(&bytes)
    }

    fn put_chunk(&self, chunk: &Chunk) -> WildermereResult<()> {
        let bytes = encode_chunk(chunk)?;
        trace!(coord = %chunk.coord, bytes = bytes.len(), "persisted chunk");
        self.chunks.write().insert(chunk.coord, bytes);
        Ok(())
    }

    fn building(&self, id: BuildingId) -> Option<Building> {
        self.buildings.read().get(&id).cloned()
    }

    fn put_building(&self, building: Building) {
        self.buildings.write().insert(building.id, building);
    }
}

/// Directory-backed store.
///
/// One file per chunk under `chunks/`, with metadata and the building
/// registry held in memory and rewritten as whole snapshots. Snapshot
/// writes go to a temp file first and rename into place.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    meta: RwLock<AHashMap<ChunkCoord, ChunkMeta>>,
    buildings: RwLock<AHashMap<BuildingId, Building>>,
}

impl FileStore {
    const META_FILE: &'static str = "meta.bin";
    const BUILDINGS_FILE: &'static str = "buildings.bin";

    /// Opens a store rooted at a directory, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> WildermereResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join("chunks"))?;

        let meta = Self::load_snapshot::<ChunkMeta>(&root.join(Self::META_FILE))?
            .into_iter()
            .map(|m| (m.coord, m))
            .collect();
        let buildings = Self::load_snapshot::<Building>(&root.join(Self::BUILDINGS_FILE))?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();

        Ok(Self {
            root,
            meta: RwLock::new(meta),
            buildings: RwLock::new(buildings),
        })
    }

    fn load_snapshot<T: serde::de::DeserializeOwned>(path: &Path) -> WildermereResult<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let bytes = std::fs::read(path)?;
        bincode::deserialize(&bytes).map_err(|e| WildermereError::Serialization(e.to_string()))
    }

    fn write_snapshot<T: Serialize>(&self, name: &str, records: &[T]) -> WildermereResult<()> {
        let bytes = bincode::serialize(records)
            .map_err(|e| WildermereError::Serialization(e.to_string()))?;
        let tmp = self.root.join(format!("{name}.tmp"));
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, self.root.join(name))?;
        Ok(())
    }

    fn chunk_path(&self, coord: ChunkCoord) -> PathBuf {
        self.root.join("chunks").join(format!("c_{}_{}.bin", coord.x, coord.y))
    }
}

impl MetaStore for FileStore {
    fn chunk_meta(&self, coord: ChunkCoord) -> Option<ChunkMeta> {
        self.meta.read().get(&coord).cloned()
    }

    fn put_chunk_meta_batch(&self, batch: Vec<ChunkMeta>) {
        let mut meta = self.meta.write();
        for record in batch {
            meta.insert(record.coord, record);
        }
        let records: Vec<ChunkMeta> = meta.values().cloned().collect();
        drop(meta);
        if let Err(e) = self.write_snapshot(Self::META_FILE, &records) {
            warn!(error = %e, "meta snapshot write failed");
        }
    }
}

impl WorldStore for FileStore {
    fn has_chunk(&self, coord: ChunkCoord) -> bool {
        self.chunk_path(coord).exists()
    }

    fn chunk(&self, coord: ChunkCoord) -> WildermereResult<Chunk> {
        let path = self.chunk_path(coord);
        if !path.exists() {
            return Err(WorldError::ChunkNotFound { x: coord.x, y: coord.y }.into());
        }
        let bytes = std::fs::read(path).map_err(|e| WorldError::LoadFailed(e.to_string()))?;
        decode_chunk(&bytes)
    }

    fn put_chunk(&self, chunk: &Chunk) -> WildermereResult<()> {
        let bytes = encode_chunk(chunk)?;
        trace!(coord = %chunk.coord, bytes = bytes.len(), "persisted chunk file");
        std::fs::write(self.chunk_path(chunk.coord), bytes)
            .map_err(|e| WorldError::SaveFailed(e.to_string()))?;
        Ok(())
    }

    fn building(&self, id: BuildingId) -> Option<Building> {
        self.buildings.read().get(&id).cloned()
    }

    fn put_building(&self, building: Building) {
        let mut buildings = self.buildings.write();
        buildings.insert(building.id, building);
        let records: Vec<Building> = buildings.values().cloned().collect();
        drop(buildings);
        if let Err(e) = self.write_snapshot(Self::BUILDINGS_FILE, &records) {
            warn!(error = %e, "building snapshot write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::Terrain;

    #[test]
    fn test_chunk_envelope_round_trip() {
        let mut chunk = Chunk::new(ChunkCoord::new(3, -2));
        chunk.set_terrain(10, 10, Terrain::Lava);
        chunk.set_flag(4, 4, crate::terrain::CellFlags::SEEN);
        let bytes = encode_chunk(&chunk).unwrap();
        let back = decode_chunk(&bytes).unwrap();
        assert_eq!(back, chunk);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_chunk(&[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn test_missing_chunk_is_not_found() {
        let store = MemoryStore::new();
        let coord = ChunkCoord::new(9, 9);
        assert!(!store.has_chunk(coord));
        match store.chunk(coord) {
            Err(WildermereError::World(WorldError::ChunkNotFound { x: 9, y: 9 })) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_put_then_load() {
        let store = MemoryStore::new();
        let chunk = Chunk::filled(ChunkCoord::new(0, 0), Terrain::Sand);
        store.put_chunk(&chunk).unwrap();
        assert!(store.has_chunk(chunk.coord));
        assert_eq!(store.chunk(chunk.coord).unwrap(), chunk);
    }

    #[test]
    fn test_file_store_round_trip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let coord = ChunkCoord::new(-3, 7);
        let mut chunk = Chunk::filled(coord, Terrain::Snow);
        chunk.set_flag(2, 2, crate::terrain::CellFlags::SEEN);
        let meta = ChunkMeta::ocean(coord);
        let building = Building {
            id: BuildingId::new(),
            kind: StructureKind::Shrine,
            chunk: coord,
            door: LocalCoord::new(5, 5),
        };

        {
            let store = FileStore::open(dir.path()).unwrap();
            store.put_chunk(&chunk).unwrap();
            store.put_chunk_meta_batch(vec![meta.clone()]);
            store.put_building(building.clone());
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.has_chunk(coord));
        assert_eq!(store.chunk(coord).unwrap(), chunk);
        assert_eq!(store.chunk_meta(coord), Some(meta));
        assert_eq!(store.building(building.id), Some(building));
    }

    #[test]
    fn test_file_store_missing_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(!store.has_chunk(ChunkCoord::new(0, 0)));
        assert!(store.chunk(ChunkCoord::new(0, 0)).is_err());
    }

    #[test]
    fn test_building_registry() {
        let store = MemoryStore::new();
        let building = Building {
            id: BuildingId::new(),
            kind: StructureKind::Cottage,
            chunk: ChunkCoord::new(1, 1),
            door: LocalCoord::new(16, 20),
        };
        store.put_building(building.clone());
        assert_eq!(store.building(building.id), Some(building));
    }
}
