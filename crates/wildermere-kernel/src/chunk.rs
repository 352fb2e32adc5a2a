//! Concrete chunk data.
//!
//! A [`Chunk`] is a fixed-size grid of terrain cells plus per-cell flags,
//! exit records, spawned vegetation, and attached dynamic entities. It is
//! created by carving, owned by whichever level holds it, and destroyed
//! (after persistence) on eviction.

use serde::{Deserialize, Serialize};
use wildermere_common::{BuildingId, ChunkCoord, EntityId, LocalCoord};

use crate::biomes::PlantKind;
use crate::entities::WorldRect;
use crate::terrain::{Terrain, CHUNK_SIZE};

/// Kind of exit registered on a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitKind {
    /// Door into a registered building.
    Door,
    /// Portal to another level.
    Portal,
}

/// A door or portal placed during carving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRecord {
    /// Position within the chunk.
    pub pos: LocalCoord,
    /// What kind of exit this is.
    pub kind: ExitKind,
    /// Building reached through this exit, if any.
    pub target: Option<BuildingId>,
}

/// One spawned plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantInstance {
    /// Species.
    pub kind: PlantKind,
    /// Position within the chunk.
    pub pos: LocalCoord,
}

/// A concrete `CHUNK_SIZE` x `CHUNK_SIZE` grid of terrain cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk coordinate.
    pub coord: ChunkCoord,
    /// Terrain cells, row-major.
    terrain: Vec<Terrain>,
    /// Per-cell flag bits (see [`crate::terrain::CellFlags`]).
    flags: Vec<u8>,
    /// Doors and portals.
    pub exits: Vec<ExitRecord>,
    /// Spawned vegetation.
    pub plants: Vec<PlantInstance>,
    /// Dynamic entities currently attached to this chunk.
    pub entities: Vec<EntityId>,
}

impl Chunk {
    /// Cells per chunk.
    pub const CELLS: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

    /// Creates a chunk filled with the given terrain.
    #[must_use]
    pub fn filled(coord: ChunkCoord, terrain: Terrain) -> Self {
        Self {
            coord,
            terrain: vec![terrain; Self::CELLS],
            flags: vec![0; Self::CELLS],
            exits: Vec::new(),
            plants: Vec::new(),
            entities: Vec::new(),
        }
    }

    /// Creates a default (grass-filled) chunk.
    #[must_use]
    pub fn new(coord: ChunkCoord) -> Self {
        Self::filled(coord, Terrain::default())
    }

    fn index(x: i32, y: i32) -> Option<usize> {
        let size = CHUNK_SIZE as i32;
        if x < 0 || x >= size || y < 0 || y >= size {
            None
        } else {
            Some((y * size + x) as usize)
        }
    }

    /// Returns the terrain at a cell, or `None` out of bounds.
    ///
    /// Out-of-bounds reads degrade to "not there" rather than raising;
    /// callers treat them as not walkable / not visible.
    #[must_use]
    pub fn terrain(&self, x: i32, y: i32) -> Option<Terrain> {
        Self::index(x, y).map(|i| self.terrain[i])
    }

    /// Sets the terrain at a cell; out-of-bounds writes are ignored.
    pub fn set_terrain(&mut self, x: i32, y: i32, terrain: Terrain) {
        if let Some(i) = Self::index(x, y) {
            self.terrain[i] = terrain;
        }
    }

    /// Whether an entity can stand at a cell. Out of bounds is not walkable.
    #[must_use]
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.terrain(x, y).is_some_and(Terrain::is_walkable)
    }

    /// Sets flag bits at a cell.
    pub fn set_flag(&mut self, x: i32, y: i32, flag: u8) {
        if let Some(i) = Self::index(x, y) {
            self.flags[i] |= flag;
        }
    }

    /// Whether a cell has all of the given flag bits. Out of bounds is
    /// never flagged.
    #[must_use]
    pub fn has_flag(&self, x: i32, y: i32, flag: u8) -> bool {
        Self::index(x, y).is_some_and(|i| self.flags[i] & flag == flag)
    }

    /// The world-cell rectangle this chunk covers.
    #[must_use]
    pub fn world_rect(&self) -> WorldRect {
        let min = self.coord.to_world_coord(CHUNK_SIZE);
        let size = i64::from(CHUNK_SIZE);
        WorldRect::new(
            min,
            wildermere_common::WorldCoord::new(min.x + size, min.y + size),
        )
    }

    /// Iterates over all local cell positions.
    pub fn cells() -> impl Iterator<Item = (i32, i32)> {
        let size = CHUNK_SIZE as i32;
        (0..size).flat_map(move |y| (0..size).map(move |x| (x, y)))
    }

    /// Counts cells matching a predicate.
    #[must_use]
    pub fn count_cells(&self, pred: impl Fn(Terrain) -> bool) -> usize {
        self.terrain.iter().filter(|t| pred(**t)).count()
    }
}
