//! Coordinate types for world, chunk, and local positions.

use serde::{Deserialize, Serialize};

/// World coordinate in cells (global position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldCoord {
    /// X coordinate in world space
    pub x: i64,
    /// Y coordinate in world space
    pub y: i64,
}

impl WorldCoord {
    /// Creates a new world coordinate.
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Converts to chunk coordinate given chunk size.
    #[must_use]
    pub const fn to_chunk_coord(self, chunk_size: u32) -> ChunkCoord {
        let size = chunk_size as i64;
        ChunkCoord {
            x: self.x.div_euclid(size) as i32,
            y: self.y.div_euclid(size) as i32,
        }
    }

    /// Converts to local coordinate within a chunk.
    #[must_use]
    pub const fn to_local_coord(self, chunk_size: u32) -> LocalCoord {
        let size = chunk_size as i64;
        LocalCoord {
            x: self.x.rem_euclid(size) as u16,
            y: self.y.rem_euclid(size) as u16,
        }
    }
}

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// X coordinate in chunk space
    pub x: i32,
    /// Y coordinate in chunk space
    pub y: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts to world coordinate (top-left corner of chunk).
    #[must_use]
    pub const fn to_world_coord(self, chunk_size: u32) -> WorldCoord {
        WorldCoord {
            x: (self.x as i64) * (chunk_size as i64),
            y: (self.y as i64) * (chunk_size as i64),
        }
    }

    /// Returns the chunk coordinate containing the given world position.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn from_world_pos(world_x: i64, world_y: i64, chunk_size: u32) -> Self {
        let size = chunk_size as i64;
        Self {
            x: world_x.div_euclid(size) as i32,
            y: world_y.div_euclid(size) as i32,
        }
    }

    /// Returns the neighbor chunk in the given edge direction.
    #[must_use]
    pub const fn neighbor(self, dir: EdgeDir) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Returns neighboring chunk coordinates (including diagonals).
    #[must_use]
    pub fn neighbors(&self) -> [ChunkCoord; 8] {
        [
            ChunkCoord::new(self.x - 1, self.y - 1),
            ChunkCoord::new(self.x, self.y - 1),
            ChunkCoord::new(self.x + 1, self.y - 1),
            ChunkCoord::new(self.x - 1, self.y),
            ChunkCoord::new(self.x + 1, self.y),
            ChunkCoord::new(self.x - 1, self.y + 1),
            ChunkCoord::new(self.x, self.y + 1),
            ChunkCoord::new(self.x + 1, self.y + 1),
        ]
    }

    /// Returns cardinal neighbor coordinates (no diagonals).
    #[must_use]
    pub fn cardinal_neighbors(&self) -> [ChunkCoord; 4] {
        [
            ChunkCoord::new(self.x, self.y - 1),
            ChunkCoord::new(self.x - 1, self.y),
            ChunkCoord::new(self.x + 1, self.y),
            ChunkCoord::new(self.x, self.y + 1),
        ]
    }

    /// Chebyshev distance to another chunk coordinate.
    #[must_use]
    pub fn chebyshev(&self, other: ChunkCoord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Chunk({}, {})", self.x, self.y)
    }
}

/// Local coordinate within a chunk (0 to chunk_size-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalCoord {
    /// X coordinate within chunk
    pub x: u16,
    /// Y coordinate within chunk
    pub y: u16,
}

impl LocalCoord {
    /// Creates a new local coordinate.
    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Converts to linear index for array access.
    #[must_use]
    pub const fn to_index(self, chunk_size: u32) -> usize {
        (self.y as usize) * (chunk_size as usize) + (self.x as usize)
    }

    /// Creates from linear index.
    #[must_use]
    pub const fn from_index(index: usize, chunk_size: u32) -> Self {
        let size = chunk_size as usize;
        Self {
            x: (index % size) as u16,
            y: (index / size) as u16,
        }
    }
}

/// Direction of a chunk edge or corner, used for neighbor lookups,
/// feature exits, and biome blend bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeDir {
    /// Negative Y
    North,
    /// Positive X, negative Y
    NorthEast,
    /// Positive X
    East,
    /// Positive X, positive Y
    SouthEast,
    /// Positive Y
    South,
    /// Negative X, positive Y
    SouthWest,
    /// Negative X
    West,
    /// Negative X, negative Y
    NorthWest,
}

impl EdgeDir {
    /// All eight directions, clockwise from north.
    pub const ALL: [EdgeDir; 8] = [
        EdgeDir::North,
        EdgeDir::NorthEast,
        EdgeDir::East,
        EdgeDir::SouthEast,
        EdgeDir::South,
        EdgeDir::SouthWest,
        EdgeDir::West,
        EdgeDir::NorthWest,
    ];

    /// The four cardinal directions.
    pub const CARDINAL: [EdgeDir; 4] = [EdgeDir::North, EdgeDir::East, EdgeDir::South, EdgeDir::West];

    /// Returns the chunk-grid offset for this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            EdgeDir::North => (0, -1),
            EdgeDir::NorthEast => (1, -1),
            EdgeDir::East => (1, 0),
            EdgeDir::SouthEast => (1, 1),
            EdgeDir::South => (0, 1),
            EdgeDir::SouthWest => (-1, 1),
            EdgeDir::West => (-1, 0),
            EdgeDir::NorthWest => (-1, -1),
        }
    }

    /// Returns the opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            EdgeDir::North => EdgeDir::South,
            EdgeDir::NorthEast => EdgeDir::SouthWest,
            EdgeDir::East => EdgeDir::West,
            EdgeDir::SouthEast => EdgeDir::NorthWest,
            EdgeDir::South => EdgeDir::North,
            EdgeDir::SouthWest => EdgeDir::NorthEast,
            EdgeDir::West => EdgeDir::East,
            EdgeDir::NorthWest => EdgeDir::SouthEast,
        }
    }

    /// Whether this is one of the four cardinal directions.
    #[must_use]
    pub const fn is_cardinal(self) -> bool {
        matches!(self, EdgeDir::North | EdgeDir::East | EdgeDir::South | EdgeDir::West)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_world_pos_negative() {
        let c = ChunkCoord::from_world_pos(-1, -1, 32);
        assert_eq!(c, ChunkCoord::new(-1, -1));

        let c = ChunkCoord::from_world_pos(-33, -1, 32);
        assert_eq!(c, ChunkCoord::new(-2, -1));
    }

    #[test]
    fn test_neighbor_by_dir() {
        let c = ChunkCoord::new(3, 4);
        assert_eq!(c.neighbor(EdgeDir::North), ChunkCoord::new(3, 3));
        assert_eq!(c.neighbor(EdgeDir::SouthWest), ChunkCoord::new(2, 5));
    }

    #[test]
    fn test_neighbors_contains_all_offsets() {
        let c = ChunkCoord::new(0, 0);
        let neighbors = c.neighbors();
        assert_eq!(neighbors.len(), 8);
        for dir in EdgeDir::ALL {
            assert!(neighbors.contains(&c.neighbor(dir)));
        }
    }

    #[test]
    fn test_local_index_round_trip() {
        let local = LocalCoord::new(7, 11);
        let idx = local.to_index(32);
        assert_eq!(LocalCoord::from_index(idx, 32), local);
    }
}
