//! Synthesis-time working grid.
//!
//! One [`ChunkScratch`] record exists per coordinate while the
//! synthesizer runs; the grid is flushed to [`crate::meta::ChunkMeta`]
//! records and then discarded.

use crate::meta::{Biome, FeatureRecord};
use wildermere_common::ChunkCoord;

/// Height value for cells not yet reached by coastal growth.
pub const HEIGHT_UNASSIGNED: i32 = -1;

/// Dryness value for cells not yet reached by the moisture BFS.
pub const DRYNESS_UNASSIGNED: i32 = -1;

/// Mutable working record for one chunk coordinate during synthesis.
#[derive(Debug, Clone)]
pub struct ChunkScratch {
    /// Height band; 0 = ocean, `HEIGHT_UNASSIGNED` until grown.
    pub height: i32,
    /// Downslope neighbor this cell was grown from. The parent links form
    /// a forest of rooted trees whose roots are coastal mouths.
    pub river_parent: Option<ChunkCoord>,
    /// Cells grown from this one (upslope).
    pub river_children: Vec<ChunkCoord>,
    /// 1 + sum of children's counts; sized after height growth.
    pub river_descendants: u32,
    /// BFS distance from the nearest water source.
    pub dryness: i32,
    /// Biome, once a stage has committed one.
    pub biome: Option<Biome>,
    /// Features accumulated for this chunk (river exits, lakes, structures).
    pub features: Vec<FeatureRecord>,
}

impl Default for ChunkScratch {
    fn default() -> Self {
        Self {
            height: HEIGHT_UNASSIGNED,
            river_parent: None,
            river_children: Vec::new(),
            river_descendants: 0,
            dryness: DRYNESS_UNASSIGNED,
            biome: None,
            features: Vec::new(),
        }
    }
}

impl ChunkScratch {
    /// Whether height has been assigned.
    #[must_use]
    pub const fn has_height(&self) -> bool {
        self.height != HEIGHT_UNASSIGNED
    }

    /// Whether this cell is ocean (height zero).
    #[must_use]
    pub const fn is_ocean(&self) -> bool {
        self.height == 0
    }

    /// Whether any river exit has been drawn through this cell.
    #[must_use]
    pub fn has_river(&self) -> bool {
        self.features
            .iter()
            .any(|f| matches!(f, FeatureRecord::RiverExit(_)))
    }
}

/// Row-major grid of scratch records over the synthesis bounds.
#[derive(Debug)]
pub struct ScratchGrid {
    width: i32,
    height: i32,
    cells: Vec<ChunkScratch>,
}

impl ScratchGrid {
    /// Allocates a grid of default scratch records.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            cells: vec![ChunkScratch::default(); count],
        }
    }

    /// Grid width in chunks.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Grid height in chunks.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Whether a coordinate lies inside the grid.
    #[must_use]
    pub const fn in_bounds(&self, coord: ChunkCoord) -> bool {
        coord.x >= 0 && coord.x < self.width && coord.y >= 0 && coord.y < self.height
    }

    fn index(&self, coord: ChunkCoord) -> usize {
        (coord.y as usize) * (self.width as usize) + (coord.x as usize)
    }

    /// Returns the scratch record at a coordinate, if in bounds.
    #[must_use]
    pub fn get(&self, coord: ChunkCoord) -> Option<&ChunkScratch> {
        if self.in_bounds(coord) {
            let idx = self.index(coord);
            Some(&self.cells[idx])
        } else {
            None
        }
    }

    /// Returns the mutable scratch record at a coordinate, if in bounds.
    pub fn get_mut(&mut self, coord: ChunkCoord) -> Option<&mut ChunkScratch> {
        if self.in_bounds(coord) {
            let idx = self.index(coord);
            Some(&mut self.cells[idx])
        } else {
            None
        }
    }

    /// Iterates over all coordinates in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        let (w, h) = (self.width, self.height);
        (0..h).flat_map(move |y| (0..w).map(move |x| ChunkCoord::new(x, y)))
    }

    /// Consumes the grid, yielding `(coord, scratch)` pairs for flushing.
    pub fn drain(self) -> impl Iterator<Item = (ChunkCoord, ChunkScratch)> {
        let width = self.width;
        self.cells.into_iter().enumerate().map(move |(i, cell)| {
            let x = (i % width as usize) as i32;
            let y = (i / width as usize) as i32;
            (ChunkCoord::new(x, y), cell)
        })
    }
}
