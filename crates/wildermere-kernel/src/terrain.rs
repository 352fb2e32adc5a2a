//! Terrain cell types and per-cell flags.

use serde::{Deserialize, Serialize};

/// Edge length of a chunk in cells.
pub const CHUNK_SIZE: u32 = 32;

/// Closed set of concrete terrain types.
///
/// The core only produces and consumes these tags; mapping a tag to a
/// visual tile is the renderer's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    /// Deep open water.
    DeepWater,
    /// Shallow water, one shading step in from shore.
    ShallowWater,
    /// Water at the land boundary.
    ShoreWater,
    /// Short grass.
    Grass,
    /// Tall grass.
    TallGrass,
    /// Bare earth.
    Dirt,
    /// Loose sand.
    Sand,
    /// Packed snow.
    Snow,
    /// Sheet ice.
    Ice,
    /// Exposed rock.
    Rock,
    /// Loose stones.
    Gravel,
    /// Waterlogged ground.
    Marsh,
    /// Generic forest wall; carving remaps this to a habitat variant.
    ForestWall,
    /// Alpine forest wall.
    PineWall,
    /// Temperate forest wall.
    OakWall,
    /// Tropical forest wall.
    PalmWall,
    /// Natural rock face.
    RockWall,
    /// Built stone wall.
    StoneWall,
    /// Built interior floor.
    Floor,
    /// Door cell in a built wall.
    Door,
    /// Collapsed masonry.
    Rubble,
    /// Paved highway surface.
    RoadPaved,
    /// Packed dirt trail.
    RoadDirt,
    /// Molten rock.
    Lava,
}

impl Terrain {
    /// Whether this terrain is water.
    #[must_use]
    pub const fn is_water(self) -> bool {
        matches!(self, Terrain::DeepWater | Terrain::ShallowWater | Terrain::ShoreWater)
    }

    /// Whether this terrain blocks movement as a vertical wall.
    #[must_use]
    pub const fn is_wall(self) -> bool {
        matches!(
            self,
            Terrain::ForestWall
                | Terrain::PineWall
                | Terrain::OakWall
                | Terrain::PalmWall
                | Terrain::RockWall
                | Terrain::StoneWall
        )
    }

    /// Whether this terrain is a forest wall variant.
    #[must_use]
    pub const fn is_forest_wall(self) -> bool {
        matches!(
            self,
            Terrain::ForestWall | Terrain::PineWall | Terrain::OakWall | Terrain::PalmWall
        )
    }

    /// Whether an entity can stand here.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        !self.is_wall() && !matches!(self, Terrain::DeepWater | Terrain::Lava)
    }

    /// Whether vegetation can root here.
    #[must_use]
    pub const fn supports_plants(self) -> bool {
        matches!(
            self,
            Terrain::Grass
                | Terrain::TallGrass
                | Terrain::Dirt
                | Terrain::Sand
                | Terrain::Marsh
                | Terrain::Snow
                | Terrain::Gravel
        )
    }
}

impl Default for Terrain {
    fn default() -> Self {
        Terrain::Grass
    }
}

/// Per-cell flag bits.
pub struct CellFlags;

impl CellFlags {
    /// Cell is under a roof - bit 0
    pub const ROOFED: u8 = 1 << 0;
    /// Cell has been seen by the player - bit 1
    pub const SEEN: u8 = 1 << 1;
    /// Cell is currently visible - bit 2
    pub const VISIBLE: u8 = 1 << 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_water_classification() {
        assert!(Terrain::DeepWater.is_water());
        assert!(Terrain::ShoreWater.is_water());
        assert!(!Terrain::Marsh.is_water());
        assert!(!Terrain::Lava.is_water());
    }

    #[test]
    fn test_walls_are_not_walkable() {
        for terrain in [
            Terrain::ForestWall,
            Terrain::PineWall,
            Terrain::RockWall,
            Terrain::StoneWall,
        ] {
            assert!(terrain.is_wall());
            assert!(!terrain.is_walkable());
        }
        assert!(Terrain::Grass.is_walkable());
        assert!(!Terrain::DeepWater.is_walkable());
    }

    #[test]
    fn test_forest_wall_variants() {
        assert!(Terrain::ForestWall.is_forest_wall());
        assert!(Terrain::PalmWall.is_forest_wall());
        assert!(!Terrain::StoneWall.is_forest_wall());
    }
}
