//! Persisted per-chunk metadata.
//!
//! A [`ChunkMeta`] is written once by world synthesis and read many times
//! by local carving. It is immutable after creation; coordinates outside
//! the synthesized bounds resolve to the ocean sentinel.

use serde::{Deserialize, Serialize};
use wildermere_common::{ChunkCoord, EdgeDir};

/// Closed set of biome tags.
///
/// Biome identity lives here; biome *behavior* (base terrain, fertility,
/// spawn tables) is a stateless lookup table in the kernel crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Biome {
    /// Open sea; the out-of-bounds sentinel.
    Ocean,
    /// Polar ice.
    Glacier,
    /// Open grassland.
    Plain,
    /// Dense woodland.
    Forest,
    /// Elevated woodland.
    ForestHill,
    /// Peaks and ranges.
    Mountain,
    /// Waterlogged lowland.
    Swamp,
    /// Dry waste.
    Desert,
    /// Semi-arid brush.
    Scrub,
    /// Open high ground.
    Hill,
    /// Collapsed settlement.
    Ruins,
    /// Outlying settlement.
    Suburb,
}

impl Biome {
    /// Whether this biome is open water.
    #[must_use]
    pub const fn is_water(self) -> bool {
        matches!(self, Biome::Ocean)
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Biome::Ocean => "ocean",
            Biome::Glacier => "glacier",
            Biome::Plain => "plain",
            Biome::Forest => "forest",
            Biome::ForestHill => "forest hill",
            Biome::Mountain => "mountain",
            Biome::Swamp => "swamp",
            Biome::Desert => "desert",
            Biome::Scrub => "scrub",
            Biome::Hill => "hill",
            Biome::Ruins => "ruins",
            Biome::Suburb => "suburb",
        }
    }
}

/// Secondary climate classification refining biome behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Habitat {
    /// Cold, high, or polar.
    Alpine,
    /// Mild midlands.
    Temperate,
    /// Hot lowlands.
    Tropical,
}

impl Habitat {
    /// Classifies a chunk temperature into a habitat.
    #[must_use]
    pub const fn from_temperature(temperature: i32) -> Self {
        if temperature < 0 {
            Habitat::Alpine
        } else if temperature < 20 {
            Habitat::Temperate
        } else {
            Habitat::Tropical
        }
    }
}

/// One end of a linear feature crossing a chunk edge.
///
/// Two ends of one river/highway segment are mirror-image exits stored on
/// each side's [`ChunkMeta`]: same width, opposite edge directions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitSpec {
    /// Which edge of the chunk the feature crosses.
    pub edge: EdgeDir,
    /// Width of the feature band in cells.
    pub width: u8,
    /// Spline control point for curvature, in chunk-local unit coordinates.
    pub control: (f32, f32),
}

impl ExitSpec {
    /// Creates a new exit spec.
    #[must_use]
    pub const fn new(edge: EdgeDir, width: u8, control: (f32, f32)) -> Self {
        Self { edge, width, control }
    }

    /// The mirrored exit as seen from the neighboring chunk.
    #[must_use]
    pub fn mirrored(&self) -> Self {
        Self {
            edge: self.edge.opposite(),
            width: self.width,
            control: (1.0 - self.control.0, 1.0 - self.control.1),
        }
    }
}

/// Kind of prefab structure stamped by build-placement carving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    /// Small intact dwelling.
    Cottage,
    /// Broken walls and rubble.
    Ruin,
    /// Single-room stone shrine.
    Shrine,
}

/// A declared feature carried on chunk metadata, carved at chunk level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureRecord {
    /// A river crossing one edge.
    RiverExit(ExitSpec),
    /// A paved highway crossing one edge.
    HighwayExit(ExitSpec),
    /// A dirt trail crossing one edge.
    TrailExit(ExitSpec),
    /// A lava flow crossing one edge.
    LavaExit(ExitSpec),
    /// A standing body of water inside the chunk.
    Lake,
    /// A prefab structure to stamp.
    Structure {
        /// Which prefab to stamp.
        kind: StructureKind,
    },
}

impl FeatureRecord {
    /// Whether this feature shapes terrain (stage one of feature carving).
    #[must_use]
    pub const fn is_terrain_shaping(&self) -> bool {
        !matches!(self, FeatureRecord::Structure { .. })
    }
}

/// Persisted summary data used to carve a chunk.
///
/// Exactly one exists per coordinate after synthesis completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Chunk coordinate (identity).
    pub coord: ChunkCoord,
    /// Height band above sea level (0 = ocean).
    pub height: i32,
    /// Mean temperature, degrees.
    pub temperature: i32,
    /// Biome tag.
    pub biome: Biome,
    /// Habitat classification.
    pub habitat: Habitat,
    /// Per-chunk variance noise, sampled once at synthesis.
    pub variance_noise: f32,
    /// Declared features to carve.
    pub features: Vec<FeatureRecord>,
    /// Distance in chunks to the nearest settlement seed.
    pub city_distance: f32,
    /// Generated chunk title.
    pub title: String,
}

impl ChunkMeta {
    /// City distance assigned when no settlement exists in bounds.
    pub const NO_CITY: f32 = 9999.0;

    /// The sentinel meta for coordinates outside synthesized bounds.
    #[must_use]
    pub fn ocean(coord: ChunkCoord) -> Self {
        Self {
            coord,
            height: 0,
            temperature: 10,
            biome: Biome::Ocean,
            habitat: Habitat::Temperate,
            variance_noise: 0.0,
            features: Vec::new(),
            city_distance: Self::NO_CITY,
            title: "open sea".to_owned(),
        }
    }

    /// Whether this chunk is open ocean.
    #[must_use]
    pub const fn is_ocean(&self) -> bool {
        self.biome.is_water()
    }

    /// Iterates over river exits declared on this chunk.
    pub fn river_exits(&self) -> impl Iterator<Item = &ExitSpec> {
        self.features.iter().filter_map(|f| match f {
            FeatureRecord::RiverExit(spec) => Some(spec),
            _ => None,
        })
    }
}

/// Addressable-by-coordinate store of chunk metadata.
///
/// Written once by world synthesis, read many times by local carving.
pub trait MetaStore: Send + Sync {
    /// Returns the metadata at a coordinate, if synthesized.
    fn chunk_meta(&self, coord: ChunkCoord) -> Option<ChunkMeta>;

    /// Persists a batch of metadata records.
    fn put_chunk_meta_batch(&self, batch: Vec<ChunkMeta>);

    /// Returns the metadata at a coordinate, or the ocean sentinel when
    /// the coordinate lies outside synthesized bounds.
    fn meta_or_ocean(&self, coord: ChunkCoord) -> ChunkMeta {
        self.chunk_meta(coord).unwrap_or_else(|| ChunkMeta::ocean(coord))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ocean_sentinel() {
        let meta = ChunkMeta::ocean(ChunkCoord::new(-100, 4));
        assert!(meta.is_ocean());
        assert_eq!(meta.height, 0);
        assert!(meta.features.is_empty());
    }

    #[test]
    fn test_mirrored_exit() {
        let spec = ExitSpec::new(EdgeDir::East, 3, (0.25, 0.5));
        let mirror = spec.mirrored();
        assert_eq!(mirror.edge, EdgeDir::West);
        assert_eq!(mirror.width, 3);
        assert!((mirror.control.0 - 0.75).abs() < f32::EPSILON);
        assert_eq!(mirror.mirrored().edge, spec.edge);
    }

    #[test]
    fn test_habitat_from_temperature() {
        assert_eq!(Habitat::from_temperature(-5), Habitat::Alpine);
        assert_eq!(Habitat::from_temperature(10), Habitat::Temperate);
        assert_eq!(Habitat::from_temperature(28), Habitat::Tropical);
    }

    #[test]
    fn test_structure_is_not_terrain_shaping() {
        let structure = FeatureRecord::Structure { kind: StructureKind::Shrine };
        assert!(!structure.is_terrain_shaping());
        assert!(FeatureRecord::Lake.is_terrain_shaping());
    }
}
