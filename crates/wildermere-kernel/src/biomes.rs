//! Stateless biome behavior.
//!
//! Biome *identity* is the closed [`Biome`] enum carried on chunk metadata;
//! biome *behavior* lives here as a static table of plain function pointers.
//! Every entry is a pure function of the deterministic noise source and the
//! cell's world position, so carving the same chunk twice yields the same
//! terrain regardless of what was carved in between.

use serde::{Deserialize, Serialize};
use wildermere_worldgen::{Biome, ChunkMeta, Habitat, NoiseSource};

use crate::terrain::Terrain;

/// Per-cell context handed to biome behavior functions.
pub struct CellCtx<'a> {
    /// Deterministic noise source for the world.
    pub noise: &'a NoiseSource,
    /// World-cell x position.
    pub x: i64,
    /// World-cell y position.
    pub y: i64,
    /// Metadata of the chunk the terrain will belong to.
    pub meta: &'a ChunkMeta,
}

/// Behavior table for one biome.
///
/// All hooks are plain function pointers so the whole table is a `'static`
/// constant and biome dispatch is a single array index.
pub struct BiomeProfile {
    /// The biome this profile describes.
    pub biome: Biome,
    /// Picks the base terrain for one cell.
    pub base_terrain: fn(&CellCtx<'_>) -> Terrain,
    /// Base plant fertility for one cell, in `[0, 1]`.
    pub fertility: fn(&CellCtx<'_>) -> f32,
    /// Fraction of cells that attempt a vegetation roll.
    pub plant_density: f32,
    /// Adjustment this biome pushes into a neighboring chunk's blend
    /// band nearest it, whatever biome each band cell drew.
    pub touch_up: Option<fn(Terrain) -> Terrain>,
    /// Whole-cell rewrite applied after water shading.
    pub post_process: Option<fn(Terrain) -> Terrain>,
}

/// Returns the static behavior profile for a biome.
#[must_use]
pub const fn profile(biome: Biome) -> &'static BiomeProfile {
    match biome {
        Biome::Ocean => &OCEAN,
        Biome::Glacier => &GLACIER,
        Biome::Plain => &PLAIN,
        Biome::Forest => &FOREST,
        Biome::ForestHill => &FOREST_HILL,
        Biome::Mountain => &MOUNTAIN,
        Biome::Swamp => &SWAMP,
        Biome::Desert => &DESERT,
        Biome::Scrub => &SCRUB,
        Biome::Hill => &HILL,
        Biome::Ruins => &RUINS,
        Biome::Suburb => &SUBURB,
    }
}

fn fertility_field(ctx: &CellCtx<'_>) -> f32 {
    ctx.noise.sample01("fertility field", ctx.x, ctx.y) as f32
}

fn barren(_ctx: &CellCtx<'_>) -> f32 {
    0.0
}

fn ocean_base(_ctx: &CellCtx<'_>) -> Terrain {
    // Shore shading is applied as a whole-chunk post pass.
    Terrain::DeepWater
}

fn glacier_base(ctx: &CellCtx<'_>) -> Terrain {
    if ctx.noise.roll("ice cracks", ctx.x, ctx.y, 0.12) {
        Terrain::Snow
    } else {
        Terrain::Ice
    }
}

fn plain_base(ctx: &CellCtx<'_>) -> Terrain {
    let grass = ctx.noise.sample01("grass variation", ctx.x, ctx.y);
    if grass > 0.65 {
        Terrain::TallGrass
    } else if ctx.noise.roll("bare patches", ctx.x, ctx.y, 0.03) {
        Terrain::Dirt
    } else {
        Terrain::Grass
    }
}

fn forest_base(ctx: &CellCtx<'_>) -> Terrain {
    // Smooth density field carves connected clearings out of the canopy.
    let density = ctx.noise.sample01("forest density", ctx.x, ctx.y);
    if density > 0.38 {
        Terrain::ForestWall
    } else if density > 0.30 {
        Terrain::TallGrass
    } else {
        Terrain::Grass
    }
}

fn forest_hill_base(ctx: &CellCtx<'_>) -> Terrain {
    let density = ctx.noise.sample01("forest density", ctx.x, ctx.y);
    let rock = ctx.noise.sample01("rock mottling", ctx.x, ctx.y);
    if rock > 0.72 {
        Terrain::RockWall
    } else if density > 0.45 {
        Terrain::ForestWall
    } else if rock > 0.55 {
        Terrain::Rock
    } else {
        Terrain::Grass
    }
}

fn mountain_base(ctx: &CellCtx<'_>) -> Terrain {
    let rock = ctx.noise.sample01("rock mottling", ctx.x, ctx.y);
    if rock > 0.62 {
        Terrain::RockWall
    } else if rock > 0.45 {
        Terrain::Rock
    } else if ctx.meta.habitat == Habitat::Alpine {
        Terrain::Snow
    } else {
        Terrain::Gravel
    }
}

fn swamp_base(ctx: &CellCtx<'_>) -> Terrain {
    let wet = ctx.noise.sample01("swamp pools", ctx.x, ctx.y);
    if wet > 0.68 {
        Terrain::ShallowWater
    } else if wet > 0.52 {
        Terrain::Marsh
    } else if ctx.noise.roll("swamp growth", ctx.x, ctx.y, 0.25) {
        Terrain::TallGrass
    } else {
        Terrain::Grass
    }
}

fn desert_base(ctx: &CellCtx<'_>) -> Terrain {
    if ctx.noise.roll("desert stones", ctx.x, ctx.y, 0.04) {
        Terrain::Gravel
    } else {
        Terrain::Sand
    }
}

fn scrub_base(ctx: &CellCtx<'_>) -> Terrain {
    let dry = ctx.noise.sample01("scrub cover", ctx.x, ctx.y);
    if dry > 0.6 {
        Terrain::Sand
    } else if dry > 0.4 {
        Terrain::Dirt
    } else {
        Terrain::Grass
    }
}

fn hill_base(ctx: &CellCtx<'_>) -> Terrain {
    let rock = ctx.noise.sample01("rock mottling", ctx.x, ctx.y);
    if rock > 0.78 {
        Terrain::RockWall
    } else if rock > 0.6 {
        Terrain::Rock
    } else {
        Terrain::Grass
    }
}

fn ruins_base(ctx: &CellCtx<'_>) -> Terrain {
    if ctx.noise.roll("ruin scatter", ctx.x, ctx.y, 0.08) {
        Terrain::Rubble
    } else if ctx.noise.roll("ruin walls", ctx.x, ctx.y, 0.02) {
        Terrain::StoneWall
    } else {
        Terrain::Grass
    }
}

/// Grass bleeding into a desert band dries to dirt.
fn parch(terrain: Terrain) -> Terrain {
    match terrain {
        Terrain::Grass | Terrain::TallGrass | Terrain::Marsh => Terrain::Dirt,
        other => other,
    }
}

/// Sand bleeding into grassland reads as worn earth.
fn soften_arid(terrain: Terrain) -> Terrain {
    match terrain {
        Terrain::Sand => Terrain::Dirt,
        other => other,
    }
}

/// Standing water inside a glacier freezes over.
fn freeze_water(terrain: Terrain) -> Terrain {
    if terrain.is_water() {
        Terrain::Ice
    } else {
        terrain
    }
}

fn suburb_base(ctx: &CellCtx<'_>) -> Terrain {
    if ctx.noise.roll("suburb paths", ctx.x, ctx.y, 0.05) {
        Terrain::Gravel
    } else if ctx.noise.roll("bare patches", ctx.x, ctx.y, 0.06) {
        Terrain::Dirt
    } else {
        Terrain::Grass
    }
}

static OCEAN: BiomeProfile = BiomeProfile {
    biome: Biome::Ocean,
    base_terrain: ocean_base,
    fertility: barren,
    plant_density: 0.0,
    touch_up: None,
    post_process: None,
};

static GLACIER: BiomeProfile = BiomeProfile {
    biome: Biome::Glacier,
    base_terrain: glacier_base,
    fertility: barren,
    plant_density: 0.01,
    touch_up: None,
    post_process: Some(freeze_water),
};

static PLAIN: BiomeProfile = BiomeProfile {
    biome: Biome::Plain,
    base_terrain: plain_base,
    fertility: fertility_field,
    plant_density: 0.12,
    touch_up: Some(soften_arid),
    post_process: None,
};

static FOREST: BiomeProfile = BiomeProfile {
    biome: Biome::Forest,
    base_terrain: forest_base,
    fertility: fertility_field,
    plant_density: 0.30,
    touch_up: None,
    post_process: None,
};

static FOREST_HILL: BiomeProfile = BiomeProfile {
    biome: Biome::ForestHill,
    base_terrain: forest_hill_base,
    fertility: fertility_field,
    plant_density: 0.22,
    touch_up: None,
    post_process: None,
};

static MOUNTAIN: BiomeProfile = BiomeProfile {
    biome: Biome::Mountain,
    base_terrain: mountain_base,
    fertility: barren,
    plant_density: 0.03,
    touch_up: None,
    post_process: None,
};

static SWAMP: BiomeProfile = BiomeProfile {
    biome: Biome::Swamp,
    base_terrain: swamp_base,
    fertility: fertility_field,
    plant_density: 0.25,
    touch_up: None,
    post_process: None,
};

static DESERT: BiomeProfile = BiomeProfile {
    biome: Biome::Desert,
    base_terrain: desert_base,
    fertility: barren,
    plant_density: 0.02,
    touch_up: Some(parch),
    post_process: None,
};

static SCRUB: BiomeProfile = BiomeProfile {
    biome: Biome::Scrub,
    base_terrain: scrub_base,
    fertility: fertility_field,
    plant_density: 0.08,
    touch_up: Some(parch),
    post_process: None,
};

static HILL: BiomeProfile = BiomeProfile {
    biome: Biome::Hill,
    base_terrain: hill_base,
    fertility: fertility_field,
    plant_density: 0.10,
    touch_up: None,
    post_process: None,
};

static RUINS: BiomeProfile = BiomeProfile {
    biome: Biome::Ruins,
    base_terrain: ruins_base,
    fertility: fertility_field,
    plant_density: 0.08,
    touch_up: None,
    post_process: None,
};

static SUBURB: BiomeProfile = BiomeProfile {
    biome: Biome::Suburb,
    base_terrain: suburb_base,
    fertility: fertility_field,
    plant_density: 0.06,
    touch_up: None,
    post_process: None,
};

/// Closed set of plant species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlantKind {
    /// Broad-leaf tree.
    Oak,
    /// Conifer.
    Pine,
    /// Tropical palm.
    Palm,
    /// Desert succulent.
    Cactus,
    /// Fruit-bearing shrub.
    BerryBush,
    /// Shade undergrowth.
    Fern,
    /// Waterside reed.
    Reed,
    /// Open-ground flower.
    Wildflower,
    /// Arid brush.
    Sagebrush,
    /// Damp-ground fungus.
    Mushroom,
}

/// One row of the species spawn table.
pub struct PlantSpawn {
    /// Species spawned.
    pub kind: PlantKind,
    /// Biomes this species appears in.
    pub biomes: &'static [Biome],
    /// Habitats this species tolerates.
    pub habitats: &'static [Habitat],
    /// Inclusive fertility band the species needs.
    pub fertility: (f32, f32),
    /// Relative draw weight among eligible species.
    pub frequency: f32,
}

impl PlantSpawn {
    /// Whether this species can appear at the given site.
    #[must_use]
    pub fn eligible(&self, biome: Biome, habitat: Habitat, fertility: f32) -> bool {
        self.biomes.contains(&biome)
            && self.habitats.contains(&habitat)
            && fertility >= self.fertility.0
            && fertility <= self.fertility.1
    }
}

const ALL_HABITATS: &[Habitat] = &[Habitat::Alpine, Habitat::Temperate, Habitat::Tropical];
const WARM: &[Habitat] = &[Habitat::Temperate, Habitat::Tropical];

/// Species spawn table consulted by vegetation carving.
pub static PLANT_TABLE: &[PlantSpawn] = &[
    PlantSpawn {
        kind: PlantKind::Oak,
        biomes: &[Biome::Forest, Biome::ForestHill, Biome::Plain, Biome::Hill],
        habitats: &[Habitat::Temperate],
        fertility: (0.35, 1.0),
        frequency: 1.0,
    },
    PlantSpawn {
        kind: PlantKind::Pine,
        biomes: &[Biome::Forest, Biome::ForestHill, Biome::Mountain, Biome::Hill],
        habitats: &[Habitat::Alpine, Habitat::Temperate],
        fertility: (0.2, 1.0),
        frequency: 1.0,
    },
    PlantSpawn {
        kind: PlantKind::Palm,
        biomes: &[Biome::Forest, Biome::Plain, Biome::Scrub],
        habitats: &[Habitat::Tropical],
        fertility: (0.3, 1.0),
        frequency: 0.8,
    },
    PlantSpawn {
        kind: PlantKind::Cactus,
        biomes: &[Biome::Desert, Biome::Scrub],
        habitats: WARM,
        fertility: (0.0, 0.5),
        frequency: 0.6,
    },
    PlantSpawn {
        kind: PlantKind::BerryBush,
        biomes: &[Biome::Plain, Biome::Forest, Biome::Hill, Biome::Suburb],
        habitats: WARM,
        fertility: (0.5, 1.0),
        frequency: 0.5,
    },
    PlantSpawn {
        kind: PlantKind::Fern,
        biomes: &[Biome::Forest, Biome::ForestHill, Biome::Swamp],
        habitats: ALL_HABITATS,
        fertility: (0.25, 1.0),
        frequency: 0.9,
    },
    PlantSpawn {
        kind: PlantKind::Reed,
        biomes: &[Biome::Swamp, Biome::Plain],
        habitats: WARM,
        fertility: (0.3, 1.0),
        frequency: 0.7,
    },
    PlantSpawn {
        kind: PlantKind::Wildflower,
        biomes: &[Biome::Plain, Biome::Hill, Biome::Suburb, Biome::Ruins],
        habitats: WARM,
        fertility: (0.4, 1.0),
        frequency: 0.8,
    },
    PlantSpawn {
        kind: PlantKind::Sagebrush,
        biomes: &[Biome::Scrub, Biome::Desert, Biome::Hill],
        habitats: WARM,
        fertility: (0.0, 0.6),
        frequency: 0.7,
    },
    PlantSpawn {
        kind: PlantKind::Mushroom,
        biomes: &[Biome::Swamp, Biome::Forest, Biome::Ruins],
        habitats: ALL_HABITATS,
        fertility: (0.2, 0.9),
        frequency: 0.4,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use wildermere_common::ChunkCoord;

    fn ctx_at<'a>(noise: &'a NoiseSource, meta: &'a ChunkMeta, x: i64, y: i64) -> CellCtx<'a> {
        CellCtx { noise, x, y, meta }
    }

    #[test]
    fn test_profile_matches_biome() {
        for biome in [
            Biome::Ocean,
            Biome::Glacier,
            Biome::Plain,
            Biome::Forest,
            Biome::ForestHill,
            Biome::Mountain,
            Biome::Swamp,
            Biome::Desert,
            Biome::Scrub,
            Biome::Hill,
            Biome::Ruins,
            Biome::Suburb,
        ] {
            assert_eq!(profile(biome).biome, biome);
        }
    }

    #[test]
    fn test_base_terrain_deterministic() {
        let noise = NoiseSource::new(99);
        let meta = ChunkMeta::ocean(ChunkCoord::new(0, 0));
        for x in 0..64 {
            let a = (profile(Biome::Forest).base_terrain)(&ctx_at(&noise, &meta, x, 5));
            let b = (profile(Biome::Forest).base_terrain)(&ctx_at(&noise, &meta, x, 5));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_ocean_is_barren_water() {
        let noise = NoiseSource::new(1);
        let meta = ChunkMeta::ocean(ChunkCoord::new(0, 0));
        let ctx = ctx_at(&noise, &meta, 3, 3);
        assert_eq!((OCEAN.base_terrain)(&ctx), Terrain::DeepWater);
        assert_eq!((OCEAN.fertility)(&ctx), 0.0);
        assert_eq!(OCEAN.plant_density, 0.0);
    }

    #[test]
    fn test_forest_produces_walls_and_clearings() {
        let noise = NoiseSource::new(4242);
        let meta = ChunkMeta::ocean(ChunkCoord::new(0, 0));
        let mut walls = 0;
        let mut open = 0;
        for y in 0..64 {
            for x in 0..64 {
                match (FOREST.base_terrain)(&ctx_at(&noise, &meta, x, y)) {
                    Terrain::ForestWall => walls += 1,
                    _ => open += 1,
                }
            }
        }
        assert!(walls > 0, "forest never produced canopy");
        assert!(open > 0, "forest never produced a clearing");
    }

    #[test]
    fn test_plant_table_eligibility() {
        let cactus = PLANT_TABLE
            .iter()
            .find(|s| s.kind == PlantKind::Cactus)
            .unwrap();
        assert!(cactus.eligible(Biome::Desert, Habitat::Tropical, 0.2));
        assert!(!cactus.eligible(Biome::Desert, Habitat::Alpine, 0.2));
        assert!(!cactus.eligible(Biome::Forest, Habitat::Tropical, 0.2));
        assert!(!cactus.eligible(Biome::Desert, Habitat::Tropical, 0.9));
    }

    #[test]
    fn test_every_land_biome_has_some_species() {
        for biome in [Biome::Plain, Biome::Forest, Biome::Swamp, Biome::Desert, Biome::Scrub] {
            let any = PLANT_TABLE.iter().any(|s| s.biomes.contains(&biome));
            assert!(any, "no species spawns in {biome:?}");
        }
    }
}
