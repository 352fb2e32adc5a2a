//! Seam-blended chunk carving.
//!
//! Carving turns one chunk's persisted metadata into concrete terrain:
//! - a per-cell biome draw blends neighboring biomes across chunk edges
//! - the winning biome's behavior table picks the base terrain
//! - declared features are carved, then whole-chunk touch-up passes run
//! - vegetation is rolled per cell from the species spawn table
//!
//! Every decision is keyed on the world cell coordinate through the
//! deterministic noise source, so carving depends only on metadata and
//! the world seed, never on carve order.

use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;
use wildermere_common::{ChunkCoord, EdgeDir, LocalCoord, WorldResult};
use wildermere_worldgen::{Biome, ChunkMeta, Habitat, NoiseSource};

use crate::biomes::{profile, CellCtx, PlantSpawn, PLANT_TABLE};
use crate::chunk::{Chunk, PlantInstance};
use crate::features;
use crate::store::WorldStore;
use crate::terrain::{Terrain, CHUNK_SIZE};

/// Depth in cells of the cardinal-edge blend band.
const BLEND_BAND: i32 = 6;

/// Chebyshev radius of the diagonal corner blend zone.
const CORNER_RADIUS: i32 = 4;

/// Maximum blend weight at the very edge, against an own-biome weight of 1.
const EDGE_WEIGHT: f32 = 0.5;

/// Carves concrete chunks from persisted metadata.
pub struct ChunkCarver {
    store: Arc<dyn WorldStore>,
    noise: Arc<NoiseSource>,
    /// Global vegetation density multiplier.
    plant_density: f32,
}

impl ChunkCarver {
    /// Creates a carver over the given store and noise source.
    #[must_use]
    pub fn new(store: Arc<dyn WorldStore>, noise: Arc<NoiseSource>, plant_density: f32) -> Self {
        Self { store, noise, plant_density }
    }

    /// Carves the chunk at a coordinate.
    ///
    /// Coordinates outside synthesized bounds carve as open ocean.
    pub fn carve(&self, coord: ChunkCoord) -> WorldResult<Chunk> {
        let meta = self.store.meta_or_ocean(coord);
        let mut chunk = Chunk::new(coord);

        let neighbors = self.blend_neighbors(&meta);
        let cell_biomes = self.blend_biomes(&meta, &neighbors);
        self.carve_base(&mut chunk, &meta, &cell_biomes, &neighbors);
        features::carve_terrain_features(&mut chunk, &meta, &self.noise);
        self.shade_water(&mut chunk, &meta);
        fix_wall_slivers(&mut chunk);
        if let Some(post_process) = profile(meta.biome).post_process {
            for (x, y) in Chunk::cells() {
                if let Some(t) = chunk.terrain(x, y) {
                    chunk.set_terrain(x, y, post_process(t));
                }
            }
        }
        features::place_structures(&mut chunk, &meta, &self.noise, self.store.as_ref())?;
        self.spawn_plants(&mut chunk, &meta);

        trace!(coord = %coord, biome = meta.biome.name(), "carved chunk");
        Ok(chunk)
    }

    /// Neighbor biomes that participate in edge blending.
    ///
    /// Same-biome and ocean neighbors contribute nothing, so a chunk
    /// surrounded by its own biome carves uniformly from its own table.
    /// Ocean chunks never blend.
    fn blend_neighbors(&self, meta: &ChunkMeta) -> Vec<(EdgeDir, Biome)> {
        if meta.is_ocean() {
            return Vec::new();
        }
        EdgeDir::ALL
            .iter()
            .filter_map(|&dir| {
                let n = self.store.meta_or_ocean(meta.coord.neighbor(dir));
                (n.biome != meta.biome && !n.is_ocean()).then_some((dir, n.biome))
            })
            .collect()
    }

    /// Draws a biome for every cell, blending neighbors near edges.
    fn blend_biomes(&self, meta: &ChunkMeta, neighbors: &[(EdgeDir, Biome)]) -> Vec<Biome> {
        let size = CHUNK_SIZE as i32;
        let mut out = vec![meta.biome; Chunk::CELLS];
        if neighbors.is_empty() {
            return out;
        }

        let origin = meta.coord.to_world_coord(CHUNK_SIZE);
        let mut weights: Vec<f32> = Vec::with_capacity(neighbors.len() + 1);
        for (x, y) in Chunk::cells() {
            weights.clear();
            weights.push(1.0);
            for (dir, _) in neighbors {
                weights.push(blend_weight(*dir, x, y, size));
            }
            if weights[1..].iter().all(|w| *w <= 0.0) {
                continue;
            }
            let wx = origin.x + i64::from(x);
            let wy = origin.y + i64::from(y);
            if let Some(idx) = self.noise.pick_weighted("biome blend", wx, wy, &weights) {
                if idx > 0 {
                    out[(y * size + x) as usize] = neighbors[idx - 1].1;
                }
            }
        }

        fix_orphans(&mut out);
        out
    }

    /// Carves base terrain from each cell's drawn biome.
    ///
    /// Each blending neighbor's touch-up hook runs over the band nearest
    /// that neighbor, so a desert next door parches the grass along the
    /// shared edge regardless of which biome the cell drew.
    fn carve_base(
        &self,
        chunk: &mut Chunk,
        meta: &ChunkMeta,
        cell_biomes: &[Biome],
        neighbors: &[(EdgeDir, Biome)],
    ) {
        let size = CHUNK_SIZE as i32;
        let origin = meta.coord.to_world_coord(CHUNK_SIZE);
        for (x, y) in Chunk::cells() {
            let biome = cell_biomes[(y * size + x) as usize];
            let ctx = CellCtx {
                noise: &self.noise,
                x: origin.x + i64::from(x),
                y: origin.y + i64::from(y),
                meta,
            };
            let mut terrain = (profile(biome).base_terrain)(&ctx);
            for &(dir, neighbor_biome) in neighbors {
                if blend_weight(dir, x, y, size) <= 0.0 {
                    continue;
                }
                if let Some(touch_up) = profile(neighbor_biome).touch_up {
                    terrain = touch_up(terrain);
                }
            }
            if terrain == Terrain::ForestWall {
                terrain = forest_wall_for(meta.habitat);
            }
            chunk.set_terrain(x, y, terrain);
        }
    }

    /// Shades water by distance to land: shore, shallow, then deep.
    ///
    /// Edges facing a land neighbor chunk seed as near-shore so ocean
    /// chunks shade consistently with the coastline next door.
    fn shade_water(&self, chunk: &mut Chunk, meta: &ChunkMeta) {
        if chunk.count_cells(Terrain::is_water) == 0 {
            return;
        }
        let size = CHUNK_SIZE as i32;
        let mut dist = vec![i32::MAX; Chunk::CELLS];
        let mut queue = VecDeque::new();

        for (x, y) in Chunk::cells() {
            let idx = (y * size + x) as usize;
            if chunk.terrain(x, y).is_some_and(|t| !t.is_water()) {
                dist[idx] = 0;
                queue.push_back((x, y));
            }
        }
        for dir in EdgeDir::CARDINAL {
            let neighbor = self.store.meta_or_ocean(meta.coord.neighbor(dir));
            if neighbor.is_ocean() {
                continue;
            }
            for along in 0..size {
                let (x, y) = match dir {
                    EdgeDir::North => (along, 0),
                    EdgeDir::South => (along, size - 1),
                    EdgeDir::West => (0, along),
                    _ => (size - 1, along),
                };
                let idx = (y * size + x) as usize;
                if dist[idx] > 1 {
                    dist[idx] = 1;
                    queue.push_back((x, y));
                }
            }
        }

        while let Some((x, y)) = queue.pop_front() {
            let d = dist[(y * size + x) as usize];
            for (nx, ny) in [(x, y - 1), (x - 1, y), (x + 1, y), (x, y + 1)] {
                if nx < 0 || nx >= size || ny < 0 || ny >= size {
                    continue;
                }
                let idx = (ny * size + nx) as usize;
                if dist[idx] > d + 1 {
                    dist[idx] = d + 1;
                    queue.push_back((nx, ny));
                }
            }
        }

        for (x, y) in Chunk::cells() {
            if !chunk.terrain(x, y).is_some_and(Terrain::is_water) {
                continue;
            }
            let shaded = match dist[(y * size + x) as usize] {
                1 => Terrain::ShoreWater,
                2 => Terrain::ShallowWater,
                _ => Terrain::DeepWater,
            };
            chunk.set_terrain(x, y, shaded);
        }
    }

    /// Rolls vegetation over every plantable cell.
    fn spawn_plants(&self, chunk: &mut Chunk, meta: &ChunkMeta) {
        let biome_profile = profile(meta.biome);
        if biome_profile.plant_density <= 0.0 || self.plant_density <= 0.0 {
            return;
        }
        let origin = meta.coord.to_world_coord(CHUNK_SIZE);
        for (x, y) in Chunk::cells() {
            let Some(terrain) = chunk.terrain(x, y) else { continue };
            if !terrain.supports_plants() {
                continue;
            }
            let wx = origin.x + i64::from(x);
            let wy = origin.y + i64::from(y);
            let ctx = CellCtx { noise: &self.noise, x: wx, y: wy, meta };

            let mut fertility = (biome_profile.fertility)(&ctx);
            fertility += terrain_fertility_bonus(terrain);
            if fertile_adjacency(chunk, x, y) {
                fertility += 0.15;
            }
            fertility += (self.noise.white("fertility jitter", wx, wy) as f32 - 0.5) * 0.2;
            let fertility = fertility.clamp(0.0, 1.0);

            let p = f64::from(biome_profile.plant_density)
                * f64::from(self.plant_density)
                * f64::from(fertility.max(0.2));
            if !self.noise.roll("veg roll", wx, wy, p) {
                continue;
            }

            let eligible: Vec<&PlantSpawn> = PLANT_TABLE
                .iter()
                .filter(|s| s.eligible(meta.biome, meta.habitat, fertility))
                .collect();
            let frequencies: Vec<f32> = eligible.iter().map(|s| s.frequency).collect();
            if let Some(idx) = self.noise.pick_weighted("veg species", wx, wy, &frequencies) {
                #[allow(clippy::cast_sign_loss)]
                chunk.plants.push(PlantInstance {
                    kind: eligible[idx].kind,
                    pos: LocalCoord::new(x as u16, y as u16),
                });
            }
        }
    }
}

impl std::fmt::Debug for ChunkCarver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkCarver")
            .field("plant_density", &self.plant_density)
            .finish()
    }
}

/// Blend weight contributed by one neighbor direction at a cell.
fn blend_weight(dir: EdgeDir, x: i32, y: i32, size: i32) -> f32 {
    let depth = match dir {
        EdgeDir::North => y,
        EdgeDir::South => size - 1 - y,
        EdgeDir::West => x,
        EdgeDir::East => size - 1 - x,
        EdgeDir::NorthWest => x.max(y),
        EdgeDir::NorthEast => (size - 1 - x).max(y),
        EdgeDir::SouthWest => x.max(size - 1 - y),
        EdgeDir::SouthEast => (size - 1 - x).max(size - 1 - y),
    };
    let limit = if dir.is_cardinal() { BLEND_BAND } else { CORNER_RADIUS };
    if depth >= limit {
        0.0
    } else {
        EDGE_WEIGHT * (1.0 - depth as f32 / limit as f32)
    }
}

/// Whether any 8-neighbor cell is forest wall or water.
///
/// Such cells grow better: canopy shelter and moisture both raise the
/// fertility score.
fn fertile_adjacency(chunk: &Chunk, x: i32, y: i32) -> bool {
    EdgeDir::ALL.iter().any(|dir| {
        let (dx, dy) = dir.offset();
        chunk
            .terrain(x + dx, y + dy)
            .is_some_and(|t| t.is_forest_wall() || t.is_water())
    })
}

/// Reassigns cells whose biome matches none of their cardinal neighbors
/// to the biome most common among those neighbors.
fn fix_orphans(cell_biomes: &mut [Biome]) {
    let size = CHUNK_SIZE as i32;
    let mut fixes = Vec::new();
    for y in 0..size {
        for x in 0..size {
            let idx = (y * size + x) as usize;
            let biome = cell_biomes[idx];
            let neighbors: Vec<Biome> = [(x, y - 1), (x - 1, y), (x + 1, y), (x, y + 1)]
                .iter()
                .filter(|&&(nx, ny)| nx >= 0 && nx < size && ny >= 0 && ny < size)
                .map(|&(nx, ny)| cell_biomes[(ny * size + nx) as usize])
                .collect();
            if neighbors.iter().any(|&n| n == biome) {
                continue;
            }
            let replacement = neighbors
                .iter()
                .copied()
                .max_by_key(|&candidate| neighbors.iter().filter(|&&n| n == candidate).count());
            if let Some(replacement) = replacement {
                fixes.push((idx, replacement));
            }
        }
    }
    for (idx, replacement) in fixes {
        cell_biomes[idx] = replacement;
    }
}

/// Replaces one-cell wall slivers open above and below with ground.
///
/// Only natural walls are touched; built walls keep their shape. Cells
/// against the chunk edge are left alone since the neighbor chunk may
/// continue the wall.
fn fix_wall_slivers(chunk: &mut Chunk) {
    let size = CHUNK_SIZE as i32;
    let mut fixes = Vec::new();
    for (x, y) in Chunk::cells() {
        if y == 0 || y == size - 1 {
            continue;
        }
        let Some(t) = chunk.terrain(x, y) else { continue };
        if !t.is_forest_wall() && t != Terrain::RockWall {
            continue;
        }
        let above = chunk.terrain(x, y - 1).is_some_and(Terrain::is_wall);
        let below = chunk.terrain(x, y + 1).is_some_and(Terrain::is_wall);
        if !above && !below {
            let replacement = [(x, y - 1), (x - 1, y), (x + 1, y), (x, y + 1)]
                .iter()
                .filter_map(|&(nx, ny)| chunk.terrain(nx, ny))
                .find(|t| !t.is_wall() && !t.is_water())
                .unwrap_or(Terrain::Grass);
            fixes.push((x, y, replacement));
        }
    }
    for (x, y, replacement) in fixes {
        chunk.set_terrain(x, y, replacement);
    }
}

/// Habitat-specific forest wall variant.
const fn forest_wall_for(habitat: Habitat) -> Terrain {
    match habitat {
        Habitat::Alpine => Terrain::PineWall,
        Habitat::Temperate => Terrain::OakWall,
        Habitat::Tropical => Terrain::PalmWall,
    }
}
