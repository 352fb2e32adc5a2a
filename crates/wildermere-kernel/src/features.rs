//! Feature carving.
//!
//! Declared [`FeatureRecord`]s from chunk metadata are carved in two
//! stages: terrain-shaping features first (rivers, roads, lava, lakes),
//! then structure placement, which must see final ground to pick a site.
//!
//! Linear features enter at the midpoint of their edge and bend through a
//! spline control point toward the chunk center. Edge midpoints line up
//! across chunk seams, so the two mirrored halves of one crossing meet.

use tracing::debug;
use wildermere_common::{BuildingId, EdgeDir, LocalCoord, WorldError, WorldResult};
use wildermere_worldgen::{ChunkMeta, ExitSpec, FeatureRecord, NoiseSource, StructureKind};

use crate::chunk::{Chunk, ExitKind, ExitRecord};
use crate::store::{Building, WorldStore};
use crate::terrain::{CellFlags, Terrain, CHUNK_SIZE};

/// Structure footprint width in cells.
const STRUCT_W: i32 = 7;
/// Structure footprint height in cells.
const STRUCT_H: i32 = 5;

/// Carves all terrain-shaping features declared on the metadata.
pub fn carve_terrain_features(chunk: &mut Chunk, meta: &ChunkMeta, noise: &NoiseSource) {
    for feature in &meta.features {
        match feature {
            FeatureRecord::RiverExit(spec) => carve_band(chunk, spec, Terrain::ShallowWater),
            FeatureRecord::HighwayExit(spec) => carve_band(chunk, spec, Terrain::RoadPaved),
            FeatureRecord::TrailExit(spec) => carve_band(chunk, spec, Terrain::RoadDirt),
            FeatureRecord::LavaExit(spec) => carve_band(chunk, spec, Terrain::Lava),
            FeatureRecord::Lake => carve_lake(chunk, meta, noise),
            FeatureRecord::Structure { .. } => {}
        }
    }
}

/// Entry cell at the midpoint of an edge.
fn edge_entry(edge: EdgeDir) -> (f64, f64) {
    let size = f64::from(CHUNK_SIZE);
    let mid = (size - 1.0) / 2.0;
    match edge {
        EdgeDir::North => (mid, 0.0),
        EdgeDir::South => (mid, size - 1.0),
        EdgeDir::West => (0.0, mid),
        EdgeDir::East => (size - 1.0, mid),
        // Diagonal exits enter at the corner itself.
        EdgeDir::NorthEast => (size - 1.0, 0.0),
        EdgeDir::SouthEast => (size - 1.0, size - 1.0),
        EdgeDir::SouthWest => (0.0, size - 1.0),
        EdgeDir::NorthWest => (0.0, 0.0),
    }
}

/// Digs a quadratic bezier band from an edge entry to the chunk center.
fn carve_band(chunk: &mut Chunk, spec: &ExitSpec, terrain: Terrain) {
    let size = f64::from(CHUNK_SIZE);
    let (x0, y0) = edge_entry(spec.edge);
    let (cx, cy) = ((size - 1.0) / 2.0, (size - 1.0) / 2.0);
    let (px, py) = (
        f64::from(spec.control.0.clamp(0.0, 1.0)) * (size - 1.0),
        f64::from(spec.control.1.clamp(0.0, 1.0)) * (size - 1.0),
    );
    let radius = i32::from(spec.width / 2);

    let steps = (CHUNK_SIZE * 2) as i32;
    for step in 0..=steps {
        let t = f64::from(step) / f64::from(steps);
        let u = 1.0 - t;
        let x = u * u * x0 + 2.0 * u * t * px + t * t * cx;
        let y = u * u * y0 + 2.0 * u * t * py + t * t * cy;
        #[allow(clippy::cast_possible_truncation)]
        dig_disc(chunk, x.round() as i32, y.round() as i32, radius, terrain);
    }
}

/// Overwrites a Chebyshev disc of cells with the given terrain.
fn dig_disc(chunk: &mut Chunk, cx: i32, cy: i32, radius: i32, terrain: Terrain) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            chunk.set_terrain(cx + dx, cy + dy, terrain);
        }
    }
}

/// Carves a standing body of water as a noise-jittered ellipse.
fn carve_lake(chunk: &mut Chunk, meta: &ChunkMeta, noise: &NoiseSource) {
    let size = CHUNK_SIZE as i32;
    let origin = meta.coord.to_world_coord(CHUNK_SIZE);
    // Center and radii come off the world coordinate so re-carving agrees.
    let cx = size / 4 + (noise.white("lake center", origin.x, origin.y) * f64::from(size) / 2.0) as i32;
    let cy = size / 4 + (noise.white("lake center", origin.y, origin.x) * f64::from(size) / 2.0) as i32;
    let rx = size / 6 + (noise.white("lake radius", origin.x, origin.y) * f64::from(size) / 8.0) as i32;
    let ry = size / 6 + (noise.white("lake radius", origin.y, origin.x) * f64::from(size) / 8.0) as i32;

    for (x, y) in Chunk::cells() {
        let nx = f64::from(x - cx) / f64::from(rx.max(1));
        let ny = f64::from(y - cy) / f64::from(ry.max(1));
        // Jitter the rim so the shore is not a clean ellipse.
        let rim = 1.0 + 0.2 * noise.sample("lake rim", origin.x + i64::from(x), origin.y + i64::from(y));
        if nx * nx + ny * ny <= rim {
            chunk.set_terrain(x, y, Terrain::ShallowWater);
        }
    }
}

/// Stamps every declared structure, registering buildings in the store.
///
/// Placement scans the chunk interior in a deterministic noise-derived
/// order and takes the first clear footprint. A structure with no valid
/// footprint aborts this chunk's carve.
pub fn place_structures(
    chunk: &mut Chunk,
    meta: &ChunkMeta,
    noise: &NoiseSource,
    store: &dyn WorldStore,
) -> WorldResult<()> {
    for feature in meta.features.clone() {
        if let FeatureRecord::Structure { kind } = feature {
            let origin = find_footprint(chunk, meta, noise).ok_or_else(|| {
                WorldError::NoPlacement(format!("{kind:?} in {}", meta.coord))
            })?;
            stamp_structure(chunk, meta, noise, store, kind, origin);
        }
    }
    Ok(())
}

/// Finds a clear `STRUCT_W` x `STRUCT_H` footprint, if any.
fn find_footprint(chunk: &Chunk, meta: &ChunkMeta, noise: &NoiseSource) -> Option<(i32, i32)> {
    let size = CHUNK_SIZE as i32;
    let max_x = size - STRUCT_W - 1;
    let max_y = size - STRUCT_H - 1;
    let candidates = (max_x * max_y) as usize;
    let origin = meta.coord.to_world_coord(CHUNK_SIZE);
    let start = (noise.white("structure site", origin.x, origin.y) * candidates as f64) as usize;

    for i in 0..candidates {
        let slot = (start + i) % candidates;
        let ox = 1 + (slot as i32) % max_x;
        let oy = 1 + (slot as i32) / max_x;
        if footprint_clear(chunk, ox, oy) {
            return Some((ox, oy));
        }
    }
    None
}

fn footprint_clear(chunk: &Chunk, ox: i32, oy: i32) -> bool {
    // One cell of clearance keeps the door approachable.
    for dy in -1..=STRUCT_H {
        for dx in -1..=STRUCT_W {
            let Some(t) = chunk.terrain(ox + dx, oy + dy) else {
                return false;
            };
            if t.is_water() || t.is_wall() || matches!(t, Terrain::Lava | Terrain::RoadPaved | Terrain::RoadDirt) {
                return false;
            }
        }
    }
    true
}

fn stamp_structure(
    chunk: &mut Chunk,
    meta: &ChunkMeta,
    noise: &NoiseSource,
    store: &dyn WorldStore,
    kind: StructureKind,
    (ox, oy): (i32, i32),
) {
    let origin = meta.coord.to_world_coord(CHUNK_SIZE);
    for dy in 0..STRUCT_H {
        for dx in 0..STRUCT_W {
            let (x, y) = (ox + dx, oy + dy);
            let edge = dx == 0 || dy == 0 || dx == STRUCT_W - 1 || dy == STRUCT_H - 1;
            if edge {
                let broken = kind == StructureKind::Ruin
                    && noise.roll("ruin gaps", origin.x + i64::from(x), origin.y + i64::from(y), 0.35);
                chunk.set_terrain(x, y, if broken { Terrain::Rubble } else { Terrain::StoneWall });
            } else {
                chunk.set_terrain(x, y, Terrain::Floor);
                // Ruins have lost their roofs.
                if kind != StructureKind::Ruin {
                    chunk.set_flag(x, y, CellFlags::ROOFED);
                }
            }
        }
    }

    // Door at the middle of the south wall.
    let (door_x, door_y) = (ox + STRUCT_W / 2, oy + STRUCT_H - 1);
    chunk.set_terrain(door_x, door_y, Terrain::Door);

    #[allow(clippy::cast_sign_loss)]
    let door = LocalCoord::new(door_x as u16, door_y as u16);
    let building = Building {
        id: BuildingId::new(),
        kind,
        chunk: meta.coord,
        door,
    };
    chunk.exits.push(ExitRecord {
        pos: door,
        kind: ExitKind::Door,
        target: Some(building.id),
    });
    debug!(coord = %meta.coord, ?kind, "stamped structure");
    store.put_building(building);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use wildermere_common::ChunkCoord;
    use wildermere_worldgen::{Biome, ExitSpec, Habitat};

    fn land_meta(coord: ChunkCoord, features: Vec<FeatureRecord>) -> ChunkMeta {
        ChunkMeta {
            coord,
            height: 2,
            temperature: 12,
            biome: Biome::Plain,
            habitat: Habitat::Temperate,
            variance_noise: 0.0,
            features,
            city_distance: ChunkMeta::NO_CITY,
            title: "test plain".to_owned(),
        }
    }

    #[test]
    fn test_river_reaches_edge_and_center() {
        let noise = NoiseSource::new(5);
        let meta = land_meta(
            ChunkCoord::new(0, 0),
            vec![FeatureRecord::RiverExit(ExitSpec::new(EdgeDir::North, 3, (0.5, 0.5)))],
        );
        let mut chunk = Chunk::new(meta.coord);
        carve_terrain_features(&mut chunk, &meta, &noise);

        let size = CHUNK_SIZE as i32;
        let mid = size / 2;
        // Entry on the north edge.
        assert!((0..size).any(|x| chunk.terrain(x, 0) == Some(Terrain::ShallowWater)));
        // Water at or near the center.
        let near_center = (-2..=2).any(|dx| {
            (-2..=2).any(|dy| chunk.terrain(mid + dx, mid + dy) == Some(Terrain::ShallowWater))
        });
        assert!(near_center);
    }

    #[test]
    fn test_mirrored_exits_meet_at_seam() {
        let noise = NoiseSource::new(5);
        let spec = ExitSpec::new(EdgeDir::South, 3, (0.3, 0.7));
        let meta_a = land_meta(ChunkCoord::new(0, 0), vec![FeatureRecord::RiverExit(spec)]);
        let meta_b = land_meta(
            ChunkCoord::new(0, 1),
            vec![FeatureRecord::RiverExit(spec.mirrored())],
        );
        let mut a = Chunk::new(meta_a.coord);
        let mut b = Chunk::new(meta_b.coord);
        carve_terrain_features(&mut a, &meta_a, &noise);
        carve_terrain_features(&mut b, &meta_b, &noise);

        let size = CHUNK_SIZE as i32;
        // Both sides enter at the edge midpoint, so the water columns touch.
        let a_cols: Vec<i32> = (0..size)
            .filter(|&x| a.terrain(x, size - 1) == Some(Terrain::ShallowWater))
            .collect();
        let b_cols: Vec<i32> = (0..size)
            .filter(|&x| b.terrain(x, 0) == Some(Terrain::ShallowWater))
            .collect();
        assert!(!a_cols.is_empty());
        assert!(a_cols.iter().any(|x| b_cols.contains(x)));
    }

    #[test]
    fn test_highway_uses_paved_road() {
        let noise = NoiseSource::new(5);
        let meta = land_meta(
            ChunkCoord::new(0, 0),
            vec![FeatureRecord::HighwayExit(ExitSpec::new(EdgeDir::East, 2, (0.5, 0.5)))],
        );
        let mut chunk = Chunk::new(meta.coord);
        carve_terrain_features(&mut chunk, &meta, &noise);
        assert!(chunk.count_cells(|t| t == Terrain::RoadPaved) > 0);
        assert_eq!(chunk.count_cells(|t| t == Terrain::ShallowWater), 0);
    }

    #[test]
    fn test_lake_is_carved_and_deterministic() {
        let noise = NoiseSource::new(77);
        let meta = land_meta(ChunkCoord::new(4, 4), vec![FeatureRecord::Lake]);
        let mut a = Chunk::new(meta.coord);
        let mut b = Chunk::new(meta.coord);
        carve_terrain_features(&mut a, &meta, &noise);
        carve_terrain_features(&mut b, &meta, &noise);
        assert!(a.count_cells(Terrain::is_water) > 10);
        assert_eq!(a, b);
    }

    #[test]
    fn test_structure_stamp_registers_building() {
        let noise = NoiseSource::new(8);
        let store = MemoryStore::new();
        let meta = land_meta(
            ChunkCoord::new(0, 0),
            vec![FeatureRecord::Structure { kind: StructureKind::Cottage }],
        );
        let mut chunk = Chunk::new(meta.coord);
        place_structures(&mut chunk, &meta, &noise, &store).unwrap();

        assert_eq!(chunk.exits.len(), 1);
        let exit = chunk.exits[0];
        assert_eq!(exit.kind, ExitKind::Door);
        let building = store.building(exit.target.unwrap()).unwrap();
        assert_eq!(building.kind, StructureKind::Cottage);
        assert_eq!(building.chunk, meta.coord);
        // The door cell itself is a door, and the interior is roofed floor.
        let (dx, dy) = (i32::from(exit.pos.x), i32::from(exit.pos.y));
        assert_eq!(chunk.terrain(dx, dy), Some(Terrain::Door));
        assert!(chunk.has_flag(dx, dy - 1, CellFlags::ROOFED));
        assert_eq!(chunk.terrain(dx, dy - 1), Some(Terrain::Floor));
    }

    #[test]
    fn test_no_placement_on_full_water_chunk() {
        let noise = NoiseSource::new(8);
        let store = MemoryStore::new();
        let meta = land_meta(
            ChunkCoord::new(0, 0),
            vec![FeatureRecord::Structure { kind: StructureKind::Shrine }],
        );
        let mut chunk = Chunk::filled(meta.coord, Terrain::DeepWater);
        match place_structures(&mut chunk, &meta, &noise, &store) {
            Err(WorldError::NoPlacement(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
