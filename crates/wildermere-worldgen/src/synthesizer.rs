//! One-time world-scale synthesis.
//!
//! [`WorldSynthesizer::synthesize`] runs one ordered pipeline over the
//! whole grid, each stage total before the next begins:
//!
//! 1. Continent shape (ocean seeding + thresholded dilation)
//! 2. Height growth from the coast, building the river forest
//! 3. Peak detection
//! 4. Polar ice caps
//! 5. River selection and drawing (mirrored exit pairs)
//! 6. Moisture (multi-source dryness BFS)
//! 7. Mountain-range clustering
//! 8. Biome assignment, lakes, settlement seeds
//! 9. Road drawing between settlement seeds (mirrored exit pairs)
//! 10. Flush to the metadata store
//!
//! Synthesis is all-or-nothing: invalid bounds fail before any writes,
//! and the pipeline is not resumable mid-stage. True randomness is used
//! only here, from one explicitly seeded stream; everything that must be
//! stable per coordinate goes through [`NoiseSource`] instead.

use std::collections::VecDeque;

use tracing::{debug, info};
use wildermere_common::{ChunkCoord, EdgeDir, WorldError, WorldResult};

use crate::meta::{Biome, ChunkMeta, ExitSpec, FeatureRecord, Habitat, MetaStore, StructureKind};
use crate::noise::NoiseSource;
use crate::scratch::{ChunkScratch, ScratchGrid, DRYNESS_UNASSIGNED};

/// Ocean dilation densities, one coastline-roughening pass each.
const DILATION_DENSITIES: [f64; 4] = [0.6, 0.45, 0.3, 0.2];

/// Rectangular synthesis bounds in chunk coordinates, anchored at (0, 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldBounds {
    /// Width in chunks.
    pub width: i32,
    /// Height in chunks.
    pub height: i32,
}

impl WorldBounds {
    /// Minimum edge length for a synthesizable world.
    pub const MIN_EDGE: i32 = 4;

    /// Creates new bounds.
    #[must_use]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Whether these bounds can be synthesized.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.width >= Self::MIN_EDGE && self.height >= Self::MIN_EDGE
    }

    /// Whether a coordinate lies inside the bounds.
    #[must_use]
    pub const fn contains(&self, coord: ChunkCoord) -> bool {
        coord.x >= 0 && coord.x < self.width && coord.y >= 0 && coord.y < self.height
    }
}

/// Parameters controlling world synthesis.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// World bounds in chunks.
    pub bounds: WorldBounds,
    /// Seed for the synthesis random stream; persisted in the report.
    pub seed: u64,
    /// Which outer edges seed ocean (north, east, south, west).
    pub ocean_edges: [bool; 4],
    /// Number of rectangular coastline bites.
    pub ocean_bites: u32,
    /// Rows of polar ice at the north edge.
    pub glacier_rows: i32,
    /// Minimum height for peak detection.
    pub peak_min_height: i32,
    /// Descendant count above which a mouth counts as a large basin.
    pub large_basin: u32,
    /// River chance for large-basin mouths.
    pub river_chance_large: f64,
    /// River chance for small-basin mouths.
    pub river_chance_small: f64,
    /// Chance to also draw a non-trunk branch at a branch point.
    pub branch_chance: f64,
    /// Upper bound on river width in cells.
    pub max_river_width: u8,
    /// Width gained per river-tree descendant.
    pub river_width_factor: f32,
    /// Dryness at or above which land becomes desert.
    pub desert_dryness: i32,
    /// Dryness at or above which land becomes scrub.
    pub scrub_dryness: i32,
    /// Forest-density noise threshold separating forest from plain.
    pub forest_threshold: f64,
    /// Height at or above which open land becomes hill terrain.
    pub hill_height: i32,
    /// Chance for wet lowland to become swamp.
    pub swamp_chance: f64,
    /// Maximum dryness for a peak to join a mountain range.
    pub range_wetness: i32,
    /// Maximum Chebyshev distance between linked range peaks.
    pub range_link_radius: i32,
    /// Base lake chance per land chunk.
    pub lake_base_chance: f64,
    /// Additional lake chance per river exit on the chunk.
    pub lake_per_exit_chance: f64,
    /// Chance for open land to seed a settlement.
    pub settlement_chance: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            bounds: WorldBounds::new(64, 64),
            seed: 0,
            ocean_edges: [true; 4],
            ocean_bites: 6,
            glacier_rows: 3,
            peak_min_height: 4,
            large_basin: 24,
            river_chance_large: 0.5,
            river_chance_small: 0.08,
            branch_chance: 0.35,
            max_river_width: 5,
            river_width_factor: 0.08,
            desert_dryness: 7,
            scrub_dryness: 5,
            forest_threshold: 0.1,
            hill_height: 3,
            swamp_chance: 0.3,
            range_wetness: 4,
            range_link_radius: 8,
            lake_base_chance: 0.03,
            lake_per_exit_chance: 0.08,
            settlement_chance: 0.01,
        }
    }
}

/// Summary of a completed synthesis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisReport {
    /// Chunks flushed to the store.
    pub chunks: usize,
    /// Rivers drawn from coastal mouths.
    pub rivers: usize,
    /// Mountain ranges linked.
    pub ranges: usize,
    /// Settlement seeds placed.
    pub settlements: usize,
    /// Roads drawn between settlement seeds.
    pub roads: usize,
    /// The seed the run used.
    pub seed: u64,
}

/// Batch world synthesizer.
///
/// Fills a [`ScratchGrid`] stage by stage and flushes it to the metadata
/// store. Runs once per world; carving never runs concurrently with it.
pub struct WorldSynthesizer<'a> {
    config: SynthesisConfig,
    noise: &'a NoiseSource,
    rng: fastrand::Rng,
}

impl<'a> WorldSynthesizer<'a> {
    /// Creates a synthesizer with an explicitly seeded random stream.
    #[must_use]
    pub fn new(config: SynthesisConfig, noise: &'a NoiseSource) -> Self {
        let rng = fastrand::Rng::with_seed(config.seed);
        Self { config, noise, rng }
    }

    /// Runs the full pipeline and persists one [`ChunkMeta`] per
    /// coordinate in bounds.
    pub fn synthesize(&mut self, store: &dyn MetaStore) -> WorldResult<SynthesisReport> {
        let (grid, mut report) = self.synthesize_grid()?;
        let batch = self.flush(grid);
        report.chunks = batch.len();
        store.put_chunk_meta_batch(batch);
        info!(
            chunks = report.chunks,
            rivers = report.rivers,
            ranges = report.ranges,
            settlements = report.settlements,
            roads = report.roads,
            seed = report.seed,
            "world synthesis complete"
        );
        Ok(report)
    }

    /// Runs stages 1-8, returning the populated scratch grid.
    ///
    /// Exposed so invariants (river-tree counts, dryness gradients) can be
    /// checked before the grid is flushed and discarded.
    pub fn synthesize_grid(&mut self) -> WorldResult<(ScratchGrid, SynthesisReport)> {
        let bounds = self.config.bounds;
        if !bounds.is_valid() {
            return Err(WorldError::InvalidBounds {
                width: bounds.width,
                height: bounds.height,
            });
        }

        let mut grid = ScratchGrid::new(bounds.width, bounds.height);
        self.shape_continent(&mut grid);
        self.grow_heights(&mut grid);
        self.mark_peaks(&mut grid);
        self.cap_poles(&mut grid);
        let rivers = self.draw_rivers(&mut grid);
        self.measure_dryness(&mut grid);
        let ranges = self.link_ranges(&mut grid);
        let settlements = self.assign_biomes(&mut grid);
        let roads = self.draw_roads(&mut grid);

        let report = SynthesisReport {
            chunks: 0,
            rivers,
            ranges,
            settlements,
            roads,
            seed: self.config.seed,
        };
        Ok((grid, report))
    }

    /// Stage 1: seed ocean along the configured outer edges and on random
    /// rectangular bites, then grow it with density-thresholded dilation
    /// passes of decreasing density.
    fn shape_continent(&mut self, grid: &mut ScratchGrid) {
        let (w, h) = (grid.width(), grid.height());
        let [north, east, south, west] = self.config.ocean_edges;

        let mut seed_ocean = |grid: &mut ScratchGrid, coord: ChunkCoord| {
            if let Some(cell) = grid.get_mut(coord) {
                cell.height = 0;
                cell.biome = Some(Biome::Ocean);
            }
        };

        for x in 0..w {
            if north {
                seed_ocean(grid, ChunkCoord::new(x, 0));
            }
            if south {
                seed_ocean(grid, ChunkCoord::new(x, h - 1));
            }
        }
        for y in 0..h {
            if west {
                seed_ocean(grid, ChunkCoord::new(0, y));
            }
            if east {
                seed_ocean(grid, ChunkCoord::new(w - 1, y));
            }
        }

        // Rectangular bites cut irregular bays into the seeded edges.
        let edges: Vec<usize> = self
            .config
            .ocean_edges
            .iter()
            .enumerate()
            .filter_map(|(i, on)| on.then_some(i))
            .collect();
        if !edges.is_empty() {
            for _ in 0..self.config.ocean_bites {
                let edge = edges[self.rng.usize(..edges.len())];
                let bite_w = self.rng.i32(1..=(w / 4).max(1));
                let bite_h = self.rng.i32(1..=(h / 4).max(1));
                let (x0, y0) = match edge {
                    0 => (self.rng.i32(0..w), 0),
                    1 => (w - bite_w, self.rng.i32(0..h)),
                    2 => (self.rng.i32(0..w), h - bite_h),
                    _ => (0, self.rng.i32(0..h)),
                };
                for y in y0..(y0 + bite_h).min(h) {
                    for x in x0..(x0 + bite_w).min(w) {
                        seed_ocean(grid, ChunkCoord::new(x.max(0), y.max(0)));
                    }
                }
            }
        }

        // Cellular dilation with decreasing density roughens the coast
        // without uniform blob growth.
        for density in DILATION_DENSITIES {
            let frontier: Vec<ChunkCoord> = grid
                .coords()
                .filter(|&c| {
                    grid.get(c).is_some_and(|cell| !cell.has_height())
                        && c.neighbors()
                            .iter()
                            .any(|&n| grid.get(n).is_some_and(ChunkScratch::is_ocean))
                })
                .collect();
            for coord in frontier {
                if self.rng.f64() < density {
                    seed_ocean(grid, coord);
                }
            }
        }
        debug!("continent shaped");
    }

    /// Stage 2: breadth-first height growth from every coastal land cell,
    /// recording parent/children links. The links form a forest of rooted
    /// trees whose leaves are headwaters and whose roots are coastal
    /// mouths. Unreached cells fall back to height 1.
    fn grow_heights(&mut self, grid: &mut ScratchGrid) {
        let mut queue: VecDeque<ChunkCoord> = VecDeque::new();

        let coords: Vec<ChunkCoord> = grid.coords().collect();
        for coord in &coords {
            let is_unassigned = grid.get(*coord).is_some_and(|c| !c.has_height());
            if !is_unassigned {
                continue;
            }
            let coastal = coord
                .cardinal_neighbors()
                .iter()
                .any(|&n| grid.get(n).is_some_and(ChunkScratch::is_ocean));
            if coastal {
                if let Some(cell) = grid.get_mut(*coord) {
                    cell.height = 1;
                    cell.river_parent = None;
                }
                queue.push_back(*coord);
            }
        }

        while let Some(coord) = queue.pop_front() {
            let height = grid.get(coord).map_or(0, |c| c.height);
            for neighbor in coord.cardinal_neighbors() {
                let unassigned = grid.get(neighbor).is_some_and(|c| !c.has_height());
                if !unassigned {
                    continue;
                }
                if let Some(cell) = grid.get_mut(neighbor) {
                    cell.height = height + 1;
                    cell.river_parent = Some(coord);
                }
                if let Some(parent) = grid.get_mut(coord) {
                    parent.river_children.push(neighbor);
                }
                queue.push_back(neighbor);
            }
        }

        // Cells enclosed away from any coast still need a height.
        for coord in coords {
            if let Some(cell) = grid.get_mut(coord) {
                if !cell.has_height() {
                    cell.height = 1;
                }
            }
        }
        debug!("heights grown");
    }

    /// Stage 3: a cell is a peak iff its height exceeds the minimum and no
    /// 8-neighbor is strictly higher.
    fn mark_peaks(&mut self, grid: &mut ScratchGrid) {
        let peaks: Vec<ChunkCoord> = grid
            .coords()
            .filter(|&c| {
                let height = grid.get(c).map_or(0, |cell| cell.height);
                height > self.config.peak_min_height
                    && c.neighbors()
                        .iter()
                        .all(|&n| grid.get(n).map_or(true, |cell| cell.height <= height))
            })
            .collect();
        for coord in peaks {
            if let Some(cell) = grid.get_mut(coord) {
                cell.biome = Some(Biome::Mountain);
            }
        }
    }

    /// Stage 4: force the top latitude rows to glacier, with decreasing
    /// probability further from the pole. Open ocean is left alone.
    fn cap_poles(&mut self, grid: &mut ScratchGrid) {
        let rows = self.config.glacier_rows;
        for y in 0..rows.min(grid.height()) {
            let p = 1.0 - f64::from(y) / f64::from(rows);
            for x in 0..grid.width() {
                let coord = ChunkCoord::new(x, y);
                let land = grid.get(coord).is_some_and(|c| !c.is_ocean());
                if land && self.rng.f64() < p {
                    if let Some(cell) = grid.get_mut(coord) {
                        cell.biome = Some(Biome::Glacier);
                    }
                }
            }
        }
    }

    /// Stage 5: size every river tree, roll which coastal mouths become
    /// rivers (large basins more often), and draw each chosen river by
    /// following the largest-descendant trunk with independent side-branch
    /// rolls. Every drawn edge becomes a mirrored pair of river exits.
    ///
    /// Returns the number of rivers drawn.
    fn draw_rivers(&mut self, grid: &mut ScratchGrid) -> usize {
        let roots: Vec<ChunkCoord> = grid
            .coords()
            .filter(|&c| {
                grid.get(c)
                    .is_some_and(|cell| cell.height >= 1 && cell.river_parent.is_none())
            })
            .collect();

        // Descendant counting, iterative to bound stack depth.
        for &root in &roots {
            let mut order = vec![root];
            let mut i = 0;
            while i < order.len() {
                let children = grid.get(order[i]).map(|c| c.river_children.clone());
                if let Some(children) = children {
                    order.extend(children);
                }
                i += 1;
            }
            for &coord in order.iter().rev() {
                let children = grid.get(coord).map_or_else(Vec::new, |c| c.river_children.clone());
                let sum: u32 = children
                    .iter()
                    .map(|&child| grid.get(child).map_or(0, |c| c.river_descendants))
                    .sum();
                if let Some(cell) = grid.get_mut(coord) {
                    cell.river_descendants = 1 + sum;
                }
            }
        }

        let mut rivers = 0;
        for root in roots {
            let descendants = grid.get(root).map_or(0, |c| c.river_descendants);
            if descendants < 2 {
                continue;
            }
            let chance = if descendants >= self.config.large_basin {
                self.config.river_chance_large
            } else {
                self.config.river_chance_small
            };
            if self.rng.f64() >= chance {
                continue;
            }
            rivers += 1;

            // The mouth drains into an adjacent ocean cell.
            let sea_dir = root.cardinal_neighbors().iter().find_map(|&n| {
                grid.get(n)
                    .is_some_and(ChunkScratch::is_ocean)
                    .then(|| dir_between(root, n))
                    .flatten()
            });
            if let (Some(dir), Some(cell)) = (sea_dir, grid.get_mut(root)) {
                let width = river_width(
                    descendants,
                    self.config.max_river_width,
                    self.config.river_width_factor,
                );
                let control = (self.rng.f32(), self.rng.f32());
                cell.features
                    .push(FeatureRecord::RiverExit(ExitSpec::new(dir, width, control)));
            }

            // Walk upstream with an explicit stack; recursion depth would
            // track river length otherwise.
            let mut stack = vec![root];
            while let Some(coord) = stack.pop() {
                let children = grid.get(coord).map_or_else(Vec::new, |c| c.river_children.clone());
                if children.is_empty() {
                    continue;
                }
                let trunk = children
                    .iter()
                    .copied()
                    .max_by_key(|&c| grid.get(c).map_or(0, |cell| cell.river_descendants));
                for child in children {
                    let is_trunk = Some(child) == trunk;
                    if !is_trunk && self.rng.f64() >= self.config.branch_chance {
                        continue;
                    }
                    let child_desc = grid.get(child).map_or(0, |c| c.river_descendants);
                    if child_desc < 2 && !is_trunk {
                        continue;
                    }
                    let Some(dir) = dir_between(coord, child) else {
                        continue;
                    };
                    let width = river_width(
                        child_desc,
                        self.config.max_river_width,
                        self.config.river_width_factor,
                    );
                    let control = (self.rng.f32(), self.rng.f32());
                    let spec = ExitSpec::new(dir, width, control);
                    if let Some(cell) = grid.get_mut(coord) {
                        cell.features.push(FeatureRecord::RiverExit(spec));
                    }
                    if let Some(cell) = grid.get_mut(child) {
                        cell.features
                            .push(FeatureRecord::RiverExit(spec.mirrored()));
                    }
                    stack.push(child);
                }
            }
        }
        debug!(rivers, "rivers drawn");
        rivers
    }

    /// Stage 6: multi-source BFS from every water cell (ocean or river),
    /// assigning dryness = BFS distance. Gates desert/forest thresholds.
    fn measure_dryness(&mut self, grid: &mut ScratchGrid) {
        let mut queue: VecDeque<ChunkCoord> = VecDeque::new();
        let coords: Vec<ChunkCoord> = grid.coords().collect();
        for coord in &coords {
            let wet = grid
                .get(*coord)
                .is_some_and(|c| c.is_ocean() || c.has_river());
            if wet {
                if let Some(cell) = grid.get_mut(*coord) {
                    cell.dryness = 0;
                }
                queue.push_back(*coord);
            }
        }

        while let Some(coord) = queue.pop_front() {
            let dryness = grid.get(coord).map_or(0, |c| c.dryness);
            for neighbor in coord.cardinal_neighbors() {
                let unvisited = grid
                    .get(neighbor)
                    .is_some_and(|c| c.dryness == DRYNESS_UNASSIGNED);
                if unvisited {
                    if let Some(cell) = grid.get_mut(neighbor) {
                        cell.dryness = dryness + 1;
                    }
                    queue.push_back(neighbor);
                }
            }
        }

        // A world with no water at all leaves everything maximally dry.
        let max_dry = grid.width() + grid.height();
        for coord in coords {
            if let Some(cell) = grid.get_mut(coord) {
                if cell.dryness == DRYNESS_UNASSIGNED {
                    cell.dryness = max_dry;
                }
            }
        }
    }

    /// Stage 7: cluster wet peaks by proximity and paint a 2-cell-wide
    /// mountain ribbon between linked peaks.
    ///
    /// Returns the number of ranges linked.
    fn link_ranges(&mut self, grid: &mut ScratchGrid) -> usize {
        let peaks: Vec<ChunkCoord> = grid
            .coords()
            .filter(|&c| {
                grid.get(c).is_some_and(|cell| {
                    cell.biome == Some(Biome::Mountain) && cell.dryness <= self.config.range_wetness
                })
            })
            .collect();

        let mut linked = vec![false; peaks.len()];
        let mut ranges = 0;
        for i in 0..peaks.len() {
            if linked[i] {
                continue;
            }
            let nearest = (0..peaks.len())
                .filter(|&j| j != i && !linked[j])
                .filter(|&j| peaks[i].chebyshev(peaks[j]) <= self.config.range_link_radius)
                .min_by_key(|&j| peaks[i].chebyshev(peaks[j]));
            let Some(j) = nearest else {
                continue;
            };
            linked[i] = true;
            linked[j] = true;
            ranges += 1;
            for coord in line_between(peaks[i], peaks[j]) {
                for ribbon in [coord, ChunkCoord::new(coord.x, coord.y + 1)] {
                    if let Some(cell) = grid.get_mut(ribbon) {
                        if !cell.is_ocean() {
                            cell.biome = Some(Biome::Mountain);
                        }
                    }
                }
            }
        }
        debug!(ranges, "mountain ranges linked");
        ranges
    }

    /// Stage 8: every cell without an explicit biome is set by height,
    /// dryness, and the forest-density noise channel; lakes are rolled
    /// with probability conditioned on river-exit count; a few open cells
    /// seed settlements.
    ///
    /// Returns the number of settlement seeds placed.
    fn assign_biomes(&mut self, grid: &mut ScratchGrid) -> usize {
        let mut settlements = 0;
        let coords: Vec<ChunkCoord> = grid.coords().collect();
        for coord in coords {
            let Some(cell) = grid.get(coord) else { continue };
            let (height, dryness, exits, assigned) = (
                cell.height,
                cell.dryness,
                cell.features
                    .iter()
                    .filter(|f| matches!(f, FeatureRecord::RiverExit(_)))
                    .count(),
                cell.biome,
            );

            if assigned.is_none() {
                let biome = if height == 0 {
                    Biome::Ocean
                } else if dryness >= self.config.desert_dryness {
                    Biome::Desert
                } else if dryness >= self.config.scrub_dryness {
                    Biome::Scrub
                } else if height <= 1 && dryness <= 1 && self.rng.f64() < self.config.swamp_chance {
                    Biome::Swamp
                } else {
                    let gx = i64::from(coord.x);
                    let gy = i64::from(coord.y);
                    let forest =
                        self.noise.sample("forest density", gx, gy) > self.config.forest_threshold;
                    match (forest, height >= self.config.hill_height) {
                        (true, true) => Biome::ForestHill,
                        (true, false) => Biome::Forest,
                        (false, true) => Biome::Hill,
                        (false, false) => Biome::Plain,
                    }
                };
                if let Some(cell) = grid.get_mut(coord) {
                    cell.biome = Some(biome);
                }
            }

            let biome = grid.get(coord).and_then(|c| c.biome);
            let open_land = matches!(biome, Some(Biome::Plain | Biome::Scrub | Biome::Hill));
            if open_land && self.rng.f64() < self.config.settlement_chance {
                let seed = if self.rng.bool() { Biome::Suburb } else { Biome::Ruins };
                let kind = if seed == Biome::Suburb {
                    StructureKind::Cottage
                } else {
                    StructureKind::Ruin
                };
                if let Some(cell) = grid.get_mut(coord) {
                    cell.biome = Some(seed);
                    cell.features.push(FeatureRecord::Structure { kind });
                }
                settlements += 1;
            }

            let is_land = grid.get(coord).is_some_and(|c| !c.is_ocean());
            if is_land {
                let p = self.config.lake_base_chance
                    + self.config.lake_per_exit_chance * exits as f64;
                if self.rng.f64() < p {
                    if let Some(cell) = grid.get_mut(coord) {
                        cell.features.push(FeatureRecord::Lake);
                    }
                }
            }
        }
        settlements
    }

    /// Stage 9: pair each settlement seed with its nearest unpaired
    /// fellow and lay an axis-aligned road between them, one mirrored
    /// exit pair per crossed edge. Suburb-to-suburb links are paved
    /// highways; anything touching a ruin gets a dirt trail. Roads stop
    /// at water rather than bridging it.
    ///
    /// Returns the number of roads drawn.
    fn draw_roads(&mut self, grid: &mut ScratchGrid) -> usize {
        let seeds: Vec<ChunkCoord> = grid
            .coords()
            .filter(|&c| {
                grid.get(c)
                    .is_some_and(|cell| matches!(cell.biome, Some(Biome::Suburb | Biome::Ruins)))
            })
            .collect();

        let mut linked = vec![false; seeds.len()];
        let mut roads = 0;
        for i in 0..seeds.len() {
            if linked[i] {
                continue;
            }
            let nearest = (0..seeds.len())
                .filter(|&j| j != i && !linked[j])
                .min_by_key(|&j| seeds[i].chebyshev(seeds[j]));
            let Some(j) = nearest else {
                continue;
            };
            linked[i] = true;
            linked[j] = true;
            roads += 1;

            let suburbs = [seeds[i], seeds[j]].iter().all(|&s| {
                grid.get(s).is_some_and(|c| c.biome == Some(Biome::Suburb))
            });
            let path = cardinal_path(seeds[i], seeds[j]);
            for pair in path.windows(2) {
                let (from, to) = (pair[0], pair[1]);
                let passable = grid.get(from).is_some_and(|c| !c.is_ocean())
                    && grid.get(to).is_some_and(|c| !c.is_ocean());
                if !passable {
                    continue;
                }
                let Some(dir) = dir_between(from, to) else {
                    continue;
                };
                let control = (self.rng.f32(), self.rng.f32());
                let record = |spec| {
                    if suburbs {
                        FeatureRecord::HighwayExit(spec)
                    } else {
                        FeatureRecord::TrailExit(spec)
                    }
                };
                let width = if suburbs { 3 } else { 2 };
                let spec = ExitSpec::new(dir, width, control);
                if let Some(cell) = grid.get_mut(from) {
                    cell.features.push(record(spec));
                }
                if let Some(cell) = grid.get_mut(to) {
                    cell.features.push(record(spec.mirrored()));
                }
            }
        }
        debug!(roads, "settlement roads drawn");
        roads
    }

    /// Stage 10: convert every scratch record into a [`ChunkMeta`].
    fn flush(&mut self, grid: ScratchGrid) -> Vec<ChunkMeta> {
        let city = city_distances(&grid);
        let rows = grid.height().max(2);
        grid.drain()
            .map(|(coord, scratch)| {
                let biome = scratch.biome.unwrap_or(Biome::Plain);
                // Cold pole at the north edge, cooling with elevation.
                let latitude = (i64::from(coord.y) * 40 / i64::from(rows - 1)) as i32;
                let temperature = -10 + latitude - scratch.height;
                let gx = i64::from(coord.x);
                let gy = i64::from(coord.y);
                ChunkMeta {
                    coord,
                    height: scratch.height,
                    temperature,
                    biome,
                    habitat: Habitat::from_temperature(temperature),
                    variance_noise: self.noise.sample("variance", gx, gy) as f32,
                    features: scratch.features,
                    city_distance: city
                        .get(&coord)
                        .copied()
                        .unwrap_or(ChunkMeta::NO_CITY),
                    title: self.title_for(biome, coord),
                }
            })
            .collect()
    }

    /// Picks a chunk title from biome-flavored word lists, keyed by the
    /// per-coordinate noise so titles survive regeneration.
    fn title_for(&self, biome: Biome, coord: ChunkCoord) -> String {
        const ADJECTIVES: [&str; 8] = [
            "quiet", "bleak", "windswept", "old", "sunken", "broken", "far", "green",
        ];
        let noun = match biome {
            Biome::Ocean => "sea",
            Biome::Glacier => "ice",
            Biome::Plain => "meadows",
            Biome::Forest => "woods",
            Biome::ForestHill => "high woods",
            Biome::Mountain => "crags",
            Biome::Swamp => "mire",
            Biome::Desert => "waste",
            Biome::Scrub => "brush",
            Biome::Hill => "downs",
            Biome::Ruins => "ruins",
            Biome::Suburb => "homesteads",
        };
        let roll = self
            .noise
            .white("chunk title", i64::from(coord.x), i64::from(coord.y));
        let adjective = ADJECTIVES[(roll * ADJECTIVES.len() as f64) as usize % ADJECTIVES.len()];
        format!("the {adjective} {noun}")
    }
}

/// Synthesizes a world of the given bounds with default tuning.
pub fn build_world(
    bounds: WorldBounds,
    seed: u64,
    noise: &NoiseSource,
    store: &dyn MetaStore,
) -> WorldResult<SynthesisReport> {
    let config = SynthesisConfig {
        bounds,
        seed,
        ..SynthesisConfig::default()
    };
    WorldSynthesizer::new(config, noise).synthesize(store)
}

/// River width monotonically derived from descendant count.
fn river_width(descendants: u32, max_width: u8, factor: f32) -> u8 {
    let width = 1 + (descendants as f32 * factor) as u32;
    (width.min(u32::from(max_width))) as u8
}

/// Cardinal direction from one chunk to an adjacent chunk.
fn dir_between(from: ChunkCoord, to: ChunkCoord) -> Option<EdgeDir> {
    match (to.x - from.x, to.y - from.y) {
        (0, -1) => Some(EdgeDir::North),
        (1, 0) => Some(EdgeDir::East),
        (0, 1) => Some(EdgeDir::South),
        (-1, 0) => Some(EdgeDir::West),
        _ => None,
    }
}

/// Axis-aligned chunk path from `a` to `b`, x leg first.
fn cardinal_path(a: ChunkCoord, b: ChunkCoord) -> Vec<ChunkCoord> {
    let mut points = vec![a];
    let (mut x, mut y) = (a.x, a.y);
    while x != b.x {
        x += (b.x - x).signum();
        points.push(ChunkCoord::new(x, y));
    }
    while y != b.y {
        y += (b.y - y).signum();
        points.push(ChunkCoord::new(x, y));
    }
    points
}

/// Integer line between two coordinates (Bresenham).
fn line_between(a: ChunkCoord, b: ChunkCoord) -> Vec<ChunkCoord> {
    let mut points = Vec::new();
    let dx = (b.x - a.x).abs();
    let dy = -(b.y - a.y).abs();
    let sx = if a.x < b.x { 1 } else { -1 };
    let sy = if a.y < b.y { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (a.x, a.y);
    loop {
        points.push(ChunkCoord::new(x, y));
        if x == b.x && y == b.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    points
}

/// Multi-source BFS distance from every settlement seed.
fn city_distances(grid: &ScratchGrid) -> std::collections::HashMap<ChunkCoord, f32> {
    let mut distances = std::collections::HashMap::new();
    let mut queue: VecDeque<ChunkCoord> = VecDeque::new();
    for coord in grid.coords() {
        let seeded = grid
            .get(coord)
            .is_some_and(|c| matches!(c.biome, Some(Biome::Suburb | Biome::Ruins)));
        if seeded {
            distances.insert(coord, 0.0);
            queue.push_back(coord);
        }
    }
    while let Some(coord) = queue.pop_front() {
        let d = distances[&coord];
        for neighbor in coord.cardinal_neighbors() {
            if grid.in_bounds(neighbor) && !distances.contains_key(&neighbor) {
                distances.insert(neighbor, d + 1.0);
                queue.push_back(neighbor);
            }
        }
    }
    distances
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Minimal in-memory meta store for synthesis tests.
    #[derive(Default)]
    struct TestStore {
        metas: Mutex<HashMap<ChunkCoord, ChunkMeta>>,
    }

    impl MetaStore for TestStore {
        fn chunk_meta(&self, coord: ChunkCoord) -> Option<ChunkMeta> {
            self.metas.lock().get(&coord).cloned()
        }

        fn put_chunk_meta_batch(&self, batch: Vec<ChunkMeta>) {
            let mut metas = self.metas.lock();
            for meta in batch {
                metas.insert(meta.coord, meta);
            }
        }
    }

    fn config(width: i32, height: i32, seed: u64) -> SynthesisConfig {
        SynthesisConfig {
            bounds: WorldBounds::new(width, height),
            seed,
            ..SynthesisConfig::default()
        }
    }

    #[test]
    fn test_invalid_bounds_rejected_before_writes() {
        let noise = NoiseSource::new(1);
        let store = TestStore::default();
        let mut synth = WorldSynthesizer::new(config(2, 64, 1), &noise);
        let err = synth.synthesize(&store).unwrap_err();
        assert!(matches!(err, WorldError::InvalidBounds { width: 2, .. }));
        assert!(store.metas.lock().is_empty());
    }

    #[test]
    fn test_exactly_one_meta_per_coordinate() {
        let noise = NoiseSource::new(7);
        let store = TestStore::default();
        let mut synth = WorldSynthesizer::new(config(16, 16, 7), &noise);
        let report = synth.synthesize(&store).expect("synthesis");
        assert_eq!(report.chunks, 256);
        let metas = store.metas.lock();
        assert_eq!(metas.len(), 256);
        for y in 0..16 {
            for x in 0..16 {
                assert!(metas.contains_key(&ChunkCoord::new(x, y)));
            }
        }
    }

    #[test]
    fn test_out_of_bounds_resolves_to_ocean_sentinel() {
        let noise = NoiseSource::new(7);
        let store = TestStore::default();
        let mut synth = WorldSynthesizer::new(config(8, 8, 7), &noise);
        synth.synthesize(&store).expect("synthesis");
        let meta = store.meta_or_ocean(ChunkCoord::new(-3, 100));
        assert!(meta.is_ocean());
    }

    #[test]
    fn test_river_descendant_counts() {
        let noise = NoiseSource::new(3);
        let mut synth = WorldSynthesizer::new(config(24, 24, 3), &noise);
        let (grid, _) = synth.synthesize_grid().expect("synthesis");
        for coord in grid.coords() {
            let cell = grid.get(coord).expect("coord in bounds");
            if !cell.has_height() || cell.is_ocean() {
                continue;
            }
            let sum: u32 = cell
                .river_children
                .iter()
                .map(|&c| grid.get(c).map_or(0, |child| child.river_descendants))
                .sum();
            assert_eq!(
                cell.river_descendants,
                1 + sum,
                "descendant count mismatch at {coord}"
            );
        }
    }

    #[test]
    fn test_dryness_is_bfs_distance() {
        let noise = NoiseSource::new(11);
        let mut synth = WorldSynthesizer::new(config(20, 20, 11), &noise);
        let (grid, _) = synth.synthesize_grid().expect("synthesis");
        for coord in grid.coords() {
            let d = grid.get(coord).map_or(0, |c| c.dryness);
            for neighbor in coord.cardinal_neighbors() {
                if let Some(cell) = grid.get(neighbor) {
                    assert!(
                        cell.dryness <= d + 1,
                        "dryness jump between {coord} and {neighbor}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_river_exits_are_mirrored() {
        let noise = NoiseSource::new(5);
        let store = TestStore::default();
        let mut synth = WorldSynthesizer::new(config(32, 32, 5), &noise);
        synth.synthesize(&store).expect("synthesis");
        let metas = store.metas.lock();
        for meta in metas.values() {
            for exit in meta.river_exits() {
                let neighbor_coord = meta.coord.neighbor(exit.edge);
                let Some(neighbor) = metas.get(&neighbor_coord) else {
                    // Mouth exits drain off-grid or into ocean edges.
                    continue;
                };
                if neighbor.is_ocean() {
                    continue;
                }
                let mirrored = neighbor
                    .river_exits()
                    .any(|e| e.edge == exit.edge.opposite() && e.width == exit.width);
                assert!(
                    mirrored,
                    "no mirrored exit on {} for edge {:?}",
                    neighbor_coord, exit.edge
                );
            }
        }
    }

    #[test]
    fn test_forced_north_ocean_edge_scenario() {
        let noise = NoiseSource::new(9);
        let store = TestStore::default();
        let mut cfg = config(4, 4, 9);
        cfg.ocean_edges = [true, false, false, false];
        cfg.ocean_bites = 0;
        let mut synth = WorldSynthesizer::new(cfg, &noise);
        synth.synthesize(&store).expect("synthesis");
        let metas = store.metas.lock();
        for x in 0..4 {
            let meta = &metas[&ChunkCoord::new(x, 0)];
            assert_eq!(meta.biome, Biome::Ocean);
            assert_eq!(meta.height, 0);
        }
    }

    #[test]
    fn test_heights_assigned_everywhere() {
        let noise = NoiseSource::new(13);
        let mut synth = WorldSynthesizer::new(config(16, 16, 13), &noise);
        let (grid, _) = synth.synthesize_grid().expect("synthesis");
        for coord in grid.coords() {
            assert!(grid.get(coord).expect("coord in bounds").has_height());
        }
    }

    #[test]
    fn test_settlements_are_road_connected() {
        let noise = NoiseSource::new(41);
        let store = TestStore::default();
        let mut cfg = config(24, 24, 41);
        cfg.settlement_chance = 0.25;
        let mut synth = WorldSynthesizer::new(cfg, &noise);
        let report = synth.synthesize(&store).expect("synthesis");
        assert!(report.settlements >= 2, "world seeded too few settlements");
        assert!(report.roads >= 1);

        let metas = store.metas.lock();
        let mut exits = 0;
        for meta in metas.values() {
            for feature in &meta.features {
                let spec = match feature {
                    FeatureRecord::HighwayExit(spec) | FeatureRecord::TrailExit(spec) => spec,
                    _ => continue,
                };
                exits += 1;
                // Road exits are only laid between two in-bounds land
                // cells, so the far side always mirrors.
                let neighbor = &metas[&meta.coord.neighbor(spec.edge)];
                let mirrored = neighbor.features.iter().any(|f| {
                    matches!(
                        f,
                        FeatureRecord::HighwayExit(e) | FeatureRecord::TrailExit(e)
                            if e.edge == spec.edge.opposite() && e.width == spec.width
                    )
                });
                assert!(mirrored, "unmirrored road exit on {}", meta.coord);
            }
        }
        assert!(exits > 0, "roads laid no exits");
    }

    #[test]
    fn test_report_seed_round_trips() {
        let noise = NoiseSource::new(21);
        let store = TestStore::default();
        let mut synth = WorldSynthesizer::new(config(8, 8, 21), &noise);
        let report = synth.synthesize(&store).expect("synthesis");
        assert_eq!(report.seed, 21);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            #[test]
            fn river_tree_invariant_holds_for_any_seed(seed in 0u64..500) {
                let noise = NoiseSource::new(seed);
                let mut synth = WorldSynthesizer::new(config(12, 12, seed), &noise);
                let (grid, _) = synth.synthesize_grid().expect("synthesis");
                for coord in grid.coords() {
                    let cell = grid.get(coord).expect("coord in bounds");
                    if cell.is_ocean() {
                        continue;
                    }
                    let sum: u32 = cell
                        .river_children
                        .iter()
                        .map(|&c| grid.get(c).map_or(0, |child| child.river_descendants))
                        .sum();
                    prop_assert_eq!(cell.river_descendants, 1 + sum);
                }
            }

            #[test]
            fn dryness_gradient_bounded_for_any_seed(seed in 0u64..500) {
                let noise = NoiseSource::new(seed);
                let mut synth = WorldSynthesizer::new(config(12, 12, seed), &noise);
                let (grid, _) = synth.synthesize_grid().expect("synthesis");
                for coord in grid.coords() {
                    let d = grid.get(coord).map_or(0, |c| c.dryness);
                    for neighbor in coord.cardinal_neighbors() {
                        if let Some(cell) = grid.get(neighbor) {
                            prop_assert!(cell.dryness <= d + 1);
                        }
                    }
                }
            }
        }
    }
}
