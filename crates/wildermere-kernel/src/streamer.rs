//! The resident chunk window.
//!
//! A [`ChunkStreamer`] keeps a square window of chunks resident around a
//! moving point of interest. Moving the point requests missing chunks
//! from the generation worker, keeps overlapping ones in place, and
//! evicts the rest through the entity host and store. Chunks that are
//! still in flight are never evicted; if the window has moved on by the
//! time they arrive they are persisted and dropped.

use ahash::{AHashMap, AHashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use wildermere_common::{ChunkCoord, LevelId, WorldCoord};

use crate::chunk::Chunk;
use crate::entities::EntityHost;
use crate::store::WorldStore;
use crate::terrain::{Terrain, CHUNK_SIZE};
use crate::worker::GenWorker;

/// Shared collaborators every streamer works against.
pub struct StreamContext {
    /// Persistence backend.
    pub store: Arc<dyn WorldStore>,
    /// Entity-management collaborator.
    pub entities: Arc<dyn EntityHost>,
    /// The generation worker.
    pub worker: GenWorker,
}

impl std::fmt::Debug for StreamContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamContext").field("worker", &self.worker).finish()
    }
}

/// What one point-of-interest move did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceSummary {
    /// Chunks newly requested from the worker.
    pub requested: usize,
    /// Resident chunks evicted and queued for persistence.
    pub evicted: usize,
    /// Resident chunks kept in place.
    pub reused: usize,
}

/// Windowed cache of resident chunks around a point of interest.
#[derive(Debug)]
pub struct ChunkStreamer {
    level: LevelId,
    /// Window half-width in chunks; the window is `(2r + 1)^2` chunks.
    radius: i32,
    center: Option<ChunkCoord>,
    resident: AHashMap<ChunkCoord, Chunk>,
    in_flight: AHashSet<ChunkCoord>,
}

impl ChunkStreamer {
    /// Creates a streamer for a level with the given window radius.
    #[must_use]
    pub fn new(level: LevelId, radius: i32) -> Self {
        Self {
            level,
            radius,
            center: None,
            resident: AHashMap::new(),
            in_flight: AHashSet::new(),
        }
    }

    /// The level this streamer belongs to.
    #[must_use]
    pub const fn level(&self) -> LevelId {
        self.level
    }

    /// Number of chunks currently resident.
    #[must_use]
    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    /// Number of chunks requested but not yet arrived.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns a resident chunk.
    #[must_use]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.resident.get(&coord)
    }

    /// Returns a resident chunk mutably.
    pub fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.resident.get_mut(&coord)
    }

    /// Terrain at a world cell, if its chunk is resident.
    #[must_use]
    pub fn terrain_at(&self, x: i64, y: i64) -> Option<Terrain> {
        let coord = ChunkCoord::from_world_pos(x, y, CHUNK_SIZE);
        let local = WorldCoord::new(x, y).to_local_coord(CHUNK_SIZE);
        self.resident
            .get(&coord)
            .and_then(|c| c.terrain(i32::from(local.x), i32::from(local.y)))
    }

    /// Moves the point of interest to a world cell.
    ///
    /// A move that stays within the current center chunk is a no-op.
    pub fn advance_point_of_interest(&mut self, x: i64, y: i64, ctx: &StreamContext) -> AdvanceSummary {
        let new_center = ChunkCoord::from_world_pos(x, y, CHUNK_SIZE);
        if self.center == Some(new_center) {
            return AdvanceSummary::default();
        }
        self.center = Some(new_center);
        ctx.entities.wake_entities_near(WorldCoord::new(x, y));

        let mut summary = AdvanceSummary::default();

        let stale: Vec<ChunkCoord> = self
            .resident
            .keys()
            .copied()
            .filter(|c| c.chebyshev(new_center) > self.radius)
            .collect();
        for coord in stale {
            self.evict(coord, ctx);
            summary.evicted += 1;
        }
        summary.reused = self.resident.len();

        for dy in -self.radius..=self.radius {
            for dx in -self.radius..=self.radius {
                let coord = ChunkCoord::new(new_center.x + dx, new_center.y + dy);
                if self.resident.contains_key(&coord) || !self.in_flight.insert(coord) {
                    continue;
                }
                ctx.worker.request_chunk(self.level, coord);
                summary.requested += 1;
            }
        }

        debug!(
            level = %self.level,
            center = %new_center,
            requested = summary.requested,
            evicted = summary.evicted,
            reused = summary.reused,
            "window moved"
        );
        summary
    }

    /// Installs a chunk produced by the worker.
    ///
    /// Arrivals for coordinates the window has moved away from are
    /// persisted and dropped instead of installed.
    pub fn on_chunk_ready(&mut self, coord: ChunkCoord, chunk: Box<Chunk>, ctx: &StreamContext) {
        self.in_flight.remove(&coord);
        let in_window = self
            .center
            .is_some_and(|center| coord.chebyshev(center) <= self.radius);
        if in_window {
            self.resident.insert(coord, *chunk);
        } else {
            ctx.worker.save_chunk(*chunk);
        }
    }

    /// Records a failed production; the coordinate may be re-requested
    /// by a later window move.
    pub fn on_chunk_failed(&mut self, coord: ChunkCoord, error: &str) {
        self.in_flight.remove(&coord);
        warn!(level = %self.level, %coord, error, "chunk stream failed");
    }

    /// Evicts every resident chunk and forgets the window position.
    pub fn evict_all(&mut self, ctx: &StreamContext) {
        let coords: Vec<ChunkCoord> = self.resident.keys().copied().collect();
        for coord in coords {
            self.evict(coord, ctx);
        }
        self.center = None;
    }

    fn evict(&mut self, coord: ChunkCoord, ctx: &StreamContext) {
        let Some(mut chunk) = self.resident.remove(&coord) else {
            return;
        };
        // Detached entities ride along inside the persisted chunk.
        let detached = ctx.entities.detach_entities_in_area(chunk.world_rect());
        chunk.entities = detached;
        ctx.worker.save_chunk(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::NullEntityHost;
    use crate::store::MemoryStore;
    use crate::worker::GenEvent;
    use wildermere_worldgen::NoiseSource;

    fn context() -> (Arc<MemoryStore>, StreamContext) {
        let store = Arc::new(MemoryStore::new());
        let worker = GenWorker::spawn(
            Arc::clone(&store) as Arc<dyn WorldStore>,
            Arc::new(NoiseSource::new(3)),
            1.0,
        );
        let ctx = StreamContext {
            store: Arc::clone(&store) as Arc<dyn WorldStore>,
            entities: Arc::new(NullEntityHost),
            worker,
        };
        (store, ctx)
    }

    /// Waits out the worker and routes every event into the streamer.
    fn settle(streamer: &mut ChunkStreamer, ctx: &StreamContext) {
        ctx.worker.flush();
        for event in ctx.worker.drain_events() {
            match event {
                GenEvent::ChunkReady { coord, chunk, .. } => {
                    streamer.on_chunk_ready(coord, chunk, ctx);
                }
                GenEvent::Failed { coord, error, .. } => streamer.on_chunk_failed(coord, &error),
            }
        }
    }

    #[test]
    fn test_first_advance_requests_full_window() {
        let (_store, ctx) = context();
        let mut streamer = ChunkStreamer::new(LevelId::WORLD, 2);
        let summary = streamer.advance_point_of_interest(0, 0, &ctx);
        assert_eq!(summary, AdvanceSummary { requested: 25, evicted: 0, reused: 0 });
        settle(&mut streamer, &ctx);
        assert_eq!(streamer.resident_count(), 25);
        assert_eq!(streamer.in_flight_count(), 0);
    }

    #[test]
    fn test_move_one_chunk_east_reuses_overlap() {
        let (_store, ctx) = context();
        let mut streamer = ChunkStreamer::new(LevelId::WORLD, 2);
        streamer.advance_point_of_interest(0, 0, &ctx);
        settle(&mut streamer, &ctx);

        let step = i64::from(CHUNK_SIZE);
        let summary = streamer.advance_point_of_interest(step, 0, &ctx);
        assert_eq!(summary, AdvanceSummary { requested: 5, evicted: 5, reused: 20 });
        settle(&mut streamer, &ctx);

        let summary = streamer.advance_point_of_interest(2 * step, 0, &ctx);
        assert_eq!(summary, AdvanceSummary { requested: 5, evicted: 5, reused: 20 });
    }

    #[test]
    fn test_move_within_center_chunk_is_noop() {
        let (_store, ctx) = context();
        let mut streamer = ChunkStreamer::new(LevelId::WORLD, 2);
        streamer.advance_point_of_interest(0, 0, &ctx);
        let summary = streamer.advance_point_of_interest(5, 5, &ctx);
        assert_eq!(summary, AdvanceSummary::default());
    }

    #[test]
    fn test_stale_arrivals_are_persisted_not_installed() {
        let (store, ctx) = context();
        let mut streamer = ChunkStreamer::new(LevelId::WORLD, 1);
        streamer.advance_point_of_interest(0, 0, &ctx);
        // Teleport far away before anything arrives.
        let far = 100 * i64::from(CHUNK_SIZE);
        streamer.advance_point_of_interest(far, far, &ctx);
        settle(&mut streamer, &ctx);
        ctx.worker.flush();

        // Only the new window is resident; the stale chunks went to disk.
        assert_eq!(streamer.resident_count(), 9);
        for coord in streamer.resident.keys() {
            assert!(coord.chebyshev(ChunkCoord::new(100, 100)) <= 1);
        }
        assert!(store.has_chunk(ChunkCoord::new(0, 0)));
    }

    #[test]
    fn test_in_flight_chunks_are_not_rerequested() {
        let (_store, ctx) = context();
        let mut streamer = ChunkStreamer::new(LevelId::WORLD, 1);
        streamer.advance_point_of_interest(0, 0, &ctx);
        // Move one chunk east while everything is still in flight.
        let summary = streamer.advance_point_of_interest(i64::from(CHUNK_SIZE), 0, &ctx);
        // Only the new column is requested; overlapping in-flight coords are not.
        assert_eq!(summary.requested, 3);
        assert_eq!(summary.evicted, 0);
    }

    #[test]
    fn test_evicted_chunks_survive_round_trip() {
        let (store, ctx) = context();
        let mut streamer = ChunkStreamer::new(LevelId::WORLD, 1);
        streamer.advance_point_of_interest(0, 0, &ctx);
        settle(&mut streamer, &ctx);

        // Mark a cell, evict everything, then stream back in.
        let chunk = streamer.chunk_mut(ChunkCoord::new(0, 0)).unwrap();
        chunk.set_flag(4, 4, crate::terrain::CellFlags::SEEN);
        streamer.evict_all(&ctx);
        ctx.worker.flush();
        assert_eq!(streamer.resident_count(), 0);
        assert!(store.has_chunk(ChunkCoord::new(0, 0)));

        streamer.advance_point_of_interest(0, 0, &ctx);
        settle(&mut streamer, &ctx);
        let back = streamer.chunk(ChunkCoord::new(0, 0)).unwrap();
        assert!(back.has_flag(4, 4, crate::terrain::CellFlags::SEEN));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            // The first advance always requests the full square window.
            #[test]
            fn window_is_always_square(
                radius in 1i32..4,
                cx in -1000i64..1000,
                cy in -1000i64..1000,
            ) {
                let (_store, ctx) = context();
                let mut streamer = ChunkStreamer::new(LevelId::WORLD, radius);
                let summary = streamer.advance_point_of_interest(cx, cy, &ctx);
                let side = (2 * radius + 1) as usize;
                prop_assert_eq!(summary.requested, side * side);
                prop_assert_eq!(summary.evicted, 0);
                settle(&mut streamer, &ctx);
                prop_assert_eq!(streamer.resident_count(), side * side);
            }
        }
    }

    #[test]
    fn test_terrain_at_resolves_through_window() {
        let (_store, ctx) = context();
        let mut streamer = ChunkStreamer::new(LevelId::WORLD, 1);
        assert_eq!(streamer.terrain_at(0, 0), None);
        streamer.advance_point_of_interest(0, 0, &ctx);
        settle(&mut streamer, &ctx);
        // No metadata in the store, so everything carves as ocean.
        assert!(streamer.terrain_at(-1, -1).is_some_and(Terrain::is_water));
        assert!(streamer.terrain_at(10, 10).is_some_and(Terrain::is_water));
    }
}
