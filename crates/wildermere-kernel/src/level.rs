//! Level ownership and the bounded level cache.
//!
//! Each level (the overworld, or an interior sub-level) owns one chunk
//! streamer. The [`LevelCache`] keeps a bounded number of levels live,
//! hibernating the least recently used when the bound is exceeded. The
//! primary overworld level is exempt from eviction.

use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};
use wildermere_common::LevelId;

use crate::streamer::{AdvanceSummary, ChunkStreamer, StreamContext};
use crate::worker::GenEvent;

/// One live level and its resident chunk window.
#[derive(Debug)]
pub struct Level {
    /// Level identity.
    pub id: LevelId,
    streamer: ChunkStreamer,
    created_at: Instant,
    last_access: u64,
}

impl Level {
    fn new(id: LevelId, radius: i32) -> Self {
        Self {
            id,
            streamer: ChunkStreamer::new(id, radius),
            created_at: Instant::now(),
            last_access: 0,
        }
    }

    /// The level's chunk streamer.
    #[must_use]
    pub const fn streamer(&self) -> &ChunkStreamer {
        &self.streamer
    }

    /// The level's chunk streamer, mutably.
    pub fn streamer_mut(&mut self) -> &mut ChunkStreamer {
        &mut self.streamer
    }

    /// When this level was brought live.
    #[must_use]
    pub const fn created_at(&self) -> Instant {
        self.created_at
    }
}

/// Bounded cache of live levels.
pub struct LevelCache {
    ctx: StreamContext,
    levels: HashMap<LevelId, Level>,
    /// Maximum live levels before LRU hibernation kicks in.
    max_resident: usize,
    /// Window radius handed to new streamers.
    radius: i32,
    /// Monotonic access stamp for LRU ordering.
    access: u64,
}

impl LevelCache {
    /// Creates a cache over shared streaming collaborators.
    #[must_use]
    pub fn new(ctx: StreamContext, max_resident: usize, radius: i32) -> Self {
        Self {
            ctx,
            levels: HashMap::new(),
            max_resident: max_resident.max(1),
            radius,
            access: 0,
        }
    }

    /// Shared streaming collaborators.
    #[must_use]
    pub const fn context(&self) -> &StreamContext {
        &self.ctx
    }

    /// Number of live levels.
    #[must_use]
    pub fn resident_levels(&self) -> usize {
        self.levels.len()
    }

    /// Whether a level is live.
    #[must_use]
    pub fn contains(&self, id: LevelId) -> bool {
        self.levels.contains_key(&id)
    }

    /// Returns a live level.
    #[must_use]
    pub fn level(&self, id: LevelId) -> Option<&Level> {
        self.levels.get(&id)
    }

    /// Returns a level, bringing it live if needed and hibernating the
    /// least recently used one over capacity.
    pub fn get(&mut self, id: LevelId) -> &mut Level {
        self.access += 1;
        let stamp = self.access;
        if !self.levels.contains_key(&id) {
            debug!(%id, "level brought live");
            self.levels.insert(id, Level::new(id, self.radius));
            self.enforce_capacity(id);
        }
        let radius = self.radius;
        let level = self.levels.entry(id).or_insert_with(|| Level::new(id, radius));
        level.last_access = stamp;
        level
    }

    /// Moves a level's point of interest through [`Self::get`].
    pub fn advance(&mut self, id: LevelId, x: i64, y: i64) -> AdvanceSummary {
        self.get(id);
        let Some(level) = self.levels.get_mut(&id) else {
            return AdvanceSummary::default();
        };
        level.streamer.advance_point_of_interest(x, y, &self.ctx)
    }

    /// Routes worker completions to their levels.
    ///
    /// Arrivals for levels hibernated since the request are persisted
    /// and dropped.
    pub fn pump_completions(&mut self) {
        for event in self.ctx.worker.drain_events() {
            match event {
                GenEvent::ChunkReady { level, coord, chunk } => {
                    if let Some(live) = self.levels.get_mut(&level) {
                        live.streamer.on_chunk_ready(coord, chunk, &self.ctx);
                    } else {
                        self.ctx.worker.save_chunk(*chunk);
                    }
                }
                GenEvent::Failed { level, coord, error } => {
                    if let Some(live) = self.levels.get_mut(&level) {
                        live.streamer.on_chunk_failed(coord, &error);
                    }
                }
            }
        }
    }

    /// Hibernates every level and blocks until all writes are durable.
    pub fn hibernate_all(&mut self) {
        for level in self.levels.values_mut() {
            level.streamer.evict_all(&self.ctx);
        }
        self.levels.retain(|id, _| id.is_world());
        self.ctx.worker.flush();
        info!("all levels hibernated");
    }

    /// Hibernates LRU levels until within capacity.
    ///
    /// The overworld and the level just touched are never chosen.
    fn enforce_capacity(&mut self, keep: LevelId) {
        while self.levels.len() > self.max_resident {
            let victim = self
                .levels
                .values()
                .filter(|l| !l.id.is_world() && l.id != keep)
                .min_by_key(|l| l.last_access)
                .map(|l| l.id);
            let Some(id) = victim else { break };
            if let Some(mut level) = self.levels.remove(&id) {
                level.streamer.evict_all(&self.ctx);
                debug!(%id, "level hibernated");
            }
        }
    }
}

impl std::fmt::Debug for LevelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelCache")
            .field("resident_levels", &self.levels.len())
            .field("max_resident", &self.max_resident)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::NullEntityHost;
    use crate::store::{MemoryStore, WorldStore};
    use crate::terrain::CHUNK_SIZE;
    use crate::worker::GenWorker;
    use std::sync::Arc;
    use wildermere_common::ChunkCoord;
    use wildermere_worldgen::NoiseSource;

    fn cache(max_resident: usize) -> (Arc<MemoryStore>, LevelCache) {
        let store = Arc::new(MemoryStore::new());
        let worker = GenWorker::spawn(
            Arc::clone(&store) as Arc<dyn WorldStore>,
            Arc::new(NoiseSource::new(6)),
            1.0,
        );
        let ctx = StreamContext {
            store: Arc::clone(&store) as Arc<dyn WorldStore>,
            entities: Arc::new(NullEntityHost),
            worker,
        };
        (store, LevelCache::new(ctx, max_resident, 1))
    }

    fn settle(cache: &mut LevelCache) {
        cache.context().worker.flush();
        cache.pump_completions();
    }

    #[test]
    fn test_advance_brings_level_live() {
        let (_store, mut cache) = cache(4);
        let summary = cache.advance(LevelId::WORLD, 0, 0);
        assert_eq!(summary.requested, 9);
        assert!(cache.contains(LevelId::WORLD));
        settle(&mut cache);
        assert_eq!(
            cache.level(LevelId::WORLD).unwrap().streamer().resident_count(),
            9
        );
    }

    #[test]
    fn test_lru_level_hibernates_over_capacity() {
        let (store, mut cache) = cache(2);
        let far = 50 * i64::from(CHUNK_SIZE);
        cache.advance(LevelId::WORLD, 0, 0);
        cache.advance(LevelId::new(1), far, far);
        settle(&mut cache);
        // Bringing a third level live pushes out level 1, the LRU
        // non-world level.
        cache.advance(LevelId::new(2), -far, -far);
        assert!(!cache.contains(LevelId::new(1)));
        assert!(cache.contains(LevelId::WORLD));
        assert!(cache.contains(LevelId::new(2)));
        assert_eq!(cache.resident_levels(), 2);

        // Level 1's chunks were persisted on the way out.
        cache.context().worker.flush();
        assert!(store.has_chunk(ChunkCoord::new(50, 50)));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let (_store, mut cache) = cache(2);
        cache.advance(LevelId::new(1), 0, 0);
        cache.advance(LevelId::new(2), 0, 0);
        // Touching level 1 makes level 2 the LRU candidate.
        cache.get(LevelId::new(1));
        cache.advance(LevelId::new(3), 0, 0);
        assert!(cache.contains(LevelId::new(1)));
        assert!(!cache.contains(LevelId::new(2)));
        assert!(cache.contains(LevelId::new(3)));
    }

    #[test]
    fn test_world_level_is_exempt_from_eviction() {
        let (_store, mut cache) = cache(1);
        let far = 50 * i64::from(CHUNK_SIZE);
        cache.advance(LevelId::WORLD, 0, 0);
        cache.advance(LevelId::new(7), far, far);
        // The world stays even though it is the LRU level.
        assert!(cache.contains(LevelId::WORLD));
        assert!(cache.contains(LevelId::new(7)));
    }

    #[test]
    fn test_pump_routes_events_by_level() {
        let (_store, mut cache) = cache(4);
        let far = 50 * i64::from(CHUNK_SIZE);
        cache.advance(LevelId::WORLD, 0, 0);
        cache.advance(LevelId::new(1), far, far);
        settle(&mut cache);

        let world = cache.level(LevelId::WORLD).unwrap().streamer();
        let sub = cache.level(LevelId::new(1)).unwrap().streamer();
        assert_eq!(world.resident_count(), 9);
        assert_eq!(sub.resident_count(), 9);
        assert!(world.chunk(ChunkCoord::new(0, 0)).is_some());
        assert!(sub.chunk(ChunkCoord::new(50, 50)).is_some());
    }

    #[test]
    fn test_arrivals_for_hibernated_level_are_persisted() {
        let (store, mut cache) = cache(1);
        let far = 50 * i64::from(CHUNK_SIZE);
        cache.advance(LevelId::new(1), far, far);
        // Hibernate level 1 before its chunks arrive.
        cache.advance(LevelId::new(2), 0, 0);
        assert!(!cache.contains(LevelId::new(1)));
        cache.context().worker.flush();
        cache.pump_completions();
        cache.context().worker.flush();
        assert!(store.has_chunk(ChunkCoord::new(50, 50)));
    }

    #[test]
    fn test_hibernate_all_persists_and_clears() {
        let (store, mut cache) = cache(4);
        let far = 50 * i64::from(CHUNK_SIZE);
        cache.advance(LevelId::WORLD, 0, 0);
        cache.advance(LevelId::new(3), far, far);
        settle(&mut cache);
        cache.hibernate_all();
        assert_eq!(cache.resident_levels(), 1);
        assert!(cache.contains(LevelId::WORLD));
        assert_eq!(
            cache.level(LevelId::WORLD).unwrap().streamer().resident_count(),
            0
        );
        assert!(store.chunk_count() >= 9);
    }
}
