//! # Wildermere World
//!
//! Headless driver for Project Wildermere: synthesizes a world if none is
//! persisted, then streams a chunk window around a spawn point and
//! hibernates cleanly. Useful for generating worlds ahead of time and for
//! exercising the full pipeline without a renderer.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod config;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wildermere_common::{ChunkCoord, LevelId};
use wildermere_kernel::entities::NullEntityHost;
use wildermere_kernel::{FileStore, GenWorker, LevelCache, StreamContext, WorldStore, CHUNK_SIZE};
use wildermere_worldgen::{build_world, MetaStore, NoiseSource, WorldBounds};

use config::WorldConfig;

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("wildermere=info".parse()?))
        .init();

    info!("Wildermere world driver starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = WorldConfig::load();
    config.validate();

    // A freshly picked seed is written back so the world can be rebuilt.
    let seed = match config.world_seed {
        Some(seed) => seed,
        None => {
            let seed = fastrand::u64(..);
            config.world_seed = Some(seed);
            config.save()?;
            seed
        }
    };

    let store: Arc<FileStore> = Arc::new(FileStore::open(&config.data_dir)?);
    let noise = Arc::new(NoiseSource::new(seed));

    if store.chunk_meta(ChunkCoord::new(0, 0)).is_none() {
        info!(seed, width = config.world_width, height = config.world_height, "synthesizing world");
        let bounds = WorldBounds::new(config.world_width, config.world_height);
        let report = build_world(bounds, seed, &noise, store.as_ref())?;
        info!(
            chunks = report.chunks,
            rivers = report.rivers,
            ranges = report.ranges,
            settlements = report.settlements,
            roads = report.roads,
            "synthesis complete"
        );
    } else {
        info!(seed, "world already synthesized");
    }

    let spawn = find_spawn(store.as_ref(), config.world_width, config.world_height);
    info!(%spawn, "spawn chunk selected");

    let worker = GenWorker::spawn(
        Arc::clone(&store) as Arc<dyn WorldStore>,
        Arc::clone(&noise),
        config.plant_density,
    );
    let ctx = StreamContext {
        store: Arc::clone(&store) as Arc<dyn WorldStore>,
        entities: Arc::new(NullEntityHost),
        worker,
    };
    let mut cache = LevelCache::new(ctx, config.max_levels, config.window_radius);

    let origin = spawn.to_world_coord(CHUNK_SIZE);
    let summary = cache.advance(LevelId::WORLD, origin.x, origin.y);
    info!(requested = summary.requested, "streaming window opened");
    cache.context().worker.flush();
    cache.pump_completions();
    if let Some(world) = cache.level(LevelId::WORLD) {
        info!(resident = world.streamer().resident_count(), "window resident");
    }

    cache.hibernate_all();
    info!("Wildermere world driver shutdown complete");
    Ok(())
}

/// Picks the land chunk nearest the world center, falling back to the
/// center itself for an all-ocean world.
fn find_spawn(store: &dyn MetaStore, width: i32, height: i32) -> ChunkCoord {
    let center = ChunkCoord::new(width / 2, height / 2);
    let mut best: Option<(i32, ChunkCoord)> = None;
    for y in 0..height {
        for x in 0..width {
            let coord = ChunkCoord::new(x, y);
            let Some(meta) = store.chunk_meta(coord) else { continue };
            if meta.is_ocean() {
                continue;
            }
            let d = coord.chebyshev(center);
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, coord));
            }
        }
    }
    best.map_or(center, |(_, coord)| coord)
}
