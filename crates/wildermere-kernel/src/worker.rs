//! Background generation worker.
//!
//! One worker thread serializes all chunk generation and persistence for
//! a world. Requests go in over a channel, completed chunks come back as
//! events; the owning thread polls events once per frame. Serializing
//! generation keeps store writes single-writer without locking in the
//! carve path.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};
use wildermere_common::{ChunkCoord, LevelId};
use wildermere_worldgen::NoiseSource;

use crate::carver::ChunkCarver;
use crate::chunk::Chunk;
use crate::store::WorldStore;

/// Work sent to the generation thread.
enum GenRequest {
    /// Produce the chunk at a coordinate, loading it if persisted.
    Chunk {
        /// Level the request came from.
        level: LevelId,
        /// Coordinate to produce.
        coord: ChunkCoord,
    },
    /// Persist an evicted chunk.
    Save(Box<Chunk>),
    /// Reply on the channel once all prior requests have completed.
    Flush(Sender<()>),
    /// Stop the worker thread.
    Shutdown,
}

/// Completion events from the generation thread.
#[derive(Debug)]
pub enum GenEvent {
    /// A requested chunk is ready.
    ChunkReady {
        /// Level the request came from.
        level: LevelId,
        /// Coordinate produced.
        coord: ChunkCoord,
        /// The produced chunk.
        chunk: Box<Chunk>,
    },
    /// A requested chunk could not be produced.
    Failed {
        /// Level the request came from.
        level: LevelId,
        /// Coordinate requested.
        coord: ChunkCoord,
        /// Why production failed.
        error: String,
    },
}

/// Handle to the generation worker thread.
///
/// Dropping the handle shuts the worker down and joins it.
pub struct GenWorker {
    tasks: Sender<GenRequest>,
    events: Receiver<GenEvent>,
    handle: Option<JoinHandle<()>>,
}

impl GenWorker {
    /// Spawns the worker thread over a store and noise source.
    #[must_use]
    pub fn spawn(store: Arc<dyn WorldStore>, noise: Arc<NoiseSource>, plant_density: f32) -> Self {
        let (task_tx, task_rx) = unbounded::<GenRequest>();
        let (event_tx, event_rx) = unbounded::<GenEvent>();
        let carver = ChunkCarver::new(Arc::clone(&store), noise, plant_density);

        let handle = std::thread::spawn(move || {
            worker_loop(&task_rx, &event_tx, &carver, store.as_ref());
        });

        Self {
            tasks: task_tx,
            events: event_rx,
            handle: Some(handle),
        }
    }

    /// Queues production of the chunk at a coordinate.
    pub fn request_chunk(&self, level: LevelId, coord: ChunkCoord) {
        let _ = self.tasks.send(GenRequest::Chunk { level, coord });
    }

    /// Queues persistence of an evicted chunk.
    pub fn save_chunk(&self, chunk: Chunk) {
        let _ = self.tasks.send(GenRequest::Save(Box::new(chunk)));
    }

    /// Blocks until every previously queued request has completed.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = unbounded();
        if self.tasks.send(GenRequest::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Drains all completion events without blocking.
    pub fn drain_events(&self) -> Vec<GenEvent> {
        self.events.try_iter().collect()
    }
}

impl Drop for GenWorker {
    fn drop(&mut self) {
        let _ = self.tasks.send(GenRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for GenWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenWorker")
            .field("pending_events", &self.events.len())
            .finish()
    }
}

fn worker_loop(
    tasks: &Receiver<GenRequest>,
    events: &Sender<GenEvent>,
    carver: &ChunkCarver,
    store: &dyn WorldStore,
) {
    while let Ok(request) = tasks.recv() {
        match request {
            GenRequest::Chunk { level, coord } => {
                let produced = if store.has_chunk(coord) {
                    store.chunk(coord).map_err(|e| e.to_string())
                } else {
                    carver.carve(coord).map_err(|e| e.to_string())
                };
                let event = match produced {
                    Ok(chunk) => GenEvent::ChunkReady {
                        level,
                        coord,
                        chunk: Box::new(chunk),
                    },
                    Err(error) => {
                        warn!(%level, %coord, error, "chunk production failed");
                        GenEvent::Failed { level, coord, error }
                    }
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            GenRequest::Save(chunk) => {
                if let Err(e) = store.put_chunk(&chunk) {
                    warn!(coord = %chunk.coord, error = %e, "chunk save failed");
                }
            }
            GenRequest::Flush(ack) => {
                // Requests are handled in order, so reaching the flush
                // means everything queued before it is done.
                let _ = ack.send(());
            }
            GenRequest::Shutdown => break,
        }
    }
    debug!("generation worker stopped");
}
