//! # Wildermere Kernel
//!
//! Chunk streaming and local carving for Project Wildermere.
//!
//! Given persisted chunk metadata from `wildermere-worldgen`, this crate
//! carves concrete terrain on demand and keeps a windowed cache of chunks
//! resident around a moving point of interest:
//! - [`terrain`] / [`chunk`]: concrete per-cell terrain data
//! - [`biomes`]: stateless biome behavior lookup
//! - [`carver`]: seam-blended chunk carving
//! - [`features`]: river/road/structure carving
//! - [`store`]: persistence seam and in-memory store
//! - [`worker`]: the serialized background generation worker
//! - [`streamer`]: the resident chunk window
//! - [`level`]: level ownership and the bounded level cache

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod biomes;
pub mod carver;
pub mod chunk;
pub mod entities;
pub mod features;
pub mod level;
pub mod store;
pub mod streamer;
pub mod terrain;
pub mod worker;

pub use carver::ChunkCarver;
pub use chunk::Chunk;
pub use level::{Level, LevelCache};
pub use store::{FileStore, MemoryStore, WorldStore};
pub use streamer::{ChunkStreamer, StreamContext};
pub use terrain::{Terrain, CHUNK_SIZE};
pub use worker::{GenEvent, GenWorker};
