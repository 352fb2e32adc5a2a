//! # Wildermere Worldgen
//!
//! One-time, world-scale synthesis for Project Wildermere.
//!
//! This crate assigns every chunk of the world its height, biome, habitat,
//! temperature, and river/mountain topology, producing the persisted
//! [`meta::ChunkMeta`] records that local carving consumes:
//! - [`noise::NoiseSource`]: deterministic channel-keyed 2D noise
//! - [`meta`]: chunk metadata, biome/habitat tags, feature records
//! - [`scratch`]: the synthesis-time working grid
//! - [`synthesizer::WorldSynthesizer`]: the staged synthesis pipeline

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod meta;
pub mod noise;
pub mod scratch;
pub mod synthesizer;

pub use meta::{Biome, ChunkMeta, ExitSpec, FeatureRecord, Habitat, MetaStore, StructureKind};
pub use noise::NoiseSource;
pub use synthesizer::{build_world, SynthesisConfig, SynthesisReport, WorldBounds, WorldSynthesizer};
