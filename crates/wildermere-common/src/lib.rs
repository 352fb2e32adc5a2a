//! # Wildermere Common
//!
//! Common types, utilities, and shared abstractions for Project Wildermere.
//!
//! This crate provides foundational types used across all Wildermere
//! subsystems:
//! - Coordinate types (world, chunk, local) and edge directions
//! - ID types (LevelId, EntityId, BuildingId)
//! - Common error types

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;
