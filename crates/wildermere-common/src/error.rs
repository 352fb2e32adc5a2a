//! Error types for Project Wildermere.

use thiserror::Error;

/// Top-level error type for Wildermere operations.
#[derive(Debug, Error)]
pub enum WildermereError {
    /// World synthesis and chunk errors
    #[error("World error: {0}")]
    World(#[from] WorldError),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// World synthesis, carving, and streaming errors.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Synthesis bounds were invalid (rejected before any writes)
    #[error("Invalid world bounds: {width}x{height}")]
    InvalidBounds {
        /// Requested width in chunks
        width: i32,
        /// Requested height in chunks
        height: i32,
    },

    /// Persisted chunk not found
    #[error("Chunk not found at ({x}, {y})")]
    ChunkNotFound {
        /// X coordinate
        x: i32,
        /// Y coordinate
        y: i32,
    },

    /// A mandatory structure had no valid placement
    #[error("No valid placement: {0}")]
    NoPlacement(String),

    /// Chunk load failed
    #[error("Failed to load chunk: {0}")]
    LoadFailed(String),

    /// Chunk save failed
    #[error("Failed to save chunk: {0}")]
    SaveFailed(String),
}

/// Result type alias for world operations.
pub type WorldResult<T> = Result<T, WorldError>;

/// Result type alias for top-level Wildermere operations.
pub type WildermereResult<T> = Result<T, WildermereError>;
