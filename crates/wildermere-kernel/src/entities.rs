//! Entity-management collaborator seam.
//!
//! The kernel never simulates entities itself; it only detaches them from
//! evicted chunks and nudges the host when the streaming window moves.

use wildermere_common::{EntityId, WorldCoord};

/// Axis-aligned world-cell rectangle, inclusive of `min`, exclusive of `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldRect {
    /// Top-left corner.
    pub min: WorldCoord,
    /// Bottom-right corner (exclusive).
    pub max: WorldCoord,
}

impl WorldRect {
    /// Creates a new rectangle.
    #[must_use]
    pub const fn new(min: WorldCoord, max: WorldCoord) -> Self {
        Self { min, max }
    }

    /// Whether a point lies inside the rectangle.
    #[must_use]
    pub const fn contains(&self, point: WorldCoord) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }
}

/// Entity-management collaborator consumed on eviction and window moves.
pub trait EntityHost: Send + Sync {
    /// Detaches every dynamic entity inside the area from the active
    /// simulation, handing ownership back to the host.
    fn detach_entities_in_area(&self, area: WorldRect) -> Vec<EntityId>;

    /// Notifies the host that the streaming window moved near a point.
    fn wake_entities_near(&self, point: WorldCoord);
}

/// No-op entity host for tests and headless generation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEntityHost;

impl EntityHost for NullEntityHost {
    fn detach_entities_in_area(&self, _area: WorldRect) -> Vec<EntityId> {
        Vec::new()
    }

    fn wake_entities_near(&self, _point: WorldCoord) {}
}
