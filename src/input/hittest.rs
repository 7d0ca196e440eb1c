//! Mouse hit-testing over the laid-out frame.
//!
//! Regions are registered every frame in render order, so later
//! registrations paint on top of earlier ones; a hit resolves to the last
//! registered region containing the point.

use crate::node::NodeId;
use crate::types::Rect;

pub type RegionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub id: RegionId,
    pub node: NodeId,
    pub rect: Rect,
}

/// Frame-scoped registry of interactive rects.
#[derive(Debug, Default)]
pub struct HitTestRegistry {
    regions: Vec<Region>,
    next_id: RegionId,
}

impl HitTestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rect for `node`; registration order is stacking order.
    pub fn register(&mut self, node: NodeId, rect: Rect) -> RegionId {
        let id = self.next_id;
        self.next_id += 1;
        self.regions.push(Region { id, node, rect });
        id
    }

    pub fn unregister(&mut self, id: RegionId) {
        self.regions.retain(|r| r.id != id);
    }

    /// Drop all regions (start of a new frame).
    pub fn clear(&mut self) {
        self.regions.clear();
    }

    /// Topmost region containing the point: the last one registered.
    pub fn hit(&self, x: u16, y: u16) -> Option<Region> {
        self.regions
            .iter()
            .rev()
            .find(|r| r.rect.contains(x, y))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Interpolate a drag path from `from` to `to` in `steps` linear segments,
/// including both endpoints. Coincident endpoints yield one point, so a
/// stationary drag delivers a single event. Components that track hover or
/// drag targets see every intermediate cell instead of one teleporting jump.
pub fn interpolate_drag(
    from: (u16, u16),
    to: (u16, u16),
    steps: u16,
) -> Vec<(u16, u16)> {
    if from == to {
        return vec![from];
    }
    if steps == 0 {
        return vec![from, to];
    }
    let mut points = Vec::with_capacity(steps as usize + 1);
    let (x0, y0) = (from.0 as f32, from.1 as f32);
    let (x1, y1) = (to.0 as f32, to.1 as f32);
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let x = (x0 + (x1 - x0) * t).round().max(0.0) as u16;
        let y = (y0 + (y1 - y0) * t).round().max(0.0) as u16;
        if points.last() != Some(&(x, y)) {
            points.push((x, y));
        }
    }
    points
}

// =============================================================================
// Tests
// =============================================================================
