//! Local track records: a person's trajectory within one camera feed

use crate::bbox::Bbox;
use crate::motion::Velocity;

/// A short-lived track maintained from one camera's frame sequence.
///
/// Local tracks own no cross-camera knowledge; promotion to a global
/// identity happens upstream.
#[derive(Debug, Clone)]
pub struct LocalTrack {
    /// Track id, unique within this camera's lifetime
    pub id: u32,
    /// Most recently matched detection box
    pub bbox: Bbox,
    /// Smoothed velocity estimate (pixels/second)
    pub velocity: Velocity,
    /// Consecutive frames without a matching detection
    pub misses: u32,
    /// Total matched detections over the track's lifetime
    pub hits: u32,
    pub created_ms: u64,
    pub last_update_ms: u64,
}

impl LocalTrack {
    pub fn new(id: u32, bbox: Bbox, timestamp_ms: u64) -> Self {
        Self {
            id,
            bbox,
            velocity: Velocity::default(),
            misses: 0,
            hits: 1,
            created_ms: timestamp_ms,
            last_update_ms: timestamp_ms,
        }
    }

    /// Predicted box at `timestamp_ms`, extrapolated along the velocity
    /// estimate from the last update.
    pub fn predicted(&self, timestamp_ms: u64) -> Bbox {
        let dt_s = timestamp_ms.saturating_sub(self.last_update_ms) as f32 / 1000.0;
        let (dx, dy) = self.velocity.displacement(dt_s);
        self.bbox.shifted(dx, dy)
    }

    /// Apply a matched detection: refresh the box, blend the velocity,
    /// reset the miss counter.
    pub fn apply_match(&mut self, bbox: Bbox, timestamp_ms: u64, velocity_smoothing: f32) {
        let dt_s = timestamp_ms.saturating_sub(self.last_update_ms) as f32 / 1000.0;
        let (old_cx, old_cy) = self.bbox.center();
        let (new_cx, new_cy) = bbox.center();
        self.velocity
            .observe(new_cx - old_cx, new_cy - old_cy, dt_s, velocity_smoothing);

        self.bbox = bbox;
        self.misses = 0;
        self.hits += 1;
        self.last_update_ms = timestamp_ms;
    }

    /// Register a frame without a matching detection. Returns the new
    /// consecutive-miss count.
    pub fn register_miss(&mut self) -> u32 {
        self.misses = self.misses.saturating_add(1);
        self.misses
    }
}
