//! Per-camera track manager: one matching pass per frame
//!
//! Each frame runs the same sequence the classic IoU trackers use:
//! predict existing tracks forward, associate detections by IoU, update
//! matched tracks, age unmatched ones, spawn tracks for leftover
//! detections. Tracks whose miss counter crosses the loss tolerance are
//! removed and reported so the caller can soft-release them upstream.

use crate::bbox::{ious, Bbox};
use crate::hungarian::HungarianSolver;
use crate::track::LocalTrack;
use std::collections::BTreeMap;

/// A per-frame person detection, already stripped of camera identity.
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    pub bbox: Bbox,
    pub confidence: f32,
}

/// Tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Detections below this confidence never spawn or update tracks
    pub min_confidence: f32,
    /// Minimum IoU for a detection-to-track association
    pub iou_threshold: f32,
    /// Consecutive misses after which a track is lost
    pub loss_tolerance: u32,
    /// Weight kept on the previous velocity estimate per observation
    pub velocity_smoothing: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            iou_threshold: 0.3,
            loss_tolerance: 5,
            velocity_smoothing: 0.6,
        }
    }
}

/// Counters for inputs dropped before matching. Data-quality problems are
/// counted and logged, never raised to callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectionCounters {
    /// Boxes with non-positive or non-finite dimensions
    pub malformed_boxes: u64,
    /// Confidence outside [0, 1]
    pub out_of_range_confidence: u64,
    /// Valid detections under the confidence floor
    pub below_floor: u64,
}

/// One live track's state after a frame pass.
#[derive(Debug, Clone)]
pub struct TrackUpdate {
    pub track_id: u32,
    pub bbox: Bbox,
    /// True when this frame created the track
    pub newly_created: bool,
}

/// Result of one frame pass.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// Tracks matched or created this frame
    pub updates: Vec<TrackUpdate>,
    /// Tracks whose miss counter just crossed the loss tolerance;
    /// already removed from the manager
    pub lost: Vec<u32>,
}

/// Short-term track maintenance for a single camera feed.
#[derive(Debug)]
pub struct TrackManager {
    config: TrackerConfig,
    tracks: BTreeMap<u32, LocalTrack>,
    next_track_id: u32,
    rejections: RejectionCounters,
    frames: u64,
}

impl TrackManager {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: BTreeMap::new(),
            next_track_id: 1,
            rejections: RejectionCounters::default(),
            frames: 0,
        }
    }

    /// Run one frame: associate `detections` against current tracks.
    pub fn observe(&mut self, detections: &[Detection], timestamp_ms: u64) -> FrameReport {
        self.frames += 1;
        let kept = self.filter_detections(detections);

        // Predict current track positions at the frame timestamp
        let track_ids: Vec<u32> = self.tracks.keys().copied().collect();
        let predicted: Vec<Bbox> = track_ids
            .iter()
            .map(|id| self.tracks[id].predicted(timestamp_ms))
            .collect();
        let det_boxes: Vec<Bbox> = kept.iter().map(|d| d.bbox).collect();

        let iou_matrix = ious(&predicted, &det_boxes);
        let assignment = HungarianSolver::solve_iou(iou_matrix.view(), self.config.iou_threshold);

        let mut report = FrameReport::default();

        // Matched tracks take the detection box and refresh their velocity
        for (track_idx, det_idx) in &assignment.assignments {
            let track_id = track_ids[*track_idx];
            let track = self.tracks.get_mut(&track_id).unwrap();
            track.apply_match(
                kept[*det_idx].bbox,
                timestamp_ms,
                self.config.velocity_smoothing,
            );
            report.updates.push(TrackUpdate {
                track_id,
                bbox: track.bbox,
                newly_created: false,
            });
        }

        // Unmatched tracks age; past the tolerance they are lost
        for track_idx in &assignment.unassigned_tracks {
            let track_id = track_ids[*track_idx];
            let misses = self.tracks.get_mut(&track_id).unwrap().register_miss();
            if misses > self.config.loss_tolerance {
                self.tracks.remove(&track_id);
                report.lost.push(track_id);
            }
        }

        // Leftover detections spawn new tracks
        for det_idx in &assignment.unassigned_detections {
            let detection = &kept[*det_idx];
            let track_id = self.next_track_id;
            self.next_track_id += 1;
            self.tracks
                .insert(track_id, LocalTrack::new(track_id, detection.bbox, timestamp_ms));
            report.updates.push(TrackUpdate {
                track_id,
                bbox: detection.bbox,
                newly_created: true,
            });
        }

        if self.frames % 500 == 0 {
            log::debug!(
                "tracker: {} frames, {} active tracks, rejections {:?}",
                self.frames,
                self.tracks.len(),
                self.rejections
            );
        }

        report
    }

    /// Drop malformed and sub-floor detections, counting each category.
    fn filter_detections(&mut self, detections: &[Detection]) -> Vec<Detection> {
        let mut kept = Vec::with_capacity(detections.len());
        for detection in detections {
            if !detection.bbox.is_valid() {
                self.rejections.malformed_boxes += 1;
                log::warn!("dropping malformed detection box {}", detection.bbox);
                continue;
            }
            if !(0.0..=1.0).contains(&detection.confidence) {
                self.rejections.out_of_range_confidence += 1;
                log::warn!(
                    "dropping detection with confidence {} outside [0, 1]",
                    detection.confidence
                );
                continue;
            }
            if detection.confidence < self.config.min_confidence {
                self.rejections.below_floor += 1;
                continue;
            }
            kept.push(*detection);
        }
        kept
    }

    pub fn get(&self, track_id: u32) -> Option<&LocalTrack> {
        self.tracks.get(&track_id)
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn rejections(&self) -> RejectionCounters {
        self.rejections
    }

    /// Drain every live track, as when the camera feed shuts down.
    pub fn clear(&mut self) -> Vec<u32> {
        let ids = self.tracks.keys().copied().collect();
        self.tracks.clear();
        ids
    }
}
