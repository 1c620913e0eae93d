//! Single-camera short-term tracking
//!
//! Maintains short-lived person tracks within one camera's frame sequence:
//! IoU-based association with optimal assignment, constant-velocity
//! prediction, and miss-counter track lifecycle. Cross-camera fusion lives
//! in the `fusion` crate; this one owns no knowledge beyond its own feed.

pub mod bbox;
pub mod hungarian;
pub mod manager;
pub mod motion;
pub mod track;

pub use bbox::{ious, Bbox};
pub use hungarian::{AssignmentResult, HungarianSolver};
pub use manager::{
    Detection, FrameReport, RejectionCounters, TrackManager, TrackUpdate, TrackerConfig,
};
pub use motion::Velocity;
pub use track::LocalTrack;
