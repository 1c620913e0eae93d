//! Wire types consumed from and produced for external collaborators

use camtrack::Bbox;
use serde::{Deserialize, Serialize};

/// Camera identifier, assigned by the ingestion layer.
pub type CameraId = String;
/// Room identifier, from the externally managed room configuration.
pub type RoomId = String;
/// Process-wide unique global person identity id, monotonically minted.
pub type GlobalId = u64;
/// Track id, unique within one camera's lifetime.
pub type TrackId = u32;

/// One per-frame person detection from the external detection model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub camera_id: CameraId,
    pub bbox: Bbox,
    /// Detector confidence in [0, 1]
    pub confidence: f32,
    pub timestamp_ms: u64,
}

/// An appearance embedding produced by the external extraction
/// collaborator, at a lower cadence than the frame rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub track_id: TrackId,
    pub vector: Vec<f32>,
    /// Extraction quality in [0, 1]; low-quality embeddings are
    /// down-weighted or discarded
    pub quality: f32,
}

/// Deduplicated occupancy snapshot for one room.
#[derive(Debug, Clone, Serialize)]
pub struct RoomOccupancy {
    pub room_id: RoomId,
    pub unique_count: usize,
    pub active_global_ids: Vec<GlobalId>,
    pub timestamp_ms: u64,
}

/// Intent to notify that a room crossed its alert threshold. Delivery is
/// the notification collaborator's concern, not the engine's.
#[derive(Debug, Clone, Serialize)]
pub struct AlertIntent {
    pub room_id: RoomId,
    pub count: usize,
    pub threshold: usize,
    pub timestamp_ms: u64,
}

/// Global identity lifecycle events for audit/persistence collaborators.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IdentityEvent {
    Created {
        global_id: GlobalId,
        camera_id: CameraId,
        room_id: Option<RoomId>,
        timestamp_ms: u64,
    },
    Reattached {
        global_id: GlobalId,
        camera_id: CameraId,
        timestamp_ms: u64,
    },
    Evicted {
        global_id: GlobalId,
        last_seen_ms: u64,
    },
}

/// Everything the engine emits on its outbound event channel.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EngineEvent {
    Occupancy(RoomOccupancy),
    Alert(AlertIntent),
    Identity(IdentityEvent),
}
