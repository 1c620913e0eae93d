//! Engine configuration
//!
//! All tunables recognized by the engine, with serde field defaults so a
//! partial JSON document only overrides what it names. Room membership is
//! configured externally and validated here; a broken room map is the one
//! class of error that is fatal at startup.

use crate::error::{EngineError, Result};
use crate::types::{CameraId, RoomId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One room: a named set of cameras covering the same physical space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    pub id: RoomId,
    pub name: String,
    pub cameras: Vec<CameraId>,
    /// Unique-person count at which an alert intent is emitted
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: usize,
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum cosine similarity to merge a local track into an existing
    /// global identity
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Global identity time-to-live without resolution activity
    #[serde(default = "default_identity_ttl_ms")]
    pub identity_ttl_ms: u64,

    /// Identities last seen further back than this never enter the
    /// candidate scan
    #[serde(default = "default_match_window_ms")]
    pub match_window_ms: u64,

    /// Identities not refreshed within this window are presence-stale and
    /// excluded from room counts even before eviction
    #[serde(default = "default_presence_window_ms")]
    pub presence_window_ms: u64,

    /// Grace period during which a lost track's camera slot is held open
    /// for re-attachment
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Sweep interval for the background eviction task
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Consecutive missed frames before a local track is lost
    #[serde(default = "default_loss_tolerance")]
    pub loss_tolerance: u32,

    /// Minimum IoU for detection-to-track association
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,

    /// Minimum detection confidence
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// EMA smoothing factor for appearance signatures (weight kept on the
    /// old signature)
    #[serde(default = "default_ema_alpha")]
    pub ema_alpha: f32,

    /// Embeddings below this quality are discarded
    #[serde(default = "default_min_embedding_quality")]
    pub min_embedding_quality: f32,

    /// Expected appearance embedding dimension
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Ceiling for the spatiotemporal fallback score, strictly below the
    /// appearance score range so appearance evidence dominates
    #[serde(default = "default_fallback_ceiling")]
    pub fallback_ceiling: f32,

    /// Weight kept on the previous velocity estimate per observation
    #[serde(default = "default_velocity_smoothing")]
    pub velocity_smoothing: f32,

    #[serde(default)]
    pub rooms: Vec<RoomConfig>,
}

fn default_similarity_threshold() -> f32 {
    0.6
}

fn default_identity_ttl_ms() -> u64 {
    30_000
}

fn default_match_window_ms() -> u64 {
    5_000
}

fn default_presence_window_ms() -> u64 {
    10_000
}

fn default_grace_period_ms() -> u64 {
    2_000
}

fn default_sweep_interval_ms() -> u64 {
    1_000
}

fn default_loss_tolerance() -> u32 {
    5
}

fn default_iou_threshold() -> f32 {
    0.3
}

fn default_min_confidence() -> f32 {
    0.3
}

fn default_ema_alpha() -> f32 {
    0.7
}

fn default_min_embedding_quality() -> f32 {
    0.3
}

fn default_embedding_dim() -> usize {
    512
}

fn default_fallback_ceiling() -> f32 {
    0.5
}

fn default_velocity_smoothing() -> f32 {
    0.6
}

fn default_alert_threshold() -> usize {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            identity_ttl_ms: default_identity_ttl_ms(),
            match_window_ms: default_match_window_ms(),
            presence_window_ms: default_presence_window_ms(),
            grace_period_ms: default_grace_period_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            loss_tolerance: default_loss_tolerance(),
            iou_threshold: default_iou_threshold(),
            min_confidence: default_min_confidence(),
            ema_alpha: default_ema_alpha(),
            min_embedding_quality: default_min_embedding_quality(),
            embedding_dim: default_embedding_dim(),
            fallback_ceiling: default_fallback_ceiling(),
            velocity_smoothing: default_velocity_smoothing(),
            rooms: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every startup invariant. Configuration problems are the only
    /// fatal error class in the engine.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("similarity_threshold", self.similarity_threshold),
            ("min_confidence", self.min_confidence),
            ("ema_alpha", self.ema_alpha),
            ("min_embedding_quality", self.min_embedding_quality),
            ("fallback_ceiling", self.fallback_ceiling),
            ("velocity_smoothing", self.velocity_smoothing),
            ("iou_threshold", self.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.embedding_dim == 0 {
            return Err(EngineError::config("embedding_dim must be non-zero"));
        }

        let mut seen_rooms = HashSet::new();
        let mut seen_cameras = HashSet::new();
        for room in &self.rooms {
            if !seen_rooms.insert(&room.id) {
                return Err(EngineError::config(format!(
                    "duplicate room id {}",
                    room.id
                )));
            }
            if room.cameras.is_empty() {
                return Err(EngineError::config(format!(
                    "room {} references no cameras",
                    room.id
                )));
            }
            for camera in &room.cameras {
                if !seen_cameras.insert(camera) {
                    return Err(EngineError::config(format!(
                        "camera {} is a member of more than one room",
                        camera
                    )));
                }
            }
        }

        Ok(())
    }

    /// Camera-to-room lookup derived from the room list.
    pub fn camera_rooms(&self) -> HashMap<CameraId, RoomId> {
        let mut map = HashMap::new();
        for room in &self.rooms {
            for camera in &room.cameras {
                map.insert(camera.clone(), room.id.clone());
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: &str, cameras: &[&str]) -> RoomConfig {
        RoomConfig {
            id: id.to_string(),
            name: id.to_string(),
            cameras: cameras.iter().map(|c| c.to_string()).collect(),
            alert_threshold: 5,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.similarity_threshold, 0.6);
        assert_eq!(config.embedding_dim, 512);
    }

    #[test]
    fn test_partial_json_overrides() {
        let config =
            EngineConfig::from_json(r#"{"similarity_threshold": 0.8, "loss_tolerance": 3}"#)
                .unwrap();
        assert_eq!(config.similarity_threshold, 0.8);
        assert_eq!(config.loss_tolerance, 3);
        assert_eq!(config.grace_period_ms, 2_000);
    }

    #[test]
    fn test_room_without_cameras_is_fatal() {
        let mut config = EngineConfig::default();
        config.rooms.push(room("lobby", &[]));
        assert!(matches!(
            config.validate(),
            Err(EngineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_camera_in_two_rooms_is_fatal() {
        let mut config = EngineConfig::default();
        config.rooms.push(room("lobby", &["cam-1"]));
        config.rooms.push(room("office", &["cam-1"]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_threshold_is_fatal() {
        let mut config = EngineConfig::default();
        config.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_camera_room_map() {
        let mut config = EngineConfig::default();
        config.rooms.push(room("lobby", &["cam-1", "cam-2"]));
        let map = config.camera_rooms();
        assert_eq!(map.get("cam-1").unwrap(), "lobby");
        assert_eq!(map.get("cam-2").unwrap(), "lobby");
        assert!(map.get("cam-3").is_none());
    }
}
