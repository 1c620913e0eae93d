//! Room-level deduplicated person counting
//!
//! Rooms are configured externally; their runtime occupancy state is owned
//! here. An identity counts toward a room when it holds at least one camera
//! slot inside the room and was refreshed within the presence window — an
//! identity past the window is presence-stale even before eviction.

use std::collections::{HashMap, HashSet};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::registry::IdentityRegistry;
use crate::types::{CameraId, GlobalId, RoomId, RoomOccupancy};

/// Runtime state for one configured room.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub cameras: HashSet<CameraId>,
    /// Occupancy as of the last recompute
    pub unique_count: usize,
    pub active_global_ids: Vec<GlobalId>,
}

/// Derives deduplicated per-room counts from the registry's identities.
#[derive(Debug)]
pub struct RoomAggregator {
    rooms: HashMap<RoomId, Room>,
    presence_window_ms: u64,
}

impl RoomAggregator {
    pub fn new(config: &EngineConfig) -> Self {
        let rooms = config
            .rooms
            .iter()
            .map(|room| {
                (
                    room.id.clone(),
                    Room {
                        id: room.id.clone(),
                        name: room.name.clone(),
                        cameras: room.cameras.iter().cloned().collect(),
                        unique_count: 0,
                        active_global_ids: Vec::new(),
                    },
                )
            })
            .collect();
        Self {
            rooms,
            presence_window_ms: config.presence_window_ms,
        }
    }

    /// Recompute one room from the registry and return its occupancy
    /// snapshot. The caller holds the engine lock, so the snapshot reflects
    /// every mutation committed before this call.
    pub fn recompute(
        &mut self,
        registry: &IdentityRegistry,
        room_id: &str,
        now_ms: u64,
    ) -> Result<RoomOccupancy> {
        let presence_window_ms = self.presence_window_ms;
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| EngineError::UnknownRoom(room_id.to_string()))?;

        let mut active: Vec<GlobalId> = registry
            .identities()
            .filter(|identity| {
                now_ms.saturating_sub(identity.last_seen_ms) <= presence_window_ms
                    && identity
                        .slots
                        .keys()
                        .any(|camera| room.cameras.contains(camera))
            })
            .map(|identity| identity.id)
            .collect();
        active.sort_unstable();

        room.unique_count = active.len();
        room.active_global_ids = active.clone();

        Ok(RoomOccupancy {
            room_id: room.id.clone(),
            unique_count: room.unique_count,
            active_global_ids: active,
            timestamp_ms: now_ms,
        })
    }

    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    pub fn room_of_camera(&self, camera_id: &str) -> Option<&Room> {
        self.rooms
            .values()
            .find(|room| room.cameras.contains(camera_id))
    }
}
