//! Engine facade: serialized shared state plus the outbound event stream
//!
//! The registry is the single piece of shared mutable state across camera
//! workers and the sweeper. Every read that feeds a mutation decision and
//! the write itself happen inside one critical section here; room counts
//! and alert evaluation run eagerly in the same section, so a count
//! returned or emitted always reflects all mutations committed before it.

use std::sync::{Arc, Mutex};

use camtrack::Bbox;
use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::alerts::AlertStateMachine;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::registry::{IdentityRegistry, ResolveRequest};
use crate::rooms::RoomAggregator;
use crate::signature::AppearanceSignature;
use crate::types::{EngineEvent, GlobalId, RoomOccupancy, TrackId};
use crate::worker::CameraHandle;

pub(crate) struct EngineState {
    pub registry: IdentityRegistry,
    pub rooms: RoomAggregator,
    pub alerts: AlertStateMachine,
}

/// The Global Identity Resolution & Room Aggregation Engine.
///
/// Clone handles freely; all clones share the same state and event stream.
#[derive(Clone)]
pub struct Engine {
    pub(crate) config: EngineConfig,
    state: Arc<Mutex<EngineState>>,
    events_tx: Sender<EngineEvent>,
}

impl Engine {
    /// Validate the configuration and build an engine plus the receiving
    /// end of its event stream.
    pub fn new(config: EngineConfig) -> Result<(Self, Receiver<EngineEvent>)> {
        config.validate()?;

        let state = EngineState {
            registry: IdentityRegistry::new(&config),
            rooms: RoomAggregator::new(&config),
            alerts: AlertStateMachine::new(&config),
        };
        let (events_tx, events_rx) = unbounded();

        log::info!(
            "engine initialized: {} rooms, similarity threshold {:.2}",
            config.rooms.len(),
            config.similarity_threshold
        );
        Ok((
            Self {
                config,
                state: Arc::new(Mutex::new(state)),
                events_tx,
            },
            events_rx,
        ))
    }

    /// Start a dedicated worker for one camera feed.
    pub fn spawn_camera(&self, camera_id: &str) -> Result<CameraHandle> {
        CameraHandle::spawn(self.clone(), camera_id.to_string())
    }

    /// Current occupancy for a room, recomputed under the engine lock.
    pub fn occupancy(&self, room_id: &str, now_ms: u64) -> Result<RoomOccupancy> {
        let mut guard = self.state.lock().unwrap();
        let EngineState {
            registry, rooms, ..
        } = &mut *guard;
        rooms.recompute(registry, room_id, now_ms)
    }

    /// Resolve a local track to a global identity and refresh the camera's
    /// room. One critical section covers the candidate scan, the write and
    /// the recompute.
    pub(crate) fn resolve_track(
        &self,
        camera_id: &str,
        track_id: TrackId,
        bbox: Bbox,
        timestamp_ms: u64,
        signature: Option<AppearanceSignature>,
    ) -> GlobalId {
        let mut guard = self.state.lock().unwrap();
        let (global_id, event) = guard.registry.resolve(ResolveRequest {
            camera_id,
            track_id,
            bbox,
            timestamp_ms,
            signature: signature.as_ref(),
        });
        let _ = self.events_tx.send(EngineEvent::Identity(event));
        self.refresh_camera_room(&mut guard, camera_id, timestamp_ms);
        global_id
    }

    /// Refresh an already-resolved track on a matched frame. Returns false
    /// when the track is not attached anywhere (caller re-resolves).
    pub(crate) fn touch_track(
        &self,
        camera_id: &str,
        track_id: TrackId,
        bbox: Bbox,
        timestamp_ms: u64,
    ) -> bool {
        let mut guard = self.state.lock().unwrap();
        match guard.registry.touch(camera_id, track_id, bbox, timestamp_ms) {
            Some(_) => {
                self.refresh_camera_room(&mut guard, camera_id, timestamp_ms);
                true
            }
            None => false,
        }
    }

    /// Soft-release camera slots for tracks the manager just lost.
    pub(crate) fn tracks_lost(&self, camera_id: &str, track_ids: &[TrackId], timestamp_ms: u64) {
        let mut guard = self.state.lock().unwrap();
        for track_id in track_ids {
            guard.registry.mark_lost(camera_id, *track_id, timestamp_ms);
        }
        self.refresh_camera_room(&mut guard, camera_id, timestamp_ms);
    }

    /// A camera worker is shutting down: release its slots immediately,
    /// without waiting out any grace period.
    pub(crate) fn camera_shutdown(&self, camera_id: &str, timestamp_ms: u64) {
        let mut guard = self.state.lock().unwrap();
        let released = guard.registry.release_camera(camera_id);
        if released > 0 {
            log::info!(
                "camera {} shutdown released {} identity slots",
                camera_id,
                released
            );
        }
        self.refresh_camera_room(&mut guard, camera_id, timestamp_ms);
    }

    /// One eviction pass. Returns (evicted identities, finalized slots).
    pub fn sweep_now(&self, now_ms: u64) -> (usize, usize) {
        let mut guard = self.state.lock().unwrap();
        let report = guard.registry.sweep(now_ms);
        let evicted = report.events.len();
        let released = report.released_slots;

        for event in report.events {
            let _ = self.events_tx.send(EngineEvent::Identity(event));
        }

        for room_id in guard.rooms.room_ids() {
            self.refresh_room(&mut guard, &room_id, now_ms);
        }

        (evicted, released)
    }

    /// Recompute the room covering `camera_id` and run its alert state
    /// machine. Caller holds the lock.
    fn refresh_camera_room(&self, guard: &mut EngineState, camera_id: &str, timestamp_ms: u64) {
        let Some(room_id) = guard
            .rooms
            .room_of_camera(camera_id)
            .map(|room| room.id.clone())
        else {
            return;
        };
        self.refresh_room(guard, &room_id, timestamp_ms);
    }

    /// Recompute one room; alert evaluation and the occupancy event only
    /// fire when the occupancy actually changed, so a stream of matched
    /// frames at a steady count stays quiet.
    fn refresh_room(&self, guard: &mut EngineState, room_id: &str, timestamp_ms: u64) {
        let before = guard
            .rooms
            .get(room_id)
            .map(|room| (room.unique_count, room.active_global_ids.clone()));

        let EngineState {
            registry,
            rooms,
            alerts,
        } = guard;
        match rooms.recompute(registry, room_id, timestamp_ms) {
            Ok(occupancy) => {
                let changed = before.map_or(true, |(count, ids)| {
                    count != occupancy.unique_count || ids != occupancy.active_global_ids
                });
                if !changed {
                    return;
                }
                if let Some(intent) =
                    alerts.evaluate(room_id, occupancy.unique_count, timestamp_ms)
                {
                    let _ = self.events_tx.send(EngineEvent::Alert(intent));
                }
                let _ = self.events_tx.send(EngineEvent::Occupancy(occupancy));
            }
            Err(err) => log::error!("room {} recompute failed: {}", room_id, err),
        }
    }
}
