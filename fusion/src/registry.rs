//! Global identity registry: the cross-camera fusion core
//!
//! Maps camera-local tracks onto global person identities using appearance
//! similarity when signatures exist on both sides, and spatiotemporal
//! plausibility when they do not. All mutation funnels through `resolve`,
//! `touch`, `mark_lost`, `release_camera` and `sweep`; the engine serializes
//! those behind a single lock.
//!
//! Selection among candidates is fully deterministic: score, then most
//! recent `last_seen`, then lowest global id. Nothing depends on map
//! iteration order.

use std::collections::{HashMap, HashSet};

use camtrack::Bbox;

use crate::config::EngineConfig;
use crate::signature::{cosine, AppearanceSignature};
use crate::types::{CameraId, GlobalId, IdentityEvent, RoomId, TrackId};

/// One camera's attachment to a global identity.
#[derive(Debug, Clone)]
pub struct CameraSlot {
    pub track_id: TrackId,
    /// Last matched box, kept for re-attachment overlap checks
    pub last_bbox: Bbox,
    /// Set when the local track was reported lost; the slot stays open for
    /// re-attachment until this deadline
    pub release_deadline_ms: Option<u64>,
}

impl CameraSlot {
    fn active(track_id: TrackId, bbox: Bbox) -> Self {
        Self {
            track_id,
            last_bbox: bbox,
            release_deadline_ms: None,
        }
    }

    pub fn is_pending_release(&self) -> bool {
        self.release_deadline_ms.is_some()
    }
}

/// A person's trajectory fused across cameras.
#[derive(Debug, Clone)]
pub struct GlobalIdentity {
    pub id: GlobalId,
    /// Fixed at creation from the spawning camera's room mapping
    pub room_id: Option<RoomId>,
    /// At most one slot per camera id, ever
    pub slots: HashMap<CameraId, CameraSlot>,
    pub signature: Option<AppearanceSignature>,
    pub first_seen_ms: u64,
    pub last_seen_ms: u64,
    /// Successful resolutions over the identity's lifetime
    pub appearances: u64,
}

impl GlobalIdentity {
    fn merge_signature(&mut self, incoming: Option<&AppearanceSignature>, alpha: f32) {
        match (&mut self.signature, incoming) {
            (Some(existing), Some(incoming)) => {
                existing.blend(&incoming.vector, incoming.quality, alpha);
            }
            (None, Some(incoming)) => self.signature = Some(incoming.clone()),
            _ => {}
        }
    }
}

/// Everything needed to resolve one local track against the registry.
#[derive(Debug)]
pub struct ResolveRequest<'a> {
    pub camera_id: &'a str,
    pub track_id: TrackId,
    pub bbox: Bbox,
    pub timestamp_ms: u64,
    pub signature: Option<&'a AppearanceSignature>,
}

/// Outcome of one eviction pass.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub events: Vec<IdentityEvent>,
    pub released_slots: usize,
    pub skipped: usize,
}

/// The shared cross-camera state. One instance per engine, mutex-guarded
/// by the owner.
#[derive(Debug)]
pub struct IdentityRegistry {
    similarity_threshold: f32,
    match_window_ms: u64,
    grace_period_ms: u64,
    identity_ttl_ms: u64,
    fallback_ceiling: f32,
    ema_alpha: f32,
    camera_rooms: HashMap<CameraId, RoomId>,
    known_rooms: HashSet<RoomId>,
    identities: HashMap<GlobalId, GlobalIdentity>,
    next_id: GlobalId,
}

impl IdentityRegistry {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
            match_window_ms: config.match_window_ms,
            grace_period_ms: config.grace_period_ms,
            identity_ttl_ms: config.identity_ttl_ms,
            fallback_ceiling: config.fallback_ceiling,
            ema_alpha: config.ema_alpha,
            camera_rooms: config.camera_rooms(),
            known_rooms: config.rooms.iter().map(|r| r.id.clone()).collect(),
            identities: HashMap::new(),
            next_id: 1,
        }
    }

    /// Resolve a local track to a global identity. Called on track creation
    /// (position-only plausibility) and again whenever the track's
    /// signature freshens (appearance refinement).
    pub fn resolve(&mut self, req: ResolveRequest) -> (GlobalId, IdentityEvent) {
        let now = req.timestamp_ms;

        // A refinement call detaches the track's current slot first, so the
        // incumbent identity competes in the scan like any other candidate.
        let incumbent = self.detach_active(req.camera_id, req.track_id);

        // Re-attachment fast path: a track reappearing on the same camera
        // within the grace window takes back its old identity without a
        // fresh match computation.
        if incumbent.is_none() {
            if let Some(global_id) = self.find_reattachment(&req, now) {
                self.attach(global_id, &req);
                return (
                    global_id,
                    IdentityEvent::Reattached {
                        global_id,
                        camera_id: req.camera_id.to_string(),
                        timestamp_ms: now,
                    },
                );
            }
        }

        let camera_room = self.camera_rooms.get(req.camera_id).cloned();

        // Candidate scan: recent, same room assignment, camera slot free.
        let mut best: Option<(f32, u64, GlobalId)> = None;
        for identity in self.identities.values() {
            if !Self::is_candidate(identity, &camera_room, req.camera_id, now, self.match_window_ms)
            {
                continue;
            }
            let (score, accepted) = self.score(&req, identity, now);
            if !accepted {
                continue;
            }
            let key = (score, identity.last_seen_ms, identity.id);
            let better = match best {
                None => true,
                // Higher score wins; ties go to the most recently seen
                // identity, then the lowest id.
                Some((s, seen, id)) => {
                    score > s || (score == s && (identity.last_seen_ms > seen
                        || (identity.last_seen_ms == seen && identity.id < id)))
                }
            };
            if better {
                best = Some(key);
            }
        }

        if let Some((score, _, global_id)) = best {
            self.attach(global_id, &req);
            log::debug!(
                "track {}@{} resolved to identity {} (score {:.3})",
                req.track_id,
                req.camera_id,
                global_id,
                score
            );
            return (
                global_id,
                IdentityEvent::Reattached {
                    global_id,
                    camera_id: req.camera_id.to_string(),
                    timestamp_ms: now,
                },
            );
        }

        // No candidate above threshold: the expected new-person path.
        let global_id = self.mint(&req, camera_room.clone());
        (
            global_id,
            IdentityEvent::Created {
                global_id,
                camera_id: req.camera_id.to_string(),
                room_id: camera_room,
                timestamp_ms: now,
            },
        )
    }

    /// Refresh the slot of an already-resolved track on a matched frame.
    /// Returns `None` when the track is no longer attached anywhere (the
    /// caller should fall back to a full `resolve`).
    pub fn touch(
        &mut self,
        camera_id: &str,
        track_id: TrackId,
        bbox: Bbox,
        timestamp_ms: u64,
    ) -> Option<GlobalId> {
        for identity in self.identities.values_mut() {
            if let Some(slot) = identity.slots.get_mut(camera_id) {
                if slot.track_id == track_id && !slot.is_pending_release() {
                    slot.last_bbox = bbox;
                    identity.last_seen_ms = identity.last_seen_ms.max(timestamp_ms);
                    return Some(identity.id);
                }
            }
        }
        None
    }

    /// A local track was reported lost. The slot is not released yet: it is
    /// held open for the grace period so a momentary occlusion does not
    /// churn identities.
    pub fn mark_lost(&mut self, camera_id: &str, track_id: TrackId, timestamp_ms: u64) {
        for identity in self.identities.values_mut() {
            if let Some(slot) = identity.slots.get_mut(camera_id) {
                if slot.track_id == track_id && !slot.is_pending_release() {
                    slot.release_deadline_ms = Some(timestamp_ms + self.grace_period_ms);
                    return;
                }
            }
        }
    }

    /// A camera feed shut down: release all of its slots immediately so
    /// room counts never overstate occupancy for a powered-off feed.
    pub fn release_camera(&mut self, camera_id: &str) -> usize {
        let mut released = 0;
        for identity in self.identities.values_mut() {
            if identity.slots.remove(camera_id).is_some() {
                released += 1;
            }
        }
        released
    }

    /// One atomic eviction pass: finalize expired pending-release slots and
    /// retire identities past the TTL. A failure on one identity is logged
    /// and skipped, never aborting the rest of the pass.
    pub fn sweep(&mut self, now_ms: u64) -> SweepReport {
        let mut report = SweepReport::default();

        for identity in self.identities.values_mut() {
            let before = identity.slots.len();
            identity
                .slots
                .retain(|_, slot| match slot.release_deadline_ms {
                    Some(deadline) => now_ms <= deadline,
                    None => true,
                });
            report.released_slots += before - identity.slots.len();
        }

        let stale: Vec<GlobalId> = self
            .identities
            .values()
            .filter(|identity| now_ms.saturating_sub(identity.last_seen_ms) > self.identity_ttl_ms)
            .map(|identity| identity.id)
            .collect();

        for global_id in stale {
            let identity = &self.identities[&global_id];
            if let Some(room_id) = &identity.room_id {
                if !self.known_rooms.contains(room_id) {
                    log::error!(
                        "skipping eviction of identity {}: references unknown room {}",
                        global_id,
                        room_id
                    );
                    report.skipped += 1;
                    continue;
                }
            }
            let identity = self.identities.remove(&global_id).unwrap();
            report.events.push(IdentityEvent::Evicted {
                global_id,
                last_seen_ms: identity.last_seen_ms,
            });
        }

        report
    }

    pub fn identities(&self) -> impl Iterator<Item = &GlobalIdentity> {
        self.identities.values()
    }

    pub fn get(&self, global_id: GlobalId) -> Option<&GlobalIdentity> {
        self.identities.get(&global_id)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Remove the track's active slot, if any, returning the identity that
    /// held it.
    fn detach_active(&mut self, camera_id: &str, track_id: TrackId) -> Option<GlobalId> {
        for identity in self.identities.values_mut() {
            if let Some(slot) = identity.slots.get(camera_id) {
                if slot.track_id == track_id && !slot.is_pending_release() {
                    identity.slots.remove(camera_id);
                    return Some(identity.id);
                }
            }
        }
        None
    }

    /// Pending-release slot on the same camera whose retained box overlaps
    /// the new track best. Ties: most recent `last_seen`, then lowest id.
    fn find_reattachment(&self, req: &ResolveRequest, now: u64) -> Option<GlobalId> {
        let mut best: Option<(f32, u64, GlobalId)> = None;
        for identity in self.identities.values() {
            let Some(slot) = identity.slots.get(req.camera_id) else {
                continue;
            };
            let Some(deadline) = slot.release_deadline_ms else {
                continue;
            };
            if now > deadline {
                continue;
            }
            let iou = slot.last_bbox.iou(&req.bbox);
            if iou <= 0.0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_iou, seen, id)) => {
                    iou > best_iou
                        || (iou == best_iou
                            && (identity.last_seen_ms > seen
                                || (identity.last_seen_ms == seen && identity.id < id)))
                }
            };
            if better {
                best = Some((iou, identity.last_seen_ms, identity.id));
            }
        }
        best.map(|(_, _, id)| id)
    }

    fn is_candidate(
        identity: &GlobalIdentity,
        camera_room: &Option<RoomId>,
        camera_id: &str,
        now: u64,
        match_window_ms: u64,
    ) -> bool {
        if now.saturating_sub(identity.last_seen_ms) > match_window_ms {
            return false;
        }
        if &identity.room_id != camera_room {
            return false;
        }
        // Never two simultaneous tracks from the same camera; a
        // pending-release slot may be displaced, an active one may not.
        match identity.slots.get(camera_id) {
            Some(slot) if !slot.is_pending_release() => false,
            _ => true,
        }
    }

    /// Candidate score and whether it clears its acceptance bar. Appearance
    /// evidence scores on cosine similarity against `similarity_threshold`;
    /// with a signature missing on either side the score degrades to a
    /// recency decay capped at `fallback_ceiling`, accepted at the
    /// proportionally scaled bar.
    fn score(
        &self,
        req: &ResolveRequest,
        identity: &GlobalIdentity,
        now: u64,
    ) -> (f32, bool) {
        match (req.signature, identity.signature.as_ref()) {
            (Some(track_sig), Some(identity_sig)) => {
                let score = cosine(track_sig, identity_sig);
                (score, score >= self.similarity_threshold)
            }
            _ => {
                let age = now.saturating_sub(identity.last_seen_ms) as f32;
                let recency = (1.0 - age / self.match_window_ms as f32).clamp(0.0, 1.0);
                let score = self.fallback_ceiling * recency;
                (score, score >= self.fallback_ceiling * self.similarity_threshold)
            }
        }
    }

    fn attach(&mut self, global_id: GlobalId, req: &ResolveRequest) {
        let identity = self.identities.get_mut(&global_id).unwrap();
        identity.slots.insert(
            req.camera_id.to_string(),
            CameraSlot::active(req.track_id, req.bbox),
        );
        identity.last_seen_ms = identity.last_seen_ms.max(req.timestamp_ms);
        identity.appearances += 1;
        identity.merge_signature(req.signature, self.ema_alpha);
    }

    fn mint(&mut self, req: &ResolveRequest, room_id: Option<RoomId>) -> GlobalId {
        let global_id = self.next_id;
        self.next_id += 1;

        let mut slots = HashMap::new();
        slots.insert(
            req.camera_id.to_string(),
            CameraSlot::active(req.track_id, req.bbox),
        );

        self.identities.insert(
            global_id,
            GlobalIdentity {
                id: global_id,
                room_id,
                slots,
                signature: req.signature.cloned(),
                first_seen_ms: req.timestamp_ms,
                last_seen_ms: req.timestamp_ms,
                appearances: 1,
            },
        );
        log::debug!(
            "minted identity {} for track {}@{}",
            global_id,
            req.track_id,
            req.camera_id
        );
        global_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoomConfig;

    fn config_with_room(cameras: &[&str]) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.rooms.push(RoomConfig {
            id: "r1".to_string(),
            name: "Room 1".to_string(),
            cameras: cameras.iter().map(|c| c.to_string()).collect(),
            alert_threshold: 5,
        });
        config
    }

    fn sig(vector: &[f32]) -> AppearanceSignature {
        AppearanceSignature::from_embedding(vector, 0.9).unwrap()
    }

    fn request<'a>(
        camera_id: &'a str,
        track_id: TrackId,
        ts: u64,
        signature: Option<&'a AppearanceSignature>,
    ) -> ResolveRequest<'a> {
        ResolveRequest {
            camera_id,
            track_id,
            bbox: Bbox::new(10.0, 10.0, 20.0, 40.0),
            timestamp_ms: ts,
            signature,
        }
    }

    #[test]
    fn test_first_track_mints_identity() {
        let mut registry = IdentityRegistry::new(&config_with_room(&["cam-a", "cam-b"]));
        let (id, event) = registry.resolve(request("cam-a", 1, 1000, None));
        assert_eq!(id, 1);
        assert!(matches!(event, IdentityEvent::Created { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_similar_tracks_across_cameras_merge() {
        let mut registry = IdentityRegistry::new(&config_with_room(&["cam-a", "cam-b"]));
        // Nearly identical appearance: cosine well above the 0.6 threshold
        let sig_a = sig(&[1.0, 0.1, 0.0]);
        let sig_b = sig(&[1.0, 0.0, 0.1]);

        let (id_a, _) = registry.resolve(request("cam-a", 1, 1000, Some(&sig_a)));
        let (id_b, event) = registry.resolve(request("cam-b", 7, 1200, Some(&sig_b)));

        assert_eq!(id_a, id_b);
        assert!(matches!(event, IdentityEvent::Reattached { .. }));
        let identity = registry.get(id_a).unwrap();
        assert_eq!(identity.slots.len(), 2);
        assert_eq!(identity.appearances, 2);
    }

    #[test]
    fn test_dissimilar_tracks_stay_separate() {
        let mut registry = IdentityRegistry::new(&config_with_room(&["cam-a", "cam-b"]));
        // Orthogonal appearance: cosine ~0, far below threshold
        let sig_a = sig(&[1.0, 0.0, 0.0]);
        let sig_b = sig(&[0.0, 1.0, 0.0]);

        let (id_a, _) = registry.resolve(request("cam-a", 1, 1000, Some(&sig_a)));
        let (id_b, _) = registry.resolve(request("cam-b", 7, 1200, Some(&sig_b)));

        assert_ne!(id_a, id_b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_position_only_fallback_merges_recent_identity() {
        let mut registry = IdentityRegistry::new(&config_with_room(&["cam-a", "cam-b"]));
        let (id_a, _) = registry.resolve(request("cam-a", 1, 1000, None));
        // No signatures anywhere: recency-based plausibility merges
        let (id_b, _) = registry.resolve(request("cam-b", 7, 1100, None));
        assert_eq!(id_a, id_b);
    }

    #[test]
    fn test_appearance_refinement_splits_wrong_merge() {
        let mut registry = IdentityRegistry::new(&config_with_room(&["cam-a", "cam-b"]));
        let (id_a, _) = registry.resolve(request("cam-a", 1, 1000, None));
        let (id_b, _) = registry.resolve(request("cam-b", 7, 1100, None));
        assert_eq!(id_a, id_b); // optimistic position-only merge

        // Signatures arrive and disagree: camera B's track must split off
        let sig_a = sig(&[1.0, 0.0, 0.0]);
        let (id_a2, _) = registry.resolve(request("cam-a", 1, 1200, Some(&sig_a)));
        assert_eq!(id_a2, id_a);

        let sig_b = sig(&[0.0, 1.0, 0.0]);
        let (id_b2, event) = registry.resolve(request("cam-b", 7, 1300, Some(&sig_b)));
        assert_ne!(id_b2, id_b);
        assert!(matches!(event, IdentityEvent::Created { .. }));
    }

    #[test]
    fn test_never_two_tracks_from_same_camera() {
        let mut registry = IdentityRegistry::new(&config_with_room(&["cam-a", "cam-b"]));
        let sig_shared = sig(&[1.0, 0.0, 0.0]);

        let (id_1, _) = registry.resolve(request("cam-a", 1, 1000, Some(&sig_shared)));
        // Identical appearance on the same camera must not share the slot
        let (id_2, _) = registry.resolve(request("cam-a", 2, 1100, Some(&sig_shared)));

        assert_ne!(id_1, id_2);
        for identity in registry.identities() {
            assert!(identity.slots.len() <= 1);
        }
    }

    #[test]
    fn test_room_constraint_blocks_cross_room_merge() {
        let mut config = config_with_room(&["cam-a"]);
        config.rooms.push(RoomConfig {
            id: "r2".to_string(),
            name: "Room 2".to_string(),
            cameras: vec!["cam-c".to_string()],
            alert_threshold: 5,
        });
        let mut registry = IdentityRegistry::new(&config);

        let sig_shared = sig(&[1.0, 0.0, 0.0]);
        let (id_1, _) = registry.resolve(request("cam-a", 1, 1000, Some(&sig_shared)));
        let (id_2, _) = registry.resolve(request("cam-c", 1, 1100, Some(&sig_shared)));

        assert_ne!(id_1, id_2);
    }

    #[test]
    fn test_camera_mapping_stays_inside_owning_room() {
        let mut config = config_with_room(&["cam-a", "cam-b"]);
        config.rooms.push(RoomConfig {
            id: "r2".to_string(),
            name: "Room 2".to_string(),
            cameras: vec!["cam-c".to_string()],
            alert_threshold: 5,
        });
        let mut registry = IdentityRegistry::new(&config);

        let sig_shared = sig(&[1.0, 0.0, 0.0]);
        registry.resolve(request("cam-a", 1, 1000, Some(&sig_shared)));
        registry.resolve(request("cam-b", 2, 1100, Some(&sig_shared)));
        registry.resolve(request("cam-c", 3, 1200, Some(&sig_shared)));

        let room_cameras: HashMap<&str, Vec<&str>> = HashMap::from([
            ("r1", vec!["cam-a", "cam-b"]),
            ("r2", vec!["cam-c"]),
        ]);
        for identity in registry.identities() {
            let room = identity.room_id.as_deref().unwrap();
            for camera in identity.slots.keys() {
                assert!(room_cameras[room].contains(&camera.as_str()));
            }
        }
    }

    #[test]
    fn test_reattachment_within_grace_period() {
        let mut registry = IdentityRegistry::new(&config_with_room(&["cam-a"]));
        let (id, _) = registry.resolve(request("cam-a", 1, 1000, None));

        registry.mark_lost("cam-a", 1, 2000);

        // New track, same camera, overlapping box, inside the grace window
        let (id_again, event) = registry.resolve(request("cam-a", 2, 3000, None));
        assert_eq!(id_again, id);
        assert!(matches!(event, IdentityEvent::Reattached { .. }));
        let slot = &registry.get(id).unwrap().slots["cam-a"];
        assert_eq!(slot.track_id, 2);
        assert!(!slot.is_pending_release());
    }

    #[test]
    fn test_no_reattachment_after_grace_period() {
        let mut config = config_with_room(&["cam-a"]);
        config.match_window_ms = 2_000;
        let mut registry = IdentityRegistry::new(&config);

        let (id, _) = registry.resolve(request("cam-a", 1, 1000, None));
        registry.mark_lost("cam-a", 1, 1100);

        // Far past both the grace period and the match window: fresh identity
        let (id_new, event) = registry.resolve(request("cam-a", 2, 10_000, None));
        assert_ne!(id_new, id);
        assert!(matches!(event, IdentityEvent::Created { .. }));
    }

    #[test]
    fn test_tie_break_prefers_most_recent() {
        let mut registry =
            IdentityRegistry::new(&config_with_room(&["cam-a", "cam-b", "cam-c"]));

        // Orthogonal signatures: the two identities never merge
        let sig_a = sig(&[1.0, 0.0, 0.0]);
        let sig_b = sig(&[0.0, 1.0, 0.0]);
        let (id_old, _) = registry.resolve(request("cam-a", 1, 1000, Some(&sig_a)));
        let (id_new, _) = registry.resolve(request("cam-b", 1, 2000, Some(&sig_b)));
        assert_ne!(id_old, id_new);

        // A query equidistant from both scores exactly equal cosines;
        // the more recently seen identity must win
        let sig_between = sig(&[1.0, 1.0, 0.0]);
        let (winner, _) = registry.resolve(request("cam-c", 1, 2500, Some(&sig_between)));
        assert_eq!(winner, id_new);
    }

    #[test]
    fn test_touch_refreshes_last_seen() {
        let mut registry = IdentityRegistry::new(&config_with_room(&["cam-a"]));
        let (id, _) = registry.resolve(request("cam-a", 1, 1000, None));

        let touched = registry.touch("cam-a", 1, Bbox::new(12.0, 10.0, 20.0, 40.0), 1500);
        assert_eq!(touched, Some(id));
        assert_eq!(registry.get(id).unwrap().last_seen_ms, 1500);

        assert_eq!(registry.touch("cam-a", 99, Bbox::new(0.0, 0.0, 1.0, 1.0), 1600), None);
    }

    #[test]
    fn test_sweep_evicts_stale_identities() {
        let mut config = config_with_room(&["cam-a"]);
        config.identity_ttl_ms = 5_000;
        let mut registry = IdentityRegistry::new(&config);

        let (id, _) = registry.resolve(request("cam-a", 1, 1000, None));
        let report = registry.sweep(2000);
        assert!(report.events.is_empty());

        let report = registry.sweep(7001);
        assert_eq!(report.events.len(), 1);
        assert!(matches!(
            report.events[0],
            IdentityEvent::Evicted { global_id, .. } if global_id == id
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sweep_finalizes_expired_pending_slots() {
        let mut registry = IdentityRegistry::new(&config_with_room(&["cam-a"]));
        let (id, _) = registry.resolve(request("cam-a", 1, 1000, None));
        registry.mark_lost("cam-a", 1, 1000); // deadline = 3000

        let report = registry.sweep(2000);
        assert_eq!(report.released_slots, 0);

        let report = registry.sweep(3001);
        assert_eq!(report.released_slots, 1);
        assert!(registry.get(id).unwrap().slots.is_empty());
    }

    #[test]
    fn test_sweep_isolates_broken_identity() {
        let mut config = config_with_room(&["cam-a"]);
        config.identity_ttl_ms = 1_000;
        let mut registry = IdentityRegistry::new(&config);

        let (id_broken, _) = registry.resolve(request("cam-a", 1, 1000, None));
        let (id_ok, _) = registry.resolve(request("cam-a", 2, 1000, None));
        // Corrupt one identity's room reference
        registry
            .identities
            .get_mut(&id_broken)
            .unwrap()
            .room_id = Some("ghost".to_string());

        let report = registry.sweep(10_000);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.events.len(), 1);
        assert!(registry.get(id_broken).is_some());
        assert!(registry.get(id_ok).is_none());
    }

    #[test]
    fn test_release_camera_frees_slots_immediately() {
        let mut registry = IdentityRegistry::new(&config_with_room(&["cam-a", "cam-b"]));
        let sig_shared = sig(&[1.0, 0.0, 0.0]);
        let (id, _) = registry.resolve(request("cam-a", 1, 1000, Some(&sig_shared)));
        registry.resolve(request("cam-b", 2, 1100, Some(&sig_shared)));
        registry.mark_lost("cam-a", 1, 1200);

        let released = registry.release_camera("cam-a");
        assert_eq!(released, 1);
        let identity = registry.get(id).unwrap();
        assert!(!identity.slots.contains_key("cam-a"));
        assert!(identity.slots.contains_key("cam-b"));
    }
}
