//! Per-camera worker: one thread per feed, commands over a channel
//!
//! Each camera runs as an independent unit of execution so feeds never
//! block each other. The worker owns that camera's track manager and
//! signature cache; only resolution calls cross into the shared registry,
//! each as one critical section. Frames are processed in arrival order
//! within a camera; no cross-camera ordering exists or is needed.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

use camtrack::{TrackManager, TrackerConfig};

use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::signature::SignatureCache;
use crate::types::{CameraId, Detection, Embedding};

/// Commands accepted by a camera worker.
pub enum CameraCommand {
    /// One frame's detections for this camera
    Frame {
        detections: Vec<Detection>,
        timestamp_ms: u64,
    },
    /// An appearance embedding from the extraction collaborator
    Embedding(Embedding),
    /// Block the sender until every previously queued command is processed
    Flush { response_tx: Sender<()> },
    /// Stop the worker, releasing the camera's identity slots immediately
    Shutdown,
}

/// Handle to a running camera worker. Dropping the handle shuts the worker
/// down and joins its thread.
pub struct CameraHandle {
    camera_id: CameraId,
    command_tx: Sender<CameraCommand>,
    worker: Option<thread::JoinHandle<()>>,
}

impl CameraHandle {
    pub(crate) fn spawn(engine: Engine, camera_id: CameraId) -> Result<Self> {
        let (command_tx, command_rx) = channel::<CameraCommand>();

        let thread_camera = camera_id.clone();
        let worker = thread::Builder::new()
            .name(format!("camera-{}", camera_id))
            .spawn(move || worker_loop(engine, thread_camera, command_rx))
            .map_err(|e| EngineError::worker(format!("failed to spawn worker: {}", e)))?;

        Ok(Self {
            camera_id,
            command_tx,
            worker: Some(worker),
        })
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    /// Queue one frame of detections (non-blocking).
    pub fn send_frame(&self, detections: Vec<Detection>, timestamp_ms: u64) -> Result<()> {
        self.command_tx
            .send(CameraCommand::Frame {
                detections,
                timestamp_ms,
            })
            .map_err(|_| EngineError::worker(format!("camera {} worker is gone", self.camera_id)))
    }

    /// Queue an appearance embedding (non-blocking).
    pub fn send_embedding(&self, embedding: Embedding) -> Result<()> {
        self.command_tx
            .send(CameraCommand::Embedding(embedding))
            .map_err(|_| EngineError::worker(format!("camera {} worker is gone", self.camera_id)))
    }

    /// Block until the worker has processed everything queued so far.
    pub fn flush(&self) -> Result<()> {
        let (response_tx, response_rx) = channel();
        self.command_tx
            .send(CameraCommand::Flush { response_tx })
            .map_err(|_| EngineError::worker(format!("camera {} worker is gone", self.camera_id)))?;
        response_rx
            .recv()
            .map_err(|_| EngineError::worker(format!("camera {} worker is gone", self.camera_id)))
    }

    /// Request shutdown without waiting for the thread to finish.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(CameraCommand::Shutdown);
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(engine: Engine, camera_id: CameraId, command_rx: Receiver<CameraCommand>) {
    log::info!("camera {} worker started", camera_id);

    let mut manager = TrackManager::new(TrackerConfig {
        min_confidence: engine.config.min_confidence,
        iou_threshold: engine.config.iou_threshold,
        loss_tolerance: engine.config.loss_tolerance,
        velocity_smoothing: engine.config.velocity_smoothing,
    });
    let mut cache = SignatureCache::new(
        engine.config.embedding_dim,
        engine.config.ema_alpha,
        engine.config.min_embedding_quality,
    );
    let mut frames = 0u64;
    let mut last_timestamp_ms = 0u64;

    loop {
        match command_rx.recv() {
            Ok(CameraCommand::Frame {
                detections,
                timestamp_ms,
            }) => {
                last_timestamp_ms = last_timestamp_ms.max(timestamp_ms);
                let local: Vec<camtrack::Detection> = detections
                    .iter()
                    .filter(|d| {
                        if d.camera_id != camera_id {
                            log::warn!(
                                "camera {} worker received detection for {}",
                                camera_id,
                                d.camera_id
                            );
                            return false;
                        }
                        true
                    })
                    .map(|d| camtrack::Detection {
                        bbox: d.bbox,
                        confidence: d.confidence,
                    })
                    .collect();

                let report = manager.observe(&local, timestamp_ms);

                // Lost tracks go pending-release; a brief grace period lets
                // an occlusion re-attach without a fresh match.
                if !report.lost.is_empty() {
                    for track_id in &report.lost {
                        cache.remove(*track_id);
                    }
                    engine.tracks_lost(&camera_id, &report.lost, timestamp_ms);
                }

                for update in &report.updates {
                    if update.newly_created {
                        engine.resolve_track(
                            &camera_id,
                            update.track_id,
                            update.bbox,
                            timestamp_ms,
                            cache.get(update.track_id).cloned(),
                        );
                    } else if !engine.touch_track(
                        &camera_id,
                        update.track_id,
                        update.bbox,
                        timestamp_ms,
                    ) {
                        // Slot was swept or displaced while the track lived on
                        engine.resolve_track(
                            &camera_id,
                            update.track_id,
                            update.bbox,
                            timestamp_ms,
                            cache.get(update.track_id).cloned(),
                        );
                    }
                }

                frames += 1;
                if frames % 500 == 0 {
                    log::debug!(
                        "camera {}: {} frames, {} local tracks",
                        camera_id,
                        frames,
                        manager.num_tracks()
                    );
                }
            }
            Ok(CameraCommand::Embedding(embedding)) => {
                if cache.update(embedding.track_id, &embedding.vector, embedding.quality) {
                    // A fresh signature refines the track's resolution
                    if let Some(track) = manager.get(embedding.track_id) {
                        let (track_id, bbox, seen) = (track.id, track.bbox, track.last_update_ms);
                        engine.resolve_track(
                            &camera_id,
                            track_id,
                            bbox,
                            seen,
                            cache.get(track_id).cloned(),
                        );
                    }
                }
            }
            Ok(CameraCommand::Flush { response_tx }) => {
                let _ = response_tx.send(());
            }
            Ok(CameraCommand::Shutdown) | Err(_) => {
                manager.clear();
                engine.camera_shutdown(&camera_id, last_timestamp_ms);
                break;
            }
        }
    }

    log::info!("camera {} worker stopped after {} frames", camera_id, frames);
}
