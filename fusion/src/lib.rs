//! Cross-camera identity resolution and room occupancy engine
//!
//! Fuses short-lived per-camera tracks (maintained by the `camtrack`
//! crate) into stable global person identities, aggregates deduplicated
//! per-room counts, and drives threshold alerts off the unique counts.
//! Detection, embedding extraction, persistence and notification delivery
//! are external collaborators; this crate only consumes their typed
//! outputs and emits intents and snapshots.

pub mod alerts;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod rooms;
pub mod signature;
pub mod sweeper;
pub mod types;
pub mod worker;

pub use config::{EngineConfig, RoomConfig};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use registry::{CameraSlot, GlobalIdentity, IdentityRegistry, ResolveRequest};
pub use rooms::{Room, RoomAggregator};
pub use signature::{cosine, AppearanceSignature, SignatureCache};
pub use sweeper::Sweeper;
pub use types::{
    AlertIntent, CameraId, Detection, Embedding, EngineEvent, GlobalId, IdentityEvent,
    RoomId, RoomOccupancy, TrackId,
};
pub use worker::{CameraCommand, CameraHandle};

/// Get library version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
