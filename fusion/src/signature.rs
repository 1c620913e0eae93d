//! Appearance signatures: quality-gated exponential moving averages over
//! embedding vectors
//!
//! The external extraction collaborator delivers embeddings at a lower
//! cadence than the frame rate, so a signature may lag its track by several
//! frames. Staleness up to the local-track loss tolerance is fine; the
//! matching layer treats a missing signature as a degraded-but-valid state.

use ndarray::Array1;
use std::collections::HashMap;

use crate::types::TrackId;

/// A smoothed, unit-normalized appearance feature vector.
#[derive(Debug, Clone)]
pub struct AppearanceSignature {
    pub vector: Array1<f32>,
    /// Smoothed quality of the contributing embeddings, in [0, 1]
    pub quality: f32,
    pub updates: u32,
}

impl AppearanceSignature {
    /// Build a signature from a first embedding. Returns `None` for a
    /// zero-norm vector, which carries no appearance information.
    pub fn from_embedding(vector: &[f32], quality: f32) -> Option<Self> {
        let mut v = Array1::from_vec(vector.to_vec());
        let norm = v.dot(&v).sqrt();
        if !norm.is_normal() {
            return None;
        }
        v /= norm;
        Some(Self {
            vector: v,
            quality: quality.clamp(0.0, 1.0),
            updates: 1,
        })
    }

    /// Blend a new embedding into the signature:
    /// `sig = alpha * old + (1 - alpha) * new`, with the new-sample weight
    /// additionally scaled by embedding quality so poor crops barely move
    /// the estimate. The result is re-normalized to unit length.
    pub fn blend(&mut self, vector: &Array1<f32>, quality: f32, alpha: f32) {
        let quality = quality.clamp(0.0, 1.0);
        let w = (1.0 - alpha) * quality;
        let mut blended = &self.vector * (1.0 - w) + vector * w;
        let norm = blended.dot(&blended).sqrt();
        if !norm.is_normal() {
            return;
        }
        blended /= norm;
        self.vector = blended;
        self.quality = (1.0 - w) * self.quality + w * quality;
        self.updates += 1;
    }
}

/// Cosine similarity between two signatures. Vectors are unit-normalized
/// on every update, so this reduces to a dot product.
pub fn cosine(a: &AppearanceSignature, b: &AppearanceSignature) -> f32 {
    if a.vector.len() != b.vector.len() {
        return 0.0;
    }
    a.vector.dot(&b.vector)
}

/// Per-camera store of current track signatures.
#[derive(Debug)]
pub struct SignatureCache {
    dim: usize,
    alpha: f32,
    min_quality: f32,
    entries: HashMap<TrackId, AppearanceSignature>,
    rejected_low_quality: u64,
    rejected_bad_vector: u64,
}

impl SignatureCache {
    pub fn new(dim: usize, alpha: f32, min_quality: f32) -> Self {
        Self {
            dim,
            alpha,
            min_quality,
            entries: HashMap::new(),
            rejected_low_quality: 0,
            rejected_bad_vector: 0,
        }
    }

    /// Apply one embedding. Returns true when the track's signature
    /// changed, false when the embedding was rejected.
    pub fn update(&mut self, track_id: TrackId, vector: &[f32], quality: f32) -> bool {
        if vector.len() != self.dim {
            self.rejected_bad_vector += 1;
            log::warn!(
                "rejecting embedding for track {}: dimension {} != {}",
                track_id,
                vector.len(),
                self.dim
            );
            return false;
        }
        if quality < self.min_quality {
            self.rejected_low_quality += 1;
            return false;
        }

        match self.entries.get_mut(&track_id) {
            Some(signature) => {
                let incoming = match AppearanceSignature::from_embedding(vector, quality) {
                    Some(s) => s,
                    None => {
                        self.rejected_bad_vector += 1;
                        return false;
                    }
                };
                signature.blend(&incoming.vector, quality, self.alpha);
                true
            }
            None => match AppearanceSignature::from_embedding(vector, quality) {
                Some(signature) => {
                    self.entries.insert(track_id, signature);
                    true
                }
                None => {
                    self.rejected_bad_vector += 1;
                    false
                }
            },
        }
    }

    pub fn get(&self, track_id: TrackId) -> Option<&AppearanceSignature> {
        self.entries.get(&track_id)
    }

    /// Drop the entry for a dead track.
    pub fn remove(&mut self, track_id: TrackId) {
        self.entries.remove(&track_id);
    }

    pub fn rejected_low_quality(&self) -> u64 {
        self.rejected_low_quality
    }

    pub fn rejected_bad_vector(&self) -> u64 {
        self.rejected_bad_vector
    }
}
