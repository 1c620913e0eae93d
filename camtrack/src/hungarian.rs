/// Hungarian algorithm for optimal track-to-detection assignment
///
/// Association is formulated as maximum-weight matching over the IoU matrix.
/// Very sparse matrices (most pairs below threshold) short-circuit to a
/// greedy pass, which is much faster when few assignments are possible.
use ndarray::ArrayView2;
use pathfinding::prelude::{kuhn_munkres, Matrix};

/// Result of an assignment pass.
#[derive(Debug, Clone)]
pub struct AssignmentResult {
    /// Accepted pairs as (track_idx, detection_idx)
    pub assignments: Vec<(usize, usize)>,
    /// Indices of tracks with no accepted detection
    pub unassigned_tracks: Vec<usize>,
    /// Indices of detections with no accepted track
    pub unassigned_detections: Vec<usize>,
}

/// Assignment solver over an IoU matrix of shape (n_tracks, n_detections).
pub struct HungarianSolver;

impl HungarianSolver {
    /// Solve the assignment problem, accepting only pairs with
    /// IoU >= `iou_threshold`.
    pub fn solve_iou(iou_matrix: ArrayView2<f32>, iou_threshold: f32) -> AssignmentResult {
        let n_tracks = iou_matrix.nrows();
        let n_dets = iou_matrix.ncols();

        if n_tracks == 0 || n_dets == 0 {
            return AssignmentResult {
                assignments: Vec::new(),
                unassigned_tracks: (0..n_tracks).collect(),
                unassigned_detections: (0..n_dets).collect(),
            };
        }

        // Use greedy assignment for very sparse matrices (< 25% viable pairs)
        let viable = iou_matrix.iter().filter(|&&v| v >= iou_threshold).count();
        if viable < (n_tracks * n_dets) / 4 {
            return Self::solve_greedy(iou_matrix, iou_threshold);
        }

        Self::solve_hungarian(iou_matrix, iou_threshold)
    }

    /// Full Kuhn-Munkres maximum-weight matching.
    fn solve_hungarian(iou_matrix: ArrayView2<f32>, iou_threshold: f32) -> AssignmentResult {
        let n_tracks = iou_matrix.nrows();
        let n_dets = iou_matrix.ncols();

        // kuhn_munkres needs a square matrix; pad with zero-weight entries.
        let size = n_tracks.max(n_dets);
        let mut weights = Matrix::new(size, size, 0i64);
        for i in 0..n_tracks {
            for j in 0..n_dets {
                weights[(i, j)] = (iou_matrix[[i, j]] * 1000.0) as i64;
            }
        }

        let (_, row_assignments) = kuhn_munkres(&weights);

        let threshold_scaled = (iou_threshold * 1000.0) as i64;
        let assignments: Vec<(usize, usize)> = row_assignments
            .iter()
            .enumerate()
            .filter_map(|(track_idx, &det_idx)| {
                if track_idx < n_tracks
                    && det_idx < n_dets
                    && weights[(track_idx, det_idx)] >= threshold_scaled
                {
                    Some((track_idx, det_idx))
                } else {
                    None
                }
            })
            .collect();

        Self::finish(assignments, n_tracks, n_dets)
    }

    /// Greedy best-first assignment for sparse matrices.
    fn solve_greedy(iou_matrix: ArrayView2<f32>, iou_threshold: f32) -> AssignmentResult {
        let n_tracks = iou_matrix.nrows();
        let n_dets = iou_matrix.ncols();

        let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
        for i in 0..n_tracks {
            for j in 0..n_dets {
                let iou = iou_matrix[[i, j]];
                if iou >= iou_threshold {
                    candidates.push((iou, i, j));
                }
            }
        }

        // Best pairs first
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut assignments = Vec::new();
        let mut used_tracks = vec![false; n_tracks];
        let mut used_dets = vec![false; n_dets];

        for (_iou, track_idx, det_idx) in candidates {
            if !used_tracks[track_idx] && !used_dets[det_idx] {
                assignments.push((track_idx, det_idx));
                used_tracks[track_idx] = true;
                used_dets[det_idx] = true;
            }
        }

        Self::finish(assignments, n_tracks, n_dets)
    }

    fn finish(
        assignments: Vec<(usize, usize)>,
        n_tracks: usize,
        n_dets: usize,
    ) -> AssignmentResult {
        let unassigned_tracks = (0..n_tracks)
            .filter(|i| !assignments.iter().any(|(t, _)| t == i))
            .collect();
        let unassigned_detections = (0..n_dets)
            .filter(|j| !assignments.iter().any(|(_, d)| d == j))
            .collect();

        AssignmentResult {
            assignments,
            unassigned_tracks,
            unassigned_detections,
        }
    }
}
