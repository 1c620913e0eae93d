//! Bounding box operations and IoU calculations

use ndarray::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned bounding box in pixel space, stored as top-left corner
/// plus width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Bbox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// A box is usable only with positive dimensions and finite coordinates.
    pub fn is_valid(&self) -> bool {
        self.w > 0.0
            && self.h > 0.0
            && self.x.is_finite()
            && self.y.is_finite()
            && self.w.is_finite()
            && self.h.is_finite()
    }

    /// Box translated by (dx, dy), keeping its size.
    pub fn shifted(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &Bbox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

impl fmt::Display for Bbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bbox({}, {}, {}x{})", self.x, self.y, self.w, self.h)
    }
}

/// Compute the IoU matrix between predicted track boxes and detections with
/// parallel processing. Returns a (n_tracks, n_detections) matrix.
pub fn ious(tracks: &[Bbox], detections: &[Bbox]) -> Array2<f32> {
    let n_tracks = tracks.len();
    let n_dets = detections.len();

    if n_tracks == 0 || n_dets == 0 {
        return Array2::zeros((n_tracks, n_dets));
    }

    let iou_data: Vec<f32> = tracks
        .par_iter()
        .flat_map(|track| {
            detections
                .iter()
                .map(|det| track.iou(det))
                .collect::<Vec<_>>()
        })
        .collect();

    Array2::from_shape_vec((n_tracks, n_dets), iou_data).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_bbox_properties() {
        let bbox = Bbox::new(0.0, 0.0, 10.0, 5.0);
        assert_eq!(bbox.right(), 10.0);
        assert_eq!(bbox.bottom(), 5.0);
        assert_eq!(bbox.area(), 50.0);
        assert_eq!(bbox.center(), (5.0, 2.5));
    }

    #[test]
    fn test_iou_overlap() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0);
        let b = Bbox::new(5.0, 5.0, 10.0, 10.0);
        let iou = a.iou(&b);
        assert_abs_diff_eq!(iou, 25.0 / 175.0, epsilon = 0.001);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0);
        let b = Bbox::new(20.0, 20.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_validity() {
        assert!(Bbox::new(0.0, 0.0, 10.0, 10.0).is_valid());
        assert!(!Bbox::new(0.0, 0.0, 0.0, 10.0).is_valid());
        assert!(!Bbox::new(0.0, 0.0, 10.0, -5.0).is_valid());
        assert!(!Bbox::new(f32::NAN, 0.0, 10.0, 10.0).is_valid());
        assert!(!Bbox::new(f32::INFINITY, 0.0, 10.0, 10.0).is_valid());
    }

    #[test]
    fn test_iou_matrix_shape() {
        let tracks = vec![
            Bbox::new(0.0, 0.0, 10.0, 10.0),
            Bbox::new(50.0, 50.0, 10.0, 10.0),
        ];
        let dets = vec![
            Bbox::new(1.0, 1.0, 10.0, 10.0),
            Bbox::new(51.0, 51.0, 10.0, 10.0),
            Bbox::new(200.0, 200.0, 10.0, 10.0),
        ];

        let m = ious(&tracks, &dets);
        assert_eq!(m.shape(), &[2, 3]);
        assert!(m[[0, 0]] > 0.5);
        assert!(m[[1, 1]] > 0.5);
        assert_eq!(m[[0, 2]], 0.0);
    }

    #[test]
    fn test_iou_matrix_empty() {
        let m = ious(&[], &[Bbox::new(0.0, 0.0, 1.0, 1.0)]);
        assert_eq!(m.shape(), &[0, 1]);
    }
}
