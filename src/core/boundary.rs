//! Snow-line boundary detection.
//!
//! Edge detection on the cleaned binary mask, restricted to the eroded
//! valid-data region so transitions at tile or AOI borders (clipping
//! artifacts, not real snow lines) never enter the sample.

use crate::core::classify::BinarySnow;
use crate::raster::{canny, mask_and, CannyParams};
use crate::types::MaskGrid;

/// Boundary detector parameters
#[derive(Debug, Clone)]
pub struct BoundaryParams {
    pub canny_threshold: f32,
    pub canny_sigma: f32,
}

impl Default for BoundaryParams {
    fn default() -> Self {
        Self {
            canny_threshold: 0.7,
            canny_sigma: 0.7,
        }
    }
}

/// Snow/no-snow boundary detector
pub struct BoundaryDetector {
    params: BoundaryParams,
}

impl Default for BoundaryDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundaryDetector {
    pub fn new() -> Self {
        Self {
            params: BoundaryParams::default(),
        }
    }

    pub fn with_params(params: BoundaryParams) -> Self {
        Self { params }
    }

    /// Detect the snow-line mask for one cleaned binary raster
    pub fn detect(&self, snow: &BinarySnow) -> MaskGrid {
        let edges = canny(
            &snow.raster,
            &CannyParams {
                threshold: self.params.canny_threshold,
                sigma: self.params.canny_sigma,
            },
        );
        let boundary = mask_and(&edges, &snow.valid);
        log::debug!(
            "boundary detection: {} edge pixels within the valid region",
            boundary.iter().filter(|&&b| b).count()
        );
        boundary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn binary_halves(rows: usize, cols: usize, split: usize) -> BinarySnow {
        let raster = Array2::from_shape_fn((rows, cols), |(_, c)| {
            if c >= split {
                1.0
            } else {
                0.0
            }
        });
        let valid = Array2::from_elem((rows, cols), true);
        BinarySnow { raster, valid }
    }

    #[test]
    fn test_boundary_found_at_transition() {
        let snow = binary_halves(12, 16, 8);
        let boundary = BoundaryDetector::new().detect(&snow);
        let hits = boundary.iter().filter(|&&b| b).count();
        assert!(hits > 0);
        // every hit lies next to the transition
        for ((_, c), &b) in boundary.indexed_iter() {
            if b {
                assert!((7..=8).contains(&c));
            }
        }
    }

    #[test]
    fn test_clipping_border_suppressed() {
        let mut snow = binary_halves(12, 16, 8);
        // invalidate the transition zone: whatever edge remains is an artifact
        for r in 0..12 {
            for c in 6..10 {
                snow.valid[[r, c]] = false;
            }
        }
        let boundary = BoundaryDetector::new().detect(&snow);
        for ((_, c), &b) in boundary.indexed_iter() {
            if b {
                assert!(!(6..10).contains(&c));
            }
        }
    }

    #[test]
    fn test_uniform_snow_has_no_boundary() {
        let raster = Array2::from_elem((10, 10), 1.0f32);
        let valid = Array2::from_elem((10, 10), true);
        let boundary = BoundaryDetector::new().detect(&BinarySnow { raster, valid });
        assert!(boundary.iter().all(|&b| !b));
    }
}
