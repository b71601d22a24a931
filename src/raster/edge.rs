//! Canny-style edge detection on binary rasters.
//!
//! Gaussian smoothing, Sobel gradients, non-maximum suppression and a single
//! fixed magnitude threshold. Tuned for 0/1 snow masks where a clean step
//! yields a gradient magnitude near 0.8.

use crate::types::{MaskGrid, RasterGrid};
use ndarray::Array2;

/// Edge operator parameters
#[derive(Debug, Clone)]
pub struct CannyParams {
    /// Gradient magnitude threshold
    pub threshold: f32,
    /// Gaussian smoothing sigma (pixels)
    pub sigma: f32,
}

impl Default for CannyParams {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            sigma: 0.7,
        }
    }
}

/// Detect edges in a raster; NaN pixels are treated as 0 and excluded from
/// the result (callers additionally clip with a valid-data buffer).
pub fn canny(img: &RasterGrid, params: &CannyParams) -> MaskGrid {
    let (rows, cols) = img.dim();
    let valid = img.mapv(|v| !v.is_nan());
    let filled = img.mapv(|v| if v.is_nan() { 0.0 } else { v });

    let smoothed = gaussian_smooth(&filled, params.sigma);
    let (gx, gy) = sobel(&smoothed);

    let mut magnitude = Array2::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            let (x, y): (f32, f32) = (gx[[r, c]], gy[[r, c]]);
            magnitude[[r, c]] = (x * x + y * y).sqrt();
        }
    }

    let mut edges = Array2::from_elem((rows, cols), false);
    for r in 1..rows.saturating_sub(1) {
        for c in 1..cols.saturating_sub(1) {
            let m = magnitude[[r, c]];
            if m <= params.threshold || !valid[[r, c]] {
                continue;
            }
            // suppress non-maxima along the quantized gradient direction
            let (dr, dc) = quantize_direction(gy[[r, c]], gx[[r, c]]);
            let ahead = magnitude[[(r as isize + dr) as usize, (c as isize + dc) as usize]];
            let behind = magnitude[[(r as isize - dr) as usize, (c as isize - dc) as usize]];
            if m >= ahead && m >= behind {
                edges[[r, c]] = true;
            }
        }
    }
    edges
}

/// Separable gaussian smoothing; kernel radius covers 3 sigma
fn gaussian_smooth(img: &RasterGrid, sigma: f32) -> RasterGrid {
    if sigma <= 0.0 {
        return img.clone();
    }
    let radius = (3.0 * sigma).ceil().max(1.0) as usize;
    let mut kernel = Vec::with_capacity(2 * radius + 1);
    for k in -(radius as isize)..=(radius as isize) {
        let x = k as f32;
        kernel.push((-x * x / (2.0 * sigma * sigma)).exp());
    }
    let norm: f32 = kernel.iter().sum();
    for w in kernel.iter_mut() {
        *w /= norm;
    }

    let (rows, cols) = img.dim();
    // horizontal pass, edge pixels clamped
    let mut tmp = Array2::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = 0.0f32;
            for (i, w) in kernel.iter().enumerate() {
                let offset = i as isize - radius as isize;
                let cc = (c as isize + offset).clamp(0, cols as isize - 1) as usize;
                acc += w * img[[r, cc]];
            }
            tmp[[r, c]] = acc;
        }
    }
    // vertical pass
    let mut out = Array2::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = 0.0f32;
            for (i, w) in kernel.iter().enumerate() {
                let offset = i as isize - radius as isize;
                let rr = (r as isize + offset).clamp(0, rows as isize - 1) as usize;
                acc += w * tmp[[rr, c]];
            }
            out[[r, c]] = acc;
        }
    }
    out
}

/// Sobel gradients normalized so a unit step yields magnitude near 1
fn sobel(img: &RasterGrid) -> (RasterGrid, RasterGrid) {
    let (rows, cols) = img.dim();
    let mut gx = Array2::zeros((rows, cols));
    let mut gy = Array2::zeros((rows, cols));
    for r in 1..rows.saturating_sub(1) {
        for c in 1..cols.saturating_sub(1) {
            let p = |dr: isize, dc: isize| -> f32 {
                img[[(r as isize + dr) as usize, (c as isize + dc) as usize]]
            };
            gx[[r, c]] = ((p(-1, 1) + 2.0 * p(0, 1) + p(1, 1))
                - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1)))
                / 4.0;
            gy[[r, c]] = ((p(1, -1) + 2.0 * p(1, 0) + p(1, 1))
                - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1)))
                / 4.0;
        }
    }
    (gx, gy)
}

/// Quantize a gradient direction into one of four neighbor offsets
fn quantize_direction(gy: f32, gx: f32) -> (isize, isize) {
    let angle = gy.atan2(gx).to_degrees();
    let a = if angle < 0.0 { angle + 180.0 } else { angle };
    if !(22.5..157.5).contains(&a) {
        (0, 1) // horizontal gradient
    } else if a < 67.5 {
        (1, 1)
    } else if a < 112.5 {
        (1, 0) // vertical gradient
    } else {
        (1, -1)
    }
}
