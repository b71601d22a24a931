//! Map algebra, scale aggregation and zonal reduction over in-memory grids.
//!
//! NaN marks nodata throughout; reducers skip it and return None rather than
//! coercing missing regions to zero.

use crate::types::{ClassGrid, MaskGrid, RasterGrid, SnowError, SnowResult};
use ndarray::Array2;
use num_traits::Float;

/// Binary-threshold a raster: value > threshold becomes 1, else 0; NaN stays NaN
pub fn threshold(img: &RasterGrid, t: f32) -> RasterGrid {
    img.mapv(|v| {
        if v.is_nan() {
            f32::NAN
        } else if v > t {
            1.0
        } else {
            0.0
        }
    })
}

/// Mask of finite (non-nodata) pixels
pub fn finite_mask(img: &RasterGrid) -> MaskGrid {
    img.mapv(|v| !v.is_nan())
}

/// NaN out every pixel where `keep` is false
pub fn mask_where(img: &RasterGrid, keep: &MaskGrid) -> RasterGrid {
    let mut out = img.clone();
    for ((r, c), v) in out.indexed_iter_mut() {
        if !keep[[r, c]] {
            *v = f32::NAN;
        }
    }
    out
}

/// Logical AND of two masks
pub fn mask_and(a: &MaskGrid, b: &MaskGrid) -> MaskGrid {
    let mut out = a.clone();
    for ((r, c), v) in out.indexed_iter_mut() {
        *v = *v && b[[r, c]];
    }
    out
}

/// Morphological erosion with a circular structuring element.
///
/// Shrinks the valid region by `radius` pixels; the equivalent of a focal-min
/// over a circular kernel on a 0/1 mask. Used to buffer away clip-border
/// artifacts before boundary detection.
pub fn erode(mask: &MaskGrid, radius: usize) -> MaskGrid {
    if radius == 0 {
        return mask.clone();
    }
    let (rows, cols) = mask.dim();
    let r = radius as isize;
    let r2 = (radius * radius) as isize;
    let mut out = Array2::from_elem((rows, cols), false);
    for row in 0..rows as isize {
        for col in 0..cols as isize {
            if !mask[[row as usize, col as usize]] {
                continue;
            }
            let mut keep = true;
            'win: for dr in -r..=r {
                for dc in -r..=r {
                    if dr * dr + dc * dc > r2 {
                        continue;
                    }
                    let (nr, nc) = (row + dr, col + dc);
                    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                        keep = false;
                        break 'win;
                    }
                    if !mask[[nr as usize, nc as usize]] {
                        keep = false;
                        break 'win;
                    }
                }
            }
            out[[row as usize, col as usize]] = keep;
        }
    }
    out
}

/// Block-aggregate a raster by an integer factor using the mean reducer.
///
/// Output cell (i, j) averages the finite input pixels of the factor x factor
/// block; a block with no finite pixel becomes NaN. Input dimensions must be
/// divisible by the factor.
pub fn aggregate_mean<T: Float>(img: &Array2<T>, factor: usize) -> SnowResult<Array2<T>> {
    if factor == 0 {
        return Err(SnowError::Processing("aggregation factor must be >= 1".into()));
    }
    let (rows, cols) = img.dim();
    if rows % factor != 0 || cols % factor != 0 {
        return Err(SnowError::Processing(format!(
            "raster {}x{} not divisible by aggregation factor {}",
            rows, cols, factor
        )));
    }
    let (out_rows, out_cols) = (rows / factor, cols / factor);
    let mut out = Array2::from_elem((out_rows, out_cols), T::nan());
    for out_row in 0..out_rows {
        for out_col in 0..out_cols {
            // f64 accumulation over the block window
            let mut sum = 0.0f64;
            let mut count = 0usize;
            for dr in 0..factor {
                for dc in 0..factor {
                    let v = img[[out_row * factor + dr, out_col * factor + dc]];
                    if !v.is_nan() {
                        sum += v.to_f64().unwrap_or(0.0);
                        count += 1;
                    }
                }
            }
            if count > 0 {
                out[[out_row, out_col]] = T::from(sum / count as f64).unwrap_or_else(T::nan);
            }
        }
    }
    Ok(out)
}

/// Block-aggregate a class raster by an integer factor using the mode reducer.
///
/// Code 0 is nodata and never wins. Ties between distinct winning codes fall
/// to `tie_code`; blocks with no coded pixel stay 0.
pub fn aggregate_mode(codes: &ClassGrid, factor: usize, tie_code: u8) -> SnowResult<ClassGrid> {
    if factor == 0 {
        return Err(SnowError::Processing("aggregation factor must be >= 1".into()));
    }
    let (rows, cols) = codes.dim();
    if rows % factor != 0 || cols % factor != 0 {
        return Err(SnowError::Processing(format!(
            "class raster {}x{} not divisible by aggregation factor {}",
            rows, cols, factor
        )));
    }
    let (out_rows, out_cols) = (rows / factor, cols / factor);
    let mut out = Array2::from_elem((out_rows, out_cols), 0u8);
    for out_row in 0..out_rows {
        for out_col in 0..out_cols {
            let mut counts = [0usize; 256];
            for dr in 0..factor {
                for dc in 0..factor {
                    let code = codes[[out_row * factor + dr, out_col * factor + dc]];
                    if code > 0 {
                        counts[code as usize] += 1;
                    }
                }
            }
            let best = counts.iter().skip(1).max().copied().unwrap_or(0);
            if best == 0 {
                continue;
            }
            let winners: Vec<u8> = (1..256)
                .filter(|&c| counts[c] == best)
                .map(|c| c as u8)
                .collect();
            out[[out_row, out_col]] = if winners.len() == 1 { winners[0] } else { tie_code };
        }
    }
    Ok(out)
}

/// Nearest-neighbour upsample by an integer factor (each pixel repeated)
pub fn upsample_nearest<T: Copy>(img: &Array2<T>, factor: usize) -> Array2<T> {
    let (rows, cols) = img.dim();
    Array2::from_shape_fn((rows * factor, cols * factor), |(r, c)| {
        img[[r / factor, c / factor]]
    })
}

/// Zonal statistical reducer over a boolean region mask.
///
/// Reductions honor a pixel budget: regions larger than `max_pixels` are
/// systematically subsampled (every k-th candidate pixel) so very large
/// basins degrade to approximate results instead of failing. NaN pixels are
/// skipped; an empty region yields None, never zero.
#[derive(Debug, Clone)]
pub struct ZonalReducer {
    /// Best-effort pixel budget per reduction
    pub max_pixels: usize,
}

impl Default for ZonalReducer {
    fn default() -> Self {
        Self {
            max_pixels: 10_000_000,
        }
    }
}

impl ZonalReducer {
    pub fn new(max_pixels: usize) -> Self {
        Self { max_pixels }
    }

    /// Collect finite values inside the region, subsampling past the budget
    fn collect(&self, img: &RasterGrid, region: Option<&MaskGrid>) -> Vec<f64> {
        let total = img.len();
        let stride = if self.max_pixels > 0 && total > self.max_pixels {
            let k = total.div_ceil(self.max_pixels);
            log::debug!(
                "zonal reduction over {} pixels exceeds budget {}, sampling every {}th pixel",
                total,
                self.max_pixels,
                k
            );
            k
        } else {
            1
        };
        let mut values = Vec::new();
        for (i, ((r, c), &v)) in img.indexed_iter().enumerate() {
            if i % stride != 0 {
                continue;
            }
            if let Some(m) = region {
                if !m[[r, c]] {
                    continue;
                }
            }
            if !v.is_nan() {
                values.push(v as f64);
            }
        }
        values
    }

    pub fn mean(&self, img: &RasterGrid, region: Option<&MaskGrid>) -> Option<f64> {
        let values = self.collect(img, region);
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }

    pub fn min(&self, img: &RasterGrid, region: Option<&MaskGrid>) -> Option<f64> {
        self.collect(img, region)
            .into_iter()
            .fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |a| a.min(v)))
            })
    }

    pub fn max(&self, img: &RasterGrid, region: Option<&MaskGrid>) -> Option<f64> {
        self.collect(img, region)
            .into_iter()
            .fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |a| a.max(v)))
            })
    }

    pub fn count(&self, img: &RasterGrid, region: Option<&MaskGrid>) -> usize {
        self.collect(img, region).len()
    }

    pub fn sum(&self, img: &RasterGrid, region: Option<&MaskGrid>) -> Option<f64> {
        let values = self.collect(img, region);
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum())
        }
    }

    pub fn median(&self, img: &RasterGrid, region: Option<&MaskGrid>) -> Option<f64> {
        self.percentile(img, region, 50.0)
    }

    /// Linear-interpolated percentile, p in [0, 100]
    pub fn percentile(&self, img: &RasterGrid, region: Option<&MaskGrid>, p: f64) -> Option<f64> {
        let mut values = self.collect(img, region);
        percentile_of(&mut values, p)
    }
}

/// Percentile of a sample, linear interpolation between closest ranks
pub fn percentile_of(values: &mut [f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (p / 100.0).clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        Some(values[lo])
    } else {
        let w = rank - lo as f64;
        Some(values[lo] * (1.0 - w) + values[hi] * w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array;

    #[test]
    fn test_threshold_preserves_nodata() {
        let img = Array::from_shape_vec((1, 4), vec![10.0, 60.0, f32::NAN, 50.0]).unwrap();
        let b = threshold(&img, 50.0);
        assert_eq!(b[[0, 0]], 0.0);
        assert_eq!(b[[0, 1]], 1.0);
        assert!(b[[0, 2]].is_nan());
        assert_eq!(b[[0, 3]], 0.0); // threshold is exclusive
    }

    #[test]
    fn test_aggregate_mean_blocks() {
        let data = Array::from_shape_vec(
            (4, 4),
            vec![
                1.0, 2.0, 3.0, 4.0, //
                5.0, 6.0, 7.0, 8.0, //
                9.0, 10.0, 11.0, 12.0, //
                13.0, 14.0, 15.0, 16.0,
            ],
        )
        .unwrap();
        let out = aggregate_mean(&data, 2).unwrap();
        assert_eq!(out.dim(), (2, 2));
        assert_eq!(out[[0, 0]], 3.5);
        assert_eq!(out[[0, 1]], 5.5);
        assert_eq!(out[[1, 0]], 11.5);
        assert_eq!(out[[1, 1]], 13.5);
    }

    #[test]
    fn test_aggregate_mean_skips_nodata() {
        let data =
            Array::from_shape_vec((2, 2), vec![4.0, f32::NAN, f32::NAN, 8.0]).unwrap();
        let out = aggregate_mean(&data, 2).unwrap();
        assert_eq!(out[[0, 0]], 6.0);

        let empty = Array2::from_elem((2, 2), f32::NAN);
        let out = aggregate_mean(&empty, 2).unwrap();
        assert!(out[[0, 0]].is_nan());
    }

    #[test]
    fn test_aggregate_mode_ties_fall_to_catch_all() {
        let codes = Array::from_shape_vec((2, 4), vec![1, 1, 2, 3, 1, 2, 2, 3]).unwrap();
        let out = aggregate_mode(&codes, 2, 5).unwrap();
        assert_eq!(out[[0, 0]], 1); // three 1s vs one 2
        assert_eq!(out[[0, 1]], 5); // 2 and 3 tie

        let empty = Array2::from_elem((2, 2), 0u8);
        let out = aggregate_mode(&empty, 2, 5).unwrap();
        assert_eq!(out[[0, 0]], 0);
    }

    #[test]
    fn test_erode_shrinks_by_radius() {
        let mask = Array2::from_elem((7, 7), true);
        let eroded = erode(&mask, 2);
        // borders within the radius of the array edge are gone
        assert!(!eroded[[0, 3]]);
        assert!(!eroded[[1, 3]]);
        assert!(eroded[[3, 3]]);
        assert!(eroded[[2, 2]]);
    }

    #[test]
    fn test_zonal_mean_and_count() {
        let img = Array::from_shape_vec((2, 2), vec![1.0, 3.0, f32::NAN, 5.0]).unwrap();
        let red = ZonalReducer::default();
        assert_relative_eq!(red.mean(&img, None).unwrap(), 3.0);
        assert_eq!(red.count(&img, None), 3);

        let mut region = Array2::from_elem((2, 2), false);
        region[[0, 1]] = true;
        assert_relative_eq!(red.mean(&img, Some(&region)).unwrap(), 3.0);

        let nothing = Array2::from_elem((2, 2), false);
        assert!(red.mean(&img, Some(&nothing)).is_none());
    }

    #[test]
    fn test_zonal_budget_degrades_not_fails() {
        let img = Array2::from_elem((100, 100), 7.0f32);
        let red = ZonalReducer::new(500);
        // subsampled mean of a constant raster is still the constant
        assert_relative_eq!(red.mean(&img, None).unwrap(), 7.0);
        assert!(red.count(&img, None) <= 500);
    }

    #[test]
    fn test_percentile_interpolation() {
        let mut v = vec![1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(percentile_of(&mut v, 50.0).unwrap(), 2.5);
        assert_relative_eq!(percentile_of(&mut v, 0.0).unwrap(), 1.0);
        assert_relative_eq!(percentile_of(&mut v, 100.0).unwrap(), 4.0);
        assert!(percentile_of(&mut [], 50.0).is_none());
    }
}
