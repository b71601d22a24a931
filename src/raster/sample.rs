//! Seeded stratified sampling over class rasters.
//!
//! Draws are reproducible: a fixed seed yields the same sample for the same
//! raster, independent of platform or thread count.

use crate::types::{ClassGrid, MaskGrid, RasterGrid};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Stratified sampler with a per-class point cap
#[derive(Debug, Clone)]
pub struct StratifiedSampler {
    pub seed: u64,
    pub points_per_class: usize,
}

impl StratifiedSampler {
    pub fn new(seed: u64, points_per_class: usize) -> Self {
        Self {
            seed,
            points_per_class,
        }
    }

    /// Sample up to `points_per_class` pixel positions per class code.
    ///
    /// Code 0 (nodata) is never sampled. Classes are drawn in ascending code
    /// order from one seeded generator, so results are deterministic.
    pub fn sample_classes(
        &self,
        classes: &ClassGrid,
        valid: &MaskGrid,
    ) -> BTreeMap<u8, Vec<(usize, usize)>> {
        let mut pools: BTreeMap<u8, Vec<(usize, usize)>> = BTreeMap::new();
        for ((r, c), &code) in classes.indexed_iter() {
            if code > 0 && valid[[r, c]] {
                pools.entry(code).or_default().push((r, c));
            }
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        for pool in pools.values_mut() {
            pool.shuffle(&mut rng);
            pool.truncate(self.points_per_class);
        }
        pools
    }
}

/// Distinct finite values present in a raster within a mask, as (min, max).
///
/// Used as the class-presence probe on binary snow rasters: (1, 1) means the
/// region is snow only, (0, 0) no-snow only, (0, 1) both classes present,
/// None no valid pixels at all.
pub fn class_presence(img: &RasterGrid, mask: &MaskGrid) -> Option<(f32, f32)> {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut any = false;
    for ((r, c), &v) in img.indexed_iter() {
        if !mask[[r, c]] || v.is_nan() {
            continue;
        }
        any = true;
        min = min.min(v);
        max = max.max(v);
    }
    if any {
        Some((min, max))
    } else {
        None
    }
}
