//! Snow-line altitude estimation by aspect.
//!
//! Boundary pixels are stratified-sampled per aspect class and reduced to
//! median / 10th-percentile elevations. Satellite imagery routinely leaves
//! one or more aspect classes without any boundary in a time window (clouds,
//! small basins, degenerate snow states), so the reducer carries a multi-tier
//! fallback: a whole-AOI override when the binary raster holds a single
//! class, then per-aspect replacement from the AOI-wide cover trend. Every
//! output always has all aspect keys; missing data stays an explicit None.

use crate::core::boundary::BoundaryDetector;
use crate::core::classify::{BinarySnow, SnowClassifier};
use crate::core::terrain::AoiContext;
use crate::raster::{class_presence, mask_where, ops::percentile_of, StratifiedSampler, ZonalReducer};
use crate::types::{Aspect, AspectStats, MaskGrid, RasterGrid, SnowResult};
use std::collections::BTreeMap;

/// Sampler/reducer parameters
#[derive(Debug, Clone)]
pub struct SnowlineParams {
    /// Seed for the stratified draws (fixed for reproducibility)
    pub sample_seed: u64,
    /// Boundary sample cap per aspect class
    pub points_per_class: usize,
    /// An aspect with fewer samples than this is a fallback candidate...
    pub min_count: usize,
    /// ...when its samples also cover less than this fraction of the AOI
    pub min_aoi_fraction: f64,
    /// Fractional cover at or above which the AOI counts as snow-bound
    pub high_cover: f64,
    /// Fractional cover at or below which the AOI counts as snow-free
    pub low_cover: f64,
    /// Pixel budget for the zonal cover reduction
    pub max_pixels: usize,
}

impl Default for SnowlineParams {
    fn default() -> Self {
        Self {
            sample_seed: 123,
            points_per_class: 500,
            min_count: 10,
            min_aoi_fraction: 0.01,
            high_cover: 0.9,
            low_cover: 0.1,
            max_pixels: 10_000_000,
        }
    }
}

/// Snow-line estimate for one image: per-aspect statistics plus the
/// whole-AOI fractional snow cover the fallback decisions were based on
#[derive(Debug, Clone)]
pub struct SnowlineEstimate {
    pub stats: AspectStats,
    pub fsc: Option<f64>,
}

/// Aspect-stratified snow-line estimator
pub struct SnowlineEstimator {
    params: SnowlineParams,
}

impl Default for SnowlineEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl SnowlineEstimator {
    pub fn new() -> Self {
        Self {
            params: SnowlineParams::default(),
        }
    }

    pub fn with_params(params: SnowlineParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SnowlineParams {
        &self.params
    }

    /// Estimate the snow line from a cleaned binary raster and its boundary
    pub fn estimate(
        &self,
        ctx: &AoiContext,
        snow: &BinarySnow,
        boundary: &MaskGrid,
    ) -> SnowlineEstimate {
        // boundary pixels with a coded aspect and a valid elevation
        let sampleable = MaskGrid::from_shape_fn(boundary.dim(), |(r, c)| {
            boundary[[r, c]] && ctx.aspect[[r, c]] > 0 && !ctx.elevation[[r, c]].is_nan()
        });
        let sampler = StratifiedSampler::new(self.params.sample_seed, self.params.points_per_class);
        let positions = sampler.sample_classes(&ctx.aspect, &sampleable);
        let samples: BTreeMap<u8, Vec<f64>> = positions
            .into_iter()
            .map(|(code, pts)| {
                let elev = pts
                    .into_iter()
                    .map(|(r, c)| ctx.elevation[[r, c]] as f64)
                    .collect();
                (code, elev)
            })
            .collect();

        let reducer = ZonalReducer::new(self.params.max_pixels);
        let fsc = reducer.mean(&snow.raster, Some(&ctx.footprint));
        let presence = class_presence(&snow.raster, &snow.valid);

        let stats = self.reduce_samples(&samples, fsc, presence, ctx);
        log::debug!(
            "snow line for '{}': fsc {:?}, medians {:?}",
            ctx.aoi.name,
            fsc,
            Aspect::ALL.map(|a| stats.get(a).median)
        );
        SnowlineEstimate { stats, fsc }
    }

    /// Reduce per-class elevation samples into the final statistic set.
    ///
    /// Applies, in order: the degenerate-AOI override (binary raster holds a
    /// single class), then the per-aspect fallback for null or thin classes.
    /// The mean-of-other-aspects replacement is taken from the statistics as
    /// sampled, before the override rewrites them.
    pub fn reduce_samples(
        &self,
        samples: &BTreeMap<u8, Vec<f64>>,
        fsc: Option<f64>,
        presence: Option<(f32, f32)>,
        ctx: &AoiContext,
    ) -> AspectStats {
        let mut stats = AspectStats::default();
        for aspect in Aspect::ALL {
            let entry = stats.get_mut(aspect);
            if let Some(elevations) = samples.get(&aspect.code()) {
                let mut values = elevations.clone();
                entry.count = values.len();
                entry.median = percentile_of(&mut values, 50.0);
                entry.p10 = percentile_of(&mut values, 10.0);
            }
        }

        let sampled_mean = stats.mean_of_medians();

        // degenerate AOI: boundary statistics are untrustworthy when only one
        // class is present, pin the snow line to the terrain bounds instead
        if let Some((present_min, present_max)) = presence {
            if present_min == 1.0 {
                log::debug!("AOI holds snow only; snow line at terrain minimum");
                stats.set_all_medians(ctx.fallback_min);
            } else if present_max == 0.0 {
                log::debug!("AOI holds no snow; snow line at terrain maximum");
                stats.set_all_medians(ctx.fallback_max);
            }
        }

        let replacement = match fsc {
            None => None,
            Some(f) if f >= self.params.high_cover => ctx.fallback_min,
            Some(f) if f <= self.params.low_cover => ctx.fallback_max,
            Some(_) => sampled_mean,
        };

        for aspect in Aspect::ALL {
            let entry = stats.get_mut(aspect);
            let fraction = if ctx.n_grid > 0 {
                entry.count as f64 / ctx.n_grid as f64
            } else {
                f64::INFINITY
            };
            if entry.median.is_none()
                || (entry.count < self.params.min_count && fraction < self.params.min_aoi_fraction)
            {
                entry.median = replacement;
            }
        }
        stats
    }
}

/// The elevation surface masked to the detected snow line (map display and
/// raster export product)
pub fn snowline_elevation_raster(ctx: &AoiContext, boundary: &MaskGrid) -> RasterGrid {
    mask_where(&ctx.elevation, boundary)
}

/// The full per-image pipeline: classify, sieve, detect, estimate
pub struct SlaPipeline {
    pub classifier: SnowClassifier,
    pub detector: BoundaryDetector,
    pub estimator: SnowlineEstimator,
}

impl Default for SlaPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl SlaPipeline {
    pub fn new() -> Self {
        Self {
            classifier: SnowClassifier::new(),
            detector: BoundaryDetector::new(),
            estimator: SnowlineEstimator::new(),
        }
    }

    /// Run the pipeline for one fractional snow raster on the context grid
    pub fn run(&self, ctx: &AoiContext, fsc: &RasterGrid) -> SnowResult<SnowlineEstimate> {
        let snow = self.classifier.classify(fsc, ctx)?;
        let boundary = self.detector.detect(&snow);
        Ok(self.estimator.estimate(ctx, &snow, &boundary))
    }
}
