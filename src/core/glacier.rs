//! Glacier snow-cover metrics against the estimated snow line.
//!
//! Computed on a finer grid than the working scale (nominally the 30 m
//! elevation class) for area precision: glacier outlines are small relative
//! to the snow raster cells.

use crate::core::classify::BinarySnow;
use crate::core::terrain::{AoiContext, TerrainFine};
use crate::raster::{upsample_nearest, ZonalReducer};
use crate::types::{
    Aspect, AspectStats, GlacierMetrics, MaskGrid, RasterGrid, SnowResult,
};

/// Glacier overlay parameters
#[derive(Debug, Clone)]
pub struct GlacierParams {
    /// Pixel budget for the fine-scale reductions
    pub max_pixels: usize,
}

impl Default for GlacierParams {
    fn default() -> Self {
        Self {
            max_pixels: 10_000_000,
        }
    }
}

/// Glacier overlay processor
pub struct GlacierOverlay {
    params: GlacierParams,
}

impl Default for GlacierOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl GlacierOverlay {
    pub fn new() -> Self {
        Self {
            params: GlacierParams::default(),
        }
    }

    pub fn with_params(params: GlacierParams) -> Self {
        Self { params }
    }

    /// Compute glacier metrics for one date.
    ///
    /// `glacier` is the rasterized glacier footprint on the fine grid. A
    /// pixel stays "below the snow line" unless its elevation exceeds the
    /// estimate for its own aspect class; aspects without an estimate remove
    /// nothing. Both below-snow-line members are None when no directional
    /// aspect has an estimate at all.
    pub fn metrics(
        &self,
        ctx: &AoiContext,
        stats: &AspectStats,
        snow: &BinarySnow,
        glacier: &MaskGrid,
        fine: &TerrainFine,
    ) -> SnowResult<GlacierMetrics> {
        let factor = fine.grid.aggregation_factor(&ctx.grid)?;
        if glacier.dim() != fine.grid.shape() {
            return Err(crate::types::SnowError::Projection(format!(
                "glacier mask shape {:?} does not match the fine grid {:?}",
                glacier.dim(),
                fine.grid.shape()
            )));
        }

        let snow_fine = upsample_nearest(&snow.raster, factor);

        // snow value over the glacier footprint, nodata elsewhere
        let glacier_scf = RasterGrid::from_shape_fn(glacier.dim(), |(r, c)| {
            if glacier[[r, c]] {
                snow_fine[[r, c]]
            } else {
                f32::NAN
            }
        });

        let reducer = ZonalReducer::new(self.params.max_pixels);
        let fsc = reducer.mean(&glacier_scf, None);

        // remove pixels above their own aspect's snow line
        let mut below = glacier_scf;
        for aspect in Aspect::ALL {
            let threshold = match stats.get(aspect).median {
                Some(t) => t,
                None => continue,
            };
            let code = aspect.code();
            for ((r, c), v) in below.indexed_iter_mut() {
                if !v.is_nan()
                    && fine.aspect[[r, c]] == code
                    && fine.elevation[[r, c]] as f64 > threshold
                {
                    *v = f32::NAN;
                }
            }
        }

        let undetermined = Aspect::DIRECTIONAL
            .iter()
            .all(|&a| stats.get(a).median.is_none());
        let remaining = reducer.count(&below, None);
        let (fsc_below_sl, area_below_sl_km2) = if undetermined || remaining == 0 {
            (None, None)
        } else {
            let area = remaining as f64 * fine.grid.pixel_area_km2();
            (reducer.mean(&below, None), Some(area))
        };

        log::debug!(
            "glacier metrics for '{}': fsc {:?}, below-SL fsc {:?}, below-SL area {:?} km2",
            ctx.aoi.name,
            fsc,
            fsc_below_sl,
            area_below_sl_km2
        );

        Ok(GlacierMetrics {
            fsc,
            fsc_below_sl,
            area_below_sl_km2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::terrain::TerrainPreprocessor;
    use crate::types::{Aoi, AspectStat, GridSpec, Polygon};
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn setup() -> (AoiContext, TerrainFine) {
        let pixel = 500.0;
        let working = GridSpec {
            epsg: 32642,
            origin_x: 0.0,
            origin_y: 10.0 * pixel,
            pixel_size: pixel,
            rows: 10,
            cols: 10,
        };
        let dem = Array2::from_shape_fn((10, 10), |(r, _)| 1000.0 + r as f32 * 100.0);
        let aoi = Aoi {
            name: "glacier-test".into(),
            polygon: Polygon::new(vec![(0.0, 0.0), (5000.0, 0.0), (5000.0, 5000.0), (0.0, 5000.0)]),
        };
        let pre = TerrainPreprocessor::new();
        let ctx = pre
            .build_context(aoi, &dem, &working.clone(), &working)
            .unwrap();
        let fine = pre.fine_products(&dem, &working).unwrap();
        (ctx, fine)
    }

    fn stats_with_north(median: Option<f64>) -> AspectStats {
        let mut stats = AspectStats::default();
        *stats.get_mut(Aspect::North) = AspectStat {
            median,
            p10: None,
            count: 42,
        };
        stats
    }

    #[test]
    fn test_glacier_metrics_below_snow_line() {
        let (ctx, fine) = setup();
        // snow in the four northernmost rows only
        let raster = Array2::from_shape_fn((10, 10), |(r, _)| if r < 5 { 1.0 } else { 0.0 });
        let valid = Array2::from_elem((10, 10), true);
        let snow = BinarySnow { raster, valid };
        // glacier spans rows 4..8
        let glacier = MaskGrid::from_shape_fn((10, 10), |(r, _)| (4..8).contains(&r));
        // the whole surface faces north; snow line at 1500 m keeps rows <= 5
        let stats = stats_with_north(Some(1500.0));

        let metrics = GlacierOverlay::new()
            .metrics(&ctx, &stats, &snow, &glacier, &fine)
            .unwrap();
        assert_relative_eq!(metrics.fsc.unwrap(), 0.25);
        assert_relative_eq!(metrics.fsc_below_sl.unwrap(), 0.5);
        assert_relative_eq!(metrics.area_below_sl_km2.unwrap(), 20.0 * 0.25);
    }

    #[test]
    fn test_undetermined_snow_line_yields_null_metrics() {
        let (ctx, fine) = setup();
        let raster = Array2::from_elem((10, 10), 1.0f32);
        let valid = Array2::from_elem((10, 10), true);
        let snow = BinarySnow { raster, valid };
        let glacier = MaskGrid::from_shape_fn((10, 10), |(r, _)| r < 3);
        let stats = stats_with_north(None);

        let metrics = GlacierOverlay::new()
            .metrics(&ctx, &stats, &snow, &glacier, &fine)
            .unwrap();
        assert!(metrics.fsc.is_some());
        assert_eq!(metrics.fsc_below_sl, None);
        assert_eq!(metrics.area_below_sl_km2, None);
    }

    #[test]
    fn test_empty_glacier_set_is_null_not_zero() {
        let (ctx, fine) = setup();
        let raster = Array2::from_elem((10, 10), 1.0f32);
        let valid = Array2::from_elem((10, 10), true);
        let snow = BinarySnow { raster, valid };
        let glacier = Array2::from_elem((10, 10), false);
        let stats = stats_with_north(Some(2000.0));

        let metrics = GlacierOverlay::new()
            .metrics(&ctx, &stats, &snow, &glacier, &fine)
            .unwrap();
        assert_eq!(metrics.fsc, None);
        assert_eq!(metrics.fsc_below_sl, None);
        assert_eq!(metrics.area_below_sl_km2, None);
    }
}
