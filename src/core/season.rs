//! Seasonal snow metrics: first day without snow, the analysis mask that
//! screens it, per-pixel trends and basin-mean series for charting.

use crate::core::assembler::TimeStep;
use crate::raster::ZonalReducer;
use crate::types::{MaskGrid, RasterGrid};
use chrono::Datelike;
use chrono::NaiveDate;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Screening parameters for the first-day-of-no-snow analysis mask
#[derive(Debug, Clone)]
pub struct AnalysisMaskParams {
    /// Snow fraction (0-100) above which a day counts as snow covered
    pub snow_fraction: f32,
    /// Ephemeral screen: minimum share of observed days with snow
    pub min_snow_day_share: f64,
    /// Constant screen: maximum snow days within any calendar year
    pub max_snow_days: usize,
}

impl Default for AnalysisMaskParams {
    fn default() -> Self {
        Self {
            snow_fraction: 10.0,
            min_snow_day_share: 0.04,
            max_snow_days: 200,
        }
    }
}

/// Per-pixel day of year (counted from zero) of the first observation with
/// no snow at all; NaN where the pixel never clears or has no valid data.
///
/// Steps are scanned in date order regardless of input order.
pub fn first_day_of_no_snow(steps: &[TimeStep], mask: Option<&MaskGrid>) -> RasterGrid {
    let mut order: Vec<usize> = (0..steps.len()).collect();
    order.sort_by_key(|&i| steps[i].date);

    let shape = match steps.first() {
        Some(s) => s.fsc.dim(),
        None => return Array2::from_elem((0, 0), f32::NAN),
    };
    let mut out = Array2::from_elem(shape, f32::NAN);
    for ((r, c), v) in out.indexed_iter_mut() {
        if let Some(m) = mask {
            if !m[[r, c]] {
                continue;
            }
        }
        for &i in &order {
            let obs = steps[i].fsc[[r, c]];
            if obs.is_nan() {
                continue;
            }
            if obs == 0.0 {
                *v = steps[i].date.ordinal0() as f32;
                break;
            }
        }
    }
    out
}

/// Screen out pixels where a first-no-snow day is meaningless: ephemeral
/// snow (too few snow days overall) and constant snow (a calendar year
/// essentially never clearing). Optionally intersected with a water mask.
pub fn analysis_mask(
    steps: &[TimeStep],
    params: &AnalysisMaskParams,
    water: Option<&MaskGrid>,
) -> MaskGrid {
    let shape = match steps.first() {
        Some(s) => s.fsc.dim(),
        None => return Array2::from_elem((0, 0), false),
    };
    let mut out = Array2::from_elem(shape, false);
    for ((r, c), keep) in out.indexed_iter_mut() {
        if let Some(w) = water {
            if !w[[r, c]] {
                continue;
            }
        }
        let mut observed = 0usize;
        let mut snow_days = 0usize;
        let mut per_year: BTreeMap<i32, usize> = BTreeMap::new();
        for step in steps {
            let v = step.fsc[[r, c]];
            if v.is_nan() {
                continue;
            }
            observed += 1;
            if v >= params.snow_fraction {
                snow_days += 1;
                *per_year.entry(step.date.year()).or_insert(0) += 1;
            }
        }
        if observed == 0 {
            continue;
        }
        let ephemeral = (snow_days as f64 / observed as f64) < params.min_snow_day_share;
        let constant = per_year.values().any(|&n| n > params.max_snow_days);
        *keep = !ephemeral && !constant;
    }
    out
}

/// Per-pixel least-squares slope of an annual value against the year.
///
/// NaN where fewer than two years have a finite value.
pub fn trend_slope(annual: &[(i32, RasterGrid)]) -> RasterGrid {
    let shape = match annual.first() {
        Some((_, img)) => img.dim(),
        None => return Array2::from_elem((0, 0), f32::NAN),
    };
    let mut out = Array2::from_elem(shape, f32::NAN);
    for ((r, c), v) in out.indexed_iter_mut() {
        let pts: Vec<(f64, f64)> = annual
            .iter()
            .filter_map(|(year, img)| {
                let obs = img[[r, c]];
                if obs.is_nan() {
                    None
                } else {
                    Some((*year as f64, obs as f64))
                }
            })
            .collect();
        if pts.len() < 2 {
            continue;
        }
        let n = pts.len() as f64;
        let sx: f64 = pts.iter().map(|p| p.0).sum();
        let sy: f64 = pts.iter().map(|p| p.1).sum();
        let sxx: f64 = pts.iter().map(|p| p.0 * p.0).sum();
        let sxy: f64 = pts.iter().map(|p| p.0 * p.1).sum();
        let denom = n * sxx - sx * sx;
        if denom.abs() > f64::EPSILON {
            *v = ((n * sxy - sx * sy) / denom) as f32;
        }
    }
    out
}

/// Date-keyed basin mean of a raster stack (exact zonal reduction)
pub fn basin_mean_series(
    steps: &[TimeStep],
    region: &MaskGrid,
    reducer: &ZonalReducer,
) -> Vec<(NaiveDate, Option<f64>)> {
    steps
        .iter()
        .map(|step| (step.date, reducer.mean(&step.fsc, Some(region))))
        .collect()
}

/// Basin mean over a fixed seeded pixel sample.
///
/// The cheap variant for very large basins: one sample of positions is drawn
/// once and reused for every step, so the series stays internally
/// consistent while bounding the per-step cost.
pub fn sampled_mean_series(
    steps: &[TimeStep],
    region: &MaskGrid,
    num_pixels: usize,
    seed: u64,
) -> Vec<(NaiveDate, Option<f64>)> {
    let mut positions: Vec<(usize, usize)> = region
        .indexed_iter()
        .filter_map(|((r, c), &inside)| if inside { Some((r, c)) } else { None })
        .collect();
    let mut rng = StdRng::seed_from_u64(seed);
    positions.shuffle(&mut rng);
    positions.truncate(num_pixels);

    steps
        .iter()
        .map(|step| {
            let values: Vec<f64> = positions
                .iter()
                .map(|&(r, c)| step.fsc[[r, c]])
                .filter(|v| !v.is_nan())
                .map(|v| v as f64)
                .collect();
            let mean = if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            };
            (step.date, mean)
        })
        .collect()
}
