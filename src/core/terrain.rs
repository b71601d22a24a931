//! Terrain preprocessing for an area of interest.
//!
//! Derives the working-scale elevation surface, the four-class aspect raster
//! and the per-aspect elevation fallback bounds. All of it is invariant per
//! AOI and bundled into an immutable context that the per-image stages take
//! by reference; nothing here is recomputed per date.

use crate::raster::{aggregate_mean, aggregate_mode, rasterize, ZonalReducer};
use crate::types::{
    Aoi, Aspect, ClassGrid, GridSpec, MaskGrid, RasterGrid, SnowError, SnowResult,
};
use ndarray::Array2;

/// Terrain preprocessing parameters
#[derive(Debug, Clone)]
pub struct TerrainParams {
    /// Pixel budget for the elevation reductions
    pub max_pixels: usize,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            max_pixels: 10_000_000,
        }
    }
}

/// Everything derived from one AOI selection, reused across all time steps.
///
/// Immutable once built; replaced wholesale when the user selects another
/// basin. The fallback elevations are single scalars replicated across the
/// aspect classes, matching the elevation analysis they come from.
#[derive(Debug, Clone)]
pub struct AoiContext {
    pub aoi: Aoi,
    /// Working (reference) grid all pipeline rasters must match
    pub grid: GridSpec,
    /// AOI footprint on the working grid
    pub footprint: MaskGrid,
    /// Mean-aggregated elevation surface on the working grid
    pub elevation: RasterGrid,
    /// Coded aspect classes on the working grid (0 = nodata)
    pub aspect: ClassGrid,
    /// Lowest elevation inside the AOI; None for an empty AOI
    pub fallback_min: Option<f64>,
    /// Highest elevation inside the AOI; None for an empty AOI
    pub fallback_max: Option<f64>,
    /// Count of valid elevation pixels inside the AOI at working scale
    pub n_grid: usize,
}

/// Native-resolution terrain products for fine-scale overlays
#[derive(Debug, Clone)]
pub struct TerrainFine {
    pub grid: GridSpec,
    pub elevation: RasterGrid,
    pub aspect: ClassGrid,
}

/// Terrain preprocessor
pub struct TerrainPreprocessor {
    params: TerrainParams,
}

impl Default for TerrainPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl TerrainPreprocessor {
    pub fn new() -> Self {
        Self {
            params: TerrainParams::default(),
        }
    }

    pub fn with_params(params: TerrainParams) -> Self {
        Self { params }
    }

    /// Build the AOI context from a native-resolution elevation mosaic.
    ///
    /// Elevation is mean-aggregated to the working grid; aspect is computed
    /// at native resolution, binned into quadrants and mode-aggregated, so
    /// coarse cells inherit the dominant fine-scale facing rather than the
    /// aspect of an averaged surface.
    pub fn build_context(
        &self,
        aoi: Aoi,
        dem: &RasterGrid,
        dem_grid: &GridSpec,
        working: &GridSpec,
    ) -> SnowResult<AoiContext> {
        dem_grid.check_shape(dem)?;
        let factor = dem_grid.aggregation_factor(working)?;
        if dem_grid.rows != working.rows * factor || dem_grid.cols != working.cols * factor {
            return Err(SnowError::Projection(format!(
                "elevation grid {}x{} does not cover the working grid {}x{} at factor {}",
                dem_grid.rows, dem_grid.cols, working.rows, working.cols, factor
            )));
        }
        if (dem_grid.origin_x - working.origin_x).abs() > 1e-3
            || (dem_grid.origin_y - working.origin_y).abs() > 1e-3
        {
            return Err(SnowError::Projection(
                "elevation and working grids are not co-registered".to_string(),
            ));
        }

        log::info!(
            "building terrain context for '{}' ({}x{} native -> {}x{} working, factor {})",
            aoi.name,
            dem_grid.rows,
            dem_grid.cols,
            working.rows,
            working.cols,
            factor
        );

        let elevation = aggregate_mean(dem, factor)?;
        let native_codes = aspect_codes(dem, dem_grid.pixel_size);
        let aspect = aggregate_mode(&native_codes, factor, Aspect::Mixed.code())?;
        let footprint = rasterize(&aoi.polygon, working);

        let reducer = ZonalReducer::new(self.params.max_pixels);
        let fallback_min = reducer.min(&elevation, Some(&footprint));
        let fallback_max = reducer.max(&elevation, Some(&footprint));
        let n_grid = reducer.count(&elevation, Some(&footprint));

        if n_grid == 0 {
            log::warn!("AOI '{}' has no valid elevation pixels", aoi.name);
        } else {
            log::debug!(
                "AOI '{}': {} grid cells, elevation range {:?}..{:?}",
                aoi.name,
                n_grid,
                fallback_min,
                fallback_max
            );
        }

        Ok(AoiContext {
            aoi,
            grid: working.clone(),
            footprint,
            elevation,
            aspect,
            fallback_min,
            fallback_max,
            n_grid,
        })
    }

    /// Native-resolution elevation and aspect for fine-scale glacier overlays
    pub fn fine_products(&self, dem: &RasterGrid, dem_grid: &GridSpec) -> SnowResult<TerrainFine> {
        dem_grid.check_shape(dem)?;
        Ok(TerrainFine {
            grid: dem_grid.clone(),
            elevation: dem.clone(),
            aspect: aspect_codes(dem, dem_grid.pixel_size),
        })
    }
}

/// Compass aspect (degrees clockwise from north) of each cell, Horn's method.
///
/// Flat cells resolve to 0 degrees and therefore the North bin, as in the
/// upstream terrain operator. Edge neighbors are clamped; NaN neighbors fall
/// back to the center value.
pub fn aspect_degrees(dem: &RasterGrid, cell_size: f64) -> RasterGrid {
    let (rows, cols) = dem.dim();
    let mut out = Array2::from_elem((rows, cols), f32::NAN);
    for r in 0..rows {
        for c in 0..cols {
            let center = dem[[r, c]];
            if center.is_nan() {
                continue;
            }
            let at = |dr: isize, dc: isize| -> f64 {
                let rr = (r as isize + dr).clamp(0, rows as isize - 1) as usize;
                let cc = (c as isize + dc).clamp(0, cols as isize - 1) as usize;
                let v = dem[[rr, cc]];
                if v.is_nan() {
                    center as f64
                } else {
                    v as f64
                }
            };
            let denom = 8.0 * cell_size;
            // elevation change per meter toward east / toward south
            let g_east = ((at(-1, 1) + 2.0 * at(0, 1) + at(1, 1))
                - (at(-1, -1) + 2.0 * at(0, -1) + at(1, -1)))
                / denom;
            let g_south = ((at(1, -1) + 2.0 * at(1, 0) + at(1, 1))
                - (at(-1, -1) + 2.0 * at(-1, 0) + at(-1, 1)))
                / denom;
            // downhill direction, compass convention
            let azimuth = (-g_east).atan2(g_south).to_degrees();
            out[[r, c]] = azimuth.rem_euclid(360.0) as f32;
        }
    }
    out
}

/// Native aspect classes (coded); 0 where elevation is nodata
pub fn aspect_codes(dem: &RasterGrid, cell_size: f64) -> ClassGrid {
    let degrees = aspect_degrees(dem, cell_size);
    degrees.mapv(|d| {
        if d.is_nan() {
            0
        } else {
            Aspect::from_degrees(d).code()
        }
    })
}
