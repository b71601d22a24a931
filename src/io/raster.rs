//! GeoTIFF input/output for pipeline rasters.

use crate::core::terrain::AoiContext;
use crate::types::{GridSpec, RasterGrid, SnowError, SnowResult};
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::path::Path;

/// Nodata value for exported integer elevation rasters
const EXPORT_NODATA: i32 = -9999;

/// Single-band raster reader/writer
pub struct RasterIo;

impl RasterIo {
    /// Read band 1 of a GeoTIFF into a grid; the band's nodata value maps to
    /// NaN. Non-square pixels are rejected, reprojection is not attempted.
    pub fn read_geotiff<P: AsRef<Path>>(path: P) -> SnowResult<(RasterGrid, GridSpec)> {
        log::info!("reading raster: {}", path.as_ref().display());

        let dataset = Dataset::open(path.as_ref())?;
        let geo_transform = dataset.geo_transform()?;
        let (width, height) = dataset.raster_size();
        log::debug!("raster size: {}x{}", width, height);

        let pixel_width = geo_transform[1];
        let pixel_height = -geo_transform[5];
        if (pixel_width - pixel_height).abs() > 1e-6 * pixel_width.abs() {
            return Err(SnowError::InvalidFormat(format!(
                "non-square pixels ({} x {}) are not supported",
                pixel_width, pixel_height
            )));
        }

        let band = dataset.rasterband(1)?;
        let nodata = band.no_data_value();
        let band_data = band.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

        let mut data = Array2::from_shape_vec((height, width), band_data.data)
            .map_err(|e| SnowError::Processing(format!("failed to reshape raster data: {}", e)))?;
        if let Some(nd) = nodata {
            let nd = nd as f32;
            data.mapv_inplace(|v| if v == nd { f32::NAN } else { v });
        }

        let epsg = dataset
            .spatial_ref()
            .ok()
            .and_then(|sr| sr.auth_code().ok())
            .map(|code| code as u32)
            .unwrap_or_else(|| {
                log::warn!("raster carries no EPSG authority code; projection checks degrade");
                0
            });

        let grid = GridSpec {
            epsg,
            origin_x: geo_transform[0],
            origin_y: geo_transform[3],
            pixel_size: pixel_width,
            rows: height,
            cols: width,
        };
        Ok((data, grid))
    }

    /// Export the AOI's elevation surface as an integer GeoTIFF clipped to
    /// the basin footprint (the raster download product)
    pub fn write_elevation_export<P: AsRef<Path>>(path: P, ctx: &AoiContext) -> SnowResult<()> {
        let (rows, cols) = ctx.grid.shape();
        log::info!(
            "exporting clipped elevation for '{}' to {}",
            ctx.aoi.name,
            path.as_ref().display()
        );

        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let v = ctx.elevation[[r, c]];
                if ctx.footprint[[r, c]] && !v.is_nan() {
                    data.push(v.round() as i32);
                } else {
                    data.push(EXPORT_NODATA);
                }
            }
        }

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset =
            driver.create_with_band_type::<i32, _>(path.as_ref(), cols as isize, rows as isize, 1)?;
        dataset.set_geo_transform(&[
            ctx.grid.origin_x,
            ctx.grid.pixel_size,
            0.0,
            ctx.grid.origin_y,
            0.0,
            -ctx.grid.pixel_size,
        ])?;
        if ctx.grid.epsg != 0 {
            dataset.set_spatial_ref(&SpatialRef::from_epsg(ctx.grid.epsg)?)?;
        }
        let mut band = dataset.rasterband(1)?;
        band.set_no_data_value(Some(EXPORT_NODATA as f64))?;
        let buffer = Buffer::new((cols, rows), data);
        band.write((0, 0), (cols, rows), &buffer)?;
        Ok(())
    }
}
