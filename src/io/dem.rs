//! Elevation mosaic assembly from 1x1 degree .hgt tiles.
//!
//! Tiles already in the cache directory are used as-is; missing tiles are
//! fetched from public mirrors (gzip or zip payloads). A tile that cannot be
//! fetched from any source leaves a NaN hole and a warning, the mosaic as a
//! whole only fails when no tile could be obtained at all.

use crate::types::{GridSpec, RasterGrid, SnowError, SnowResult};
use flate2::read::GzDecoder;
use gdal::Dataset;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

/// Geographic extent in degrees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoExtent {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

/// SRTM void value
const HGT_VOID: f32 = -32768.0;

/// Elevation tile reader with download fallback
pub struct DemReader;

impl DemReader {
    /// Platform cache directory for elevation tiles
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("snowline")
            .join("dem")
    }

    /// Names of the 1x1 degree tiles covering an extent (e.g. "N39E070")
    pub fn tiles_for(extent: &GeoExtent) -> Vec<String> {
        let mut tiles = Vec::new();
        let min_lat = extent.min_lat.floor() as i32;
        let max_lat = extent.max_lat.ceil() as i32;
        let min_lon = extent.min_lon.floor() as i32;
        let max_lon = extent.max_lon.ceil() as i32;
        for lat in min_lat..max_lat {
            for lon in min_lon..max_lon {
                tiles.push(Self::tile_name(lat, lon));
            }
        }
        log::debug!("required elevation tiles: {:?}", tiles);
        tiles
    }

    fn tile_name(lat: i32, lon: i32) -> String {
        format!(
            "{}{:02}{}{:03}",
            if lat >= 0 { "N" } else { "S" },
            lat.abs(),
            if lon >= 0 { "E" } else { "W" },
            lon.abs()
        )
    }

    /// Assemble the elevation mosaic for an extent, downloading missing
    /// tiles into `cache_dir`. Returns the mosaic on a geographic grid
    /// (EPSG:4326) at the tiles' native sampling.
    pub fn load_mosaic(extent: &GeoExtent, cache_dir: &Path) -> SnowResult<(RasterGrid, GridSpec)> {
        std::fs::create_dir_all(cache_dir)?;

        let min_lat = extent.min_lat.floor() as i32;
        let max_lat = extent.max_lat.ceil() as i32;
        let min_lon = extent.min_lon.floor() as i32;
        let max_lon = extent.max_lon.ceil() as i32;
        let lat_span = (max_lat - min_lat).max(1) as usize;
        let lon_span = (max_lon - min_lon).max(1) as usize;

        let mut samples_per_deg: Option<usize> = None;
        let mut mosaic: Option<Array2<f32>> = None;
        let mut loaded = 0usize;

        for lat in min_lat..max_lat {
            for lon in min_lon..max_lon {
                let tile = Self::tile_name(lat, lon);
                let path = match Self::ensure_tile(&tile, cache_dir)? {
                    Some(p) => p,
                    None => {
                        log::warn!("tile {} unavailable, leaving a nodata hole", tile);
                        continue;
                    }
                };
                let data = Self::read_tile(&path)?;
                let n = data.dim().0;
                let spd = *samples_per_deg.get_or_insert(n - 1);
                if n - 1 != spd {
                    return Err(SnowError::InvalidFormat(format!(
                        "tile {} sampling {} differs from mosaic sampling {}",
                        tile,
                        n - 1,
                        spd
                    )));
                }
                let grid = mosaic.get_or_insert_with(|| {
                    Array2::from_elem((lat_span * spd + 1, lon_span * spd + 1), f32::NAN)
                });

                // tile origin inside the mosaic; shared edges overwrite equal values
                let row0 = (max_lat - 1 - lat) as usize * spd;
                let col0 = (lon - min_lon) as usize * spd;
                for r in 0..n {
                    for c in 0..n {
                        grid[[row0 + r, col0 + c]] = data[[r, c]];
                    }
                }
                loaded += 1;
            }
        }

        let mosaic = mosaic.ok_or_else(|| {
            SnowError::Processing(
                "no elevation tile could be obtained from any source.\n\
                 Check the network connection or place .hgt files in the cache directory manually."
                    .to_string(),
            )
        })?;
        let spd = samples_per_deg.unwrap_or(1);
        log::info!(
            "assembled elevation mosaic from {} tiles ({} samples/degree)",
            loaded,
            spd
        );

        let grid = GridSpec {
            epsg: 4326,
            origin_x: min_lon as f64,
            origin_y: max_lat as f64,
            pixel_size: 1.0 / spd as f64,
            rows: mosaic.dim().0,
            cols: mosaic.dim().1,
        };
        Ok((mosaic, grid))
    }

    /// Read one .hgt tile; SRTM void cells become NaN
    fn read_tile(path: &Path) -> SnowResult<Array2<f32>> {
        let dataset = Dataset::open(path)?;
        let (width, height) = dataset.raster_size();
        let band = dataset.rasterband(1)?;
        let buf = band.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
        let mut data = Array2::from_shape_vec((height, width), buf.data)
            .map_err(|e| SnowError::Processing(format!("failed to reshape tile data: {}", e)))?;
        data.mapv_inplace(|v| if v == HGT_VOID { f32::NAN } else { v });
        Ok(data)
    }

    /// Return the cached tile path, downloading it when missing.
    /// Ok(None) means every source failed; the caller degrades.
    fn ensure_tile(tile: &str, cache_dir: &Path) -> SnowResult<Option<PathBuf>> {
        let path = cache_dir.join(format!("{}.hgt", tile));
        if path.exists() {
            log::debug!("tile {} already cached", tile);
            return Ok(Some(path));
        }
        for (i, url) in Self::tile_sources(tile).iter().enumerate() {
            log::info!("downloading tile {} (source {}): {}", tile, i + 1, url);
            match Self::download_tile(url, &path) {
                Ok(()) => return Ok(Some(path)),
                Err(e) => log::warn!("source {} failed for {}: {}", i + 1, tile, e),
            }
        }
        log::error!(
            "all sources failed for tile {}; download it manually to {}",
            tile,
            path.display()
        );
        Ok(None)
    }

    /// Download sources in order of preference
    fn tile_sources(tile: &str) -> Vec<String> {
        let lat_dir = &tile[0..3];
        vec![
            // AWS elevation tiles, skadi layout, no auth required
            format!(
                "https://s3.amazonaws.com/elevation-tiles-prod/skadi/{}/{}.hgt.gz",
                lat_dir, tile
            ),
            // USGS archive, zip payload
            format!(
                "https://e4ftl01.cr.usgs.gov/MEASURES/SRTMGL1.003/2000.02.11/{}.SRTMGL1.hgt.zip",
                tile
            ),
        ]
    }

    /// Fetch one payload and unpack it to `dest` through a staging temp file
    fn download_tile(url: &str, dest: &Path) -> SnowResult<()> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .user_agent("snowline/0.2.0 (Snow Processing Tool)")
            .build()
            .map_err(|e| SnowError::Processing(format!("failed to create HTTP client: {}", e)))?;

        let response = client
            .get(url)
            .send()
            .map_err(|e| SnowError::Processing(format!("HTTP request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(SnowError::Processing(format!(
                "HTTP {}: {}",
                response.status().as_u16(),
                url
            )));
        }
        let content = response
            .bytes()
            .map_err(|e| SnowError::Processing(format!("failed to read response body: {}", e)))?;
        if content.len() < 1024 {
            return Err(SnowError::Processing(format!(
                "payload too small ({} bytes), likely an error page",
                content.len()
            )));
        }

        let raw = if Self::is_gzip(&content) {
            let mut decoder = GzDecoder::new(&content[..]);
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| SnowError::Processing(format!("gzip decompression failed: {}", e)))?;
            decompressed
        } else if Self::is_zip(&content) {
            Self::extract_hgt_from_zip(&content)?
        } else {
            content.to_vec()
        };
        if raw.is_empty() {
            return Err(SnowError::Processing("extracted tile is empty".to_string()));
        }

        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        staged.write_all(&raw)?;
        staged
            .persist(dest)
            .map_err(|e| SnowError::Io(e.error))?;
        log::debug!("stored tile at {} ({} bytes)", dest.display(), raw.len());
        Ok(())
    }

    fn is_gzip(content: &[u8]) -> bool {
        content.len() >= 2 && content[0] == 0x1F && content[1] == 0x8B
    }

    fn is_zip(content: &[u8]) -> bool {
        content.len() >= 4 && content[0..4] == [0x50, 0x4B, 0x03, 0x04]
    }

    fn extract_hgt_from_zip(data: &[u8]) -> SnowResult<Vec<u8>> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))
            .map_err(|e| SnowError::Processing(format!("failed to open zip archive: {}", e)))?;
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| SnowError::Processing(format!("failed to read zip entry: {}", e)))?;
            if file.name().ends_with(".hgt") {
                let mut buffer = Vec::new();
                std::io::copy(&mut file, &mut buffer)?;
                return Ok(buffer);
            }
        }
        Err(SnowError::Processing(
            "no .hgt entry in zip archive".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_naming() {
        assert_eq!(DemReader::tile_name(39, 70), "N39E070");
        assert_eq!(DemReader::tile_name(-5, -71), "S05W071");
        assert_eq!(DemReader::tile_name(0, 0), "N00E000");
    }

    #[test]
    fn test_tiles_for_extent() {
        let extent = GeoExtent {
            min_lon: 70.2,
            max_lon: 71.8,
            min_lat: 39.1,
            max_lat: 40.5,
        };
        let tiles = DemReader::tiles_for(&extent);
        assert_eq!(tiles.len(), 4);
        assert!(tiles.contains(&"N39E070".to_string()));
        assert!(tiles.contains(&"N40E071".to_string()));
    }

    #[test]
    fn test_payload_magic_bytes() {
        assert!(DemReader::is_gzip(&[0x1F, 0x8B, 0x08, 0x00]));
        assert!(!DemReader::is_gzip(&[0x50, 0x4B, 0x03, 0x04]));
        assert!(DemReader::is_zip(&[0x50, 0x4B, 0x03, 0x04, 0x00]));
        assert!(!DemReader::is_zip(b"plain"));
    }

    #[test]
    fn test_tile_sources_prefer_skadi_layout() {
        let sources = DemReader::tile_sources("N39E070");
        assert!(sources[0].contains("/skadi/N39/N39E070.hgt.gz"));
        assert!(sources.len() >= 2);
    }
}
