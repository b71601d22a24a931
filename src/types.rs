use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Continuous raster values (elevation, snow fraction)
pub type RasterValue = f32;

/// 2D raster grid (row x col); NaN marks nodata
pub type RasterGrid = Array2<f32>;

/// Boolean region mask (true = inside/valid)
pub type MaskGrid = Array2<bool>;

/// Coded class raster; 0 marks nodata
pub type ClassGrid = Array2<u8>;

/// Terrain aspect classes, binned into quadrants plus a catch-all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aspect {
    East,
    North,
    South,
    West,
    Mixed,
}

impl Aspect {
    /// All classes, in code order
    pub const ALL: [Aspect; 5] = [
        Aspect::East,
        Aspect::North,
        Aspect::South,
        Aspect::West,
        Aspect::Mixed,
    ];

    /// The four directional classes (excludes Mixed)
    pub const DIRECTIONAL: [Aspect; 4] =
        [Aspect::East, Aspect::North, Aspect::South, Aspect::West];

    /// Raster class code (East=1, North=2, South=3, West=4, Mixed=5)
    pub fn code(self) -> u8 {
        match self {
            Aspect::East => 1,
            Aspect::North => 2,
            Aspect::South => 3,
            Aspect::West => 4,
            Aspect::Mixed => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Aspect> {
        match code {
            1 => Some(Aspect::East),
            2 => Some(Aspect::North),
            3 => Some(Aspect::South),
            4 => Some(Aspect::West),
            5 => Some(Aspect::Mixed),
            _ => None,
        }
    }

    /// Bin a compass aspect (degrees, 0 = north, clockwise) into a quadrant.
    ///
    /// Boundaries at 45/135/225/315 degrees are inclusive on the lower bound
    /// and exclusive on the upper: North covers (315, 360] and [0, 45].
    pub fn from_degrees(degrees: f32) -> Aspect {
        let d = degrees.rem_euclid(360.0);
        if d > 45.0 && d <= 135.0 {
            Aspect::East
        } else if d > 135.0 && d <= 225.0 {
            Aspect::South
        } else if d > 225.0 && d <= 315.0 {
            Aspect::West
        } else {
            Aspect::North
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Aspect::East => "East",
            Aspect::North => "North",
            Aspect::South => "South",
            Aspect::West => "West",
            Aspect::Mixed => "mixed",
        }
    }
}

impl std::fmt::Display for Aspect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Elevation statistics at the snow boundary for one aspect class
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AspectStat {
    /// Median boundary elevation (meters); None when no data
    pub median: Option<f64>,
    /// 10th-percentile boundary elevation (meters)
    pub p10: Option<f64>,
    /// Number of boundary samples in this class
    pub count: usize,
}

/// Per-aspect boundary elevation statistics; every class always present
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AspectStats {
    entries: [AspectStat; 5],
}

impl AspectStats {
    pub fn get(&self, aspect: Aspect) -> &AspectStat {
        &self.entries[aspect.code() as usize - 1]
    }

    pub fn get_mut(&mut self, aspect: Aspect) -> &mut AspectStat {
        &mut self.entries[aspect.code() as usize - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Aspect, &AspectStat)> {
        Aspect::ALL.iter().map(move |&a| (a, self.get(a)))
    }

    /// Replace every class median with the same value
    pub fn set_all_medians(&mut self, value: Option<f64>) {
        for entry in self.entries.iter_mut() {
            entry.median = value;
        }
    }

    /// Mean of the non-null medians over all five classes
    pub fn mean_of_medians(&self) -> Option<f64> {
        let valid: Vec<f64> = self.entries.iter().filter_map(|e| e.median).collect();
        if valid.is_empty() {
            None
        } else {
            Some(valid.iter().sum::<f64>() / valid.len() as f64)
        }
    }
}

/// One snow-line record for a basin and date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaRecord {
    pub date: NaiveDate,
    pub east: Option<f64>,
    pub north: Option<f64>,
    pub south: Option<f64>,
    pub west: Option<f64>,
}

impl SlaRecord {
    pub fn from_stats(date: NaiveDate, stats: &AspectStats) -> Self {
        Self {
            date,
            east: stats.get(Aspect::East).median,
            north: stats.get(Aspect::North).median,
            south: stats.get(Aspect::South).median,
            west: stats.get(Aspect::West).median,
        }
    }

    pub fn get(&self, aspect: Aspect) -> Option<f64> {
        match aspect {
            Aspect::East => self.east,
            Aspect::North => self.north,
            Aspect::South => self.south,
            Aspect::West => self.west,
            Aspect::Mixed => None,
        }
    }

    /// Basin-average snow-line altitude: mean of the non-null directional
    /// values, None when all four are missing
    pub fn value(&self) -> Option<f64> {
        let valid: Vec<f64> = [self.east, self.north, self.south, self.west]
            .into_iter()
            .flatten()
            .collect();
        if valid.is_empty() {
            None
        } else {
            Some(valid.iter().sum::<f64>() / valid.len() as f64)
        }
    }
}

/// Glacier snow-cover metrics for one basin and date
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GlacierMetrics {
    /// Fraction of the glacier footprint classified as snow
    pub fsc: Option<f64>,
    /// Snow fraction over the glacier below the estimated snow line
    pub fsc_below_sl: Option<f64>,
    /// Glacier area below the estimated snow line (square kilometers)
    pub area_below_sl_km2: Option<f64>,
}

/// Projected bounding box (working-grid coordinates)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// Raster georeferencing: origin, pixel size, CRS and shape.
///
/// All rasters of one pipeline run must share a single reference grid, fixed
/// from the first snow raster processed; a mismatch is a projection error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// EPSG code of the coordinate reference system
    pub epsg: u32,
    /// X coordinate of the top-left corner
    pub origin_x: f64,
    /// Y coordinate of the top-left corner
    pub origin_y: f64,
    /// Square pixel size in CRS units
    pub pixel_size: f64,
    pub rows: usize,
    pub cols: usize,
}

impl GridSpec {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Area of one pixel in square kilometers (meter-based CRS assumed)
    pub fn pixel_area_km2(&self) -> f64 {
        self.pixel_size * self.pixel_size * 1e-6
    }

    /// Center coordinates of a cell
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_size,
            self.origin_y - (row as f64 + 0.5) * self.pixel_size,
        )
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox {
            min_x: self.origin_x,
            max_x: self.origin_x + self.cols as f64 * self.pixel_size,
            min_y: self.origin_y - self.rows as f64 * self.pixel_size,
            max_y: self.origin_y,
        }
    }

    /// Check that a raster array matches this grid's shape
    pub fn check_shape(&self, data: &RasterGrid) -> SnowResult<()> {
        if data.dim() != self.shape() {
            return Err(SnowError::Projection(format!(
                "raster shape {:?} does not match grid {}x{}",
                data.dim(),
                self.rows,
                self.cols
            )));
        }
        Ok(())
    }

    /// Integer aggregation factor from this (finer) grid to a coarser one.
    ///
    /// Both grids must share the CRS and the pixel-size ratio must be a whole
    /// number; anything else is a projection error, never silently resampled.
    pub fn aggregation_factor(&self, coarser: &GridSpec) -> SnowResult<usize> {
        if self.epsg != coarser.epsg {
            return Err(SnowError::Projection(format!(
                "CRS mismatch: EPSG:{} vs EPSG:{}",
                self.epsg, coarser.epsg
            )));
        }
        let ratio = coarser.pixel_size / self.pixel_size;
        let factor = ratio.round();
        if factor < 1.0 || (ratio - factor).abs() > 1e-6 {
            return Err(SnowError::Projection(format!(
                "pixel sizes {} and {} have no integer aggregation factor",
                self.pixel_size, coarser.pixel_size
            )));
        }
        Ok(factor as usize)
    }

    /// The grid refined by an integer factor over the same extent
    pub fn refine(&self, factor: usize) -> GridSpec {
        GridSpec {
            epsg: self.epsg,
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            pixel_size: self.pixel_size / factor as f64,
            rows: self.rows * factor,
            cols: self.cols * factor,
        }
    }
}

/// A basin/region polygon in working-grid coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    /// Exterior ring; closing vertex optional
    pub exterior: Vec<(f64, f64)>,
}

impl Polygon {
    pub fn new(exterior: Vec<(f64, f64)>) -> Self {
        Self { exterior }
    }

    /// Even-odd ray casting point-in-polygon test
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let pts = &self.exterior;
        let n = pts.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = pts[i];
            let (xj, yj) = pts[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    pub fn centroid(&self) -> (f64, f64) {
        let n = self.exterior.len().max(1) as f64;
        let (sx, sy) = self
            .exterior
            .iter()
            .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
        (sx / n, sy / n)
    }

    pub fn bbox(&self) -> BoundingBox {
        let mut bb = BoundingBox {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for &(x, y) in &self.exterior {
            bb.min_x = bb.min_x.min(x);
            bb.max_x = bb.max_x.max(x);
            bb.min_y = bb.min_y.min(y);
            bb.max_y = bb.max_y.max(y);
        }
        bb
    }
}

/// Named area of interest (river basin or region)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aoi {
    pub name: String,
    pub polygon: Polygon,
}

/// Error types for snow processing
#[derive(Debug, thiserror::Error)]
pub enum SnowError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for snow operations
pub type SnowResult<T> = Result<T, SnowError>;
