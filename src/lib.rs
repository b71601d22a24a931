//! Snowline: A Fast, Modular Snow-Line Altitude Processor
//!
//! This library computes basin-scale snow metrics from satellite snow-cover
//! time series: fractional snow cover, first day without snow, and the
//! snow-line altitude stratified by terrain aspect, with glacier overlays
//! and an incrementally assembled per-basin time series.

pub mod core;
pub mod io;
pub mod raster;
pub mod session;
pub mod types;

// Re-export main types and functions for easier access
pub use types::{
    Aoi, Aspect, AspectStat, AspectStats, BoundingBox, GlacierMetrics, GridSpec, MaskGrid,
    Polygon, RasterGrid, SlaRecord, SnowError, SnowResult,
};

pub use core::{
    AoiContext, BoundaryDetector, GlacierOverlay, SeriesAssembler, SlaPipeline, SnowClassifier,
    SnowlineEstimate, SnowlineEstimator, TerrainPreprocessor, TimeStep,
};

pub use io::{DemReader, RasterIo, SlaStore};
pub use session::{GenerationCounter, Latest, RequestToken};
