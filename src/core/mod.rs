//! Core snow processing modules

pub mod assembler;
pub mod boundary;
pub mod classify;
pub mod glacier;
pub mod season;
pub mod snowline;
pub mod terrain;

// Re-export main types
pub use assembler::{SeriesAssembler, TimeStep};
pub use boundary::{BoundaryDetector, BoundaryParams};
pub use classify::{BinarySnow, ClassifierParams, SnowClassifier};
pub use glacier::{GlacierOverlay, GlacierParams};
pub use season::{
    analysis_mask, basin_mean_series, first_day_of_no_snow, sampled_mean_series, trend_slope,
    AnalysisMaskParams,
};
pub use snowline::{
    snowline_elevation_raster, SlaPipeline, SnowlineEstimate, SnowlineEstimator, SnowlineParams,
};
pub use terrain::{AoiContext, TerrainFine, TerrainParams, TerrainPreprocessor};
