//! Input/output: GeoTIFF rasters, elevation tiles and the persisted
//! snow-line store.

pub mod dem;
pub mod raster;
pub mod store;

pub use dem::{DemReader, GeoExtent};
pub use raster::RasterIo;
pub use store::SlaStore;
