//! # wxkrige core
//!
//! Core types and I/O for interpolating daily station observations onto a
//! polygon grid.
//!
//! This crate provides:
//! - `Raster<T>`: Generic raster grid type
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `PredictionLattice`: Regular sample-point lattice over the grid extent
//! - `CRS` and `Projection`: Working coordinate system and lon/lat projection
//! - `GridDefinition`: The polygon mesh results are aggregated onto
//! - `StationDataset`: Daily station observations with projected coordinates
//! - I/O for station CSV, grid GeoJSON, result tables and GeoTIFF surfaces

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod station;
pub mod vector;

pub use crs::{CRS, Projection};
pub use error::{Error, Result};
pub use raster::{GeoTransform, PredictionLattice, Raster, RasterElement};
pub use station::{DailyReading, Station, StationDataset};
pub use vector::{GridCell, GridDefinition};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{CRS, Projection};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, PredictionLattice, Raster, RasterElement};
    pub use crate::station::{DailyReading, Station, StationDataset};
    pub use crate::vector::{GridCell, GridDefinition};
}
