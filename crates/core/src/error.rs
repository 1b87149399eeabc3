//! Error types for wxkrige

use thiserror::Error;

/// Main error type for wxkrige operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported CRS: EPSG:{0}")]
    UnsupportedCrs(u32),

    #[error("Working CRS {0} is geographic; distances need a projected CRS")]
    GeographicWorkingCrs(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{source_name}, record {record}: {reason}")]
    InvalidRecord {
        source_name: String,
        record: usize,
        reason: String,
    },

    #[error("Grid has no usable cells")]
    EmptyGrid,

    #[error("Duplicate grid cell id: {0}")]
    DuplicateCell(String),

    #[error("Duplicate observation for station {station} on {date}")]
    DuplicateObservation { station: String, date: String },

    #[error("Station {0} reported with different coordinates")]
    StationMoved(String),

    #[error("Insufficient data: need at least {needed} observations, found {found}")]
    InsufficientData { needed: usize, found: usize },

    #[error("Variogram fit failed: {0}")]
    FitNonconvergence(String),

    #[error("Kriging system is singular")]
    SingularSystem,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("{0}")]
    Other(String),
}

/// Result type alias for wxkrige operations
pub type Result<T> = std::result::Result<T, Error>;
