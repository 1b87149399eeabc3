//! Coordinate Reference System handling
//!
//! Stations arrive as WGS84 longitude/latitude. Variogram distances assume
//! a planar metric, so every coordinate is projected once at load time into
//! a working CRS (by default NAD83 / CONUS Albers, EPSG:5070).

mod project;

pub use project::{AlbersParams, Projection};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Coordinate Reference System identified by its EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CRS {
    epsg: u32,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// NAD83 / Conus Albers equal-area (EPSG:5070)
    pub fn conus_albers() -> Self {
        Self::from_epsg(5070)
    }

    /// EPSG code
    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Whether coordinates are longitude/latitude degrees
    pub fn is_geographic(&self) -> bool {
        self.epsg == 4326
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        self.epsg == other.epsg
    }

    /// Projection from WGS84 longitude/latitude into this CRS.
    ///
    /// Fails with [`crate::Error::UnsupportedCrs`] for codes without a
    /// built-in formula.
    pub fn projection(&self) -> Result<Projection> {
        Projection::for_epsg(self.epsg)
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::conus_albers()
    }
}
