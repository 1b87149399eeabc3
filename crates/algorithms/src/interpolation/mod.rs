//! Spatial interpolation of station samples
//!
//! - Variogram: empirical variogram computation and spherical model fitting
//! - Ordinary Kriging: BLUE geostatistical interpolation onto a lattice

pub mod kriging;
pub mod variogram;

pub use kriging::{KrigingParams, KrigingResult, ordinary_kriging};
pub use variogram::{
    EmpiricalVariogram, FitPolicy, FittedVariogram, VariogramParams, empirical_variogram,
    fit_spherical,
};

/// A sample point with x, y coordinates and a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }

    /// Squared Euclidean distance to another point
    #[inline]
    pub fn dist_sq(&self, other_x: f64, other_y: f64) -> f64 {
        let dx = self.x - other_x;
        let dy = self.y - other_y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn dist(&self, other_x: f64, other_y: f64) -> f64 {
        self.dist_sq(other_x, other_y).sqrt()
    }
}

impl From<wxkrige_core::station::ProjectedValue> for SamplePoint {
    fn from(v: wxkrige_core::station::ProjectedValue) -> Self {
        Self::new(v.x, v.y, v.value)
    }
}
