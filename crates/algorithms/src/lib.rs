//! # wxkrige algorithms
//!
//! Geostatistics for daily station interpolation.
//!
//! ## Available Algorithm Categories
//!
//! - **interpolation**: empirical variogram, spherical fit, ordinary kriging
//! - **zones**: lattice-to-polygon assignment and masking
//! - **statistics**: areal means per grid polygon

pub mod interpolation;
pub mod statistics;
pub mod zones;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::interpolation::{
        EmpiricalVariogram, FitPolicy, FittedVariogram, KrigingParams, KrigingResult,
        SamplePoint, VariogramParams, empirical_variogram, fit_spherical, ordinary_kriging,
    };
    pub use crate::statistics::{zonal_means, zonal_statistics};
    pub use crate::zones::ZoneIndex;
    pub use wxkrige_core::prelude::*;
}
