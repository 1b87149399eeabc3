//! Statistical aggregation of lattice surfaces
//!
//! - **zonal**: Statistics by grid polygon

pub mod zonal;

pub use zonal::{ZonalResult, zonal_means, zonal_statistics};
