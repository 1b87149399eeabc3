//! Raster data structures and the prediction lattice

mod element;
mod geotransform;
mod grid;
mod lattice;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use lattice::PredictionLattice;
