//! Regular prediction lattice
//!
//! The lattice is the set of cell centres kriging is evaluated at. It covers
//! the grid's bounding extent with square cells whose size is derived from a
//! target point count, so resolution trades directly against compute time.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};

/// Regular lattice of sample points, built once and shared by every day.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionLattice {
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    crs: CRS,
}

impl PredictionLattice {
    /// Build a lattice over `(min_x, min_y, max_x, max_y)` with roughly
    /// `target_points` cells.
    ///
    /// Cell size is `sqrt(area / target_points)`; rows and columns round up
    /// so the extent is always fully covered.
    pub fn from_extent(
        bounds: (f64, f64, f64, f64),
        target_points: usize,
        crs: CRS,
    ) -> Result<Self> {
        let (min_x, min_y, max_x, max_y) = bounds;
        let width = max_x - min_x;
        let height = max_y - min_y;

        if target_points == 0 {
            return Err(Error::InvalidParameter {
                name: "target_points",
                value: "0".into(),
                reason: "lattice needs at least one point".into(),
            });
        }
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "extent",
                value: format!("{width} x {height}"),
                reason: "extent must have positive finite width and height".into(),
            });
        }

        let cell_size = (width * height / target_points as f64).sqrt();
        let cols = ((width / cell_size).ceil() as usize).max(1);
        let rows = ((height / cell_size).ceil() as usize).max(1);

        Ok(Self {
            rows,
            cols,
            transform: GeoTransform::square(min_x, max_y, cell_size),
            crs,
        })
    }

    /// Lattice with an explicit transform
    pub fn new(rows: usize, cols: usize, transform: GeoTransform, crs: CRS) -> Self {
        Self { rows, cols, transform, crs }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of sample points
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> CRS {
        self.crs
    }

    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Sample point (cell center) at (row, col)
    pub fn point(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// All sample points in row-major order
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| self.point(row, col)))
    }

    /// Reshape row-major lattice values into a raster aligned to this lattice
    pub fn to_raster<T: RasterElement>(&self, values: Vec<T>) -> Result<Raster<T>> {
        let mut raster = Raster::from_vec(values, self.rows, self.cols)?
            .with_georef(self.transform, Some(self.crs));
        raster.set_nodata(Some(T::missing()));
        Ok(raster)
    }
}
