//! Lattice-to-polygon assignment and masking
//!
//! The prediction lattice is rectangular but the study area is not. A
//! [`ZoneIndex`] records, for every lattice cell centre, the grid polygon it
//! falls in. It is computed once per run; each day's surface is masked and
//! aggregated against it.

use geo::{BoundingRect, Intersects, MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};
use wxkrige_core::raster::{PredictionLattice, Raster};
use wxkrige_core::{Error, GridDefinition, Result};

/// A grid polygon stored in the R-tree with its mesh position
struct ZoneEntry<'a> {
    index: usize,
    envelope: AABB<[f64; 2]>,
    polygon: &'a MultiPolygon<f64>,
}

impl RTreeObject for ZoneEntry<'_> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Zone assignment of every lattice cell
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneIndex {
    rows: usize,
    cols: usize,
    /// Row-major polygon index per lattice cell, `None` outside the grid
    assignment: Vec<Option<usize>>,
    zone_count: usize,
}

impl ZoneIndex {
    /// Assign each lattice cell centre to the first polygon, in mesh order,
    /// that contains or touches it.
    pub fn build(grid: &GridDefinition, lattice: &PredictionLattice) -> Self {
        let entries: Vec<ZoneEntry<'_>> = grid
            .cells()
            .iter()
            .enumerate()
            .filter_map(|(index, cell)| {
                let rect = cell.polygon.bounding_rect()?;
                Some(ZoneEntry {
                    index,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                    polygon: &cell.polygon,
                })
            })
            .collect();
        let tree = RTree::bulk_load(entries);

        let assignment = lattice
            .points()
            .map(|(x, y)| {
                let point = Point::new(x, y);
                tree.locate_in_envelope_intersecting(&AABB::from_point([x, y]))
                    .filter(|entry| entry.polygon.intersects(&point))
                    .map(|entry| entry.index)
                    .min()
            })
            .collect();

        let index = Self {
            rows: lattice.rows(),
            cols: lattice.cols(),
            assignment,
            zone_count: grid.len(),
        };
        tracing::debug!(
            "Zone index: {} of {} lattice cells inside {} polygons",
            index.covered_cells(),
            lattice.len(),
            grid.len()
        );
        index
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of grid polygons
    pub fn zone_count(&self) -> usize {
        self.zone_count
    }

    /// Polygon index of the lattice cell at (row, col)
    pub fn zone_at(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.assignment[row * self.cols + col]
    }

    /// Row-major assignments
    pub fn assignments(&self) -> &[Option<usize>] {
        &self.assignment
    }

    /// Lattice cells inside some polygon
    pub fn covered_cells(&self) -> usize {
        self.assignment.iter().filter(|a| a.is_some()).count()
    }

    /// Lattice cells per polygon
    pub fn cells_per_zone(&self) -> Vec<usize> {
        let mut counts = vec![0; self.zone_count];
        for zone in self.assignment.iter().flatten() {
            counts[*zone] += 1;
        }
        counts
    }

    /// Set every cell outside the grid to NaN
    pub fn mask(&self, raster: &mut Raster<f64>) -> Result<()> {
        self.check_shape(raster)?;
        for (value, zone) in raster.data_mut().iter_mut().zip(&self.assignment) {
            if zone.is_none() {
                *value = f64::NAN;
            }
        }
        Ok(())
    }

    pub(crate) fn check_shape(&self, raster: &Raster<f64>) -> Result<()> {
        let (rows, cols) = raster.shape();
        if (rows, cols) != (self.rows, self.cols) {
            return Err(Error::SizeMismatch {
                er: self.rows,
                ec: self.cols,
                ar: rows,
                ac: cols,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Rect, coord};
    use wxkrige_core::raster::GeoTransform;
    use wxkrige_core::{CRS, GridCell};

    fn square(id: &str, x0: f64, y0: f64, w: f64, h: f64) -> GridCell {
        let rect = Rect::new(coord! { x: x0, y: y0 }, coord! { x: x0 + w, y: y0 + h });
        GridCell {
            id: id.into(),
            polygon: MultiPolygon::new(vec![rect.to_polygon()]),
        }
    }

    /// 4x4 lattice of unit cells over (0,0)-(4,4)
    fn lattice() -> PredictionLattice {
        PredictionLattice::new(4, 4, GeoTransform::square(0.0, 4.0, 1.0), CRS::default())
    }

    #[test]
    fn cells_outside_polygons_are_unassigned() {
        // left half only
        let grid = GridDefinition::new(vec![square("a", 0.0, 0.0, 2.0, 4.0)], CRS::default()).unwrap();
        let zones = ZoneIndex::build(&grid, &lattice());

        assert_eq!(zones.covered_cells(), 8);
        assert_eq!(zones.zone_at(0, 0), Some(0));
        assert_eq!(zones.zone_at(0, 3), None);
        assert_eq!(zones.zone_at(9, 9), None);
    }

    #[test]
    fn shared_edge_goes_to_first_polygon() {
        // the boundary x = 1.5 passes through the second column's centres
        let grid = GridDefinition::new(
            vec![square("a", 0.0, 0.0, 1.5, 4.0), square("b", 1.5, 0.0, 2.5, 4.0)],
            CRS::default(),
        )
        .unwrap();
        let zones = ZoneIndex::build(&grid, &lattice());

        assert_eq!(zones.zone_at(2, 1), Some(0));
        assert_eq!(zones.zone_at(2, 2), Some(1));
        assert_eq!(zones.cells_per_zone(), vec![8, 8]);
    }

    #[test]
    fn mask_sets_outside_to_nan() {
        let grid = GridDefinition::new(vec![square("a", 0.0, 2.0, 4.0, 2.0)], CRS::default()).unwrap();
        let lattice = lattice();
        let zones = ZoneIndex::build(&grid, &lattice);

        let mut raster = lattice.to_raster(vec![1.0; 16]).unwrap();
        zones.mask(&mut raster).unwrap();
        let stats = raster.statistics();
        assert_eq!(stats.valid_count, 8);
        assert!(raster.get(3, 0).unwrap().is_nan());
        assert_eq!(raster.get(0, 0).unwrap(), 1.0);
    }

    #[test]
    fn mask_rejects_other_shapes() {
        let grid = GridDefinition::new(vec![square("a", 0.0, 0.0, 4.0, 4.0)], CRS::default()).unwrap();
        let zones = ZoneIndex::build(&grid, &lattice());
        let mut raster = Raster::filled(3, 3, 0.0);
        assert!(zones.mask(&mut raster).is_err());
    }
}
