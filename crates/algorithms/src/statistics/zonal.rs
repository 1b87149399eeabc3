//! Zonal statistics over grid polygons
//!
//! Aggregates a masked lattice surface back onto the polygon mesh. Each
//! polygon's value is the arithmetic mean of the unmasked, non-NaN cells
//! whose centre the [`ZoneIndex`] assigned to it.

use wxkrige_core::Result;
use wxkrige_core::raster::Raster;

use crate::zones::ZoneIndex;

/// Result of zonal statistics for one polygon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZonalResult {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Statistics per polygon, in mesh order. Polygons without a single valid
/// cell are `None`.
pub fn zonal_statistics(values: &Raster<f64>, zones: &ZoneIndex) -> Result<Vec<Option<ZonalResult>>> {
    zones.check_shape(values)?;

    let mut acc: Vec<Option<ZonalResult>> = vec![None; zones.zone_count()];
    for (&value, zone) in values.data().iter().zip(zones.assignments()) {
        let Some(zone) = *zone else {
            continue;
        };
        if value.is_nan() || values.is_nodata(value) {
            continue;
        }
        let entry = acc[zone].get_or_insert(ZonalResult {
            count: 0,
            sum: 0.0,
            mean: f64::NAN,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        });
        entry.count += 1;
        entry.sum += value;
        entry.min = entry.min.min(value);
        entry.max = entry.max.max(value);
    }

    for result in acc.iter_mut().flatten() {
        result.mean = result.sum / result.count as f64;
    }
    Ok(acc)
}

/// Areal mean per polygon, in mesh order
pub fn zonal_means(values: &Raster<f64>, zones: &ZoneIndex) -> Result<Vec<Option<f64>>> {
    Ok(zonal_statistics(values, zones)?
        .into_iter()
        .map(|r| r.map(|r| r.mean))
        .collect())
}
