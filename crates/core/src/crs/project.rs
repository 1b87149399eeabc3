//! Pure-Rust WGS84 → planar projections (Snyder 1987, USGS formulas).
//!
//! Covers Albers Equal-Area Conic on the GRS80 ellipsoid (EPSG:5070 and
//! custom standard parallels) and UTM (EPSG 326xx / 327xx). No libproj.

use geo::{Coord, MapCoords, MultiPolygon};

use crate::error::{Error, Result};

// ── Ellipsoid constants ──────────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m), shared by WGS84 and GRS80
const F_WGS84: f64 = 1.0 / 298.257_223_563;
const F_GRS80: f64 = 1.0 / 298.257_222_101;
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING_UTM: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Albers Equal-Area Conic parameters (degrees, metres)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlbersParams {
    pub lat_origin: f64,
    pub lon_origin: f64,
    pub standard_parallel_1: f64,
    pub standard_parallel_2: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl AlbersParams {
    /// NAD83 / Conus Albers (EPSG:5070)
    pub fn conus() -> Self {
        Self {
            lat_origin: 23.0,
            lon_origin: -96.0,
            standard_parallel_1: 29.5,
            standard_parallel_2: 45.5,
            false_easting: 0.0,
            false_northing: 0.0,
        }
    }
}

/// A projection from geographic longitude/latitude (degrees) to planar x/y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Coordinates are already in the target system
    Identity,
    Albers(AlbersParams),
    Utm { zone: u32, north: bool },
}

impl Projection {
    /// Resolve the projection for an EPSG code.
    pub fn for_epsg(epsg: u32) -> Result<Self> {
        match epsg {
            4326 => Ok(Projection::Identity),
            5070 => Ok(Projection::Albers(AlbersParams::conus())),
            32601..=32660 => Ok(Projection::Utm { zone: epsg - 32600, north: true }),
            32701..=32760 => Ok(Projection::Utm { zone: epsg - 32700, north: false }),
            other => Err(Error::UnsupportedCrs(other)),
        }
    }

    /// Project a longitude/latitude pair.
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Identity => (lon, lat),
            Projection::Albers(p) => albers_forward(p, lon, lat),
            Projection::Utm { zone, north } => wgs84_to_utm(lon, lat, *zone, *north),
        }
    }

    /// Project every vertex of a multipolygon.
    pub fn project_polygons(&self, polygons: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        if *self == Projection::Identity {
            return polygons.clone();
        }
        polygons.map_coords(|c| {
            let (x, y) = self.project(c.x, c.y);
            Coord { x, y }
        })
    }
}

// ── Albers Equal-Area Conic (Snyder 1987, pp. 98-103) ────────────────────

fn albers_forward(p: &AlbersParams, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let e2 = 2.0 * F_GRS80 - F_GRS80 * F_GRS80;
    let e = e2.sqrt();

    let phi1 = p.standard_parallel_1.to_radians();
    let phi2 = p.standard_parallel_2.to_radians();

    let m1 = albers_m(phi1, e2);
    let m2 = albers_m(phi2, e2);
    let q0 = albers_q(p.lat_origin.to_radians(), e, e2);
    let q1 = albers_q(phi1, e, e2);
    let q2 = albers_q(phi2, e, e2);
    let q = albers_q(lat_deg.to_radians(), e, e2);

    // Tangent cone when both parallels coincide (Snyder eq. 14-15)
    let n = if (phi1 - phi2).abs() < 1e-12 {
        phi1.sin()
    } else {
        (m1 * m1 - m2 * m2) / (q2 - q1)
    };
    let c = m1 * m1 + n * q1;

    let rho = A * (c - n * q).max(0.0).sqrt() / n;
    let rho0 = A * (c - n * q0).max(0.0).sqrt() / n;
    let theta = n * (lon_deg - p.lon_origin).to_radians();

    let x = rho * theta.sin() + p.false_easting;
    let y = rho0 - rho * theta.cos() + p.false_northing;
    (x, y)
}

/// Snyder eq. 14-15
fn albers_m(phi: f64, e2: f64) -> f64 {
    let s = phi.sin();
    phi.cos() / (1.0 - e2 * s * s).sqrt()
}

/// Snyder eq. 3-12
fn albers_q(phi: f64, e: f64, e2: f64) -> f64 {
    let s = phi.sin();
    (1.0 - e2) * (s / (1.0 - e2 * s * s) - (1.0 / (2.0 * e)) * ((1.0 - e * s) / (1.0 + e * s)).ln())
}

// ── Transverse Mercator / UTM (Snyder 1987, pp. 61-64) ───────────────────

fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let e2 = 2.0 * F_WGS84 - F_WGS84 * F_WGS84;
    let e_prime2 = e2 / (1.0 - e2);

    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians();

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = e_prime2 * cos_lat * cos_lat;
    let a_coeff = cos_lat * (lon - lon0);
    let m = meridional_arc(lat, e2);

    let a2 = a_coeff * a_coeff;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Snyder eq. 8-9
    let easting = K0 * n
        * (a_coeff
            + (1.0 - t + c) * a2 * a_coeff / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * e_prime2) * a4 * a_coeff / 120.0)
        + FALSE_EASTING_UTM;

    // Snyder eq. 8-10
    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * e_prime2) * a6 / 720.0));

    if north {
        (easting, northing)
    } else {
        (easting, northing + FALSE_NORTHING_SOUTH)
    }
}

/// Snyder eq. 3-21
fn meridional_arc(lat: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    A * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}
