//! Raster element trait for generic cell values

use num_traits::{Float, NumCast};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Surfaces in this crate are always floating point: a masked or
/// unpredicted cell is NaN, optionally mirrored by an explicit no-data value.
pub trait RasterElement:
    Copy + Debug + PartialOrd + Float + NumCast + Send + Sync + 'static
{
    /// Value written into masked cells
    fn missing() -> Self {
        Self::nan()
    }

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool {
        if self.is_nan() {
            return true;
        }
        match nodata {
            Some(nd) => {
                let tolerance = <Self as NumCast>::from(100.0).unwrap_or_else(Self::one);
                (*self - nd).abs() < Self::epsilon() * tolerance
            }
            None => false,
        }
    }
}

impl RasterElement for f32 {}
impl RasterElement for f64 {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_always_nodata() {
        assert!(f64::NAN.is_nodata(None));
        assert!(f32::NAN.is_nodata(Some(-9999.0)));
    }

    #[test]
    fn explicit_nodata_matches() {
        assert!((-9999.0_f64).is_nodata(Some(-9999.0)));
        assert!(!1.0_f64.is_nodata(Some(-9999.0)));
        assert!(!1.0_f64.is_nodata(None));
    }
}
