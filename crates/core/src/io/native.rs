//! GeoTIFF writing for interpolated surfaces
//!
//! Uses the `tiff` crate directly. Surfaces are written as single-band
//! 32-bit float with pixel scale, tiepoint and a minimal GeoKey directory
//! carrying the raster's EPSG code. Masked cells stay NaN and are declared
//! through the GDAL no-data tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{Raster, RasterElement};
use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;
use tiff::encoder::TiffEncoder;
use tiff::encoder::colortype::Gray32Float;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

/// Write a raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, BufWriter::new(file))
}

/// Write a raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let tiff_err = |what: &str, e: tiff::TiffError| Error::Other(format!("{what}: {e}"));

    let mut encoder = TiffEncoder::new(writer).map_err(|e| tiff_err("TIFF encoder error", e))?;
    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                f32::NAN
            } else {
                num_traits::cast(v).unwrap_or(f32::NAN)
            }
        })
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| tiff_err("Cannot create TIFF image", e))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| tiff_err("Cannot write scale tag", e))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| tiff_err("Cannot write tiepoint tag", e))?;

    let geokeys = geo_keys(raster.crs());
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| tiff_err("Cannot write geokey tag", e))?;

    image
        .encoder()
        .write_tag(Tag::Unknown(GDAL_NODATA), "nan")
        .map_err(|e| tiff_err("Cannot write nodata tag", e))?;

    image
        .write_data(&data)
        .map_err(|e| tiff_err("Cannot write image data", e))?;

    Ok(())
}

/// GeoKey directory: header, model type, raster type and the CRS key
fn geo_keys(crs: Option<&CRS>) -> Vec<u16> {
    let mut keys: Vec<u16> = vec![1, 1, 0, 2];
    let model_type = match crs {
        Some(c) if c.is_geographic() => 2,
        _ => 1,
    };
    keys.extend_from_slice(&[1024, 0, 1, model_type]);
    keys.extend_from_slice(&[1025, 0, 1, 1]);

    if let Some(code) = crs.and_then(|c| u16::try_from(c.epsg()).ok()) {
        let key = if model_type == 2 { 2048 } else { 3072 };
        keys.extend_from_slice(&[key, 0, 1, code]);
        keys[3] = 3;
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;
    use std::io::Cursor;
    use tiff::decoder::{Decoder, DecodingResult};

    fn surface() -> Raster<f64> {
        let mut r = Raster::from_vec(vec![1.0, 2.0, f64::NAN, 4.0, 5.0, 6.0], 2, 3)
            .unwrap()
            .with_georef(GeoTransform::square(100.0, 500.0, 10.0), Some(CRS::conus_albers()));
        r.set_nodata(Some(f64::NAN));
        r
    }

    #[test]
    fn buffer_roundtrip_keeps_values_and_georef() {
        let buf = write_geotiff_to_buffer(&surface()).unwrap();
        let mut decoder = Decoder::new(Cursor::new(buf)).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (3, 2));

        let scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE)).unwrap();
        assert_eq!(scale[0], 10.0);
        let tie = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT)).unwrap();
        assert_eq!((tie[3], tie[4]), (100.0, 500.0));

        match decoder.read_image().unwrap() {
            DecodingResult::F32(values) => {
                assert_eq!(values[1], 2.0);
                assert!(values[2].is_nan());
                assert_eq!(values[5], 6.0);
            }
            _ => panic!("expected f32 data"),
        }
    }

    #[test]
    fn geokeys_carry_epsg() {
        let keys = geo_keys(Some(&CRS::conus_albers()));
        assert_eq!(keys[3], 3);
        assert_eq!(&keys[keys.len() - 4..], &[3072, 0, 1, 5070]);

        let keys = geo_keys(Some(&CRS::wgs84()));
        assert_eq!(keys[7], 2);
        assert_eq!(&keys[keys.len() - 4..], &[2048, 0, 1, 4326]);

        assert_eq!(geo_keys(None).len(), 12);
    }

    #[test]
    fn write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surface.tif");
        write_geotiff(&surface(), &path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
