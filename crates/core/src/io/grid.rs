//! Grid mesh GeoJSON reader

use geojson::GeoJson;
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection, GridDefinition};

/// How to interpret a grid file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridOptions {
    /// Property holding the cell identifier
    pub id_field: String,
    /// EPSG code the file's coordinates are declared in
    pub epsg: u32,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            id_field: "id".into(),
            epsg: 4326,
        }
    }
}

/// Read a grid GeoJSON file into a [`GridDefinition`] in `working_crs`
pub fn read_grid<P: AsRef<Path>>(
    path: P,
    options: &GridOptions,
    working_crs: CRS,
) -> Result<GridDefinition> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let grid = read_grid_from_str(&text, options, working_crs)?;
    tracing::debug!("Loaded {} grid cells from {}", grid.len(), path.as_ref().display());
    Ok(grid)
}

/// Parse grid GeoJSON text
pub fn read_grid_from_str(
    text: &str,
    options: &GridOptions,
    working_crs: CRS,
) -> Result<GridDefinition> {
    let features = parse_features(text, &options.id_field)?;
    GridDefinition::from_features(
        &features,
        &options.id_field,
        CRS::from_epsg(options.epsg),
        working_crs,
    )
}

fn parse_features(text: &str, id_field: &str) -> Result<FeatureCollection> {
    let geojson: GeoJson = text.parse()?;
    let raw = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => {
            return Err(Error::InvalidRecord {
                source_name: "grid".into(),
                record: 0,
                reason: "expected a FeatureCollection".into(),
            });
        }
    };

    let mut collection = FeatureCollection::default();
    for (index, gj) in raw.into_iter().enumerate() {
        let geometry = match gj.geometry {
            Some(g) => Some(Geometry::<f64>::try_from(g)?),
            None => None,
        };
        let mut feature = Feature {
            geometry,
            properties: Default::default(),
        };
        for (key, value) in gj.properties.into_iter().flatten() {
            feature.set_property(key, json_to_attribute(value));
        }
        // a top-level feature id fills in when the properties lack one
        if let Some(id) = gj.id {
            let value = match id {
                geojson::feature::Id::String(s) => AttributeValue::String(s),
                geojson::feature::Id::Number(n) => json_to_attribute(serde_json::Value::Number(n)),
            };
            feature.properties.entry(id_field.to_string()).or_insert(value);
        }
        if feature.geometry.is_none() {
            tracing::warn!("Grid feature {index} has no geometry");
        }
        collection.push(feature);
    }
    Ok(collection)
}

fn json_to_attribute(value: serde_json::Value) -> AttributeValue {
    match value {
        serde_json::Value::Null => AttributeValue::Null,
        serde_json::Value::Bool(b) => AttributeValue::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => n.as_f64().map_or(AttributeValue::Null, AttributeValue::Float),
        },
        serde_json::Value::String(s) => AttributeValue::String(s),
        other => AttributeValue::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const GRID: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {"type": "Feature", "properties": {"id": 101, "name": "west"},
         "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]}},
        {"type": "Feature", "properties": {"id": "east"},
         "geometry": {"type": "MultiPolygon", "coordinates": [[[[10,0],[20,0],[20,10],[10,10],[10,0]]]]}}
      ]
    }"#;

    fn projected() -> GridOptions {
        GridOptions {
            epsg: 5070,
            ..Default::default()
        }
    }

    #[test]
    fn reads_polygons_and_multipolygons() {
        let grid = read_grid_from_str(GRID, &projected(), CRS::conus_albers()).unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.cells()[0].id, "101");
        assert_eq!(grid.cells()[1].id, "east");
        assert_eq!(grid.bounds(), Some((0.0, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn custom_id_field() {
        let options = GridOptions {
            id_field: "name".into(),
            epsg: 5070,
        };
        // second feature lacks "name"
        assert!(read_grid_from_str(GRID, &options, CRS::conus_albers()).is_err());
    }

    #[test]
    fn feature_id_is_used_when_property_missing() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","id":7,"properties":{},
             "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}]}"#;
        let grid = read_grid_from_str(text, &projected(), CRS::conus_albers()).unwrap();
        assert_eq!(grid.cells()[0].id, "7");
    }

    #[test]
    fn feature_id_fills_custom_id_field() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","id":"10190001","properties":{"name":"upper"},
             "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}},
            {"type":"Feature","id":"10190002","properties":{"huc8":"10190099"},
             "geometry":{"type":"Polygon","coordinates":[[[1,0],[2,0],[2,1],[1,0]]]}}]}"#;
        let options = GridOptions {
            id_field: "huc8".into(),
            epsg: 5070,
        };
        let grid = read_grid_from_str(text, &options, CRS::conus_albers()).unwrap();
        assert_eq!(grid.cells()[0].id, "10190001");
        // an explicit property wins over the feature id
        assert_eq!(grid.cells()[1].id, "10190099");
    }

    #[test]
    fn point_features_are_rejected() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"id":1},
             "geometry":{"type":"Point","coordinates":[0,0]}}]}"#;
        assert!(read_grid_from_str(text, &projected(), CRS::conus_albers()).is_err());
    }

    #[test]
    fn bare_geometry_is_rejected() {
        let text = r#"{"type":"Point","coordinates":[0,0]}"#;
        assert!(read_grid_from_str(text, &projected(), CRS::conus_albers()).is_err());
    }

    #[test]
    fn reads_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(GRID.as_bytes()).unwrap();
        let grid = read_grid(file.path(), &projected(), CRS::conus_albers()).unwrap();
        assert_eq!(grid.len(), 2);
    }
}
