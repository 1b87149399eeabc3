//! Vector features and the polygon grid definition
//!
//! Input features carry arbitrary attributes; the grid keeps only the cell
//! identifier and the projected boundary of each polygon.

use geo::{BoundingRect, MultiPolygon};
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::crs::{CRS, Projection};
use crate::error::{Error, Result};

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Text form used for cell identifiers
    pub fn as_key(&self) -> Option<String> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Bool(b) => Some(b.to_string()),
            AttributeValue::Int(i) => Some(i.to_string()),
            AttributeValue::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                Some(format!("{}", *f as i64))
            }
            AttributeValue::Float(f) => Some(f.to_string()),
            AttributeValue::String(s) => Some(s.clone()),
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: HashMap<String, AttributeValue>,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
        }
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Polygonal geometry as a multipolygon, `None` for other geometry types
    pub fn polygons(&self) -> Option<MultiPolygon<f64>> {
        match self.geometry.as_ref()? {
            Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
            Geometry::MultiPolygon(mp) => Some(mp.clone()),
            Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
            _ => None,
        }
    }
}

/// Collection of features
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }
}

/// One polygon of the study-area mesh
#[derive(Debug, Clone)]
pub struct GridCell {
    pub id: String,
    pub polygon: MultiPolygon<f64>,
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell {}", self.id)
    }
}

/// The polygon mesh, in the working CRS. Cell order is the mesh order of
/// the input file and is the order used in every output table.
#[derive(Debug, Clone)]
pub struct GridDefinition {
    cells: Vec<GridCell>,
    crs: CRS,
}

impl GridDefinition {
    /// Build a grid from already projected cells.
    ///
    /// Fails on an empty mesh or duplicate ids.
    pub fn new(cells: Vec<GridCell>, crs: CRS) -> Result<Self> {
        if cells.is_empty() {
            return Err(Error::EmptyGrid);
        }
        let mut seen = HashSet::with_capacity(cells.len());
        for cell in &cells {
            if !seen.insert(cell.id.as_str()) {
                return Err(Error::DuplicateCell(cell.id.clone()));
            }
        }
        Ok(Self { cells, crs })
    }

    /// Build a grid from input features.
    ///
    /// `id_field` names the identifying attribute. Features whose geometry
    /// is declared in `source_crs` are projected into `working_crs`: a
    /// geographic source is projected, a source equal to the working CRS is
    /// used as-is, and anything else is a CRS mismatch.
    pub fn from_features(
        features: &FeatureCollection,
        id_field: &str,
        source_crs: CRS,
        working_crs: CRS,
    ) -> Result<Self> {
        let projection = if source_crs.is_equivalent(&working_crs) {
            Projection::Identity
        } else if source_crs.is_geographic() {
            working_crs.projection()?
        } else {
            return Err(Error::CrsMismatch(
                source_crs.identifier(),
                working_crs.identifier(),
            ));
        };

        let mut cells = Vec::with_capacity(features.len());
        for (index, feature) in features.iter().enumerate() {
            let id = feature
                .get_property(id_field)
                .and_then(AttributeValue::as_key)
                .ok_or_else(|| Error::InvalidRecord {
                    source_name: "grid".into(),
                    record: index,
                    reason: format!("missing id field '{id_field}'"),
                })?;
            let polygons = feature.polygons().ok_or_else(|| Error::InvalidRecord {
                source_name: "grid".into(),
                record: index,
                reason: format!("cell {id} is not a polygon"),
            })?;

            if source_crs.is_geographic() && !within_lon_lat(&polygons) {
                return Err(Error::CrsMismatch(
                    format!("{} declared for cell {id}", source_crs.identifier()),
                    "coordinates outside longitude/latitude range".into(),
                ));
            }

            cells.push(GridCell {
                id,
                polygon: projection.project_polygons(&polygons),
            });
        }

        Self::new(cells, working_crs)
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn crs(&self) -> CRS {
        self.crs
    }

    /// Bounding extent (min_x, min_y, max_x, max_y) of all cells
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.cells
            .iter()
            .filter_map(|c| c.polygon.bounding_rect())
            .fold(None, |acc, r| {
                let (min, max) = (r.min(), r.max());
                Some(match acc {
                    None => (min.x, min.y, max.x, max.y),
                    Some((a, b, c, d)) => (a.min(min.x), b.min(min.y), c.max(max.x), d.max(max.y)),
                })
            })
    }
}

fn within_lon_lat(polygons: &MultiPolygon<f64>) -> bool {
    polygons.bounding_rect().is_none_or(|r| {
        r.min().x >= -180.0 && r.max().x <= 180.0 && r.min().y >= -90.0 && r.max().y <= 90.0
    })
}
