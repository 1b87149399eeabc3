//! Daily station observations
//!
//! A [`StationDataset`] owns every station once (identifier, lon/lat and the
//! projected position) and the readings grouped by day. Readings refer to
//! stations by index so the projected coordinates are computed exactly once
//! per load and never touched again.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use crate::crs::{CRS, Projection};
use crate::error::{Error, Result};

/// A weather station with its projected position
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: String,
    pub lon: f64,
    pub lat: f64,
    /// Projected easting in the dataset CRS
    pub x: f64,
    /// Projected northing in the dataset CRS
    pub y: f64,
}

/// One station's values for one day, aligned with the dataset variables
#[derive(Debug, Clone, PartialEq)]
pub struct DailyReading {
    pub station: usize,
    pub values: Vec<Option<f64>>,
}

/// Non-missing observations of one variable on one day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedValue {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

/// Immutable table of daily observations
#[derive(Debug, Clone)]
pub struct StationDataset {
    variables: Vec<String>,
    stations: Vec<Station>,
    days: BTreeMap<NaiveDate, Vec<DailyReading>>,
    crs: CRS,
}

impl StationDataset {
    pub fn builder(variables: Vec<String>, crs: CRS) -> Result<StationDatasetBuilder> {
        StationDatasetBuilder::new(variables, crs)
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == name)
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn crs(&self) -> CRS {
        self.crs
    }

    /// Days with at least one reading, ascending
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    /// First and last day present
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.days.keys().next()?;
        let last = self.days.keys().next_back()?;
        Some((*first, *last))
    }

    /// Readings for one day (empty if the day is absent)
    pub fn readings(&self, date: NaiveDate) -> &[DailyReading] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-missing, finite values of one variable on one day, in station order
    pub fn samples(&self, date: NaiveDate, variable: usize) -> Vec<ProjectedValue> {
        self.readings(date)
            .iter()
            .filter_map(|r| {
                let value = r.values.get(variable).copied().flatten()?;
                if !value.is_finite() {
                    return None;
                }
                let station = &self.stations[r.station];
                Some(ProjectedValue {
                    x: station.x,
                    y: station.y,
                    value,
                })
            })
            .collect()
    }

    /// Number of non-missing readings per variable over all days
    pub fn coverage(&self) -> Vec<usize> {
        let mut counts = vec![0; self.variables.len()];
        for reading in self.days.values().flatten() {
            for (count, value) in counts.iter_mut().zip(&reading.values) {
                if value.is_some() {
                    *count += 1;
                }
            }
        }
        counts
    }
}

/// Incremental loader enforcing the dataset invariants
#[derive(Debug)]
pub struct StationDatasetBuilder {
    variables: Vec<String>,
    crs: CRS,
    projection: Projection,
    stations: Vec<Station>,
    station_index: HashMap<String, usize>,
    days: BTreeMap<NaiveDate, Vec<DailyReading>>,
}

impl StationDatasetBuilder {
    fn new(variables: Vec<String>, crs: CRS) -> Result<Self> {
        if variables.is_empty() {
            return Err(Error::InvalidParameter {
                name: "variables",
                value: "[]".into(),
                reason: "at least one variable is required".into(),
            });
        }
        Ok(Self {
            variables,
            crs,
            projection: crs.projection()?,
            stations: Vec::new(),
            station_index: HashMap::new(),
            days: BTreeMap::new(),
        })
    }

    /// Add one station-day.
    ///
    /// Fails if the station was seen before with other coordinates, if the
    /// (station, day) pair already exists or the value count does not match
    /// the variables.
    pub fn push(
        &mut self,
        station_id: &str,
        date: NaiveDate,
        lon: f64,
        lat: f64,
        values: Vec<Option<f64>>,
    ) -> Result<()> {
        if values.len() != self.variables.len() {
            return Err(Error::SizeMismatch {
                er: 1,
                ec: self.variables.len(),
                ar: 1,
                ac: values.len(),
            });
        }
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(Error::InvalidParameter {
                name: "coordinates",
                value: format!("({lon}, {lat})"),
                reason: format!("station {station_id} is outside longitude/latitude range"),
            });
        }

        let station = match self.station_index.get(station_id) {
            Some(&idx) => {
                let known = &self.stations[idx];
                if (known.lon - lon).abs() > 1e-9 || (known.lat - lat).abs() > 1e-9 {
                    return Err(Error::StationMoved(station_id.to_string()));
                }
                idx
            }
            None => {
                let (x, y) = self.projection.project(lon, lat);
                let idx = self.stations.len();
                self.stations.push(Station {
                    id: station_id.to_string(),
                    lon,
                    lat,
                    x,
                    y,
                });
                self.station_index.insert(station_id.to_string(), idx);
                idx
            }
        };

        let day = self.days.entry(date).or_default();
        if day.iter().any(|r| r.station == station) {
            return Err(Error::DuplicateObservation {
                station: station_id.to_string(),
                date: date.to_string(),
            });
        }
        day.push(DailyReading { station, values });
        Ok(())
    }

    pub fn build(self) -> StationDataset {
        StationDataset {
            variables: self.variables,
            stations: self.stations,
            days: self.days,
            crs: self.crs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 7, d).unwrap()
    }

    fn builder() -> StationDatasetBuilder {
        StationDataset::builder(vec!["tmax".into(), "prcp".into()], CRS::conus_albers()).unwrap()
    }

    #[test]
    fn stations_are_projected_once() {
        let mut b = builder();
        b.push("A", day(1), -96.0, 23.0, vec![Some(30.0), None]).unwrap();
        b.push("A", day(2), -96.0, 23.0, vec![Some(31.0), Some(0.0)]).unwrap();
        let ds = b.build();

        assert_eq!(ds.stations().len(), 1);
        assert!(ds.stations()[0].x.abs() < 1e-6);
        assert_eq!(ds.day_count(), 2);
        assert_eq!(ds.date_range(), Some((day(1), day(2))));
        assert_eq!(ds.coverage(), vec![2, 1]);
    }

    #[test]
    fn samples_skip_missing_values() {
        let mut b = builder();
        b.push("A", day(1), -96.0, 35.0, vec![Some(30.0), None]).unwrap();
        b.push("B", day(1), -95.0, 35.0, vec![None, Some(2.5)]).unwrap();
        b.push("C", day(1), -94.0, 35.0, vec![Some(f64::NAN), Some(1.0)]).unwrap();
        let ds = b.build();

        assert_eq!(ds.samples(day(1), 0).len(), 1);
        assert_eq!(ds.samples(day(1), 1).len(), 2);
        assert!(ds.samples(day(9), 0).is_empty());
    }

    #[test]
    fn moved_station_is_rejected() {
        let mut b = builder();
        b.push("A", day(1), -96.0, 35.0, vec![None, None]).unwrap();
        let err = b.push("A", day(2), -96.5, 35.0, vec![None, None]);
        assert!(matches!(err, Err(Error::StationMoved(_))));
    }

    #[test]
    fn duplicate_station_day_is_rejected() {
        let mut b = builder();
        b.push("A", day(1), -96.0, 35.0, vec![Some(1.0), None]).unwrap();
        let err = b.push("A", day(1), -96.0, 35.0, vec![Some(2.0), None]);
        assert!(matches!(err, Err(Error::DuplicateObservation { .. })));
    }

    #[test]
    fn wrong_value_count_is_rejected() {
        let mut b = builder();
        assert!(b.push("A", day(1), -96.0, 35.0, vec![Some(1.0)]).is_err());
    }

    #[test]
    fn variable_lookup() {
        let ds = builder().build();
        assert_eq!(ds.variable_index("prcp"), Some(1));
        assert_eq!(ds.variable_index("snow"), None);
    }
}
