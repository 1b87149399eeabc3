//! Station observation CSV reader

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::station::StationDataset;

/// Column layout of a station CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StationCsvOptions {
    pub station_column: String,
    pub date_column: String,
    pub lon_column: String,
    pub lat_column: String,
    /// Variable columns to load. Empty means every remaining column.
    pub variables: Vec<String>,
}

impl Default for StationCsvOptions {
    fn default() -> Self {
        Self {
            station_column: "station".into(),
            date_column: "date".into(),
            lon_column: "lon".into(),
            lat_column: "lat".into(),
            variables: Vec::new(),
        }
    }
}

/// Empty, `NA` and `NaN` (any case) all mean "not observed"
pub fn is_missing_token(field: &str) -> bool {
    let field = field.trim();
    field.is_empty() || field.eq_ignore_ascii_case("na") || field.eq_ignore_ascii_case("nan")
}

/// Read a station CSV and project every station into `crs`
pub fn read_stations<P: AsRef<Path>>(
    path: P,
    options: &StationCsvOptions,
    crs: CRS,
) -> Result<StationDataset> {
    let name = path.as_ref().display().to_string();
    let file = File::open(path.as_ref())?;
    read_with_name(file, options, crs, &name)
}

/// Read station observations from any reader
pub fn read_stations_from_reader<R: Read>(
    reader: R,
    options: &StationCsvOptions,
    crs: CRS,
) -> Result<StationDataset> {
    read_with_name(reader, options, crs, "stations")
}

fn read_with_name<R: Read>(
    reader: R,
    options: &StationCsvOptions,
    crs: CRS,
    source_name: &str,
) -> Result<StationDataset> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let column = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::InvalidRecord {
                source_name: source_name.to_string(),
                record: 0,
                reason: format!("missing column '{name}'"),
            })
    };

    let station_col = column(&options.station_column)?;
    let date_col = column(&options.date_column)?;
    let lon_col = column(&options.lon_column)?;
    let lat_col = column(&options.lat_column)?;
    let key_cols = [station_col, date_col, lon_col, lat_col];

    let (variables, value_cols): (Vec<String>, Vec<usize>) = if options.variables.is_empty() {
        headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !key_cols.contains(i))
            .map(|(i, h)| (h.to_string(), i))
            .unzip()
    } else {
        let cols = options
            .variables
            .iter()
            .map(|v| column(v.as_str()))
            .collect::<Result<Vec<_>>>()?;
        (options.variables.clone(), cols)
    };

    let mut builder = StationDataset::builder(variables, crs)?;

    for (index, record) in rdr.records().enumerate() {
        let record = record?;
        // header is line 1
        let line = index + 2;
        let invalid = |reason: String| Error::InvalidRecord {
            source_name: source_name.to_string(),
            record: line,
            reason,
        };
        let field = |col: usize| record.get(col).unwrap_or("");

        let station = field(station_col);
        if station.is_empty() {
            return Err(invalid("empty station id".into()));
        }
        let date = NaiveDate::parse_from_str(field(date_col), "%Y-%m-%d")
            .map_err(|e| invalid(format!("bad date '{}': {e}", field(date_col))))?;
        let lon = parse_coordinate(field(lon_col)).map_err(&invalid)?;
        let lat = parse_coordinate(field(lat_col)).map_err(&invalid)?;

        let values = value_cols
            .iter()
            .map(|&col| parse_value(field(col)).map_err(&invalid))
            .collect::<Result<Vec<_>>>()?;

        builder.push(station, date, lon, lat, values)?;
    }

    let dataset = builder.build();
    if dataset.stations().is_empty() {
        return Err(Error::InvalidRecord {
            source_name: source_name.to_string(),
            record: 0,
            reason: "no observations".into(),
        });
    }

    tracing::debug!(
        "Loaded {} stations over {} days from {}",
        dataset.stations().len(),
        dataset.day_count(),
        source_name
    );
    Ok(dataset)
}

fn parse_coordinate(field: &str) -> std::result::Result<f64, String> {
    field
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("bad coordinate '{field}'"))
}

fn parse_value(field: &str) -> std::result::Result<Option<f64>, String> {
    if is_missing_token(field) {
        return Ok(None);
    }
    field
        .parse::<f64>()
        .map(Some)
        .map_err(|_| format!("bad value '{field}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CSV: &str = "\
station,date,lon,lat,tmax,prcp
A,2020-07-01,-97.5,35.4,33.1,0.0
B,2020-07-01,-96.0,36.1,NA,1.2
A,2020-07-02,-97.5,35.4,34.0,
B,2020-07-02,-96.0,36.1,nan,0.4
";

    #[test]
    fn missing_tokens() {
        for token in ["", "  ", "NA", "na", "NaN", "NAN"] {
            assert!(is_missing_token(token), "{token:?}");
        }
        assert!(!is_missing_token("0"));
    }

    #[test]
    fn reads_all_value_columns_by_default() {
        let ds = read_stations_from_reader(CSV.as_bytes(), &StationCsvOptions::default(), CRS::default())
            .unwrap();
        assert_eq!(ds.variables(), ["tmax", "prcp"]);
        assert_eq!(ds.stations().len(), 2);
        assert_eq!(ds.day_count(), 2);
        assert_eq!(ds.coverage(), vec![2, 3]);
    }

    #[test]
    fn selected_variables_and_custom_columns() {
        let csv = "id,day,x,y,prcp,tmax\nS1,2021-01-05,-100.0,40.0,2.0,10.0\n";
        let options = StationCsvOptions {
            station_column: "id".into(),
            date_column: "day".into(),
            lon_column: "x".into(),
            lat_column: "y".into(),
            variables: vec!["tmax".into()],
        };
        let ds = read_stations_from_reader(csv.as_bytes(), &options, CRS::default()).unwrap();
        assert_eq!(ds.variables(), ["tmax"]);
        let date = NaiveDate::from_ymd_opt(2021, 1, 5).unwrap();
        assert_eq!(ds.samples(date, 0)[0].value, 10.0);
    }

    #[test]
    fn missing_column_fails() {
        let options = StationCsvOptions {
            variables: vec!["snow".into()],
            ..Default::default()
        };
        let err = read_stations_from_reader(CSV.as_bytes(), &options, CRS::default());
        assert!(matches!(err, Err(Error::InvalidRecord { .. })));
    }

    #[test]
    fn bad_date_reports_line() {
        let csv = "station,date,lon,lat,tmax\nA,07/01/2020,-97.0,35.0,1.0\n";
        match read_stations_from_reader(csv.as_bytes(), &StationCsvOptions::default(), CRS::default()) {
            Err(Error::InvalidRecord { record, .. }) => assert_eq!(record, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_rows_fail() {
        let csv = "station,date,lon,lat,tmax\nA,2020-07-01,-97.0,35.0,1.0\nA,2020-07-01,-97.0,35.0,2.0\n";
        let err = read_stations_from_reader(csv.as_bytes(), &StationCsvOptions::default(), CRS::default());
        assert!(matches!(err, Err(Error::DuplicateObservation { .. })));
    }

    #[test]
    fn empty_file_fails() {
        let csv = "station,date,lon,lat,tmax\n";
        assert!(read_stations_from_reader(csv.as_bytes(), &StationCsvOptions::default(), CRS::default()).is_err());
    }

    #[test]
    fn reads_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();
        let ds = read_stations(file.path(), &StationCsvOptions::default(), CRS::default()).unwrap();
        assert_eq!(ds.stations()[0].id, "A");
    }
}
