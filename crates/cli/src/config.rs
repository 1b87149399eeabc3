//! Run configuration file

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use wxkrige_core::CRS;
use wxkrige_core::io::{GridOptions, StationCsvOptions};
use wxkrige_pipeline::PipelineConfig;

/// Top-level `wxkrige.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    /// Station observation CSV
    pub stations: Option<PathBuf>,
    /// Grid polygon GeoJSON
    pub grid: Option<PathBuf>,
    /// Planar CRS every coordinate is projected into
    #[serde(default = "default_working_epsg")]
    pub working_epsg: u32,
    #[serde(default)]
    pub csv: StationCsvOptions,
    #[serde(default)]
    pub geojson: GridOptions,
}

fn default_working_epsg() -> u32 {
    5070
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            stations: None,
            grid: None,
            working_epsg: default_working_epsg(),
            csv: StationCsvOptions::default(),
            geojson: GridOptions::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Long-format result table
    #[serde(default = "default_results")]
    pub results: PathBuf,
    /// Issue summary JSON
    pub summary: Option<PathBuf>,
    /// Variogram diagnostics CSV
    pub diagnostics: Option<PathBuf>,
    /// Directory for GeoTIFF surface dumps
    pub surfaces: Option<PathBuf>,
}

fn default_results() -> PathBuf {
    PathBuf::from("results.csv")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results: default_results(),
            summary: None,
            diagnostics: None,
            surfaces: None,
        }
    }
}

impl RunConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Projected CRS all distances are measured in
    pub fn working_crs(&self) -> Result<CRS> {
        let crs = CRS::from_epsg(self.input.working_epsg);
        if crs.is_geographic() {
            anyhow::bail!(
                "input.working_epsg = {} is geographic; use a projected CRS such as 5070",
                self.input.working_epsg
            );
        }
        Ok(crs)
    }

    pub fn stations_path(&self) -> Result<&Path> {
        self.input
            .stations
            .as_deref()
            .context("No station CSV given (set input.stations or pass --stations)")
    }

    pub fn grid_path(&self) -> Result<&Path> {
        self.input
            .grid
            .as_deref()
            .context("No grid GeoJSON given (set input.grid or pass --grid)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wxkrige_algorithms::interpolation::FitPolicy;

    #[test]
    fn empty_file_uses_defaults() {
        let config = RunConfig::parse("").unwrap();
        assert_eq!(config.input.working_epsg, 5070);
        assert_eq!(config.input.csv.station_column, "station");
        assert_eq!(config.input.geojson.epsg, 4326);
        assert_eq!(config.output.results, PathBuf::from("results.csv"));
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert!(config.stations_path().is_err());
    }

    #[test]
    fn parses_sections() {
        let text = r#"
            [input]
            stations = "data/ghcn.csv"
            grid = "data/huc8.geojson"

            [input.csv]
            station_column = "STATION"
            variables = ["TMAX", "TMIN"]

            [input.geojson]
            id_field = "huc8"

            [output]
            results = "out/huc8.csv"
            surfaces = "out/tif"

            [pipeline]
            max_workers = 8
            fit_policy = "fit"

            [pipeline.days]
            start = "1990-01-01"
            end = "1990-12-31"
        "#;
        let config = RunConfig::parse(text).unwrap();
        assert_eq!(config.stations_path().unwrap(), Path::new("data/ghcn.csv"));
        assert_eq!(config.input.csv.variables, ["TMAX", "TMIN"]);
        assert_eq!(config.input.geojson.id_field, "huc8");
        assert_eq!(config.output.surfaces, Some(PathBuf::from("out/tif")));
        assert_eq!(config.pipeline.max_workers, Some(8));
        assert_eq!(config.pipeline.fit_policy, FitPolicy::Fit);
        assert!(config.pipeline.days.start.is_some());
    }

    #[test]
    fn working_crs_must_be_projected() {
        let config = RunConfig::parse("[input]\nworking_epsg = 4326").unwrap();
        assert!(config.working_crs().is_err());

        let config = RunConfig::parse("[input]\nworking_epsg = 32614").unwrap();
        assert_eq!(config.working_crs().unwrap(), CRS::from_epsg(32614));
        assert_eq!(RunConfig::default().working_crs().unwrap(), CRS::conus_albers());
    }

    #[test]
    fn rejects_unknown_sections() {
        assert!(RunConfig::parse("[inputs]\nstations = \"a.csv\"").is_err());
        assert!(RunConfig::parse("[output]\nresult = \"a.csv\"").is_err());
    }
}
