//! Side channels: progress events and surface dumps
//!
//! Both are observational. Nothing written here is read back by the
//! pipeline, and a failing sink never fails a day.

use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use wxkrige_core::Raster;
use wxkrige_core::io::write_geotiff;

use crate::report::DayState;

/// Receives day lifecycle events from worker threads
pub trait DayObserver: Sync {
    fn day_started(&self, _date: NaiveDate) {}

    fn day_finished(&self, _date: NaiveDate, _state: DayState, _elapsed: Duration) {}
}

/// Observer that logs one line per finished day
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl DayObserver for LogObserver {
    fn day_started(&self, date: NaiveDate) {
        tracing::debug!("Day {date} started");
    }

    fn day_finished(&self, date: NaiveDate, state: DayState, elapsed: Duration) {
        match state {
            DayState::Failed => tracing::warn!("Day {date} failed after {:.2?}", elapsed),
            _ => tracing::info!("Day {date} done in {:.2?}", elapsed),
        }
    }
}

/// Which surface is being written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Estimate,
    Variance,
}

impl fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceKind::Estimate => write!(f, "estimate"),
            SurfaceKind::Variance => write!(f, "variance"),
        }
    }
}

/// Destination for masked lattice surfaces
pub trait SurfaceSink: Sync {
    fn write_surface(
        &self,
        date: NaiveDate,
        variable: &str,
        kind: SurfaceKind,
        surface: &Raster<f64>,
    ) -> wxkrige_core::Result<()>;
}

/// Writes `<variable>_<date>_<kind>.tif` into a directory.
///
/// Characters outside `[A-Za-z0-9._-]` in the variable name become `_`, so
/// every file stays directly inside the directory.
#[derive(Debug, Clone)]
pub struct GeoTiffSink {
    dir: PathBuf,
}

impl GeoTiffSink {
    /// Create the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> wxkrige_core::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, date: NaiveDate, variable: &str, kind: SurfaceKind) -> PathBuf {
        self.dir.join(format!("{}_{date}_{kind}.tif", file_safe(variable)))
    }
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect()
}

impl SurfaceSink for GeoTiffSink {
    fn write_surface(
        &self,
        date: NaiveDate,
        variable: &str,
        kind: SurfaceKind,
        surface: &Raster<f64>,
    ) -> wxkrige_core::Result<()> {
        write_geotiff(surface, self.path_for(date, variable, kind))
    }
}
