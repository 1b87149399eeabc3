//! Pipeline configuration
//!
//! Deserialised from the `[pipeline]` table of the run configuration.
//! Every field has a default, so an empty table is a valid configuration.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use wxkrige_algorithms::interpolation::{FitPolicy, KrigingParams, VariogramParams};

use crate::error::{Error, Result};

fn default_lattice_points() -> usize {
    5_000
}

fn default_n_lags() -> usize {
    15
}

/// Which days to process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaySelection {
    /// First day, inclusive
    pub start: Option<NaiveDate>,
    /// Last day, inclusive
    pub end: Option<NaiveDate>,
    /// Explicit days. When non-empty these are processed even if the
    /// station data has no readings for them.
    pub dates: Vec<NaiveDate>,
}

impl DaySelection {
    pub fn in_range(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }

    /// Days to process, ascending and without duplicates.
    ///
    /// Explicit dates win over `available`; both are filtered by the range.
    pub fn resolve(&self, available: impl IntoIterator<Item = NaiveDate>) -> Vec<NaiveDate> {
        let mut days: Vec<NaiveDate> = if self.dates.is_empty() {
            available.into_iter().collect()
        } else {
            self.dates.clone()
        };
        days.retain(|d| self.in_range(*d));
        days.sort_unstable();
        days.dedup();
        days
    }
}

/// Settings for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Variables to interpolate; empty means every variable in the data
    pub variables: Vec<String>,
    pub days: DaySelection,
    /// Target number of prediction lattice points
    #[serde(default = "default_lattice_points")]
    pub lattice_points: usize,
    /// Upper bound on worker threads; `None` uses every core
    pub max_workers: Option<usize>,
    pub fit_policy: FitPolicy,
    #[serde(default = "default_n_lags")]
    pub n_lags: usize,
    /// Local kriging neighbourhood size; unset means global kriging
    pub max_points: Option<usize>,
    /// Local kriging search radius in working CRS units
    pub max_radius: Option<f64>,
    /// Per-day time limit in seconds
    pub day_timeout_secs: Option<f64>,
    /// Also compute kriging variance surfaces
    pub compute_variance: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            variables: Vec::new(),
            days: DaySelection::default(),
            lattice_points: default_lattice_points(),
            max_workers: None,
            fit_policy: FitPolicy::default(),
            n_lags: default_n_lags(),
            max_points: None,
            max_radius: None,
            day_timeout_secs: None,
            compute_variance: false,
        }
    }
}

impl PipelineConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.lattice_points == 0 {
            return Err(Error::Config("lattice_points must be positive".into()));
        }
        if self.n_lags == 0 {
            return Err(Error::Config("n_lags must be positive".into()));
        }
        if self.max_workers == Some(0) {
            return Err(Error::Config("max_workers must be at least 1".into()));
        }
        if self.max_points.is_some_and(|n| n < 2) {
            return Err(Error::Config("max_points must be at least 2".into()));
        }
        if self.max_radius.is_some_and(|r| !(r > 0.0 && r.is_finite())) {
            return Err(Error::Config("max_radius must be positive".into()));
        }
        if self.day_timeout_secs.is_some_and(|t| !(t > 0.0 && t.is_finite())) {
            return Err(Error::Config("day_timeout_secs must be positive".into()));
        }
        if let (Some(start), Some(end)) = (self.days.start, self.days.end)
            && start > end
        {
            return Err(Error::Config(format!("start {start} is after end {end}")));
        }
        Ok(())
    }

    pub fn day_timeout(&self) -> Option<Duration> {
        self.day_timeout_secs.map(Duration::from_secs_f64)
    }

    pub fn variogram_params(&self) -> VariogramParams {
        VariogramParams {
            n_lags: self.n_lags,
            ..Default::default()
        }
    }

    /// Kriging parameters without a deadline
    pub fn kriging_params(&self) -> KrigingParams {
        KrigingParams {
            max_points: self.max_points,
            max_radius: self.max_radius,
            compute_variance: self.compute_variance,
            deadline: None,
        }
    }
}
