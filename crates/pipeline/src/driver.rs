//! Day-parallel driver
//!
//! Setup builds everything shared across days exactly once: the resolved
//! variable list, the prediction lattice and the zone index. Each selected
//! day then moves `Pending → Running → Done | Failed` on a worker thread.
//! Results are merged into one table only after every day has finished.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use wxkrige_algorithms::zones::ZoneIndex;
use wxkrige_core::{GridDefinition, PredictionLattice, StationDataset};

use crate::config::PipelineConfig;
use crate::day::run_day;
use crate::error::{Error, Result};
use crate::report::{DayReport, DayState, RunReport};
use crate::sink::{DayObserver, SurfaceSink};
use crate::strategy::{ParallelStrategy, ProcessingMode};

/// Immutable run state shared by every day
#[derive(Debug)]
pub struct Pipeline<'a> {
    dataset: &'a StationDataset,
    grid: &'a GridDefinition,
    config: PipelineConfig,
    /// (name, column index in the dataset)
    variables: Vec<(String, usize)>,
    lattice: PredictionLattice,
    zones: ZoneIndex,
}

impl<'a> Pipeline<'a> {
    /// Validate inputs and build the lattice and zone index.
    ///
    /// Any error here is a setup failure; no day has been dispatched yet.
    pub fn new(
        dataset: &'a StationDataset,
        grid: &'a GridDefinition,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;

        if dataset.crs().is_geographic() {
            return Err(wxkrige_core::Error::GeographicWorkingCrs(dataset.crs().identifier()).into());
        }
        if !dataset.crs().is_equivalent(&grid.crs()) {
            return Err(wxkrige_core::Error::CrsMismatch(
                dataset.crs().identifier(),
                grid.crs().identifier(),
            )
            .into());
        }
        if dataset.stations().is_empty() {
            return Err(Error::Config("station data is empty".into()));
        }

        let names: Vec<String> = if config.variables.is_empty() {
            dataset.variables().to_vec()
        } else {
            config.variables.clone()
        };
        let variables = names
            .into_iter()
            .map(|name| match dataset.variable_index(&name) {
                Some(idx) => Ok((name, idx)),
                None => Err(Error::UnknownVariable(name)),
            })
            .collect::<Result<Vec<_>>>()?;

        let bounds = grid.bounds().ok_or(wxkrige_core::Error::EmptyGrid)?;
        let lattice = PredictionLattice::from_extent(bounds, config.lattice_points, grid.crs())?;
        let zones = ZoneIndex::build(grid, &lattice);

        if zones.covered_cells() == 0 {
            tracing::warn!("No lattice cell centre falls inside the grid; every value will be missing");
        }
        let empty_zones = zones.cells_per_zone().iter().filter(|&&c| c == 0).count();
        if empty_zones > 0 {
            tracing::info!(
                "{empty_zones} of {} grid cells contain no lattice point and will stay missing",
                grid.len()
            );
        }
        tracing::info!(
            "Prediction lattice {}x{} ({:.0} m cells), {} variable(s)",
            lattice.rows(),
            lattice.cols(),
            lattice.cell_size(),
            variables.len()
        );

        Ok(Self {
            dataset,
            grid,
            config,
            variables,
            lattice,
            zones,
        })
    }

    pub fn dataset(&self) -> &StationDataset {
        self.dataset
    }

    pub fn grid(&self) -> &GridDefinition {
        self.grid
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn variables(&self) -> &[(String, usize)] {
        &self.variables
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn lattice(&self) -> &PredictionLattice {
        &self.lattice
    }

    pub fn zones(&self) -> &ZoneIndex {
        &self.zones
    }

    /// Days the run will process, ascending
    pub fn selected_days(&self) -> Vec<NaiveDate> {
        self.config.days.resolve(self.dataset.dates())
    }

    pub fn processing_mode(&self) -> ProcessingMode {
        ProcessingMode::for_cap(self.config.max_workers)
    }

    /// Run every selected day and merge the results.
    ///
    /// Per-day problems end up in the report; only pool or merge errors
    /// are returned.
    pub fn run(
        &self,
        observer: &dyn DayObserver,
        sink: Option<&dyn SurfaceSink>,
    ) -> Result<RunReport> {
        let started = Instant::now();
        let days = self.selected_days();
        let mode = self.processing_mode();

        let states = DayStates::new(&days);
        tracing::info!("Processing {} day(s) on {} worker(s)", days.len(), mode.workers());

        let reports: Vec<DayReport> = mode.par_map(&days, |&date| {
            states.set(date, DayState::Running);
            observer.day_started(date);
            let report = run_day(self, date, sink);
            states.set(date, report.state);
            observer.day_finished(date, report.state, report.elapsed);
            report
        })?;

        let unfinished = states.unfinished();
        if unfinished > 0 {
            return Err(Error::Internal(format!("{unfinished} day(s) never finished")));
        }

        let cell_ids = self.grid.cells().iter().map(|c| c.id.clone()).collect();
        let run = RunReport::merge(self.variable_names(), cell_ids, reports, started.elapsed())?;

        tracing::info!(
            "Finished {} day(s) in {:.2?}: {} done, {} failed, {} issue(s)",
            run.days.len(),
            run.elapsed,
            run.days_done(),
            run.days_failed(),
            run.issues.len()
        );
        Ok(run)
    }
}

/// Lifecycle of every selected day, shared with the workers
#[derive(Debug)]
struct DayStates {
    states: Mutex<BTreeMap<NaiveDate, DayState>>,
}

impl DayStates {
    fn new(days: &[NaiveDate]) -> Self {
        Self {
            states: Mutex::new(days.iter().map(|d| (*d, DayState::Pending)).collect()),
        }
    }

    fn set(&self, date: NaiveDate, state: DayState) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states.insert(date, state);
    }

    /// Days still `Pending` or `Running`
    fn unfinished(&self) -> usize {
        let states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states
            .values()
            .filter(|s| matches!(s, DayState::Pending | DayState::Running))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 7, d).unwrap()
    }

    #[test]
    fn day_states_track_lifecycle() {
        let states = DayStates::new(&[day(1), day(2)]);
        assert_eq!(states.unfinished(), 2);

        states.set(day(1), DayState::Running);
        assert_eq!(states.unfinished(), 2);

        states.set(day(1), DayState::Done);
        states.set(day(2), DayState::Running);
        assert_eq!(states.unfinished(), 1);

        states.set(day(2), DayState::Failed);
        assert_eq!(states.unfinished(), 0);
    }
}
