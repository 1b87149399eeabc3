//! # wxkrige pipeline
//!
//! Day-parallel driver for daily station kriging.
//!
//! This crate provides:
//! - `Pipeline`: one-time setup plus the day loop
//! - `PipelineConfig`: day selection, variables, lattice and kriging settings
//! - `RunReport`/`ResultTable`: the merged (day, cell) table and issue log
//! - Observer and surface sink hooks for progress and GeoTIFF dumps

pub mod config;
mod day;
pub mod driver;
pub mod error;
pub mod report;
pub mod sink;
pub mod strategy;

pub use config::{DaySelection, PipelineConfig};
pub use driver::Pipeline;
pub use error::{Error, Result};
pub use report::{
    DayReport, DayState, DaySummary, Issue, IssueKind, ResultRow, ResultTable, RunReport,
    VariogramDiagnostic,
};
pub use sink::{DayObserver, GeoTiffSink, LogObserver, SurfaceKind, SurfaceSink};
pub use strategy::{ParallelStrategy, ProcessingMode};
