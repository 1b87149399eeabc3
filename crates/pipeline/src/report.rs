//! Per-day results, issues and the merged result table

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Why a (day, variable) pair did not produce a clean surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    /// Fewer than 2 non-missing observations
    InsufficientData,
    /// Variogram fit was degenerate; a flat model was used instead
    FitNonconvergence,
    /// Kriging system could not be solved
    PredictionFailure,
    /// The per-day deadline passed
    Timeout,
}

impl IssueKind {
    /// Whether the variable's cells end up missing
    pub fn is_failure(&self) -> bool {
        !matches!(self, IssueKind::FitNonconvergence)
    }
}

/// One recorded problem for a (day, variable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub date: NaiveDate,
    pub variable: String,
    pub kind: IssueKind,
    pub message: String,
}

/// Lifecycle of a day in the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayState {
    Pending,
    Running,
    Done,
    Failed,
}

/// Variogram used for one (day, variable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariogramDiagnostic {
    pub date: NaiveDate,
    pub variable: String,
    pub stations: usize,
    pub nugget: f64,
    pub partial_sill: f64,
    pub range: f64,
    pub fallback: bool,
}

/// Everything one day's worker hands back
#[derive(Debug, Clone)]
pub struct DayReport {
    pub date: NaiveDate,
    pub state: DayState,
    /// Per variable, the mean of every grid cell in mesh order
    pub values: Vec<Vec<Option<f64>>>,
    pub issues: Vec<Issue>,
    pub diagnostics: Vec<VariogramDiagnostic>,
    pub elapsed: Duration,
}

/// Final state of one day in the run summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub state: DayState,
    pub elapsed_secs: f64,
    pub issues: usize,
}

/// One output row
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow<'a> {
    pub date: NaiveDate,
    pub cell_id: &'a str,
    pub values: &'a [Option<f64>],
}

/// Long-format result table keyed by (day, cell index)
#[derive(Debug, Clone)]
pub struct ResultTable {
    variables: Vec<String>,
    cell_ids: Vec<String>,
    rows: BTreeMap<(NaiveDate, usize), Vec<Option<f64>>>,
}

impl ResultTable {
    pub fn new(variables: Vec<String>, cell_ids: Vec<String>) -> Self {
        Self {
            variables,
            cell_ids,
            rows: BTreeMap::new(),
        }
    }

    /// Add one row. A second row for the same key is an error.
    pub fn insert(&mut self, date: NaiveDate, cell: usize, values: Vec<Option<f64>>) -> Result<()> {
        if cell >= self.cell_ids.len() || values.len() != self.variables.len() {
            return Err(Error::Internal(format!(
                "row for {date} cell index {cell} does not fit the table"
            )));
        }
        if self.rows.contains_key(&(date, cell)) {
            return Err(Error::DuplicateKey { date, cell });
        }
        self.rows.insert((date, cell), values);
        Ok(())
    }

    /// Add every cell of a day, transposing per-variable columns into rows
    pub fn insert_day(&mut self, report: &DayReport) -> Result<()> {
        for cell in 0..self.cell_ids.len() {
            let values = report
                .values
                .iter()
                .map(|column| column.get(cell).copied().flatten())
                .collect();
            self.insert(report.date, cell, values)?;
        }
        Ok(())
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up one value
    pub fn value(&self, date: NaiveDate, cell: usize, variable: usize) -> Option<f64> {
        self.rows.get(&(date, cell))?.get(variable).copied().flatten()
    }

    /// Rows ordered by day, then mesh order
    pub fn rows(&self) -> impl Iterator<Item = ResultRow<'_>> + '_ {
        self.rows.iter().map(|(&(date, cell), values)| ResultRow {
            date,
            cell_id: &self.cell_ids[cell],
            values,
        })
    }

    /// Whether any cell of any day has a value
    pub fn has_values(&self) -> bool {
        self.rows.values().flatten().any(Option::is_some)
    }

    /// Number of non-missing values per variable
    pub fn value_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.variables.len()];
        for values in self.rows.values() {
            for (count, v) in counts.iter_mut().zip(values) {
                if v.is_some() {
                    *count += 1;
                }
            }
        }
        counts
    }

    /// `date,cell_id,<variables...>`, missing values as empty fields
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let mut header = vec!["date".to_string(), "cell_id".to_string()];
        header.extend(self.variables.iter().cloned());
        wtr.write_record(&header)?;

        for row in self.rows() {
            let mut record = Vec::with_capacity(2 + row.values.len());
            record.push(row.date.to_string());
            record.push(row.cell_id.to_string());
            record.extend(row.values.iter().map(|v| v.map(|v| v.to_string()).unwrap_or_default()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_csv(BufWriter::new(File::create(path)?))
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub table: ResultTable,
    pub days: Vec<DaySummary>,
    pub issues: Vec<Issue>,
    pub diagnostics: Vec<VariogramDiagnostic>,
    pub elapsed: Duration,
}

#[derive(Serialize)]
struct SummaryJson<'a> {
    days_total: usize,
    days_done: usize,
    days_failed: usize,
    rows: usize,
    variables: &'a [String],
    values_per_variable: Vec<usize>,
    elapsed_secs: f64,
    days: &'a [DaySummary],
    issues: &'a [Issue],
}

impl RunReport {
    /// Merge day reports into one table, ordered by day then mesh order
    pub fn merge(
        variables: Vec<String>,
        cell_ids: Vec<String>,
        mut reports: Vec<DayReport>,
        elapsed: Duration,
    ) -> Result<Self> {
        reports.sort_by_key(|r| r.date);

        let mut table = ResultTable::new(variables, cell_ids);
        let mut days = Vec::with_capacity(reports.len());
        let mut issues = Vec::new();
        let mut diagnostics = Vec::new();

        for report in reports {
            table.insert_day(&report)?;
            days.push(DaySummary {
                date: report.date,
                state: report.state,
                elapsed_secs: report.elapsed.as_secs_f64(),
                issues: report.issues.len(),
            });
            issues.extend(report.issues);
            diagnostics.extend(report.diagnostics);
        }

        Ok(Self {
            table,
            days,
            issues,
            diagnostics,
            elapsed,
        })
    }

    pub fn days_done(&self) -> usize {
        self.days.iter().filter(|d| d.state == DayState::Done).count()
    }

    pub fn days_failed(&self) -> usize {
        self.days.iter().filter(|d| d.state == DayState::Failed).count()
    }

    /// A run succeeds when at least one day produced at least one value
    pub fn is_success(&self) -> bool {
        self.table.has_values()
    }

    /// Issue summary as pretty JSON
    pub fn write_summary_json<W: Write>(&self, writer: W) -> Result<()> {
        let summary = SummaryJson {
            days_total: self.days.len(),
            days_done: self.days_done(),
            days_failed: self.days_failed(),
            rows: self.table.len(),
            variables: self.table.variables(),
            values_per_variable: self.table.value_counts(),
            elapsed_secs: self.elapsed.as_secs_f64(),
            days: &self.days,
            issues: &self.issues,
        };
        serde_json::to_writer_pretty(writer, &summary)?;
        Ok(())
    }

    pub fn write_summary_json_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_summary_json(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// One CSV row per (day, variable) that reached the fitting step
    pub fn write_diagnostics_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for diag in &self.diagnostics {
            wtr.serialize(diag)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_diagnostics_csv_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_diagnostics_csv(BufWriter::new(File::create(path)?))
    }
}
