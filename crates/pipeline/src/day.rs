//! One day's pipeline: variogram, fit, kriging, mask and areal means for
//! every configured variable

use chrono::NaiveDate;
use std::time::Instant;
use wxkrige_algorithms::interpolation::{
    FittedVariogram, KrigingParams, SamplePoint, empirical_variogram, fit_spherical, ordinary_kriging,
};
use wxkrige_algorithms::statistics::zonal_means;
use wxkrige_core::Error as CoreError;

use crate::driver::Pipeline;
use crate::report::{DayReport, DayState, Issue, IssueKind, VariogramDiagnostic};
use crate::sink::{SurfaceKind, SurfaceSink};

/// Outcome of one variable on one day
struct VariableOutcome {
    means: Option<Vec<Option<f64>>>,
    issues: Vec<Issue>,
    diagnostic: Option<VariogramDiagnostic>,
}

pub(crate) fn run_day(
    pipeline: &Pipeline<'_>,
    date: NaiveDate,
    sink: Option<&dyn SurfaceSink>,
) -> DayReport {
    let started = Instant::now();
    let deadline = pipeline.config().day_timeout().map(|t| started + t);
    let cells = pipeline.grid().len();

    let mut values = Vec::with_capacity(pipeline.variables().len());
    let mut issues = Vec::new();
    let mut diagnostics = Vec::new();

    for (name, index) in pipeline.variables() {
        let outcome = if deadline.is_some_and(|d| Instant::now() > d) {
            VariableOutcome {
                means: None,
                issues: vec![issue(date, name, IssueKind::Timeout, "day deadline passed".into())],
                diagnostic: None,
            }
        } else {
            run_variable(pipeline, date, name, *index, deadline, sink)
        };

        values.push(outcome.means.unwrap_or_else(|| vec![None; cells]));
        issues.extend(outcome.issues);
        diagnostics.extend(outcome.diagnostic);
    }

    let state = if issues.iter().any(|i| i.kind.is_failure()) {
        DayState::Failed
    } else {
        DayState::Done
    };

    DayReport {
        date,
        state,
        values,
        issues,
        diagnostics,
        elapsed: started.elapsed(),
    }
}

fn run_variable(
    pipeline: &Pipeline<'_>,
    date: NaiveDate,
    name: &str,
    index: usize,
    deadline: Option<Instant>,
    sink: Option<&dyn SurfaceSink>,
) -> VariableOutcome {
    let points: Vec<SamplePoint> = pipeline
        .dataset()
        .samples(date, index)
        .into_iter()
        .map(SamplePoint::from)
        .collect();

    let mut outcome = VariableOutcome {
        means: None,
        issues: Vec::new(),
        diagnostic: None,
    };

    if points.len() < 2 {
        let message = format!("{} non-missing observation(s), need 2", points.len());
        tracing::debug!("{date} {name}: {message}");
        outcome.issues.push(issue(date, name, IssueKind::InsufficientData, message));
        return outcome;
    }

    let config = pipeline.config();
    let fitted = empirical_variogram(&points, config.variogram_params())
        .and_then(|emp| fit_spherical(&emp, config.fit_policy));

    let (variogram, fallback) = match fitted {
        Ok(v) => (v, false),
        Err(CoreError::FitNonconvergence(reason)) => {
            tracing::warn!("{date} {name}: variogram fit failed ({reason}), using flat model");
            outcome.issues.push(issue(date, name, IssueKind::FitNonconvergence, reason));
            let values: Vec<f64> = points.iter().map(|p| p.value).collect();
            (FittedVariogram::flat_for(&values), true)
        }
        Err(e) => {
            outcome.issues.push(issue(date, name, IssueKind::PredictionFailure, e.to_string()));
            return outcome;
        }
    };

    outcome.diagnostic = Some(VariogramDiagnostic {
        date,
        variable: name.to_string(),
        stations: points.len(),
        nugget: variogram.nugget,
        partial_sill: variogram.partial_sill,
        range: variogram.range,
        fallback,
    });

    let params = KrigingParams {
        deadline,
        ..config.kriging_params()
    };
    let mut result = match ordinary_kriging(&points, &variogram, pipeline.lattice(), &params) {
        Ok(r) => r,
        Err(CoreError::DeadlineExceeded) => {
            tracing::warn!("{date} {name}: day deadline passed during kriging");
            outcome.issues.push(issue(
                date,
                name,
                IssueKind::Timeout,
                "deadline passed during kriging".into(),
            ));
            return outcome;
        }
        Err(e) => {
            tracing::warn!("{date} {name}: kriging failed: {e}");
            outcome.issues.push(issue(date, name, IssueKind::PredictionFailure, e.to_string()));
            return outcome;
        }
    };

    let zones = pipeline.zones();
    let masked = zones.mask(&mut result.estimate).and_then(|()| match result.variance.as_mut() {
        Some(var) => zones.mask(var),
        None => Ok(()),
    });
    if let Err(e) = masked {
        outcome.issues.push(issue(date, name, IssueKind::PredictionFailure, e.to_string()));
        return outcome;
    }

    if let Some(sink) = sink {
        let surfaces = std::iter::once((SurfaceKind::Estimate, &result.estimate))
            .chain(result.variance.as_ref().map(|v| (SurfaceKind::Variance, v)));
        for (kind, surface) in surfaces {
            if let Err(e) = sink.write_surface(date, name, kind, surface) {
                tracing::warn!("{date} {name}: cannot write {kind} surface: {e}");
            }
        }
    }

    match zonal_means(&result.estimate, zones) {
        Ok(means) => outcome.means = Some(means),
        Err(e) => outcome.issues.push(issue(date, name, IssueKind::PredictionFailure, e.to_string())),
    }
    outcome
}

fn issue(date: NaiveDate, variable: &str, kind: IssueKind, message: String) -> Issue {
    Issue {
        date,
        variable: variable.to_string(),
        kind,
        message,
    }
}
