//! Variogram estimation and spherical model fitting
//!
//! The semivariance γ(h) measures spatial dissimilarity as a function of
//! separation distance h:
//! ```text
//! γ(h) = (1/2N(h)) Σ [z(xᵢ) - z(xⱼ)]²   for all pairs with |xᵢ-xⱼ| ∈ h±Δh/2
//! ```
//!
//! Only the spherical family is fitted. Two policies are available: a fixed
//! policy that takes the usual initial estimates as the final model, and a
//! weighted least-squares grid search.
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use serde::{Deserialize, Serialize};
use wxkrige_core::{Error, Result};

use super::SamplePoint;

/// Empirical variogram: semivariance values at discrete lag distances.
#[derive(Debug, Clone)]
pub struct EmpiricalVariogram {
    /// Lag distances (bin centers)
    pub lags: Vec<f64>,
    /// Semivariance values γ(h) at each lag, NaN for empty bins
    pub semivariance: Vec<f64>,
    /// Number of point pairs contributing to each lag bin
    pub pair_counts: Vec<usize>,
}

impl EmpiricalVariogram {
    /// Non-empty bins as (lag, semivariance, pairs)
    pub fn valid_bins(&self) -> Vec<(f64, f64, usize)> {
        self.lags
            .iter()
            .zip(&self.semivariance)
            .zip(&self.pair_counts)
            .filter(|((_, sv), cnt)| !sv.is_nan() && **cnt > 0)
            .map(|((&lag, &sv), &cnt)| (lag, sv, cnt))
            .collect()
    }
}

/// How the spherical model parameters are chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitPolicy {
    /// Initial estimates, not optimised: nugget 0, partial sill from the
    /// tail of the empirical variogram, range a third of the largest lag.
    #[default]
    Fixed,
    /// Pair-weighted least-squares grid search over nugget, sill and range
    Fit,
}

/// Fitted spherical variogram
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedVariogram {
    /// Nugget (c₀): semivariance at h → 0
    pub nugget: f64,
    /// Partial sill (c): sill minus nugget
    pub partial_sill: f64,
    /// Range (a): distance at which the model reaches the sill
    pub range: f64,
    /// Weighted residual sum of squares (0 for unfitted models)
    pub rss: f64,
}

impl FittedVariogram {
    /// Pure-nugget model. Every off-diagonal semivariance is equal, so
    /// ordinary kriging weights are uniform and the surface is the sample
    /// mean.
    pub fn flat(nugget: f64) -> Self {
        Self {
            nugget,
            partial_sill: 0.0,
            range: 0.0,
            rss: 0.0,
        }
    }

    /// Flat model scaled to the sample variance (1.0 for constant samples)
    pub fn flat_for(values: &[f64]) -> Self {
        let n = values.len() as f64;
        let variance = if values.len() > 1 {
            let mean = values.iter().sum::<f64>() / n;
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
        } else {
            0.0
        };
        Self::flat(if variance > 0.0 && variance.is_finite() { variance } else { 1.0 })
    }

    pub fn sill(&self) -> f64 {
        self.nugget + self.partial_sill
    }

    pub fn is_flat(&self) -> bool {
        self.partial_sill <= 0.0
    }

    /// Evaluate the model at distance h
    pub fn evaluate(&self, h: f64) -> f64 {
        if h < 1e-15 {
            return 0.0;
        }
        if h >= self.range {
            return self.sill();
        }
        let hr = h / self.range;
        self.nugget + self.partial_sill * (1.5 * hr - 0.5 * hr * hr * hr)
    }
}

/// Parameters for empirical variogram computation
#[derive(Debug, Clone, Copy)]
pub struct VariogramParams {
    /// Number of lag bins (default 15)
    pub n_lags: usize,
    /// Maximum lag distance. If None, half the max pairwise distance.
    pub max_lag: Option<f64>,
    /// Lag tolerance as fraction of bin width (default 1.0 = full bin)
    pub lag_tolerance: f64,
}

impl Default for VariogramParams {
    fn default() -> Self {
        Self {
            n_lags: 15,
            max_lag: None,
            lag_tolerance: 1.0,
        }
    }
}

/// Compute the empirical variogram from sample points.
///
/// Fails with [`Error::InsufficientData`] below 2 points and with
/// [`Error::FitNonconvergence`] when every point shares one location.
pub fn empirical_variogram(
    points: &[SamplePoint],
    params: VariogramParams,
) -> Result<EmpiricalVariogram> {
    let n = points.len();
    if n < 2 {
        return Err(Error::InsufficientData { needed: 2, found: n });
    }
    if params.n_lags == 0 {
        return Err(Error::InvalidParameter {
            name: "n_lags",
            value: "0".into(),
            reason: "at least one lag bin is required".into(),
        });
    }

    let max_lag = match params.max_lag {
        Some(m) => m,
        None => {
            let mut max_dist = 0.0_f64;
            for i in 0..n {
                for j in (i + 1)..n {
                    max_dist = max_dist.max(points[i].dist(points[j].x, points[j].y));
                }
            }
            max_dist / 2.0
        }
    };

    if !(max_lag > 0.0 && max_lag.is_finite()) {
        return Err(Error::FitNonconvergence(
            "no positive separation between samples".into(),
        ));
    }

    let n_lags = params.n_lags;
    let bin_width = max_lag / n_lags as f64;
    let tol = bin_width * params.lag_tolerance;

    let lags: Vec<f64> = (0..n_lags).map(|k| (k as f64 + 0.5) * bin_width).collect();
    let mut semivariance = vec![0.0_f64; n_lags];
    let mut pair_counts = vec![0_usize; n_lags];

    for i in 0..n {
        for j in (i + 1)..n {
            let d = points[i].dist(points[j].x, points[j].y);
            let dz = points[i].value - points[j].value;

            let bin = (d / bin_width - 0.5).round() as isize;
            if bin >= 0 && (bin as usize) < n_lags {
                let bin = bin as usize;
                if (d - lags[bin]).abs() <= tol / 2.0 {
                    semivariance[bin] += dz * dz;
                    pair_counts[bin] += 1;
                }
            }
        }
    }

    for (sv, &count) in semivariance.iter_mut().zip(&pair_counts) {
        if count > 0 {
            *sv /= 2.0 * count as f64;
        } else {
            *sv = f64::NAN;
        }
    }

    Ok(EmpiricalVariogram {
        lags,
        semivariance,
        pair_counts,
    })
}

/// Fit a spherical model under the given policy.
///
/// Degenerate input (no valid bins, fewer than 3 for [`FitPolicy::Fit`], or
/// no positive semivariance) fails with [`Error::FitNonconvergence`].
pub fn fit_spherical(empirical: &EmpiricalVariogram, policy: FitPolicy) -> Result<FittedVariogram> {
    let valid = empirical.valid_bins();
    match policy {
        FitPolicy::Fixed => fixed_estimate(&valid),
        FitPolicy::Fit => grid_search(&valid),
    }
}

fn fixed_estimate(valid: &[(f64, f64, usize)]) -> Result<FittedVariogram> {
    if valid.is_empty() {
        return Err(Error::FitNonconvergence("no populated lag bins".into()));
    }

    let tail = &valid[valid.len().saturating_sub(5)..];
    let partial_sill = tail.iter().map(|(_, sv, _)| sv).sum::<f64>() / tail.len() as f64;
    let range = valid.iter().map(|(lag, _, _)| *lag).fold(0.0_f64, f64::max) / 3.0;

    if !(partial_sill > 0.0 && partial_sill.is_finite()) {
        return Err(Error::FitNonconvergence("semivariance is not positive".into()));
    }
    if range <= 0.0 {
        return Err(Error::FitNonconvergence("range is not positive".into()));
    }

    Ok(FittedVariogram {
        nugget: 0.0,
        partial_sill,
        range,
        rss: 0.0,
    })
}

fn grid_search(valid: &[(f64, f64, usize)]) -> Result<FittedVariogram> {
    if valid.len() < 3 {
        return Err(Error::FitNonconvergence(format!(
            "need at least 3 populated lag bins, found {}",
            valid.len()
        )));
    }

    let max_lag = valid.last().map(|(l, _, _)| *l).unwrap_or(1.0);
    let max_sv = valid.iter().map(|(_, sv, _)| *sv).fold(0.0_f64, f64::max);

    if max_sv <= 0.0 {
        return Err(Error::FitNonconvergence("semivariance is not positive".into()));
    }

    let n_nugget = 10;
    let n_sill = 10;
    let n_range = 20;

    let mut best = FittedVariogram {
        nugget: 0.0,
        partial_sill: max_sv,
        range: max_lag,
        rss: f64::MAX,
    };

    for in_ in 0..=n_nugget {
        let nugget = max_sv * in_ as f64 / (2.0 * n_nugget as f64);
        for is in 1..=n_sill {
            let sill = max_sv * is as f64 / n_sill as f64;
            if sill <= nugget {
                continue;
            }
            for ir in 1..=n_range {
                let range = max_lag * 2.0 * ir as f64 / n_range as f64;
                let trial = FittedVariogram {
                    nugget,
                    partial_sill: sill - nugget,
                    range,
                    rss: 0.0,
                };

                let rss: f64 = valid
                    .iter()
                    .map(|&(lag, sv, cnt)| {
                        let residual = sv - trial.evaluate(lag);
                        cnt as f64 * residual * residual
                    })
                    .sum();

                if rss < best.rss {
                    best = FittedVariogram { rss, ..trial };
                }
            }
        }
    }

    if !best.rss.is_finite() {
        return Err(Error::FitNonconvergence("residuals are not finite".into()));
    }
    Ok(best)
}
