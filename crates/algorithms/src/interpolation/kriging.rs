//! Ordinary Kriging interpolation
//!
//! Best Linear Unbiased Estimator (BLUE) for spatial data. Uses a fitted
//! variogram model to compute optimal interpolation weights that minimize
//! estimation variance while satisfying an unbiasedness constraint.
//!
//! The kriging system for n sample points:
//! ```text
//! [γ(x₁,x₁) ... γ(x₁,xₙ) 1] [w₁]   [γ(x₁,x₀)]
//! [   ...     ...    ...    .]  [. ] = [   ...    ]
//! [γ(xₙ,x₁) ... γ(xₙ,xₙ) 1] [wₙ]   [γ(xₙ,x₀)]
//! [  1       ...    1       0] [μ ]   [    1     ]
//! ```
//! where γ is the semivariance from the fitted variogram, x₀ is the
//! target location, and μ is the Lagrange multiplier ensuring Σwᵢ = 1.
//!
//! With the global neighbourhood the left-hand matrix does not depend on
//! the target, so it is factorised once and reused for every lattice point.
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use nalgebra::{DMatrix, DVector, Dyn, LU};
use std::time::Instant;
use wxkrige_core::raster::{PredictionLattice, Raster};
use wxkrige_core::{Error, Result};

use super::SamplePoint;
use super::variogram::FittedVariogram;

/// Distance under which a target is treated as sitting on a sample
const COINCIDENT: f64 = 1e-9;

/// Parameters for Ordinary Kriging interpolation
#[derive(Debug, Clone, Default)]
pub struct KrigingParams {
    /// Use only the nearest `max_points` samples per target.
    /// `None` together with `max_radius: None` means the global neighbourhood.
    pub max_points: Option<usize>,
    /// Ignore samples farther than this from the target
    pub max_radius: Option<f64>,
    /// Whether to produce a kriging variance raster alongside the estimate
    pub compute_variance: bool,
    /// Give up once this instant has passed; checked once per lattice row
    pub deadline: Option<Instant>,
}

impl KrigingParams {
    fn is_global(&self) -> bool {
        self.max_points.is_none() && self.max_radius.is_none()
    }
}

/// Result of Ordinary Kriging interpolation
#[derive(Debug, Clone)]
pub struct KrigingResult {
    /// Interpolated values on the lattice
    pub estimate: Raster<f64>,
    /// Kriging variance. `None` if not requested.
    pub variance: Option<Raster<f64>>,
}

/// Interpolate scattered points onto every point of a prediction lattice.
///
/// # Errors
/// - [`Error::InsufficientData`] with fewer than 2 points
/// - [`Error::SingularSystem`] if a kriging system cannot be solved
/// - [`Error::DeadlineExceeded`] if `params.deadline` passes mid-way
pub fn ordinary_kriging(
    points: &[SamplePoint],
    variogram: &FittedVariogram,
    lattice: &PredictionLattice,
    params: &KrigingParams,
) -> Result<KrigingResult> {
    let n = points.len();
    if n < 2 {
        return Err(Error::InsufficientData { needed: 2, found: n });
    }

    let mut predictor: Box<dyn Predictor + '_> = if variogram.is_flat() {
        Box::new(FlatPredictor::new(points, variogram))
    } else if params.is_global() {
        Box::new(GlobalPredictor::new(points, variogram)?)
    } else {
        Box::new(LocalPredictor {
            points,
            variogram,
            max_points: params.max_points.unwrap_or(n).max(1),
            max_radius: params.max_radius,
        })
    };

    let len = lattice.len();
    let mut estimates = Vec::with_capacity(len);
    let mut variances = Vec::with_capacity(if params.compute_variance { len } else { 0 });

    for row in 0..lattice.rows() {
        if params.deadline.is_some_and(|d| Instant::now() > d) {
            return Err(Error::DeadlineExceeded);
        }
        for col in 0..lattice.cols() {
            let (x0, y0) = lattice.point(row, col);
            let (est, var) = match nearest_coincident(points, x0, y0) {
                Some(idx) => (points[idx].value, 0.0),
                None => predictor.predict(x0, y0, params.compute_variance)?,
            };
            estimates.push(est);
            if params.compute_variance {
                variances.push(var);
            }
        }
    }

    let estimate = lattice.to_raster(estimates)?;
    let variance = if params.compute_variance {
        Some(lattice.to_raster(variances)?)
    } else {
        None
    };

    Ok(KrigingResult { estimate, variance })
}

/// Index of a sample sitting on the target, if any
fn nearest_coincident(points: &[SamplePoint], x0: f64, y0: f64) -> Option<usize> {
    points
        .iter()
        .position(|p| p.dist_sq(x0, y0) < COINCIDENT * COINCIDENT)
}

trait Predictor {
    /// Estimate and variance at one target (variance NaN when not requested)
    fn predict(&mut self, x0: f64, y0: f64, with_variance: bool) -> Result<(f64, f64)>;
}

/// Pure-nugget model: uniform weights, mean estimate, variance c₀(1 + 1/n)
struct FlatPredictor {
    mean: f64,
    variance: f64,
}

impl FlatPredictor {
    fn new(points: &[SamplePoint], variogram: &FittedVariogram) -> Self {
        let n = points.len() as f64;
        Self {
            mean: points.iter().map(|p| p.value).sum::<f64>() / n,
            variance: variogram.nugget * (1.0 + 1.0 / n),
        }
    }
}

impl Predictor for FlatPredictor {
    fn predict(&mut self, _x0: f64, _y0: f64, with_variance: bool) -> Result<(f64, f64)> {
        Ok((self.mean, if with_variance { self.variance } else { f64::NAN }))
    }
}

/// Global neighbourhood: one LU factorisation for the whole lattice
struct GlobalPredictor<'a> {
    points: &'a [SamplePoint],
    variogram: &'a FittedVariogram,
    lu: LU<f64, Dyn, Dyn>,
    /// A⁻¹·[z; 0], so the estimate is a dot product with the right-hand side
    dual: DVector<f64>,
    rhs: DVector<f64>,
}

impl<'a> GlobalPredictor<'a> {
    fn new(points: &'a [SamplePoint], variogram: &'a FittedVariogram) -> Result<Self> {
        let n = points.len();
        let lu = kriging_matrix(points, variogram).lu();
        check_pivots(&lu)?;

        let mut z = DVector::zeros(n + 1);
        for (i, p) in points.iter().enumerate() {
            z[i] = p.value;
        }
        let dual = lu.solve(&z).ok_or(Error::SingularSystem)?;

        Ok(Self {
            points,
            variogram,
            lu,
            dual,
            rhs: DVector::zeros(n + 1),
        })
    }
}

impl Predictor for GlobalPredictor<'_> {
    fn predict(&mut self, x0: f64, y0: f64, with_variance: bool) -> Result<(f64, f64)> {
        let n = self.points.len();
        for (i, p) in self.points.iter().enumerate() {
            self.rhs[i] = self.variogram.evaluate(p.dist(x0, y0));
        }
        self.rhs[n] = 1.0;

        let estimate = self.rhs.dot(&self.dual);
        if !estimate.is_finite() {
            return Err(Error::SingularSystem);
        }
        if !with_variance {
            return Ok((estimate, f64::NAN));
        }

        let solution = self.lu.solve(&self.rhs).ok_or(Error::SingularSystem)?;
        Ok((estimate, kriging_variance(&solution, &self.rhs)))
    }
}

/// Local neighbourhood: nearest samples within an optional radius
struct LocalPredictor<'a> {
    points: &'a [SamplePoint],
    variogram: &'a FittedVariogram,
    max_points: usize,
    max_radius: Option<f64>,
}

impl Predictor for LocalPredictor<'_> {
    fn predict(&mut self, x0: f64, y0: f64, with_variance: bool) -> Result<(f64, f64)> {
        let mut dists: Vec<(usize, f64)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.dist(x0, y0)))
            .collect();

        if let Some(max_r) = self.max_radius {
            dists.retain(|(_, d)| *d <= max_r);
        }
        if dists.is_empty() {
            return Ok((f64::NAN, f64::NAN));
        }

        dists.sort_by(|a, b| a.1.total_cmp(&b.1));
        dists.truncate(self.max_points);

        if dists.len() == 1 {
            let (idx, d) = dists[0];
            let var = 2.0 * self.variogram.evaluate(d);
            return Ok((self.points[idx].value, if with_variance { var } else { f64::NAN }));
        }

        let neighbors: Vec<SamplePoint> = dists.iter().map(|&(i, _)| self.points[i]).collect();
        let k = neighbors.len();
        let lu = kriging_matrix(&neighbors, self.variogram).lu();
        check_pivots(&lu)?;

        let mut rhs = DVector::zeros(k + 1);
        for (i, &(_, d)) in dists.iter().enumerate() {
            rhs[i] = self.variogram.evaluate(d);
        }
        rhs[k] = 1.0;

        let solution = lu.solve(&rhs).ok_or(Error::SingularSystem)?;
        let estimate: f64 = neighbors
            .iter()
            .zip(solution.iter())
            .map(|(p, w)| w * p.value)
            .sum();
        if !estimate.is_finite() {
            return Err(Error::SingularSystem);
        }

        let variance = if with_variance {
            kriging_variance(&solution, &rhs)
        } else {
            f64::NAN
        };
        Ok((estimate, variance))
    }
}

/// Build the (n+1)×(n+1) ordinary kriging matrix
fn kriging_matrix(points: &[SamplePoint], variogram: &FittedVariogram) -> DMatrix<f64> {
    let n = points.len();
    let mut mat = DMatrix::zeros(n + 1, n + 1);
    for i in 0..n {
        for j in (i + 1)..n {
            let g = variogram.evaluate(points[i].dist(points[j].x, points[j].y));
            mat[(i, j)] = g;
            mat[(j, i)] = g;
        }
        mat[(i, n)] = 1.0;
        mat[(n, i)] = 1.0;
    }
    mat
}

/// Reject factorisations whose smallest pivot vanishes relative to the largest
fn check_pivots(lu: &LU<f64, Dyn, Dyn>) -> Result<()> {
    let u = lu.u();
    let diag = u.diagonal();
    let max = diag.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let min = diag.iter().fold(f64::INFINITY, |m, v| m.min(v.abs()));
    if !(max.is_finite() && max > 0.0) || min <= max * 1e-12 {
        return Err(Error::SingularSystem);
    }
    Ok(())
}

/// σ² = Σ wᵢ·γ(xᵢ,x₀) + μ, clamped at zero
fn kriging_variance(solution: &DVector<f64>, rhs: &DVector<f64>) -> f64 {
    let k = solution.len() - 1;
    let mut var = solution[k];
    for i in 0..k {
        var += solution[i] * rhs[i];
    }
    var.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::variogram::{FitPolicy, VariogramParams, empirical_variogram, fit_spherical};
    use approx::assert_relative_eq;
    use wxkrige_core::CRS;
    use wxkrige_core::raster::GeoTransform;

    fn make_lattice(rows: usize, cols: usize, extent: (f64, f64, f64, f64)) -> PredictionLattice {
        let (x_min, _, x_max, y_max) = extent;
        let cell = (x_max - x_min) / cols as f64;
        PredictionLattice::new(rows, cols, GeoTransform::square(x_min, y_max, cell), CRS::default())
    }

    fn generate_points(n: usize, seed: u64) -> Vec<SamplePoint> {
        let mut points = Vec::with_capacity(n);
        let mut rng = seed;
        for _ in 0..n {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let x = (rng >> 33) as f64 / (1u64 << 31) as f64 * 100.0;
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let y = (rng >> 33) as f64 / (1u64 << 31) as f64 * 100.0;
            let value = 0.5 * x + 0.3 * y + 10.0 * ((x / 20.0).sin() + (y / 20.0).sin());
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let noise = (rng >> 33) as f64 / (1u64 << 31) as f64 * 2.0 - 1.0;
            points.push(SamplePoint::new(x, y, value + noise));
        }
        points
    }

    fn fit_for_points(points: &[SamplePoint]) -> FittedVariogram {
        let emp = empirical_variogram(points, VariogramParams::default()).unwrap();
        fit_spherical(&emp, FitPolicy::Fit).unwrap()
    }

    fn corners() -> Vec<SamplePoint> {
        vec![
            SamplePoint::new(10.0, 10.0, 100.0),
            SamplePoint::new(90.0, 10.0, 200.0),
            SamplePoint::new(10.0, 90.0, 300.0),
            SamplePoint::new(90.0, 90.0, 400.0),
            SamplePoint::new(50.0, 50.0, 250.0),
        ]
    }

    fn manual_variogram() -> FittedVariogram {
        FittedVariogram {
            nugget: 0.0,
            partial_sill: 5000.0,
            range: 80.0,
            rss: 0.0,
        }
    }

    #[test]
    fn test_ok_basic() {
        let points = generate_points(50, 42);
        let variogram = fit_for_points(&points);
        let lattice = make_lattice(20, 20, (0.0, 0.0, 100.0, 100.0));

        let result = ordinary_kriging(&points, &variogram, &lattice, &KrigingParams::default()).unwrap();

        assert_eq!(result.estimate.shape(), (20, 20));
        assert_eq!(result.estimate.statistics().valid_count, 400);
        assert!(result.variance.is_none());
    }

    #[test]
    fn test_ok_near_sample_point() {
        let lattice = make_lattice(10, 10, (0.0, 0.0, 100.0, 100.0));
        let result =
            ordinary_kriging(&corners(), &manual_variogram(), &lattice, &KrigingParams::default())
                .unwrap();

        let center = result.estimate.get(5, 5).unwrap();
        assert!(center > 50.0 && center < 450.0, "Center should be reasonable, got {center:.2}");
    }

    #[test]
    fn test_target_on_sample_returns_sample() {
        // cell (4, 4) of a 10-unit lattice is centred at (45, 55); put a sample there
        let mut points = corners();
        points.push(SamplePoint::new(45.0, 55.0, 777.0));
        let lattice = make_lattice(10, 10, (0.0, 0.0, 100.0, 100.0));
        let params = KrigingParams {
            compute_variance: true,
            ..Default::default()
        };
        let result = ordinary_kriging(&points, &manual_variogram(), &lattice, &params).unwrap();

        assert_eq!(result.estimate.get(4, 4).unwrap(), 777.0);
        assert_eq!(result.variance.unwrap().get(4, 4).unwrap(), 0.0);
    }

    #[test]
    fn test_ok_with_variance() {
        let points = generate_points(30, 99);
        let variogram = fit_for_points(&points);
        let lattice = make_lattice(10, 10, (0.0, 0.0, 100.0, 100.0));
        let params = KrigingParams {
            compute_variance: true,
            ..Default::default()
        };

        let result = ordinary_kriging(&points, &variogram, &lattice, &params).unwrap();
        let var = result.variance.expect("variance raster");
        for &v in var.data().iter() {
            assert!(v >= 0.0, "Variance should be >= 0, got {v:.4}");
        }
    }

    #[test]
    fn test_global_matches_local_with_all_points() {
        let points = generate_points(25, 7);
        let variogram = fit_for_points(&points);
        let lattice = make_lattice(6, 6, (0.0, 0.0, 100.0, 100.0));

        let global = ordinary_kriging(
            &points,
            &variogram,
            &lattice,
            &KrigingParams {
                compute_variance: true,
                ..Default::default()
            },
        )
        .unwrap();
        let local = ordinary_kriging(
            &points,
            &variogram,
            &lattice,
            &KrigingParams {
                max_points: Some(points.len()),
                compute_variance: true,
                ..Default::default()
            },
        )
        .unwrap();

        for (a, b) in global.estimate.data().iter().zip(local.estimate.data().iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
        let (gv, lv) = (global.variance.unwrap(), local.variance.unwrap());
        for (a, b) in gv.data().iter().zip(lv.data().iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_ok_with_search_radius() {
        let points = vec![
            SamplePoint::new(0.0, 0.0, 10.0),
            SamplePoint::new(1.0, 0.0, 20.0),
            SamplePoint::new(0.0, 1.0, 30.0),
            SamplePoint::new(1.0, 1.0, 40.0),
        ];
        let variogram = FittedVariogram {
            nugget: 0.0,
            partial_sill: 100.0,
            range: 1.0,
            rss: 0.0,
        };
        let lattice = make_lattice(10, 10, (0.0, 0.0, 10.0, 10.0));
        let params = KrigingParams {
            max_radius: Some(0.8),
            ..Default::default()
        };

        let result = ordinary_kriging(&points, &variogram, &lattice, &params).unwrap();

        // row 9, col 0 is centred at (0.5, 0.5): all four samples in range
        assert!(!result.estimate.get(9, 0).unwrap().is_nan());
        let far = result.estimate.get(0, 9).unwrap();
        assert!(far.is_nan(), "Far cell should be NaN with small radius, got {far:.2}");
    }

    #[test]
    fn test_ok_too_few_points() {
        let points = vec![SamplePoint::new(0.0, 0.0, 10.0)];
        let lattice = make_lattice(5, 5, (0.0, 0.0, 10.0, 10.0));
        assert!(matches!(
            ordinary_kriging(&points, &manual_variogram(), &lattice, &KrigingParams::default()),
            Err(Error::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_flat_model_gives_mean() {
        let points = vec![
            SamplePoint::new(0.0, 0.0, 1.0),
            SamplePoint::new(100.0, 0.0, 2.0),
            SamplePoint::new(0.0, 100.0, 6.0),
        ];
        let flat = FittedVariogram::flat_for(&[1.0, 2.0, 6.0]);
        let lattice = make_lattice(4, 4, (0.0, 0.0, 100.0, 100.0));
        let params = KrigingParams {
            compute_variance: true,
            ..Default::default()
        };
        let result = ordinary_kriging(&points, &flat, &lattice, &params).unwrap();

        for &v in result.estimate.data().iter() {
            assert_relative_eq!(v, 3.0, epsilon = 1e-12);
        }
        let var = result.variance.unwrap();
        assert_relative_eq!(var.get(1, 1).unwrap(), flat.nugget * (1.0 + 1.0 / 3.0));
    }

    #[test]
    fn test_flat_model_matches_solved_system() {
        // a nugget-only model pushed through the LU path gives uniform weights
        let points = corners();
        let flat = FittedVariogram::flat(4.0);
        let mut global = GlobalPredictor::new(&points, &flat).unwrap();
        let (est, var) = global.predict(33.0, 21.0, true).unwrap();
        assert_relative_eq!(est, 250.0, epsilon = 1e-9);
        assert_relative_eq!(var, 4.0 * (1.0 + 1.0 / 5.0), epsilon = 1e-9);
    }

    #[test]
    fn test_ok_constant_field() {
        let points: Vec<_> = corners().into_iter().map(|p| SamplePoint { value: 42.0, ..p }).collect();
        let variogram = FittedVariogram {
            nugget: 0.001,
            partial_sill: 0.001,
            range: 50.0,
            rss: 0.0,
        };
        let lattice = make_lattice(5, 5, (0.0, 0.0, 100.0, 100.0));
        let result = ordinary_kriging(&points, &variogram, &lattice, &KrigingParams::default()).unwrap();

        for &v in result.estimate.data().iter() {
            assert_relative_eq!(v, 42.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_coincident_samples_are_singular() {
        let points = vec![
            SamplePoint::new(10.0, 10.0, 1.0),
            SamplePoint::new(10.0, 10.0, 2.0),
            SamplePoint::new(60.0, 80.0, 3.0),
        ];
        let lattice = make_lattice(3, 3, (0.0, 0.0, 90.0, 90.0));
        assert!(matches!(
            ordinary_kriging(&points, &manual_variogram(), &lattice, &KrigingParams::default()),
            Err(Error::SingularSystem)
        ));
    }

    #[test]
    fn test_expired_deadline() {
        let lattice = make_lattice(5, 5, (0.0, 0.0, 100.0, 100.0));
        let params = KrigingParams {
            deadline: Some(Instant::now() - std::time::Duration::from_secs(1)),
            ..Default::default()
        };
        assert!(matches!(
            ordinary_kriging(&corners(), &manual_variogram(), &lattice, &params),
            Err(Error::DeadlineExceeded)
        ));
    }
}
