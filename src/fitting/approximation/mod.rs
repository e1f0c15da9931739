//! Least-squares approximation of weighted samples.
//!
//! For a design matrix `N` holding the basis row of every sample, weights `W` and sample
//! positions `S`, the control points minimize `(N P - S)^T W (N P - S)` and solve the normal
//! equations `K P = N^T W S` with `K = N^T W N`.
//!
//! A [penalization][Penalization] adds `λ D^T D` to `K`, where `D` holds the `κ`-th finite
//! differences of neighboring control points, see `Eilers1996`. For surfaces the differences run
//! along both directions of the net.
//!
//! [Exact constraints][Constraint] `M P = T` are enforced with Lagrange multipliers. The
//! multipliers solve the Schur complement system `(M K^-1 M^T) λ = M K^-1 N^T W S - T`, after
//! which `K P = N^T W S - M^T λ`.
//!
//! The [guided surface builder][GuidedSurface] assembles constraints and samples from border and
//! guide curves.

use log::debug;
use thiserror::Error;

use crate::{
    basis::{Basis, BasisError},
    curve::{points::ControlPoints, Curve, CurveError},
    diagnostics::{FitReport, Residuals, Stopwatch},
    fitting::{homogeneous_columns, position_rows, CurveSample, Sample, SurfaceSample},
    linalg::{LinalgError, NumericContext},
    projection::ProjectionError,
    surface::{ControlNet, Surface, SurfaceError},
    types::{MatD, Vec3, VecD},
};

pub use self::guided::{GuideSampling, GuidedSurface, Side};

mod guided;

#[derive(Error, Debug, PartialEq)]
pub enum FitError {
    #[error("The penalization parameter `lambda = {lambda}` cannot be negative.")]
    NegativeLambda { lambda: f64 },

    #[error("The difference order `kappa = {kappa}` must be positive and below the `{count}` control points along a direction.")]
    PenaltyOrderTooHigh { kappa: usize, count: usize },

    #[error("At least `{required}` samples are required to determine the control points, got `{count}`.")]
    TooFewSamples { count: usize, required: usize },

    #[error("Sample `{index}` has the invalid weight `{weight}`.")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("The constrained control point `({row}, {col})` lies outside the `{rows} x {cols}` net.")]
    ConstraintOutOfRange { row: usize, col: usize, rows: usize, cols: usize },

    #[error("Linear algebra error: {0}")]
    Linalg(#[from] LinalgError),

    #[error("Basis error: {0}")]
    Basis(#[from] BasisError),

    #[error("Curve error: {0}")]
    Curve(#[from] CurveError),

    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),
}

/// Smoothing penalty on the `kappa`-th finite differences of the control points, scaled by `lambda`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Penalization {
    pub lambda: f64,
    pub kappa: usize,
}

impl Penalization {
    pub fn new(lambda: f64, kappa: usize) -> Result<Self, FitError> {
        if lambda < 0.0 {
            return Err(FitError::NegativeLambda { lambda });
        }
        Ok(Penalization { lambda, kappa })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitOptions {
    pub penalization: Option<Penalization>,
}

/// An exact condition on the fitted surface.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Constraint {
    /// The surface passes through `position` at `parameter`.
    Point { parameter: (f64, f64), position: Vec3 },
    /// The control point in `row` and `col` equals `position`.
    ControlPoint { row: usize, col: usize, position: Vec3 },
}

// finite difference matrix penalizing BSplines
fn difference_operator(i: usize, j: usize, kappa: usize) -> isize {
    match kappa {
        1 => {
            if i == j {
                return -1;
            }
            if i + 1 == j {
                return 1;
            }
            0
        }
        k if k > 1 => difference_operator(i + 1, j, k - 1) - difference_operator(i, j, k - 1),
        _ => 0,
    }
}

/// `(count - kappa) x count` matrix of `kappa`-th differences.
fn difference_matrix(kappa: usize, count: usize) -> Result<MatD, FitError> {
    if kappa == 0 || kappa >= count {
        return Err(FitError::PenaltyOrderTooHigh { kappa, count });
    }
    Ok(MatD::from_fn(count - kappa, count, |i, j| difference_operator(i, j, kappa) as f64))
}

/// Row of the tensor-product basis at `(u, v)`, laid out like the control net.
fn surface_row(u_basis: &Basis, v_basis: &Basis, (u, v): (f64, f64)) -> Result<VecD, BasisError> {
    Ok(v_basis.row(v, 0)?.kronecker(&u_basis.row(u, 0)?))
}

fn check_weights<P>(samples: &[Sample<P>]) -> Result<Vec<f64>, FitError> {
    samples
        .iter()
        .enumerate()
        .map(|(index, s)| {
            if s.weight.is_finite() && s.weight > 0.0 {
                Ok(s.weight)
            } else {
                Err(FitError::InvalidWeight { index, weight: s.weight })
            }
        })
        .collect()
}

/// Weighted normal equations `(N^T W N, N^T W S)`.
fn normal_equations(
    ctx: &mut NumericContext,
    design: &MatD,
    weights: &[f64],
    targets: &MatD,
) -> Result<(MatD, MatD), FitError> {
    let mut weighted = design.clone();
    for (k, w) in weights.iter().enumerate() {
        weighted.row_mut(k).scale_mut(*w);
    }
    let normal = ctx.multiply(design, &weighted, true, false)?;
    let rhs = ctx.multiply(&weighted, targets, true, false)?;
    Ok((normal, rhs))
}

/// Residual rows `a x - b`.
fn residuals(ctx: &mut NumericContext, a: &MatD, x: &MatD, b: &MatD) -> Result<Residuals, FitError> {
    if a.nrows() == 0 {
        return Ok(Residuals::default());
    }
    let mut difference = b.clone();
    ctx.multiply_add(1.0, a, x, -1.0, &mut difference, false, false)?;
    Ok(Residuals::from_rows(&difference))
}

/// Approximates the samples with a curve over `basis`.
pub fn approximate_curve(ctx: &mut NumericContext, samples: &[CurveSample], basis: &Basis) -> Result<Curve, FitError> {
    approximate_curve_with(ctx, samples, basis, &FitOptions::default())
}

/// Approximates the samples with a curve over `basis`, optionally penalized.
pub fn approximate_curve_with(
    ctx: &mut NumericContext,
    samples: &[CurveSample],
    basis: &Basis,
    options: &FitOptions,
) -> Result<Curve, FitError> {
    let n = basis.control_count();
    if options.penalization.is_none() && samples.len() < n {
        return Err(FitError::TooFewSamples { count: samples.len(), required: n });
    }
    let weights = check_weights(samples)?;

    let mut design = MatD::zeros(samples.len(), n);
    for (k, sample) in samples.iter().enumerate() {
        design.row_mut(k).copy_from(&basis.row(sample.parameter, 0)?.transpose());
    }
    let targets = position_rows(samples.iter().map(|s| &s.position));

    let (mut normal, rhs) = normal_equations(ctx, &design, &weights, &targets)?;
    if let Some(penalization) = options.penalization {
        let penalization = Penalization::new(penalization.lambda, penalization.kappa)?;
        let delta = difference_matrix(penalization.kappa, n)?;
        ctx.multiply_add(penalization.lambda, &delta, &delta, 1.0, &mut normal, true, false)?;
    }
    let solution = ctx.cholesky_solve(&normal, &rhs)?;

    debug!("approximated {} samples with {n} control points", samples.len());
    Ok(Curve::new(basis.clone(), ControlPoints::from_matrix(homogeneous_columns(&solution)))?)
}

/// Approximates the samples with a surface over the given bases.
pub fn approximate_surface(
    ctx: &mut NumericContext,
    samples: &[SurfaceSample],
    u_basis: &Basis,
    v_basis: &Basis,
) -> Result<Surface, FitError> {
    fit_constrained(ctx, samples, &[], u_basis, v_basis, &FitOptions::default()).map(|(surface, _)| surface)
}

/// Fits a surface to the weighted samples while meeting every constraint exactly.
///
/// Constraints that are exact duplicates are merged. Conflicting constraints make the Schur
/// complement singular and fail with [`LinalgError::Singular`].
pub fn fit_constrained(
    ctx: &mut NumericContext,
    samples: &[SurfaceSample],
    constraints: &[Constraint],
    u_basis: &Basis,
    v_basis: &Basis,
    options: &FitOptions,
) -> Result<(Surface, FitReport), FitError> {
    let watch = Stopwatch::start(ctx);
    let (rows, cols) = (v_basis.control_count(), u_basis.control_count());
    let unknowns = rows * cols;
    if options.penalization.is_none() && samples.len() < unknowns {
        return Err(FitError::TooFewSamples { count: samples.len(), required: unknowns });
    }
    let weights = check_weights(samples)?;

    let mut design = MatD::zeros(samples.len(), unknowns);
    for (k, sample) in samples.iter().enumerate() {
        design.row_mut(k).copy_from(&surface_row(u_basis, v_basis, sample.parameter)?.transpose());
    }
    let targets = position_rows(samples.iter().map(|s| &s.position));
    let (mut normal, mut rhs) = normal_equations(ctx, &design, &weights, &targets)?;

    if let Some(penalization) = options.penalization {
        let penalization = Penalization::new(penalization.lambda, penalization.kappa)?;
        let along_u = MatD::identity(rows, rows).kronecker(&difference_matrix(penalization.kappa, cols)?);
        let along_v = difference_matrix(penalization.kappa, rows)?.kronecker(&MatD::identity(cols, cols));
        for delta in [along_u, along_v] {
            ctx.multiply_add(penalization.lambda, &delta, &delta, 1.0, &mut normal, true, false)?;
        }
    }

    let mut unique: Vec<&Constraint> = Vec::with_capacity(constraints.len());
    for constraint in constraints {
        if !unique.contains(&constraint) {
            unique.push(constraint);
        }
    }

    let mut m = MatD::zeros(unique.len(), unknowns);
    let mut t = MatD::zeros(unique.len(), 3);
    for (k, constraint) in unique.iter().enumerate() {
        let position = match **constraint {
            Constraint::Point { parameter, position } => {
                m.row_mut(k).copy_from(&surface_row(u_basis, v_basis, parameter)?.transpose());
                position
            }
            Constraint::ControlPoint { row, col, position } => {
                if row >= rows || col >= cols {
                    return Err(FitError::ConstraintOutOfRange { row, col, rows, cols });
                }
                m[(k, row * cols + col)] = 1.0;
                position
            }
        };
        t.row_mut(k).copy_from(&position.transpose());
    }

    if !unique.is_empty() {
        let inverse = ctx.inverse(&normal)?;
        let m_inverse = ctx.multiply(&m, &inverse, false, false)?;
        let schur = ctx.multiply(&m_inverse, &m, false, true)?;
        let mut reduced = t.clone();
        ctx.multiply_add(1.0, &m_inverse, &rhs, -1.0, &mut reduced, false, false)?;
        let lambda = ctx.lu_solve(&schur, &reduced)?;
        ctx.multiply_add(-1.0, &m, &lambda, 1.0, &mut rhs, true, false)?;
    }
    let solution = ctx.cholesky_solve(&normal, &rhs)?;

    let sample_residuals = residuals(ctx, &design, &solution, &targets)?;
    let constraint_residuals = residuals(ctx, &m, &solution, &t)?;
    let report = watch.fit_report(ctx, sample_residuals, constraint_residuals);
    debug!(
        "fitted {} samples and {} constraints with a {rows} x {cols} net in {:?} using {} requests",
        samples.len(),
        unique.len(),
        report.duration,
        report.solve_requests
    );

    let net = ControlNet::from_matrix(rows, cols, homogeneous_columns(&solution));
    Ok((Surface::new(u_basis.clone(), v_basis.clone(), net)?, report))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::dmatrix;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rstest::rstest;

    use crate::{basis::knots::methods, curve::points::Points};

    use super::*;

    #[test]
    fn difference_matrix_kappa1() {
        let expected = dmatrix![
            -1.0, 1.0, 0.0, 0.0, 0.0;
             0.0,-1.0, 1.0, 0.0, 0.0;
             0.0, 0.0,-1.0, 1.0, 0.0;
             0.0, 0.0, 0.0,-1.0, 1.0;
        ];
        assert_eq!(difference_matrix(1, 5).unwrap(), expected);
    }

    #[test]
    fn difference_matrix_kappa2() {
        let expected = dmatrix![
            1.0,-2.0, 1.0, 0.0;
            0.0, 1.0,-2.0, 1.0;
        ];
        assert_eq!(difference_matrix(2, 4).unwrap(), expected);
        assert_eq!(difference_matrix(4, 4), Err(FitError::PenaltyOrderTooHigh { kappa: 4, count: 4 }));
    }

    fn plane(u: f64, v: f64) -> Vec3 {
        Vec3::new(u, v, 0.5 * u - 0.25 * v + 1.0)
    }

    fn grid(count: usize) -> Vec<SurfaceSample> {
        let mut samples = Vec::new();
        for j in 0..count {
            for i in 0..count {
                let (u, v) = (i as f64 / (count - 1) as f64, j as f64 / (count - 1) as f64);
                samples.push(Sample::new((u, v), plane(u, v)));
            }
        }
        samples
    }

    #[test]
    fn curve_reproduces_a_line() {
        let mut ctx = NumericContext::default();
        let samples: Vec<CurveSample> =
            (0..10).map(|k| k as f64 / 9.0).map(|u| Sample::new(u, Vec3::new(u, 2.0 * u, 0.0))).collect();
        let basis = Basis::uniform(3, 5).unwrap();
        let c = approximate_curve(&mut ctx, &samples, &basis).unwrap();
        for u in [0.0, 0.3, 0.7, 1.0] {
            assert_relative_eq!(c.point(u, 0).unwrap(), Vec3::new(u, 2.0 * u, 0.0), epsilon = 1e-10);
        }
        assert_eq!(ctx.requests(), 3);
    }

    #[test]
    fn curve_weights_pull_the_fit() {
        let mut ctx = NumericContext::default();
        let basis = Basis::uniform(1, 2).unwrap();
        let mut samples: Vec<CurveSample> =
            [0.0, 0.5, 1.0].iter().map(|&u| Sample::new(u, Vec3::new(u, 0.0, 0.0))).collect();
        samples[1].position.y = 1.0;

        let even = approximate_curve(&mut ctx, &samples, &basis).unwrap();
        samples[1].weight = 100.0;
        let pulled = approximate_curve(&mut ctx, &samples, &basis).unwrap();
        assert!(pulled.point(0.5, 0).unwrap().y > even.point(0.5, 0).unwrap().y);
    }

    #[test]
    fn penalized_curve_is_smoother() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut ctx = NumericContext::default();
        let samples: Vec<CurveSample> = (0..40)
            .map(|k| k as f64 / 39.0)
            .map(|u| Sample::new(u, Vec3::new(u, rng.random_range(-0.5..0.5), 0.0)))
            .collect();
        let basis = Basis::new(2, methods::uniform(2, 12).unwrap()).unwrap();

        let loose = approximate_curve(&mut ctx, &samples, &basis).unwrap();
        let options = FitOptions { penalization: Some(Penalization { lambda: 10.0, kappa: 2 }) };
        let smooth = approximate_curve_with(&mut ctx, &samples, &basis, &options).unwrap();

        let roughness = |c: &Curve| {
            let delta = difference_matrix(2, c.control_count()).unwrap();
            (delta * c.points().matrix().rows(1, 1).transpose()).norm()
        };
        assert!(roughness(&smooth) < roughness(&loose));
    }

    #[test]
    fn invalid_input() {
        let mut ctx = NumericContext::default();
        let basis = Basis::uniform(2, 4).unwrap();
        let samples = vec![Sample::new(0.5, Vec3::zeros()); 3];
        assert_eq!(
            approximate_curve(&mut ctx, &samples, &basis),
            Err(FitError::TooFewSamples { count: 3, required: 4 })
        );

        let mut samples = vec![Sample::new(0.5, Vec3::zeros()); 5];
        samples[2].weight = 0.0;
        assert_eq!(
            approximate_curve(&mut ctx, &samples, &basis),
            Err(FitError::InvalidWeight { index: 2, weight: 0.0 })
        );

        let options = FitOptions { penalization: Some(Penalization { lambda: -1.0, kappa: 1 }) };
        samples[2].weight = 1.0;
        assert_eq!(
            approximate_curve_with(&mut ctx, &samples, &basis, &options),
            Err(FitError::NegativeLambda { lambda: -1.0 })
        );
        assert_eq!(Penalization::new(-1.0, 1), Err(FitError::NegativeLambda { lambda: -1.0 }));
    }

    #[test]
    fn samples_in_one_span_leave_the_system_rank_deficient() {
        let mut ctx = NumericContext::default();
        let basis = Basis::uniform(1, 4).unwrap();
        let samples: Vec<CurveSample> =
            [0.0, 0.1, 0.2, 0.3].iter().map(|&u| Sample::new(u, Vec3::new(u, 1.0, 0.0))).collect();
        assert_eq!(
            approximate_curve(&mut ctx, &samples, &basis),
            Err(FitError::Linalg(LinalgError::NotPositiveDefinite { size: 4 }))
        );

        let options = FitOptions { penalization: Some(Penalization { lambda: 1e-6, kappa: 1 }) };
        let c = approximate_curve_with(&mut ctx, &samples, &basis, &options).unwrap();
        assert_relative_eq!(c.point(0.2, 0).unwrap(), Vec3::new(0.2, 1.0, 0.0), epsilon = 1e-4);
    }

    #[test]
    fn surface_reproduces_a_plane() {
        let mut ctx = NumericContext::default();
        let (u_basis, v_basis) = (Basis::uniform(2, 4).unwrap(), Basis::uniform(3, 5).unwrap());
        let s = approximate_surface(&mut ctx, &grid(8), &u_basis, &v_basis).unwrap();
        assert_eq!((s.net().rows(), s.net().cols()), (5, 4));
        for (u, v) in [(0.1, 0.2), (0.5, 0.5), (0.9, 0.35)] {
            assert_relative_eq!(s.point(u, v).unwrap(), plane(u, v), epsilon = 1e-10);
        }
    }

    #[rstest(seed, case(1), case(2))]
    fn constraints_are_met(seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut ctx = NumericContext::default();
        let (u_basis, v_basis) = (Basis::uniform(2, 5).unwrap(), Basis::uniform(2, 4).unwrap());

        let samples: Vec<SurfaceSample> = grid(7)
            .into_iter()
            .map(|mut s| {
                s.position.z += rng.random_range(-0.1..0.1);
                s
            })
            .collect();
        let constraints = [
            Constraint::Point { parameter: (0.3, 0.6), position: Vec3::new(0.3, 0.6, 2.0) },
            Constraint::Point { parameter: (0.3, 0.6), position: Vec3::new(0.3, 0.6, 2.0) },
            Constraint::Point { parameter: (0.0, 0.0), position: Vec3::new(0.0, 0.0, 0.0) },
            Constraint::ControlPoint { row: 3, col: 4, position: Vec3::new(1.0, 1.0, 1.0) },
        ];

        let (s, report) =
            fit_constrained(&mut ctx, &samples, &constraints, &u_basis, &v_basis, &FitOptions::default()).unwrap();
        assert_relative_eq!(s.point(0.3, 0.6).unwrap(), Vec3::new(0.3, 0.6, 2.0), epsilon = 1e-9);
        assert_relative_eq!(s.point(0.0, 0.0).unwrap(), Vec3::zeros(), epsilon = 1e-9);
        assert_relative_eq!(s.net().at(3, 4), Vec3::new(1.0, 1.0, 1.0), epsilon = 1e-9);
        assert!(report.constraints.max < 1e-9);
        assert!(report.samples.max > 0.0);
        assert_eq!(report.solve_requests, ctx.requests());
    }

    #[test]
    fn conflicting_constraints() {
        let mut ctx = NumericContext::default();
        let basis = Basis::uniform(1, 2).unwrap();
        let constraints = [
            Constraint::ControlPoint { row: 0, col: 0, position: Vec3::zeros() },
            Constraint::ControlPoint { row: 0, col: 0, position: Vec3::new(1.0, 0.0, 0.0) },
        ];
        assert_eq!(
            fit_constrained(&mut ctx, &grid(3), &constraints, &basis, &basis, &FitOptions::default()).map(|_| ()),
            Err(FitError::Linalg(LinalgError::Singular { size: 2 }))
        );
        assert_eq!(
            fit_constrained(
                &mut ctx,
                &grid(3),
                &[Constraint::ControlPoint { row: 2, col: 0, position: Vec3::zeros() }],
                &basis,
                &basis,
                &FitOptions::default()
            )
            .map(|_| ()),
            Err(FitError::ConstraintOutOfRange { row: 2, col: 0, rows: 2, cols: 2 })
        );
    }

    #[test]
    fn penalized_surface_with_few_samples() {
        let mut ctx = NumericContext::default();
        let basis = Basis::uniform(1, 5).unwrap();
        let options = FitOptions { penalization: Some(Penalization { lambda: 1e-3, kappa: 2 }) };
        let (s, _) = fit_constrained(&mut ctx, &grid(3), &[], &basis, &basis, &options).unwrap();
        // the control net of a plane has no second differences for equally spaced Greville abscissae
        assert_relative_eq!(s.point(0.4, 0.7).unwrap(), plane(0.4, 0.7), epsilon = 1e-8);
    }
}
