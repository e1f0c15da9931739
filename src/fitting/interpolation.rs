//! Global interpolation of point sequences and curve families.
//!
//! A curve of degree `p` through `n` points uses one control point per data point. The
//! parameters default to the chord length method, see eq. (9.5) in `Piegl1997`, and the knots
//! are placed by averaging, see eq. (9.8). The control points solve `N P = S` with one LU
//! decomposition for all coordinates.
//!
//! A [loft][loft] interpolates the control points of a family of compatible section curves in
//! the same way, solving for all sections at once.

use std::cmp::Ordering;

use log::debug;
use thiserror::Error;

use crate::{
    basis::{
        knots::{methods, KnotError},
        parameters::{self, Method},
        Basis, BasisError,
    },
    curve::{
        points::{ControlPoints, Points},
        Curve, CurveError,
    },
    fitting::{homogeneous_columns, position_rows},
    linalg::{LinalgError, NumericContext},
    manipulation::{
        combine::{combine, CombineError},
        compatible::{make_curves_compatible, CompatibilityError},
    },
    surface::{ControlNet, Direction, Surface, SurfaceError},
    types::{MatD, Vec3},
};

#[derive(Error, Debug, PartialEq)]
pub enum InterpolationError {
    #[error("At least `{required}` points are required, got `{count}`.")]
    TooFewPoints { count: usize, required: usize },

    #[error("At least `{required}` sections are required, got `{count}`.")]
    TooFewSections { count: usize, required: usize },

    #[error("`{points}` points were given with `{params}` parameters.")]
    ParameterCountMismatch { points: usize, params: usize },

    #[error("Parameter `{value}` at position `{index}` does not exceed its predecessor.")]
    DuplicateParameter { index: usize, value: f64 },

    #[error("Break index `{index}` is not an increasing interior index of `{count}` points.")]
    InvalidBreak { index: usize, count: usize },

    #[error("The sections cannot be made compatible: {0}")]
    Compatibility(#[from] CompatibilityError),

    #[error("Linear algebra error: {0}")]
    Linalg(#[from] LinalgError),

    #[error("Basis error: {0}")]
    Basis(#[from] BasisError),

    #[error("Curve error: {0}")]
    Curve(#[from] CurveError),

    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Combining the pieces failed: {0}")]
    Combine(#[from] CombineError),
}

impl From<KnotError> for InterpolationError {
    fn from(err: KnotError) -> Self {
        InterpolationError::Basis(BasisError::from(err))
    }
}

fn check_parameters(params: &[f64], count: usize) -> Result<(), InterpolationError> {
    if params.len() != count {
        return Err(InterpolationError::ParameterCountMismatch { points: count, params: params.len() });
    }
    for (index, pair) in params.windows(2).enumerate() {
        if pair[1].partial_cmp(&pair[0]) != Some(Ordering::Greater) {
            return Err(InterpolationError::DuplicateParameter { index: index + 1, value: pair[1] });
        }
    }
    Ok(())
}

/// Builds the averaged-knot basis through `params` and its square collocation matrix.
fn collocation(params: &[f64], ideal_degree: usize) -> Result<(Basis, MatD), InterpolationError> {
    if ideal_degree == 0 {
        return Err(BasisError::DegreeTooLow { p: 0, limit: 0 }.into());
    }
    let degree = ideal_degree.min(params.len() - 1);
    let basis = Basis::new(degree, methods::averaging(degree, params)?)?;

    let mut matrix = MatD::zeros(params.len(), params.len());
    for (k, &u) in params.iter().enumerate() {
        matrix.row_mut(k).copy_from(&basis.row(u, 0)?.transpose());
    }
    Ok((basis, matrix))
}

/// Interpolates `points` with a curve of degree `min(points.len() - 1, ideal_degree)`.
///
/// Without explicit `params`, chord length parameters on `[0, 1]` are used.
///
/// # Examples
/// ```
/// use bspline_kernel::{fitting::interpolation::interpolate, linalg::NumericContext, types::Vec3};
///
/// let points = [Vec3::new(0., 0., 0.), Vec3::new(1., 1., 0.), Vec3::new(2., 0., 0.)];
/// let mut ctx = NumericContext::default();
/// let curve = interpolate(&mut ctx, &points, None, 3).unwrap();
/// assert_eq!(curve.degree(), 2);
/// assert!((curve.point(0.5, 0).unwrap() - points[1]).norm() < 1e-12);
/// ```
pub fn interpolate(
    ctx: &mut NumericContext,
    points: &[Vec3],
    params: Option<&[f64]>,
    ideal_degree: usize,
) -> Result<Curve, InterpolationError> {
    if points.len() < 2 {
        return Err(InterpolationError::TooFewPoints { count: points.len(), required: 2 });
    }
    let params = match params {
        Some(params) => params.to_vec(),
        None => parameters::generate(points, Method::default()),
    };
    check_parameters(&params, points.len())?;

    let (basis, matrix) = collocation(&params, ideal_degree)?;
    let solution = ctx.lu_solve(&matrix, &position_rows(points.iter()))?;

    debug!("interpolated {} points with a curve of degree {}", points.len(), basis.degree());
    Ok(Curve::new(basis, ControlPoints::from_matrix(homogeneous_columns(&solution)))?)
}

/// Interpolates the runs of `points` between consecutive break indices separately and combines them.
///
/// Every break point is shared by the adjoining runs and becomes a joint of the combined curve.
/// All runs use the common degree `min(ideal_degree, shortest run length - 1)`.
pub fn interpolate_piecewise(
    ctx: &mut NumericContext,
    points: &[Vec3],
    breaks: &[usize],
    ideal_degree: usize,
) -> Result<Curve, InterpolationError> {
    let count = points.len();
    let mut bounds = Vec::with_capacity(breaks.len() + 2);
    bounds.push(0);
    for &index in breaks {
        if index == 0 || index + 1 >= count || bounds.last().is_some_and(|&last| index <= last) {
            return Err(InterpolationError::InvalidBreak { index, count });
        }
        bounds.push(index);
    }
    if count < 2 {
        return Err(InterpolationError::TooFewPoints { count, required: 2 });
    }
    bounds.push(count - 1);

    let shortest = bounds.windows(2).map(|w| w[1] - w[0]).min().unwrap_or(1);
    let degree = ideal_degree.min(shortest);

    let pieces = bounds
        .windows(2)
        .map(|w| interpolate(ctx, &points[w[0]..=w[1]], None, degree))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(combine(&pieces)?)
}

/// Averages the chord length parameters of corresponding control points over all sections.
fn section_parameters(sections: &[Curve]) -> Vec<f64> {
    let count = sections[0].control_count();
    let mut params = vec![0.0; sections.len()];
    for j in 0..count {
        let column: Vec<Vec3> = sections.iter().map(|s| s.points().get(j)).collect();
        for (sum, t) in params.iter_mut().zip(parameters::generate(&column, Method::ChordLength)) {
            *sum += t;
        }
    }
    params.iter_mut().for_each(|t| *t /= count as f64);
    params
}

/// Lofts a surface through the section curves, blending them along `direction`.
///
/// The sections are made compatible first. For `Direction::V` every section becomes a row of
/// the control net running along `u`, for `Direction::U` a column running along `v`.
pub fn loft(
    ctx: &mut NumericContext,
    sections: &[Curve],
    params: Option<&[f64]>,
    ideal_degree: usize,
    direction: Direction,
) -> Result<Surface, InterpolationError> {
    let k = sections.len();
    if k < 2 {
        return Err(InterpolationError::TooFewSections { count: k, required: 2 });
    }
    let mut sections = sections.to_vec();
    make_curves_compatible(&mut sections)?;

    let params = match params {
        Some(params) => params.to_vec(),
        None => section_parameters(&sections),
    };
    check_parameters(&params, k)?;
    let (blend, matrix) = collocation(&params, ideal_degree)?;

    let m = sections[0].control_count();
    let mut rhs = MatD::zeros(k, 3 * m);
    for (i, section) in sections.iter().enumerate() {
        for j in 0..m {
            rhs.fixed_view_mut::<1, 3>(i, 3 * j).copy_from(&section.points().get(j).transpose());
        }
    }
    let solution = ctx.lu_solve(&matrix, &rhs)?;

    let (rows, cols) = match direction {
        Direction::V => (k, m),
        Direction::U => (m, k),
    };
    let net = MatD::from_fn(4, rows * cols, |x, index| {
        let (r, c) = (index / cols, index % cols);
        match (x, direction) {
            (3, _) => 1.0,
            (_, Direction::V) => solution[(r, 3 * c + x)],
            (_, Direction::U) => solution[(c, 3 * r + x)],
        }
    });
    let net = ControlNet::from_matrix(rows, cols, net);

    let section_basis = sections[0].basis().clone();
    let (u_basis, v_basis) = match direction {
        Direction::V => (section_basis, blend),
        Direction::U => (blend, section_basis),
    };
    debug!("lofted {k} sections with {m} control points along {direction:?}");
    Ok(Surface::new(u_basis, v_basis, net)?)
}
