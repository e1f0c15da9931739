//! Inserts an additional knot into a curve or surface.
//!
//! Knot insertion by Boehm refines the control polygon without changing the shape:
//! for the span `k` with `u_k <= ū < u_{k+1}`, the control points `k-p+1..=k` are replaced by
//!
//! `Q_i = α_i P_i + (1 - α_i) P_{i-1}` with `α_i = (ū - u_i) / (u_{i+p} - u_i)`
//!
//! and one control point is added. Surfaces apply the scheme to every row (u) or column (v)
//! of the control net.

use std::ops::AddAssign;

use log::trace;
use thiserror::Error;

use crate::{
    basis::Basis,
    curve::{
        points::{ControlPoints, Points},
        Curve,
    },
    surface::{ControlNet, Direction, Surface},
    types::MatD,
};

#[derive(Error, Debug, PartialEq)]
pub enum InsertError {
    #[error("Parameter `u = {u}` lies outside the interval `({lower_bound}, {upper_bound})`.")]
    OutOfBounds { u: f64, lower_bound: f64, upper_bound: f64 },

    #[error(
        "The knot `u = {u}` has a multiplicity of `m = {m}` already. \
    Therefore, the knot cannot be inserted as this would exceed the maximum \
    multiplicity corresponding to the degree with `p = {p}`."
    )]
    MultiplicityError { u: f64, m: usize, p: usize },
}

/// Checks that `u` can be inserted and snaps it onto an existing knot value within tolerance.
fn admissible(basis: &Basis, u: f64) -> Result<f64, InsertError> {
    let (lower_bound, upper_bound) = basis.domain();
    if u <= lower_bound || u >= upper_bound {
        return Err(InsertError::OutOfBounds { u, lower_bound, upper_bound });
    }

    let p = basis.degree();
    let knots = basis.knots();
    match knots.find(u) {
        Some(i) if knots.knots()[i].multiplicity >= p => {
            Err(InsertError::MultiplicityError { u, m: knots.knots()[i].multiplicity, p })
        }
        Some(i) => Ok(knots.knots()[i].value),
        None => Ok(u),
    }
}

/// Boehm's algorithm applied to the columns of `points`.
pub(crate) fn refine(knots: &[f64], p: usize, points: &MatD, u: f64) -> MatD {
    let l = knots.partition_point(|&x| x <= u) - 1;
    let count = points.ncols();

    let mut new_points = MatD::zeros(points.nrows(), count + 1);

    let top_cols = l - p + 1;
    new_points.columns_mut(0, top_cols).copy_from(&points.columns(0, top_cols));

    let bot_cols = count - l;
    new_points.columns_mut(count + 1 - bot_cols, bot_cols).copy_from(&points.columns(count - bot_cols, bot_cols));

    for i in (l - p + 1)..=l {
        let alpha = (u - knots[i]) / (knots[i + p] - knots[i]);
        new_points.column_mut(i).add_assign((1. - alpha) * points.column(i - 1) + alpha * points.column(i));
    }
    new_points
}

/// Knot insertion algorithm by Boehm.
/// `u` the knot to be inserted. The value must lie strictly inside the domain.
pub fn insert(c: &mut Curve, u: f64) -> Result<(), InsertError> {
    let u = admissible(&c.basis, u)?;

    let refined = refine(c.basis.expanded(), c.degree(), c.points.matrix(), u);
    *c.points.matrix_mut() = refined;
    c.basis.knots_mut().add(u, 1);

    trace!("inserted knot u = {u}, control points: {}", c.points.count());
    Ok(())
}

/// Inserts the knot `t` along `direction` into every row or column of the control net.
pub fn insert_surface(s: &mut Surface, direction: Direction, t: f64) -> Result<(), InsertError> {
    let basis = s.basis(direction);
    let t = admissible(basis, t)?;

    let knots = basis.expanded();
    let p = basis.degree();
    let lines: Vec<ControlPoints> = s
        .net
        .lines(direction)
        .iter()
        .map(|line| ControlPoints::from_matrix(refine(knots, p, line.matrix(), t)))
        .collect();

    s.net = ControlNet::from_lines(direction, &lines);
    s.basis_mut(direction).knots_mut().add(t, 1);

    trace!("inserted knot {direction:?} = {t}, net: {} x {}", s.net.rows(), s.net.cols());
    Ok(())
}
