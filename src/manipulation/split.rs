//! Splits a curve into two independent ones.
//!
//! The splitting is conducted by raising the multiplicity of the respective knot to `p`, which
//! allows for splitting the knot vector. Both halves keep their part of the original domain
//! and share the control point at the split location.

use log::debug;
use thiserror::Error;

use crate::{
    basis::{knots::KnotVector, Basis, BasisError},
    curve::{
        points::{ControlPoints, Points},
        Curve, CurveError,
    },
    manipulation::insert::InsertError,
    types::MatD,
};

#[derive(Error, Debug, PartialEq)]
pub enum SplitError {
    #[error("Parameter `u = {u}` lies outside the interval `({lower_bound}, {upper_bound})`.")]
    OutOfBounds { u: f64, lower_bound: f64, upper_bound: f64 },

    #[error("Knot insertion failed: {0}")]
    Insert(#[from] InsertError),

    #[error("Curve generation failed: {0}")]
    CurveError(#[from] CurveError),
}

pub fn split(c: &Curve, u: f64) -> Result<(Curve, Curve), SplitError> {
    let (lower_bound, upper_bound) = c.domain();
    if u <= lower_bound || u >= upper_bound {
        return Err(SplitError::OutOfBounds { u, lower_bound, upper_bound });
    }

    let p = c.degree();
    let u = c.knots().find(u).map_or(u, |i| c.knots().knots()[i].value);
    let multiplicity = c.knots().multiplicity(u);

    let mut refined = c.clone();
    refined.insert_times(u, p - multiplicity)?;

    let knots = refined.basis.expanded();
    let points = refined.points.matrix();

    // last occurrence of `u` in the expanded sequence
    let r = knots.partition_point(|&x| x <= u) - 1;
    let idx = r - p;

    let left = {
        let mut values = knots[..=r].to_vec();
        values.push(u);
        piece(p, &values, points.columns(0, idx + 1).into_owned())?
    };

    let right = {
        let mut values = vec![u];
        values.extend_from_slice(&knots[r - p + 1..]);
        piece(p, &values, points.columns(idx, points.ncols() - idx).into_owned())?
    };

    debug!("split curve at u = {u} into {} + {} control points", left.control_count(), right.control_count());
    Ok((left, right))
}

fn piece(p: usize, knots: &[f64], points: MatD) -> Result<Curve, CurveError> {
    let knots = KnotVector::from_expanded(knots).map_err(BasisError::from)?;
    Curve::new(Basis::new(p, knots)?, ControlPoints::from_matrix(points))
}

/// Splits the curve at every parameter in `at`, returning the pieces in parameter order.
pub fn split_at(c: &Curve, at: &[f64]) -> Result<Vec<Curve>, SplitError> {
    let mut params = at.to_vec();
    params.sort_by(f64::total_cmp);
    params.dedup();

    let mut pieces = Vec::with_capacity(params.len() + 1);
    let mut rest = c.clone();
    for u in params {
        let (left, right) = split(&rest, u)?;
        pieces.push(left);
        rest = right;
    }
    pieces.push(rest);
    Ok(pieces)
}
