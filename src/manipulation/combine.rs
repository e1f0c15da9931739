//! Combines curves end to end into one curve.
//!
//! Every joint becomes an interior knot of multiplicity `p`, so the combined curve passes
//! through the joint control point. The adjoining end and start control points are averaged
//! at the seam. Each following curve is shifted so that its domain starts where the previous
//! one ended.

use log::debug;
use thiserror::Error;

use crate::{
    basis::{knots::KnotVector, Basis, BasisError},
    curve::{
        points::{ControlPoints, Points},
        Curve, CurveError,
    },
    types::ControlPoint,
};

#[derive(Error, Debug, PartialEq)]
pub enum CombineError {
    #[error("At least one curve is required.")]
    NoCurves,

    #[error("The degree of curve `{index}` is `p = {found}`, but `p = {expected}` was expected.")]
    DegreeMismatch { index: usize, expected: usize, found: usize },

    #[error("Curve generation failed: {0}")]
    CurveError(#[from] CurveError),
}

pub fn combine(curves: &[Curve]) -> Result<Curve, CombineError> {
    let first = curves.first().ok_or(CombineError::NoCurves)?;
    let p = first.degree();

    let mut knots = first.knots().expanded();
    let mut points: Vec<ControlPoint> = (0..first.control_count()).map(|i| first.points.homogeneous(i)).collect();

    for (index, next) in curves.iter().enumerate().skip(1) {
        if next.degree() != p {
            return Err(CombineError::DegreeMismatch { index, expected: p, found: next.degree() });
        }

        let end = knots[knots.len() - 1];
        let shift = end - next.domain().0;

        knots.truncate(knots.len() - (p + 1));
        knots.extend(std::iter::repeat(end).take(p));
        knots.extend(next.knots().expanded().iter().skip(p + 1).map(|u| u + shift));

        if let Some(seam) = points.last_mut() {
            *seam = (*seam + next.points.homogeneous(0)) / 2.0;
        }
        points.extend((1..next.control_count()).map(|i| next.points.homogeneous(i)));
    }

    let knots = KnotVector::from_expanded(&knots).map_err(|e| CurveError::from(BasisError::from(e)))?;
    let basis = Basis::new(p, knots).map_err(CurveError::from)?;
    let combined = Curve::new(basis, ControlPoints::from_homogeneous(&points))?;

    debug!("combined {} curves into {} control points", curves.len(), combined.control_count());
    Ok(combined)
}
