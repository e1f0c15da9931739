//! Generates curves and surfaces from data.
//!
//! ## Methods
//!
//! - [Interpolation][interpolation] of point sequences, piecewise interpolation and lofting
//! - [Least-squares approximation][approximation] of weighted samples, optionally penalized
//!   and subject to exact constraints, and guided surfaces built on top of it
//!
//! All linear systems are solved through a [`NumericContext`][crate::linalg::NumericContext].

use crate::types::{MatD, Vec3};

pub mod approximation;
pub mod interpolation;

/// A data point with its parameter and weight.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample<P> {
    pub parameter: P,
    pub position: Vec3,
    pub weight: f64,
}

pub type CurveSample = Sample<f64>;
pub type SurfaceSample = Sample<(f64, f64)>;

impl<P> Sample<P> {
    pub fn new(parameter: P, position: Vec3) -> Self {
        Sample { parameter, position, weight: 1.0 }
    }

    pub fn weighted(parameter: P, position: Vec3, weight: f64) -> Self {
        Sample { parameter, position, weight }
    }
}

/// Stacks positions as the rows of an `n x 3` matrix.
pub(crate) fn position_rows<'a>(positions: impl ExactSizeIterator<Item = &'a Vec3>) -> MatD {
    let mut rows = MatD::zeros(positions.len(), 3);
    for (k, p) in positions.enumerate() {
        rows.row_mut(k).copy_from(&p.transpose());
    }
    rows
}

/// Turns an `n x 3` solution into the `4 x n` homogeneous control point matrix.
pub(crate) fn homogeneous_columns(solution: &MatD) -> MatD {
    MatD::from_fn(4, solution.nrows(), |r, c| if r < 3 { solution[(c, r)] } else { 1.0 })
}
