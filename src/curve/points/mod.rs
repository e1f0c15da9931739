//! Implements the control points constituting the control polygon of a curve.
//!
//! Control points are stored column-wise in a `4 x n` matrix of homogeneous coordinates
//! `(x, y, z, w)`. All weights are one, so the cartesian position is the leading `xyz` part.
//!
//! Control points are generated and manipulated as part of the [fitting][crate::fitting] and
//! [manipulation][crate::manipulation] methods.

use thiserror::Error;

use crate::types::{homogeneous, ControlPoint, MatD, Vec3};

#[derive(Error, Debug, PartialEq)]
pub enum PointsError {
    #[error("A control point matrix needs three or four rows, got `{rows}`.")]
    InvalidDimension { rows: usize },

    #[error("Control point index `{index}` is out of range for `{count}` control points.")]
    IndexOutOfRange { index: usize, count: usize },
}

/// Shared access to a homogeneous `4 x n` point matrix.
pub trait Points {
    fn matrix(&self) -> &MatD;
    fn matrix_mut(&mut self) -> &mut MatD;

    /// Cartesian position of the `i`-th point.
    fn get(&self, i: usize) -> Vec3 {
        self.matrix().fixed_view::<3, 1>(0, i).into_owned()
    }

    fn homogeneous(&self, i: usize) -> ControlPoint {
        self.matrix().fixed_view::<4, 1>(0, i).into_owned()
    }

    fn set(&mut self, i: usize, point: &Vec3) {
        self.matrix_mut().fixed_view_mut::<4, 1>(0, i).copy_from(&homogeneous(point));
    }

    fn count(&self) -> usize {
        self.matrix().ncols()
    }

    fn is_empty(&self) -> bool {
        self.matrix().is_empty()
    }

    fn cartesian(&self) -> Vec<Vec3> {
        (0..self.count()).map(|i| self.get(i)).collect()
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct ControlPoints {
    matrix: MatD,
}

impl Points for ControlPoints {
    fn matrix(&self) -> &MatD {
        &self.matrix
    }

    fn matrix_mut(&mut self) -> &mut MatD {
        &mut self.matrix
    }
}

impl ControlPoints {
    /// Creates control points from a `3 x n` cartesian or a `4 x n` homogeneous matrix.
    pub fn new(matrix: MatD) -> Result<Self, PointsError> {
        match matrix.nrows() {
            3 => Ok(ControlPoints { matrix: matrix.insert_row(3, 1.0) }),
            4 => Ok(ControlPoints { matrix }),
            rows => Err(PointsError::InvalidDimension { rows }),
        }
    }

    pub fn from_cartesian(points: &[Vec3]) -> Self {
        ControlPoints { matrix: MatD::from_fn(4, points.len(), |r, c| if r < 3 { points[c][r] } else { 1.0 }) }
    }

    /// Wraps a homogeneous `4 x n` matrix produced by the kernel itself.
    pub(crate) fn from_matrix(matrix: MatD) -> Self {
        ControlPoints { matrix }
    }

    pub fn from_homogeneous(points: &[ControlPoint]) -> Self {
        ControlPoints { matrix: MatD::from_fn(4, points.len(), |r, c| points[c][r]) }
    }

    pub fn try_set(&mut self, i: usize, point: &Vec3) -> Result<(), PointsError> {
        if i >= self.count() {
            return Err(PointsError::IndexOutOfRange { index: i, count: self.count() });
        }
        self.set(i, point);
        Ok(())
    }

    pub fn reverse(&mut self) -> &mut Self {
        reverse(&mut self.matrix);
        self
    }
}

pub(crate) fn reverse(points: &mut MatD) {
    let ncols = points.ncols();
    let half_ncols = points.ncols() / 2;

    for i in 0..half_ncols {
        points.swap_columns(i, ncols - 1 - i);
    }
}
