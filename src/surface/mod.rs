//! Implements the tensor-product B-spline surface.
//!
//! A surface of degrees `(p, q)` is defined by
//!
//! `S^(k,l)(u, v) = sum_{i=0}^{n} sum_{j=0}^{m} N^(k)_{i,p}(u) M^(l)_{j,q}(v) P_{j,i}`
//!
//! with two independent [bases][crate::basis] along `u` and `v` and a [control net][ControlNet]
//! whose rows run along `u` (one row per `v` basis function).

use log::warn;
use thiserror::Error;

use crate::{
    basis::{Basis, BasisError, SpanBasis},
    curve::{
        points::{ControlPoints, Points},
        Curve, CurveError,
    },
    manipulation::{
        insert::{insert_surface, InsertError},
        remove::remove_surface,
        reverse::reverse_surface,
    },
    types::{BoundingBox, ControlPoint, MatD, Vec3, EVALUATION_TOLERANCE},
};

pub use self::net::ControlNet;

mod net;

/// A parametric axis of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    U,
    V,
}

impl Direction {
    pub fn other(self) -> Self {
        match self {
            Direction::U => Direction::V,
            Direction::V => Direction::U,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum SurfaceError {
    #[error("The bases expect a `{expected_rows} x {expected_cols}` control net, but it is `{rows} x {cols}`.")]
    ControlNetMismatch { rows: usize, cols: usize, expected_rows: usize, expected_cols: usize },

    #[error("Row `{row}` of the control net has `{found}` points, but `{expected}` were expected.")]
    RaggedNet { row: usize, expected: usize, found: usize },

    #[error("Control point `({row}, {col})` lies outside the `{rows} x {cols}` control net.")]
    IndexOutOfRange { row: usize, col: usize, rows: usize, cols: usize },

    #[error(
        "The span evaluations at `(u, v) = ({u}, {v})` deviate by `{deviation}`, \
        which exceeds the evaluation tolerance."
    )]
    AmbiguousEvaluation { u: f64, v: f64, deviation: f64 },

    #[error("Removing the knot from line `{index}` yields `{found}` removals instead of `{expected}`.")]
    InconsistentRemoval { index: usize, expected: usize, found: usize },

    #[error("Basis error: {0}")]
    Basis(#[from] BasisError),

    #[error("Curve error: {0}")]
    Curve(#[from] CurveError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub(crate) u_basis: Basis,
    pub(crate) v_basis: Basis,
    pub(crate) net: ControlNet,
}

impl Surface {
    pub fn new(u_basis: Basis, v_basis: Basis, net: ControlNet) -> Result<Self, SurfaceError> {
        let (expected_rows, expected_cols) = (v_basis.control_count(), u_basis.control_count());
        if net.rows() != expected_rows || net.cols() != expected_cols {
            return Err(SurfaceError::ControlNetMismatch {
                rows: net.rows(),
                cols: net.cols(),
                expected_rows,
                expected_cols,
            });
        }
        Ok(Surface { u_basis, v_basis, net })
    }

    /// Surface over the given rows of control points with uniform knot vectors on `[0, 1]`.
    ///
    /// # Examples
    /// ```
    /// use bspline_kernel::surface::Surface;
    /// use bspline_kernel::types::Vec3;
    ///
    /// let rows = vec![
    ///     vec![Vec3::new(0., 0., 0.), Vec3::new(1., 0., 0.)],
    ///     vec![Vec3::new(0., 1., 0.), Vec3::new(1., 1., 1.)],
    /// ];
    /// let s = Surface::from_points(1, 1, &rows).unwrap();
    /// assert_eq!(s.point(0.5, 0.5).unwrap(), Vec3::new(0.5, 0.5, 0.25));
    /// ```
    pub fn from_points(u_degree: usize, v_degree: usize, rows: &[Vec<Vec3>]) -> Result<Self, SurfaceError> {
        let net = ControlNet::new(rows)?;
        let u_basis = Basis::uniform(u_degree, net.cols())?;
        let v_basis = Basis::uniform(v_degree, net.rows())?;
        Surface::new(u_basis, v_basis, net)
    }

    pub fn basis(&self, direction: Direction) -> &Basis {
        match direction {
            Direction::U => &self.u_basis,
            Direction::V => &self.v_basis,
        }
    }

    pub(crate) fn basis_mut(&mut self, direction: Direction) -> &mut Basis {
        match direction {
            Direction::U => &mut self.u_basis,
            Direction::V => &mut self.v_basis,
        }
    }

    pub fn u_basis(&self) -> &Basis {
        &self.u_basis
    }

    pub fn v_basis(&self) -> &Basis {
        &self.v_basis
    }

    pub fn net(&self) -> &ControlNet {
        &self.net
    }

    pub fn degree(&self, direction: Direction) -> usize {
        self.basis(direction).degree()
    }

    pub fn domain(&self, direction: Direction) -> (f64, f64) {
        self.basis(direction).domain()
    }

    fn evaluate_spans(&self, u_span: &SpanBasis, v_span: &SpanBasis) -> Vec3 {
        let mut sum = Vec3::zeros();
        for (j, nv) in v_span.iter() {
            for (i, nu) in u_span.iter() {
                sum += nu * nv * self.net.at(j, i);
            }
        }
        sum
    }

    pub fn point(&self, u: f64, v: f64) -> Result<Vec3, SurfaceError> {
        self.derivative(u, v, 0, 0)
    }

    /// Evaluates the mixed partial derivative `∂^(du+dv) S / ∂u^du ∂v^dv` at `(u, v)`.
    ///
    /// Candidates from adjacent spans at interior knots are averaged when they agree within
    /// [`EVALUATION_TOLERANCE`].
    pub fn derivative(&self, u: f64, v: f64, du: usize, dv: usize) -> Result<Vec3, SurfaceError> {
        let u_spans = self.u_basis.evaluate(u, None, du)?;
        let v_spans = self.v_basis.evaluate(v, None, dv)?;

        let candidates: Vec<Vec3> =
            v_spans.iter().flat_map(|vs| u_spans.iter().map(move |us| self.evaluate_spans(us, vs))).collect();

        let deviation = candidates.iter().skip(1).map(|c| (c - candidates[0]).norm()).fold(0.0, f64::max);
        if deviation > EVALUATION_TOLERANCE {
            warn!("ambiguous surface evaluation at ({u}, {v}): span candidates deviate by {deviation}");
            return Err(SurfaceError::AmbiguousEvaluation { u, v, deviation });
        }
        Ok(candidates.iter().sum::<Vec3>() / candidates.len() as f64)
    }

    /// Position and the first and second partial derivatives `[S, Su, Sv, Suu, Suv, Svv]`.
    pub fn derivatives(&self, u: f64, v: f64) -> Result<[Vec3; 6], SurfaceError> {
        Ok([
            self.derivative(u, v, 0, 0)?,
            self.derivative(u, v, 1, 0)?,
            self.derivative(u, v, 0, 1)?,
            self.derivative(u, v, 2, 0)?,
            self.derivative(u, v, 1, 1)?,
            self.derivative(u, v, 0, 2)?,
        ])
    }

    /// Fixes the parameter along `direction` at `t` and returns the curve running along the other axis.
    pub fn isocurve(&self, direction: Direction, t: f64) -> Result<Curve, SurfaceError> {
        let spans = self.basis(direction).evaluate(t, None, 0)?;

        let contracted: Vec<ControlPoints> = spans
            .iter()
            .map(|span| {
                let points: Vec<ControlPoint> = self
                    .net
                    .lines(direction)
                    .iter()
                    .map(|line| span.iter().fold(ControlPoint::zeros(), |acc, (i, n)| acc + n * line.homogeneous(i)))
                    .collect();
                ControlPoints::from_homogeneous(&points)
            })
            .collect();

        let points = match contracted.as_slice() {
            [left, right] => {
                let deviation = (left.matrix() - right.matrix()).column_iter().map(|c| c.norm()).fold(0.0, f64::max);
                if deviation > EVALUATION_TOLERANCE {
                    warn!("ambiguous isocurve {direction:?} = {t}: span candidates deviate by {deviation}");
                    let (u, v) = match direction {
                        Direction::U => (t, f64::NAN),
                        Direction::V => (f64::NAN, t),
                    };
                    return Err(SurfaceError::AmbiguousEvaluation { u, v, deviation });
                }
                ControlPoints::from_matrix((left.matrix() + right.matrix()) / 2.0)
            }
            _ => contracted[0].clone(),
        };

        Ok(Curve::new(self.basis(direction.other()).clone(), points)?)
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.net.cartesian().iter())
    }

    pub fn set_control_point(&mut self, row: usize, col: usize, point: &Vec3) -> Result<&mut Self, SurfaceError> {
        if row >= self.net.rows() || col >= self.net.cols() {
            return Err(SurfaceError::IndexOutOfRange { row, col, rows: self.net.rows(), cols: self.net.cols() });
        }
        self.net.set_at(row, col, point);
        Ok(self)
    }

    pub fn reparameterize(&mut self, direction: Direction, domain: (f64, f64)) -> Result<&mut Self, SurfaceError> {
        self.basis_mut(direction).reparameterize(domain)?;
        Ok(self)
    }

    /// Reverses the parametrization along `direction`.
    pub fn reverse(&mut self, direction: Direction) -> &mut Self {
        reverse_surface(self, direction)
    }

    /// Inserts the knot `t` along `direction`.
    pub fn insert(&mut self, direction: Direction, t: f64) -> Result<&mut Self, InsertError> {
        insert_surface(self, direction, t)?;
        Ok(self)
    }

    /// Removes the knot `t` along `direction` up to `times` times, uniformly across the net.
    pub fn remove(&mut self, direction: Direction, t: f64, times: usize, tolerance: f64) -> Result<usize, SurfaceError> {
        remove_surface(self, direction, t, times, tolerance)
    }

    pub(crate) fn with_net(&self, matrix: MatD) -> Surface {
        Surface {
            u_basis: self.u_basis.clone(),
            v_basis: self.v_basis.clone(),
            net: ControlNet::from_matrix(self.net.rows(), self.net.cols(), matrix),
        }
    }
}
