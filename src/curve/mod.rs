//! Implements the B-spline curve.
//!
//! A B-spline curve of degree `p` is defined by
//!
//! `C^(k)(u) = sum_{i=0}^{n} N^(k)_{i,p}(u) P_i`
//!
//! with the
//! - parameter `u` within the domain of the [basis][crate::basis],
//! - derivative order `k`,
//! - `n+1` [spline basis functions][crate::basis] `N` of degree `p` defined by a clamped [knot vector][crate::basis::knots], and
//! - `n+1` homogeneous [control points][points] `P`.
//!
//! Only the `p+1` control points surrounding `u` contribute to the sum.

use log::warn;
use thiserror::Error;

use crate::{
    basis::{Basis, BasisError, SpanBasis},
    manipulation::{
        combine::{combine, CombineError},
        insert::{insert, InsertError},
        remove::remove,
        reverse::reverse,
        split::{split, split_at, SplitError},
    },
    types::{BoundingBox, Vec3, EVALUATION_TOLERANCE},
};

use self::points::{ControlPoints, Points, PointsError};

pub mod points;

#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub(crate) basis: Basis,
    pub(crate) points: ControlPoints,
}

#[derive(Error, Debug, PartialEq)]
pub enum CurveError {
    #[error("The basis expects `{expected}` control points, but `{actual}` were given.")]
    ControlPointCountMismatch { expected: usize, actual: usize },

    #[error(
        "The two span evaluations at the knot `u = {u}` deviate by `{deviation}`, \
        which exceeds the evaluation tolerance."
    )]
    AmbiguousEvaluation { u: f64, deviation: f64 },

    #[error("Basis error: {0}")]
    Basis(#[from] BasisError),

    #[error("Control point error: {0}")]
    Points(#[from] PointsError),
}

impl Curve {
    /// Returns a B-spline curve.
    ///
    /// # Examples
    /// ```
    /// use bspline_kernel::basis::Basis;
    /// use bspline_kernel::curve::{points::ControlPoints, Curve};
    /// use bspline_kernel::types::Vec3;
    ///
    /// let points = ControlPoints::from_cartesian(&[
    ///     Vec3::new(-2.0, -1.0, 0.0),
    ///     Vec3::new(-2.0, 0.0, 0.5),
    ///     Vec3::new(-1.0, 1.0, 1.5),
    ///     Vec3::new(0.5, 1.0, -0.5),
    ///     Vec3::new(1.5, 2.0, -1.0),
    /// ]);
    /// let basis = Basis::uniform(2, 5).unwrap();
    /// let curve = Curve::new(basis, points).unwrap();
    /// assert_eq!(curve.point(0.0, 0).unwrap(), Vec3::new(-2.0, -1.0, 0.0));
    /// ```
    pub fn new(basis: Basis, points: ControlPoints) -> Result<Self, CurveError> {
        let expected = basis.control_count();
        match points.count() {
            actual if actual != expected => Err(CurveError::ControlPointCountMismatch { expected, actual }),
            _ => Ok(Self { basis, points }),
        }
    }

    /// Curve of degree `degree` over the given control points with a uniform knot vector on `[0, 1]`.
    pub fn from_points(degree: usize, points: &[Vec3]) -> Result<Self, CurveError> {
        let basis = Basis::uniform(degree, points.len())?;
        Curve::new(basis, ControlPoints::from_cartesian(points))
    }

    pub fn degree(&self) -> usize {
        self.basis.degree()
    }

    pub fn basis(&self) -> &Basis {
        &self.basis
    }

    pub fn knots(&self) -> &crate::basis::knots::KnotVector {
        self.basis.knots()
    }

    pub fn points(&self) -> &ControlPoints {
        &self.points
    }

    pub fn control_count(&self) -> usize {
        self.points.count()
    }

    pub fn domain(&self) -> (f64, f64) {
        self.basis.domain()
    }

    pub(crate) fn evaluate_span(&self, span: &SpanBasis) -> Vec3 {
        span.iter().fold(Vec3::zeros(), |acc, (i, n)| acc + n * self.points.get(i))
    }

    /// Evaluates the `d`-th derivative at `u`.
    ///
    /// On an interior knot, the evaluations of both adjacent spans must agree within
    /// [`EVALUATION_TOLERANCE`] and are averaged.
    pub fn point(&self, u: f64, d: usize) -> Result<Vec3, CurveError> {
        let candidates = self.evaluate(u, d)?;
        match candidates.as_slice() {
            [left, right] => {
                let deviation = (left - right).norm();
                if deviation > EVALUATION_TOLERANCE {
                    warn!("ambiguous curve evaluation at u = {u}: span candidates deviate by {deviation}");
                    return Err(CurveError::AmbiguousEvaluation { u, deviation });
                }
                Ok((left + right) / 2.0)
            }
            _ => Ok(candidates[0]),
        }
    }

    /// Raw per-span evaluations of the `d`-th derivative at `u`, left span first.
    pub fn evaluate(&self, u: f64, d: usize) -> Result<Vec<Vec3>, CurveError> {
        Ok(self.basis.evaluate(u, None, d)?.iter().map(|span| self.evaluate_span(span)).collect())
    }

    /// Evaluates the `d`-th derivative at each parameter.
    pub fn points_at(&self, params: &[f64], d: usize) -> Result<Vec<Vec3>, CurveError> {
        params.iter().map(|&u| self.point(u, d)).collect()
    }

    /// Evaluates the curve at `count` evenly spaced parameters across the domain.
    pub fn sample(&self, count: usize) -> Result<Vec<Vec3>, CurveError> {
        let (a, b) = self.domain();
        let divisions = count.max(2) - 1;
        (0..=divisions).map(|k| self.point((a + (b - a) * k as f64 / divisions as f64).min(b), 0)).collect()
    }

    /// Derivative vectors of every span containing `u`, including both sides of an interior knot.
    pub fn derivative_candidates(&self, u: f64, d: usize) -> Result<Vec<Vec3>, CurveError> {
        Ok(self.basis.evaluate_all(u, None, d)?.iter().map(|span| self.evaluate_span(span)).collect())
    }

    /// Bounding box of the control polygon, which encloses the curve.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.points.cartesian().iter())
    }

    /// Linearly rescales the knot vector onto `domain`.
    pub fn reparameterize(&mut self, domain: (f64, f64)) -> Result<&mut Self, CurveError> {
        self.basis.reparameterize(domain)?;
        Ok(self)
    }

    /// Reverses the curve direction within its domain.
    pub fn reverse(&mut self) -> &mut Self {
        reverse(self)
    }

    pub fn set_control_point(&mut self, i: usize, point: &Vec3) -> Result<&mut Self, CurveError> {
        self.points.try_set(i, point)?;
        Ok(self)
    }

    /// Inserts a knot into the curve at parameter `u`.
    ///
    /// # Arguments
    /// * `u` - The parameter`u` that must lie strictly inside the domain.
    pub fn insert(&mut self, u: f64) -> Result<&mut Self, InsertError> {
        self.insert_times(u, 1)
    }

    /// Inserts a knot `x` times into the curve at parameter `u`.
    pub fn insert_times(&mut self, u: f64, x: usize) -> Result<&mut Self, InsertError> {
        for _ in 0..x {
            insert(self, u)?;
        }
        Ok(self)
    }

    /// Removes the knot `u` up to `times` times while the curve deviates by at most `tolerance`.
    ///
    /// Returns the number of removals; the curve is left untouched when it is zero.
    pub fn remove(&mut self, u: f64, times: usize, tolerance: f64) -> usize {
        remove(self, u, times, tolerance)
    }

    /// Splits a curve into two at parameter `u`.
    pub fn split(&self, u: f64) -> Result<(Self, Self), SplitError> {
        split(self, u)
    }

    /// Splits a curve at all parameters in `at`.
    pub fn split_at(&self, at: &[f64]) -> Result<Vec<Self>, SplitError> {
        split_at(self, at)
    }

    /// Joins curves end to end into one curve.
    pub fn combine(curves: &[Curve]) -> Result<Curve, CombineError> {
        combine(curves)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rstest::{fixture, rstest};

    use crate::basis::knots::KnotVector;

    use super::*;

    #[fixture]
    /// A straight test curve with default degree two.
    fn c(#[default(2)] degree: usize) -> Curve {
        let c = Curve::from_points(degree, &[Vec3::new(1., 2., 0.), Vec3::new(3., 4., 0.), Vec3::new(5., 6., 0.)])
            .unwrap();
        assert_eq!(c.knots().expanded(), vec![0., 0., 0., 1., 1., 1.]);
        c
    }

    mod evaluate {
        use super::*;

        #[rstest]
        fn non_existing_derivative(c: Curve) {
            assert_eq!(c.point(0.5, 3), Ok(Vec3::zeros()));
        }

        #[rstest]
        fn outside_lower_bound(c: Curve) {
            let u = -0.1;
            assert_eq!(
                c.point(u, 0),
                Err(CurveError::Basis(BasisError::ParameterOutOfDomain { u, lower_bound: 0.0, upper_bound: 1.0 }))
            );
        }

        #[rstest]
        fn outside_upper_bound(c: Curve) {
            let u = 1.1;
            assert_eq!(
                c.point(u, 1),
                Err(CurveError::Basis(BasisError::ParameterOutOfDomain { u, lower_bound: 0.0, upper_bound: 1.0 }))
            );
        }

        #[rstest]
        fn start(c: Curve) {
            assert_eq!(c.point(0., 0).unwrap(), Vec3::new(1., 2., 0.))
        }

        #[rstest]
        fn middle(c: Curve) {
            assert_relative_eq!(c.point(0.5, 0).unwrap(), Vec3::new(3., 4., 0.))
        }

        #[rstest]
        fn end(c: Curve) {
            assert_eq!(c.point(1., 0).unwrap(), Vec3::new(5., 6., 0.))
        }

        #[rstest]
        fn constant_tangent(c: Curve) {
            for u in [0.0, 0.3, 1.0] {
                assert_relative_eq!(c.point(u, 1).unwrap(), Vec3::new(4., 4., 0.), epsilon = 1e-12);
            }
        }

        #[test]
        fn evaluate_p_repeated_knots() {
            let mut c = Curve::from_points(3, &[-1., -0.5, 0.5, 1.].map(|x| Vec3::new(x, 0., 0.))).unwrap();
            let u = 0.5;
            assert_eq!(c.point(0.0, 0).unwrap(), Vec3::new(-1., 0., 0.));
            assert_eq!(c.point(1.0, 0).unwrap(), Vec3::new(1., 0., 0.));

            for expected in [
                vec![-1., -0.75, 0.0, 0.75, 1.],
                vec![-1., -0.75, -0.375, 0.375, 0.75, 1.],
                vec![-1., -0.75, -0.375, 0.0, 0.375, 0.75, 1.],
            ] {
                c.insert(u).unwrap();
                assert_eq!(c.points().cartesian().iter().map(|p| p.x).collect::<Vec<_>>(), expected);
                assert_relative_eq!(c.point(u, 0).unwrap(), Vec3::zeros(), epsilon = 1e-12);
                assert_eq!(c.point(0.0, 0).unwrap(), Vec3::new(-1., 0., 0.));
                assert_eq!(c.point(1.0, 0).unwrap(), Vec3::new(1., 0., 0.));
            }
        }

        #[test]
        fn both_spans_agree_on_continuous_knot() {
            let c = Curve::from_points(2, &[Vec3::zeros(), Vec3::x(), Vec3::new(1., 1., 0.), Vec3::y()]).unwrap();
            assert_eq!(c.evaluate(0.5, 0).unwrap().len(), 2);
            assert_eq!(c.evaluate(0.5, 1).unwrap().len(), 1);
            assert_eq!(c.derivative_candidates(0.5, 1).unwrap().len(), 2);
            assert_relative_eq!(c.point(0.5, 0).unwrap(), Vec3::new(1., 0.5, 0.), epsilon = 1e-12);
        }

        #[test]
        fn discontinuous_derivative_candidates() {
            // multiplicity p at 0.5 leaves only C0 continuity
            let basis = Basis::new(2, KnotVector::from_expanded(&[0., 0., 0., 0.5, 0.5, 1., 1., 1.]).unwrap()).unwrap();
            let points = [Vec3::zeros(), Vec3::x(), Vec3::new(1., 1., 0.), Vec3::new(1., 3., 0.), Vec3::new(0., 3., 0.)];
            let c = Curve::new(basis, ControlPoints::from_cartesian(&points)).unwrap();
            let candidates = c.derivative_candidates(0.5, 1).unwrap();
            assert_relative_eq!(candidates[0], Vec3::new(0., 4., 0.), epsilon = 1e-12);
            assert_relative_eq!(candidates[1], Vec3::new(0., 8., 0.), epsilon = 1e-12);
            assert_eq!(c.point(0.5, 0).unwrap(), Vec3::new(1., 1., 0.));
        }
    }

    #[test]
    fn control_point_count_mismatch() {
        let basis = Basis::uniform(2, 4).unwrap();
        assert_eq!(
            Curve::new(basis, ControlPoints::from_cartesian(&[Vec3::zeros(); 3])),
            Err(CurveError::ControlPointCountMismatch { expected: 4, actual: 3 })
        );
    }

    #[rstest]
    fn reverse(c: Curve) {
        let mut reversed = c.clone();
        reversed.reverse();

        assert_eq!(reversed.knots(), c.knots());
        assert_eq!(reversed.points().get(0), Vec3::new(5., 6., 0.));
        for u in [0.0, 0.2, 0.7, 1.0] {
            assert_relative_eq!(reversed.point(u, 0).unwrap(), c.point(1.0 - u, 0).unwrap(), epsilon = 1e-12);
        }

        reversed.reverse();
        assert_eq!(reversed, c);
    }

    #[rstest]
    fn reparameterize(c: Curve) {
        let mut moved = c.clone();
        moved.reparameterize((2.0, 6.0)).unwrap();
        assert_eq!(moved.domain(), (2.0, 6.0));
        assert_relative_eq!(moved.point(3.0, 0).unwrap(), c.point(0.25, 0).unwrap(), epsilon = 1e-12);
        assert!(moved.reparameterize((1.0, 0.0)).is_err());
    }

    #[rstest]
    fn set_control_point(c: Curve) {
        let mut edited = c.clone();
        edited.set_control_point(2, &Vec3::new(5., 6., 2.)).unwrap();
        assert_eq!(edited.point(1.0, 0).unwrap(), Vec3::new(5., 6., 2.));
        assert_eq!(
            edited.set_control_point(3, &Vec3::zeros()).map(|_| ()),
            Err(CurveError::Points(PointsError::IndexOutOfRange { index: 3, count: 3 }))
        );
    }

    #[rstest]
    fn bounding_box(c: Curve) {
        let b = c.bounding_box().unwrap();
        assert_eq!(b.min, Vec3::new(1., 2., 0.));
        assert_eq!(b.max, Vec3::new(5., 6., 0.));
        for p in c.sample(11).unwrap() {
            assert!(b.contains(&p));
        }
    }
}
