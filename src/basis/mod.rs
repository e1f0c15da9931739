//! Evaluates the basis spline functions using the Cox-de Boor-Mansfield recurrence relation
//!
//! `N_{i,0}(u) = 1` if `u_i <= u < u_{i+1}`, else `0`
//!
//! `N_{i,p}(u) = (u - u_i) / (u_{i+p} - u_i) N_{i,p-1}(u) + (u_{i+p+1} - u) / (u_{i+p+1} - u_{i+1}) N_{i+1,p-1}(u)`
//!
//! and their derivatives using
//!
//! `N'_{i,p}(u) = p (N_{i,p-1}(u) / (u_{i+p} - u_i) - N_{i+1,p-1}(u) / (u_{i+p+1} - u_{i+1}))`
//!
//! where quotients with a vanishing denominator are taken as zero.
//!
//! A [`Basis`] couples a degree with a clamped [knot vector][knots]. Evaluation is piecewise per
//! [knot span][knots::KnotSpan]. The expanded knot sequence and the span list are cached and
//! recomputed lazily after the basis has been modified.

use std::cell::OnceCell;

use thiserror::Error;

use crate::{
    basis::knots::{KnotError, KnotSpan, KnotVector},
    types::VecD,
};

pub mod knots;
pub mod parameters;

#[derive(Error, Debug, PartialEq)]
pub enum BasisError {
    #[error("Parameter `u = {u}` lies outside the interval `[{lower_bound}, {upper_bound}]`.")]
    ParameterOutOfDomain { u: f64, lower_bound: f64, upper_bound: f64 },

    #[error("Degree `p = {p}` is too low and must be greater than `{limit}`")]
    DegreeTooLow { p: usize, limit: usize },

    #[error("The degree override `q = {requested}` cannot exceed the basis degree `p = {degree}`.")]
    DegreeOverrideTooHigh { requested: usize, degree: usize },

    #[error("The knot vector is not clamped: the boundary knot `u = {u}` has multiplicity `{multiplicity}` instead of `{order}`.")]
    NotClamped { u: f64, multiplicity: usize, order: usize },

    #[error("The interior knot `u = {u}` has a multiplicity of `{multiplicity}` exceeding the degree `p = {degree}`.")]
    MultiplicityTooHigh { u: f64, multiplicity: usize, degree: usize },

    #[error("Invalid knot vector: {0}")]
    Knots(#[from] KnotError),
}

/// Basis function values of one knot span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanBasis {
    /// Values (or derivatives) of the basis functions `first..=last`.
    pub values: Vec<f64>,
    pub first: usize,
    pub last: usize,
}

impl SpanBasis {
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values.iter().enumerate().map(move |(j, &v)| (self.first + j, v))
    }
}

/// One row of a basis sample table, as consumed by charting collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisSample {
    pub u: f64,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone)]
struct BasisCache {
    expanded: Vec<f64>,
    spans: Vec<KnotSpan>,
}

#[derive(Debug, Clone)]
pub struct Basis {
    degree: usize,
    knots: KnotVector,
    cache: OnceCell<BasisCache>,
}

impl PartialEq for Basis {
    fn eq(&self, other: &Self) -> bool {
        self.degree == other.degree && self.knots == other.knots
    }
}

impl Basis {
    /// Creates a basis of degree `degree` over a clamped knot vector.
    ///
    /// # Examples
    /// ```
    /// use bspline_kernel::basis::{knots::KnotVector, Basis};
    ///
    /// let knots = KnotVector::from_expanded(&[0., 0., 0., 0.5, 1., 1., 1.]).unwrap();
    /// let basis = Basis::new(2, knots).unwrap();
    /// assert_eq!(basis.control_count(), 4);
    /// let spans = basis.evaluate(0.25, None, 0).unwrap();
    /// assert_eq!(spans.len(), 1);
    /// assert!((spans[0].values.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    /// ```
    pub fn new(degree: usize, knots: KnotVector) -> Result<Self, BasisError> {
        validate(degree, &knots)?;
        Ok(Basis { degree, knots, cache: OnceCell::new() })
    }

    /// Clamped basis on `[0, 1]` with uniformly spaced interior knots.
    pub fn uniform(degree: usize, control_count: usize) -> Result<Self, BasisError> {
        if degree == 0 {
            return Err(BasisError::DegreeTooLow { p: degree, limit: 0 });
        }
        Basis::new(degree, knots::methods::uniform(degree, control_count)?)
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn order(&self) -> usize {
        self.degree + 1
    }

    pub fn knots(&self) -> &KnotVector {
        &self.knots
    }

    pub fn set_knots(&mut self, knots: KnotVector) -> Result<(), BasisError> {
        validate(self.degree, &knots)?;
        self.knots = knots;
        self.cache.take();
        Ok(())
    }

    /// Mutable access to the knot vector; the caller must keep it clamped.
    pub(crate) fn knots_mut(&mut self) -> &mut KnotVector {
        self.cache.take();
        &mut self.knots
    }

    /// Whether the cached expanded sequence must be recomputed before the next evaluation.
    pub fn is_dirty(&self) -> bool {
        self.cache.get().is_none()
    }

    fn cache(&self) -> &BasisCache {
        self.cache.get_or_init(|| BasisCache { expanded: self.knots.expanded(), spans: self.knots.spans() })
    }

    pub fn expanded(&self) -> &[f64] {
        &self.cache().expanded
    }

    pub fn spans(&self) -> &[KnotSpan] {
        &self.cache().spans
    }

    /// Number of basis functions, i.e. of control points of a curve on this basis.
    pub fn control_count(&self) -> usize {
        self.knots.total_multiplicity() - self.order()
    }

    pub fn domain(&self) -> (f64, f64) {
        self.knots.domain()
    }

    pub fn contains(&self, u: f64) -> bool {
        let (a, b) = self.domain();
        a <= u && u <= b
    }

    /// Clamps `u` to the domain.
    pub fn clamp(&self, u: f64) -> f64 {
        let (a, b) = self.domain();
        u.clamp(a, b)
    }

    /// Rescales the knot values onto `domain`.
    pub fn reparameterize(&mut self, domain: (f64, f64)) -> Result<(), BasisError> {
        self.knots_mut().rescale(domain)?;
        Ok(())
    }

    pub fn reverse(&mut self) {
        self.knots_mut().reverse();
    }

    /// Spans containing `u`, left span first. Two spans are returned when `u` is an interior knot.
    pub fn containing_spans(&self, u: f64) -> Result<Vec<&KnotSpan>, BasisError> {
        if !self.contains(u) {
            let (lower_bound, upper_bound) = self.domain();
            return Err(BasisError::ParameterOutOfDomain { u, lower_bound, upper_bound });
        }
        let spans = self.spans();
        let s = spans.partition_point(|span| span.end.knot.value < u).min(spans.len() - 1);

        let mut containing = vec![&spans[s]];
        if u == spans[s].end.knot.value && s + 1 < spans.len() {
            containing.push(&spans[s + 1]);
        }
        Ok(containing)
    }

    /// Evaluates the `d`-th derivative of the non-vanishing basis functions at `u`.
    ///
    /// For `d == 0`, both adjacent spans are returned when `u` sits on an interior knot, so that
    /// callers can detect discontinuities. For `d > 0`, only the left-limit span is returned.
    ///
    /// ## Arguments
    ///
    /// - `u` the parameter within the domain
    /// - `degree` an optional degree override not exceeding the basis degree
    /// - `d` the derivative order
    pub fn evaluate(&self, u: f64, degree: Option<usize>, d: usize) -> Result<Vec<SpanBasis>, BasisError> {
        let mut spans = self.evaluate_all(u, degree, d)?;
        if d > 0 {
            spans.truncate(1);
        }
        Ok(spans)
    }

    /// Like [`Basis::evaluate`] but always returns every span containing `u`.
    pub fn evaluate_all(&self, u: f64, degree: Option<usize>, d: usize) -> Result<Vec<SpanBasis>, BasisError> {
        let q = degree.unwrap_or(self.degree);
        if q > self.degree {
            return Err(BasisError::DegreeOverrideTooHigh { requested: q, degree: self.degree });
        }
        let expanded = self.expanded();
        Ok(self
            .containing_spans(u)?
            .into_iter()
            .map(|span| {
                let i = span.index();
                SpanBasis { values: span_values(expanded, i, q, d, u), first: i - q, last: i }
            })
            .collect())
    }

    /// Dense row of all `d`-th derivative basis values at `u`, taken from the left span.
    pub fn row(&self, u: f64, d: usize) -> Result<VecD, BasisError> {
        let mut row = VecD::zeros(self.control_count());
        if let Some(span) = self.evaluate(u, None, d)?.first() {
            for (i, v) in span.iter() {
                row[i] = v;
            }
        }
        Ok(row)
    }

    /// Greville abscissae, the averages of `p` consecutive interior knot values per basis function.
    pub fn greville(&self) -> Vec<f64> {
        let p = self.degree;
        let expanded = self.expanded();
        let (a, b) = self.domain();
        let last = self.control_count() - 1;
        (0..=last)
            .map(|i| match i {
                0 => a,
                i if i == last => b,
                i => expanded[i + 1..=i + p].iter().sum::<f64>() / p as f64,
            })
            .collect()
    }

    /// Samples every basis function at `count` evenly spaced parameters.
    pub fn sample_table(&self, count: usize, d: usize) -> Result<Vec<BasisSample>, BasisError> {
        let (a, b) = self.domain();
        let divisions = count.max(2) - 1;
        (0..=divisions)
            .map(|k| {
                let u = (a + (b - a) * k as f64 / divisions as f64).min(b);
                Ok(BasisSample { u, values: self.row(u, d)?.iter().copied().collect() })
            })
            .collect()
    }
}

fn validate(degree: usize, knots: &KnotVector) -> Result<(), BasisError> {
    if degree == 0 {
        return Err(BasisError::DegreeTooLow { p: degree, limit: 0 });
    }
    let order = degree + 1;
    for boundary in [knots.first(), knots.last()] {
        if boundary.multiplicity != order {
            return Err(BasisError::NotClamped { u: boundary.value, multiplicity: boundary.multiplicity, order });
        }
    }
    if let Some(knot) = knots.interior().iter().find(|k| k.multiplicity > degree) {
        return Err(BasisError::MultiplicityTooHigh { u: knot.value, multiplicity: knot.multiplicity, degree });
    }
    Ok(())
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Evaluates the `d`-th derivative of the `q + 1` basis functions `N_{i-q,q}, ..., N_{i,q}` of span `i`.
///
/// The triangular scheme yields the degree `q - d` functions, which are then lifted to degree `q`
/// by `d` applications of the derivative recurrence.
fn span_values(knots: &[f64], i: usize, q: usize, d: usize, u: f64) -> Vec<f64> {
    if d > q {
        return vec![0.0; q + 1];
    }
    let base = q - d;

    let mut n = vec![0.0; base + 1];
    let mut left = vec![0.0; base + 1];
    let mut right = vec![0.0; base + 1];
    n[0] = 1.0;
    for j in 1..=base {
        left[j] = u - knots[i + 1 - j];
        right[j] = knots[i + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            let temp = ratio(n[r], right[r + 1] + left[j - r]);
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n[j] = saved;
    }

    for k in base + 1..=q {
        // `n` holds the functions `i-(k-1)..=i` of degree `k-1`
        let lifted = (0..=k)
            .map(|r| {
                let j = i + r - k;
                let a = if r >= 1 { ratio(n[r - 1], knots[j + k] - knots[j]) } else { 0.0 };
                let b = if r < k { ratio(n[r], knots[j + k + 1] - knots[j + 1]) } else { 0.0 };
                k as f64 * (a - b)
            })
            .collect();
        n = lifted;
    }
    n
}
