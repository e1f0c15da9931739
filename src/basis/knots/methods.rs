//! Knot vector generation methods.
//!
//! - Uniformly spaced interior knots
//! - Averaging of parameters, see eq. (9.8) in `Piegl1997`
//! - Densification by bisection of the longest span

use crate::basis::knots::{Knot, KnotError, KnotVector};

/// Clamped knot vector on `[0, 1]` with equally spaced interior knots for `control_count` control points.
pub fn uniform(degree: usize, control_count: usize) -> Result<KnotVector, KnotError> {
    if control_count < degree + 1 {
        return Err(KnotError::InsufficientParameters { count: control_count, required: degree + 1, degree });
    }
    let interior = control_count - degree - 1;
    let mut knots = Vec::with_capacity(interior + 2);
    knots.push(Knot::new(0.0, degree + 1));
    for i in 1..=interior {
        knots.push(Knot::new(i as f64 / (interior + 1) as f64, 1));
    }
    knots.push(Knot::new(1.0, degree + 1));
    KnotVector::new(knots)
}

/// Clamped knot vector whose interior knots are the sliding average of `degree` consecutive parameters.
///
/// The domain is `[params[0], params[m]]`, and the resulting basis has one basis function per parameter.
pub fn averaging(degree: usize, params: &[f64]) -> Result<KnotVector, KnotError> {
    let count = params.len();
    if count < degree + 1 || degree == 0 {
        return Err(KnotError::InsufficientParameters { count, required: degree + 1, degree });
    }
    let m = count - 1;
    let (a, b) = (params[0], params[m]);
    if a.partial_cmp(&b) != Some(std::cmp::Ordering::Less) {
        return Err(KnotError::EmptyDomain { lower_bound: a, upper_bound: b });
    }

    let mut expanded = Vec::with_capacity(count + degree + 1);
    expanded.extend(std::iter::repeat(a).take(degree + 1));
    for j in 1..=m - degree {
        let sum: f64 = params[j..j + degree].iter().sum();
        expanded.push(sum / degree as f64);
    }
    expanded.extend(std::iter::repeat(b).take(degree + 1));

    KnotVector::from_expanded(&expanded)
}

/// Bisects the longest knot span `count` times, inserting a knot of multiplicity one each time.
pub fn fill(knots: &KnotVector, count: usize) -> KnotVector {
    let mut filled = knots.clone();
    for _ in 0..count {
        let longest = filled
            .spans()
            .into_iter()
            .rev() // ties go to the leftmost span
            .max_by(|a, b| a.length().total_cmp(&b.length()))
            .map(|span| (span.start.knot.value + span.end.knot.value) / 2.0);
        if let Some(mid) = longest {
            filled.add(mid, 1);
        }
    }
    filled
}
