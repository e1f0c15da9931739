//! Point inversion and projection onto curves and surfaces.
//!
//! All projections start from the nearest of a set of [sampled candidates][Candidates] and refine
//! it by Newton iterations on the orthogonality conditions, see section 6.1 in `Piegl1997`:
//!
//! - curve: `f(u) = C'(u) · (C(u) - P) = 0`
//! - surface: `f(u, v) = S_u · r = 0`, `g(u, v) = S_v · r = 0` with `r = S(u, v) - P`
//! - curve pair: `A'(s) · r = 0`, `B'(t) · r = 0` with `r = A(s) - B(t)`
//!
//! Every update is clamped to the knot span containing the current iterate, or to the two spans
//! adjoining it when the iterate sits on an interior knot. An iteration stops when the point lies on the
//! entity with a vanishing cosine between the derivatives and the offset, or when the spatial
//! step drops below the point tolerance. Running out of iterations is not an error: the last
//! iterate is returned with `converged = false`.

use log::{debug, trace, warn};
use nalgebra::{Matrix2, Vector2};
use thiserror::Error;

use crate::{
    basis::{Basis, BasisError},
    curve::{Curve, CurveError},
    surface::{Surface, SurfaceError},
    types::Vec3,
};

pub use self::candidates::Candidates;

mod candidates;

#[derive(Error, Debug, PartialEq)]
pub enum ProjectionError {
    #[error("The sampling phase `{phase}` lies outside `[0, 1]`.")]
    InvalidPhase { phase: f64 },

    #[error("Basis error: {0}")]
    Basis(#[from] BasisError),

    #[error("Curve error: {0}")]
    Curve(#[from] CurveError),

    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjectionOptions {
    /// Point coincidence and spatial step tolerance `e1`.
    pub point_tolerance: f64,
    /// Zero cosine tolerance `e2`.
    pub cosine_tolerance: f64,
    pub max_iterations: usize,
    /// Average number of starting candidates per knot span.
    pub samples_per_span: usize,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        ProjectionOptions { point_tolerance: 1e-9, cosine_tolerance: 1e-9, max_iterations: 100, samples_per_span: 8 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveProjection {
    pub parameter: f64,
    pub point: Vec3,
    pub distance: f64,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceProjection {
    pub parameter: (f64, f64),
    pub point: Vec3,
    pub distance: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Closest pair of points between two curves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveCurveProjection {
    pub parameters: (f64, f64),
    pub points: (Vec3, Vec3),
    pub distance: f64,
    pub iterations: usize,
    pub converged: bool,
}

fn cosine(a: &Vec3, b: &Vec3) -> f64 {
    let norms = a.norm() * b.norm();
    if norms == 0.0 {
        0.0
    } else {
        a.dot(b).abs() / norms
    }
}

/// Applies the update `delta` to `t`, clamped to the knot span containing `t`.
///
/// On an interior knot the left and right spans are joined, so that the iterate can move either way.
fn clamp_to_span(basis: &Basis, t: f64, delta: f64) -> Result<f64, BasisError> {
    let spans = basis.containing_spans(t)?;
    let lower = spans.first().map_or(t, |span| span.start.knot.value);
    let upper = spans.last().map_or(t, |span| span.end.knot.value);
    Ok((t + delta).clamp(lower, upper))
}

/// Solves the `2 x 2` system `j x = rhs` by Cramer's rule.
fn cramer(j: &Matrix2<f64>, rhs: &Vector2<f64>) -> Option<Vector2<f64>> {
    let det = j.determinant();
    if det.abs() <= f64::EPSILON * j.norm_squared() {
        return None;
    }
    Some(Vector2::new(
        (rhs.x * j[(1, 1)] - j[(0, 1)] * rhs.y) / det,
        (j[(0, 0)] * rhs.y - rhs.x * j[(1, 0)]) / det,
    ))
}

/// Position and derivatives of a curve at `u`.
///
/// On an interior knot, the one-sided derivatives best aligned with the offset `position - target` are used.
struct CurveState {
    position: Vec3,
    first: Vec3,
    second: Vec3,
}

impl CurveState {
    fn at(curve: &Curve, u: f64, target: &Vec3) -> Result<Self, CurveError> {
        let position = curve.point(u, 0)?;
        let r = position - target;
        let firsts = curve.derivative_candidates(u, 1)?;
        let seconds = curve.derivative_candidates(u, 2)?;

        let index = (0..firsts.len())
            .max_by(|&a, &b| cosine(&firsts[a], &r).total_cmp(&cosine(&firsts[b], &r)))
            .unwrap_or(0);
        Ok(CurveState {
            position,
            first: firsts.get(index).copied().unwrap_or_else(Vec3::zeros),
            second: seconds.get(index).copied().unwrap_or_else(Vec3::zeros),
        })
    }
}

/// Finds the parameter of the point on `curve` closest to `point`.
///
/// # Examples
/// ```
/// use bspline_kernel::{curve::Curve, projection::{invert_curve, ProjectionOptions}, types::Vec3};
///
/// let c = Curve::from_points(2, &[Vec3::new(0., 0., 0.), Vec3::new(1., 2., 0.), Vec3::new(2., 0., 0.)]).unwrap();
/// let p = c.point(0.37, 0).unwrap();
/// let projection = invert_curve(&c, &p, &ProjectionOptions::default()).unwrap();
/// assert!(projection.converged);
/// assert!((projection.parameter - 0.37).abs() < 1e-6);
/// ```
pub fn invert_curve(curve: &Curve, point: &Vec3, options: &ProjectionOptions) -> Result<CurveProjection, ProjectionError> {
    let candidates = Candidates::curve(curve, options.samples_per_span)?;
    invert_curve_from(curve, &candidates, point, options)
}

/// Inverts `point` on `curve`, starting from precomputed candidates.
pub fn invert_curve_from(
    curve: &Curve,
    candidates: &Candidates<f64>,
    point: &Vec3,
    options: &ProjectionOptions,
) -> Result<CurveProjection, ProjectionError> {
    let mut u = candidates.nearest(point).unwrap_or(curve.domain().0);
    let mut converged = false;
    let mut iterations = 0;

    while iterations < options.max_iterations {
        let state = CurveState::at(curve, u, point)?;
        let r = state.position - point;
        if r.norm() < options.point_tolerance && cosine(&state.first, &r) < options.cosine_tolerance {
            converged = true;
            break;
        }

        iterations += 1;
        let denominator = state.second.dot(&r) + state.first.norm_squared();
        if denominator == 0.0 {
            break;
        }
        let next = clamp_to_span(curve.basis(), u, -state.first.dot(&r) / denominator)?;
        let step = ((next - u) * state.first).norm();
        trace!("curve inversion #{iterations}: u = {next}, |r| = {}, step = {step}", r.norm());
        u = next;

        if step < options.point_tolerance {
            converged = true;
            break;
        }
    }

    let position = curve.point(u, 0)?;
    if !converged {
        warn!("curve inversion did not converge after {iterations} iterations, stopping at u = {u}");
    }
    Ok(CurveProjection { parameter: u, point: position, distance: (position - point).norm(), iterations, converged })
}

/// Finds the parameters of the closest points between two curves.
pub fn nearest_curve_parameters(
    a: &Curve,
    b: &Curve,
    options: &ProjectionOptions,
) -> Result<CurveCurveProjection, ProjectionError> {
    let (a_domain, b_domain) = (a.domain(), b.domain());
    let a_candidates = Candidates::curve(a, options.samples_per_span)?;
    let b_candidates = Candidates::curve(b, options.samples_per_span)?;

    let (mut s, mut t) = (a_domain.0, b_domain.0);
    let mut best = f64::INFINITY;
    for (sa, pa) in a_candidates.iter() {
        for (tb, pb) in b_candidates.iter() {
            let d = (pa - pb).norm_squared();
            if d < best {
                (best, s, t) = (d, *sa, *tb);
            }
        }
    }

    let mut converged = false;
    let mut iterations = 0;
    while iterations < options.max_iterations {
        let pb = b.point(t, 0)?;
        let sa = CurveState::at(a, s, &pb)?;
        let sb = CurveState::at(b, t, &sa.position)?;
        let r = sa.position - sb.position;

        if r.norm() < options.point_tolerance
            && cosine(&sa.first, &r) < options.cosine_tolerance
            && cosine(&sb.first, &r) < options.cosine_tolerance
        {
            converged = true;
            break;
        }

        iterations += 1;
        let j = Matrix2::new(
            sa.second.dot(&r) + sa.first.norm_squared(),
            -sa.first.dot(&sb.first),
            sb.first.dot(&sa.first),
            sb.second.dot(&r) - sb.first.norm_squared(),
        );
        let rhs = Vector2::new(-sa.first.dot(&r), -sb.first.dot(&r));
        let Some(delta) = cramer(&j, &rhs) else {
            break;
        };

        let (next_s, next_t) = (clamp_to_span(a.basis(), s, delta.x)?, clamp_to_span(b.basis(), t, delta.y)?);
        let step = ((next_s - s) * sa.first).norm() + ((next_t - t) * sb.first).norm();
        trace!("curve pair #{iterations}: (s, t) = ({next_s}, {next_t}), |r| = {}, step = {step}", r.norm());
        (s, t) = (next_s, next_t);

        if step < options.point_tolerance {
            converged = true;
            break;
        }
    }

    let points = (a.point(s, 0)?, b.point(t, 0)?);
    if !converged {
        warn!("closest points between curves did not converge after {iterations} iterations");
    }
    Ok(CurveCurveProjection {
        parameters: (s, t),
        points,
        distance: (points.0 - points.1).norm(),
        iterations,
        converged,
    })
}

/// Finds the parameters of the point on `surface` closest to `point`.
pub fn invert_surface(
    surface: &Surface,
    point: &Vec3,
    options: &ProjectionOptions,
) -> Result<SurfaceProjection, ProjectionError> {
    let candidates = Candidates::surface(surface, options.samples_per_span)?;
    invert_surface_from(surface, &candidates, point, options)
}

/// Inverts `point` on `surface`, starting from precomputed candidates.
pub fn invert_surface_from(
    surface: &Surface,
    candidates: &Candidates<(f64, f64)>,
    point: &Vec3,
    options: &ProjectionOptions,
) -> Result<SurfaceProjection, ProjectionError> {
    let (u_domain, v_domain) = (surface.u_basis().domain(), surface.v_basis().domain());
    let (mut u, mut v) = candidates.nearest(point).unwrap_or((u_domain.0, v_domain.0));
    let mut converged = false;
    let mut iterations = 0;

    while iterations < options.max_iterations {
        let [s, su, sv, suu, suv, svv] = surface.derivatives(u, v)?;
        let r = s - point;
        if r.norm() < options.point_tolerance
            && cosine(&su, &r) < options.cosine_tolerance
            && cosine(&sv, &r) < options.cosine_tolerance
        {
            converged = true;
            break;
        }

        iterations += 1;
        let mixed = su.dot(&sv) + r.dot(&suv);
        let j = Matrix2::new(su.norm_squared() + r.dot(&suu), mixed, mixed, sv.norm_squared() + r.dot(&svv));
        let rhs = Vector2::new(-su.dot(&r), -sv.dot(&r));
        let Some(delta) = cramer(&j, &rhs) else {
            break;
        };

        let next_u = clamp_to_span(surface.u_basis(), u, delta.x)?;
        let next_v = clamp_to_span(surface.v_basis(), v, delta.y)?;
        let step = ((next_u - u) * su + (next_v - v) * sv).norm();
        trace!("surface inversion #{iterations}: (u, v) = ({next_u}, {next_v}), |r| = {}, step = {step}", r.norm());
        (u, v) = (next_u, next_v);

        if step < options.point_tolerance {
            converged = true;
            break;
        }
    }

    let position = surface.point(u, v)?;
    if !converged {
        warn!("surface inversion did not converge after {iterations} iterations, stopping at ({u}, {v})");
    }
    Ok(SurfaceProjection {
        parameter: (u, v),
        point: position,
        distance: (position - point).norm(),
        iterations,
        converged,
    })
}

/// Projects `count` samples of `curve` onto `surface`.
///
/// The samples lie at `t_k = a + (k + phase) (b - a) / count` for `k = 0..count`, so a phase of
/// `0` starts at the beginning of the domain and `0.5` samples the midpoints of `count` equal cells.
/// One candidate set is shared by all samples.
pub fn project_curve_onto_surface(
    curve: &Curve,
    surface: &Surface,
    count: usize,
    phase: f64,
    options: &ProjectionOptions,
) -> Result<Vec<SurfaceProjection>, ProjectionError> {
    if !(0.0..=1.0).contains(&phase) {
        return Err(ProjectionError::InvalidPhase { phase });
    }
    let candidates = Candidates::surface(surface, options.samples_per_span)?;
    let (a, b) = curve.domain();

    let projections = (0..count)
        .map(|k| {
            let t = (a + (k as f64 + phase) * (b - a) / count as f64).min(b);
            invert_surface_from(surface, &candidates, &curve.point(t, 0)?, options)
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        "projected {count} curve samples onto the surface, {} converged",
        projections.iter().filter(|p| p.converged).count()
    );
    Ok(projections)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rstest::{fixture, rstest};

    use crate::surface::Direction;

    use super::*;

    #[fixture]
    fn arc() -> Curve {
        Curve::from_points(3, &[Vec3::new(0., 0., 0.), Vec3::new(1., 2., 0.), Vec3::new(3., 2., 1.), Vec3::new(4., 0., 0.)])
            .unwrap()
    }

    #[fixture]
    /// Biquadratic patch `z = x y` over `[0, 2] x [0, 2]`.
    fn patch() -> Surface {
        let rows: Vec<Vec<Vec3>> = (0..3)
            .map(|j| (0..3).map(|i| Vec3::new(i as f64, j as f64, (i * j) as f64)).collect())
            .collect();
        Surface::from_points(2, 2, &rows).unwrap()
    }

    #[rstest(u0, case(0.0), case(0.37), case(0.5), case(1.0))]
    fn curve_round_trip(arc: Curve, u0: f64) {
        let p = arc.point(u0, 0).unwrap();
        let projection = invert_curve(&arc, &p, &ProjectionOptions::default()).unwrap();
        assert!(projection.converged);
        assert_relative_eq!(projection.parameter, u0, epsilon = 1e-4);
        assert!(projection.distance < 1e-8);
    }

    #[rstest]
    fn curve_offset_point(arc: Curve) {
        let u0 = 0.37;
        let tangent = arc.point(u0, 1).unwrap();
        let normal = Vec3::new(-tangent.y, tangent.x, 0.).normalize();
        let p = arc.point(u0, 0).unwrap() + 0.1 * normal;

        let projection = invert_curve(&arc, &p, &ProjectionOptions::default()).unwrap();
        assert!(projection.converged);
        assert_relative_eq!(projection.parameter, u0, epsilon = 1e-3);
        assert_relative_eq!(projection.distance, 0.1, epsilon = 1e-3);
    }

    #[rstest]
    fn clamped_to_domain(arc: Curve) {
        let projection = invert_curve(&arc, &Vec3::new(-5., -1., 0.), &ProjectionOptions::default()).unwrap();
        assert_eq!(projection.parameter, 0.0);
    }

    /// Cubic with linear parameterization `C(u) = (u, 0, 0)` over six uniform spans.
    fn uniform_line() -> Curve {
        let basis = Basis::uniform(3, 9).unwrap();
        let points: Vec<Vec3> = basis.greville().iter().map(|&g| Vec3::new(g, 0., 0.)).collect();
        Curve::from_points(3, &points).unwrap()
    }

    #[test]
    fn steps_stay_within_the_current_span() {
        let line = uniform_line();
        let start = Candidates { entries: vec![(0.2, line.point(0.2, 0).unwrap())] };
        let target = Vec3::new(0.75, 0., 0.);

        let options = ProjectionOptions { max_iterations: 1, ..Default::default() };
        let first = invert_curve_from(&line, &start, &target, &options).unwrap();
        assert!(!first.converged);
        assert_relative_eq!(first.parameter, 1.0 / 3.0, epsilon = 1e-12);

        let projection = invert_curve_from(&line, &start, &target, &ProjectionOptions::default()).unwrap();
        assert!(projection.converged);
        assert!(projection.iterations >= 4);
        assert_relative_eq!(projection.parameter, 0.75, epsilon = 1e-9);
    }

    #[rstest]
    fn iteration_cap(arc: Curve) {
        let options = ProjectionOptions { max_iterations: 0, ..Default::default() };
        let projection = invert_curve(&arc, &Vec3::new(2.0, 1.0, 0.3), &options).unwrap();
        assert!(!projection.converged);
        assert_eq!(projection.iterations, 0);
    }

    #[rstest]
    fn curve_on_interior_knot(mut arc: Curve) {
        arc.insert(0.5).unwrap();
        arc.insert(0.5).unwrap();
        let p = arc.point(0.5, 0).unwrap();
        let projection = invert_curve(&arc, &p, &ProjectionOptions::default()).unwrap();
        assert_relative_eq!(projection.parameter, 0.5, epsilon = 1e-6);
    }

    #[rstest(u, v, case(0.3, 0.6), case(0.9, 0.1), case(0.5, 0.5))]
    fn surface_round_trip(patch: Surface, u: f64, v: f64) {
        let p = patch.point(u, v).unwrap();
        let projection = invert_surface(&patch, &p, &ProjectionOptions::default()).unwrap();
        assert!(projection.converged);
        assert_relative_eq!(projection.parameter.0, u, epsilon = 1e-6);
        assert_relative_eq!(projection.parameter.1, v, epsilon = 1e-6);
    }

    #[test]
    fn crossing_lines() {
        let a = Curve::from_points(1, &[Vec3::new(-1., 0., 0.), Vec3::new(1., 0., 0.)]).unwrap();
        let b = Curve::from_points(1, &[Vec3::new(0.5, -1., 1.), Vec3::new(0.5, 1., 1.)]).unwrap();
        let projection = nearest_curve_parameters(&a, &b, &ProjectionOptions::default()).unwrap();
        assert!(projection.converged);
        assert_relative_eq!(projection.parameters.0, 0.75, epsilon = 1e-9);
        assert_relative_eq!(projection.parameters.1, 0.5, epsilon = 1e-9);
        assert_relative_eq!(projection.distance, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn skew_lines() {
        let a = Curve::from_points(1, &[Vec3::new(-1., 0., 0.), Vec3::new(1., 0., 0.)]).unwrap();
        let b = Curve::from_points(1, &[Vec3::new(-1., -1., 1.), Vec3::new(2., 2., 1.)]).unwrap();
        let projection = nearest_curve_parameters(&a, &b, &ProjectionOptions::default()).unwrap();
        assert!(projection.converged);
        assert!(projection.iterations >= 1);
        assert_relative_eq!(projection.parameters.0, 0.5, epsilon = 1e-9);
        assert_relative_eq!(projection.parameters.1, 1.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(projection.points.1, Vec3::new(0., 0., 1.), epsilon = 1e-9);
        assert_relative_eq!(projection.distance, 1.0, epsilon = 1e-9);
    }

    #[rstest]
    fn curve_on_surface(patch: Surface) {
        let iso = patch.isocurve(Direction::V, 0.4).unwrap();
        let projections = project_curve_onto_surface(&iso, &patch, 5, 0.5, &ProjectionOptions::default()).unwrap();
        assert_eq!(projections.len(), 5);
        for (k, projection) in projections.iter().enumerate() {
            assert!(projection.converged);
            assert_relative_eq!(projection.parameter.0, (k as f64 + 0.5) / 5.0, epsilon = 1e-6);
            assert_relative_eq!(projection.parameter.1, 0.4, epsilon = 1e-6);
        }
    }

    #[rstest]
    fn invalid_phase(patch: Surface, arc: Curve) {
        assert_eq!(
            project_curve_onto_surface(&arc, &patch, 3, 1.5, &ProjectionOptions::default()),
            Err(ProjectionError::InvalidPhase { phase: 1.5 })
        );
    }
}
