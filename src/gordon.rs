//! Gordon surfaces through a network of curves.
//!
//! A network consists of `u` curves, running along `u` at the parameters `v_params`, and `v`
//! curves, running along `v` at the parameters `u_params`. Curve `i` of the first family meets
//! curve `j` of the second family at `(u_params[j], v_params[i])`. The Gordon surface is the
//! Boolean sum
//!
//! ```text
//! S = L_u + L_v - T
//! ```
//!
//! of the loft `L_u` of the `u` curves across `v`, the loft `L_v` of the `v` curves across `u`
//! and the tensor-product interpolation `T` of the intersection points. After the three surfaces
//! are refined onto common knot vectors, the sum is taken control point by control point, see
//! section 10.5 in `Piegl1997`.
//!
//! The degree along `u` is the degree of the `u` curves, the degree along `v` the one of the `v`
//! curves. Both lofts and the interpolation use these degrees, so each family needs at least
//! `degree + 1` curves of the other family.

use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

use crate::{
    curve::{points::Points, Curve, CurveError},
    diagnostics::Stopwatch,
    fitting::interpolation::{interpolate, loft, InterpolationError},
    linalg::NumericContext,
    manipulation::compatible::{make_curves_compatible, make_surfaces_compatible, CompatibilityError},
    surface::{Direction, Surface},
    types::{Vec3, KNOT_TOLERANCE},
};

#[derive(Error, Debug, PartialEq)]
pub enum GordonError {
    #[error("`{curves}` curves along {direction:?} were given with `{params}` parameters.")]
    ParameterCountMismatch { direction: Direction, curves: usize, params: usize },

    #[error("Degree `{degree}` needs at least `{required}` curves along {direction:?}, got `{count}`.")]
    TooFewCurves { direction: Direction, count: usize, required: usize, degree: usize },

    #[error("The parameters span `{params:?}`, but the curves along {direction:?} are defined on `{domain:?}`.")]
    DomainMismatch { direction: Direction, params: (f64, f64), domain: (f64, f64) },

    #[error("The curves miss each other by up to `{mismatch}`, which exceeds the tolerance `{tolerance}`.")]
    NetworkMismatch { mismatch: f64, tolerance: f64 },

    #[error("The refined control nets have the shapes `{shapes:?}`.")]
    InconsistentNet { shapes: [(usize, usize); 3] },

    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    #[error("The surfaces cannot be made compatible: {0}")]
    Compatibility(#[from] CompatibilityError),

    #[error("Curve error: {0}")]
    Curve(#[from] CurveError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GordonOptions {
    /// Largest distance between the two curves through an intersection that is accepted silently.
    pub intersection_tolerance: f64,
    /// Fail with [`GordonError::NetworkMismatch`] instead of warning when the tolerance is exceeded.
    pub strict: bool,
}

impl Default for GordonOptions {
    fn default() -> Self {
        GordonOptions { intersection_tolerance: 1e-4, strict: false }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GordonReport {
    /// Largest distance between the two curves through one intersection.
    pub max_mismatch: f64,
    pub duration: Duration,
    pub solve_requests: usize,
}

/// Builder for a Gordon surface.
///
/// The curves of each family are made compatible first. Parameters refer to the domain of the
/// first curve of the other family and must span it.
#[derive(Debug, Clone)]
pub struct GordonSurface {
    u_curves: Vec<Curve>,
    v_params: Vec<f64>,
    v_curves: Vec<Curve>,
    u_params: Vec<f64>,
    options: GordonOptions,
}

fn check_family(
    direction: Direction,
    curves: &[Curve],
    params: &[f64],
    transversal_degree: usize,
) -> Result<(), GordonError> {
    if curves.len() != params.len() {
        return Err(GordonError::ParameterCountMismatch { direction, curves: curves.len(), params: params.len() });
    }
    if curves.len() <= transversal_degree {
        return Err(GordonError::TooFewCurves {
            direction,
            count: curves.len(),
            required: transversal_degree + 1,
            degree: transversal_degree,
        });
    }
    Ok(())
}

fn check_span(direction: Direction, params: &[f64], domain: (f64, f64)) -> Result<(), GordonError> {
    let span = (params[0], params[params.len() - 1]);
    if (span.0 - domain.0).abs() > KNOT_TOLERANCE || (span.1 - domain.1).abs() > KNOT_TOLERANCE {
        return Err(GordonError::DomainMismatch { direction, params: span, domain });
    }
    Ok(())
}

impl GordonSurface {
    pub fn new(u_curves: &[Curve], v_params: &[f64], v_curves: &[Curve], u_params: &[f64]) -> Self {
        GordonSurface {
            u_curves: u_curves.to_vec(),
            v_params: v_params.to_vec(),
            v_curves: v_curves.to_vec(),
            u_params: u_params.to_vec(),
            options: GordonOptions::default(),
        }
    }

    pub fn options(mut self, options: GordonOptions) -> Self {
        self.options = options;
        self
    }

    /// Averaged intersection points, one row per `u` curve, and the largest mismatch.
    fn intersections(&self, u_curves: &[Curve], v_curves: &[Curve]) -> Result<(Vec<Vec<Vec3>>, f64), GordonError> {
        let mut max_mismatch = 0.0f64;
        let mut grid = Vec::with_capacity(u_curves.len());
        for (u_curve, &v) in u_curves.iter().zip(&self.v_params) {
            let mut row = Vec::with_capacity(v_curves.len());
            for (v_curve, &u) in v_curves.iter().zip(&self.u_params) {
                let (a, b) = (u_curve.point(u, 0)?, v_curve.point(v, 0)?);
                max_mismatch = max_mismatch.max((a - b).norm());
                row.push((a + b) / 2.0);
            }
            grid.push(row);
        }
        Ok((grid, max_mismatch))
    }

    pub fn build(&self, ctx: &mut NumericContext) -> Result<(Surface, GordonReport), GordonError> {
        let watch = Stopwatch::start(ctx);

        let (mut u_curves, mut v_curves) = (self.u_curves.clone(), self.v_curves.clone());
        if u_curves.is_empty() || v_curves.is_empty() {
            let (direction, curves) =
                if u_curves.is_empty() { (Direction::U, &u_curves) } else { (Direction::V, &v_curves) };
            return Err(GordonError::TooFewCurves { direction, count: curves.len(), required: 2, degree: 1 });
        }
        make_curves_compatible(&mut u_curves)?;
        make_curves_compatible(&mut v_curves)?;
        let (p_u, p_v) = (u_curves[0].degree(), v_curves[0].degree());

        check_family(Direction::U, &u_curves, &self.v_params, p_v)?;
        check_family(Direction::V, &v_curves, &self.u_params, p_u)?;
        check_span(Direction::U, &self.u_params, u_curves[0].domain())?;
        check_span(Direction::V, &self.v_params, v_curves[0].domain())?;

        let (grid, max_mismatch) = self.intersections(&u_curves, &v_curves)?;
        let tolerance = self.options.intersection_tolerance;
        if max_mismatch > tolerance {
            if self.options.strict {
                return Err(GordonError::NetworkMismatch { mismatch: max_mismatch, tolerance });
            }
            warn!("network curves miss each other by up to {max_mismatch}, averaging the intersections");
        }

        let across_v = loft(ctx, &u_curves, Some(self.v_params.as_slice()), p_v, Direction::V)?;
        let across_u = loft(ctx, &v_curves, Some(self.u_params.as_slice()), p_u, Direction::U)?;
        let rows = grid
            .iter()
            .map(|row| interpolate(ctx, row, Some(self.u_params.as_slice()), p_u))
            .collect::<Result<Vec<_>, _>>()?;
        let tensor = loft(ctx, &rows, Some(self.v_params.as_slice()), p_v, Direction::V)?;

        let mut surfaces = [across_v, across_u, tensor];
        make_surfaces_compatible(&mut surfaces)?;
        let shapes = surfaces.each_ref().map(|s| (s.net().rows(), s.net().cols()));
        if shapes.iter().any(|&shape| shape != shapes[0]) {
            return Err(GordonError::InconsistentNet { shapes });
        }

        let [across_v, across_u, tensor] = &surfaces;
        let sum = across_v.net().matrix() + across_u.net().matrix() - tensor.net().matrix();
        let surface = across_v.with_net(sum);

        debug!(
            "built a Gordon surface from {} x {} curves with a {} x {} net",
            u_curves.len(),
            v_curves.len(),
            shapes[0].0,
            shapes[0].1
        );
        let report = GordonReport { max_mismatch, duration: watch.elapsed(), solve_requests: watch.requests(ctx) };
        Ok((surface, report))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rstest::{fixture, rstest};

    use crate::basis::Basis;

    use super::*;

    #[fixture]
    /// A curved biquadratic patch over `[0, 1] x [0, 1]`.
    fn patch() -> Surface {
        let rows: Vec<Vec<Vec3>> = (0..3)
            .map(|j| {
                (0..3)
                    .map(|i| Vec3::new(i as f64, j as f64, if i == 1 && j == 1 { 2.0 } else { (i + j) as f64 * 0.25 }))
                    .collect()
            })
            .collect();
        Surface::from_points(2, 2, &rows).unwrap()
    }

    const U_PARAMS: [f64; 3] = [0.0, 0.5, 1.0];
    const V_PARAMS: [f64; 4] = [0.0, 0.3, 0.7, 1.0];

    fn network(s: &Surface) -> (Vec<Curve>, Vec<Curve>) {
        let u_curves = V_PARAMS.iter().map(|&v| s.isocurve(Direction::V, v).unwrap()).collect();
        let v_curves = U_PARAMS.iter().map(|&u| s.isocurve(Direction::U, u).unwrap()).collect();
        (u_curves, v_curves)
    }

    #[rstest]
    fn reproduces_patch(patch: Surface) {
        let (u_curves, v_curves) = network(&patch);
        let mut ctx = NumericContext::default();
        let (gordon, report) = GordonSurface::new(&u_curves, &V_PARAMS, &v_curves, &U_PARAMS).build(&mut ctx).unwrap();

        assert!(report.max_mismatch < 1e-12);
        assert_eq!(report.solve_requests, 3 + u_curves.len());
        assert_eq!(gordon.degree(Direction::U), 2);
        assert_eq!(gordon.degree(Direction::V), 2);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let (u, v) = (rng.random_range(0.0..=1.0), rng.random_range(0.0..=1.0));
            assert_relative_eq!(gordon.point(u, v).unwrap(), patch.point(u, v).unwrap(), epsilon = 1e-9);
        }
    }

    #[rstest]
    fn interpolates_network_curves(patch: Surface) {
        let (u_curves, mut v_curves) = network(&patch);
        // a bulge in the middle v curve that the tensor product of the net does not contain
        let bump = Vec3::new(0.0, 0.0, 0.5);
        let mut c = v_curves[1].clone();
        let middle = c.points().get(1) + bump;
        c.set_control_point(1, &middle).unwrap();
        v_curves[1] = c.clone();

        // the u curves have to pass through the moved curve as well
        let u_curves: Vec<Curve> = u_curves
            .iter()
            .zip(V_PARAMS)
            .map(|(curve, v)| {
                let shift = c.point(v, 0).unwrap() - curve.point(0.5, 0).unwrap();
                let mut curve = curve.clone();
                let moved = curve.points().get(1) + 2.0 * shift;
                curve.set_control_point(1, &moved).unwrap();
                curve
            })
            .collect();

        let mut ctx = NumericContext::default();
        let (gordon, report) = GordonSurface::new(&u_curves, &V_PARAMS, &v_curves, &U_PARAMS).build(&mut ctx).unwrap();
        assert!(report.max_mismatch < 1e-12);

        for t in [0.0, 0.2, 0.5, 0.9, 1.0] {
            for (curve, &v) in u_curves.iter().zip(&V_PARAMS) {
                assert_relative_eq!(gordon.point(t, v).unwrap(), curve.point(t, 0).unwrap(), epsilon = 1e-9);
            }
            for (curve, &u) in v_curves.iter().zip(&U_PARAMS) {
                assert_relative_eq!(gordon.point(u, t).unwrap(), curve.point(t, 0).unwrap(), epsilon = 1e-9);
            }
        }
    }

    #[rstest]
    fn mismatch_is_reported(patch: Surface) {
        let (u_curves, mut v_curves) = network(&patch);
        let mut c = v_curves[2].clone();
        let moved = c.points().get(1) + Vec3::new(0.0, 0.0, 0.01);
        c.set_control_point(1, &moved).unwrap();
        v_curves[2] = c;

        let mut ctx = NumericContext::default();
        let builder = GordonSurface::new(&u_curves, &V_PARAMS, &v_curves, &U_PARAMS);
        let (_, report) = builder.build(&mut ctx).unwrap();
        assert!(report.max_mismatch > 1e-3);

        let strict = builder.options(GordonOptions { strict: true, ..GordonOptions::default() });
        assert!(matches!(strict.build(&mut ctx), Err(GordonError::NetworkMismatch { .. })));
    }

    #[rstest]
    fn invalid_networks(patch: Surface) {
        let (u_curves, v_curves) = network(&patch);
        let mut ctx = NumericContext::default();

        assert_eq!(
            GordonSurface::new(&u_curves, &V_PARAMS[..3], &v_curves, &U_PARAMS).build(&mut ctx).unwrap_err(),
            GordonError::ParameterCountMismatch { direction: Direction::U, curves: 4, params: 3 }
        );
        assert_eq!(
            GordonSurface::new(&u_curves, &V_PARAMS, &v_curves[..2], &[0.0, 1.0]).build(&mut ctx).unwrap_err(),
            GordonError::TooFewCurves { direction: Direction::V, count: 2, required: 3, degree: 2 }
        );
        assert_eq!(
            GordonSurface::new(&u_curves, &V_PARAMS, &v_curves, &[0.1, 0.5, 1.0]).build(&mut ctx).unwrap_err(),
            GordonError::DomainMismatch { direction: Direction::U, params: (0.1, 1.0), domain: (0.0, 1.0) }
        );
        assert!(matches!(
            GordonSurface::new(&[], &[], &v_curves, &U_PARAMS).build(&mut ctx),
            Err(GordonError::TooFewCurves { direction: Direction::U, count: 0, .. })
        ));
    }

    #[test]
    fn mixed_degrees() {
        // bilinear in u, cubic in v
        let u_basis = Basis::uniform(1, 3).unwrap();
        let v_basis = Basis::uniform(3, 4).unwrap();
        let rows: Vec<Vec<Vec3>> =
            (0..4).map(|j| (0..3).map(|i| Vec3::new(i as f64, j as f64, ((i * j) % 3) as f64)).collect()).collect();
        let s = Surface::new(u_basis, v_basis, crate::surface::ControlNet::new(&rows).unwrap()).unwrap();

        let v_params = [0.0, 0.25, 0.5, 0.75, 1.0];
        let u_params = [0.0, 0.25, 0.5, 0.75, 1.0];
        let u_curves: Vec<Curve> = v_params.iter().map(|&v| s.isocurve(Direction::V, v).unwrap()).collect();
        let v_curves: Vec<Curve> = u_params.iter().map(|&u| s.isocurve(Direction::U, u).unwrap()).collect();

        let mut ctx = NumericContext::default();
        let (gordon, _) = GordonSurface::new(&u_curves, &v_params, &v_curves, &u_params).build(&mut ctx).unwrap();
        assert_eq!(gordon.degree(Direction::U), 1);
        assert_eq!(gordon.degree(Direction::V), 3);
        for (curve, &v) in u_curves.iter().zip(&v_params) {
            for t in [0.1, 0.5, 0.8] {
                assert_relative_eq!(gordon.point(t, v).unwrap(), curve.point(t, 0).unwrap(), epsilon = 1e-9);
            }
        }
    }
}
