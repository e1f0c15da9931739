use log::{debug, warn};

use crate::{
    basis::Basis,
    curve::Curve,
    diagnostics::FitReport,
    fitting::{
        approximation::{fit_constrained, Constraint, FitError, FitOptions},
        SurfaceSample,
    },
    linalg::NumericContext,
    projection::{invert_surface, ProjectionOptions},
    surface::{Direction, Surface},
    types::{Vec3, EVALUATION_TOLERANCE},
};

/// A boundary of the parameter domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Side {
    UMin,
    UMax,
    VMin,
    VMax,
}

impl Side {
    /// The direction along which a curve on this side runs.
    pub fn running(self) -> Direction {
        match self {
            Side::UMin | Side::UMax => Direction::V,
            Side::VMin | Side::VMax => Direction::U,
        }
    }
}

/// How the samples of a guide curve are assigned surface parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum GuideSampling {
    /// The guide follows the isocurve where the parameter along `direction` equals `at`.
    Isoparametric { direction: Direction, at: f64 },
    /// The `x` and `y` coordinates of `pcurve` give `(u, v)` along the guide.
    PCurve { pcurve: Curve },
    /// The parameters are found by projecting the guide onto `reference`.
    Projected { reference: Surface },
}

#[derive(Debug, Clone)]
struct Guide {
    curve: Curve,
    sampling: GuideSampling,
    count: usize,
}

/// Builds a surface over fixed bases that meets border curves exactly and follows guide curves.
///
/// Border curves are sampled at the Greville abscissae of the direction they run along and
/// become exact point constraints. Corner constraints shared by two borders are merged. Guide
/// curves and free samples are approximated in the least-squares sense.
#[derive(Debug, Clone)]
pub struct GuidedSurface {
    u_basis: Basis,
    v_basis: Basis,
    samples: Vec<SurfaceSample>,
    borders: Vec<(Side, Curve)>,
    guides: Vec<Guide>,
    guide_weight: f64,
    options: FitOptions,
    projection: ProjectionOptions,
}

/// Linearly maps `t` from the interval `from` onto the interval `to`.
fn remap(t: f64, from: (f64, f64), to: (f64, f64)) -> f64 {
    to.0 + (t - from.0) / (from.1 - from.0) * (to.1 - to.0)
}

impl GuidedSurface {
    pub fn new(u_basis: Basis, v_basis: Basis) -> Self {
        GuidedSurface {
            u_basis,
            v_basis,
            samples: Vec::new(),
            borders: Vec::new(),
            guides: Vec::new(),
            guide_weight: 1.0,
            options: FitOptions::default(),
            projection: ProjectionOptions::default(),
        }
    }

    pub fn samples(mut self, samples: &[SurfaceSample]) -> Self {
        self.samples.extend_from_slice(samples);
        self
    }

    pub fn border(mut self, side: Side, curve: Curve) -> Self {
        self.borders.push((side, curve));
        self
    }

    /// Adds a guide curve sampled at `count` evenly spaced parameters.
    pub fn guide(mut self, curve: Curve, sampling: GuideSampling, count: usize) -> Self {
        self.guides.push(Guide { curve, sampling, count });
        self
    }

    /// Weight of every guide sample relative to the free samples.
    pub fn guide_weight(mut self, weight: f64) -> Self {
        self.guide_weight = weight;
        self
    }

    pub fn options(mut self, options: FitOptions) -> Self {
        self.options = options;
        self
    }

    pub fn projection_options(mut self, projection: ProjectionOptions) -> Self {
        self.projection = projection;
        self
    }

    fn basis(&self, direction: Direction) -> &Basis {
        match direction {
            Direction::U => &self.u_basis,
            Direction::V => &self.v_basis,
        }
    }

    fn border_constraints(&self) -> Result<Vec<Constraint>, FitError> {
        let (u_domain, v_domain) = (self.u_basis.domain(), self.v_basis.domain());
        let mut constraints: Vec<((f64, f64), Vec3, usize)> = Vec::new();

        for (side, curve) in &self.borders {
            let running = self.basis(side.running());
            for g in running.greville() {
                let position = curve.point(remap(g, running.domain(), curve.domain()).min(curve.domain().1), 0)?;
                let parameter = match side {
                    Side::UMin => (u_domain.0, g),
                    Side::UMax => (u_domain.1, g),
                    Side::VMin => (g, v_domain.0),
                    Side::VMax => (g, v_domain.1),
                };
                match constraints.iter_mut().find(|(p, _, _)| *p == parameter) {
                    Some((_, merged, count)) => {
                        let deviation = (*merged / *count as f64 - position).norm();
                        if deviation > EVALUATION_TOLERANCE {
                            warn!("border curves meet at {parameter:?} with a gap of {deviation}, averaging");
                        }
                        *merged += position;
                        *count += 1;
                    }
                    None => constraints.push((parameter, position, 1)),
                }
            }
        }

        Ok(constraints
            .into_iter()
            .map(|(parameter, sum, count)| Constraint::Point { parameter, position: sum / count as f64 })
            .collect())
    }

    fn guide_samples(&self, guide: &Guide) -> Result<Vec<SurfaceSample>, FitError> {
        let domain = guide.curve.domain();
        let divisions = guide.count.max(2) - 1;
        let mut samples = Vec::with_capacity(divisions + 1);

        for k in 0..=divisions {
            let t = (domain.0 + (domain.1 - domain.0) * k as f64 / divisions as f64).min(domain.1);
            let position = guide.curve.point(t, 0)?;
            let (u, v) = match &guide.sampling {
                GuideSampling::Isoparametric { direction, at } => {
                    let along = self.basis(direction.other());
                    let s = remap(t, domain, along.domain());
                    match direction {
                        Direction::U => (*at, s),
                        Direction::V => (s, *at),
                    }
                }
                GuideSampling::PCurve { pcurve } => {
                    let q = pcurve.point(remap(t, domain, pcurve.domain()).min(pcurve.domain().1), 0)?;
                    (q.x, q.y)
                }
                GuideSampling::Projected { reference } => {
                    let projection = invert_surface(reference, &position, &self.projection)?;
                    projection.parameter
                }
            };
            let parameter = (self.u_basis.clamp(u), self.v_basis.clamp(v));
            samples.push(SurfaceSample::weighted(parameter, position, self.guide_weight));
        }
        Ok(samples)
    }

    pub fn build(&self, ctx: &mut NumericContext) -> Result<(Surface, FitReport), FitError> {
        let constraints = self.border_constraints()?;
        let mut samples = self.samples.clone();
        for guide in &self.guides {
            samples.extend(self.guide_samples(guide)?);
        }

        debug!(
            "building guided surface from {} borders, {} guides and {} samples",
            self.borders.len(),
            self.guides.len(),
            samples.len()
        );
        fit_constrained(ctx, &samples, &constraints, &self.u_basis, &self.v_basis, &self.options)
    }
}
