use crate::{
    basis::Basis,
    curve::{Curve, CurveError},
    surface::{Surface, SurfaceError},
    types::Vec3,
};

/// Sampled starting points for the Newton iterations.
///
/// Every knot span receives a number of samples proportional to its length, on average
/// `samples_per_span`, but at least one.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidates<P> {
    pub(super) entries: Vec<(P, Vec3)>,
}

pub(crate) fn span_parameters(basis: &Basis, samples_per_span: usize) -> Vec<f64> {
    let spans = basis.spans();
    let (a, b) = basis.domain();
    let budget = (samples_per_span.max(1) * spans.len()) as f64;

    let mut params = Vec::new();
    for span in spans {
        let count = ((budget * span.length() / (b - a)).round() as usize).max(1);
        params.extend((0..count).map(|k| span.start.knot.value + span.length() * k as f64 / count as f64));
    }
    params.push(b);
    params
}

impl<P: Copy> Candidates<P> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(P, Vec3)> {
        self.entries.iter()
    }

    /// Parameter of the sample closest to `point`.
    pub fn nearest(&self, point: &Vec3) -> Option<P> {
        self.entries
            .iter()
            .min_by(|a, b| (a.1 - point).norm_squared().total_cmp(&(b.1 - point).norm_squared()))
            .map(|&(parameter, _)| parameter)
    }
}

impl Candidates<f64> {
    pub fn curve(curve: &Curve, samples_per_span: usize) -> Result<Self, CurveError> {
        let entries = span_parameters(curve.basis(), samples_per_span)
            .into_iter()
            .map(|u| Ok((u, curve.point(u, 0)?)))
            .collect::<Result<_, CurveError>>()?;
        Ok(Candidates { entries })
    }
}

impl Candidates<(f64, f64)> {
    pub fn surface(surface: &Surface, samples_per_span: usize) -> Result<Self, SurfaceError> {
        let us = span_parameters(surface.u_basis(), samples_per_span);
        let vs = span_parameters(surface.v_basis(), samples_per_span);

        let mut entries = Vec::with_capacity(us.len() * vs.len());
        for &v in &vs {
            for &u in &us {
                entries.push(((u, v), surface.point(u, v)?));
            }
        }
        Ok(Candidates { entries })
    }
}
