//! Refines curves or surfaces onto a common knot vector.
//!
//! Compatible entities share degree, domain and knot vector, so their control points can be
//! combined index by index. Domains that differ from the first entity's domain are rescaled
//! linearly. Afterwards every knot value is raised to its maximum multiplicity found across all
//! entities by knot insertion, which leaves the shapes unchanged.

use log::debug;
use thiserror::Error;

use crate::{
    basis::{knots::KnotVector, BasisError},
    curve::Curve,
    manipulation::insert::InsertError,
    surface::{Direction, Surface},
    types::KNOT_TOLERANCE,
};

#[derive(Error, Debug, PartialEq)]
pub enum CompatibilityError {
    #[error("Entity `{index}` has degree `p = {found}`, but `p = {expected}` was expected.")]
    DegreeMismatch { index: usize, expected: usize, found: usize },

    #[error("Knot insertion failed: {0}")]
    Insert(#[from] InsertError),

    #[error("Basis error: {0}")]
    Basis(#[from] BasisError),
}

fn same_domain(a: (f64, f64), b: (f64, f64)) -> bool {
    (a.0 - b.0).abs() <= KNOT_TOLERANCE && (a.1 - b.1).abs() <= KNOT_TOLERANCE
}

/// Makes all curves share one degree-compatible knot vector.
pub fn make_curves_compatible(curves: &mut [Curve]) -> Result<(), CompatibilityError> {
    let Some(first) = curves.first() else {
        return Ok(());
    };
    let (p, domain) = (first.degree(), first.domain());

    for (index, curve) in curves.iter_mut().enumerate() {
        if curve.degree() != p {
            return Err(CompatibilityError::DegreeMismatch { index, expected: p, found: curve.degree() });
        }
        if !same_domain(curve.domain(), domain) {
            curve.basis.reparameterize(domain)?;
        }
    }

    let vectors: Vec<&KnotVector> = curves.iter().map(Curve::knots).collect();
    let Some(common) = KnotVector::common(&vectors) else {
        return Ok(());
    };

    for curve in curves.iter_mut() {
        for knot in curve.knots().missing(&common) {
            curve.insert_times(knot.value, knot.multiplicity)?;
        }
    }
    debug!("made {} curves compatible with {} control points", curves.len(), curves[0].control_count());
    Ok(())
}

/// Makes all surfaces share their knot vectors along both directions.
pub fn make_surfaces_compatible(surfaces: &mut [Surface]) -> Result<(), CompatibilityError> {
    for direction in [Direction::U, Direction::V] {
        let Some(first) = surfaces.first() else {
            return Ok(());
        };
        let (p, domain) = (first.degree(direction), first.domain(direction));

        for (index, surface) in surfaces.iter_mut().enumerate() {
            if surface.degree(direction) != p {
                return Err(CompatibilityError::DegreeMismatch { index, expected: p, found: surface.degree(direction) });
            }
            if !same_domain(surface.domain(direction), domain) {
                surface.basis_mut(direction).reparameterize(domain)?;
            }
        }

        let vectors: Vec<&KnotVector> = surfaces.iter().map(|s| s.basis(direction).knots()).collect();
        let Some(common) = KnotVector::common(&vectors) else {
            return Ok(());
        };

        for surface in surfaces.iter_mut() {
            for knot in surface.basis(direction).knots().missing(&common) {
                for _ in 0..knot.multiplicity {
                    surface.insert(direction, knot.value)?;
                }
            }
        }
    }
    debug!("made {} surfaces compatible", surfaces.len());
    Ok(())
}
