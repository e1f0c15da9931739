//! Parameterization of point sequences for interpolation and fitting.
//!
//! The [methods] assign evenly spaced, chord length or centripetal parameters. All of them map
//! a sequence of points onto strictly increasing parameters in `[0, 1]`, unless the points
//! themselves coincide.

use crate::types::Vec3;

pub mod methods;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Method {
    EquallySpaced,
    Centripetal,
    #[default]
    ChordLength,
}

pub fn generate(points: &[Vec3], method: Method) -> Vec<f64> {
    match method {
        Method::EquallySpaced => methods::equally_spaced(points.len().saturating_sub(1)),
        Method::ChordLength => methods::chord_length(points),
        Method::Centripetal => methods::centripetal(points),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest(
        method,
        expected,
        case(Method::EquallySpaced, &[0., 0.5, 1.]),
        case(Method::ChordLength, &[0., 0.2, 1.]),
        case(Method::Centripetal, &[0., 1. / 3., 1.])
    )]
    fn generates(method: Method, expected: &[f64]) {
        let points = [Vec3::zeros(), Vec3::new(1., 0., 0.), Vec3::new(5., 0., 0.)];
        let params = generate(&points, method);
        assert_eq!(params.len(), expected.len());
        for (t, e) in params.iter().zip(expected) {
            approx::assert_relative_eq!(t, e, epsilon = 1e-12);
        }
    }
}
