//! Reverses the parametrization of a curve or of one surface direction.
//!
//! The knot vector is mirrored within its domain and the order of the control points along the
//! reversed direction is flipped, so the shape is traversed backwards over the same domain.

use crate::{
    curve::{points::Points, Curve},
    surface::{ControlNet, Direction, Surface},
};

pub fn reverse(curve: &mut Curve) -> &mut Curve {
    curve.basis.reverse();
    curve.points.reverse();
    curve
}

/// Reverses the surface along `direction`.
pub fn reverse_surface(surface: &mut Surface, direction: Direction) -> &mut Surface {
    let mut lines = surface.net.lines(direction);
    for line in lines.iter_mut() {
        line.reverse();
    }
    surface.net = ControlNet::from_lines(direction, &lines);
    surface.basis_mut(direction).reverse();
    surface
}
