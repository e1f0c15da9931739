//! Removes knots from a curve or surface where this is possible within a tolerance.
//!
//! The removal reverses Boehm's insertion from both ends of the affected control points and
//! checks whether both sweeps meet, see algorithm A5.8 in `Piegl1997`. A knot is removed at
//! most `times` times and never more often than its multiplicity. Boundary knots are never
//! removed.

use log::debug;

use crate::{
    curve::{
        points::{ControlPoints, Points},
        Curve,
    },
    surface::{ControlNet, Direction, Surface, SurfaceError},
    types::{ControlPoint, MatD},
};

/// Result of a removal attempt on one control polygon.
struct Removal {
    count: usize,
    points: MatD,
}

/// Tries to remove the knot at expanded index `r` (its last occurrence) up to `num` times.
///
/// `knots` is the expanded sequence, `s` the multiplicity of the knot and `u` its value.
#[allow(clippy::too_many_arguments)]
fn try_remove(knots: &[f64], p: usize, points: &MatD, u: f64, r: usize, s: usize, num: usize, tolerance: f64) -> Removal {
    let n = points.ncols() as isize - 1;
    let order = p as isize + 1;
    let (r, s, p) = (r as isize, s as isize, p as isize);
    let tolerance_squared = tolerance * tolerance;

    let point = |m: &MatD, i: isize| -> ControlPoint { m.fixed_view::<4, 1>(0, i as usize).into_owned() };
    let knot = |i: isize| knots[i as usize];

    let mut working = points.clone();
    let mut temp = vec![ControlPoint::zeros(); (2 * p + 1) as usize];

    let fout = (2 * r - s - p) / 2;
    let mut first = r - p;
    let mut last = r - s;

    let mut t: isize = 0;
    while t < num as isize {
        let off = first - 1;
        temp[0] = point(&working, off);
        temp[(last + 1 - off) as usize] = point(&working, last + 1);

        let (mut i, mut j) = (first, last);
        let (mut ii, mut jj) = (1, last - off);
        while j - i > t {
            let alfi = (u - knot(i)) / (knot(i + order + t) - knot(i));
            let alfj = (u - knot(j - t)) / (knot(j + order) - knot(j - t));
            temp[ii as usize] = (point(&working, i) - (1.0 - alfi) * temp[(ii - 1) as usize]) / alfi;
            temp[jj as usize] = (point(&working, j) - alfj * temp[(jj + 1) as usize]) / (1.0 - alfj);
            i += 1;
            ii += 1;
            j -= 1;
            jj -= 1;
        }

        let removable = if j - i < t {
            (temp[(ii - 1) as usize] - temp[(jj + 1) as usize]).norm_squared() <= tolerance_squared
        } else {
            let alfi = (u - knot(i)) / (knot(i + order + t) - knot(i));
            let blended = alfi * temp[(ii + t + 1) as usize] + (1.0 - alfi) * temp[(ii - 1) as usize];
            (point(&working, i) - blended).norm_squared() <= tolerance_squared
        };
        if !removable {
            break;
        }

        let (mut i, mut j) = (first, last);
        while j - i > t {
            working.fixed_view_mut::<4, 1>(0, i as usize).copy_from(&temp[(i - off) as usize]);
            working.fixed_view_mut::<4, 1>(0, j as usize).copy_from(&temp[(j - off) as usize]);
            i += 1;
            j -= 1;
        }
        first -= 1;
        last += 1;
        t += 1;
    }

    if t == 0 {
        return Removal { count: 0, points: points.clone() };
    }

    // shift the remaining control points over the t obsolete ones
    let (mut i, mut j) = (fout, fout);
    for k in 1..t {
        if k % 2 == 1 {
            i += 1;
        } else {
            j -= 1;
        }
    }
    let mut kept: Vec<usize> = (0..j as usize).collect();
    kept.extend(i as usize + 1..=n as usize);

    Removal { count: t as usize, points: working.select_columns(kept.iter()) }
}

/// Locates the interior knot `u` and returns its value, last expanded index and multiplicity.
fn locate(curve_knots: &crate::basis::knots::KnotVector, u: f64) -> Option<(f64, usize, usize)> {
    let index = curve_knots.find(u)?;
    if index == 0 || index == curve_knots.len() - 1 {
        return None;
    }
    let indexed = curve_knots.indexed()[index];
    Some((indexed.knot.value, indexed.last, indexed.knot.multiplicity))
}

/// Removes the knot `u` from the curve up to `times` times and returns the number of removals.
pub fn remove(c: &mut Curve, u: f64, times: usize, tolerance: f64) -> usize {
    let Some((value, r, s)) = locate(c.knots(), u) else {
        return 0;
    };

    let removal =
        try_remove(c.basis.expanded(), c.degree(), c.points.matrix(), value, r, s, times.min(s), tolerance);
    if removal.count > 0 {
        *c.points.matrix_mut() = removal.points;
        c.basis.knots_mut().subtract(value, removal.count);
    }
    debug!("removed knot u = {value} {} of {times} times", removal.count);
    removal.count
}

/// Removes the knot `t` along `direction` uniformly from all rows or columns of the net.
///
/// The count removed is the minimum over all lines. When re-applying that count fails on
/// any line, the surface is left untouched.
pub fn remove_surface(
    s: &mut Surface,
    direction: Direction,
    t: f64,
    times: usize,
    tolerance: f64,
) -> Result<usize, SurfaceError> {
    let basis = s.basis(direction);
    let Some((value, r, multiplicity)) = locate(basis.knots(), t) else {
        return Ok(0);
    };
    let (knots, p) = (basis.expanded(), basis.degree());
    let num = times.min(multiplicity);

    let lines = s.net.lines(direction);
    let agreed = lines
        .iter()
        .map(|line| try_remove(knots, p, line.matrix(), value, r, multiplicity, num, tolerance).count)
        .min()
        .unwrap_or(0);
    if agreed == 0 {
        debug!("knot {direction:?} = {value} is not removable");
        return Ok(0);
    }

    let reduced = remove_from_lines(knots, p, &lines, (value, r, multiplicity), agreed, tolerance)?;
    s.net = ControlNet::from_lines(direction, &reduced);
    s.basis_mut(direction).knots_mut().subtract(value, agreed);
    debug!("removed knot {direction:?} = {value} {agreed} of {times} times");
    Ok(agreed)
}

/// Removes the knot `(value, last index, multiplicity)` exactly `count` times from every line.
fn remove_from_lines(
    knots: &[f64],
    p: usize,
    lines: &[ControlPoints],
    (value, r, multiplicity): (f64, usize, usize),
    count: usize,
    tolerance: f64,
) -> Result<Vec<ControlPoints>, SurfaceError> {
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let removal = try_remove(knots, p, line.matrix(), value, r, multiplicity, count, tolerance);
            if removal.count != count {
                return Err(SurfaceError::InconsistentRemoval { index, expected: count, found: removal.count });
            }
            Ok(ControlPoints::from_matrix(removal.points))
        })
        .collect()
}
