use crate::types::Vec3;

/// `segments + 1` parameters spread evenly over `[0, 1]`, see eq. (9.3) in `Piegl1997`.
///
/// Unevenly spaced data can produce loops with these parameters.
pub fn equally_spaced(segments: usize) -> Vec<f64> {
    let m = segments;
    if m == 0 {
        return vec![0.0];
    }
    let mut u_bar = vec![0.0; m + 1];

    for (g, u) in u_bar.iter_mut().enumerate().take(m).skip(1) {
        *u = g as f64 / m as f64;
    }
    u_bar[m] = 1f64;

    u_bar
}

/// Accumulated square roots of the chord lengths, see eq. (9.6) in `Piegl1997`.
pub fn centripetal(points: &[Vec3]) -> Vec<f64> {
    accumulated(points, |d| d.sqrt())
}

/// Accumulated chord lengths, see eqs. (9.4) and (9.5) in `Piegl1997`.
pub fn chord_length(points: &[Vec3]) -> Vec<f64> {
    accumulated(points, |d| d)
}

fn accumulated(points: &[Vec3], measure: impl Fn(f64) -> f64) -> Vec<f64> {
    let m = points.len().saturating_sub(1);
    let lengths: Vec<f64> = points.windows(2).map(|w| measure((w[1] - w[0]).norm())).collect();
    let sum: f64 = lengths.iter().sum();

    // all points coincide
    if sum <= f64::EPSILON {
        return equally_spaced(m);
    }

    let mut u_bar = vec![0.0; m + 1];
    for g in 1..m {
        u_bar[g] = u_bar[g - 1] + lengths[g - 1] / sum;
    }
    if m > 0 {
        u_bar[m] = 1f64;
    }

    u_bar
}
