//! Reports returned by long-running operations.

use std::time::{Duration, Instant};

use crate::{linalg::NumericContext, types::MatD};

/// Maximum and root-mean-square of a set of distances.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Residuals {
    pub max: f64,
    pub rms: f64,
}

impl Residuals {
    pub fn from_distances(distances: impl IntoIterator<Item = f64>) -> Self {
        let (count, max, squares) =
            distances.into_iter().fold((0usize, 0.0f64, 0.0), |(n, max, sq), d| (n + 1, max.max(d), sq + d * d));
        if count == 0 {
            return Residuals::default();
        }
        Residuals { max, rms: (squares / count as f64).sqrt() }
    }

    /// Residuals of the rows of an `n x 3` difference matrix.
    pub(crate) fn from_rows(differences: &MatD) -> Self {
        Residuals::from_distances(differences.row_iter().map(|r| r.norm()))
    }
}

/// Outcome of a least-squares fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub duration: Duration,
    /// Requests issued to the linear algebra backend.
    pub solve_requests: usize,
    /// Distances between the samples and the fitted entity.
    pub samples: Residuals,
    /// Deviations from the exact constraints.
    pub constraints: Residuals,
}

/// Measures duration and backend requests of an operation.
pub(crate) struct Stopwatch {
    start: Instant,
    requests: usize,
}

impl Stopwatch {
    pub(crate) fn start(ctx: &NumericContext) -> Self {
        Stopwatch { start: Instant::now(), requests: ctx.requests() }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub(crate) fn requests(&self, ctx: &NumericContext) -> usize {
        ctx.requests() - self.requests
    }

    pub(crate) fn fit_report(&self, ctx: &NumericContext, samples: Residuals, constraints: Residuals) -> FitReport {
        FitReport { duration: self.elapsed(), solve_requests: self.requests(ctx), samples, constraints }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn residuals() {
        let r = Residuals::from_distances([3.0, 4.0]);
        assert_eq!(r.max, 4.0);
        assert_relative_eq!(r.rms, (12.5f64).sqrt());
        assert_eq!(Residuals::from_distances(std::iter::empty()), Residuals::default());
    }

    #[test]
    fn stopwatch_counts_requests() {
        let mut ctx = NumericContext::default();
        let watch = Stopwatch::start(&ctx);
        ctx.inverse(&MatD::identity(2, 2)).unwrap();
        let report = watch.fit_report(&ctx, Residuals::default(), Residuals::default());
        assert_eq!(report.solve_requests, 1);
    }
}
