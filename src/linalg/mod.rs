//! Dense linear algebra service used by the fitting and interpolation methods.
//!
//! The kernel never factorizes matrices itself. Every multiply, inversion and solve is one
//! synchronous request to a [`LinearAlgebra`] backend owned by a [`NumericContext`], which
//! counts the requests so that long operations can report them.
//! The default backend is [`DenseBackend`], implemented on [nalgebra].

use log::trace;
use thiserror::Error;

use crate::types::MatD;

pub use self::dense::DenseBackend;

mod dense;

#[derive(Error, Debug, PartialEq)]
pub enum LinalgError {
    #[error("Cannot {operation} a `{left_rows} x {left_cols}` with a `{right_rows} x {right_cols}` matrix.")]
    DimensionMismatch { operation: &'static str, left_rows: usize, left_cols: usize, right_rows: usize, right_cols: usize },

    #[error("The `{rows} x {cols}` matrix is not square.")]
    NotSquare { rows: usize, cols: usize },

    #[error("The `{size} x {size}` system is singular.")]
    Singular { size: usize },

    #[error("The `{size} x {size}` system is not symmetric positive definite.")]
    NotPositiveDefinite { size: usize },
}

/// Operations of a dense linear algebra backend.
///
/// Transpose flags apply to the respective operand before multiplication.
pub trait LinearAlgebra {
    fn name(&self) -> &str;

    /// Returns `op(a) op(b)`.
    fn multiply(&self, a: &MatD, b: &MatD, transpose_a: bool, transpose_b: bool) -> Result<MatD, LinalgError>;

    /// Computes `c <- alpha op(a) op(b) + beta c`.
    #[allow(clippy::too_many_arguments)]
    fn multiply_add(
        &self,
        alpha: f64,
        a: &MatD,
        b: &MatD,
        beta: f64,
        c: &mut MatD,
        transpose_a: bool,
        transpose_b: bool,
    ) -> Result<(), LinalgError>;

    /// Solves `a x = b` for a square `a` and any number of right-hand sides.
    fn lu_solve(&self, a: &MatD, b: &MatD) -> Result<MatD, LinalgError>;

    /// Solves `a x = b` for a symmetric positive definite `a`.
    fn cholesky_solve(&self, a: &MatD, b: &MatD) -> Result<MatD, LinalgError>;

    /// Inverts a square matrix by decomposition and solving against the identity.
    fn inverse(&self, a: &MatD) -> Result<MatD, LinalgError>;
}

/// Owns the backend and counts the requests issued to it.
pub struct NumericContext {
    backend: Box<dyn LinearAlgebra>,
    requests: usize,
}

impl Default for NumericContext {
    fn default() -> Self {
        NumericContext::new(Box::new(DenseBackend))
    }
}

impl std::fmt::Debug for NumericContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NumericContext").field("backend", &self.backend.name()).field("requests", &self.requests).finish()
    }
}

impl NumericContext {
    pub fn new(backend: Box<dyn LinearAlgebra>) -> Self {
        NumericContext { backend, requests: 0 }
    }

    /// Number of requests issued to the backend so far.
    pub fn requests(&self) -> usize {
        self.requests
    }

    fn request(&mut self, operation: &str, a: &MatD, b: &MatD) {
        self.requests += 1;
        trace!(
            "linalg request #{} on {}: {operation} {}x{} by {}x{}",
            self.requests,
            self.backend.name(),
            a.nrows(),
            a.ncols(),
            b.nrows(),
            b.ncols()
        );
    }

    pub fn multiply(&mut self, a: &MatD, b: &MatD, transpose_a: bool, transpose_b: bool) -> Result<MatD, LinalgError> {
        self.request("multiply", a, b);
        self.backend.multiply(a, b, transpose_a, transpose_b)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn multiply_add(
        &mut self,
        alpha: f64,
        a: &MatD,
        b: &MatD,
        beta: f64,
        c: &mut MatD,
        transpose_a: bool,
        transpose_b: bool,
    ) -> Result<(), LinalgError> {
        self.request("multiply_add", a, b);
        self.backend.multiply_add(alpha, a, b, beta, c, transpose_a, transpose_b)
    }

    pub fn lu_solve(&mut self, a: &MatD, b: &MatD) -> Result<MatD, LinalgError> {
        self.request("lu_solve", a, b);
        self.backend.lu_solve(a, b)
    }

    pub fn cholesky_solve(&mut self, a: &MatD, b: &MatD) -> Result<MatD, LinalgError> {
        self.request("cholesky_solve", a, b);
        self.backend.cholesky_solve(a, b)
    }

    pub fn inverse(&mut self, a: &MatD) -> Result<MatD, LinalgError> {
        self.request("inverse", a, a);
        self.backend.inverse(a)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::dmatrix;

    use super::*;

    #[test]
    fn requests_are_counted() {
        let mut ctx = NumericContext::default();
        let a = dmatrix![2.0, 0.0; 0.0, 4.0];
        let b = dmatrix![2.0; 8.0];

        let x = ctx.lu_solve(&a, &b).unwrap();
        assert_relative_eq!(x, dmatrix![1.0; 2.0]);
        let y = ctx.cholesky_solve(&a, &b).unwrap();
        assert_relative_eq!(y, dmatrix![1.0; 2.0]);
        ctx.multiply(&a, &b, false, false).unwrap();

        assert_eq!(ctx.requests(), 3);
        assert!(format!("{ctx:?}").contains("nalgebra"));
    }

    /// A backend that refuses to solve anything.
    struct Failing;

    impl LinearAlgebra for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn multiply(&self, a: &MatD, b: &MatD, _: bool, _: bool) -> Result<MatD, LinalgError> {
            DenseBackend.multiply(a, b, false, false)
        }

        fn multiply_add(&self, _: f64, _: &MatD, _: &MatD, _: f64, _: &mut MatD, _: bool, _: bool) -> Result<(), LinalgError> {
            Ok(())
        }

        fn lu_solve(&self, a: &MatD, _: &MatD) -> Result<MatD, LinalgError> {
            Err(LinalgError::Singular { size: a.nrows() })
        }

        fn cholesky_solve(&self, a: &MatD, _: &MatD) -> Result<MatD, LinalgError> {
            Err(LinalgError::NotPositiveDefinite { size: a.nrows() })
        }

        fn inverse(&self, a: &MatD) -> Result<MatD, LinalgError> {
            Err(LinalgError::Singular { size: a.nrows() })
        }
    }

    #[test]
    fn custom_backend() {
        let mut ctx = NumericContext::new(Box::new(Failing));
        let a = MatD::identity(2, 2);
        assert_eq!(ctx.lu_solve(&a, &a), Err(LinalgError::Singular { size: 2 }));
        assert_eq!(ctx.requests(), 1);
    }
}
