use crate::{
    linalg::{LinalgError, LinearAlgebra},
    types::MatD,
};

/// Dense backend on nalgebra's decompositions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseBackend;

fn shape(m: &MatD, transpose: bool) -> (usize, usize) {
    if transpose {
        (m.ncols(), m.nrows())
    } else {
        (m.nrows(), m.ncols())
    }
}

fn mismatch(operation: &'static str, left: (usize, usize), right: (usize, usize)) -> LinalgError {
    LinalgError::DimensionMismatch {
        operation,
        left_rows: left.0,
        left_cols: left.1,
        right_rows: right.0,
        right_cols: right.1,
    }
}

fn check_system(a: &MatD, b: &MatD) -> Result<(), LinalgError> {
    if !a.is_square() {
        return Err(LinalgError::NotSquare { rows: a.nrows(), cols: a.ncols() });
    }
    if a.nrows() != b.nrows() {
        return Err(mismatch("solve", a.shape(), b.shape()));
    }
    Ok(())
}

impl LinearAlgebra for DenseBackend {
    fn name(&self) -> &str {
        "nalgebra"
    }

    fn multiply(&self, a: &MatD, b: &MatD, transpose_a: bool, transpose_b: bool) -> Result<MatD, LinalgError> {
        let (left, right) = (shape(a, transpose_a), shape(b, transpose_b));
        if left.1 != right.0 {
            return Err(mismatch("multiply", left, right));
        }
        Ok(match (transpose_a, transpose_b) {
            (false, false) => a * b,
            (true, false) => a.tr_mul(b),
            (false, true) => a * b.transpose(),
            (true, true) => (b * a).transpose(),
        })
    }

    fn multiply_add(
        &self,
        alpha: f64,
        a: &MatD,
        b: &MatD,
        beta: f64,
        c: &mut MatD,
        transpose_a: bool,
        transpose_b: bool,
    ) -> Result<(), LinalgError> {
        let (left, right) = (shape(a, transpose_a), shape(b, transpose_b));
        if left.1 != right.0 {
            return Err(mismatch("multiply", left, right));
        }
        if c.shape() != (left.0, right.1) {
            return Err(mismatch("accumulate", (left.0, right.1), c.shape()));
        }
        match (transpose_a, transpose_b) {
            (false, false) => c.gemm(alpha, a, b, beta),
            (true, false) => c.gemm_tr(alpha, a, b, beta),
            _ => {
                let product = self.multiply(a, b, transpose_a, transpose_b)?;
                *c *= beta;
                *c += product * alpha;
            }
        }
        Ok(())
    }

    fn lu_solve(&self, a: &MatD, b: &MatD) -> Result<MatD, LinalgError> {
        check_system(a, b)?;
        let x = a.clone().lu().solve(b).ok_or(LinalgError::Singular { size: a.nrows() })?;
        if x.iter().all(|v| v.is_finite()) {
            Ok(x)
        } else {
            Err(LinalgError::Singular { size: a.nrows() })
        }
    }

    fn cholesky_solve(&self, a: &MatD, b: &MatD) -> Result<MatD, LinalgError> {
        check_system(a, b)?;
        let cholesky = a.clone().cholesky().ok_or(LinalgError::NotPositiveDefinite { size: a.nrows() })?;
        Ok(cholesky.solve(b))
    }

    fn inverse(&self, a: &MatD) -> Result<MatD, LinalgError> {
        self.lu_solve(a, &MatD::identity(a.nrows(), a.ncols()))
    }
}
