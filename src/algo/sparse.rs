//! Sparse helpers and a conjugate gradient solver.
//!
//! Used by the FEM solver, whose stiffness matrix is symmetric and
//! positive semi-definite. Matrices are `nalgebra_sparse` CSR matrices
//! assembled through [`CooMatrix`]; systems that are factored once and solved
//! many times (the ARAP Laplacian) use its Cholesky instead.

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::error::{DeformError, Result};

/// Keep only the rows and columns of a square matrix listed in `keep`, in
/// that order.
///
/// Entry `(keep[a], keep[b])` of `a` becomes entry `(a, b)` of the result.
/// Applied to a linear system this is Dirichlet elimination of every index
/// not in `keep`.
pub fn select(matrix: &CsrMatrix<f64>, keep: &[usize]) -> CsrMatrix<f64> {
    let mut new_index = vec![None; matrix.nrows()];
    for (a, &old) in keep.iter().enumerate() {
        new_index[old] = Some(a);
    }

    let mut coo = CooMatrix::new(keep.len(), keep.len());
    for (r, c, &v) in matrix.triplet_iter() {
        if let (Some(a), Some(b)) = (new_index[r], new_index[c]) {
            coo.push(a, b, v);
        }
    }
    CsrMatrix::from(&coo)
}

/// Outcome of a converged conjugate gradient solve.
#[derive(Debug, Clone)]
pub struct CgSolution {
    /// The solution vector.
    pub x: DVector<f64>,
    /// Iterations performed (0 when the initial guess already satisfied the tolerance).
    pub iterations: usize,
    /// Final `‖b − Ax‖ / ‖b‖`.
    pub relative_residual: f64,
}

/// Solve `A x = b` with the conjugate gradient method.
///
/// `A` must be symmetric positive definite on the subspace explored by the
/// iteration. Starts from `x0` (or zero) and stops once the relative residual
/// drops below `tolerance`. The iteration also stops when the curvature
/// `pᵀAp` of the search direction vanishes relative to `‖r‖²`; that is only
/// an error if the tolerance has not been met by then.
///
/// # Errors
///
/// [`DeformError::ConvergenceFailed`] with the number of iterations actually
/// performed if the tolerance is not met within `max_iter` iterations or the
/// search direction collapses (singular system).
pub fn conjugate_gradient(
    a: &CsrMatrix<f64>,
    b: &DVector<f64>,
    x0: Option<&DVector<f64>>,
    max_iter: usize,
    tolerance: f64,
) -> Result<CgSolution> {
    let n = b.len();
    assert_eq!(a.nrows(), n, "Matrix-vector dimension mismatch");
    assert_eq!(a.ncols(), n, "Matrix must be square");

    let b_norm = b.norm();
    if b_norm == 0.0 {
        return Ok(CgSolution {
            x: DVector::zeros(n),
            iterations: 0,
            relative_residual: 0.0,
        });
    }

    let mut x = x0.cloned().unwrap_or_else(|| DVector::zeros(n));
    let mut r = b - a * &x;
    let mut rr = r.dot(&r);
    if rr.sqrt() / b_norm < tolerance {
        return Ok(CgSolution {
            x,
            iterations: 0,
            relative_residual: rr.sqrt() / b_norm,
        });
    }

    let mut p = r.clone();
    let mut iterations = 0;

    while iterations < max_iter {
        let ap = a * &p;
        let curvature = p.dot(&ap);
        if curvature <= f64::EPSILON * rr {
            break;
        }

        let alpha = rr / curvature;
        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &ap, 1.0);
        iterations += 1;

        let rr_next = r.dot(&r);
        let relative_residual = rr_next.sqrt() / b_norm;
        if relative_residual < tolerance {
            return Ok(CgSolution {
                x,
                iterations,
                relative_residual,
            });
        }

        let beta = rr_next / rr;
        p = &r + beta * &p;
        rr = rr_next;
    }

    let relative_residual = rr.sqrt() / b_norm;
    if relative_residual < tolerance {
        return Ok(CgSolution {
            x,
            iterations,
            relative_residual,
        });
    }
    Err(DeformError::ConvergenceFailed { iterations })
}
