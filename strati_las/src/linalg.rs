/////////////////////////////////////////////////////////////////////////////////////////////
//
// Adds the dense factorization helpers used to condition and sample the field.
//
// Created on: 27 Apr 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # linalg
//!
//! Two factorizations back the engine: a lower Cholesky with a reported
//! residual, used both to sample (stage-0 factor, conditional child factors)
//! and to sanity-check the assembled covariances, and a Bunch-Kaufman
//! symmetric indefinite factorization used to solve the conditioning normal
//! equations, whose matrices are frequently close to singular.
//!
//! Factors destined for the sampling hot path are packed into single
//! precision; all factorization arithmetic stays in double precision.

use faer::{
    Conj, Mat, MatRef,
    diag::Diag,
    dyn_stack::{MemBuffer, MemStack},
    linalg::cholesky::lblt,
    perm::Perm,
    prelude::*,
};
use std::fmt;

#[derive(Debug)]
pub enum FactorizationError {
    /// An exact zero pivot block was produced; the matrix is singular.
    Singular { index: usize },

    /// A non-positive pivot was reached; the matrix is not positive definite.
    NotPositiveDefinite { index: usize },
}

impl fmt::Display for FactorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorizationError::Singular { index } => {
                write!(f, "zero pivot at index {index}: matrix is singular")
            }
            FactorizationError::NotPositiveDefinite { index } => {
                write!(
                    f,
                    "non-positive pivot at index {index}: matrix is not positive definite"
                )
            }
        }
    }
}

impl std::error::Error for FactorizationError {}

/// Factorizes `A = L L^T` in place, writing `L` over the lower triangle.
///
/// Only the lower triangle of the input is read. Returns the relative error
/// found by rebuilding the trailing diagonal element of `L L^T` from the
/// finished factor and comparing it against the original entry, which callers
/// test against their residual tolerance.
pub fn cholesky_lower_in_place(a: &mut Mat<f64>) -> Result<f64, FactorizationError> {
    let n = a.nrows();
    assert!(a.ncols() == n, "square matrix required");
    if n == 0 {
        return Ok(0.0);
    }

    let trailing = a[(n - 1, n - 1)];

    for j in 0..n {
        let mut d = a[(j, j)];
        for k in 0..j {
            d -= a[(j, k)] * a[(j, k)];
        }
        if d <= 0.0 {
            return Err(FactorizationError::NotPositiveDefinite { index: j });
        }
        let pivot = d.sqrt();
        a[(j, j)] = pivot;

        for i in j + 1..n {
            let mut s = a[(i, j)];
            for k in 0..j {
                s -= a[(i, k)] * a[(j, k)];
            }
            a[(i, j)] = s / pivot;
        }
    }

    let mut rebuilt = 0.0;
    for k in 0..n {
        rebuilt += a[(n - 1, k)] * a[(n - 1, k)];
    }
    let rerr = match trailing != 0.0 {
        true => ((trailing - rebuilt) / trailing).abs(),
        false => (trailing - rebuilt).abs(),
    };
    Ok(rerr)
}

/// Packs the lower triangle of a factored matrix column-major into single
/// precision, the storage format of the sampling tables.
pub fn pack_lower_f32(a: &Mat<f64>) -> Vec<f32> {
    let n = a.nrows();
    assert!(a.ncols() == n, "square matrix required");
    let mut out = Vec::with_capacity(n * (n + 1) / 2);
    for j in 0..n {
        for i in j..n {
            out.push(a[(i, j)] as f32);
        }
    }
    out
}

/// Offset of column `j` within a column-major packed lower triangle of order `n`.
#[inline(always)]
pub fn packed_column_offset(n: usize, j: usize) -> usize {
    j * (2 * n - j + 1) / 2
}

/// Accumulates `out = L u` for a packed lower-triangular `L` of order `n`.
pub fn packed_lower_matvec(l: &[f32], n: usize, u: &[f32], out: &mut [f32]) {
    debug_assert_eq!(l.len(), n * (n + 1) / 2);
    out[..n].fill(0.0);
    let mut off = 0;
    for j in 0..n {
        let uj = u[j];
        for i in j..n {
            out[i] += l[off + (i - j)] * uj;
        }
        off += n - j;
    }
}

/// Bunch-Kaufman factorization `A = L B L^T` of a symmetric matrix with 1x1
/// and 2x2 diagonal blocks, with exact zero pivot blocks rejected.
///
/// Only the lower triangle of the input is accessed.
#[derive(Debug)]
#[allow(non_snake_case)]
pub struct SymmetricIndefinite {
    L: Mat<f64>,
    B_diag: Diag<f64>,
    B_subdiag: Diag<f64>,
    P: Perm<usize>,
}

impl SymmetricIndefinite {
    #[allow(non_snake_case)]
    pub fn try_new(A: MatRef<'_, f64>) -> Result<Self, FactorizationError> {
        assert!(A.nrows() == A.ncols());
        let n = A.nrows();
        let par = faer::get_global_parallelism();

        let mut L = Mat::zeros(n, n);
        L.copy_from_triangular_lower(A);

        let mut diag = Diag::zeros(n);
        let mut subdiag = Diag::zeros(n);
        let mut perm_fwd = vec![0usize; n];
        let mut perm_bwd = vec![0usize; n];

        let mut mem = MemBuffer::new(lblt::factor::cholesky_in_place_scratch::<usize, f64>(
            n,
            par,
            default(),
        ));
        let stack = MemStack::new(&mut mem);

        lblt::factor::cholesky_in_place(
            L.as_mut(),
            subdiag.as_mut(),
            &mut perm_fwd,
            &mut perm_bwd,
            par,
            stack,
            default(),
        );

        diag.copy_from(L.diagonal());
        L.diagonal_mut().fill(1.0);

        // scan the block diagonal of B for exactly singular pivot blocks
        let d = diag.column_vector();
        let s = subdiag.column_vector();
        let mut i = 0;
        while i < n {
            if i + 1 < n && s[i] != 0.0 {
                let det = d[i] * d[i + 1] - s[i] * s[i];
                if det == 0.0 {
                    return Err(FactorizationError::Singular { index: i });
                }
                i += 2;
            } else {
                if d[i] == 0.0 {
                    return Err(FactorizationError::Singular { index: i });
                }
                i += 1;
            }
        }

        Ok(Self {
            L,
            B_diag: diag,
            B_subdiag: subdiag,
            P: unsafe {
                Perm::new_unchecked(perm_fwd.into_boxed_slice(), perm_bwd.into_boxed_slice())
            },
        })
    }

    /// Solves `A X = rhs` through the factorization.
    pub fn solve(&self, rhs: MatRef<'_, f64>) -> Mat<f64> {
        let par = faer::get_global_parallelism();
        let mut x = rhs.to_owned();

        let mut mem = MemBuffer::new(lblt::solve::solve_in_place_scratch::<usize, f64>(
            self.L.nrows(),
            x.ncols(),
            par,
        ));
        let stack = MemStack::new(&mut mem);

        lblt::solve::solve_in_place_with_conj(
            self.L.as_ref(),
            self.B_diag.as_ref(),
            self.B_subdiag.as_ref(),
            Conj::No,
            self.P.as_ref(),
            x.as_mut(),
            par,
            stack,
        );
        x
    }
}
