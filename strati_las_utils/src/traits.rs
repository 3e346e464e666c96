/////////////////////////////////////////////////////////////////////////////////////////////
//
// Declares the covariance kernel traits consumed by the field generator.
//
// Created on: 27 Apr 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::kernel_params::KernelParams;
use crate::quadrature;

/// Second-moment description of a zero-mean, homogeneous point process.
///
/// Implementations must be **octant-symmetric**: `point_cov(x, y, z)` may not
/// depend on the signs of its arguments. The generator relies on this to fold
/// its quadratures onto the positive octant.
pub trait CovarianceKernel {
    /// Point covariance at lag `(x, y, z)`.
    fn point_cov(&self, x: f64, y: f64, z: f64) -> f64;

    /// Variance of the process averaged over a `v[0] x v[1] x v[2]` volume.
    ///
    /// The default evaluates the collapsed variance integral by 16-point
    /// Gauss-Legendre quadrature of [`point_cov`](Self::point_cov). Kernels
    /// with a closed-form variance function should override this; kernels
    /// without a meaningful point covariance (e.g. a pure nugget) must.
    fn avg_variance(&self, v: [f64; 3]) -> f64 {
        quadrature::average_variance_quadrature(self, v)
    }
}

/// Converts a shared [`KernelParams`] configuration into a concrete kernel type.
pub trait KernelFromParams: Sized {
    /// Constructs `Self` from a set of uniform kernel parameters.
    fn from_params(p: &KernelParams) -> Self;
}
