/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the concrete covariance kernel models.
//
// Created on: 27 Apr 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{CovarianceKernel, KernelFromParams, KernelParams};

/// Variance function of the 1-D Markov model over an interval of length `d`,
/// for correlation `exp(-2 |tau| / theta)`.
#[inline(always)]
fn markov_gamma(d: f64, theta: f64) -> f64 {
    let a = 2.0 * d / theta;
    if a < 1e-3 {
        // series expansion where the closed form cancels catastrophically
        return 1.0 - a / 3.0 + a * a / 12.0 - a * a * a / 60.0;
    }
    2.0 * (a - 1.0 + (-a).exp()) / (a * a)
}

/// Separable Markov (exponential) model with per-axis scales of fluctuation,
/// `cov(x, y, z) = variance * exp(-2 (|x|/tx + |y|/ty + |z|/tz))`.
#[derive(Clone, Debug, Copy)]
pub struct SeparableMarkovKernel {
    variance: f64,
    theta: [f64; 3],
}

impl SeparableMarkovKernel {
    pub fn new(variance: f64, theta: [f64; 3]) -> Self {
        Self { variance, theta }
    }
}

impl CovarianceKernel for SeparableMarkovKernel {
    #[inline(always)]
    fn point_cov(&self, x: f64, y: f64, z: f64) -> f64 {
        let e = x.abs() / self.theta[0] + y.abs() / self.theta[1] + z.abs() / self.theta[2];
        self.variance * (-2.0 * e).exp()
    }

    /// Exact: the variance function of a separable model is the product of
    /// the per-axis variance functions.
    fn avg_variance(&self, v: [f64; 3]) -> f64 {
        self.variance
            * markov_gamma(v[0], self.theta[0])
            * markov_gamma(v[1], self.theta[1])
            * markov_gamma(v[2], self.theta[2])
    }
}

impl KernelFromParams for SeparableMarkovKernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        Self::new(p.variance, p.theta)
    }
}

/// Separable squared-exponential (Gaussian decay) model,
/// `cov(x, y, z) = variance * exp(-pi ((x/tx)^2 + (y/ty)^2 + (z/tz)^2))`,
/// normalized so `theta` is the scale of fluctuation per axis.
#[derive(Clone, Debug, Copy)]
pub struct SquaredExponentialKernel {
    variance: f64,
    theta: [f64; 3],
}

impl SquaredExponentialKernel {
    pub fn new(variance: f64, theta: [f64; 3]) -> Self {
        Self { variance, theta }
    }
}

impl CovarianceKernel for SquaredExponentialKernel {
    #[inline(always)]
    fn point_cov(&self, x: f64, y: f64, z: f64) -> f64 {
        let rx = x / self.theta[0];
        let ry = y / self.theta[1];
        let rz = z / self.theta[2];
        self.variance * (-std::f64::consts::PI * (rx * rx + ry * ry + rz * rz)).exp()
    }
}

impl KernelFromParams for SquaredExponentialKernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        Self::new(p.variance, p.theta)
    }
}

/// Pure nugget model: every local average has the same variance and distinct
/// cells are uncorrelated, at every averaging scale.
#[derive(Clone, Debug, Copy)]
pub struct NuggetKernel {
    variance: f64,
}

impl NuggetKernel {
    pub fn new(variance: f64) -> Self {
        Self { variance }
    }
}

impl CovarianceKernel for NuggetKernel {
    #[inline(always)]
    fn point_cov(&self, x: f64, y: f64, z: f64) -> f64 {
        match x == 0.0 && y == 0.0 && z == 0.0 {
            true => self.variance,
            false => 0.0,
        }
    }

    fn avg_variance(&self, _: [f64; 3]) -> f64 {
        self.variance
    }
}

impl KernelFromParams for NuggetKernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        Self::new(p.variance)
    }
}
