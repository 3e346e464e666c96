/////////////////////////////////////////////////////////////////////////////////////////////
//
// Provides parameter and builder types for configuring covariance kernels.
//
// Created on: 27 Apr 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use serde::{Deserialize, Serialize};

/// Enum for the implemented covariance models.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum KernelType {
    /// Separable exponential (Markov) correlation.
    SeparableMarkov,

    /// Separable squared-exponential correlation.
    SquaredExponential,

    /// Uncorrelated cells with constant variance at every scale.
    Nugget,
}

/// Defines the [`KernelType`] to use, along with the point variance and the
/// per-axis scales of fluctuation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KernelParams {
    /// KernelType enum variant to use.
    pub kernel_type: KernelType,

    /// Variance of the point process.
    pub variance: f64,

    /// Scale of fluctuation per axis. Distances on the order of the scale
    /// are strongly correlated; well beyond it, effectively independent.
    ///
    /// Ignored by the nugget model.
    pub theta: [f64; 3],
}

impl KernelParams {
    /// Begins building a [`KernelParams`] instance for the given kernel type.
    pub fn builder(kernel_type: KernelType) -> KernelParamsBuilder {
        KernelParamsBuilder {
            kernel_type,
            variance: 1.0,
            theta: [1.0; 3],
        }
    }
}

/// Builder for [`KernelParams`] that provides sensible defaults.
#[derive(Debug, Clone, Copy)]
pub struct KernelParamsBuilder {
    kernel_type: KernelType,
    variance: f64,
    theta: [f64; 3],
}

impl KernelParamsBuilder {
    /// Sets the point variance.
    pub fn variance(mut self, v: f64) -> Self {
        self.variance = v;
        self
    }

    /// Sets the scale of fluctuation for all three axes at once.
    pub fn isotropic_theta(mut self, t: f64) -> Self {
        self.theta = [t; 3];
        self
    }

    /// Sets the per-axis scales of fluctuation.
    pub fn theta(mut self, t: [f64; 3]) -> Self {
        self.theta = t;
        self
    }

    /// Finalises the builder into a [`KernelParams`] value.
    pub fn build(self) -> KernelParams {
        assert!(self.variance > 0.0);
        assert!(self.theta.iter().all(|&t| t > 0.0));
        KernelParams {
            kernel_type: self.kernel_type,
            variance: self.variance,
            theta: self.theta,
        }
    }
}
