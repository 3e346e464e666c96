/////////////////////////////////////////////////////////////////////////////////////////////
//
// Re-exports covariance kernels, parameter sets, and quadrature helpers for strati_las.
//
// Created on: 27 Apr 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Covariance kernels for the [`strati_las`] crate
//!
//! A kernel describes the second-moment structure of the point process being
//! simulated: its point covariance `cov(x, y, z)` and the variance of the
//! process averaged over a rectangular volume. The engine only ever sees the
//! [`CovarianceKernel`] trait, so downstream codes can supply their own
//! models without touching the generator.
mod kernel_params;
mod kernels;
mod quadrature;
mod traits;

pub use {
    kernel_params::{KernelParams, KernelParamsBuilder, KernelType},
    kernels::{NuggetKernel, SeparableMarkovKernel, SquaredExponentialKernel},
    quadrature::{average_variance_quadrature, cell_average_covariance, unit_interval_rule},
    traits::{CovarianceKernel, KernelFromParams},
};
