/////////////////////////////////////////////////////////////////////////////////////////////
//
// Exposes the public API and high-level documentation for Gaussian random field generation.
//
// Created on: 27 Apr 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Gaussian random fields in 3-D by Local Average Subdivision (LAS)
//!
//! Direct simulation of a correlated Gaussian field needs the Cholesky factor
//! of the full cell covariance, which at **O(N²)** memory and **O(N³)** work
//! stops being practical beyond a few thousand cells. This crate instead
//! simulates a small coarse grid directly and then refines it recursively:
//! each stage doubles the resolution, conditioning every 2x2x2 child octet on
//! the 3x3x3 parent neighborhood around it and closing each octet so the
//! children average *exactly* to their parent. The produced values are local
//! averages of the underlying process over each output cell, which is the
//! quantity finite-element and reliability analyses consume.
//!
//! The covariance model is supplied as a
//! [`CovarianceKernel`](strati_las_utils::CovarianceKernel) from the
//! [`strati_las_utils`] crate, which also ships the common geostatistical
//! models.
//!
//! # Features
//! - Arbitrary `k * 2^m` grids, with degenerate planar grids (an axis of a
//!   single cell) handled as embedded 2-D fields
//! - All conditioning tables precomputed at build time; realizations cost a
//!   noise draw and a sweep of small matrix products
//! - Deterministic: a positive seed reproduces a realization bit for bit
//! - Built on [`faer`](https://docs.rs/faer/latest/faer/) for the dense
//!   factorizations, avoiding complex build dependencies
//!
//! # Examples
//!
//! ```
//! use strati_las::{LasGenerator, SimulationParams};
//! use strati_las_utils::SeparableMarkovKernel;
//!
//! // 16^3 local averages over the unit cube, correlation length one half
//! let params = SimulationParams::builder([16, 16, 16], [1.0, 1.0, 1.0]).build();
//! let kernel = SeparableMarkovKernel::new(1.0, [0.5, 0.5, 0.5]);
//!
//! let mut generator = LasGenerator::builder(params)
//!     .seed(12345)
//!     .build(&kernel)?;
//!
//! // one direct 8^3 stage plus a single subdivision
//! assert_eq!(generator.decomposition(), ([8, 8, 8], 1));
//!
//! let mut field = vec![0.0f32; 16 * 16 * 16];
//! generator.sample(&mut field)?;
//!
//! assert!(field.iter().all(|v| v.is_finite()));
//! # Ok::<(), strati_las::LasError>(())
//! ```
//!
//! # References
//! 1. G. A. Fenton and E. H. Vanmarcke. Simulation of Random Fields via Local
//!    Average Subdivision. J. Engrg. Mech. 116(8), 1990.
//! 2. E. Vanmarcke. Random Fields: Analysis and Synthesis. MIT Press, 1984.
//! 3. G. A. Fenton and D. V. Griffiths. Risk Assessment in Geotechnical
//!    Engineering. Wiley, 2008.
pub mod config;

pub mod logging;

pub mod random;

mod covariance;

mod generator;

mod linalg;

mod neighborhood;

pub use {
    config::{SimulationParams, SimulationParamsBuilder},
    generator::{GeneratorStats, LasError, LasGenerator, LasGeneratorBuilder},
    logging::{LogMsg, LogSink, StderrSink, closure_sink},
    random::UniformRng,
};
