/////////////////////////////////////////////////////////////////////////////////////////////
//
// Declares the simulation configuration types and their builder.
//
// Created on: 27 Apr 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Declares the simulation configuration types and their builder.
use serde::{Deserialize, Serialize};

/// Parameters describing one simulation target: the output grid, the physical
/// box it covers, and the limits governing the coarse-grid decomposition.
///
/// The generator factors each grid dimension as `cells[i] = k[i] * 2^m` with a
/// shared number of subdivision stages `m`, direct-simulating the coarse
/// `k[0] x k[1] x k[2]` field and refining it stage by stage. `max_coarse_cells`
/// bounds the size of the direct simulation (and thereby its dense Cholesky
/// factor); `max_stages` bounds the recursion depth.
///
/// ### Default Values
/// - `max_stages`: `6`
/// - `max_coarse_cells`: `512`
/// - `residual_tol`: `1e-3`
#[derive(Clone, Copy, Serialize, Deserialize, Debug)]
pub struct SimulationParams {
    /// Number of output cells per axis.
    pub cells: [usize; 3],

    /// Physical extent of the simulated box per axis.
    pub extents: [f64; 3],

    /// Maximum number of subdivision stages.
    pub max_stages: u32,

    /// Maximum number of cells in the directly simulated coarse grid.
    pub max_coarse_cells: usize,

    /// Threshold on the reported relative residual of each Cholesky
    /// factorization above which a warning is emitted.
    pub residual_tol: f64,
}

impl SimulationParams {
    /// Returns a new [`SimulationParamsBuilder`] for the given grid and box.
    pub fn builder(cells: [usize; 3], extents: [f64; 3]) -> SimulationParamsBuilder {
        SimulationParamsBuilder {
            cells,
            extents,
            max_stages: 6,
            max_coarse_cells: 512,
            residual_tol: 1e-3,
        }
    }
}

/// A convenience builder for constructing a [`SimulationParams`] instance.
///
/// The builder should be called via the [`SimulationParams::builder`] method.
///
/// See [`SimulationParams`] for details on each field.
#[derive(Debug, Clone, Copy)]
pub struct SimulationParamsBuilder {
    cells: [usize; 3],
    extents: [f64; 3],
    max_stages: u32,
    max_coarse_cells: usize,
    residual_tol: f64,
}

impl SimulationParamsBuilder {
    /// Sets the maximum number of subdivision stages.
    pub fn max_stages(mut self, max_stages: u32) -> Self {
        self.max_stages = max_stages;
        self
    }

    /// Sets the maximum size of the directly simulated coarse grid.
    pub fn max_coarse_cells(mut self, max_coarse_cells: usize) -> Self {
        self.max_coarse_cells = max_coarse_cells;
        self
    }

    /// Sets the Cholesky residual warning threshold.
    pub fn residual_tol(mut self, residual_tol: f64) -> Self {
        self.residual_tol = residual_tol;
        self
    }

    /// Builds and returns a [`SimulationParams`] instance.
    pub fn build(self) -> SimulationParams {
        SimulationParams {
            cells: self.cells,
            extents: self.extents,
            max_stages: self.max_stages,
            max_coarse_cells: self.max_coarse_cells,
            residual_tol: self.residual_tol,
        }
    }
}
