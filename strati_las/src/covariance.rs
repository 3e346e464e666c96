/////////////////////////////////////////////////////////////////////////////////////////////
//
// Assembles the covariance matrices conditioning each subdivision stage.
//
// Created on: 27 Apr 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # covariance
//!
//! The engine needs three families of matrices, all built from covariances
//! between equal-size cell averages at integer lags:
//!
//! - the coarse-grid covariance, factorized once for direct simulation;
//! - the 3x3x3 neighborhood template at the parent cell size of each stage;
//! - per stage, the child covariance and the parent-to-child cross
//!   covariance, the latter through the identity that a parent average is
//!   the mean of its children's averages.
//!
//! Covariances depend only on the absolute lag, so each geometry is
//! quadratured once into a small lag table and the matrices are gathered
//! from it.

use faer::Mat;
use itertools::iproduct;
use strati_las_utils::{CovarianceKernel, cell_average_covariance};

/// Cell-average covariances tabulated over non-negative integer lags for one
/// cell geometry.
pub struct LagTable {
    extent: [usize; 3],
    values: Vec<f64>,
}

impl LagTable {
    /// Quadratures the covariance at every lag inside `extent`, for cells of
    /// size `d`.
    pub fn new<K>(kernel: &K, d: [f64; 3], extent: [usize; 3]) -> Self
    where
        K: CovarianceKernel + ?Sized,
    {
        let mut values = vec![0.0; extent[0] * extent[1] * extent[2]];
        for (lz, ly, lx) in iproduct!(0..extent[2], 0..extent[1], 0..extent[0]) {
            values[lx + extent[0] * (ly + extent[1] * lz)] =
                cell_average_covariance(kernel, d, [lx as f64, ly as f64, lz as f64]);
        }
        LagTable { extent, values }
    }

    /// Covariance at a signed lag, or zero outside the tabulated extent.
    ///
    /// Out-of-extent lags only arise for neighborhood planes that do not
    /// exist at the current stage; those entries never enter a mask.
    pub fn get_or_zero(&self, lag: [isize; 3]) -> f64 {
        let mut idx = [0usize; 3];
        for a in 0..3 {
            let l = lag[a].unsigned_abs();
            if l >= self.extent[a] {
                return 0.0;
            }
            idx[a] = l;
        }
        self.values[idx[0] + self.extent[0] * (idx[1] + self.extent[1] * idx[2])]
    }
}

/// Splits a flat x-fastest cell index into per-axis coordinates.
#[inline(always)]
fn split_index(i: usize, dims: [usize; 3]) -> [isize; 3] {
    [
        (i % dims[0]) as isize,
        ((i / dims[0]) % dims[1]) as isize,
        (i / (dims[0] * dims[1])) as isize,
    ]
}

/// Covariance matrix between all pairs of coarse-grid cells, gathered from a
/// lag table whose extent matches the grid.
pub fn coarse_covariance(table: &LagTable, k: [usize; 3]) -> Mat<f64> {
    let kk = k[0] * k[1] * k[2];
    Mat::from_fn(kk, kk, |p, q| {
        let pc = split_index(p, k);
        let qc = split_index(q, k);
        table.get_or_zero([pc[0] - qc[0], pc[1] - qc[1], pc[2] - qc[2]])
    })
}

/// Covariance among a full 3x3x3 neighborhood of cells at the table's
/// geometry, indexed x-fastest.
pub fn neighborhood_template(table: &LagTable) -> Mat<f64> {
    Mat::from_fn(27, 27, |p, q| {
        let pc = split_index(p, [3, 3, 3]);
        let qc = split_index(q, [3, 3, 3]);
        table.get_or_zero([pc[0] - qc[0], pc[1] - qc[1], pc[2] - qc[2]])
    })
}

/// Cross covariance between the average over one parent cell of a 3x3x3
/// neighborhood and one child of the neighborhood's center parent.
///
/// A parent average is the mean of its children's averages, so the cross
/// covariance is the mean of equal-size covariances at the child geometry,
/// taken over the parent's own children. `parent` indexes the neighborhood
/// (0..3 per axis, center at 1), `child` the subdivision offsets within the
/// center parent.
pub fn parent_child_covariance(
    table: &LagTable,
    subdiv: [usize; 3],
    parent: [usize; 3],
    child: [usize; 3],
) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (ez, ey, ex) in iproduct!(0..subdiv[2], 0..subdiv[1], 0..subdiv[0]) {
        let e = [ex, ey, ez];
        let mut lag = [0isize; 3];
        for a in 0..3 {
            lag[a] = subdiv[a] as isize * (parent[a] as isize - 1) + e[a] as isize
                - child[a] as isize;
        }
        sum += table.get_or_zero(lag);
        count += 1;
    }
    sum / count as f64
}

/// Covariance matrices for one refinement stage, at its child geometry.
pub struct StageMatrices {
    /// Covariance among the children of one parent.
    pub child_cov: Mat<f64>,

    /// Cross covariance, neighborhood parents by children of the center parent.
    pub cross_cov: Mat<f64>,

    /// Neighborhood covariance at the child geometry, conditioning the
    /// following stage.
    pub template: Mat<f64>,
}

/// Assembles the per-stage matrices for children of size `d_child` under the
/// given per-axis subdivision factors (2 on subdivided axes, 1 on flat ones).
pub fn stage_matrices<K>(kernel: &K, d_child: [f64; 3], subdiv: [usize; 3]) -> StageMatrices
where
    K: CovarianceKernel + ?Sized,
{
    // lags through 3 cover child pairs across the whole neighborhood
    let extent = subdiv.map(|f| match f == 2 {
        true => 4,
        false => 1,
    });
    let table = LagTable::new(kernel, d_child, extent);

    let nc = subdiv[0] * subdiv[1] * subdiv[2];
    let child_cov = Mat::from_fn(nc, nc, |c, q| {
        let cc = split_index(c, subdiv);
        let qc = split_index(q, subdiv);
        table.get_or_zero([cc[0] - qc[0], cc[1] - qc[1], cc[2] - qc[2]])
    });

    let cross_cov = Mat::from_fn(27, nc, |p, c| {
        let pc = split_index(p, [3, 3, 3]).map(|v| v as usize);
        let cc = split_index(c, subdiv).map(|v| v as usize);
        parent_child_covariance(&table, subdiv, pc, cc)
    });

    let template = neighborhood_template(&table);

    StageMatrices {
        child_cov,
        cross_cov,
        template,
    }
}
