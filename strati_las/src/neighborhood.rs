/////////////////////////////////////////////////////////////////////////////////////////////
//
// Builds the per-stage conditioning tables for every neighborhood class.
//
// Created on: 27 Apr 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # neighborhood
//!
//! Each parent cell conditions its children on the parents around it. Which
//! of the 3x3x3 neighborhood planes exist depends only on the cell's position
//! along each axis - interior cells see all 27 parents, faces 18, edges 12,
//! corners 8, and grids thinner than three cells see correspondingly fewer.
//! Rather than enumerating those cases separately, each axis is classified
//! into a span and one builder solves the conditioning system for whichever
//! span combinations occur at a stage.
//!
//! For a class with neighborhood covariance `R`, child covariance `B`, and
//! cross covariance `S`, the best linear estimator of the children is
//! `A^T v` with `R A = S`, and the conditional residual `B - S^T A` is
//! Cholesky-factored so fresh noise can be colored into the children. Only
//! the first `nc - 1` children are estimated; the last closes the octet so
//! the children average exactly to their parent.

use crate::linalg::{self, FactorizationError, SymmetricIndefinite};
use crate::logging::{LogMsg, LogSink};
use faer::Mat;
use itertools::iproduct;

/// Position of a parent cell along one axis of its stage grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisSpan {
    /// The only cell along this axis; no neighbors either side.
    Only,

    /// First cell; neighbors exist above only.
    Lo,

    /// Neighbors exist on both sides.
    Mid,

    /// Last cell; neighbors exist below only.
    Hi,
}

impl AxisSpan {
    /// Classifies position `index` on an axis of `extent` cells.
    #[inline(always)]
    pub fn of(index: usize, extent: usize) -> Self {
        if extent == 1 {
            AxisSpan::Only
        } else if index == 0 {
            AxisSpan::Lo
        } else if index == extent - 1 {
            AxisSpan::Hi
        } else {
            AxisSpan::Mid
        }
    }

    /// Neighborhood planes (0 below, 1 center, 2 above) present for this span.
    fn planes(self) -> &'static [usize] {
        match self {
            AxisSpan::Only => &[1],
            AxisSpan::Lo => &[1, 2],
            AxisSpan::Mid => &[0, 1, 2],
            AxisSpan::Hi => &[0, 1],
        }
    }

    /// Position of the center plane within [`planes`](Self::planes).
    fn center_offset(self) -> usize {
        match self {
            AxisSpan::Only | AxisSpan::Lo => 0,
            AxisSpan::Mid | AxisSpan::Hi => 1,
        }
    }

    fn code(self) -> usize {
        match self {
            AxisSpan::Only => 0,
            AxisSpan::Lo => 1,
            AxisSpan::Mid => 2,
            AxisSpan::Hi => 3,
        }
    }

    /// Spans occurring on an axis of `extent` cells.
    fn occurring(extent: usize) -> &'static [AxisSpan] {
        if extent == 1 {
            &[AxisSpan::Only]
        } else if extent == 2 {
            &[AxisSpan::Lo, AxisSpan::Hi]
        } else {
            &[AxisSpan::Lo, AxisSpan::Mid, AxisSpan::Hi]
        }
    }
}

#[inline(always)]
fn class_code(spans: [AxisSpan; 3]) -> usize {
    spans[0].code() + 4 * spans[1].code() + 16 * spans[2].code()
}

/// Neighborhood positions (x-fastest, `n = nx + 3 ny + 9 nz`) selected by a
/// span combination, in ascending order.
fn mask_for(spans: [AxisSpan; 3]) -> Vec<usize> {
    let mut mask = Vec::new();
    for &nz in spans[2].planes() {
        for &ny in spans[1].planes() {
            for &nx in spans[0].planes() {
                mask.push(nx + 3 * ny + 9 * nz);
            }
        }
    }
    mask
}

/// Precomputed conditioning parameters for one neighborhood class.
pub struct OctetParams {
    /// Selected neighborhood positions, ascending.
    pub mask: Vec<usize>,

    /// Index of the center parent within `mask`.
    pub center: usize,

    /// Number of children per parent at this stage.
    pub children: usize,

    /// Projection onto the first `children - 1` children: `mask.len()` rows
    /// per child, stored column-major.
    pub projection: Vec<f32>,

    /// Packed lower Cholesky factor of the conditional child covariance.
    pub residual: Vec<f32>,
}

/// Conditioning tables for one subdivision stage, keyed by span combination.
pub struct StageTable {
    classes: Vec<Option<OctetParams>>,
}

impl StageTable {
    /// Solves the conditioning systems for every class occurring on a parent
    /// grid of `parent_dims` cells subdividing by `subdiv`.
    #[allow(non_snake_case)]
    pub fn build(
        stage: u32,
        R: &Mat<f64>,
        B: &Mat<f64>,
        S: &Mat<f64>,
        parent_dims: [usize; 3],
        subdiv: [usize; 3],
        residual_tol: f64,
        sink: Option<&dyn LogSink>,
    ) -> Result<Self, FactorizationError> {
        let mut classes: Vec<Option<OctetParams>> = (0..64).map(|_| None).collect();

        for (sz, sy, sx) in iproduct!(
            AxisSpan::occurring(parent_dims[2]),
            AxisSpan::occurring(parent_dims[1]),
            AxisSpan::occurring(parent_dims[0])
        ) {
            let spans = [*sx, *sy, *sz];
            let params = build_class(spans, R, B, S, subdiv, residual_tol, stage, sink)?;
            classes[class_code(spans)] = Some(params);
        }

        Ok(StageTable { classes })
    }

    /// Parameters for the class of a parent cell.
    #[inline(always)]
    pub fn lookup(&self, spans: [AxisSpan; 3]) -> &OctetParams {
        self.classes[class_code(spans)]
            .as_ref()
            .expect("every class occurring on the stage grid is built at initialization")
    }
}

#[allow(non_snake_case)]
fn build_class(
    spans: [AxisSpan; 3],
    R: &Mat<f64>,
    B: &Mat<f64>,
    S: &Mat<f64>,
    subdiv: [usize; 3],
    residual_tol: f64,
    stage: u32,
    sink: Option<&dyn LogSink>,
) -> Result<OctetParams, FactorizationError> {
    let mask = mask_for(spans);
    let nb = mask.len();
    let nc = subdiv[0] * subdiv[1] * subdiv[2];
    let nf = nc - 1;

    let RR = Mat::from_fn(nb, nb, |i, j| R[(mask[i], mask[j])]);
    let factored = SymmetricIndefinite::try_new(RR.as_ref())?;

    let rhs = Mat::from_fn(nb, nf, |i, c| S[(mask[i], c)]);
    let A = factored.solve(rhs.as_ref());

    let mut BB = Mat::from_fn(nf, nf, |i, j| {
        let mut v = B[(i, j)];
        for t in 0..nb {
            v -= S[(mask[t], i)] * A[(t, j)];
        }
        v
    });
    let rerr = linalg::cholesky_lower_in_place(&mut BB)?;
    if rerr > residual_tol {
        if let Some(sink) = sink {
            sink.emit(LogMsg::FactorResidual {
                context: format!("stage {stage} conditioning"),
                rerr,
                tol: residual_tol,
            });
        }
    }

    let mut projection = Vec::with_capacity(nb * nf);
    for c in 0..nf {
        for t in 0..nb {
            projection.push(A[(t, c)] as f32);
        }
    }

    let center = spans[0].center_offset()
        + spans[0].planes().len()
            * (spans[1].center_offset() + spans[1].planes().len() * spans[2].center_offset());

    Ok(OctetParams {
        mask,
        center,
        children: nc,
        projection,
        residual: linalg::pack_lower_f32(&BB),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_classify_grid_positions() {
        assert_eq!(AxisSpan::of(0, 1), AxisSpan::Only);
        assert_eq!(AxisSpan::of(0, 8), AxisSpan::Lo);
        assert_eq!(AxisSpan::of(7, 8), AxisSpan::Hi);
        for i in 1..7 {
            assert_eq!(AxisSpan::of(i, 8), AxisSpan::Mid);
        }
    }

    #[test]
    fn mask_sizes_match_neighborhood_classes() {
        use AxisSpan::*;
        // interior, face, edge, corner
        assert_eq!(mask_for([Mid, Mid, Mid]).len(), 27);
        assert_eq!(mask_for([Mid, Mid, Lo]).len(), 18);
        assert_eq!(mask_for([Mid, Hi, Lo]).len(), 12);
        assert_eq!(mask_for([Lo, Hi, Lo]).len(), 8);
        // planar and pencil degenerations
        assert_eq!(mask_for([Mid, Mid, Only]).len(), 9);
        assert_eq!(mask_for([Lo, Mid, Only]).len(), 6);
        assert_eq!(mask_for([Lo, Hi, Only]).len(), 4);
        assert_eq!(mask_for([Mid, Only, Only]).len(), 3);
    }

    #[test]
    fn masks_are_ascending_and_centered() {
        use AxisSpan::*;
        for spans in [
            [Mid, Mid, Mid],
            [Lo, Mid, Hi],
            [Only, Lo, Hi],
            [Hi, Hi, Hi],
        ] {
            let mask = mask_for(spans);
            assert!(mask.windows(2).all(|w| w[0] < w[1]), "{spans:?}");
            let center = spans[0].center_offset()
                + spans[0].planes().len()
                    * (spans[1].center_offset()
                        + spans[1].planes().len() * spans[2].center_offset());
            assert_eq!(mask[center], 13, "{spans:?}");
        }
    }

    #[test]
    fn uncorrelated_cells_give_a_trivial_projection() {
        use AxisSpan::*;
        // identity neighborhood covariance with no cross correlation leaves
        // the children as pure colored noise with an identity factor
        let r = Mat::<f64>::identity(27, 27);
        let b = Mat::<f64>::identity(8, 8);
        let s = Mat::<f64>::zeros(27, 8);
        let table =
            StageTable::build(1, &r, &b, &s, [4, 4, 4], [2, 2, 2], 1e-3, None).unwrap();

        let params = table.lookup([Mid, Mid, Mid]);
        assert_eq!(params.mask.len(), 27);
        assert_eq!(params.children, 8);
        assert!(params.projection.iter().all(|&a| a == 0.0));

        // packed identity: ones on the diagonal entries of each column
        let mut off = 0;
        for j in 0..7 {
            assert_eq!(params.residual[off], 1.0);
            off += 7 - j;
        }
    }

    #[test]
    fn every_occurring_class_is_built() {
        use AxisSpan::*;
        let r = Mat::<f64>::identity(27, 27);
        let b = Mat::<f64>::identity(4, 4);
        let s = Mat::<f64>::zeros(27, 4);
        let table =
            StageTable::build(1, &r, &b, &s, [2, 2, 1], [2, 2, 1], 1e-3, None).unwrap();
        for sx in [Lo, Hi] {
            for sy in [Lo, Hi] {
                let params = table.lookup([sx, sy, Only]);
                assert_eq!(params.children, 4);
                assert_eq!(params.mask.len(), 4);
            }
        }
    }
}
