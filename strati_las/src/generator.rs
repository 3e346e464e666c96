/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the field generator handle, its initialization, and the subdivision sweep.
//
// Created on: 27 Apr 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # generator
//!
//! [`LasGenerator`] produces realizations of a zero-mean, homogeneous,
//! Gaussian random field of local averages by Local Average Subdivision:
//! a coarse field is simulated directly from its Cholesky-factored
//! covariance, then refined stage by stage, each parent cell spawning a
//! child octet conditioned on the parent neighborhood and closed so the
//! children average exactly to their parent.
//!
//! All conditioning tables are precomputed at initialization; sampling only
//! draws noise and applies them, so repeated realizations amortize the
//! setup cost.
//!
//! # References
//! 1. G. A. Fenton and E. H. Vanmarcke. Simulation of Random Fields via Local
//!    Average Subdivision. J. Engrg. Mech. 116(8), 1990.

use crate::config::SimulationParams;
use crate::covariance::{self, LagTable};
use crate::linalg::{self, FactorizationError};
use crate::logging::{LogMsg, LogSink};
use crate::neighborhood::{AxisSpan, StageTable};
use crate::random::UniformRng;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strati_las_utils::CovarianceKernel;

/// Errors surfaced by generator construction and sampling.
#[derive(Debug)]
pub enum LasError {
    /// The output grid cannot be factored into an acceptable coarse grid
    /// within the configured number of subdivisions.
    IncompatibleGrid {
        cells: [usize; 3],
        max_coarse_cells: usize,
        max_stages: u32,
    },

    /// A conditioning system was exactly singular.
    SingularMatrix { context: String },

    /// A covariance matrix that must be positive definite was not.
    NotPositiveDefinite { context: String },

    /// Nonsensical sizes or extents.
    InvalidArgument { message: String },
}

impl fmt::Display for LasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LasError::IncompatibleGrid {
                cells,
                max_coarse_cells,
                max_stages,
            } => write!(
                f,
                "grid {} x {} x {} cannot be decomposed into at most {} coarse cells within {} subdivisions",
                cells[0], cells[1], cells[2], max_coarse_cells, max_stages
            ),
            LasError::SingularMatrix { context } => {
                write!(f, "{context}: singular covariance matrix")
            }
            LasError::NotPositiveDefinite { context } => {
                write!(f, "{context}: covariance matrix is not positive definite")
            }
            LasError::InvalidArgument { message } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for LasError {}

fn from_factorization(err: FactorizationError, context: String) -> LasError {
    match err {
        FactorizationError::Singular { .. } => LasError::SingularMatrix { context },
        FactorizationError::NotPositiveDefinite { .. } => {
            LasError::NotPositiveDefinite { context }
        }
    }
}

/// Wall-clock accounting for a generator, queryable at any time.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorStats {
    /// Time spent building the conditioning tables.
    pub init: Duration,

    /// Accumulated time spent producing realizations.
    pub generation: Duration,

    /// Number of realizations produced so far.
    pub realizations: u64,
}

/// One refinement stage: its parent grid and conditioning tables.
struct StageInfo {
    table: StageTable,
    parent_dims: [usize; 3],
    subdiv: [usize; 3],
}

impl StageInfo {
    fn child_dims(&self) -> [usize; 3] {
        [
            self.parent_dims[0] * self.subdiv[0],
            self.parent_dims[1] * self.subdiv[1],
            self.parent_dims[2] * self.subdiv[2],
        ]
    }
}

/// Generator of local-average Gaussian random fields on a regular 3-D grid.
///
/// Construct with [`LasGenerator::builder`]; draw realizations with
/// [`sample`](Self::sample). All cached state - the stage-0 factor, the
/// per-stage conditioning tables, the noise stream, and the scratch stage
/// buffer - lives behind this handle, so concurrent generation is a matter
/// of owning separate generators.
pub struct LasGenerator {
    params: SimulationParams,
    coarse_grid: [usize; 3],
    stage0_factor: Vec<f32>,
    stages: Vec<StageInfo>,
    rng: UniformRng,
    seed: i32,
    normals: Vec<f32>,
    scratch: Vec<f32>,
    scratch_dims: [usize; 3],
    sink: Option<Arc<dyn LogSink>>,
    init_time: Duration,
    gen_time: Duration,
    realizations: u64,
}

/// A convenience builder for constructing a [`LasGenerator`].
pub struct LasGeneratorBuilder {
    params: SimulationParams,
    seed: i32,
    sink: Option<Arc<dyn LogSink>>,
}

impl LasGenerator {
    /// Returns a new [`LasGeneratorBuilder`] for the given simulation target.
    pub fn builder(params: SimulationParams) -> LasGeneratorBuilder {
        LasGeneratorBuilder {
            params,
            seed: 0,
            sink: None,
        }
    }
}

impl LasGeneratorBuilder {
    /// Sets the noise-stream seed. Non-positive values request a seed drawn
    /// from system entropy at build time.
    pub fn seed(mut self, seed: i32) -> Self {
        self.seed = seed;
        self
    }

    /// Attaches a sink receiving warnings and timing diagnostics.
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Builds the generator: decomposes the grid, factors the coarse
    /// covariance, and precomputes the conditioning tables of every stage.
    pub fn build<K>(self, kernel: &K) -> Result<LasGenerator, LasError>
    where
        K: CovarianceKernel + ?Sized,
    {
        let start = Instant::now();
        let params = self.params;
        let sink = self.sink;
        let sink_ref = sink.as_deref();

        if params.cells.iter().any(|&n| n == 0)
            || params.extents.iter().any(|&e| !(e > 0.0))
            || params.max_coarse_cells == 0
        {
            return Err(fail(
                sink_ref,
                LasError::InvalidArgument {
                    message: format!(
                        "cells {:?} and extents {:?} must be positive",
                        params.cells, params.extents
                    ),
                },
            ));
        }

        let (k, m) =
            decompose(params.cells, params.max_coarse_cells, params.max_stages)
                .map_err(|e| fail(sink_ref, e))?;

        let seed = effective_seed(self.seed, sink_ref);
        let rng = UniformRng::from_seed(seed);

        // coarse cell sizes; flat axes keep the full extent at every stage
        let subdiv = params.cells.map(|n| match n > 1 {
            true => 2usize,
            false => 1usize,
        });
        let t0 = [
            params.extents[0] / k[0] as f64,
            params.extents[1] / k[1] as f64,
            params.extents[2] / k[2] as f64,
        ];

        // stage 0: factor the coarse-grid covariance
        let table0 = LagTable::new(kernel, t0, k);
        let mut r0 = covariance::coarse_covariance(&table0, k);
        let rerr = linalg::cholesky_lower_in_place(&mut r0)
            .map_err(|e| fail(sink_ref, from_factorization(e, "stage-0 covariance".into())))?;
        if rerr > params.residual_tol {
            report(
                sink_ref,
                LogMsg::FactorResidual {
                    context: "stage-0 covariance".into(),
                    rerr,
                    tol: params.residual_tol,
                },
            );
        }
        let stage0_factor = linalg::pack_lower_f32(&r0);
        let kk = k[0] * k[1] * k[2];

        // refinement stages: each conditions on the previous geometry's
        // neighborhood covariance and supplies the template for the next
        let mut template = covariance::neighborhood_template(&table0);
        let mut d = t0;
        let mut parent_dims = k;
        let mut stages = Vec::with_capacity(m as usize);
        for s in 1..=m {
            for a in 0..3 {
                if subdiv[a] == 2 {
                    d[a] *= 0.5;
                }
            }
            let mats = covariance::stage_matrices(kernel, d, subdiv);
            let table = StageTable::build(
                s,
                &template,
                &mats.child_cov,
                &mats.cross_cov,
                parent_dims,
                subdiv,
                params.residual_tol,
                sink_ref,
            )
            .map_err(|e| {
                fail(
                    sink_ref,
                    from_factorization(e, format!("stage {s} conditioning")),
                )
            })?;
            stages.push(StageInfo {
                table,
                parent_dims,
                subdiv,
            });
            template = mats.template;
            for a in 0..3 {
                parent_dims[a] *= subdiv[a];
            }
        }

        // the previous-stage field ping-pongs through this buffer
        let (scratch, scratch_dims) = match stages.last() {
            Some(last) => {
                let dims = last.parent_dims;
                (vec![0.0f32; dims[0] * dims[1] * dims[2]], dims)
            }
            None => (Vec::new(), [0; 3]),
        };

        let init_time = start.elapsed();
        report(
            sink_ref,
            LogMsg::Timing {
                label: "initialization",
                seconds: init_time.as_secs_f64(),
            },
        );

        Ok(LasGenerator {
            params,
            coarse_grid: k,
            stage0_factor,
            stages,
            rng,
            seed,
            normals: vec![0.0; kk],
            scratch,
            scratch_dims,
            sink,
            init_time,
            gen_time: Duration::ZERO,
            realizations: 0,
        })
    }
}

impl LasGenerator {
    /// Fills `field` with one realization of `cells[0] * cells[1] * cells[2]`
    /// local averages, x varying fastest.
    ///
    /// On error the contents of `field` are indeterminate.
    pub fn sample(&mut self, field: &mut [f32]) -> Result<(), LasError> {
        let n = self.params.cells[0] * self.params.cells[1] * self.params.cells[2];
        if field.len() != n {
            let err = LasError::InvalidArgument {
                message: format!("field buffer holds {} cells, expected {n}", field.len()),
            };
            return Err(fail(self.sink.as_deref(), err));
        }

        let start = Instant::now();
        let m = self.stages.len();
        let kk = self.coarse_grid[0] * self.coarse_grid[1] * self.coarse_grid[2];

        let LasGenerator {
            rng,
            normals,
            scratch,
            stages,
            stage0_factor,
            ..
        } = self;

        // stage 0: color the noise by the packed coarse factor, landing it
        // so the final stage ends up in the caller's buffer
        rng.fill_standard_normal(normals);
        let dst: &mut [f32] = match m % 2 == 0 {
            true => &mut field[..kk],
            false => &mut scratch[..kk],
        };
        linalg::packed_lower_matvec(stage0_factor, kk, normals, dst);

        for (i, stage) in stages.iter().enumerate() {
            let s = i + 1;
            let pd = stage.parent_dims;
            let cd = stage.child_dims();
            let parent_len = pd[0] * pd[1] * pd[2];
            let child_len = cd[0] * cd[1] * cd[2];
            // the stage s-1 field sits in the caller's buffer when m - (s-1) is even
            match (m - s + 1) % 2 == 0 {
                true => refine(stage, &field[..parent_len], &mut scratch[..child_len], rng),
                false => refine(stage, &scratch[..parent_len], &mut field[..child_len], rng),
            }
        }

        self.gen_time += start.elapsed();
        self.realizations += 1;
        Ok(())
    }

    /// Re-seeds the noise stream and returns the seed actually used.
    /// Non-positive seeds draw a fresh one from system entropy.
    pub fn reseed(&mut self, seed: i32) -> i32 {
        let seed = effective_seed(seed, self.sink.as_deref());
        self.rng.reseed(seed);
        self.seed = seed;
        seed
    }

    /// The seed currently driving the noise stream.
    pub fn seed(&self) -> i32 {
        self.seed
    }

    /// The coarse grid and stage count `(k, m)` chosen at initialization,
    /// satisfying `cells[i] = k[i] * 2^m` on subdivided axes.
    pub fn decomposition(&self) -> ([usize; 3], u32) {
        (self.coarse_grid, self.stages.len() as u32)
    }

    /// The next-to-last stage of the most recent realization and its grid
    /// dimensions, when at least one subdivision ran. Each cell of this field
    /// is the exact average of its children in the realization, which makes
    /// it useful for consistency diagnostics.
    pub fn coarse_field(&self) -> Option<(&[f32], [usize; 3])> {
        match self.stages.is_empty() {
            true => None,
            false => Some((&self.scratch, self.scratch_dims)),
        }
    }

    /// Timing counters and the realization count.
    pub fn stats(&self) -> GeneratorStats {
        GeneratorStats {
            init: self.init_time,
            generation: self.gen_time,
            realizations: self.realizations,
        }
    }

    /// The simulation parameters this generator was built with.
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }
}

fn report(sink: Option<&dyn LogSink>, msg: LogMsg) {
    if let Some(sink) = sink {
        sink.emit(msg);
    }
}

fn fail(sink: Option<&dyn LogSink>, err: LasError) -> LasError {
    report(
        sink,
        LogMsg::Fatal {
            message: err.to_string(),
        },
    );
    err
}

fn effective_seed(seed: i32, sink: Option<&dyn LogSink>) -> i32 {
    if seed > 0 {
        return seed;
    }
    let drawn = StdRng::from_os_rng().random_range(1..=i32::MAX);
    report(sink, LogMsg::EntropySeed { seed: drawn });
    drawn
}

/// Factors `cells[i] = k[i] * 2^m` with the smallest `m` whose coarse grid
/// fits the budget. Axes of extent one are never subdivided.
fn decompose(
    cells: [usize; 3],
    max_coarse_cells: usize,
    max_stages: u32,
) -> Result<([usize; 3], u32), LasError> {
    let live = cells.map(|n| n > 1);
    let mut k = cells;
    let mut m = 0u32;
    loop {
        if k[0] * k[1] * k[2] <= max_coarse_cells {
            return Ok((k, m));
        }
        let odd = (0..3).any(|a| live[a] && k[a] % 2 == 1);
        if odd || m == max_stages {
            return Err(LasError::IncompatibleGrid {
                cells,
                max_coarse_cells,
                max_stages,
            });
        }
        for a in 0..3 {
            if live[a] {
                k[a] /= 2;
            }
        }
        m += 1;
    }
}

/// Produces the children of every parent cell of one stage.
///
/// Parents are swept z-slab by z-slab, row by row, x fastest, so corners,
/// edges, faces, and interior cells are visited in boundary order within
/// each slab. Per parent: classify its spans, gather the masked
/// neighborhood, draw fresh noise, form the first `nc - 1` children as
/// `A^T v + C u`, and close the octet by upward averaging.
fn refine(stage: &StageInfo, parents: &[f32], children: &mut [f32], rng: &mut UniformRng) {
    let p = stage.parent_dims;
    let f = stage.subdiv;
    let cd = stage.child_dims();
    let nc = f[0] * f[1] * f[2];
    let nf = nc - 1;

    let mut nbr = [0.0f32; 27];
    let mut u = [0.0f32; 7];
    let mut octet = [0.0f32; 7];

    for pz in 0..p[2] {
        for py in 0..p[1] {
            for px in 0..p[0] {
                let spans = [
                    AxisSpan::of(px, p[0]),
                    AxisSpan::of(py, p[1]),
                    AxisSpan::of(pz, p[2]),
                ];
                let class = stage.table.lookup(spans);
                let nb = class.mask.len();

                for (t, &pos) in class.mask.iter().enumerate() {
                    let nx = px + pos % 3 - 1;
                    let ny = py + (pos / 3) % 3 - 1;
                    let nz = pz + pos / 9 - 1;
                    nbr[t] = parents[nx + p[0] * (ny + p[1] * nz)];
                }

                rng.fill_standard_normal(&mut u[..nf]);

                for c in 0..nf {
                    let col = &class.projection[c * nb..(c + 1) * nb];
                    let mut acc = 0.0f32;
                    for t in 0..nb {
                        acc += col[t] * nbr[t];
                    }
                    octet[c] = acc;
                }

                let mut off = 0;
                for t in 0..nf {
                    let ut = u[t];
                    for c in t..nf {
                        octet[c] += class.residual[off + (c - t)] * ut;
                    }
                    off += nf - t;
                }

                let mut sum = 0.0f32;
                for c in 0..nf {
                    sum += octet[c];
                }
                let closing = nc as f32 * nbr[class.center] - sum;

                for c in 0..nc {
                    let ex = c % f[0];
                    let ey = (c / f[0]) % f[1];
                    let ez = c / (f[0] * f[1]);
                    let value = match c < nf {
                        true => octet[c],
                        false => closing,
                    };
                    children[(f[0] * px + ex)
                        + cd[0] * ((f[1] * py + ey) + cd[1] * (f[2] * pz + ez))] = value;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strati_las_utils::{NuggetKernel, SeparableMarkovKernel};

    fn markov_params(cells: [usize; 3]) -> SimulationParams {
        SimulationParams::builder(cells, [1.0, 1.0, 1.0]).build()
    }

    #[test]
    fn decompose_leaves_small_grids_direct() {
        assert_eq!(decompose([8, 8, 8], 512, 6).unwrap(), ([8, 8, 8], 0));
        assert_eq!(decompose([4, 4, 1], 512, 6).unwrap(), ([4, 4, 1], 0));
    }

    #[test]
    fn decompose_halves_until_the_budget_fits() {
        assert_eq!(decompose([16, 16, 16], 512, 6).unwrap(), ([8, 8, 8], 1));
        assert_eq!(decompose([64, 64, 64], 512, 6).unwrap(), ([8, 8, 8], 3));
        assert_eq!(decompose([4, 4, 1], 4, 6).unwrap(), ([2, 2, 1], 1));
        assert_eq!(decompose([16, 8, 8], 64, 6).unwrap(), ([4, 2, 2], 2));
    }

    #[test]
    fn decompose_rejects_unreachable_grids() {
        // halving hits an odd factor while still over budget
        match decompose([144, 256, 256], 512, 6) {
            Err(LasError::IncompatibleGrid { .. }) => {}
            other => panic!("unexpected {other:?}"),
        }
        // stage budget exhausted first
        match decompose([512, 512, 512], 8, 2) {
            Err(LasError::IncompatibleGrid { .. }) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn builder_rejects_unreachable_grids() {
        let params = markov_params([144, 256, 256]);
        let kernel = SeparableMarkovKernel::new(1.0, [0.5; 3]);
        match LasGenerator::builder(params).seed(1).build(&kernel) {
            Err(LasError::IncompatibleGrid { .. }) => {}
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn builder_rejects_empty_grids_and_extents() {
        let kernel = NuggetKernel::new(1.0);
        let params = SimulationParams::builder([0, 8, 8], [1.0, 1.0, 1.0]).build();
        assert!(matches!(
            LasGenerator::builder(params).seed(1).build(&kernel),
            Err(LasError::InvalidArgument { .. })
        ));
        let params = SimulationParams::builder([8, 8, 8], [1.0, -1.0, 1.0]).build();
        assert!(matches!(
            LasGenerator::builder(params).seed(1).build(&kernel),
            Err(LasError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn sample_rejects_wrong_buffer_length() {
        let kernel = NuggetKernel::new(1.0);
        let mut generator = LasGenerator::builder(markov_params([4, 4, 4]))
            .seed(1)
            .build(&kernel)
            .unwrap();
        let mut short = vec![0.0f32; 63];
        assert!(matches!(
            generator.sample(&mut short),
            Err(LasError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn identical_seeds_reproduce_the_field_bit_for_bit() {
        let kernel = SeparableMarkovKernel::new(1.0, [0.5; 3]);
        let mut a = LasGenerator::builder(markov_params([16, 16, 16]))
            .seed(1)
            .build(&kernel)
            .unwrap();
        let mut b = LasGenerator::builder(markov_params([16, 16, 16]))
            .seed(1)
            .build(&kernel)
            .unwrap();
        assert_eq!(a.decomposition(), ([8, 8, 8], 1));

        let mut za = vec![0.0f32; 4096];
        let mut zb = vec![0.0f32; 4096];
        a.sample(&mut za).unwrap();
        b.sample(&mut zb).unwrap();
        assert!(za.iter().zip(&zb).all(|(x, y)| x.to_bits() == y.to_bits()));

        // reseeding replays the stream
        a.reseed(1);
        a.sample(&mut zb).unwrap();
        assert!(za.iter().zip(&zb).all(|(x, y)| x.to_bits() == y.to_bits()));
    }

    #[test]
    fn reseed_with_nonpositive_seed_draws_a_positive_one() {
        let kernel = NuggetKernel::new(1.0);
        let mut generator = LasGenerator::builder(markov_params([4, 4, 4]))
            .seed(1)
            .build(&kernel)
            .unwrap();
        let drawn = generator.reseed(0);
        assert!(drawn > 0);
        assert_eq!(generator.seed(), drawn);
    }

    #[test]
    fn direct_simulation_of_uncorrelated_cells_is_standard_normal() {
        // 8 x 8 x 8 with the default coarse budget is simulated directly
        let kernel = NuggetKernel::new(1.0);
        let mut generator = LasGenerator::builder(markov_params([8, 8, 8]))
            .seed(12345)
            .build(&kernel)
            .unwrap();
        assert_eq!(generator.decomposition(), ([8, 8, 8], 0));

        let mut z = vec![0.0f32; 512];
        generator.sample(&mut z).unwrap();

        let n = z.len() as f64;
        let mean: f64 = z.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var: f64 = z.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 0.15, "mean {mean}");
        assert!((var - 1.0).abs() < 0.2, "variance {var}");
    }

    #[test]
    fn pooled_marginals_pass_a_chi_square_test() {
        // standard normal cell probabilities at half-unit cuts
        const PHI: [f64; 5] = [
            0.6914624612740131,
            0.8413447460685429,
            0.9331927987311419,
            0.9772498680518208,
            0.9937903346742238,
        ];
        let mut bin_probs = [0.0f64; 12];
        bin_probs[0] = 1.0 - PHI[4];
        bin_probs[1] = PHI[4] - PHI[3];
        bin_probs[2] = PHI[3] - PHI[2];
        bin_probs[3] = PHI[2] - PHI[1];
        bin_probs[4] = PHI[1] - PHI[0];
        bin_probs[5] = PHI[0] - 0.5;
        for i in 0..6 {
            bin_probs[11 - i] = bin_probs[i];
        }

        let kernel = NuggetKernel::new(1.0);
        let mut generator = LasGenerator::builder(markov_params([8, 8, 8]))
            .seed(777)
            .build(&kernel)
            .unwrap();

        let realizations = 512usize;
        let mut counts = [0u64; 12];
        let mut z = vec![0.0f32; 512];
        for _ in 0..realizations {
            generator.sample(&mut z).unwrap();
            for &v in &z {
                let bin = (((v as f64 + 3.0) / 0.5).floor() as isize).clamp(0, 11) as usize;
                counts[bin] += 1;
            }
        }

        let total = (realizations * 512) as f64;
        let mut chi2 = 0.0;
        for b in 0..12 {
            let expected = bin_probs[b] * total;
            let diff = counts[b] as f64 - expected;
            chi2 += diff * diff / expected;
        }
        // 11 degrees of freedom; far beyond any plausible quantile
        assert!(chi2 < 40.0, "chi-square statistic {chi2}");
    }

    #[test]
    fn children_average_exactly_to_their_parents() {
        let kernel = SeparableMarkovKernel::new(1.0, [0.5; 3]);
        let mut generator = LasGenerator::builder(markov_params([16, 16, 16]))
            .seed(7)
            .build(&kernel)
            .unwrap();
        let mut z = vec![0.0f32; 4096];
        generator.sample(&mut z).unwrap();

        let (coarse, dims) = generator.coarse_field().unwrap();
        assert_eq!(dims, [8, 8, 8]);
        for pz in 0..8 {
            for py in 0..8 {
                for px in 0..8 {
                    let parent = coarse[px + 8 * (py + 8 * pz)] as f64;
                    let mut mean = 0.0f64;
                    for (ez, ey, ex) in itertools::iproduct!(0..2, 0..2, 0..2) {
                        mean += z[(2 * px + ex) + 16 * ((2 * py + ey) + 16 * (2 * pz + ez))]
                            as f64;
                    }
                    mean /= 8.0;
                    assert!(
                        (mean - parent).abs() < 1e-4,
                        "parent ({px}, {py}, {pz}): {mean} vs {parent}"
                    );
                }
            }
        }
    }

    #[test]
    fn planar_grids_refine_through_quartets() {
        // a single-cell-thick grid under a tight coarse budget forces the
        // planar conditioning path: quartet children on a never-subdivided axis
        let params = SimulationParams::builder([4, 4, 1], [1.0, 1.0, 0.05])
            .max_coarse_cells(4)
            .build();
        let kernel = SeparableMarkovKernel::new(1.0, [0.5, 0.5, 0.5]);
        let mut generator = LasGenerator::builder(params).seed(3).build(&kernel).unwrap();
        assert_eq!(generator.decomposition(), ([2, 2, 1], 1));

        let mut z = vec![0.0f32; 16];
        generator.sample(&mut z).unwrap();

        let (coarse, dims) = generator.coarse_field().unwrap();
        assert_eq!(dims, [2, 2, 1]);
        for py in 0..2 {
            for px in 0..2 {
                let parent = coarse[px + 2 * py] as f64;
                let mut mean = 0.0f64;
                for (ey, ex) in itertools::iproduct!(0..2, 0..2) {
                    mean += z[(2 * px + ex) + 4 * (2 * py + ey)] as f64;
                }
                mean /= 4.0;
                assert!((mean - parent).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn stats_track_realizations() {
        let kernel = NuggetKernel::new(1.0);
        let mut generator = LasGenerator::builder(markov_params([4, 4, 4]))
            .seed(2)
            .build(&kernel)
            .unwrap();
        let mut z = vec![0.0f32; 64];
        generator.sample(&mut z).unwrap();
        generator.sample(&mut z).unwrap();
        let stats = generator.stats();
        assert_eq!(stats.realizations, 2);
        assert!(stats.generation >= Duration::ZERO);
    }

    #[test]
    fn refined_fields_reproduce_the_local_average_covariance() {
        // two subdivisions under a reduced budget; compare the empirical
        // covariance along x against the engine's own analytical value at
        // the final cell size
        let cells = [16usize, 8, 8];
        let extents = [1.0, 0.5, 0.5];
        let params = SimulationParams::builder(cells, extents)
            .max_coarse_cells(64)
            .build();
        let kernel = SeparableMarkovKernel::new(1.0, [2.0, 2.0, 2.0]);
        let mut generator = LasGenerator::builder(params)
            .seed(12345)
            .build(&kernel)
            .unwrap();
        assert_eq!(generator.decomposition(), ([4, 2, 2], 2));

        let lags = [0usize, 1, 2, 4, 8];
        let mut sums = [0.0f64; 5];
        let mut pair_counts = [0u64; 5];
        let realizations = 10_000usize;
        let mut z = vec![0.0f32; cells[0] * cells[1] * cells[2]];

        for _ in 0..realizations {
            generator.sample(&mut z).unwrap();
            for (li, &d) in lags.iter().enumerate() {
                for kz in 0..cells[2] {
                    for jy in 0..cells[1] {
                        for ix in 0..cells[0] - d {
                            let a = z[ix + cells[0] * (jy + cells[1] * kz)] as f64;
                            let b = z[ix + d + cells[0] * (jy + cells[1] * kz)] as f64;
                            sums[li] += a * b;
                            pair_counts[li] += 1;
                        }
                    }
                }
            }
        }

        let cell = [
            extents[0] / cells[0] as f64,
            extents[1] / cells[1] as f64,
            extents[2] / cells[2] as f64,
        ];
        for (li, &d) in lags.iter().enumerate() {
            let empirical = sums[li] / pair_counts[li] as f64;
            let analytical =
                strati_las_utils::cell_average_covariance(&kernel, cell, [d as f64, 0.0, 0.0]);
            let rel = (empirical - analytical).abs() / analytical;
            assert!(
                rel < 0.05,
                "lag {d}: empirical {empirical}, analytical {analytical}"
            );
        }
    }
}
