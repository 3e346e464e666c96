/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the uniform stream driving the field sampler and its Gaussian transform.
//
// Created on: 27 Apr 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # random
//!
//! Combined multiplicative congruential generator with a Bays-Durham shuffle,
//! plus the polar transform to standard normal variates. The stream is owned
//! by value so independent generators never share state, and a fixed seed
//! reproduces a realization bit for bit.
//!
//! # References
//! 1. P. L'Ecuyer. Efficient and Portable Combined Random Number Generators.
//!    Communications of the ACM 31(6), 1988.

const IM1: i32 = 2_147_483_563;
const IM2: i32 = 2_147_483_399;
const IA1: i32 = 40_014;
const IA2: i32 = 40_692;
const IQ1: i32 = 53_668;
const IQ2: i32 = 52_774;
const IR1: i32 = 12_211;
const IR2: i32 = 3_791;
const IMM1: i32 = IM1 - 1;
const NTAB: usize = 32;
const NDIV: i32 = 1 + IMM1 / NTAB as i32;
const RNMX: f64 = 1.0 - 1.2e-7;

/// One Schrage-safe step of a multiplicative congruential stream.
#[inline(always)]
fn advance(state: i32, a: i32, m: i32, q: i32, r: i32) -> i32 {
    let k = state / q;
    let next = a * (state - k * q) - k * r;
    match next < 0 {
        true => next + m,
        false => next,
    }
}

/// Uniform variate stream on the open interval (0, 1).
#[derive(Clone, Debug)]
pub struct UniformRng {
    idum: i32,
    idum2: i32,
    iy: i32,
    iv: [i32; NTAB],
}

impl UniformRng {
    /// Creates a stream from a seed; non-positive seeds are clamped to one.
    pub fn from_seed(seed: i32) -> Self {
        let seed = seed.max(1);
        let mut rng = UniformRng {
            idum: seed,
            idum2: seed,
            iy: 0,
            iv: [0; NTAB],
        };
        // warm up the primary stream while loading the shuffle table
        for j in (0..NTAB + 8).rev() {
            rng.idum = advance(rng.idum, IA1, IM1, IQ1, IR1);
            if j < NTAB {
                rng.iv[j] = rng.idum;
            }
        }
        rng.iy = rng.iv[0];
        rng
    }

    /// Replaces the stream state as if freshly created from `seed`.
    pub fn reseed(&mut self, seed: i32) {
        *self = UniformRng::from_seed(seed);
    }

    /// Returns the next variate, strictly inside (0, 1).
    pub fn next_uniform(&mut self) -> f64 {
        self.idum = advance(self.idum, IA1, IM1, IQ1, IR1);
        self.idum2 = advance(self.idum2, IA2, IM2, IQ2, IR2);

        let j = (self.iy / NDIV) as usize;
        self.iy = self.iv[j] - self.idum2;
        self.iv[j] = self.idum;
        if self.iy < 1 {
            self.iy += IMM1;
        }

        (self.iy as f64 / IM1 as f64).min(RNMX)
    }

    /// Fills `out` with independent standard normal variates by the polar
    /// transform. Variates are produced in pairs within the call; for an
    /// odd-length fill the unused half of the final pair is discarded, and
    /// nothing is carried over to the next call.
    pub fn fill_standard_normal(&mut self, out: &mut [f32]) {
        let mut i = 0;
        while i < out.len() {
            let (a, b, r) = loop {
                let a = 2.0 * self.next_uniform() - 1.0;
                let b = 2.0 * self.next_uniform() - 1.0;
                let r = a * a + b * b;
                if r < 1.0 && r > 0.0 {
                    break (a, b, r);
                }
            };
            let g = (-2.0 * r.ln() / r).sqrt();
            out[i] = (a * g) as f32;
            if i + 1 < out.len() {
                out[i + 1] = (b * g) as f32;
            }
            i += 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_seeds_give_identical_streams() {
        let mut a = UniformRng::from_seed(9_871);
        let mut b = UniformRng::from_seed(9_871);
        for _ in 0..10_000 {
            assert_eq!(a.next_uniform().to_bits(), b.next_uniform().to_bits());
        }
    }

    #[test]
    fn reseed_restarts_the_stream() {
        let mut a = UniformRng::from_seed(42);
        let first: Vec<f64> = (0..16).map(|_| a.next_uniform()).collect();
        a.reseed(42);
        let again: Vec<f64> = (0..16).map(|_| a.next_uniform()).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn nonpositive_seeds_clamp_to_one() {
        let mut a = UniformRng::from_seed(0);
        let mut b = UniformRng::from_seed(1);
        assert_eq!(a.next_uniform(), b.next_uniform());
    }

    #[test]
    fn uniform_stream_stays_open_and_has_correct_moments() {
        let mut rng = UniformRng::from_seed(12_345);
        let n = 1_000_000usize;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for _ in 0..n {
            let u = rng.next_uniform();
            assert!(u > 0.0 && u < 1.0);
            sum += u;
            sum_sq += u * u;
        }
        let mean = sum / n as f64;
        let var = sum_sq / n as f64 - mean * mean;
        assert!((mean - 0.5).abs() < 0.005, "mean {mean}");
        assert!((var - 1.0 / 12.0).abs() < 0.002, "variance {var}");
    }

    #[test]
    fn normal_fill_has_standard_moments() {
        let mut rng = UniformRng::from_seed(777);
        let mut buf = vec![0.0f32; 1_000_000];
        rng.fill_standard_normal(&mut buf);
        let n = buf.len() as f64;
        let mean: f64 = buf.iter().map(|&x| x as f64).sum::<f64>() / n;
        let var: f64 = buf.iter().map(|&x| (x as f64 - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 0.005, "mean {mean}");
        assert!((var - 1.0).abs() < 0.01, "variance {var}");
    }

    #[test]
    fn odd_fill_discards_the_spare_variate() {
        // two generators, one filling 3 + 3, the other 6 in one call: the
        // second triple must differ because the spare is not carried over
        let mut a = UniformRng::from_seed(5);
        let mut first = [0.0f32; 3];
        let mut second = [0.0f32; 3];
        a.fill_standard_normal(&mut first);
        a.fill_standard_normal(&mut second);

        let mut b = UniformRng::from_seed(5);
        let mut six = [0.0f32; 6];
        b.fill_standard_normal(&mut six);

        assert_eq!(first, six[..3]);
        assert_ne!(second, six[3..]);
    }
}
