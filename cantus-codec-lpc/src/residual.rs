// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Residual computation and reconstruction.

use cantus_core::errors::{invalid_param_error, Result};
use cantus_core::util::bits::{bit_width_u64, zigzag_encode_i32};

use crate::lpc::QuantizedPredictor;

/// The maximum partition order of a partitioned residual.
pub const MAX_PARTITION_ORDER: u32 = 15;

/// An `Accumulator` sums the products of the predictor.
///
/// Arithmetic wraps, so that a residual computed with an accumulator is always exactly inverted by
/// reconstruction with the same accumulator.
pub trait Accumulator: Copy {
    fn zero() -> Self;

    /// Returns `self + coef·sample`.
    fn mul_add(self, coef: i32, sample: i32) -> Self;

    /// Returns the arithmetic right shift of the sum, truncated to 32 bits.
    fn shr_to_i32(self, shift: u32) -> i32;
}

impl Accumulator for i32 {
    #[inline(always)]
    fn zero() -> Self {
        0
    }

    #[inline(always)]
    fn mul_add(self, coef: i32, sample: i32) -> Self {
        self.wrapping_add(coef.wrapping_mul(sample))
    }

    #[inline(always)]
    fn shr_to_i32(self, shift: u32) -> i32 {
        self >> shift
    }
}

impl Accumulator for i64 {
    #[inline(always)]
    fn zero() -> Self {
        0
    }

    #[inline(always)]
    fn mul_add(self, coef: i32, sample: i32) -> Self {
        self.wrapping_add(i64::from(coef) * i64::from(sample))
    }

    #[inline(always)]
    fn shr_to_i32(self, shift: u32) -> i32 {
        (self >> shift) as i32
    }
}

/// Returns true if a 32-bit accumulator cannot overflow for samples of `bits_per_sample` bits
/// predicted with `order` coefficients of `precision` bits.
///
/// Each product needs `bits_per_sample + precision - 1` bits, and the sum of `order` products a
/// further `ceil(log2(order))` bits.
pub fn narrow_accumulator_fits(bits_per_sample: u32, precision: u32, order: usize) -> bool {
    let log2_order = bit_width_u64((order as u64).saturating_sub(1));
    bits_per_sample + precision + log2_order <= 32
}

/// Returns an error if a block of `block_size` samples cannot be split into `2^partition_order`
/// equal partitions each holding at least `order` samples.
pub fn check_partitioning(block_size: usize, order: usize, partition_order: u32) -> Result<()> {
    if partition_order > MAX_PARTITION_ORDER {
        return invalid_param_error("residual: partition order out of range");
    }

    let n_partitions = 1usize << partition_order;

    if block_size % n_partitions != 0 {
        return invalid_param_error("residual: block size not divisible into partitions");
    }

    if block_size / n_partitions < order {
        return invalid_param_error("residual: partition smaller than the predictor order");
    }

    Ok(())
}

#[inline(always)]
fn predict<A: Accumulator>(coefs: &[i32], history: &[i32], shift: u32) -> i32 {
    // The most recent sample is multiplied by the first coefficient.
    coefs
        .iter()
        .zip(history.iter().rev())
        .fold(A::zero(), |acc, (&c, &s)| acc.mul_add(c, s))
        .shr_to_i32(shift)
}

fn compute_residual<A: Accumulator>(
    samples: &[i32],
    predictor: &QuantizedPredictor,
    residual: &mut [i32],
) {
    let coefs = predictor.coefs();
    let shift = predictor.shift();
    let order = coefs.len();

    for n in order..samples.len() {
        let pred = predict::<A>(coefs, &samples[n - order..n], shift);
        residual[n] = samples[n].wrapping_sub(pred);
    }
}

fn restore_samples<A: Accumulator>(
    residual: &[i32],
    predictor: &QuantizedPredictor,
    samples: &mut [i32],
) {
    let coefs = predictor.coefs();
    let shift = predictor.shift();
    let order = coefs.len();

    for n in order..residual.len() {
        let pred = predict::<A>(coefs, &samples[n - order..n], shift);
        samples[n] = residual[n].wrapping_add(pred);
    }
}

/// Computes the per-partition sums of the zig-zag mapped residual.
///
/// The block is split into `2^partition_order` equal partitions. The first `order` samples are
/// warm-up and are excluded from the first partition.
pub fn partition_sums(
    residual: &[i32],
    order: usize,
    partition_order: u32,
    sums: &mut [u64],
) -> Result<()> {
    check_partitioning(residual.len(), order, partition_order)?;

    let n_partitions = 1usize << partition_order;

    if sums.len() < n_partitions {
        return invalid_param_error("residual: partition sums buffer too small");
    }

    let part_len = residual.len() / n_partitions;

    for (p, (sum, part)) in sums.iter_mut().zip(residual.chunks_exact(part_len)).enumerate() {
        let skip = if p == 0 { order } else { 0 };

        *sum = part[skip..].iter().map(|&r| u64::from(zigzag_encode_i32(r))).sum();
    }

    Ok(())
}

/// Computes the residual of a block predicted by `predictor`, and the per-partition sums of the
/// zig-zag mapped residual.
///
/// The first `order` entries of `residual` are the warm-up samples copied verbatim. Each following
/// entry is `samples[n] - (Σ coefs[j]·samples[n - 1 - j] >> shift)`. A 32-bit accumulator is used
/// when it cannot overflow for `bits_per_sample`-bit samples, otherwise a 64-bit accumulator.
pub fn encode_residual(
    samples: &[i32],
    predictor: &QuantizedPredictor,
    bits_per_sample: u32,
    partition_order: u32,
    residual: &mut [i32],
    sums: &mut [u64],
) -> Result<()> {
    let order = predictor.order();

    if residual.len() != samples.len() {
        return invalid_param_error("residual: residual and block lengths differ");
    }

    check_partitioning(samples.len(), order, partition_order)?;

    residual[..order].copy_from_slice(&samples[..order]);

    if narrow_accumulator_fits(bits_per_sample, predictor.precision(), order) {
        compute_residual::<i32>(samples, predictor, residual);
    }
    else {
        compute_residual::<i64>(samples, predictor, residual);
    }

    partition_sums(residual, order, partition_order, sums)
}

/// Reconstructs a block from its residual. The exact inverse of [`encode_residual`].
pub fn decode_residual(
    residual: &[i32],
    predictor: &QuantizedPredictor,
    bits_per_sample: u32,
    samples: &mut [i32],
) -> Result<()> {
    let order = predictor.order();

    if residual.len() != samples.len() {
        return invalid_param_error("residual: residual and block lengths differ");
    }

    if residual.len() < order {
        return invalid_param_error("residual: block shorter than the predictor order");
    }

    samples[..order].copy_from_slice(&residual[..order]);

    if narrow_accumulator_fits(bits_per_sample, predictor.precision(), order) {
        restore_samples::<i32>(residual, predictor, samples);
    }
    else {
        restore_samples::<i64>(residual, predictor, samples);
    }

    Ok(())
}
