// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rice parameter selection and partitioned residual coding.
//!
//! A partitioned residual is coded as a 4-bit partition order followed by, for each of the
//! `2^order` partitions, a 5-bit Rice parameter and the Rice coded residual of the partition. The
//! warm-up samples at the start of the first partition are not part of the residual.

use log::trace;

use cantus_core::errors::{capacity_error, decode_error, invalid_param_error, Result};
use cantus_core::io::{ReadBitsLtr, WriteBitsLtr};

use crate::residual::{check_partitioning, MAX_PARTITION_ORDER};

/// The maximum Rice parameter.
pub const MAX_RICE_PARAM: u32 = 30;

const PARTITION_ORDER_BITS: u32 = 4;
const RICE_PARAM_BITS: u32 = 5;

/// Estimates the number of bits needed to Rice code `n` values, whose zig-zag mapped sum is `sum`,
/// with the Rice parameter `k`.
#[inline]
pub fn rice_bits(sum: u64, n: usize, k: u32) -> u64 {
    (n as u64) * (u64::from(k) + 1) + (sum >> k)
}

/// Returns the Rice parameter, not exceeding `max_param`, that minimizes [`rice_bits`].
pub fn optimal_rice_param(sum: u64, n: usize, max_param: u32) -> u32 {
    if n == 0 {
        return 0;
    }

    let mut best = 0;
    let mut best_bits = rice_bits(sum, n, 0);

    for k in 1..=max_param.min(MAX_RICE_PARAM) {
        let bits = rice_bits(sum, n, k);

        // The estimate is convex in k.
        if bits >= best_bits {
            break;
        }

        best = k;
        best_bits = bits;
    }

    best
}

/// Merges the partition sums of one partition order into the sums of the next lower order.
pub fn merge_partition_sums(sums: &[u64]) -> Vec<u64> {
    sums.chunks_exact(2).map(|pair| pair[0] + pair[1]).collect()
}

/// The partition order and the Rice parameter of each partition of a residual.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RicePartitioning {
    /// The partition order. The residual is split into `2^order` partitions.
    pub order: u32,
    /// The Rice parameter of each partition.
    pub params: Vec<u32>,
    /// The estimated size of the coded residual in bits, including the partition order and
    /// parameters.
    pub bits: u64,
}

/// Finds the partition order within `min_order..=max_order`, and the Rice parameter of each
/// partition, with the smallest estimated size.
///
/// `sums` are the zig-zag residual sums of the `2^max_order` partitions of a block of `block_size`
/// samples predicted with a `predictor_order` predictor. Lower orders are evaluated by merging
/// neighbouring sums. Ties are resolved in favour of the lower partition order.
pub fn best_partitioning(
    sums: &[u64],
    block_size: usize,
    predictor_order: usize,
    min_order: u32,
    max_order: u32,
    max_param: u32,
) -> Result<RicePartitioning> {
    if min_order > max_order {
        return invalid_param_error("rice: invalid partition order range");
    }

    if max_param > MAX_RICE_PARAM {
        return invalid_param_error("rice: rice parameter out of range");
    }

    check_partitioning(block_size, predictor_order, max_order)?;

    if sums.len() != 1 << max_order {
        return invalid_param_error("rice: partition sums do not match the partition order");
    }

    let mut level = sums.to_vec();

    let mut best: Option<RicePartitioning> = None;

    for order in (min_order..=max_order).rev() {
        let part_len = block_size >> order;

        let mut params = Vec::with_capacity(level.len());
        let mut bits = u64::from(PARTITION_ORDER_BITS);

        for (p, &sum) in level.iter().enumerate() {
            let n = if p == 0 { part_len - predictor_order } else { part_len };

            let k = optimal_rice_param(sum, n, max_param);

            bits += u64::from(RICE_PARAM_BITS) + rice_bits(sum, n, k);
            params.push(k);
        }

        if best.as_ref().map_or(true, |b| bits <= b.bits) {
            best = Some(RicePartitioning { order, params, bits });
        }

        if order > min_order {
            level = merge_partition_sums(&level);
        }
    }

    match best {
        Some(partitioning) => {
            trace!(
                "rice: partition order {} estimated at {} bits",
                partitioning.order,
                partitioning.bits
            );
            Ok(partitioning)
        }
        None => invalid_param_error("rice: no partition order evaluated"),
    }
}

/// Writes a partitioned residual.
///
/// The first `predictor_order` entries of `residual` are warm-up samples and are skipped. Returns
/// a capacity error if the writer ran out of space.
pub fn write_partitioned_residual<W: WriteBitsLtr>(
    writer: &mut W,
    residual: &[i32],
    predictor_order: usize,
    partitioning: &RicePartitioning,
) -> Result<()> {
    let order = partitioning.order;

    check_partitioning(residual.len(), predictor_order, order)?;

    if partitioning.params.len() != 1 << order {
        return invalid_param_error("rice: parameter count does not match the partition order");
    }

    if partitioning.params.iter().any(|&k| k > MAX_RICE_PARAM) {
        return invalid_param_error("rice: rice parameter out of range");
    }

    writer.write_bits_leq32(PARTITION_ORDER_BITS, order);

    let part_len = residual.len() >> order;

    for (p, (part, &k)) in residual.chunks_exact(part_len).zip(&partitioning.params).enumerate() {
        let skip = if p == 0 { predictor_order } else { 0 };

        writer.write_bits_leq32(RICE_PARAM_BITS, k);
        writer.write_rice_block_signed(k, &part[skip..]);
    }

    if writer.is_full() {
        return capacity_error();
    }

    Ok(())
}

/// Reads a partitioned residual into `residual`, leaving the first `predictor_order` entries
/// untouched. Returns the partition order.
pub fn read_partitioned_residual<R: ReadBitsLtr>(
    reader: &mut R,
    predictor_order: usize,
    residual: &mut [i32],
) -> Result<u32> {
    let order = reader.read_bits_leq32(PARTITION_ORDER_BITS)?;

    if order > MAX_PARTITION_ORDER
        || check_partitioning(residual.len(), predictor_order, order).is_err()
    {
        return decode_error("rice: invalid partition order for the block");
    }

    let part_len = residual.len() >> order;

    for (p, part) in residual.chunks_exact_mut(part_len).enumerate() {
        let skip = if p == 0 { predictor_order } else { 0 };

        let k = reader.read_bits_leq32(RICE_PARAM_BITS)?;

        if k > MAX_RICE_PARAM {
            return decode_error("rice: invalid rice parameter");
        }

        reader.read_rice_block(k, &mut part[skip..])?;
    }

    Ok(order)
}
