// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The LPC subframe: analysis, packing, and unpacking of one channel of a block.
//!
//! A packed subframe consists of:
//!
//! | Field             | Width                        |
//! |-------------------|------------------------------|
//! | order - 1         | 5 bits                       |
//! | precision - 1     | 4 bits                       |
//! | shift             | 5 bits                       |
//! | coefficients      | `order` × `precision` bits   |
//! | warm-up samples   | `order` × `bits_per_sample`  |
//! | residual          | partitioned Rice code        |

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace};

use cantus_core::errors::{decode_error, invalid_param_error, Result};
use cantus_core::io::{ReadBitsLtr, WriteBitsLtr};

use crate::autocorr::LpcSubframeInfo;
use crate::lpc::{LpcContext, QuantizedPredictor, MAX_LPC_ORDER, MAX_LPC_SHIFT, MIN_LPC_PRECISION};
use crate::options::LpcOptions;
use crate::residual::{check_partitioning, decode_residual, encode_residual};
use crate::rice::{
    best_partitioning, read_partitioned_residual, write_partitioned_residual, RicePartitioning,
};
use crate::section::detect_sections;
use crate::window::compute_window;

const ORDER_BITS: u32 = 5;
const PRECISION_BITS: u32 = 4;
const SHIFT_BITS: u32 = 5;

const HEADER_BITS: u64 = (ORDER_BITS + PRECISION_BITS + SHIFT_BITS) as u64;

/// An analyzed LPC subframe.
#[derive(Clone, Debug, PartialEq)]
pub struct LpcSubframe {
    /// The quantized predictor.
    pub predictor: QuantizedPredictor,
    /// The warm-up samples followed by the prediction residual.
    pub residual: Vec<i32>,
    /// The Rice partitioning of the residual.
    pub partitioning: RicePartitioning,
    /// The index of the analysis window the predictor was estimated with.
    pub window: usize,
    /// The width of a sample in bits.
    pub bits_per_sample: u32,
    /// The estimated size of the packed subframe in bits. Never less than the packed size.
    pub bits: u64,
}

impl LpcSubframe {
    /// Gets the number of samples in the subframe.
    pub fn len(&self) -> usize {
        self.residual.len()
    }

    /// Returns true if the subframe holds no samples.
    pub fn is_empty(&self) -> bool {
        self.residual.is_empty()
    }
}

fn check_samples(samples: &[i32], bits_per_sample: u32) -> Result<()> {
    if bits_per_sample < 32 {
        let max = (1i32 << (bits_per_sample - 1)) - 1;
        let min = -max - 1;

        if samples.iter().any(|&s| s < min || s > max) {
            return invalid_param_error("subframe: sample exceeds the bits per sample");
        }
    }

    Ok(())
}

/// Returns the highest partition order, at most `max_order`, that can partition the block.
fn feasible_partition_order(block_size: usize, predictor_order: usize, max_order: u32) -> u32 {
    let mut order = max_order;

    while order > 0 && check_partitioning(block_size, predictor_order, order).is_err() {
        order -= 1;
    }

    order
}

/// Analyzes a block of samples and returns the LPC subframe with the smallest estimated size.
pub fn encode_lpc_subframe(samples: &[i32], options: &LpcOptions) -> Result<LpcSubframe> {
    encode_lpc_subframe_with_abort(samples, options, None)
}

/// Analyzes a block of samples like [`encode_lpc_subframe`], stopping early if `abort` is raised.
///
/// The flag is checked before each candidate order is trial encoded. Once raised, the best
/// subframe found so far is returned. At least one candidate is always encoded.
pub fn encode_lpc_subframe_with_abort(
    samples: &[i32],
    options: &LpcOptions,
    abort: Option<&AtomicBool>,
) -> Result<LpcSubframe> {
    options.validate()?;

    if samples.is_empty() {
        return invalid_param_error("subframe: block is empty");
    }

    let bps = options.bits_per_sample;

    check_samples(samples, bps)?;

    let n = samples.len();

    let max_order = options.max_order.min(n);
    let min_order = options.min_order.min(max_order);

    let windows: Vec<Vec<f64>> =
        options.windows.iter().map(|&kind| compute_window(kind, n)).collect();

    let sections = detect_sections(&windows, bps, max_order)?;

    let mut info = LpcSubframeInfo::new();
    let mut ctx = LpcContext::new();

    let max_partition_order = feasible_partition_order(n, 0, options.max_partition_order);

    let mut residual = vec![0; n];
    let mut sums = vec![0; 1 << max_partition_order];

    let mut best: Option<LpcSubframe> = None;

    'windows: for (w, (window, sections)) in windows.iter().zip(sections.iter()).enumerate() {
        ctx.reset();
        ctx.compute_reflection(max_order, samples, window, sections, &mut info)?;
        ctx.compute_lpc(max_order)?;

        let ranked = ctx.rank_orders_by_akaike(
            n,
            min_order,
            max_order,
            options.akaike_alpha,
            options.akaike_beta,
        )?;

        let mut candidates = [0; MAX_LPC_ORDER];
        let n_candidates = ranked.len().min(options.orders_to_search);
        candidates[..n_candidates].copy_from_slice(&ranked[..n_candidates]);

        for &order in candidates[..n_candidates].iter() {
            if best.is_some() && abort.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                debug!("subframe: analysis aborted before window {} order {}", w, order);
                break 'windows;
            }

            let predictor =
                ctx.quantize(order, options.precision, options.max_shift, options.zero_shift)?;

            let po_max = feasible_partition_order(n, order, max_partition_order);
            let po_min = options.min_partition_order.min(po_max);

            let sums = &mut sums[..1 << po_max];

            encode_residual(samples, &predictor, bps, po_max, &mut residual, sums)?;

            let partitioning =
                best_partitioning(sums, n, order, po_min, po_max, options.max_rice_param)?;

            let bits = HEADER_BITS
                + (order as u64) * u64::from(predictor.precision() + bps)
                + partitioning.bits;

            trace!("subframe: window {} order {} estimated at {} bits", w, order, bits);

            if best.as_ref().map_or(true, |b| bits < b.bits) {
                best = Some(LpcSubframe {
                    predictor,
                    residual: residual.clone(),
                    partitioning,
                    window: w,
                    bits_per_sample: bps,
                    bits,
                });
            }
        }
    }

    match best {
        Some(subframe) => {
            debug!(
                "subframe: order={} shift={} partition_order={} window={} bits={}",
                subframe.predictor.order(),
                subframe.predictor.shift(),
                subframe.partitioning.order,
                subframe.window,
                subframe.bits
            );
            Ok(subframe)
        }
        None => invalid_param_error("subframe: no candidate order was evaluated"),
    }
}

/// Packs a subframe. Returns a capacity error if the writer ran out of space.
pub fn write_lpc_subframe<W: WriteBitsLtr>(writer: &mut W, subframe: &LpcSubframe) -> Result<()> {
    let predictor = &subframe.predictor;

    let order = predictor.order();
    let precision = predictor.precision();
    let bps = subframe.bits_per_sample;

    if bps < 1 || bps > 32 {
        return invalid_param_error("subframe: bits per sample out of range");
    }

    if subframe.residual.len() < order {
        return invalid_param_error("subframe: block shorter than the predictor order");
    }

    writer.write_bits_leq32(ORDER_BITS, (order - 1) as u32);
    writer.write_bits_leq32(PRECISION_BITS, precision - 1);
    writer.write_bits_leq32(SHIFT_BITS, predictor.shift());

    for &coef in predictor.coefs() {
        writer.write_bits_leq32_signed(precision, coef);
    }

    for &sample in subframe.residual[..order].iter() {
        writer.write_bits_leq32_signed(bps, sample);
    }

    write_partitioned_residual(writer, &subframe.residual, order, &subframe.partitioning)
}

/// Unpacks a subframe of `samples.len()` samples of `bits_per_sample` bits into `samples`.
///
/// Returns the predictor the subframe was coded with.
pub fn read_lpc_subframe<R: ReadBitsLtr>(
    reader: &mut R,
    bits_per_sample: u32,
    samples: &mut [i32],
) -> Result<QuantizedPredictor> {
    if bits_per_sample < 1 || bits_per_sample > 32 {
        return invalid_param_error("subframe: bits per sample out of range");
    }

    let order = reader.read_bits_leq32(ORDER_BITS)? as usize + 1;
    let precision = reader.read_bits_leq32(PRECISION_BITS)? + 1;
    let shift = reader.read_bits_leq32(SHIFT_BITS)?;

    if order > samples.len() {
        return decode_error("subframe: predictor order exceeds the block size");
    }

    if precision < MIN_LPC_PRECISION {
        return decode_error("subframe: invalid coefficient precision");
    }

    if shift > MAX_LPC_SHIFT {
        return decode_error("subframe: invalid quantization shift");
    }

    let mut coefs = [0; MAX_LPC_ORDER];

    for coef in coefs[..order].iter_mut() {
        *coef = reader.read_bits_leq32_signed(precision)?;
    }

    let predictor = QuantizedPredictor::new(&coefs[..order], precision, shift)
        .or_else(|_| decode_error("subframe: invalid predictor"))?;

    let mut residual = vec![0; samples.len()];

    for sample in residual[..order].iter_mut() {
        *sample = reader.read_bits_leq32_signed(bits_per_sample)?;
    }

    let partition_order = read_partitioned_residual(reader, order, &mut residual)?;

    debug!(
        "subframe: decoding order={} precision={} shift={} partition_order={}",
        order, precision, shift, partition_order
    );

    decode_residual(&residual, &predictor, bits_per_sample, samples)?;

    Ok(predictor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cantus_core::errors::Error;
    use cantus_core::io::{BitReaderLtr, BitWriterLtr};

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn sine(len: usize, amplitude: f64, period: f64) -> Vec<i32> {
        (0..len)
            .map(|i| (amplitude * (2.0 * std::f64::consts::PI * i as f64 / period).sin()) as i32)
            .collect()
    }

    fn pack(subframe: &LpcSubframe) -> Vec<u8> {
        let mut buf = vec![0; (subframe.bits / 8 + 8) as usize];

        let mut writer = BitWriterLtr::new(&mut buf);

        write_lpc_subframe(&mut writer, subframe).unwrap();

        assert!(writer.bits_written() <= subframe.bits);

        let len = writer.finish().unwrap();
        buf.truncate(len);
        buf
    }

    #[test]
    fn verify_sine_round_trip() {
        let samples = sine(4096, 20000.0, 91.3);

        let subframe = encode_lpc_subframe(&samples, &Default::default()).unwrap();

        assert_eq!(subframe.len(), samples.len());

        // A pure tone is predicted far better than its raw size.
        assert!(subframe.bits < 16 * 4096 / 2, "bits={}", subframe.bits);

        let buf = pack(&subframe);

        let mut decoded = vec![0; samples.len()];

        let predictor =
            read_lpc_subframe(&mut BitReaderLtr::new(&buf), 16, &mut decoded).unwrap();

        assert_eq!(predictor, subframe.predictor);
        assert_eq!(decoded, samples);
    }

    #[test]
    fn verify_noise_round_trip() {
        let mut rng = SmallRng::seed_from_u64(7);

        let samples: Vec<i32> =
            (0..1152).map(|_| rng.random_range(-(1 << 23)..(1 << 23))).collect();

        let options = LpcOptions { bits_per_sample: 24, max_order: 32, ..Default::default() };

        let subframe = encode_lpc_subframe(&samples, &options).unwrap();

        let buf = pack(&subframe);

        let mut decoded = vec![0; samples.len()];

        read_lpc_subframe(&mut BitReaderLtr::new(&buf), 24, &mut decoded).unwrap();

        assert_eq!(decoded, samples);
    }

    #[test]
    fn verify_short_blocks() {
        for len in 1..40 {
            let samples = sine(len, 1000.0, 7.0);

            let subframe = encode_lpc_subframe(&samples, &Default::default()).unwrap();

            assert!(subframe.predictor.order() <= len);

            let buf = pack(&subframe);

            let mut decoded = vec![0; len];

            read_lpc_subframe(&mut BitReaderLtr::new(&buf), 16, &mut decoded).unwrap();

            assert_eq!(decoded, samples);
        }
    }

    #[test]
    fn verify_zero_rice_param() {
        let mut rng = SmallRng::seed_from_u64(0);

        let mut acc = 0i32;
        let samples: Vec<i32> = (0..2048)
            .map(|_| {
                acc += rng.random_range(-8..=8);
                acc
            })
            .collect();

        let options = LpcOptions { max_rice_param: 0, bits_per_sample: 32, ..Default::default() };

        let subframe = encode_lpc_subframe(&samples, &options).unwrap();

        assert!(subframe.partitioning.params.iter().all(|&k| k == 0));

        let buf = pack(&subframe);

        let mut decoded = vec![0; samples.len()];

        read_lpc_subframe(&mut BitReaderLtr::new(&buf), 32, &mut decoded).unwrap();

        assert_eq!(decoded, samples);
    }

    #[test]
    fn verify_abort() {
        let samples = sine(4096, 20000.0, 50.0);

        let abort = AtomicBool::new(true);

        let options = LpcOptions { orders_to_search: 12, ..Default::default() };

        // The first candidate is always encoded.
        let subframe = encode_lpc_subframe_with_abort(&samples, &options, Some(&abort)).unwrap();

        assert_eq!(subframe.window, 0);

        let buf = pack(&subframe);

        let mut decoded = vec![0; samples.len()];

        read_lpc_subframe(&mut BitReaderLtr::new(&buf), 16, &mut decoded).unwrap();

        assert_eq!(decoded, samples);
    }

    #[test]
    fn verify_invalid_input() {
        let options = LpcOptions { bits_per_sample: 8, ..Default::default() };

        assert!(matches!(encode_lpc_subframe(&[], &options), Err(Error::InvalidParameter(_))));
        assert!(matches!(encode_lpc_subframe(&[128], &options), Err(Error::InvalidParameter(_))));
        assert!(matches!(encode_lpc_subframe(&[-129], &options), Err(Error::InvalidParameter(_))));
        assert!(encode_lpc_subframe(&[127, -128], &options).is_ok());
    }

    #[test]
    fn verify_malformed_header() {
        // Order 32 for a block of 8 samples.
        let buf = [0xf8, 0x00, 0x00, 0x00];

        let mut decoded = [0; 8];

        assert!(matches!(
            read_lpc_subframe(&mut BitReaderLtr::new(&buf), 16, &mut decoded),
            Err(Error::DecodeError(_))
        ));

        // Order 1, precision 1.
        let buf = [0x00, 0x00, 0x00, 0x00];

        assert!(matches!(
            read_lpc_subframe(&mut BitReaderLtr::new(&buf), 16, &mut decoded),
            Err(Error::DecodeError(_))
        ));

        // Order 1, precision 2, shift 31.
        let buf = [0b0000_0000, 0b1111_1100, 0x00, 0x00];

        assert!(matches!(
            read_lpc_subframe(&mut BitReaderLtr::new(&buf), 16, &mut decoded),
            Err(Error::DecodeError(_))
        ));

        // Truncated.
        let buf = [0b0000_0111];

        assert!(read_lpc_subframe(&mut BitReaderLtr::new(&buf), 16, &mut decoded).is_err());
    }
}
