// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Linear predictor estimation.
//!
//! The predictor of each analysis window is found in four steps:
//!
//! 1. The autocorrelation of the windowed block is computed section by section.
//! 2. Schur recursion derives the reflection coefficients, and the prediction error of every order,
//!    in a single pass.
//! 3. The reflection coefficients are converted to direct-form coefficients for every order.
//! 4. The candidate orders are ranked by an Akaike-style criterion, and the coefficients of the
//!    chosen orders are quantized to fixed-point.

use log::{trace, warn};

use cantus_core::errors::{invalid_param_error, Result};

use crate::autocorr::LpcSubframeInfo;
use crate::section::Section;

/// The maximum predictor order.
pub const MAX_LPC_ORDER: usize = 32;

/// The minimum quantized coefficient precision in bits.
pub const MIN_LPC_PRECISION: u32 = 2;

/// The maximum quantized coefficient precision in bits.
pub const MAX_LPC_PRECISION: u32 = 16;

/// The maximum quantization shift.
pub const MAX_LPC_SHIFT: u32 = 30;

/// A fixed-point linear predictor.
///
/// The prediction of sample `n` is `Σ coefs[j]·s[n - 1 - j] >> shift`. Every coefficient fits a
/// signed integer of `precision` bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QuantizedPredictor {
    coefs: [i32; MAX_LPC_ORDER],
    order: usize,
    precision: u32,
    shift: u32,
}

impl QuantizedPredictor {
    /// Instantiate a predictor from quantized coefficients.
    pub fn new(coefs: &[i32], precision: u32, shift: u32) -> Result<Self> {
        validate_order(coefs.len())?;
        validate_precision(precision)?;

        if shift > MAX_LPC_SHIFT {
            return invalid_param_error("lpc: shift out of range");
        }

        let qmax = (1i32 << (precision - 1)) - 1;

        if coefs.iter().any(|&c| c > qmax || c < -qmax - 1) {
            return invalid_param_error("lpc: coefficient exceeds the precision");
        }

        let mut predictor =
            QuantizedPredictor { coefs: [0; MAX_LPC_ORDER], order: coefs.len(), precision, shift };

        predictor.coefs[..coefs.len()].copy_from_slice(coefs);

        Ok(predictor)
    }

    /// Gets the predictor order.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Gets the coefficient precision in bits.
    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Gets the right shift applied to the prediction.
    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Gets the quantized coefficients. The coefficient at index `j` weights the sample `j + 1`
    /// positions before the predicted one.
    pub fn coefs(&self) -> &[i32] {
        &self.coefs[..self.order]
    }

    /// Returns true if every coefficient is 0 (no prediction).
    pub fn is_zero(&self) -> bool {
        self.coefs().iter().all(|&c| c == 0)
    }

    /// Gets the coefficients converted back to floating-point.
    pub fn dequantized(&self) -> Vec<f64> {
        let scale = 2f64.powi(-(self.shift as i32));
        self.coefs().iter().map(|&c| f64::from(c) * scale).collect()
    }
}

fn validate_order(order: usize) -> Result<()> {
    if order < 1 || order > MAX_LPC_ORDER {
        return invalid_param_error("lpc: order must be within [1, 32]");
    }
    Ok(())
}

fn validate_precision(precision: u32) -> Result<()> {
    if precision < MIN_LPC_PRECISION || precision > MAX_LPC_PRECISION {
        return invalid_param_error("lpc: precision must be within [2, 16]");
    }
    Ok(())
}

/// Quantizes floating-point predictor coefficients.
///
/// The largest shift not exceeding `max_shift` that keeps the largest coefficient within the
/// precision is chosen. If even a shift of 0 overflows, the coefficients are scaled down to fit.
/// If the largest coefficient would quantize to 0 at `max_shift`, an all-zero predictor with a
/// shift of `zero_shift` is returned.
///
/// Rounding errors are fed forward into the next coefficient so that the accumulated error of the
/// quantized predictor stays bounded.
pub fn quantize(
    coefs: &[f64],
    precision: u32,
    max_shift: u32,
    zero_shift: u32,
) -> Result<QuantizedPredictor> {
    validate_order(coefs.len())?;
    validate_precision(precision)?;

    if max_shift > MAX_LPC_SHIFT || zero_shift > MAX_LPC_SHIFT {
        return invalid_param_error("lpc: shift out of range");
    }

    let cmax = coefs.iter().fold(0.0f64, |max, c| max.max(c.abs()));

    if !cmax.is_finite() {
        return invalid_param_error("lpc: coefficients must be finite");
    }

    let mut predictor = QuantizedPredictor {
        coefs: [0; MAX_LPC_ORDER],
        order: coefs.len(),
        precision,
        shift: zero_shift,
    };

    if cmax * 2f64.powi(max_shift as i32) < 1.0 {
        trace!("lpc: coefficients underflow, using the zero predictor");
        return Ok(predictor);
    }

    let qmax = (1i32 << (precision - 1)) - 1;

    let mut shift = max_shift;

    while shift > 0 && cmax * 2f64.powi(shift as i32) > f64::from(qmax) {
        shift -= 1;
    }

    let mut scale = 2f64.powi(shift as i32);

    if shift == 0 && cmax > f64::from(qmax) {
        warn!("lpc: rescaling coefficients with magnitude {} to fit {} bits", cmax, precision);
        scale = f64::from(qmax) / cmax;
    }

    let mut error = 0.0;

    for (q, &c) in predictor.coefs.iter_mut().zip(coefs) {
        error += c * scale;

        let rounded = error.round().clamp(f64::from(-qmax - 1), f64::from(qmax));

        *q = rounded as i32;
        error -= rounded;
    }

    predictor.shift = shift;

    Ok(predictor)
}

/// Runs Schur recursion over `autocorr[0..=order]`, where `order = reflection.len()`.
///
/// Writes the reflection coefficients and the prediction error after each order. An all-zero
/// autocorrelation, or a prediction error that stops being positive, yields zero reflection
/// coefficients for the remaining orders.
pub fn schur(autocorr: &[f64], reflection: &mut [f64], error: &mut [f64]) {
    let order = reflection.len();

    debug_assert!(autocorr.len() > order && error.len() >= order);

    let mut gen0 = [0.0; MAX_LPC_ORDER];
    let mut gen1 = [0.0; MAX_LPC_ORDER];

    gen0[..order].copy_from_slice(&autocorr[1..=order]);
    gen1[..order].copy_from_slice(&autocorr[1..=order]);

    let mut err = autocorr[0];

    for i in 0..order {
        if i > 0 {
            let r = reflection[i - 1];

            // Ascending j reads gen1[j + 1] before it is overwritten.
            for j in 0..order - i {
                gen1[j] = gen1[j + 1] + r * gen0[j];
                gen0[j] = gen1[j + 1] * r + gen0[j];
            }
        }

        if err <= 0.0 || err.is_nan() {
            reflection[i..].fill(0.0);
            error[i..order].fill(err.max(0.0));
            return;
        }

        reflection[i] = -gen1[0] / err;
        err += gen1[0] * reflection[i];
        error[i] = err;
    }
}

/// Converts reflection coefficients to direct-form predictor coefficients for every order.
///
/// `lpc[k]` receives the `k + 1` coefficients of the order `k + 1` predictor.
fn reflection_to_lpc(reflection: &[f64], lpc: &mut [[f64; MAX_LPC_ORDER]]) {
    let mut a = [0.0; MAX_LPC_ORDER];

    for (i, &r) in reflection.iter().enumerate() {
        // Step-up the order i polynomial to order i + 1, folded around its midpoint.
        for j in 0..i / 2 {
            let tmp = a[j];
            a[j] += r * a[i - 1 - j];
            a[i - 1 - j] += r * tmp;
        }

        if i & 1 == 1 {
            a[i / 2] += a[i / 2] * r;
        }

        a[i] = r;

        for (c, &aj) in lpc[i].iter_mut().zip(&a[..=i]) {
            *c = -aj;
        }
    }
}

/// `LpcContext` holds the predictor estimation state of one analysis window.
///
/// Each stage is computed up-to the highest order requested so far. Requests for a lower order are
/// served from the existing results, and requests for a higher order extend them.
pub struct LpcContext {
    autocorr: [f64; MAX_LPC_ORDER + 1],
    n_autocorr: usize,
    reflection: [f64; MAX_LPC_ORDER],
    prediction_error: [f64; MAX_LPC_ORDER],
    n_reflection: usize,
    lpc: [[f64; MAX_LPC_ORDER]; MAX_LPC_ORDER],
    n_lpc: usize,
    best_orders: [usize; MAX_LPC_ORDER],
    n_best: usize,
}

impl Default for LpcContext {
    fn default() -> Self {
        LpcContext {
            autocorr: [0.0; MAX_LPC_ORDER + 1],
            n_autocorr: 0,
            reflection: [0.0; MAX_LPC_ORDER],
            prediction_error: [0.0; MAX_LPC_ORDER],
            n_reflection: 0,
            lpc: [[0.0; MAX_LPC_ORDER]; MAX_LPC_ORDER],
            n_lpc: 0,
            best_orders: [0; MAX_LPC_ORDER],
            n_best: 0,
        }
    }
}

impl LpcContext {
    /// Instantiate a new, empty `LpcContext`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Discards all results, preparing the context for an unrelated block or window.
    pub fn reset(&mut self) {
        self.n_autocorr = 0;
        self.n_reflection = 0;
        self.n_lpc = 0;
        self.n_best = 0;
    }

    /// Gets the autocorrelation computed so far.
    pub fn autocorr(&self) -> &[f64] {
        &self.autocorr[..self.n_autocorr]
    }

    /// Gets the reflection coefficients computed so far.
    pub fn reflection(&self) -> &[f64] {
        &self.reflection[..self.n_reflection]
    }

    /// Gets the prediction error after each order computed so far.
    pub fn prediction_error(&self) -> &[f64] {
        &self.prediction_error[..self.n_reflection]
    }

    /// Gets the direct-form coefficients of the predictor of the given order, if computed.
    pub fn coefs(&self, order: usize) -> Option<&[f64]> {
        if order >= 1 && order <= self.n_lpc {
            Some(&self.lpc[order - 1][..order])
        }
        else {
            None
        }
    }

    /// Gets the orders ranked by the last call to [`LpcContext::rank_orders_by_akaike`].
    pub fn best_orders(&self) -> &[usize] {
        &self.best_orders[..self.n_best]
    }

    /// Computes the reflection coefficients and prediction errors up-to `order`.
    ///
    /// Missing autocorrelation lags are computed from the window's sections. Sections with a shared
    /// id are served from, or added to, `info`. The sections must have been detected with a maximum
    /// order of at least `order`.
    pub fn compute_reflection(
        &mut self,
        order: usize,
        samples: &[i32],
        window: &[f64],
        sections: &[Section],
        info: &mut LpcSubframeInfo,
    ) -> Result<()> {
        validate_order(order)?;

        if samples.len() != window.len() {
            return invalid_param_error("lpc: window and block lengths differ");
        }

        if order <= self.n_reflection {
            trace!("lpc: reflection coefficients up-to order {} are cached", self.n_reflection);
            return Ok(());
        }

        if self.n_autocorr <= order {
            let from = self.n_autocorr;

            self.autocorr[from..=order].fill(0.0);

            info.accumulate(sections, samples, window, from, order, &mut self.autocorr);

            self.n_autocorr = order + 1;
        }

        schur(
            &self.autocorr[..=order],
            &mut self.reflection[..order],
            &mut self.prediction_error[..order],
        );

        self.n_reflection = order;

        Ok(())
    }

    /// Computes the direct-form coefficients of every order up-to `max_order`.
    pub fn compute_lpc(&mut self, max_order: usize) -> Result<()> {
        validate_order(max_order)?;

        if max_order > self.n_reflection {
            return invalid_param_error("lpc: reflection coefficients not computed for the order");
        }

        if max_order > self.n_lpc {
            reflection_to_lpc(&self.reflection[..max_order], &mut self.lpc);
            self.n_lpc = max_order;
        }

        Ok(())
    }

    /// Ranks the orders `min_order..=max_order` in ascending order of their Akaike-style score,
    /// `n·ln(error) + ln(n)·order·(alpha + beta·order)`, where `n` is the block size.
    ///
    /// Orders with equal scores keep their ascending order.
    pub fn rank_orders_by_akaike(
        &mut self,
        block_size: usize,
        min_order: usize,
        max_order: usize,
        alpha: f64,
        beta: f64,
    ) -> Result<&[usize]> {
        validate_order(min_order)?;
        validate_order(max_order)?;

        if min_order > max_order || max_order > self.n_reflection {
            return invalid_param_error("lpc: invalid order range for ranking");
        }

        if block_size == 0 {
            return invalid_param_error("lpc: block size must be non-zero");
        }

        let n = block_size as f64;
        let ln_n = n.ln();

        let mut scores = [0.0; MAX_LPC_ORDER];

        for (idx, order) in (min_order..=max_order).enumerate() {
            let error = self.prediction_error[order - 1].max(f64::MIN_POSITIVE);

            let k = order as f64;
            let score = n * error.ln() + ln_n * k * (alpha + beta * k);

            // Insertion sort. Strict comparison keeps equal scores in ascending order.
            let mut j = idx;

            while j > 0 && scores[j - 1] > score {
                scores[j] = scores[j - 1];
                self.best_orders[j] = self.best_orders[j - 1];
                j -= 1;
            }

            scores[j] = score;
            self.best_orders[j] = order;
        }

        self.n_best = max_order - min_order + 1;

        Ok(self.best_orders())
    }

    /// Quantizes the coefficients of the predictor of the given order.
    pub fn quantize(
        &self,
        order: usize,
        precision: u32,
        max_shift: u32,
        zero_shift: u32,
    ) -> Result<QuantizedPredictor> {
        match self.coefs(order) {
            Some(coefs) => quantize(coefs, precision, max_shift, zero_shift),
            None => invalid_param_error("lpc: coefficients not computed for the order"),
        }
    }
}
