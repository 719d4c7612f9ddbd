// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cantus_core::errors::{invalid_param_error, Result};

use crate::lpc::{MAX_LPC_ORDER, MAX_LPC_SHIFT, MIN_LPC_PRECISION};
use crate::rice::MAX_RICE_PARAM;
use crate::window::WindowKind;

/// The maximum coefficient precision that may be requested for analysis.
pub const MAX_OPTIONS_PRECISION: u32 = 15;

/// The maximum partition order searched during analysis.
pub const MAX_OPTIONS_PARTITION_ORDER: u32 = 8;

/// `LpcOptions` is the set of tuning parameters used to analyze and encode a block.
#[derive(Clone, Debug, PartialEq)]
pub struct LpcOptions {
    /// The lowest predictor order considered.
    pub min_order: usize,
    /// The highest predictor order considered. Clamped to the block size.
    pub max_order: usize,
    /// The number of bits of each quantized coefficient.
    pub precision: u32,
    /// The largest quantization shift.
    pub max_shift: u32,
    /// The shift stored with a predictor whose coefficients all quantize to zero.
    pub zero_shift: u32,
    /// The lowest Rice partition order considered.
    pub min_partition_order: u32,
    /// The highest Rice partition order considered. Lowered as needed to fit the block.
    pub max_partition_order: u32,
    /// The largest Rice parameter.
    pub max_rice_param: u32,
    /// The linear weight of the order penalty when ranking orders.
    pub akaike_alpha: f64,
    /// The quadratic weight of the order penalty when ranking orders.
    pub akaike_beta: f64,
    /// The number of best ranked orders of each window that are trial encoded.
    pub orders_to_search: usize,
    /// The candidate analysis windows.
    pub windows: Vec<WindowKind>,
    /// The width of a sample in bits.
    pub bits_per_sample: u32,
}

impl Default for LpcOptions {
    fn default() -> Self {
        LpcOptions {
            min_order: 1,
            max_order: 12,
            precision: 15,
            max_shift: 15,
            zero_shift: 0,
            min_partition_order: 0,
            max_partition_order: 6,
            max_rice_param: MAX_RICE_PARAM,
            akaike_alpha: 1.0,
            akaike_beta: 0.0,
            orders_to_search: 3,
            windows: vec![
                WindowKind::Tukey { p: 0.5 },
                WindowKind::PunchoutTukey { p: 0.5, start: 0.25, end: 0.75 },
            ],
            bits_per_sample: 16,
        }
    }
}

impl LpcOptions {
    /// Returns an error if any option is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.min_order < 1 || self.max_order > MAX_LPC_ORDER || self.min_order > self.max_order {
            return invalid_param_error("options: invalid predictor order range");
        }

        if self.precision < MIN_LPC_PRECISION || self.precision > MAX_OPTIONS_PRECISION {
            return invalid_param_error("options: coefficient precision out of range");
        }

        if self.max_shift > MAX_LPC_SHIFT || self.zero_shift > MAX_LPC_SHIFT {
            return invalid_param_error("options: quantization shift out of range");
        }

        if self.min_partition_order > self.max_partition_order
            || self.max_partition_order > MAX_OPTIONS_PARTITION_ORDER
        {
            return invalid_param_error("options: invalid partition order range");
        }

        if self.max_rice_param > MAX_RICE_PARAM {
            return invalid_param_error("options: rice parameter out of range");
        }

        if !self.akaike_alpha.is_finite() || !self.akaike_beta.is_finite() {
            return invalid_param_error("options: akaike weights must be finite");
        }

        if self.orders_to_search == 0 {
            return invalid_param_error("options: at least one order must be searched");
        }

        if self.windows.is_empty() {
            return invalid_param_error("options: at least one window is required");
        }

        for window in self.windows.iter() {
            window.validate()?;
        }

        if self.bits_per_sample < 1 || self.bits_per_sample > 32 {
            return invalid_param_error("options: bits per sample out of range");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_default_is_valid() {
        assert!(LpcOptions::default().validate().is_ok());
    }

    #[test]
    fn verify_validate() {
        let check = |f: fn(&mut LpcOptions)| {
            let mut options = LpcOptions::default();
            f(&mut options);
            options.validate()
        };

        assert!(check(|o| o.min_order = 0).is_err());
        assert!(check(|o| o.max_order = 33).is_err());
        assert!(check(|o| o.min_order = 13).is_err());
        assert!(check(|o| o.precision = 1).is_err());
        assert!(check(|o| o.precision = 16).is_err());
        assert!(check(|o| o.max_shift = 31).is_err());
        assert!(check(|o| o.zero_shift = 31).is_err());
        assert!(check(|o| o.min_partition_order = 7).is_err());
        assert!(check(|o| o.max_partition_order = 9).is_err());
        assert!(check(|o| o.max_rice_param = 31).is_err());
        assert!(check(|o| o.akaike_alpha = f64::NAN).is_err());
        assert!(check(|o| o.orders_to_search = 0).is_err());
        assert!(check(|o| o.windows.clear()).is_err());
        assert!(check(|o| o.windows.push(WindowKind::Tukey { p: 1.5 })).is_err());
        assert!(check(|o| o.bits_per_sample = 0).is_err());
        assert!(check(|o| o.bits_per_sample = 33).is_err());

        assert!(check(|o| {
            o.min_order = 32;
            o.max_order = 32;
            o.precision = 2;
            o.bits_per_sample = 32;
        })
        .is_ok());
    }
}
