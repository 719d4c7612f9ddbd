// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Linear-predictive analysis and residual coding for lossless audio.
//!
//! A block of integer samples is analyzed with one or more windows. Each window is split into
//! sections so that the windowed autocorrelation can be computed exactly where the window is
//! unity, skipped where it is zero, and shared between windows where they agree. Predictors of
//! every order are derived from the autocorrelation with the Schur recursion, ranked by an
//! Akaike-style criterion, quantized, and trial encoded. The cheapest candidate is kept.
//!
//! The entry points are [`encode_lpc_subframe`] for a single channel and [`analyze_channels`]
//! for all channels of a block. [`write_lpc_subframe`] and [`read_lpc_subframe`] pack and unpack
//! an analyzed subframe.

pub mod analysis;
pub mod autocorr;
pub mod lpc;
pub mod options;
pub mod residual;
pub mod rice;
pub mod section;
pub mod subframe;
pub mod window;

pub use analysis::analyze_channels;
pub use lpc::{LpcContext, QuantizedPredictor};
pub use options::LpcOptions;
pub use subframe::{
    encode_lpc_subframe, encode_lpc_subframe_with_abort, read_lpc_subframe, write_lpc_subframe,
    LpcSubframe,
};
pub use window::WindowKind;
