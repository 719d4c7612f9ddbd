// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! # Project Cantus
//!
//! Cantus is a pure Rust core for lossless linear-predictive audio coding.
//!
//! # Crates
//!
//! | Crate              | Contents                                                      |
//! |--------------------|---------------------------------------------------------------|
//! | `cantus-core`      | Bit reader and writer, CRC-16, error types                    |
//! | `cantus-codec-lpc` | Windows, autocorrelation, predictor estimation, residual coding |
//!
//! # Features
//!
//! | Feature | Description                                   | Default |
//! |---------|-----------------------------------------------|---------|
//! | `par`   | Analyze the channels of a block in parallel   | No      |
//!
//! # Usage
//!
//! 1.  Fill an [`LpcOptions`][lpc::LpcOptions] with the sample width of the stream and any tuning
//!     of interest, or start from its `Default`.
//! 2.  Analyze each block with [`analyze_channels`][lpc::analyze_channels], or a single channel
//!     with [`encode_lpc_subframe`][lpc::encode_lpc_subframe].
//! 3.  Pack each subframe into a buffer with a [`BitWriterLtr`][core::io::BitWriterLtr] and
//!     [`write_lpc_subframe`][lpc::write_lpc_subframe]. Call `finish` on the writer to learn the
//!     number of bytes used.
//! 4.  Unpack with a [`BitReaderLtr`][core::io::BitReaderLtr] and
//!     [`read_lpc_subframe`][lpc::read_lpc_subframe].

pub use cantus_codec_lpc as lpc;
pub use cantus_core as core;
