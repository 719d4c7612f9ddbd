// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module implements bit-level reading and writing over fixed byte buffers.
//!
//! Both [`BitReaderLtr`] and [`BitWriterLtr`] operate most-significant bit first (big-endian bit
//! order), cache up-to 64 bits at a time, and keep a running CRC-16 of every byte that passes
//! through the cache.

mod bit;

pub use bit::{BitReaderLtr, BitWriterLtr, FiniteBitStream, ReadBitsLtr, WriteBitsLtr};

/// A `Monitor` provides a common interface to examine the bytes observed by a bit reader or
/// written by a bit writer.
pub trait Monitor {
    fn process_byte(&mut self, byte: u8);

    #[inline(always)]
    fn process_quad_bytes(&mut self, buf: [u8; 4]) {
        self.process_byte(buf[0]);
        self.process_byte(buf[1]);
        self.process_byte(buf[2]);
        self.process_byte(buf[3]);
    }

    fn process_buf_bytes(&mut self, buf: &[u8]);
}
