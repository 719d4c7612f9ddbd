// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `util` module provides a repository of commonly used utility functions sorted into distinct
//! categories.
//!
//! If a function is used all-over the codebase, and does not belong to specific top-level module,
//! it should be placed here.

pub mod bits {
    //! Utilities for bit manipulation.

    /// Sign extends an arbitrary, 32-bit or less, signed two's complement integer stored within an
    /// u32 to a full width i32.
    #[inline(always)]
    pub fn sign_extend_leq32_to_i32(value: u32, width: u32) -> i32 {
        // Rust uses an arithmetic shift right (the original sign bit is repeatedly shifted on) for
        // signed integer types. Therefore, shift the value to the right-hand side of the integer,
        // then shift it back to extend the sign bit.
        (value.wrapping_shl(32 - width) as i32).wrapping_shr(32 - width)
    }

    /// Returns a mask with the lower `width` bits set. A width of 32 yields all ones.
    #[inline(always)]
    pub fn mask_lower_u32(width: u32) -> u32 {
        debug_assert!(width <= u32::BITS);
        // Computed in 64-bits so that a width of 32 does not overflow the shift.
        ((1u64 << width) - 1) as u32
    }

    /// Maps a signed integer onto an unsigned integer such that values with a small magnitude map
    /// to small unsigned values.
    ///
    /// ```text
    /// Input  => 0  -1  1  -2  2  -3  3
    /// Output => 0   1  2   3  4   5  6
    /// ```
    #[inline(always)]
    pub fn zigzag_encode_i32(value: i32) -> u32 {
        ((value << 1) ^ (value >> 31)) as u32
    }

    /// The inverse of [`zigzag_encode_i32`].
    #[inline(always)]
    pub fn zigzag_decode_i32(word: u32) -> i32 {
        // Divide the input by 2 and convert to signed. Then, using the LSB of the input, create a
        // signed integer that is either -1 (odd input) or 0 (even input), and XOR it with the
        // halved value. For odd inputs this yields -div2 - 1.
        let div2 = (word >> 1) as i32;
        let sign = -((word & 0x1) as i32);
        div2 ^ sign
    }

    /// Returns the number of bits required to store the unsigned value.
    #[inline(always)]
    pub fn bit_width_u64(value: u64) -> u32 {
        u64::BITS - value.leading_zeros()
    }

}
