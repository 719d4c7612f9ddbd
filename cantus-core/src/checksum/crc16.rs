// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::io::Monitor;

/// The CRC-16 ANSI polynomial, `x^16 + x^15 + x^2 + 1`.
const CRC16_ANSI_POLY: u16 = 0x8005;

const fn make_crc16_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;

        while bit < 8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ poly } else { crc << 1 };
            bit += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Inverts the map from the high byte of the state to the low byte of its table entry.
///
/// Since the polynomial has a non-zero constant term, the low byte of each table entry is unique,
/// and therefore one step of the CRC (with a zero input byte) can be undone.
const fn make_crc16_inverse_table(table: &[u16; 256]) -> [u8; 256] {
    let mut inverse = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        inverse[(table[i] & 0xff) as usize] = i as u8;
        i += 1;
    }

    inverse
}

const CRC16_ANSI_TABLE: [u16; 256] = make_crc16_table(CRC16_ANSI_POLY);

const CRC16_ANSI_INVERSE_TABLE: [u8; 256] = make_crc16_inverse_table(&CRC16_ANSI_TABLE);

/// `Crc16Ansi` implements the CRC-16 algorithm using the ANSI polynomial (0x8005), MSB-first, as
/// used by FLAC frame footers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Crc16Ansi {
    state: u16,
}

impl Crc16Ansi {
    /// Instantiate a `Crc16Ansi` instance with an initial state.
    pub fn new(state: u16) -> Self {
        Crc16Ansi { state }
    }

    /// Returns the computed CRC.
    pub fn crc(&self) -> u16 {
        self.state
    }

    /// Computes the CRC of the buffer starting from an initial state of 0.
    pub fn checksum(buf: &[u8]) -> u16 {
        let mut crc = Crc16Ansi::new(0);
        crc.process_buf_bytes(buf);
        crc.crc()
    }

    /// Removes the trailing bytes from a CRC.
    ///
    /// Given `total`, the CRC of a sequence `A || B`, and `partial`, the CRC of `B` alone computed
    /// from an initial state of 0, where `B` is `byte_count` bytes long, returns the CRC of `A`.
    ///
    /// The CRC is linear, therefore `total = shift(crc(A), byte_count) ^ partial`, where `shift`
    /// advances the state over `byte_count` zero bytes. The XOR is undone first, then each zero
    /// byte step is reversed.
    pub fn subtract(total: u16, partial: u16, byte_count: usize) -> u16 {
        let mut crc = total ^ partial;

        for _ in 0..byte_count {
            // A forward step with a zero input byte is:
            //
            //      next = (prev << 8) ^ TABLE[prev >> 8]
            //
            // The low byte of `next` is therefore the low byte of the table entry, which uniquely
            // identifies the high byte of `prev`. The low byte of `prev` is then recovered from the
            // high byte of `next` after removing the table entry.
            let hi = CRC16_ANSI_INVERSE_TABLE[usize::from(crc & 0xff)];
            let lo = (crc ^ CRC16_ANSI_TABLE[usize::from(hi)]) >> 8;
            crc = (u16::from(hi) << 8) | lo;
        }

        crc
    }
}

impl Monitor for Crc16Ansi {
    #[inline(always)]
    fn process_byte(&mut self, byte: u8) {
        self.state =
            (self.state << 8) ^ CRC16_ANSI_TABLE[usize::from((self.state >> 8) as u8 ^ byte)];
    }

    fn process_buf_bytes(&mut self, buf: &[u8]) {
        for byte in buf {
            self.process_byte(*byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bit-by-bit reference implementation.
    fn crc16_reference(buf: &[u8]) -> u16 {
        let mut crc = 0u16;

        for &byte in buf {
            crc ^= u16::from(byte) << 8;

            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 { (crc << 1) ^ CRC16_ANSI_POLY } else { crc << 1 };
            }
        }

        crc
    }

    #[test]
    fn verify_crc16_table() {
        assert_eq!(CRC16_ANSI_TABLE[0], 0x0000);
        assert_eq!(CRC16_ANSI_TABLE[1], 0x8005);
        assert_eq!(CRC16_ANSI_TABLE[2], 0x800f);
        assert_eq!(CRC16_ANSI_TABLE[3], 0x000a);
        assert_eq!(CRC16_ANSI_TABLE[255], 0x0202);
    }

    #[test]
    fn verify_crc16_check_value() {
        // The standard check value for CRC-16/BUYPASS (the FLAC CRC-16).
        assert_eq!(Crc16Ansi::checksum(b"123456789"), 0xfee8);
        assert_eq!(crc16_reference(b"123456789"), 0xfee8);
    }

    #[test]
    fn verify_crc16_matches_reference() {
        let mut lcg: u32 = 0xec57c4bf;

        let data: Vec<u8> = (0..1031)
            .map(|_| {
                lcg = lcg.wrapping_mul(1664525).wrapping_add(1013904223);
                (lcg >> 24) as u8
            })
            .collect();

        for len in [0, 1, 2, 7, 64, 1031] {
            assert_eq!(Crc16Ansi::checksum(&data[..len]), crc16_reference(&data[..len]));
        }
    }

    #[test]
    fn verify_crc16_subtract() {
        let data: Vec<u8> = (0u32..97).map(|i| (i.wrapping_mul(73) ^ 0x5a) as u8).collect();

        for split in [0, 1, 13, 50, 96, 97] {
            let (head, tail) = data.split_at(split);

            let total = Crc16Ansi::checksum(&data);
            let partial = Crc16Ansi::checksum(tail);

            assert_eq!(Crc16Ansi::subtract(total, partial, tail.len()), Crc16Ansi::checksum(head));
        }
    }
}
