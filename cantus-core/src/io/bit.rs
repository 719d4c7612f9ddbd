// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::min;

use log::warn;

use super::Monitor;
use crate::checksum::Crc16Ansi;
use crate::errors::{capacity_error, decode_error, end_of_bitstream_error, invalid_param_error};
use crate::errors::Result;
use crate::util::bits::*;

const fn make_leading_zeros_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let mut n = 0;
        while n < 8 && (i << n) & 0x80 == 0 {
            n += 1;
        }
        table[i] = n as u8;
        i += 1;
    }

    table
}

/// The number of leading zero bits in a byte. A zero byte has 8 leading zeros.
const UNARY_LEADING_ZEROS: [u8; 256] = make_leading_zeros_table();

/// The largest value that may be coded with the extended UTF-8 code (36 bits).
const UTF8_MAX_VALUE: u64 = (1 << 36) - 1;

mod private {
    use crate::errors::Result;

    pub trait FetchBitsLtr {
        /// Discard any remaining bits in the source and fetch new bits.
        fn fetch_bits(&mut self) -> Result<()>;

        /// Get all the bits in the source.
        fn get_bits(&self) -> u64;

        /// Get the number of bits left in the source.
        fn num_bits_left(&self) -> u32;

        /// Consume `num` bits from the source.
        fn consume_bits(&mut self, num: u32);
    }
}

/// A `FiniteBitStream` is a bit stream that has a known length in bits.
pub trait FiniteBitStream {
    /// Gets the number of bits left unread.
    fn bits_left(&self) -> u64;
}

/// `ReadBitsLtr` reads bits from most-significant to least-significant.
pub trait ReadBitsLtr: private::FetchBitsLtr {
    /// Discards any saved bits and resets the `BitStream` to prepare it for a byte-aligned read.
    #[inline(always)]
    fn realign(&mut self) {
        let skip = self.num_bits_left() & 0x7;
        self.consume_bits(skip);
    }

    /// Ignores the specified number of bits from the stream or returns an error.
    #[inline(always)]
    fn ignore_bits(&mut self, mut num_bits: u32) -> Result<()> {
        if num_bits <= self.num_bits_left() {
            self.consume_bits(num_bits);
        }
        else {
            // Consume whole bit caches directly.
            while num_bits > self.num_bits_left() {
                num_bits -= self.num_bits_left();
                self.fetch_bits()?;
            }

            if num_bits > 0 {
                // Shift out in two parts to prevent panicing when num_bits == 64.
                self.consume_bits(num_bits - 1);
                self.consume_bits(1);
            }
        }

        Ok(())
    }

    /// Read a single bit as a boolean value or returns an error.
    #[inline(always)]
    fn read_bit(&mut self) -> Result<bool> {
        if self.num_bits_left() < 1 {
            self.fetch_bits()?;
        }

        let bit = self.get_bits() & (1 << 63) != 0;

        self.consume_bits(1);
        Ok(bit)
    }

    /// Reads up to 32-bits and interprets them as an unsigned integer or returns an error.
    #[inline(always)]
    fn read_bits_leq32(&mut self, mut bit_width: u32) -> Result<u32> {
        debug_assert!(bit_width <= u32::BITS);

        // Shift in two 32-bit operations instead of a single 64-bit operation to avoid panicing
        // when bit_width == 0 (and thus shifting right 64-bits). This is preferred to branching
        // the bit_width == 0 case, since reading up-to 32-bits at a time is a hot code-path.
        let mut bits = (self.get_bits() >> u32::BITS) >> (u32::BITS - bit_width);

        while bit_width > self.num_bits_left() {
            bit_width -= self.num_bits_left();

            self.fetch_bits()?;

            // Unlike the first shift, bit_width is always > 0 here so this operation will never
            // shift by > 63 bits.
            bits |= self.get_bits() >> (u64::BITS - bit_width);
        }

        self.consume_bits(bit_width);

        Ok(bits as u32)
    }

    /// Reads up to 32-bits and interprets them as a signed two's complement integer or returns an
    /// error.
    #[inline(always)]
    fn read_bits_leq32_signed(&mut self, bit_width: u32) -> Result<i32> {
        let value = self.read_bits_leq32(bit_width)?;
        Ok(sign_extend_leq32_to_i32(value, bit_width))
    }

    /// Reads up to 64-bits and interprets them as an unsigned integer or returns an error.
    ///
    /// Widths greater than 32 are read as two operations, the high-order bits first.
    #[inline(always)]
    fn read_bits_leq64(&mut self, bit_width: u32) -> Result<u64> {
        debug_assert!(bit_width <= u64::BITS);

        if bit_width > u32::BITS {
            let hi = self.read_bits_leq32(bit_width - u32::BITS)?;
            let lo = self.read_bits_leq32(u32::BITS)?;
            Ok((u64::from(hi) << u32::BITS) | u64::from(lo))
        }
        else {
            Ok(u64::from(self.read_bits_leq32(bit_width)?))
        }
    }

    /// Reads and returns a unary zeros encoded integer or an error.
    ///
    /// The code is a run of 0 bits terminated by a 1 bit. The run is measured a byte at a time
    /// using a lookup table of leading zero counts.
    #[inline(always)]
    fn read_unary_zeros(&mut self) -> Result<u32> {
        let mut num = 0u64;

        loop {
            if self.num_bits_left() == 0 {
                self.fetch_bits()?;
            }

            // Bits below the cached bits are always 0, so the count may run past the end of the
            // cache. Clamp it to the number of bits actually available.
            let n_zeros = u32::from(UNARY_LEADING_ZEROS[(self.get_bits() >> 56) as usize]);

            if n_zeros >= self.num_bits_left() {
                // All the remaining bits were 0.
                num += u64::from(self.num_bits_left());
                self.consume_bits(self.num_bits_left());
            }
            else if n_zeros < 8 {
                // A 1 bit was encountered after `n_zeros` 0 bits.
                num += u64::from(n_zeros);
                self.consume_bits(n_zeros + 1);
                break;
            }
            else {
                // A whole byte of 0 bits.
                num += 8;
                self.consume_bits(8);
            }
        }

        u32::try_from(num).or_else(|_| decode_error("bit: unary run overflows 32 bits"))
    }

    /// Reads and returns a unary ones encoded integer or an error.
    #[inline(always)]
    fn read_unary_ones(&mut self) -> Result<u32> {
        // Note: This algorithm is identical to read_unary_zeros except flipped for 1s. Once
        // inverted, the bits below the cache read as 1s, so the count is clamped the same way.
        let mut num = 0u64;

        loop {
            if self.num_bits_left() == 0 {
                self.fetch_bits()?;
            }

            let n_ones = u32::from(UNARY_LEADING_ZEROS[(!self.get_bits() >> 56) as usize]);

            if n_ones >= self.num_bits_left() {
                num += u64::from(self.num_bits_left());
                self.consume_bits(self.num_bits_left());
            }
            else if n_ones < 8 {
                num += u64::from(n_ones);
                self.consume_bits(n_ones + 1);
                break;
            }
            else {
                num += 8;
                self.consume_bits(8);
            }
        }

        u32::try_from(num).or_else(|_| decode_error("bit: unary run overflows 32 bits"))
    }

    /// Reads a block of Rice coded signed integers with the Rice parameter `rice_param` into
    /// `dest`.
    ///
    /// Each integer is coded as a unary zeros quotient followed by a `rice_param`-bit remainder of
    /// its zig-zag mapped value.
    fn read_rice_block(&mut self, rice_param: u32, dest: &mut [i32]) -> Result<()> {
        debug_assert!(rice_param < u32::BITS);

        // The largest quotient that does not overflow 32-bits once shifted.
        let max_quotient = u32::MAX >> rice_param;

        for sample in dest.iter_mut() {
            let q = self.read_unary_zeros()?;

            if q > max_quotient {
                return decode_error("bit: rice quotient overflows 32 bits");
            }

            let r = self.read_bits_leq32(rice_param)?;

            *sample = zigzag_decode_i32((q << rice_param) | r);
        }

        Ok(())
    }

    /// Reads a big-endian unsigned integer encoded via extended UTF-8. In this context, extended
    /// UTF-8 simply means the encoded value may be up to 7 bytes for a maximum integer bit width
    /// of 36-bits.
    fn read_utf8(&mut self) -> Result<u64> {
        let lead = self.read_bits_leq32(8)? as u8;

        // UTF-8 prefixes 1s followed by a 0 to indicate the total number of bytes within the
        // multi-byte sequence. Using ranges, determine the mask that will overlap the data bits
        // within the first byte of the sequence, and the number of continuation bytes.
        let (mut value, n_cont) = match lead {
            0x00..=0x7f => return Ok(u64::from(lead)),
            0xc0..=0xdf => (u64::from(lead & 0x1f), 1),
            0xe0..=0xef => (u64::from(lead & 0x0f), 2),
            0xf0..=0xf7 => (u64::from(lead & 0x07), 3),
            0xf8..=0xfb => (u64::from(lead & 0x03), 4),
            0xfc..=0xfd => (u64::from(lead & 0x01), 5),
            0xfe => (0, 6),
            _ => return decode_error("bit: invalid utf8 prefix"),
        };

        // Each subsequent byte is prefixed with 0b10xx_xxxx, therefore only 6 bits are useful.
        for _ in 0..n_cont {
            let byte = self.read_bits_leq32(8)?;

            if byte & 0xc0 != 0x80 {
                return decode_error("bit: invalid utf8 continuation byte");
            }

            value = (value << 6) | u64::from(byte & 0x3f);
        }

        Ok(value)
    }
}

/// `BitReaderLtr` reads bits from most-significant to least-significant from any `&[u8]`.
///
/// Stated another way, if N-bits are read from a `BitReaderLtr` then bit 0, the first bit read,
/// is the most-significant bit, and bit N-1, the last bit read, is the least-significant.
///
/// A CRC-16 is updated for every byte pulled into the bit cache.
pub struct BitReaderLtr<'a> {
    buf: &'a [u8],
    pos: usize,
    bits: u64,
    n_bits_left: u32,
    crc: Crc16Ansi,
}

impl<'a> BitReaderLtr<'a> {
    /// Instantiate a new `BitReaderLtr` with the given buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        BitReaderLtr { buf, pos: 0, bits: 0, n_bits_left: 0, crc: Crc16Ansi::new(0) }
    }

    /// Gets the number of bits consumed so far.
    pub fn bits_read(&self) -> u64 {
        8 * self.pos as u64 - u64::from(self.n_bits_left)
    }

    /// Gets the CRC-16 of all bytes that have been completely consumed.
    ///
    /// Bytes are pulled into the cache ahead of being consumed. The contribution of bytes still
    /// resident in the cache, including a partially consumed byte, is removed from the running
    /// CRC.
    pub fn crc16(&self) -> u16 {
        let n_pending = ((self.n_bits_left + 7) >> 3) as usize;

        let pending = &self.buf[self.pos - n_pending..self.pos];

        Crc16Ansi::subtract(self.crc.crc(), Crc16Ansi::checksum(pending), n_pending)
    }
}

impl private::FetchBitsLtr for BitReaderLtr<'_> {
    fn fetch_bits(&mut self) -> Result<()> {
        let mut buf = [0u8; std::mem::size_of::<u64>()];

        let read_len = min(self.buf.len() - self.pos, std::mem::size_of::<u64>());

        if read_len == 0 {
            return end_of_bitstream_error();
        }

        let src = &self.buf[self.pos..self.pos + read_len];

        buf[..read_len].copy_from_slice(src);
        self.crc.process_buf_bytes(src);

        self.pos += read_len;

        self.bits = u64::from_be_bytes(buf);
        self.n_bits_left = (read_len as u32) << 3;

        Ok(())
    }

    #[inline(always)]
    fn get_bits(&self) -> u64 {
        self.bits
    }

    #[inline(always)]
    fn num_bits_left(&self) -> u32 {
        self.n_bits_left
    }

    #[inline(always)]
    fn consume_bits(&mut self, num: u32) {
        self.n_bits_left -= num;
        self.bits <<= num;
    }
}

impl ReadBitsLtr for BitReaderLtr<'_> {}

impl FiniteBitStream for BitReaderLtr<'_> {
    fn bits_left(&self) -> u64 {
        8 * (self.buf.len() - self.pos) as u64 + u64::from(self.n_bits_left)
    }
}

/// `WriteBitsLtr` writes bits from most-significant to least-significant.
///
/// Writes never fail individually. Once the destination is full, the writer latches
/// [`WriteBitsLtr::is_full`] and discards all further bits. Callers check the flag after a batch
/// of writes.
pub trait WriteBitsLtr {
    /// Writes the lower `bit_width` bits of `value`, where `bit_width` is at most 32.
    fn write_bits_leq32(&mut self, bit_width: u32, value: u32);

    /// Returns true if the destination ran out of space and bits were discarded.
    fn is_full(&self) -> bool;

    /// Writes a single bit.
    #[inline(always)]
    fn write_bit(&mut self, bit: bool) {
        self.write_bits_leq32(1, u32::from(bit));
    }

    /// Writes a signed two's complement integer in `bit_width` bits.
    #[inline(always)]
    fn write_bits_leq32_signed(&mut self, bit_width: u32, value: i32) {
        self.write_bits_leq32(bit_width, value as u32);
    }

    /// Writes the lower `bit_width` bits of `value`, where `bit_width` is at most 64.
    ///
    /// Widths greater than 32 are written as two operations, the high-order bits first.
    #[inline(always)]
    fn write_bits_leq64(&mut self, bit_width: u32, value: u64) {
        debug_assert!(bit_width <= u64::BITS);

        if bit_width > u32::BITS {
            self.write_bits_leq32(bit_width - u32::BITS, (value >> u32::BITS) as u32);
            self.write_bits_leq32(u32::BITS, value as u32);
        }
        else {
            self.write_bits_leq32(bit_width, value as u32);
        }
    }

    /// Writes `num` 0 bits terminated by a 1 bit.
    fn write_unary_zeros(&mut self, mut num: u32) {
        while num >= u32::BITS {
            if self.is_full() {
                return;
            }

            self.write_bits_leq32(u32::BITS, 0);
            num -= u32::BITS;
        }

        self.write_bits_leq32(num + 1, 1);
    }

    /// Writes `num` 1 bits terminated by a 0 bit.
    fn write_unary_ones(&mut self, mut num: u32) {
        while num >= u32::BITS {
            if self.is_full() {
                return;
            }

            self.write_bits_leq32(u32::BITS, u32::MAX);
            num -= u32::BITS;
        }

        self.write_bits_leq32(num + 1, mask_lower_u32(num) << 1);
    }

    /// Writes a block of signed integers Rice coded with the Rice parameter `rice_param`.
    fn write_rice_block_signed(&mut self, rice_param: u32, src: &[i32]) {
        debug_assert!(rice_param < u32::BITS);

        let rem_mask = mask_lower_u32(rice_param);

        for &sample in src {
            let word = zigzag_encode_i32(sample);
            let q = word >> rice_param;

            // The common case of a short quotient is written as a single operation: the
            // terminating 1 bit followed by the remainder. The quotient of a zig-zag mapped
            // `i32::MIN` is `u32::MAX` when `rice_param` is 0, so compare before adding.
            if q < u32::BITS - rice_param {
                let code = (1u64 << rice_param) | u64::from(word & rem_mask);
                self.write_bits_leq32(q + 1 + rice_param, code as u32);
            }
            else {
                self.write_unary_zeros(q);
                self.write_bits_leq32(rice_param, word & rem_mask);
            }
        }
    }

    /// Writes an unsigned integer of up-to 36-bits with the extended UTF-8 code.
    fn write_utf8(&mut self, value: u64) -> Result<()> {
        if value > UTF8_MAX_VALUE {
            return invalid_param_error("bit: value too large for the utf8 code");
        }

        let n_cont = match value {
            0x0000_0000..=0x0000_007f => {
                self.write_bits_leq32(8, value as u32);
                return Ok(());
            }
            0x0000_0080..=0x0000_07ff => 1,
            0x0000_0800..=0x0000_ffff => 2,
            0x0001_0000..=0x001f_ffff => 3,
            0x0020_0000..=0x03ff_ffff => 4,
            0x0400_0000..=0x7fff_ffff => 5,
            _ => 6,
        };

        // The lead byte is n_cont + 1 ones followed by a zero, then the high-order data bits.
        let prefix = (0xff00u32 >> (n_cont + 1)) as u8;
        let lead = prefix | (value >> (6 * n_cont)) as u8;

        self.write_bits_leq32(8, u32::from(lead));

        for i in (0..n_cont).rev() {
            self.write_bits_leq32(8, 0x80 | ((value >> (6 * i)) & 0x3f) as u32);
        }

        Ok(())
    }
}

/// `BitWriterLtr` writes bits from most-significant to least-significant into a fixed-capacity
/// byte buffer.
///
/// Up-to 63 bits are staged in a cache and flushed 32 bits at a time. A CRC-16 is updated for
/// every byte flushed to the buffer.
pub struct BitWriterLtr<'a> {
    buf: &'a mut [u8],
    start: usize,
    pos: usize,
    end: usize,
    bits: u64,
    n_bits: u32,
    crc: Crc16Ansi,
    is_full: bool,
}

impl<'a> BitWriterLtr<'a> {
    /// Instantiate a new `BitWriterLtr` that writes into the entire buffer.
    pub fn new(buf: &'a mut [u8]) -> Self {
        let end = buf.len();

        BitWriterLtr {
            buf,
            start: 0,
            pos: 0,
            end,
            bits: 0,
            n_bits: 0,
            crc: Crc16Ansi::new(0),
            is_full: false,
        }
    }

    /// Instantiate a new `BitWriterLtr` that writes into `len` bytes of the buffer starting at
    /// byte `offset`.
    pub fn with_range(buf: &'a mut [u8], offset: usize, len: usize) -> Result<Self> {
        match offset.checked_add(len) {
            Some(end) if end <= buf.len() => Ok(BitWriterLtr {
                buf,
                start: offset,
                pos: offset,
                end,
                bits: 0,
                n_bits: 0,
                crc: Crc16Ansi::new(0),
                is_full: false,
            }),
            _ => invalid_param_error("bit: writer range exceeds the buffer"),
        }
    }

    /// Gets the number of bits written so far, including bits still staged in the cache.
    pub fn bits_written(&self) -> u64 {
        8 * (self.pos - self.start) as u64 + u64::from(self.n_bits)
    }

    /// Gets the CRC-16 of all complete bytes written so far.
    ///
    /// Complete bytes still staged in the cache are included as though they were flushed. A
    /// trailing partial byte is not.
    pub fn crc16(&self) -> u16 {
        let mut crc = self.crc;

        let mut n_bits = self.n_bits;

        while n_bits >= 8 {
            n_bits -= 8;
            crc.process_byte((self.bits >> n_bits) as u8);
        }

        crc.crc()
    }

    /// Pads the stream with 0 bits up-to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        let rem = self.n_bits & 0x7;

        if rem > 0 {
            self.write_bits_leq32(8 - rem, 0);
        }
    }

    /// Returns an error if the writer has run out of space.
    pub fn check(&self) -> Result<()> {
        if self.is_full {
            return capacity_error();
        }
        Ok(())
    }

    /// Pads to a byte boundary, flushes all staged bits, and returns the number of bytes written.
    pub fn finish(mut self) -> Result<usize> {
        self.align_to_byte();
        self.flush_complete_bytes();
        self.check()?;
        Ok(self.pos - self.start)
    }

    fn emit_byte(&mut self, byte: u8) {
        if self.pos == self.end {
            if !self.is_full {
                warn!("bit: writer ran out of space after {} bytes", self.end - self.start);
            }
            self.is_full = true;
            return;
        }

        self.buf[self.pos] = byte;
        self.crc.process_byte(byte);
        self.pos += 1;
    }

    fn flush_quad(&mut self) {
        self.n_bits -= u32::BITS;

        let quad = ((self.bits >> self.n_bits) as u32).to_be_bytes();

        if self.end - self.pos >= quad.len() {
            self.buf[self.pos..self.pos + quad.len()].copy_from_slice(&quad);
            self.crc.process_quad_bytes(quad);
            self.pos += quad.len();
        }
        else {
            for byte in quad {
                self.emit_byte(byte);
            }
        }

        self.bits &= u64::from(mask_lower_u32(self.n_bits));
    }

    fn flush_complete_bytes(&mut self) {
        while self.n_bits >= 8 {
            self.n_bits -= 8;
            self.emit_byte((self.bits >> self.n_bits) as u8);
        }

        self.bits &= u64::from(mask_lower_u32(self.n_bits));
    }
}

impl WriteBitsLtr for BitWriterLtr<'_> {
    #[inline(always)]
    fn write_bits_leq32(&mut self, bit_width: u32, value: u32) {
        debug_assert!(bit_width <= u32::BITS);

        if self.is_full || bit_width == 0 {
            return;
        }

        // At most 31 bits are staged between writes, so the cache cannot overflow.
        self.bits = (self.bits << bit_width) | u64::from(value & mask_lower_u32(bit_width));
        self.n_bits += bit_width;

        if self.n_bits >= u32::BITS {
            self.flush_quad();
        }
    }

    #[inline(always)]
    fn is_full(&self) -> bool {
        self.is_full
    }
}
