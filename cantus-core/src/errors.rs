// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Cantus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The bitstream contained malformed data and could not be decoded.
    DecodeError(&'static str),
    /// A read was attempted past the end of the bound byte range.
    EndOfBitstream,
    /// A writer ran out of space in its destination buffer. Bits written after the buffer was
    /// filled were discarded.
    CapacityExceeded,
    /// A caller supplied a parameter outside of its valid domain (e.g., a predictor order greater
    /// than 32). This indicates a contract violation by the caller, not malformed input.
    InvalidParameter(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::DecodeError(msg) => {
                write!(f, "malformed stream: {}", msg)
            }
            Error::EndOfBitstream => {
                write!(f, "unexpected end of bitstream")
            }
            Error::CapacityExceeded => {
                write!(f, "destination buffer capacity exceeded")
            }
            Error::InvalidParameter(msg) => {
                write!(f, "invalid parameter: {}", msg)
            }
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a decode error.
pub fn decode_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::DecodeError(desc))
}

/// Convenience function to create an end-of-bitstream error.
pub fn end_of_bitstream_error<T>() -> Result<T> {
    Err(Error::EndOfBitstream)
}

/// Convenience function to create a capacity exceeded error.
pub fn capacity_error<T>() -> Result<T> {
    Err(Error::CapacityExceeded)
}

/// Convenience function to create an invalid parameter error.
pub fn invalid_param_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidParameter(desc))
}
