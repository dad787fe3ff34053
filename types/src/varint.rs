// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! The self-delimiting ASCII hex varint used throughout the wire format.
//!
//! An encoded varint is one ASCII hex digit giving the length L of the
//! integer in hex digits, followed by L ASCII hex digits of the integer in
//! big-endian order. The length digit caps L at 15, so every representable
//! value fits in 60 bits.


use thiserror::Error;

/// Largest number of hex digits a varint payload may carry.
pub const MAX_HEX_DIGITS: usize = 15;

/// Error thrown when a varint fails to encode or decode.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum VarintError {
    /// The integer needs more than [`MAX_HEX_DIGITS`] hex digits.
    #[error("{0} is too large to be converted to a varint")]
    Oversize(u64),

    /// Input is empty.
    #[error("missing length digit due to empty input")]
    EmptyInput,

    /// The length digit is not ASCII hex.
    #[error("length digit is not a hex digit: {0:#04x}")]
    BadLengthDigit(u8),

    /// The length digit declares zero payload digits, which no encoder
    /// produces.
    #[error("length digit declares an empty integer")]
    ZeroLength,

    /// The length digit declares more payload than is available.
    #[error("declared {declared} hex digits but only {available} bytes remain")]
    Truncated { declared: usize, available: usize },

    /// A payload byte is not ASCII hex.
    #[error("payload byte is not a hex digit: {0:#04x}")]
    BadDigit(u8),
}

/// Encodes a non-negative integer as a self-delimiting ASCII hex varint.
pub fn to_varint(value: u64) -> Result<Vec<u8>, VarintError> {
    let digits = format!("{:x}", value);
    if digits.len() > MAX_HEX_DIGITS {
        return Err(VarintError::Oversize(value));
    }
    let mut out = Vec::with_capacity(digits.len() + 1);
    out.extend_from_slice(format!("{:x}", digits.len()).as_bytes());
    out.extend_from_slice(digits.as_bytes());
    Ok(out)
}

/// Decodes a varint from the front of `data`, returning the value and the
/// remaining bytes.
pub fn parse_varint(data: &[u8]) -> Result<(u64, &[u8]), VarintError> {
    let (&length_digit, rest) = data.split_first().ok_or(VarintError::EmptyInput)?;
    let declared = hex_value(length_digit)
        .ok_or(VarintError::BadLengthDigit(length_digit))? as usize;
    if declared == 0 {
        return Err(VarintError::ZeroLength);
    }
    if rest.len() < declared {
        return Err(VarintError::Truncated {
            declared,
            available: rest.len(),
        });
    }
    let (digits, leftover) = rest.split_at(declared);
    let mut value = 0u64;
    for &byte in digits {
        let digit = hex_value(byte).ok_or(VarintError::BadDigit(byte))?;
        value = (value << 4) | u64::from(digit);
    }
    Ok((value, leftover))
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|digit| digit as u8)
}
