//! SSH wire encoding helpers (RFC 4251 §5) used by the key exchange.

use alloc::{string::String, vec::Vec};
use core::fmt::Write;

use thiserror::Error;


// CONSTANTS
// ================================================================================================

/// Size of the big-endian length prefix of `string` and `mpint` values.
pub const LENGTH_PREFIX_BYTES: usize = 4;

// ERRORS
// ================================================================================================

/// Defines errors which can occur while decoding SSH wire values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("expected at least {expected} bytes, found {actual}")]
    UnexpectedEnd { expected: usize, actual: usize },
    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
    #[error("value of {0} bytes does not fit a length prefix")]
    TooLong(usize),
    #[error("mpint is negative")]
    NegativeMpint,
}

// ENCODING
// ================================================================================================

/// Encodes `data` as an SSH `string`: a 4-byte big-endian length followed by the bytes.
pub fn encode_string(data: &[u8]) -> Result<Vec<u8>, WireError> {
    let len = u32::try_from(data.len()).map_err(|_| WireError::TooLong(data.len()))?;

    let mut out = Vec::with_capacity(LENGTH_PREFIX_BYTES + data.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(data);
    Ok(out)
}

/// Encodes a non-negative big-endian magnitude as an SSH `mpint`.
///
/// Leading zero bytes of `magnitude` are dropped. If the first remaining byte has its high bit
/// set, a single `0x00` byte is inserted so that the value is not read back as negative. Zero is
/// encoded as an empty `mpint` (four zero bytes).
pub fn encode_mpint(magnitude: &[u8]) -> Result<Vec<u8>, WireError> {
    let first_nonzero = magnitude.iter().position(|&b| b != 0).unwrap_or(magnitude.len());
    let digits = &magnitude[first_nonzero..];
    let pad = usize::from(digits.first().is_some_and(|&b| b & 0x80 != 0));

    let body_len = digits.len() + pad;
    let len = u32::try_from(body_len).map_err(|_| WireError::TooLong(body_len))?;

    let mut out = Vec::with_capacity(LENGTH_PREFIX_BYTES + body_len);
    out.extend_from_slice(&len.to_be_bytes());
    if pad == 1 {
        out.push(0);
    }
    out.extend_from_slice(digits);

    debug_assert_eq!(out.len(), LENGTH_PREFIX_BYTES + body_len);
    Ok(out)
}

// DECODING
// ================================================================================================

/// Reads one SSH `string` from the front of `source`.
///
/// Returns the contents of the string and the remaining, unread bytes.
pub fn read_string(source: &[u8]) -> Result<(&[u8], &[u8]), WireError> {
    if source.len() < LENGTH_PREFIX_BYTES {
        return Err(WireError::UnexpectedEnd {
            expected: LENGTH_PREFIX_BYTES,
            actual: source.len(),
        });
    }

    let (prefix, rest) = source.split_at(LENGTH_PREFIX_BYTES);
    let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if rest.len() < len {
        return Err(WireError::UnexpectedEnd { expected: len, actual: rest.len() });
    }

    Ok(rest.split_at(len))
}

/// Reads exactly one SSH `string` from `source`, rejecting any trailing bytes.
pub fn read_exact_string(source: &[u8]) -> Result<&[u8], WireError> {
    let (contents, rest) = read_string(source)?;
    if !rest.is_empty() {
        return Err(WireError::TrailingBytes(rest.len()));
    }
    Ok(contents)
}

/// Decodes an `mpint` which must make up all of `source` and returns its big-endian magnitude.
///
/// Negative values are rejected since no value exchanged during key agreement can be negative.
pub fn decode_mpint(source: &[u8]) -> Result<&[u8], WireError> {
    let contents = read_exact_string(source)?;
    if contents.first().is_some_and(|&b| b & 0x80 != 0) {
        return Err(WireError::NegativeMpint);
    }
    Ok(contents)
}

// HEX
// ================================================================================================

/// Renders bytes as lowercase hex with no prefix.
pub fn bytes_to_hex_string(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for byte in data {
        // writing into a String cannot fail
        let _ = write!(s, "{byte:02x}");
    }
    s
}
