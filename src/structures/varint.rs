//! Variable-length integer encoding for posting-list deltas.
//!
//! The first byte carries the low 6 bits of the value, with bit 0x40 marking
//! it as the final byte. Continuation bytes carry 7 bits each, with bit 0x80
//! marking the final one. The encoding is self-delimiting, and the high bit
//! of the first byte never participates, so block codecs can use it as a
//! type marker without re-encoding.

use crate::error::{Error, Result};

const FIRST_PAYLOAD: u8 = 0x3F;
const FIRST_TERMINATOR: u8 = 0x40;
const CONT_PAYLOAD: u8 = 0x7F;
const CONT_TERMINATOR: u8 = 0x80;

/// Number of bytes needed to encode `value`.
#[inline]
pub fn size(mut value: u64) -> usize {
    value >>= 6;

    let mut required = 1;
    while value != 0 {
        value >>= 7;
        required += 1;
    }
    required
}

/// Encode `value` into the front of `dst`, returning the bytes written.
///
/// Panics if `dst` is shorter than `size(value)`; a partial write would
/// corrupt the block stream.
pub fn write(mut value: u64, dst: &mut [u8]) -> usize {
    assert!(
        dst.len() >= size(value),
        "varint target buffer too small ({} bytes for value {})",
        dst.len(),
        value
    );

    dst[0] = (value & FIRST_PAYLOAD as u64) as u8;
    value >>= 6;
    if value == 0 {
        dst[0] |= FIRST_TERMINATOR;
        return 1;
    }

    let mut idx = 1;
    loop {
        dst[idx] = (value & CONT_PAYLOAD as u64) as u8;
        value >>= 7;
        if value == 0 {
            dst[idx] |= CONT_TERMINATOR;
            return idx + 1;
        }
        idx += 1;
    }
}

/// Decode the varint at the front of `src`, returning `(bytes_read, value)`.
pub fn read(src: &[u8]) -> Result<(usize, u64)> {
    let first = *src.first().ok_or(Error::UnterminatedVarInt)?;
    let mut value = (first & FIRST_PAYLOAD) as u64;
    if first & FIRST_TERMINATOR != 0 {
        return Ok((1, value));
    }

    let mut shift = 6;
    for (pos, &byte) in src.iter().enumerate().skip(1) {
        if shift >= 64 {
            return Err(Error::Corruption("varint too long".into()));
        }
        value |= ((byte & CONT_PAYLOAD) as u64) << shift;
        if byte & CONT_TERMINATOR != 0 {
            return Ok((pos + 1, value));
        }
        shift += 7;
    }

    Err(Error::UnterminatedVarInt)
}

/// Offset one past the varint at the front of `src`, without decoding it.
///
/// Payload framing uses this to step over a varint cheaply.
#[inline]
pub fn end(src: &[u8]) -> Result<usize> {
    let first = *src.first().ok_or(Error::UnterminatedVarInt)?;
    if first & FIRST_TERMINATOR != 0 {
        return Ok(1);
    }

    for (pos, &byte) in src.iter().enumerate().skip(1) {
        if byte & CONT_TERMINATOR != 0 {
            return Ok(pos + 1);
        }
    }

    Err(Error::UnterminatedVarInt)
}
