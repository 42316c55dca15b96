//! Big-endian primitive readers for MaxMind DB buffers
//!
//! Every multi-byte quantity in the format (search tree records, data section
//! integers, floats, pointers, size extensions) is stored big-endian regardless
//! of the host. The readers here take a buffer plus an offset and return a
//! `CorruptDatabase` error instead of panicking when a read would run past the
//! end of the buffer, so decoding an adversarial file can never read outside
//! the mapping.
//!
//! # Usage Pattern
//!
//! ```rust
//! use tinymmdb::endian::{read_u24_be, read_f32_be};
//!
//! let buffer = [0x01, 0x02, 0x03, 0x46, 0x1c, 0x3f, 0xf6];
//! assert_eq!(read_u24_be(&buffer, 0).unwrap(), 0x010203);
//! assert!((read_f32_be(&buffer, 3).unwrap() - 9999.99).abs() < 0.01);
//! assert!(read_u24_be(&buffer, 5).is_err());
//! ```

use crate::error::{MmdbError, Result};
use zerocopy::byteorder::big_endian::{F32, F64, U16, U32};
use zerocopy::FromBytes;

/// Bias added to a size-1 pointer (first value past the size-0 range)
pub const POINTER_BIAS_1: u32 = 2048;

/// Bias added to a size-2 pointer (first value past the size-1 range)
pub const POINTER_BIAS_2: u32 = 2048 + 524_288;

/// Borrow `len` bytes starting at `offset`
#[inline]
pub fn bytes_at(buf: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or_else(|| {
            MmdbError::corrupt(format!(
                "read of {} bytes at offset {} exceeds buffer of {} bytes",
                len,
                offset,
                buf.len()
            ))
        })
}

/// Read one byte
#[inline]
pub fn read_u8(buf: &[u8], offset: usize) -> Result<u8> {
    buf.get(offset).copied().ok_or_else(|| {
        MmdbError::corrupt(format!(
            "read at offset {} exceeds buffer of {} bytes",
            offset,
            buf.len()
        ))
    })
}

/// Read a big-endian u16
#[inline]
pub fn read_u16_be(buf: &[u8], offset: usize) -> Result<u16> {
    let bytes = bytes_at(buf, offset, 2)?;
    U16::read_from_bytes(bytes)
        .map(|v| v.get())
        .map_err(|_| MmdbError::corrupt("misaligned u16 read"))
}

/// Read a big-endian 24-bit unsigned integer
#[inline]
pub fn read_u24_be(buf: &[u8], offset: usize) -> Result<u32> {
    let b = bytes_at(buf, offset, 3)?;
    Ok(((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32)
}

/// Read a big-endian u32
#[inline]
pub fn read_u32_be(buf: &[u8], offset: usize) -> Result<u32> {
    let bytes = bytes_at(buf, offset, 4)?;
    U32::read_from_bytes(bytes)
        .map(|v| v.get())
        .map_err(|_| MmdbError::corrupt("misaligned u32 read"))
}

/// Read a `len`-byte (0..=4) big-endian unsigned integer
///
/// A length of zero is legal and yields zero.
pub fn read_uint_be(buf: &[u8], offset: usize, len: usize) -> Result<u32> {
    if len > 4 {
        return Err(MmdbError::corrupt(format!(
            "integer of {} bytes does not fit in 32 bits",
            len
        )));
    }
    let bytes = bytes_at(buf, offset, len)?;
    Ok(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
}

/// Read a `len`-byte (0..=4) big-endian integer reinterpreted as `i32`
///
/// Short encodings are not sign-extended: the accumulated 32-bit pattern is
/// reinterpreted as-is, which is how writers emit int32 values.
pub fn read_sint_be(buf: &[u8], offset: usize, len: usize) -> Result<i32> {
    read_uint_be(buf, offset, len).map(|v| v as i32)
}

/// Read a big-endian IEEE-754 single precision float
#[inline]
pub fn read_f32_be(buf: &[u8], offset: usize) -> Result<f32> {
    let bytes = bytes_at(buf, offset, 4)?;
    F32::read_from_bytes(bytes)
        .map(|v| v.get())
        .map_err(|_| MmdbError::corrupt("misaligned float read"))
}

/// Read a big-endian IEEE-754 double precision float
#[inline]
pub fn read_f64_be(buf: &[u8], offset: usize) -> Result<f64> {
    let bytes = bytes_at(buf, offset, 8)?;
    F64::read_from_bytes(bytes)
        .map(|v| v.get())
        .map_err(|_| MmdbError::corrupt("misaligned double read"))
}

/// Pointer size encoded in bits 3-4 of a pointer control byte (0..=3)
#[inline]
pub fn pointer_size(ctrl: u8) -> usize {
    ((ctrl >> 3) & 0x3) as usize
}

/// Resolve the target of a pointer whose payload starts at `offset`
///
/// `ctrl` is the pointer's control byte. The payload is `pointer_size(ctrl) + 1`
/// bytes long. Each encoding's range begins where the previous one ends, so
/// sizes 1 and 2 carry a bias; the 4-byte form is absolute.
///
/// The returned value is relative to the start of the data section proper;
/// callers add the reserved separator size on top.
pub fn pointer_target(buf: &[u8], offset: usize, ctrl: u8) -> Result<u32> {
    let high = (ctrl & 0x7) as u32;
    match pointer_size(ctrl) {
        0 => Ok(high * 256 + read_u8(buf, offset)? as u32),
        1 => Ok(POINTER_BIAS_1 + high * 65_536 + read_u16_be(buf, offset)? as u32),
        2 => Ok(POINTER_BIAS_2 + high * 16_777_216 + read_u24_be(buf, offset)?),
        _ => read_u32_be(buf, offset),
    }
}
