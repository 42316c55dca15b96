//! Data section decoding for MaxMind DB files
//!
//! Decodes one value at a time from the data section without materializing
//! anything: strings and byte arrays are returned as slices borrowed from the
//! database buffer, maps and arrays only report their entry count. Callers
//! walk children themselves by following `offset_to_next`.
//!
//! # Supported Types
//!
//! | id | type        | payload                                   |
//! |----|-------------|-------------------------------------------|
//! | 1  | Pointer     | offset of another value                   |
//! | 2  | Utf8String  | borrowed bytes                            |
//! | 3  | Double      | 8 bytes, IEEE 754                         |
//! | 4  | Bytes       | borrowed bytes                            |
//! | 5  | Uint16      | 0-2 bytes                                 |
//! | 6  | Uint32      | 0-4 bytes                                 |
//! | 7  | Map         | entry count, pairs follow                 |
//! | 8  | Int32       | 0-4 bytes                                 |
//! | 9  | Uint64      | 0-8 bytes                                 |
//! | 10 | Uint128     | 0-16 bytes                                |
//! | 11 | Array       | element count, elements follow            |
//! | 12 | Container   | borrowed bytes                            |
//! | 13 | EndMarker   | borrowed bytes                            |
//! | 14 | Boolean     | stored in the size field, no payload      |
//! | 15 | Float       | 4 bytes, IEEE 754                         |
//!
//! # Format
//!
//! A control byte carries the type in its top 3 bits and a size in the low
//! 5 bits. Type 0 escapes to an extended type byte holding `type - 8`.
//! Sizes 29, 30 and 31 are followed by 1, 2 or 3 extra size bytes.
//!
//! See: https://maxmind.github.io/MaxMind-DB/

use crate::endian::{
    bytes_at, pointer_size, pointer_target, read_f32_be, read_f64_be, read_sint_be, read_u16_be,
    read_u24_be, read_u8, read_uint_be,
};
use crate::error::{MmdbError, Result};
use std::fmt;

/// Size of the reserved all-zero region that opens the data section.
///
/// Data offsets and pointer targets are anchored at the start of this
/// region, so no real value ever lives at offset 0.
pub const DATA_SECTION_SEPARATOR_SIZE: u32 = 16;

/// Longest chain of pointers followed before the data is considered corrupt
pub const MAX_POINTER_CHAIN: usize = 32;

/// Type tag of an encoded value
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Escape code for the extended types; never the type of a decoded value
    Extended = 0,
    /// Pointer to another value
    Pointer = 1,
    /// UTF-8 string
    Utf8String = 2,
    /// IEEE 754 double precision float
    Double = 3,
    /// Raw bytes
    Bytes = 4,
    /// Unsigned 16-bit integer
    Uint16 = 5,
    /// Unsigned 32-bit integer
    Uint32 = 6,
    /// Map with string keys
    Map = 7,
    /// Signed 32-bit integer
    Int32 = 8,
    /// Unsigned 64-bit integer
    Uint64 = 9,
    /// Unsigned 128-bit integer
    Uint128 = 10,
    /// Array of values
    Array = 11,
    /// Data cache container
    Container = 12,
    /// End marker
    EndMarker = 13,
    /// Boolean
    Boolean = 14,
    /// IEEE 754 single precision float
    Float = 15,
}

impl DataType {
    /// Map a numeric type id (0..=15) to its tag
    pub fn from_id(id: u8) -> Option<Self> {
        use DataType::*;
        Some(match id {
            0 => Extended,
            1 => Pointer,
            2 => Utf8String,
            3 => Double,
            4 => Bytes,
            5 => Uint16,
            6 => Uint32,
            7 => Map,
            8 => Int32,
            9 => Uint64,
            10 => Uint128,
            11 => Array,
            12 => Container,
            13 => EndMarker,
            14 => Boolean,
            15 => Float,
            _ => return None,
        })
    }

    /// Name used in dumps and error messages
    pub fn name(self) -> &'static str {
        match self {
            DataType::Extended => "extended",
            DataType::Pointer => "pointer",
            DataType::Utf8String => "utf8_string",
            DataType::Double => "double",
            DataType::Bytes => "bytes",
            DataType::Uint16 => "uint16",
            DataType::Uint32 => "uint32",
            DataType::Map => "map",
            DataType::Int32 => "int32",
            DataType::Uint64 => "uint64",
            DataType::Uint128 => "uint128",
            DataType::Array => "array",
            DataType::Container => "container",
            DataType::EndMarker => "end_marker",
            DataType::Boolean => "boolean",
            DataType::Float => "float",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single decoded value
///
/// Scalars are held by value. Strings, bytes and the opaque container and
/// end-marker payloads borrow the database buffer. Maps and arrays carry
/// their entry count only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// Target offset of a pointer, already anchored at the data section start
    Pointer(u32),
    /// UTF-8 string bytes (not validated until read with `as_str`)
    Utf8String(&'a [u8]),
    /// IEEE 754 double
    Double(f64),
    /// Raw bytes
    Bytes(&'a [u8]),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Map with this many key/value pairs
    Map(u32),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Unsigned 128-bit integer
    Uint128(u128),
    /// Array with this many elements
    Array(u32),
    /// Data cache container payload
    Container(&'a [u8]),
    /// End marker payload
    EndMarker(&'a [u8]),
    /// Boolean
    Boolean(bool),
    /// IEEE 754 float
    Float(f32),
}

impl<'a> Value<'a> {
    /// Type tag of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Pointer(_) => DataType::Pointer,
            Value::Utf8String(_) => DataType::Utf8String,
            Value::Double(_) => DataType::Double,
            Value::Bytes(_) => DataType::Bytes,
            Value::Uint16(_) => DataType::Uint16,
            Value::Uint32(_) => DataType::Uint32,
            Value::Map(_) => DataType::Map,
            Value::Int32(_) => DataType::Int32,
            Value::Uint64(_) => DataType::Uint64,
            Value::Uint128(_) => DataType::Uint128,
            Value::Array(_) => DataType::Array,
            Value::Container(_) => DataType::Container,
            Value::EndMarker(_) => DataType::EndMarker,
            Value::Boolean(_) => DataType::Boolean,
            Value::Float(_) => DataType::Float,
        }
    }

    /// Payload length for string-like values, entry count for maps and arrays,
    /// zero for fixed-width scalars and pointers
    pub fn size(&self) -> usize {
        match self {
            Value::Utf8String(b) | Value::Bytes(b) | Value::Container(b) | Value::EndMarker(b) => {
                b.len()
            }
            Value::Map(n) | Value::Array(n) => *n as usize,
            _ => 0,
        }
    }

    /// Borrowed string, if this is a valid UTF-8 string
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Value::Utf8String(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Borrowed bytes of a string or bytes value
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            Value::Utf8String(b) | Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Any unsigned integer of 64 bits or less, or a non-negative int32
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Uint16(n) => Some(n as u64),
            Value::Uint32(n) => Some(n as u64),
            Value::Uint64(n) => Some(n),
            Value::Int32(n) if n >= 0 => Some(n as u64),
            Value::Uint128(n) => u64::try_from(n).ok(),
            _ => None,
        }
    }

    /// Float or double widened to f64
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Double(d) => Some(d),
            Value::Float(f) => Some(f as f64),
            _ => None,
        }
    }

    /// Boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    fn empty(data_type: DataType) -> Option<Self> {
        Some(match data_type {
            DataType::Utf8String => Value::Utf8String(&[]),
            DataType::Bytes => Value::Bytes(&[]),
            DataType::Container => Value::Container(&[]),
            DataType::EndMarker => Value::EndMarker(&[]),
            DataType::Double => Value::Double(0.0),
            DataType::Float => Value::Float(0.0),
            DataType::Uint64 => Value::Uint64(0),
            DataType::Uint128 => Value::Uint128(0),
            _ => return None,
        })
    }
}

/// A value decoded at a known offset
///
/// `offset` is where the value's encoding starts and `offset_to_next` is the
/// first byte after it, i.e. where the next sibling starts. For a pointer,
/// `offset_to_next` follows the pointer's own bytes, not its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoded<'a> {
    /// Start of this value, relative to the data section
    pub offset: u32,
    /// The decoded value
    pub value: Value<'a>,
    /// First byte after this value's encoding
    pub offset_to_next: u32,
}

impl<'a> Decoded<'a> {
    /// Type tag of the decoded value
    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }

    /// See [`Value::size`]
    pub fn size(&self) -> usize {
        self.value.size()
    }

    /// See [`Value::as_str`]
    pub fn as_str(&self) -> Option<&'a str> {
        self.value.as_str()
    }

    /// Byte-exact comparison of a string or bytes value against `s`
    pub fn eq_str(&self, s: &str) -> bool {
        self.value.as_bytes() == Some(s.as_bytes())
    }

    /// True for maps and arrays
    pub fn is_container(&self) -> bool {
        matches!(self.value, Value::Map(_) | Value::Array(_))
    }
}

/// Data section decoder
///
/// A cheap, copyable view over an encoded data buffer. `pointer_bias` is added
/// to every pointer target: the main data section uses
/// [`DATA_SECTION_SEPARATOR_SIZE`] because its offsets include the separator,
/// the metadata section uses 0.
#[derive(Debug, Clone, Copy)]
pub struct DataDecoder<'a> {
    buffer: &'a [u8],
    pointer_bias: u32,
}

impl<'a> DataDecoder<'a> {
    /// Create a decoder over `buffer`
    pub fn new(buffer: &'a [u8], pointer_bias: u32) -> Self {
        Self {
            buffer,
            pointer_bias,
        }
    }

    /// The underlying buffer
    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    /// Length of the underlying buffer in bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Decode the single value starting at `offset`
    ///
    /// Children of maps and arrays are not decoded; they start at the returned
    /// `offset_to_next`.
    pub fn decode(&self, offset: u32) -> Result<Decoded<'a>> {
        let start = offset as usize;
        let mut cursor = start;

        let ctrl = read_u8(self.buffer, cursor)?;
        cursor += 1;

        let mut type_id = ctrl >> 5;
        if type_id == DataType::Extended as u8 {
            let ext = read_u8(self.buffer, cursor)?;
            cursor += 1;
            type_id = match ext.checked_add(8) {
                Some(t @ 8..=15) => t,
                _ => {
                    return Err(MmdbError::corrupt(format!(
                        "invalid extended type byte {} at offset {}",
                        ext, start
                    )))
                }
            };
        }
        let data_type = DataType::from_id(type_id)
            .ok_or_else(|| MmdbError::corrupt(format!("invalid type id {}", type_id)))?;

        if data_type == DataType::Pointer {
            let target = pointer_target(self.buffer, cursor, ctrl)?
                .checked_add(self.pointer_bias)
                .ok_or_else(|| MmdbError::corrupt("pointer target overflows"))?;
            cursor += pointer_size(ctrl) + 1;
            return self.finish(offset, Value::Pointer(target), cursor);
        }

        let size = self.decode_size(ctrl & 0x1f, &mut cursor)?;

        let (value, consumed) = match data_type {
            DataType::Map => (Value::Map(size as u32), 0),
            DataType::Array => (Value::Array(size as u32), 0),
            // The size field doubles as the boolean value
            DataType::Boolean => (Value::Boolean(size != 0), 0),
            DataType::Uint16 => {
                if size > 2 {
                    return Err(self.oversized(data_type, size, start));
                }
                let n = read_uint_be(self.buffer, cursor, size)?;
                (Value::Uint16(n as u16), size)
            }
            DataType::Uint32 => (
                Value::Uint32(read_uint_be(self.buffer, cursor, size)?),
                size,
            ),
            DataType::Int32 => (Value::Int32(read_sint_be(self.buffer, cursor, size)?), size),
            _ if size == 0 => match Value::empty(data_type) {
                Some(v) => (v, 0),
                None => return Err(MmdbError::corrupt(format!("unexpected {}", data_type))),
            },
            DataType::Uint64 => {
                if size > 8 {
                    return Err(self.oversized(data_type, size, start));
                }
                let bytes = bytes_at(self.buffer, cursor, size)?;
                let n = bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
                (Value::Uint64(n), size)
            }
            DataType::Uint128 => {
                if size > 16 {
                    return Err(self.oversized(data_type, size, start));
                }
                let bytes = bytes_at(self.buffer, cursor, size)?;
                let n = bytes.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128);
                (Value::Uint128(n), size)
            }
            // Fixed width: a nonzero size field is not checked
            DataType::Float => (Value::Float(read_f32_be(self.buffer, cursor)?), 4),
            DataType::Double => (Value::Double(read_f64_be(self.buffer, cursor)?), 8),
            DataType::Utf8String => (
                Value::Utf8String(bytes_at(self.buffer, cursor, size)?),
                size,
            ),
            DataType::Bytes => (Value::Bytes(bytes_at(self.buffer, cursor, size)?), size),
            DataType::Container => (
                Value::Container(bytes_at(self.buffer, cursor, size)?),
                size,
            ),
            DataType::EndMarker => (
                Value::EndMarker(bytes_at(self.buffer, cursor, size)?),
                size,
            ),
            DataType::Pointer | DataType::Extended => {
                return Err(MmdbError::corrupt(format!("unexpected {}", data_type)))
            }
        };

        self.finish(offset, value, cursor + consumed)
    }

    /// Decode at `offset` and, if the value is a pointer, decode its target once
    pub fn decode_follow(&self, offset: u32) -> Result<Decoded<'a>> {
        let decoded = self.decode(offset)?;
        self.follow(decoded)
    }

    /// Replace a pointer by the value it points to (one hop)
    pub fn follow(&self, decoded: Decoded<'a>) -> Result<Decoded<'a>> {
        match decoded.value {
            Value::Pointer(target) => self.decode(target),
            _ => Ok(decoded),
        }
    }

    /// Follow a chain of pointers to the first non-pointer value
    ///
    /// Gives up with `CorruptDatabase` after [`MAX_POINTER_CHAIN`] hops.
    pub fn resolve(&self, mut decoded: Decoded<'a>) -> Result<Decoded<'a>> {
        for _ in 0..MAX_POINTER_CHAIN {
            match decoded.value {
                Value::Pointer(target) => decoded = self.decode(target)?,
                _ => return Ok(decoded),
            }
        }
        Err(MmdbError::corrupt(format!(
            "pointer chain longer than {} at offset {}",
            MAX_POINTER_CHAIN, decoded.offset
        )))
    }

    fn decode_size(&self, size_bits: u8, cursor: &mut usize) -> Result<usize> {
        match size_bits {
            0..=28 => Ok(size_bits as usize),
            29 => {
                let extra = read_u8(self.buffer, *cursor)? as usize;
                *cursor += 1;
                Ok(29 + extra)
            }
            30 => {
                let extra = read_u16_be(self.buffer, *cursor)? as usize;
                *cursor += 2;
                Ok(285 + extra)
            }
            _ => {
                let extra = read_u24_be(self.buffer, *cursor)? as usize;
                *cursor += 3;
                Ok(65_821 + extra)
            }
        }
    }

    fn finish(&self, offset: u32, value: Value<'a>, next: usize) -> Result<Decoded<'a>> {
        let offset_to_next = u32::try_from(next)
            .map_err(|_| MmdbError::corrupt(format!("value at {} runs past 4GiB", offset)))?;
        Ok(Decoded {
            offset,
            value,
            offset_to_next,
        })
    }

    fn oversized(&self, data_type: DataType, size: usize, offset: usize) -> MmdbError {
        MmdbError::corrupt(format!(
            "{} of {} bytes at offset {}",
            data_type, size, offset
        ))
    }
}
