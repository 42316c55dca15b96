//! Key-path navigation through the data section
//!
//! Walks a path of map keys and array indices from a starting value down to a
//! single value without materializing anything on the way. Siblings that are
//! not on the path are skipped structurally: each skipped value is decoded
//! just far enough to know where it ends.
//!
//! Pointers met on the way are resolved, so a path element can descend into a
//! deduplicated map or array stored elsewhere in the section.

use crate::data_section::{DataDecoder, Decoded, Value};
use crate::error::{MmdbError, Result};

/// Find the value at `path` below the value starting at `offset`
///
/// Map segments match keys byte-exactly. Array segments must be a decimal
/// index in `[0, len)`. Returns `Ok(None)` when a key is missing, an index is
/// out of range or not a number, or the path descends into a scalar. An
/// empty path returns the starting value itself.
///
/// # Example
///
/// ```rust
/// use tinymmdb::data_section::DataDecoder;
/// use tinymmdb::path::get_value;
///
/// // {"iso_code": "US"}
/// let bytes = [0xe1, 0x48, b'i', b's', b'o', b'_', b'c', b'o', b'd', b'e', 0x42, b'U', b'S'];
/// let decoder = DataDecoder::new(&bytes, 0);
///
/// let value = get_value(&decoder, 0, &["iso_code"]).unwrap().unwrap();
/// assert_eq!(value.as_str(), Some("US"));
/// assert!(get_value(&decoder, 0, &["names"]).unwrap().is_none());
/// ```
pub fn get_value<'a, S: AsRef<str>>(
    decoder: &DataDecoder<'a>,
    offset: u32,
    path: &[S],
) -> Result<Option<Decoded<'a>>> {
    let mut current = decoder.resolve(decoder.decode(offset)?)?;

    for segment in path {
        let segment = segment.as_ref();
        let next = match current.value {
            Value::Map(len) => find_key(decoder, current.offset_to_next, len, segment)?,
            Value::Array(len) => match parse_index(segment) {
                Some(index) if index < len => {
                    let mut cursor = current.offset_to_next;
                    for _ in 0..index {
                        cursor = skip(decoder, cursor)?;
                    }
                    Some(cursor)
                }
                _ => None,
            },
            _ => None,
        };

        match next {
            Some(value_offset) => current = decoder.resolve(decoder.decode(value_offset)?)?,
            None => return Ok(None),
        }
    }

    Ok(Some(current))
}

/// Scan `len` key/value pairs starting at `cursor` for `key`
///
/// Returns the offset of the matching value.
fn find_key(
    decoder: &DataDecoder<'_>,
    mut cursor: u32,
    len: u32,
    key: &str,
) -> Result<Option<u32>> {
    for _ in 0..len {
        let raw = decoder.decode(cursor)?;
        let candidate = decoder.resolve(raw)?;
        let bytes = candidate.value.as_bytes().ok_or_else(|| {
            MmdbError::corrupt(format!(
                "map key at offset {} is a {}, expected a string",
                candidate.offset,
                candidate.data_type()
            ))
        })?;

        if bytes == key.as_bytes() {
            return Ok(Some(raw.offset_to_next));
        }
        cursor = skip(decoder, raw.offset_to_next)?;
    }
    Ok(None)
}

/// Array index: ASCII digits only, no sign
fn parse_index(segment: &str) -> Option<u32> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Offset just past the complete value starting at `offset`
///
/// Counts pending values instead of recursing: a map adds two per entry, an
/// array one per element. Pointers are not followed; they occupy only their
/// own bytes in the stream.
pub fn skip(decoder: &DataDecoder<'_>, offset: u32) -> Result<u32> {
    let mut cursor = offset;
    let mut pending: u64 = 1;

    while pending > 0 {
        let decoded = decoder.decode(cursor)?;
        pending -= 1;
        match decoded.value {
            Value::Map(len) => pending += 2 * len as u64,
            Value::Array(len) => pending += len as u64,
            _ => {}
        }
        cursor = decoded.offset_to_next;
    }

    Ok(cursor)
}
