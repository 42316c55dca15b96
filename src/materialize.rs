//! Whole-subtree expansion of a data section value
//!
//! [`materialize`] turns the value at an offset into a flat preorder list:
//! a map of `n` entries is followed by its `n` key/value pairs, an array of
//! `n` elements by its `n` elements, each child subtree laid out the same
//! way. The walk uses an explicit stack, so input nesting never translates
//! into native recursion.
//!
//! Pointers are replaced by their targets in place. Every node's
//! `offset_to_next` is the position following it in the stream it was
//! reached from: for a value reached through a pointer that is the end of
//! the pointer, and for an inline map or array it is the end of its last
//! child.

use crate::data_section::{DataDecoder, Decoded, Value};
use crate::error::{MmdbError, Result};
use tracing::debug;

/// Default bound on map/array nesting
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// An open map or array whose children are still being decoded
struct Frame {
    /// Index of the container node in the output
    index: usize,
    /// Child values not yet complete
    remaining: u64,
    /// Stream position after the container when it was reached via a pointer
    resume: Option<u32>,
}

/// Expand the value at `offset` and everything below it
///
/// Fails with `CorruptDatabase` on malformed data, on a pointer chain longer
/// than [`MAX_POINTER_CHAIN`](crate::data_section::MAX_POINTER_CHAIN), or when
/// containers nest deeper than `max_depth`. Fails with `OutOfMemory` if the
/// node list cannot grow.
pub fn materialize<'a>(
    decoder: &DataDecoder<'a>,
    offset: u32,
    max_depth: usize,
) -> Result<Vec<Decoded<'a>>> {
    let mut nodes: Vec<Decoded<'a>> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut cursor = offset;

    loop {
        let raw = decoder.decode(cursor)?;
        let resolved = decoder.resolve(raw)?;
        let via_pointer = matches!(raw.value, Value::Pointer(_));

        nodes.try_reserve(1)?;
        let index = nodes.len();
        nodes.push(Decoded {
            offset_to_next: raw.offset_to_next,
            ..resolved
        });

        let children = match resolved.value {
            Value::Map(len) => 2 * len as u64,
            Value::Array(len) => len as u64,
            _ => 0,
        };

        if children > 0 {
            if stack.len() >= max_depth {
                return Err(MmdbError::corrupt(format!(
                    "data nested deeper than {} levels at offset {}",
                    max_depth, resolved.offset
                )));
            }
            // Every child takes at least one byte
            let available = decoder.len().saturating_sub(resolved.offset_to_next as usize);
            if children > available as u64 {
                return Err(MmdbError::corrupt(format!(
                    "{} at offset {} claims {} children in {} remaining bytes",
                    resolved.data_type(),
                    resolved.offset,
                    children,
                    available
                )));
            }
            stack.push(Frame {
                index,
                remaining: children,
                resume: via_pointer.then_some(raw.offset_to_next),
            });
            cursor = resolved.offset_to_next;
            continue;
        }

        // A value just completed; close every container it finishes
        let mut next = raw.offset_to_next;
        loop {
            let Some(frame) = stack.last_mut() else {
                debug!(offset, nodes = nodes.len(), "materialized value");
                return Ok(nodes);
            };
            frame.remaining -= 1;
            if frame.remaining > 0 {
                cursor = next;
                break;
            }
            let end = frame.resume.unwrap_or(next);
            nodes[frame.index].offset_to_next = end;
            next = end;
            stack.pop();
        }
    }
}
