//! Conversion of materialized values for display
//!
//! Both functions consume the preorder sequence produced by
//! [`Entry::get_tree`](crate::Entry::get_tree).
//!
//! - [`to_json`] rebuilds a `serde_json::Value`. Bytes become arrays of
//!   numbers and uint128 values become decimal strings, since JSON numbers
//!   cannot hold them.
//! - [`dump`] writes the plain text dump: one scalar per line, map keys and
//!   values alike, indented two spaces per level of nesting.

use crate::data_section::{Decoded, Value};
use crate::error::{MmdbError, Result};
use serde_json::{Map, Number, Value as JsonValue};
use std::io::{self, Write};

/// Container being rebuilt by [`to_json`]
enum Open {
    Object {
        map: Map<String, JsonValue>,
        key: Option<String>,
        remaining: u32,
    },
    Array {
        items: Vec<JsonValue>,
        remaining: u32,
    },
}

impl Open {
    fn is_complete(&self) -> bool {
        match self {
            Open::Object { remaining, key, .. } => *remaining == 0 && key.is_none(),
            Open::Array { remaining, .. } => *remaining == 0,
        }
    }

    fn finish(self) -> JsonValue {
        match self {
            Open::Object { map, .. } => JsonValue::Object(map),
            Open::Array { items, .. } => JsonValue::Array(items),
        }
    }
}

/// Rebuild a JSON value from a materialized preorder sequence
///
/// Fails with `CorruptDatabase` if the sequence is empty, truncated, or has
/// a map key that is not a string.
pub fn to_json(nodes: &[Decoded<'_>]) -> Result<JsonValue> {
    let mut stack: Vec<Open> = Vec::new();

    for node in nodes {
        let mut value = match node.value {
            Value::Map(len) if len > 0 => {
                stack.push(Open::Object {
                    map: Map::new(),
                    key: None,
                    remaining: len,
                });
                continue;
            }
            Value::Array(len) if len > 0 => {
                stack.push(Open::Array {
                    items: Vec::with_capacity((len as usize).min(nodes.len())),
                    remaining: len,
                });
                continue;
            }
            _ => scalar_to_json(&node.value),
        };

        // Attach the completed value to its parent, closing finished parents
        loop {
            let Some(top) = stack.last_mut() else {
                return Ok(value);
            };
            match top {
                Open::Object {
                    map,
                    key,
                    remaining,
                } => match key.take() {
                    None => match value {
                        JsonValue::String(s) if *remaining > 0 => {
                            *key = Some(s);
                            break;
                        }
                        _ => {
                            return Err(MmdbError::corrupt(format!(
                                "map key at offset {} is not a string",
                                node.offset
                            )))
                        }
                    },
                    Some(k) => {
                        map.insert(k, value);
                        *remaining -= 1;
                    }
                },
                Open::Array { items, remaining } => {
                    items.push(value);
                    *remaining -= 1;
                }
            }

            if !stack.last().is_some_and(Open::is_complete) {
                break;
            }
            match stack.pop() {
                Some(done) => value = done.finish(),
                None => break,
            }
        }
    }

    Err(MmdbError::corrupt(format!(
        "value sequence of {} nodes ends inside a map or array",
        nodes.len()
    )))
}

fn scalar_to_json(value: &Value<'_>) -> JsonValue {
    match *value {
        Value::Utf8String(b) => JsonValue::String(String::from_utf8_lossy(b).into_owned()),
        Value::Bytes(b) => JsonValue::Array(b.iter().map(|&x| JsonValue::from(x)).collect()),
        Value::Double(d) => float(d),
        Value::Float(f) => float(f as f64),
        Value::Uint16(n) => JsonValue::from(n),
        Value::Uint32(n) => JsonValue::from(n),
        Value::Int32(n) => JsonValue::from(n),
        Value::Uint64(n) => JsonValue::from(n),
        Value::Uint128(n) => JsonValue::String(n.to_string()),
        Value::Boolean(b) => JsonValue::Bool(b),
        Value::Map(_) => JsonValue::Object(Map::new()),
        Value::Array(_) => JsonValue::Array(Vec::new()),
        Value::Pointer(_) | Value::Container(_) | Value::EndMarker(_) => JsonValue::Null,
    }
}

fn float(f: f64) -> JsonValue {
    Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number)
}

/// Write the indented text dump of a materialized preorder sequence
///
/// Maps and arrays print nothing themselves; their keys, values and
/// elements are indented two spaces deeper than the container.
pub fn dump<W: Write>(nodes: &[Decoded<'_>], writer: &mut W) -> io::Result<()> {
    // Children still to print for each open container
    let mut open: Vec<u64> = Vec::new();

    for node in nodes {
        let children = match node.value {
            Value::Map(len) => 2 * len as u64,
            Value::Array(len) => len as u64,
            _ => 0,
        };

        if children > 0 {
            open.push(children);
            continue;
        }

        if !node.is_container() {
            let indent = open.len() * 2;
            write!(writer, "{:indent$}", "", indent = indent)?;
            write_scalar(&node.value, writer)?;
            writeln!(writer)?;
        }

        // Close every container this value completes
        while let Some(remaining) = open.last_mut() {
            *remaining -= 1;
            if *remaining > 0 {
                break;
            }
            open.pop();
        }
    }

    Ok(())
}

fn write_scalar<W: Write>(value: &Value<'_>, writer: &mut W) -> io::Result<()> {
    match *value {
        Value::Utf8String(b) => writer.write_all(b),
        Value::Bytes(b) | Value::Container(b) | Value::EndMarker(b) => {
            for byte in b {
                write!(writer, "{:02x}", byte)?;
            }
            Ok(())
        }
        Value::Double(d) => write!(writer, "{:.6}", d),
        Value::Float(f) => write!(writer, "{:.6}", f),
        Value::Uint16(n) => write!(writer, "{}", n),
        Value::Uint32(n) => write!(writer, "{}", n),
        Value::Int32(n) => write!(writer, "{}", n),
        Value::Uint64(n) => write!(writer, "{}", n),
        Value::Uint128(n) => write!(writer, "{}", n),
        Value::Boolean(b) => write!(writer, "{}", b),
        Value::Pointer(target) => write!(writer, "-> {}", target),
        Value::Map(_) | Value::Array(_) => Ok(()),
    }
}
