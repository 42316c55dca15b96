//! MMDB Binary Format Parsing
//!
//! This module locates the metadata block and extracts the layout of the
//! search tree and data section. Only the handful of integers needed for
//! lookups are copied out; the metadata map itself stays in the buffer and
//! is decoded on demand through the same decoder used for the data section.
//!
//! Design:
//! - Find metadata marker (reverse slice search in the file tail, no allocation)
//! - Decode required fields with the path navigator, no materialization
//! - Optional descriptive fields are collected into [`Metadata`]

use super::types::{IpVersion, RecordSize, METADATA_MARKER, METADATA_SEARCH_SIZE};
use crate::data_section::{DataDecoder, Value, DATA_SECTION_SEPARATOR_SIZE};
use crate::error::{MmdbError, Result};
use crate::path::{get_value, skip};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// MMDB file header - derived layout parameters
///
/// Contains only the information needed for IP lookups and data decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmdbHeader {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits (24, 28, or 32)
    pub record_size: RecordSize,
    /// IP version (4 or 6)
    pub ip_version: IpVersion,
    /// Size of the search tree in bytes; also where the data section begins
    pub tree_size: usize,
    /// `binary_format_major_version`
    pub format_major: u32,
    /// `binary_format_minor_version`
    pub format_minor: u32,
    /// File offset of the first byte after the metadata marker
    pub metadata_start: usize,
    /// File offset of the metadata marker (end of the data section)
    pub data_section_end: usize,
}

impl MmdbHeader {
    /// Parse MMDB file and extract header information
    pub fn from_file(data: &[u8]) -> Result<Self> {
        let marker_offset = find_metadata_marker(data)?;
        let metadata_start = marker_offset + METADATA_MARKER.len();
        let decoder = metadata_decoder(data, metadata_start);

        let format_major = required_uint(&decoder, "binary_format_major_version")?;
        let format_minor = required_uint(&decoder, "binary_format_minor_version")?;
        if format_major != 2 {
            return Err(MmdbError::UnsupportedFormat {
                major: format_major as u32,
                minor: format_minor as u32,
            });
        }

        let record_size = RecordSize::from_bits(required_uint(&decoder, "record_size")?)?;
        let node_count = required_uint(&decoder, "node_count")?;
        let node_count = u32::try_from(node_count)
            .map_err(|_| MmdbError::invalid(format!("node_count {} too large", node_count)))?;
        let ip_version = IpVersion::from_metadata(required_uint(&decoder, "ip_version")?);

        let tree_size = (node_count as usize) * record_size.node_bytes();
        if tree_size + DATA_SECTION_SEPARATOR_SIZE as usize > marker_offset {
            return Err(MmdbError::invalid(format!(
                "search tree of {} bytes does not fit before metadata at {}",
                tree_size, marker_offset
            )));
        }

        let header = MmdbHeader {
            node_count,
            record_size,
            ip_version,
            tree_size,
            format_major: format_major as u32,
            format_minor: format_minor as u32,
            metadata_start,
            data_section_end: marker_offset,
        };
        debug!(
            node_count,
            record_bits = record_size.bits(),
            address_bits = ip_version.address_bits(),
            tree_size,
            "parsed database header"
        );
        Ok(header)
    }

    /// Bits walked per lookup
    pub fn address_bits(&self) -> u8 {
        self.ip_version.address_bits()
    }

    /// Decoder over the data section (separator included)
    pub fn data_decoder<'a>(&self, data: &'a [u8]) -> DataDecoder<'a> {
        let section = data
            .get(self.tree_size..self.data_section_end)
            .unwrap_or(&[]);
        DataDecoder::new(section, DATA_SECTION_SEPARATOR_SIZE)
    }

    /// Decoder over the metadata map
    pub fn metadata_decoder<'a>(&self, data: &'a [u8]) -> DataDecoder<'a> {
        metadata_decoder(data, self.metadata_start)
    }
}

/// Decoded database metadata
///
/// The required layout fields plus the common descriptive ones. Fields that
/// are absent from the file are `None` / empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    /// Format major version (always 2 for a usable database)
    pub binary_format_major_version: u32,
    /// Format minor version
    pub binary_format_minor_version: u32,
    /// Record size in bits
    pub record_size: u16,
    /// Number of search tree nodes
    pub node_count: u32,
    /// 4 or 6
    pub ip_version: u8,
    /// Free-form database type, e.g. "GeoIP2-City"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_type: Option<String>,
    /// Build time in seconds since the Unix epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_epoch: Option<u64>,
    /// Locale codes the database carries names for
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    /// Description keyed by language
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub description: BTreeMap<String, String>,
}

impl Metadata {
    /// Collect metadata from the already parsed header plus the optional fields
    ///
    /// Any decoding failure inside the metadata map is `InvalidDatabase`.
    pub fn read(data: &[u8], header: &MmdbHeader) -> Result<Self> {
        Self::read_fields(data, header).map_err(|e| match e {
            MmdbError::InvalidDatabase(_) => e,
            other => MmdbError::invalid(format!("cannot decode metadata: {}", other)),
        })
    }

    fn read_fields(data: &[u8], header: &MmdbHeader) -> Result<Self> {
        let decoder = header.metadata_decoder(data);

        let database_type = get_value(&decoder, 0, &["database_type"])?
            .and_then(|d| d.as_str().map(str::to_owned));
        let build_epoch = get_value(&decoder, 0, &["build_epoch"])?.and_then(|d| d.value.as_u64());

        let mut languages = Vec::new();
        if let Some(list) = get_value(&decoder, 0, &["languages"])? {
            if let Value::Array(len) = list.value {
                for i in 0..len {
                    let index = i.to_string();
                    if let Some(lang) = get_value(&decoder, 0, &["languages", index.as_str()])? {
                        if let Some(s) = lang.as_str() {
                            languages.push(s.to_owned());
                        }
                    }
                }
            }
        }

        let mut description = BTreeMap::new();
        if let Some(map) = get_value(&decoder, 0, &["description"])? {
            if let Value::Map(len) = map.value {
                let mut cursor = map.offset_to_next;
                for _ in 0..len {
                    let raw_key = decoder.decode(cursor)?;
                    let key = decoder.resolve(raw_key)?;
                    let value = decoder.resolve(decoder.decode(raw_key.offset_to_next)?)?;
                    // Non-string entries are skipped whole, nested or not
                    if let (Some(k), Some(v)) = (key.as_str(), value.as_str()) {
                        description.insert(k.to_owned(), v.to_owned());
                    }
                    cursor = skip(&decoder, raw_key.offset_to_next)?;
                }
            }
        }

        Ok(Metadata {
            binary_format_major_version: header.format_major,
            binary_format_minor_version: header.format_minor,
            record_size: header.record_size.bits(),
            node_count: header.node_count,
            ip_version: match header.ip_version {
                IpVersion::V4 => 4,
                IpVersion::V6 => 6,
            },
            database_type,
            build_epoch,
            languages,
            description,
        })
    }
}

/// Find the metadata marker in MMDB file (zero allocation)
///
/// The marker "\xAB\xCD\xEFMaxMind.com" must appear within the last 4096
/// bytes of the file. The metadata comes AFTER the marker. If the marker
/// occurs more than once, the last occurrence wins.
pub fn find_metadata_marker(data: &[u8]) -> Result<usize> {
    let search_start = data.len().saturating_sub(METADATA_SEARCH_SIZE);
    memchr::memmem::rfind(&data[search_start..], METADATA_MARKER)
        .map(|pos| search_start + pos)
        .ok_or_else(|| MmdbError::invalid("metadata marker not found"))
}

fn metadata_decoder(data: &[u8], metadata_start: usize) -> DataDecoder<'_> {
    DataDecoder::new(data.get(metadata_start..).unwrap_or(&[]), 0)
}

fn required_uint(decoder: &DataDecoder<'_>, key: &str) -> Result<u64> {
    match get_value(decoder, 0, &[key]) {
        Ok(Some(d)) => d.value.as_u64().ok_or_else(|| {
            MmdbError::invalid(format!(
                "metadata field '{}' is a {}, not an unsigned integer",
                key,
                d.data_type()
            ))
        }),
        Ok(None) => Err(MmdbError::invalid(format!(
            "required metadata field '{}' not found",
            key
        ))),
        Err(e) => Err(MmdbError::invalid(format!("cannot decode metadata: {}", e))),
    }
}
