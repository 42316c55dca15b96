//! Test-only MaxMind DB writer
//!
//! Builds complete database images in memory: a data section encoder, a
//! search tree writer for all three record sizes, and the metadata block.
//! `geoip_sample` lays out records shaped like the MaxMind GeoIP2 test
//! databases so integration tests can check real-world key paths.

#![allow(dead_code)]

use std::net::IpAddr;

pub const MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";
pub const SEPARATOR: u32 = 16;

/// A value to encode
#[derive(Debug, Clone)]
pub enum Data {
    Str(String),
    Double(f64),
    Bytes(Vec<u8>),
    U16(u16),
    U32(u32),
    Map(Vec<(Data, Data)>),
    I32(i32),
    U64(u64),
    U128(u128),
    Array(Vec<Data>),
    Bool(bool),
    Float(f32),
    /// Data section offset of the target, separator included
    Pointer(u32),
}

pub fn s(v: &str) -> Data {
    Data::Str(v.to_string())
}

pub fn map(entries: Vec<(&str, Data)>) -> Data {
    Data::Map(entries.into_iter().map(|(k, v)| (s(k), v)).collect())
}

pub fn names(pairs: &[(&str, &str)]) -> Data {
    map(pairs.iter().map(|(k, v)| (*k, s(v))).collect())
}

fn control(type_id: u8, size: usize, out: &mut Vec<u8>) {
    let (low, extra): (u8, Vec<u8>) = if size < 29 {
        (size as u8, vec![])
    } else if size < 285 {
        (29, vec![(size - 29) as u8])
    } else if size < 65_821 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        (31, ((size - 65_821) as u32).to_be_bytes()[1..].to_vec())
    };
    if type_id <= 7 {
        out.push((type_id << 5) | low);
    } else {
        out.push(low);
        out.push(type_id - 8);
    }
    out.extend(extra);
}

fn minimal_be(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Encode a value; pointers are relative to the data section start
pub fn encode(value: &Data, out: &mut Vec<u8>) {
    match value {
        Data::Str(v) => {
            control(2, v.len(), out);
            out.extend_from_slice(v.as_bytes());
        }
        Data::Double(d) => {
            control(3, 8, out);
            out.extend(d.to_be_bytes());
        }
        Data::Bytes(b) => {
            control(4, b.len(), out);
            out.extend(b);
        }
        Data::U16(n) => {
            let bytes = n.to_be_bytes();
            let b = minimal_be(&bytes);
            control(5, b.len(), out);
            out.extend(b);
        }
        Data::U32(n) => {
            let bytes = n.to_be_bytes();
            let b = minimal_be(&bytes);
            control(6, b.len(), out);
            out.extend(b);
        }
        Data::Map(entries) => {
            control(7, entries.len(), out);
            for (k, v) in entries {
                encode(k, out);
                encode(v, out);
            }
        }
        Data::I32(n) => {
            let bytes = n.to_be_bytes();
            let b = if *n < 0 { &bytes[..] } else { minimal_be(&bytes) };
            control(8, b.len(), out);
            out.extend(b);
        }
        Data::U64(n) => {
            let bytes = n.to_be_bytes();
            let b = minimal_be(&bytes);
            control(9, b.len(), out);
            out.extend(b);
        }
        Data::U128(n) => {
            let bytes = n.to_be_bytes();
            let b = minimal_be(&bytes);
            control(10, b.len(), out);
            out.extend(b);
        }
        Data::Array(items) => {
            control(11, items.len(), out);
            for item in items {
                encode(item, out);
            }
        }
        Data::Bool(b) => control(14, *b as usize, out),
        Data::Float(f) => {
            control(15, 4, out);
            out.extend(f.to_be_bytes());
        }
        Data::Pointer(target) => encode_pointer(target - SEPARATOR, out),
    }
}

fn encode_pointer(raw: u32, out: &mut Vec<u8>) {
    if raw < 2048 {
        out.push(0x20 | ((raw >> 8) & 0x7) as u8);
        out.push(raw as u8);
    } else if raw < 526_336 {
        let v = raw - 2048;
        out.push(0x28 | ((v >> 16) & 0x7) as u8);
        out.extend(&v.to_be_bytes()[2..]);
    } else if raw < 134_744_064 {
        let v = raw - 526_336;
        out.push(0x30 | ((v >> 24) & 0x7) as u8);
        out.extend(&v.to_be_bytes()[1..]);
    } else {
        out.push(0x38);
        out.extend(raw.to_be_bytes());
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Record {
    Empty,
    Node(u32),
    Data(u32),
}

/// In-memory database under construction
pub struct TestDb {
    ip_version: u16,
    record_size: u16,
    nodes: Vec<[Record; 2]>,
    data: Vec<u8>,
    metadata: Option<Data>,
}

impl TestDb {
    pub fn new(ip_version: u16, record_size: u16) -> Self {
        assert!(ip_version == 4 || ip_version == 6);
        assert!(matches!(record_size, 24 | 28 | 32));
        Self {
            ip_version,
            record_size,
            nodes: vec![[Record::Empty; 2]],
            data: Vec::new(),
            metadata: None,
        }
    }

    fn address_bits(&self) -> u32 {
        if self.ip_version == 4 {
            32
        } else {
            128
        }
    }

    /// Append a value; returns its offset in the data section
    pub fn add(&mut self, value: &Data) -> u32 {
        let offset = SEPARATOR + self.data.len() as u32;
        encode(value, &mut self.data);
        offset
    }

    /// Append raw encoded bytes; returns their offset in the data section
    pub fn add_raw(&mut self, bytes: &[u8]) -> u32 {
        let offset = SEPARATOR + self.data.len() as u32;
        self.data.extend_from_slice(bytes);
        offset
    }

    /// Point every address in `network` ("a.b.c.d/n" or "x::/n") at `offset`
    ///
    /// IPv4 networks in a 128-bit tree land below `::/96`. Insert less
    /// specific networks before more specific ones.
    pub fn insert(&mut self, network: &str, offset: u32) {
        let (addr, prefix) = network.split_once('/').expect("network needs a prefix");
        let addr: IpAddr = addr.parse().expect("bad network address");
        let mut prefix: u32 = prefix.parse().expect("bad prefix");
        let bits = match addr {
            IpAddr::V4(v4) => {
                if self.ip_version == 6 {
                    prefix += 96;
                }
                u32::from(v4) as u128
            }
            IpAddr::V6(v6) => {
                assert_eq!(self.ip_version, 6, "IPv6 network in an IPv4 tree");
                u128::from(v6)
            }
        };
        assert!(prefix >= 1 && prefix <= self.address_bits());

        let top = self.address_bits() - 1;
        let mut node = 0usize;
        for depth in 0..prefix {
            let bit = ((bits >> (top - depth)) & 1) as usize;
            if depth == prefix - 1 {
                self.nodes[node][bit] = Record::Data(offset);
                return;
            }
            node = match self.nodes[node][bit] {
                Record::Node(next) => next as usize,
                other => {
                    let fill = match other {
                        Record::Data(d) => Record::Data(d),
                        _ => Record::Empty,
                    };
                    let next = self.nodes.len();
                    self.nodes.push([fill, fill]);
                    self.nodes[node][bit] = Record::Node(next as u32);
                    next
                }
            };
        }
    }

    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Replace the generated metadata map
    pub fn with_metadata(mut self, metadata: Data) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn standard_metadata(&self) -> Data {
        map(vec![
            ("binary_format_major_version", Data::U16(2)),
            ("binary_format_minor_version", Data::U16(0)),
            ("build_epoch", Data::U64(1_700_000_000)),
            ("database_type", s("tinymmdb-Test")),
            (
                "description",
                names(&[("en", "tinymmdb synthetic test database"), ("zh", "测试数据库")]),
            ),
            ("ip_version", Data::U16(self.ip_version)),
            ("languages", Data::Array(vec![s("de"), s("en"), s("ja")])),
            ("node_count", Data::U32(self.node_count())),
            ("record_size", Data::U16(self.record_size)),
        ])
    }

    fn record_value(&self, record: Record) -> u32 {
        let node_count = self.node_count();
        match record {
            Record::Empty => node_count,
            Record::Node(n) => n,
            Record::Data(offset) => node_count + offset,
        }
    }

    pub fn tree_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for [left, right] in &self.nodes {
            let l = self.record_value(*left);
            let r = self.record_value(*right);
            match self.record_size {
                24 => {
                    out.extend(&l.to_be_bytes()[1..]);
                    out.extend(&r.to_be_bytes()[1..]);
                }
                28 => {
                    out.extend(&l.to_be_bytes()[1..]);
                    out.push((((l >> 24) & 0xf) << 4) as u8 | ((r >> 24) & 0xf) as u8);
                    out.extend(&r.to_be_bytes()[1..]);
                }
                _ => {
                    out.extend(l.to_be_bytes());
                    out.extend(r.to_be_bytes());
                }
            }
        }
        out
    }

    /// Complete database file image
    pub fn build(&self) -> Vec<u8> {
        let mut out = self.tree_bytes();
        out.extend([0u8; SEPARATOR as usize]);
        out.extend(&self.data);
        out.extend(MARKER);
        let metadata = self
            .metadata
            .clone()
            .unwrap_or_else(|| self.standard_metadata());
        encode(&metadata, &mut out);
        out
    }
}

pub const ARRAY_DOUBLES: [f64; 14] = [
    0.0,
    0.0,
    1.0,
    0.1,
    0.123,
    10.0,
    7.99,
    1_000_000_000.0,
    -1.0,
    -0.1,
    -0.123,
    -10.0,
    -7.99,
    -1_000_000_000.0,
];

/// Database shaped like the MaxMind GeoIP2 City test database
///
/// - `24.24.24.0/24`: United States, Milton, Vermont, plus a `test_data`
///   map exercising every value type. The country iso_code key and the
///   country names map are stored once and reached through pointers.
/// - `81.2.69.160/27`: United Kingdom, London, England; its
///   `registered_country` points at the shared United States names map.
/// - `2001:db8::/32` (IPv6 trees only): the London record again.
/// - Everything else, including `127.0.0.1`, has no data.
pub fn geoip_sample(ip_version: u16, record_size: u16) -> Vec<u8> {
    let mut db = TestDb::new(ip_version, record_size);

    let us_names = db.add(&names(&[
        ("de", "USA"),
        ("en", "United States"),
        ("ja", "アメリカ合衆国"),
    ]));
    let iso_code_key = db.add(&s("iso_code"));

    let doubles = Data::Array(ARRAY_DOUBLES.iter().map(|&d| Data::Double(d)).collect());

    let us = map(vec![
        (
            "city",
            map(vec![
                ("geoname_id", Data::U32(5_089_178)),
                ("names", names(&[("en", "Milton")])),
            ]),
        ),
        (
            "continent",
            map(vec![
                ("code", s("NA")),
                ("names", names(&[("de", "Nordamerika"), ("en", "North America")])),
            ]),
        ),
        (
            "country",
            Data::Map(vec![
                (s("geoname_id"), Data::U32(6_252_001)),
                (Data::Pointer(iso_code_key), s("US")),
                (s("names"), Data::Pointer(us_names)),
            ]),
        ),
        (
            "location",
            map(vec![
                ("accuracy_radius", Data::U16(22)),
                ("latitude", Data::Double(44.4)),
                ("longitude", Data::Double(-73.2)),
                ("time_zone", s("America/New_York")),
            ]),
        ),
        (
            "subdivisions",
            Data::Array(vec![map(vec![
                ("iso_code", s("VT")),
                ("names", names(&[("en", "Vermont")])),
            ])]),
        ),
        (
            "test_data",
            map(vec![
                (
                    "max",
                    map(vec![
                        ("double_t", Data::Double(999_999_999.9999)),
                        ("float_t", Data::Float(9999.99)),
                        ("int32_t", Data::I32(i32::MAX)),
                        ("uint128_t", Data::U128(u128::MAX)),
                        ("uint16_t", Data::U16(u16::MAX)),
                        ("uint32_t", Data::U32(u32::MAX)),
                        ("uint64_t", Data::U64(u64::MAX)),
                    ]),
                ),
                (
                    "tst",
                    map(vec![
                        ("array_ieee754_double_t", doubles),
                        ("boolean_t", Data::Bool(true)),
                        ("bytes_t", Data::Bytes(vec![0, 0, 0, 42])),
                        ("empty_array", Data::Array(vec![])),
                        ("empty_map", Data::Map(vec![])),
                        ("int32_t", Data::I32(-268_435_456)),
                        ("uint16_t", Data::U16(100)),
                        ("utf8_string_t", s("unicode! ☯ - ♫")),
                    ]),
                ),
            ]),
        ),
        (
            "traits",
            map(vec![
                ("cellular", Data::Bool(true)),
                ("is_military", Data::Bool(false)),
            ]),
        ),
    ]);
    let us_offset = db.add(&us);

    let gb = map(vec![
        ("city", map(vec![("names", names(&[("en", "London")]))])),
        (
            "country",
            map(vec![
                ("iso_code", s("GB")),
                ("names", names(&[("en", "United Kingdom")])),
            ]),
        ),
        (
            "location",
            map(vec![
                ("latitude", Data::Double(51.5142)),
                ("longitude", Data::Double(-0.0931)),
            ]),
        ),
        (
            "registered_country",
            map(vec![
                ("iso_code", s("US")),
                ("names", Data::Pointer(us_names)),
            ]),
        ),
        (
            "subdivisions",
            Data::Array(vec![map(vec![("names", names(&[("en", "England")]))])]),
        ),
    ]);
    let gb_offset = db.add(&gb);

    db.insert("24.24.24.0/24", us_offset);
    db.insert("81.2.69.160/27", gb_offset);
    if ip_version == 6 {
        db.insert("2001:db8::/32", gb_offset);
    }
    db.build()
}

/// Write a database image to a temporary file
pub fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(bytes).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}
