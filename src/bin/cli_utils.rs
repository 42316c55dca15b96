use anyhow::{Context, Result};
use std::net::IpAddr;
use std::path::Path;
use tinymmdb::{Database, Decoded, Entry, Value};

/// Open a database, naming the file in the error
pub fn open_database(path: &Path) -> Result<Database> {
    Database::open(path).with_context(|| format!("Failed to load database: {}", path.display()))
}

/// Parse an address argument
pub fn parse_ip(ip: &str) -> Result<IpAddr> {
    ip.trim()
        .parse()
        .with_context(|| format!("Invalid IP address: {}", ip))
}

/// Network containing `addr` with the given prefix length, as CIDR text
///
/// IPv4 addresses found in a 128-bit tree sit below `::/96`, so their prefix
/// is reduced by 96 when it is long enough.
pub fn format_network(addr: IpAddr, prefix_len: u8, tree_bits: u8) -> String {
    match addr {
        IpAddr::V4(ipv4) => {
            let prefix = if tree_bits == 128 {
                prefix_len.saturating_sub(96)
            } else {
                prefix_len
            }
            .min(32);
            let mask = if prefix == 0 {
                0u32
            } else {
                !0u32 << (32 - prefix)
            };
            let network = std::net::Ipv4Addr::from(u32::from(ipv4) & mask);
            format!("{}/{}", network, prefix)
        }
        IpAddr::V6(ipv6) => {
            let prefix = prefix_len.min(128);
            let mask = if prefix == 0 {
                0u128
            } else {
                !0u128 << (128 - prefix)
            };
            let network = std::net::Ipv6Addr::from(u128::from(ipv6) & mask);
            format!("{}/{}", network, prefix)
        }
    }
}

/// One-line rendering of a scalar value
pub fn format_scalar(value: &Decoded<'_>) -> String {
    match value.value {
        Value::Utf8String(b) => String::from_utf8_lossy(b).into_owned(),
        Value::Bytes(b) => b.iter().map(|x| format!("{:02x}", x)).collect(),
        Value::Double(d) => format!("{:.6}", d),
        Value::Float(f) => format!("{:.6}", f),
        Value::Uint16(n) => n.to_string(),
        Value::Uint32(n) => n.to_string(),
        Value::Int32(n) => n.to_string(),
        Value::Uint64(n) => n.to_string(),
        Value::Uint128(n) => n.to_string(),
        Value::Boolean(b) => b.to_string(),
        other => format!("<{}>", other.data_type()),
    }
}

/// Print a value found below `entry`: scalars on one line, maps and arrays
/// as pretty JSON
pub fn print_value<'db>(entry: &Entry<'db>, value: &Decoded<'db>) -> Result<()> {
    if value.is_container() {
        let tree = entry.at(value).get_tree()?;
        let json = tinymmdb::export::to_json(&tree)?;
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("{}", format_scalar(value));
    }
    Ok(())
}

pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

pub fn format_qps(qps: f64) -> String {
    if qps >= 1_000_000.0 {
        format!("{:.2}M", qps / 1_000_000.0)
    } else if qps >= 1_000.0 {
        format!("{:.2}K", qps / 1_000.0)
    } else {
        format!("{:.2}", qps)
    }
}

/// 9999-12-31 23:59:59 UTC
const MAX_FORMATTED_TIMESTAMP: u64 = 253_402_300_799;

/// Seconds since the epoch as `YYYY-MM-DD HH:MM:SS UTC`
///
/// Times past the year 9999 are printed as plain seconds.
pub fn format_unix_timestamp(timestamp: u64) -> String {
    if timestamp > MAX_FORMATTED_TIMESTAMP {
        return format!("{}s since epoch", timestamp);
    }
    let days = timestamp / 86400;
    let secs = timestamp % 86400;
    let (year, month, day) = days_to_ymd(days);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        year,
        month,
        day,
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

// Days since 1970-01-01 to a calendar date
fn days_to_ymd(days: u64) -> (u64, u64, u64) {
    let mut year = 1970;
    let mut remaining = days;
    loop {
        let len = if is_leap_year(year) { 366 } else { 365 };
        if remaining < len {
            break;
        }
        remaining -= len;
        year += 1;
    }

    let february = if is_leap_year(year) { 29 } else { 28 };
    let months = [31, february, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut month = 1;
    for len in months {
        if remaining < len {
            break;
        }
        remaining -= len;
        month += 1;
    }
    (year, month, remaining + 1)
}

fn is_leap_year(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
