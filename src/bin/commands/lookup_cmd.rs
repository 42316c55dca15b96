use anyhow::{Context, Result};
use std::path::PathBuf;
use tinymmdb::Entry;

use crate::cli_utils::{format_network, open_database, parse_ip, print_value};

pub fn cmd_lookup(database: PathBuf, ip: String, path: Vec<String>) -> Result<bool> {
    let db = open_database(&database)?;
    let addr = parse_ip(&ip)?;

    let result = db
        .lookup(addr)
        .with_context(|| format!("Lookup failed for: {}", ip))?;

    let Some(entry) = result.entry() else {
        println!("Sorry, nothing found");
        return Ok(false);
    };

    tracing::debug!(
        network = %format_network(addr, result.prefix_len(), db.header().address_bits()),
        offset = result.data_offset(),
        "address found"
    );

    if path.is_empty() {
        print_city_summary(&entry, &ip)?;
        return Ok(true);
    }

    match entry.get_value(path.as_slice())? {
        Some(value) => {
            print_value(&entry, &value)?;
            Ok(true)
        }
        None => {
            println!("Sorry, nothing found");
            Ok(false)
        }
    }
}

/// `ip lat lon region city country`, with N/A for missing names
fn print_city_summary(entry: &Entry<'_>, ip: &str) -> Result<()> {
    let mut lat = 0.0;
    let mut lon = 0.0;
    if let Some(location) = entry.get_value(&["location"])? {
        let location = entry.at(&location);
        if let Some(v) = location.get_value(&["latitude"])? {
            lat = v.value.as_f64().unwrap_or(0.0);
        }
        if let Some(v) = location.get_value(&["longitude"])? {
            lon = v.value.as_f64().unwrap_or(0.0);
        }
    }

    let name = |path: &[&str]| -> Result<String> {
        Ok(entry
            .get_value(path)?
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "N/A".to_string()))
    };
    let region = name(&["subdivisions", "0", "names", "en"])?;
    let city = name(&["city", "names", "en"])?;
    let country = name(&["country", "names", "en"])?;

    println!(
        "{} {:.6} {:.6} {} {} {}",
        ip, lat, lon, region, city, country
    );
    Ok(())
}
