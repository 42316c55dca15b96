use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::PathBuf;
use tinymmdb::export;

use crate::cli_utils::{format_network, open_database, parse_ip};

pub fn cmd_dump(database: PathBuf, ip: String, json_output: bool) -> Result<bool> {
    let db = open_database(&database)?;
    let addr = parse_ip(&ip)?;

    let result = db
        .lookup(addr)
        .with_context(|| format!("Lookup failed for: {}", ip))?;

    let Some(entry) = result.entry() else {
        println!("Sorry, nothing found");
        return Ok(false);
    };

    let tree = entry
        .get_tree()
        .with_context(|| format!("Failed to decode record for: {}", ip))?;

    if json_output {
        let mut value = export::to_json(&tree)?;
        if let serde_json::Value::Object(ref mut map) = value {
            let network = format_network(addr, result.prefix_len(), db.header().address_bits());
            map.insert("network".to_string(), serde_json::json!(network));
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        let stdout = io::stdout();
        let mut out = io::BufWriter::new(stdout.lock());
        writeln!(
            out,
            "{}",
            format_network(addr, result.prefix_len(), db.header().address_bits())
        )?;
        export::dump(&tree, &mut out)?;
        out.flush()?;
    }

    Ok(true)
}
