use anyhow::Result;
use std::path::PathBuf;
use tinymmdb::export;

use crate::cli_utils::{format_number, format_unix_timestamp, open_database};

pub fn cmd_meta(database: PathBuf, json_output: bool) -> Result<bool> {
    let db = open_database(&database)?;

    if json_output {
        let tree = db.metadata_entry().get_tree()?;
        let value = export::to_json(&tree)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(true);
    }

    let meta = db.metadata();
    println!("Database:     {}", database.display());
    if let Some(db_type) = &meta.database_type {
        println!("Type:         {}", db_type);
    }
    println!(
        "Format:       {}.{}",
        meta.binary_format_major_version, meta.binary_format_minor_version
    );
    println!("IP version:   {}", meta.ip_version);
    println!("Record size:  {} bits", meta.record_size);
    println!("Nodes:        {}", format_number(meta.node_count as usize));
    if let Some(epoch) = meta.build_epoch {
        println!("Built:        {} ({})", format_unix_timestamp(epoch), epoch);
    }
    if !meta.languages.is_empty() {
        println!("Languages:    {}", meta.languages.join(", "));
    }
    if !meta.description.is_empty() {
        println!("Description:");
        for (lang, text) in &meta.description {
            println!("  [{}] {}", lang, text);
        }
    }

    Ok(true)
}
