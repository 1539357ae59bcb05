use anyhow::Result;
use geolocate::OpenMode;
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::{format_unix_timestamp, open_database};

pub fn cmd_inspect(database: PathBuf, mode: OpenMode, json_output: bool) -> Result<()> {
    let db = open_database(&database, mode)?;
    let metadata = db.metadata();
    let header = db.header();

    if json_output {
        let description: serde_json::Map<String, serde_json::Value> = metadata
            .description
            .iter()
            .map(|(lang, text)| (lang.clone(), json!(text)))
            .collect();

        let output = json!({
            "file": database.display().to_string(),
            "size": db.size(),
            "mode": mode.to_string(),
            "database_type": metadata.database_type,
            "ip_version": metadata.ip_version.number(),
            "record_size": metadata.record_size.bits(),
            "node_count": metadata.node_count,
            "binary_format_major_version": metadata.binary_format_major_version,
            "binary_format_minor_version": metadata.binary_format_minor_version,
            "build_epoch": metadata.build_epoch,
            "languages": metadata.languages,
            "description": description,
            "tree_size": header.tree_size,
            "data_section_size": header.data_section_size(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Database: {}", database.display());
        println!("Size:     {} bytes ({})", db.size(), mode);
        println!();
        println!("Metadata:");
        println!("  Database type:   {}", metadata.database_type);
        println!("  IP version:      IPv{}", metadata.ip_version.number());
        println!("  Record size:     {} bits", metadata.record_size.bits());
        println!("  Node count:      {}", metadata.node_count);
        println!(
            "  Format version:  {}.{}",
            metadata.binary_format_major_version, metadata.binary_format_minor_version
        );
        if metadata.build_epoch > 0 {
            println!(
                "  Build time:      {} ({})",
                format_unix_timestamp(metadata.build_epoch),
                metadata.build_epoch
            );
        }
        if !metadata.languages.is_empty() {
            println!("  Languages:       {}", metadata.languages.join(", "));
        }
        if !metadata.description.is_empty() {
            println!("  Description:");
            for (lang, text) in &metadata.description {
                println!("    {}: {}", lang, text);
            }
        }
        println!();
        println!("Layout:");
        println!("  Search tree:     {} bytes", header.tree_size);
        println!("  Data section:    {} bytes", header.data_section_size());
    }

    Ok(())
}
