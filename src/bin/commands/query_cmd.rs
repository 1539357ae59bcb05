use anyhow::{Context, Result};
use geolocate::OpenMode;
use serde_json::json;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::cli_utils::{open_database, record_to_json};

pub fn cmd_query(database: PathBuf, mode: OpenMode, ip: String) -> Result<()> {
    let db = open_database(&database, mode)?;

    let addr: IpAddr = ip
        .parse()
        .with_context(|| format!("Invalid IP address: {}", ip))?;

    let record = db
        .lookup_record(addr)
        .with_context(|| format!("Query failed for: {}", ip))?;

    // Always an array so scripts can treat hits and misses alike
    let found = match record {
        Some(record) => {
            let result = record_to_json(&record)?;
            println!("{}", serde_json::to_string_pretty(&json!([result]))?);
            true
        }
        None => {
            println!("[]");
            false
        }
    };

    db.close();
    if !found {
        std::process::exit(1);
    }
    Ok(())
}
