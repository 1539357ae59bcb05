use anyhow::Result;
use geolocate::OpenMode;
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::open_database;

/// Resolve each address and print one JSON object per line.
///
/// Exits with status 1 if any address failed.
pub fn cmd_locate(database: PathBuf, mode: OpenMode, ips: Vec<String>) -> Result<()> {
    let db = open_database(&database, mode)?;

    let mut failed = false;
    for ip in &ips {
        let line = match db.location(ip) {
            Ok(location) => json!({
                "ip": ip,
                "latitude": location.latitude,
                "longitude": location.longitude,
            }),
            Err(e) => {
                failed = true;
                json!({ "ip": ip, "error": e.to_string() })
            }
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    db.close();
    if failed {
        std::process::exit(1);
    }
    Ok(())
}
