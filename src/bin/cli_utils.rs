use anyhow::{Context, Result};
use geolocate::{Database, OpenMode, Record};
use serde_json::{json, Value};
use std::path::Path;

/// Open a database, attaching the path to any failure
pub fn open_database(path: &Path, mode: OpenMode) -> Result<Database> {
    Database::open_with(path, mode)
        .with_context(|| format!("Failed to load database: {}", path.display()))
}

/// Record data as a JSON object with `network` and `prefix_len` added.
///
/// Records that are not maps are wrapped under `data`.
pub fn record_to_json(record: &Record) -> Result<Value> {
    let mut value = serde_json::to_value(&record.data)?;
    if !value.is_object() {
        value = json!({ "data": value });
    }
    if let Value::Object(ref mut map) = value {
        map.insert(
            "network".to_string(),
            json!(format!("{}/{}", record.network, record.prefix_len)),
        );
        map.insert("prefix_len".to_string(), json!(record.prefix_len));
    }
    Ok(value)
}

/// Format seconds since the Unix epoch as `YYYY-MM-DD HH:MM:SS UTC`
pub fn format_unix_timestamp(timestamp: u64) -> String {
    let days = timestamp / 86_400;
    let secs = timestamp % 86_400;
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

fn days_to_ymd(mut days: u64) -> (u64, u64, u64) {
    let mut year = 1970;
    loop {
        let in_year = if is_leap_year(year) { 366 } else { 365 };
        if days < in_year {
            break;
        }
        days -= in_year;
        year += 1;
    }

    let february = if is_leap_year(year) { 29 } else { 28 };
    let months = [31, february, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

    let mut month = 1;
    for in_month in months {
        if days < in_month {
            break;
        }
        days -= in_month;
        month += 1;
    }

    (year, month, days + 1)
}

fn is_leap_year(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
