mod cli_utils;
mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geolocate::OpenMode;
use std::path::PathBuf;

use commands::{cmd_inspect, cmd_locate, cmd_query};

#[derive(Parser)]
#[command(name = "geolocate")]
#[command(
    about = "IP geolocation from MaxMind DB files",
    long_about = "geolocate - Resolve IP addresses to coordinates using MaxMind DB (MMDB) files\n\n\
    Reads GeoLite2/GeoIP2-style databases directly: no native library, no network.\n\
    The database is memory-mapped by default and never modified.\n\n\
    Examples:\n\
      geolocate -d GeoLite2-City.mmdb locate 1.2.3.4 2001:db8::1\n\
      geolocate -d GeoLite2-City.mmdb query 8.8.8.8\n\
      GEOLOCATE_DB=GeoLite2-City.mmdb geolocate inspect --json"
)]
#[command(version)]
struct Cli {
    /// MaxMind DB file to read
    #[arg(short, long, global = true, env = "GEOLOCATE_DB", value_name = "PATH")]
    database: Option<PathBuf>,

    /// How to load the database: mmap or memory
    #[arg(long, global = true, default_value = "mmap")]
    mode: OpenMode,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print latitude and longitude for one or more addresses
    Locate {
        /// IPv4 or IPv6 addresses
        #[arg(value_name = "IP", required = true)]
        ips: Vec<String>,
    },

    /// Print the full record matching an address
    Query {
        /// IPv4 or IPv6 address
        #[arg(value_name = "IP")]
        ip: String,
    },

    /// Show database metadata
    Inspect {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let database = cli
        .database
        .context("No database given: pass --database <PATH> or set GEOLOCATE_DB")?;

    match cli.command {
        Commands::Locate { ips } => cmd_locate(database, cli.mode, ips),
        Commands::Query { ip } => cmd_query(database, cli.mode, ip),
        Commands::Inspect { json } => cmd_inspect(database, cli.mode, json),
    }
}
