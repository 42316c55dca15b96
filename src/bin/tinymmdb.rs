mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use commands::{cmd_bench, cmd_dump, cmd_lookup, cmd_meta};

/// Database used when `-f` is not given and TINYMMDB_DATABASE is unset
const DEFAULT_DATABASE: &str = "/usr/local/share/GeoIP2/GeoIP2-City.mmdb";

#[derive(Parser)]
#[command(name = "tinymmdb")]
#[command(
    about = "Look up IP addresses in MaxMind DB files",
    long_about = "tinymmdb - read-only lookups in MaxMind DB (.mmdb) databases\n\n\
    Opens GeoIP2/GeoLite2 style databases and prints the data stored for an\n\
    IP address, the database metadata, or lookup throughput.\n\n\
    Examples:\n\
      tinymmdb lookup 24.24.24.24\n\
      tinymmdb lookup -f GeoLite2-Country.mmdb 2001:db8::1 country iso_code\n\
      tinymmdb dump -f GeoIP2-City.mmdb 81.2.69.160 --json\n\
      tinymmdb meta -f GeoIP2-City.mmdb\n\
      tinymmdb bench -f GeoIP2-City.mmdb -n 1000000\n\n\
    Exit status is 0 when data was found and 1 otherwise.\n\
    Set RUST_LOG=debug for diagnostics on stderr."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the city summary for an address, or the value at a key path
    Lookup {
        /// Path to the database
        #[arg(short = 'f', long = "file", env = "TINYMMDB_DATABASE", default_value = DEFAULT_DATABASE)]
        database: PathBuf,

        /// IPv4 or IPv6 address
        #[arg(value_name = "IP")]
        ip: String,

        /// Key path below the record, e.g. `country names en` or `subdivisions 0 iso_code`
        #[arg(value_name = "PATH")]
        path: Vec<String>,
    },

    /// Dump the complete record for an address
    Dump {
        /// Path to the database
        #[arg(short = 'f', long = "file", env = "TINYMMDB_DATABASE", default_value = DEFAULT_DATABASE)]
        database: PathBuf,

        /// IPv4 or IPv6 address
        #[arg(value_name = "IP")]
        ip: String,

        /// Output as pretty-printed JSON instead of the indented text dump
        #[arg(short, long)]
        json: bool,
    },

    /// Show database metadata
    Meta {
        /// Path to the database
        #[arg(short = 'f', long = "file", env = "TINYMMDB_DATABASE", default_value = DEFAULT_DATABASE)]
        database: PathBuf,

        /// Output the raw metadata map as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Measure lookup throughput (lookup plus full record decode)
    Bench {
        /// Path to the database
        #[arg(short = 'f', long = "file", env = "TINYMMDB_DATABASE", default_value = DEFAULT_DATABASE)]
        database: PathBuf,

        /// Address to look up repeatedly (random IPv4 addresses if omitted)
        #[arg(value_name = "IP")]
        ip: Option<String>,

        /// Number of lookups
        #[arg(short = 'n', long, default_value = "1000000")]
        count: usize,

        /// Number of worker threads (default: all cores)
        #[arg(short = 'j', long)]
        threads: Option<usize>,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let found = match cli.command {
        Commands::Lookup { database, ip, path } => cmd_lookup(database, ip, path)?,
        Commands::Dump { database, ip, json } => cmd_dump(database, ip, json)?,
        Commands::Meta { database, json } => cmd_meta(database, json)?,
        Commands::Bench {
            database,
            ip,
            count,
            threads,
        } => cmd_bench(database, ip, count, threads)?,
    };

    Ok(if found {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
