use anyhow::{Context, Result};
use clap::Parser;
use drivelist::{now_utc_rfc3339, Drive, DRIVE_REPORT_SCHEMA_VERSION};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// List the storage drives attached to this machine as JSON.
#[derive(Debug, Parser)]
#[command(name = "drivelist", version)]
struct Args {
    /// Indent the JSON output.
    #[arg(long)]
    pretty: bool,
    /// Only system drives.
    #[arg(long, conflicts_with = "removable")]
    system: bool,
    /// Only removable drives.
    #[arg(long)]
    removable: bool,
    /// Wrap the list in a report with schema version, OS and timestamp.
    #[arg(long)]
    report: bool,
    /// Log to stderr; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Serialize)]
struct DriveReport<'a> {
    schema_version: &'static str,
    os: &'static str,
    generated_at_utc: String,
    drives: &'a [Drive],
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let drives = drivelist::list_drives().context("listing drives")?;
    tracing::info!(count = drives.len(), "enumerated drives");
    let drives = select(drives, &args);

    let output = if args.report {
        let report = DriveReport {
            schema_version: DRIVE_REPORT_SCHEMA_VERSION,
            os: drivelist::platform_lister().platform(),
            generated_at_utc: now_utc_rfc3339(),
            drives: &drives,
        };
        to_json(&report, args.pretty)?
    } else {
        to_json(&drives, args.pretty)?
    };
    println!("{output}");
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn select(drives: Vec<Drive>, args: &Args) -> Vec<Drive> {
    drives
        .into_iter()
        .filter(|drive| !args.system || drive.system)
        .filter(|drive| !args.removable || drive.removable)
        .collect()
}

fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}
