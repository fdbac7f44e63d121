use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod receive;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one file to a listening receiver.
    Send(SendArgs),
    /// Accept transfers and write each payload into a directory.
    Receive(ReceiveArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Receive(args) => receive::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// File to send.
    pub file: PathBuf,
    /// Channel label announced to the receiver. Default: the file name.
    #[arg(long)]
    pub label: Option<String>,
    /// Give up after this long without channel activity (e.g. 30s, 500ms).
    #[arg(long, default_value = "30s")]
    pub idle_timeout: String,
}

#[derive(Args, Debug)]
pub struct ReceiveArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Directory delivered payloads are written to, named by channel label.
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,
    /// Exit after receiving N payloads.
    #[arg(long)]
    pub count: Option<u64>,
    /// Drop a connection after this long without activity (e.g. 30s, 500ms).
    #[arg(long, default_value = "30s")]
    pub idle_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
