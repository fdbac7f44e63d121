mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "chanxfer", version, about = "Chunked file transfer over message channels")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", env = "CHANXFER_FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(
        long,
        value_name = "FORMAT",
        default_value = "text",
        env = "CHANXFER_LOG_FORMAT",
        global = true
    )]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "CHANXFER_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "chanxfer",
            "send",
            "/tmp/test.sock",
            "./report.pdf",
            "--label",
            "q3.pdf",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.label.as_deref(), Some("q3.pdf"));
                assert_eq!(args.idle_timeout, "30s");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn receive_requires_out_dir() {
        let err = Cli::try_parse_from(["chanxfer", "receive", "/tmp/test.sock"])
            .expect_err("missing --out-dir should fail");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn parses_receive_subcommand() {
        let cli = Cli::try_parse_from([
            "chanxfer",
            "--format",
            "json",
            "receive",
            "/tmp/test.sock",
            "--out-dir",
            "/tmp/in",
            "--count",
            "2",
        ])
        .expect("receive args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        match cli.command {
            Command::Receive(args) => assert_eq!(args.count, Some(2)),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
