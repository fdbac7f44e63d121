use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// A finished send, as printed by `chanxfer send`.
#[derive(Serialize)]
pub struct SentReport<'a> {
    pub event: &'static str,
    pub label: &'a str,
    pub file: String,
    pub total_bytes: u64,
    pub chunks: u64,
    pub messages: u64,
    pub pauses: u64,
    pub elapsed_ms: u128,
    pub timestamp: String,
}

/// A delivered payload, as printed by `chanxfer receive`.
#[derive(Serialize)]
pub struct ReceivedReport<'a> {
    pub event: &'static str,
    pub label: &'a str,
    pub path: String,
    pub total_bytes: u64,
    pub timestamp: String,
}

pub trait Report: Serialize {
    fn columns(&self) -> Vec<(&'static str, String)>;
    fn one_line(&self) -> String;
}

impl Report for SentReport<'_> {
    fn columns(&self) -> Vec<(&'static str, String)> {
        vec![
            ("LABEL", self.label.to_string()),
            ("BYTES", self.total_bytes.to_string()),
            ("CHUNKS", self.chunks.to_string()),
            ("PAUSES", self.pauses.to_string()),
            ("ELAPSED", format!("{}ms", self.elapsed_ms)),
        ]
    }

    fn one_line(&self) -> String {
        format!(
            "sent {} ({} bytes, {} chunks, {} pauses) in {}ms",
            self.label, self.total_bytes, self.chunks, self.pauses, self.elapsed_ms
        )
    }
}

impl Report for ReceivedReport<'_> {
    fn columns(&self) -> Vec<(&'static str, String)> {
        vec![
            ("LABEL", self.label.to_string()),
            ("BYTES", self.total_bytes.to_string()),
            ("PATH", self.path.clone()),
        ]
    }

    fn one_line(&self) -> String {
        format!(
            "received {} ({} bytes) -> {}",
            self.label, self.total_bytes, self.path
        )
    }
}

pub fn print_report<R: Report>(report: &R, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let (header, row): (Vec<_>, Vec<_>) = report.columns().into_iter().unzip();
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header)
                .add_row(row);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", report.one_line()),
    }
}

pub fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
