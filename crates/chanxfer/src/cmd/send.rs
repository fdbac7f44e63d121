use std::fs;
use std::path::Path;
use std::time::Instant;

use chanxfer_channel::{connect_with_config, Channel};
use chanxfer_frame::FrameConfig;
use chanxfer_transfer::{send_payload, wait_receipt, SenderQueue, TransferConfig};

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{channel_error, io_error, transfer_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{now_unix_seconds, print_report, OutputFormat, SentReport};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let idle_timeout = parse_duration(&args.idle_timeout)?;
    let label = match &args.label {
        Some(label) => label.clone(),
        None => default_label(&args.file)?,
    };

    let payload = fs::read(&args.file)
        .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?;
    let total_bytes = payload.len() as u64;

    let frame_config = FrameConfig {
        write_timeout: Some(idle_timeout),
        ..FrameConfig::default()
    };
    let channel = connect_with_config(&args.path, &label, frame_config)
        .map_err(|err| channel_error("connect failed", err))?;

    let config = TransferConfig::default().with_idle_timeout(idle_timeout);
    let mut sender = SenderQueue::with_config(channel, config)
        .map_err(|err| transfer_error("invalid transfer config", err))?;

    let started = Instant::now();
    let stats =
        send_payload(&mut sender, payload).map_err(|err| transfer_error("send failed", err))?;

    let channel = sender.channel_mut();
    wait_receipt(channel, total_bytes, Some(idle_timeout))
        .map_err(|err| transfer_error("receiver did not confirm delivery", err))?;
    channel
        .close()
        .map_err(|err| channel_error("close failed", err))?;

    print_report(
        &SentReport {
            event: "transfer-sent",
            label: &label,
            file: args.file.display().to_string(),
            total_bytes,
            chunks: stats.chunks,
            messages: stats.messages,
            pauses: stats.pauses,
            elapsed_ms: started.elapsed().as_millis(),
            timestamp: now_unix_seconds(),
        },
        format,
    );
    Ok(SUCCESS)
}

fn default_label(file: &Path) -> CliResult<String> {
    file.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            CliError::new(
                USAGE,
                format!("cannot derive a label from {}; pass --label", file.display()),
            )
        })
}
