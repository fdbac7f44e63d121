use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chanxfer_channel::{ChannelError, SocketListener};
use chanxfer_frame::FrameConfig;
use chanxfer_transfer::{receive_payloads, Delivery, ReceiverAssembler, TransferError};
use tracing::warn;

use crate::cmd::{parse_duration, ReceiveArgs};
use crate::exit::{channel_error, io_error, CliError, CliResult, SUCCESS};
use crate::output::{now_unix_seconds, print_report, OutputFormat, ReceivedReport};

pub fn run(args: ReceiveArgs, format: OutputFormat) -> CliResult<i32> {
    let idle_timeout = parse_duration(&args.idle_timeout)?;
    fs::create_dir_all(&args.out_dir).map_err(|err| {
        io_error(
            &format!("failed creating {}", args.out_dir.display()),
            err,
        )
    })?;

    let frame_config = FrameConfig {
        read_timeout: Some(idle_timeout),
        write_timeout: Some(idle_timeout),
        ..FrameConfig::default()
    };
    let listener = SocketListener::bind(&args.path)
        .map_err(|err| channel_error("bind failed", err))?
        .with_frame_config(frame_config);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut received = 0u64;
    while running.load(Ordering::SeqCst) {
        if args.count.is_some_and(|count| received >= count) {
            break;
        }

        let channel = match listener.accept() {
            Ok(channel) => channel,
            Err(err @ ChannelError::Accept(_)) => return Err(channel_error("accept failed", err)),
            Err(err) => {
                warn!(error = %err, "rejected connection");
                continue;
            }
        };

        let mut written: Option<(Delivery, PathBuf)> = None;
        let mut assembler = ReceiverAssembler::new(channel, |delivery: Delivery| -> io::Result<()> {
            let path = write_delivery(&args.out_dir, &delivery)?;
            written = Some((delivery, path));
            Ok(())
        })
        .with_receipts();

        match receive_payloads(&mut assembler, Some(1), Some(idle_timeout)) {
            Ok(summary) if summary.completed == 0 => {
                warn!(discarded = summary.discarded, "connection closed before a payload completed");
            }
            Ok(_) => {}
            Err(TransferError::Timeout(after)) => {
                warn!(?after, "transfer stalled; dropping connection");
            }
            // One peer's failure never ends the accept loop.
            Err(err) => warn!(error = %err, "receive failed; dropping connection"),
        }
        drop(assembler);

        if let Some((delivery, path)) = written {
            received += 1;
            print_report(
                &ReceivedReport {
                    event: "payload-received",
                    label: &delivery.label,
                    path: path.display().to_string(),
                    total_bytes: delivery.total_bytes,
                    timestamp: now_unix_seconds(),
                },
                format,
            );
        }
    }

    Ok(SUCCESS)
}

/// Write a delivered payload into `dir`, named by the final path component
/// of its label.
fn write_delivery(dir: &Path, delivery: &Delivery) -> io::Result<PathBuf> {
    let name = safe_file_name(&delivery.label)?;
    let path = dir.join(name);
    fs::write(&path, &delivery.bytes)?;
    Ok(path)
}

fn safe_file_name(label: &str) -> io::Result<&str> {
    Path::new(label)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("label {label:?} does not name a file"),
            )
        })
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn label_reduced_to_file_name() {
        assert_eq!(safe_file_name("report.pdf").unwrap(), "report.pdf");
        assert_eq!(safe_file_name("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(safe_file_name("/abs/dir/a.bin").unwrap(), "a.bin");
    }

    #[test]
    fn empty_and_dot_labels_rejected() {
        for label in ["", ".", "..", "/", "dir/.."] {
            let err = safe_file_name(label).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "label {label:?}");
        }
    }

    #[test]
    fn write_delivery_creates_file() {
        let dir = std::env::temp_dir().join(format!("chanxfer-recv-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let delivery = Delivery {
            bytes: Bytes::from_static(b"payload"),
            total_bytes: 7,
            label: "nested/out.bin".to_string(),
        };
        let path = write_delivery(&dir, &delivery).unwrap();
        assert_eq!(path, dir.join("out.bin"));
        assert_eq!(fs::read(&path).unwrap(), b"payload");
        let _ = fs::remove_dir_all(&dir);
    }
}
