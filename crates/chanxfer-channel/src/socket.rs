use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use chanxfer_frame::{ChannelMessage, FrameConfig, FrameError, FrameReader, FrameWriter};
use tracing::{debug, warn};

use crate::error::{ChannelError, Result};
use crate::traits::{Channel, ChannelEvent, ReadyState};

enum WriterCommand {
    Message(ChannelMessage),
    Close,
}

struct Shared {
    state: Mutex<ReadyState>,
    buffered: AtomicUsize,
    low_threshold: AtomicUsize,
    low_armed: AtomicBool,
}

impl Shared {
    fn state(&self) -> ReadyState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ReadyState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn release(&self, len: usize) {
        self.buffered.fetch_sub(len, Ordering::SeqCst);
    }

    fn fire_low_if_due(&self, events: &Sender<ChannelEvent>) {
        if self.buffered.load(Ordering::SeqCst) <= self.low_threshold.load(Ordering::SeqCst)
            && self.low_armed.swap(false, Ordering::SeqCst)
        {
            let _ = events.send(ChannelEvent::BufferedAmountLow);
        }
    }
}

/// A channel over a connected Unix domain socket.
///
/// `send` never touches the socket: it counts the message into the buffered
/// amount and hands it to a writer thread, which writes frames in order and
/// releases their bytes as each write completes. A reader thread turns
/// incoming frames into `Message` events and reports `Closed` at EOF.
///
/// `close` flushes everything already sent, then shuts down the write half;
/// the remote side sees EOF once the last frame is read.
pub struct SocketChannel {
    label: String,
    shared: Arc<Shared>,
    stream: UnixStream,
    max_payload_size: usize,
    commands: Option<Sender<WriterCommand>>,
    events_tx: Sender<ChannelEvent>,
    events_rx: Receiver<ChannelEvent>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl SocketChannel {
    /// Wrap a socket whose open exchange is already done.
    ///
    /// `reader` must be positioned right after the open frame; any frames it
    /// has already buffered are delivered first.
    pub(crate) fn from_parts(
        stream: UnixStream,
        reader: FrameReader<UnixStream>,
        label: String,
        config: FrameConfig,
    ) -> Result<Self> {
        stream.set_read_timeout(None)?;
        reader.get_ref().set_read_timeout(None)?;
        stream.set_write_timeout(config.write_timeout)?;

        let write_stream = stream.try_clone()?;
        let max_payload_size = config.max_payload_size;
        let writer = FrameWriter::with_config(write_stream, config);

        let shared = Arc::new(Shared {
            state: Mutex::new(ReadyState::Open),
            buffered: AtomicUsize::new(0),
            low_threshold: AtomicUsize::new(0),
            low_armed: AtomicBool::new(false),
        });

        let (events_tx, events_rx) = mpsc::channel();
        let (commands_tx, commands_rx) = mpsc::channel();
        let _ = events_tx.send(ChannelEvent::Open);

        let writer_handle = {
            let shared = Arc::clone(&shared);
            let events = events_tx.clone();
            let label = label.clone();
            std::thread::Builder::new()
                .name(format!("chanxfer-writer-{label}"))
                .spawn(move || run_writer(writer, commands_rx, shared, events, label))?
        };

        let reader_handle = {
            let shared = Arc::clone(&shared);
            let events = events_tx.clone();
            let label = label.clone();
            std::thread::Builder::new()
                .name(format!("chanxfer-reader-{label}"))
                .spawn(move || run_reader(reader, shared, events, label))?
        };

        debug!(%label, "socket channel open");

        Ok(Self {
            label,
            shared,
            stream,
            max_payload_size,
            commands: Some(commands_tx),
            events_tx,
            events_rx,
            writer: Some(writer_handle),
            reader: Some(reader_handle),
        })
    }
}

fn run_writer(
    mut writer: FrameWriter<UnixStream>,
    commands: Receiver<WriterCommand>,
    shared: Arc<Shared>,
    events: Sender<ChannelEvent>,
    label: String,
) {
    while let Ok(command) = commands.recv() {
        let message = match command {
            WriterCommand::Message(message) => message,
            WriterCommand::Close => break,
        };

        let len = message.len();
        let result = writer.write_message(&message);
        shared.release(len);

        if let Err(err) = result {
            warn!(%label, error = %err, "socket channel write failed");
            let _ = events.send(ChannelEvent::Error(err.into()));
            break;
        }
        shared.fire_low_if_due(&events);
    }

    let _ = writer.get_ref().shutdown(Shutdown::Write);
    debug!(%label, "socket channel writer stopped");
}

fn run_reader(
    mut reader: FrameReader<UnixStream>,
    shared: Arc<Shared>,
    events: Sender<ChannelEvent>,
    label: String,
) {
    loop {
        match reader.read_message() {
            Ok(message) => {
                if events.send(ChannelEvent::Message(message)).is_err() {
                    break;
                }
            }
            Err(FrameError::ConnectionClosed) => break,
            Err(FrameError::Io(err))
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                continue;
            }
            Err(err) => {
                warn!(%label, error = %err, "socket channel read failed");
                let _ = events.send(ChannelEvent::Error(err.into()));
                break;
            }
        }
    }

    shared.set_state(ReadyState::Closed);
    let _ = events.send(ChannelEvent::Closed);
    debug!(%label, "socket channel reader stopped");
}

impl Channel for SocketChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn ready_state(&self) -> ReadyState {
        self.shared.state()
    }

    fn buffered_amount(&self) -> usize {
        self.shared.buffered.load(Ordering::SeqCst)
    }

    fn buffered_amount_low_threshold(&self) -> usize {
        self.shared.low_threshold.load(Ordering::SeqCst)
    }

    fn set_buffered_amount_low_threshold(&mut self, threshold: usize) {
        self.shared.low_threshold.store(threshold, Ordering::SeqCst);
    }

    fn listen_buffered_amount_low(&mut self) {
        self.shared.low_armed.store(true, Ordering::SeqCst);
        self.shared.fire_low_if_due(&self.events_tx);
    }

    fn send(&mut self, message: ChannelMessage) -> Result<()> {
        let state = self.shared.state();
        if state != ReadyState::Open {
            return Err(ChannelError::NotOpen { state });
        }

        let len = message.len();
        if len > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.max_payload_size,
            }
            .into());
        }

        let commands = self.commands.as_ref().ok_or(ChannelError::Closed)?;
        self.shared.buffered.fetch_add(len, Ordering::SeqCst);
        commands
            .send(WriterCommand::Message(message))
            .map_err(|_| {
                self.shared.release(len);
                ChannelError::Closed
            })
    }

    fn next_event(&mut self, timeout: Option<Duration>) -> Result<Option<ChannelEvent>> {
        match timeout {
            Some(timeout) => match self.events_rx.recv_timeout(timeout) {
                Ok(event) => Ok(Some(event)),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => Err(ChannelError::Closed),
            },
            None => self
                .events_rx
                .recv()
                .map(Some)
                .map_err(|_| ChannelError::Closed),
        }
    }

    fn close(&mut self) -> Result<()> {
        let Some(commands) = self.commands.take() else {
            return Ok(());
        };
        if self.shared.state() == ReadyState::Open {
            self.shared.set_state(ReadyState::Closing);
        }

        let _ = commands.send(WriterCommand::Close);
        drop(commands);
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }

        self.shared.set_state(ReadyState::Closed);
        debug!(label = %self.label, "socket channel closed");
        Ok(())
    }
}

impl Drop for SocketChannel {
    fn drop(&mut self) {
        let _ = self.close();
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl std::fmt::Debug for SocketChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketChannel")
            .field("label", &self.label)
            .field("state", &self.shared.state())
            .field("buffered", &self.buffered_amount())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_pair(label: &str) -> (SocketChannel, SocketChannel) {
        let (left, right) = UnixStream::pair().unwrap();

        let mut opener = FrameWriter::new(left.try_clone().unwrap());
        opener.write_open(label).unwrap();

        let mut right_reader = FrameReader::new(right.try_clone().unwrap());
        let seen = right_reader.read_open().unwrap();
        assert_eq!(seen, label);

        let left_reader = FrameReader::new(left.try_clone().unwrap());
        let a = SocketChannel::from_parts(left, left_reader, label.to_string(), FrameConfig::default())
            .unwrap();
        let b = SocketChannel::from_parts(right, right_reader, seen, FrameConfig::default())
            .unwrap();
        (a, b)
    }

    fn next(channel: &mut SocketChannel) -> ChannelEvent {
        channel
            .next_event(Some(Duration::from_secs(5)))
            .unwrap()
            .expect("event within timeout")
    }

    #[test]
    fn delivers_messages_in_order() {
        let (mut a, mut b) = open_pair("ordered");
        assert!(matches!(next(&mut a), ChannelEvent::Open));
        assert!(matches!(next(&mut b), ChannelEvent::Open));

        for i in 0..50u8 {
            a.send(ChannelMessage::from(vec![i; 512])).unwrap();
        }
        a.send(ChannelMessage::from("done")).unwrap();

        for i in 0..50u8 {
            match next(&mut b) {
                ChannelEvent::Message(message) => {
                    assert_eq!(message.as_bytes(), vec![i; 512].as_slice())
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        match next(&mut b) {
            ChannelEvent::Message(message) => assert_eq!(message, ChannelMessage::from("done")),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn buffered_amount_low_fires_after_writes_drain() {
        let (mut a, _b) = open_pair("low");
        assert!(matches!(next(&mut a), ChannelEvent::Open));

        a.set_buffered_amount_low_threshold(0);
        a.send(ChannelMessage::from(vec![1u8; 4096])).unwrap();
        a.listen_buffered_amount_low();

        assert!(matches!(next(&mut a), ChannelEvent::BufferedAmountLow));
        assert_eq!(a.buffered_amount(), 0);
    }

    #[test]
    fn close_flushes_then_remote_sees_closed() {
        let (mut a, mut b) = open_pair("closing");
        assert!(matches!(next(&mut b), ChannelEvent::Open));

        a.send(ChannelMessage::from("last words")).unwrap();
        a.close().unwrap();
        assert_eq!(a.ready_state(), ReadyState::Closed);
        assert!(matches!(
            a.send(ChannelMessage::from("too late")),
            Err(ChannelError::NotOpen { .. })
        ));

        assert!(matches!(next(&mut b), ChannelEvent::Message(_)));
        assert!(matches!(next(&mut b), ChannelEvent::Closed));
        assert_eq!(b.ready_state(), ReadyState::Closed);
    }

    #[test]
    fn oversized_message_rejected_before_queueing() {
        let (left, right) = UnixStream::pair().unwrap();
        let reader = FrameReader::new(left.try_clone().unwrap());
        let cfg = FrameConfig {
            max_payload_size: 8,
            ..FrameConfig::default()
        };
        let mut channel = SocketChannel::from_parts(left, reader, "tiny".to_string(), cfg).unwrap();

        let err = channel
            .send(ChannelMessage::from(vec![0u8; 9]))
            .unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Frame(FrameError::PayloadTooLarge { size: 9, max: 8 })
        ));
        assert_eq!(channel.buffered_amount(), 0);
        drop(right);
    }
}
