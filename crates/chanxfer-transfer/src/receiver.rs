use bytes::{Bytes, BytesMut};
use chanxfer_channel::Channel;
use chanxfer_frame::{ChannelMessage, DeliveryReceipt, TransferMessage};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ReceiveError, Result, TransferError};

/// A completed payload handed downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The reassembled payload.
    pub bytes: Bytes,
    /// Size announced by the control message; equals `bytes.len()`.
    pub total_bytes: u64,
    /// Label of the channel the payload arrived on.
    pub label: String,
}

/// Consumer of completed payloads.
pub trait PayloadSink {
    /// Take one completed payload.
    fn deliver(&mut self, delivery: Delivery) -> std::io::Result<()>;
}

impl<F> PayloadSink for F
where
    F: FnMut(Delivery) -> std::io::Result<()>,
{
    fn deliver(&mut self, delivery: Delivery) -> std::io::Result<()> {
        self(delivery)
    }
}

/// How far an in-progress transfer has come.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub received: u64,
    pub total: u64,
}

impl Progress {
    /// Percentage received, 100 for an empty payload.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.received as f64 * 100.0 / self.total as f64
    }
}

/// Chunks collected so far for one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    total_bytes: u64,
    chunks: Vec<Bytes>,
    received: u64,
}

impl Session {
    fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            chunks: Vec::new(),
            received: 0,
        }
    }

    /// Size announced by the control message.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Bytes received so far; always the sum of the chunk lengths.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Chunks received so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn progress(&self) -> Progress {
        Progress {
            received: self.received,
            total: self.total_bytes,
        }
    }

    /// Copy every chunk, in receipt order, into one buffer of exactly
    /// `received` bytes.
    fn assemble(self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.chunks.iter().map(Bytes::len).sum());
        for chunk in &self.chunks {
            buf.extend_from_slice(chunk);
        }
        buf.freeze()
    }
}

/// Receiver state between messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AssemblerState {
    /// No transfer in progress.
    #[default]
    Idle,
    /// Collecting chunks after a control message.
    Accumulating(Session),
}

/// What a single transition asks the assembler to do.
#[derive(Debug)]
pub enum Effect {
    /// A control message opened a session.
    Started { total_bytes: u64 },
    /// A chunk was recorded.
    Appended(Progress),
    /// The terminator closed the session; `bytes` is the whole payload.
    Complete { bytes: Bytes, total_bytes: u64 },
    /// The message broke the protocol and was dropped.
    Rejected(ReceiveError),
}

/// Apply one decoded message to the receiver state.
///
/// Every protocol violation leaves the state [`AssemblerState::Idle`] and
/// records nothing.
pub fn step(state: AssemblerState, message: TransferMessage) -> (AssemblerState, Effect) {
    match (state, message) {
        (AssemblerState::Idle, TransferMessage::Control(control)) => (
            AssemblerState::Accumulating(Session::new(control.total_bytes)),
            Effect::Started {
                total_bytes: control.total_bytes,
            },
        ),
        (AssemblerState::Idle, TransferMessage::Chunk(data)) => (
            AssemblerState::Idle,
            Effect::Rejected(ReceiveError::UnexpectedChunk { len: data.len() }),
        ),
        (AssemblerState::Idle, TransferMessage::Terminator) => (
            AssemblerState::Idle,
            Effect::Rejected(ReceiveError::UnexpectedTerminator),
        ),
        (AssemblerState::Accumulating(_), TransferMessage::Control(control)) => (
            AssemblerState::Idle,
            Effect::Rejected(ReceiveError::UnexpectedControl {
                total_bytes: control.total_bytes,
            }),
        ),
        (AssemblerState::Accumulating(mut session), TransferMessage::Chunk(data)) => {
            let len = data.len();
            let received = session.received + len as u64;
            if received > session.total_bytes {
                return (
                    AssemblerState::Idle,
                    Effect::Rejected(ReceiveError::Overflow {
                        received: session.received,
                        len,
                        total_bytes: session.total_bytes,
                    }),
                );
            }
            session.chunks.push(data);
            session.received = received;
            let progress = session.progress();
            (
                AssemblerState::Accumulating(session),
                Effect::Appended(progress),
            )
        }
        (AssemblerState::Accumulating(session), TransferMessage::Terminator) => {
            if session.received != session.total_bytes {
                return (
                    AssemblerState::Idle,
                    Effect::Rejected(ReceiveError::LengthMismatch {
                        received: session.received,
                        total_bytes: session.total_bytes,
                    }),
                );
            }
            let total_bytes = session.total_bytes;
            (
                AssemblerState::Idle,
                Effect::Complete {
                    bytes: session.assemble(),
                    total_bytes,
                },
            )
        }
    }
}

/// Result of feeding one channel message to a [`ReceiverAssembler`].
#[derive(Debug)]
pub enum Outcome {
    /// A new transfer started.
    Started { total_bytes: u64 },
    /// A chunk was recorded.
    Accepted(Progress),
    /// The payload was delivered to the sink.
    Completed { total_bytes: u64 },
    /// The message was dropped and the assembler is idle again.
    Discarded(ReceiveError),
}

/// Reassembles payloads from one channel and delivers them to a sink.
///
/// Protocol violations never fail the assembler: the offending message is
/// dropped, any partial session is thrown away, and the next control
/// message starts over. Only sink and channel failures surface as errors.
pub struct ReceiverAssembler<C, S> {
    channel: C,
    sink: S,
    state: AssemblerState,
    close_on_complete: bool,
    send_receipts: bool,
    completed: u64,
}

impl<C: Channel, S: PayloadSink> ReceiverAssembler<C, S> {
    /// Assembler that closes `channel` after the first completed payload.
    pub fn new(channel: C, sink: S) -> Self {
        Self {
            channel,
            sink,
            state: AssemblerState::Idle,
            close_on_complete: true,
            send_receipts: false,
            completed: 0,
        }
    }

    /// Keep the channel open after a completed payload so more can follow.
    pub fn keep_open(mut self) -> Self {
        self.close_on_complete = false;
        self
    }

    /// Answer each delivered payload with a [`DeliveryReceipt`] before any
    /// close, so the sender can tell a kept payload from a dropped one.
    pub fn with_receipts(mut self) -> Self {
        self.send_receipts = true;
        self
    }

    /// Decode and apply one channel message.
    pub fn on_message(&mut self, message: ChannelMessage) -> Result<Outcome> {
        match TransferMessage::decode(message) {
            Ok(message) => self.on_transfer_message(message),
            Err(err) => Ok(self.discard("undecodable", ReceiveError::Decode(err))),
        }
    }

    /// Apply one already decoded message.
    pub fn on_transfer_message(&mut self, message: TransferMessage) -> Result<Outcome> {
        let kind = message.kind_name();
        let state = std::mem::take(&mut self.state);
        let (state, effect) = step(state, message);
        self.state = state;

        match effect {
            Effect::Started { total_bytes } => {
                info!(label = %self.channel.label(), total_bytes, "receiving transfer");
                Ok(Outcome::Started { total_bytes })
            }
            Effect::Appended(progress) => {
                debug!(
                    received = progress.received,
                    total = progress.total,
                    "chunk received"
                );
                Ok(Outcome::Accepted(progress))
            }
            Effect::Complete { bytes, total_bytes } => self.complete(bytes, total_bytes),
            Effect::Rejected(err) => Ok(self.discard(kind, err)),
        }
    }

    fn complete(&mut self, bytes: Bytes, total_bytes: u64) -> Result<Outcome> {
        let label = self.channel.label().to_string();
        info!(%label, total_bytes, "transfer complete");

        let delivered = self.sink.deliver(Delivery {
            bytes,
            total_bytes,
            label,
        });
        if let Err(err) = delivered {
            // No receipt; the close tells the sender the payload was not kept.
            if self.close_on_complete {
                if let Err(close_err) = self.channel.close() {
                    debug!(error = %close_err, "close after sink failure failed");
                }
            }
            return Err(TransferError::Sink(err));
        }
        self.completed += 1;

        if self.send_receipts {
            self.channel
                .send(DeliveryReceipt::new(total_bytes).encode()?)?;
        }
        if self.close_on_complete {
            self.channel.close()?;
        }
        Ok(Outcome::Completed { total_bytes })
    }

    fn discard(&mut self, kind: &str, err: ReceiveError) -> Outcome {
        self.state = AssemblerState::Idle;
        warn!(
            label = %self.channel.label(),
            kind,
            error = %err,
            "discarding transfer message"
        );
        Outcome::Discarded(err)
    }

    /// Drop any partial session.
    pub fn reset(&mut self) {
        self.state = AssemblerState::Idle;
    }

    pub fn state(&self) -> &AssemblerState {
        &self.state
    }

    /// Progress of the session in flight, if any.
    pub fn progress(&self) -> Option<Progress> {
        match &self.state {
            AssemblerState::Idle => None,
            AssemblerState::Accumulating(session) => Some(session.progress()),
        }
    }

    /// Payloads delivered so far.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_parts(self) -> (C, S) {
        (self.channel, self.sink)
    }
}
