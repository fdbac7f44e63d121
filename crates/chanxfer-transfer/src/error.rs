use std::time::Duration;

use chanxfer_channel::{ChannelError, ReadyState};
use chanxfer_frame::FrameError;

/// Errors surfaced to the caller of a transfer.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The channel must be open to start a transfer.
    #[error("channel is not open (state: {state})")]
    ChannelNotOpen { state: ReadyState },

    /// Items from an earlier transfer are still queued.
    #[error("a transfer is already in flight ({pending} items queued)")]
    Busy { pending: usize },

    /// The channel rejected a send; the item is lost and draining stopped.
    #[error("channel send failed: {source}")]
    ChannelSend {
        #[source]
        source: ChannelError,
    },

    /// An earlier send failed and the queue was not aborted.
    #[error("sender failed earlier ({pending} items undelivered); abort before retrying")]
    Failed { pending: usize },

    /// The channel reported an error while waiting for events.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Encoding a transfer message failed.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Configuration is unusable.
    #[error("invalid transfer config: {0}")]
    InvalidConfig(String),

    /// No channel event arrived within the idle timeout.
    #[error("no channel activity for {0:?}")]
    Timeout(Duration),

    /// The channel closed before the transfer finished.
    #[error("channel closed before the transfer finished")]
    ChannelClosed,

    /// The channel closed without a delivery receipt.
    #[error("channel closed before the receiver confirmed delivery")]
    Unconfirmed,

    /// The receipt names a different payload length than was sent.
    #[error("receiver confirmed {received} bytes, sent {expected}")]
    ReceiptMismatch { expected: u64, received: u64 },

    /// The downstream sink failed to take a completed payload.
    #[error("payload sink failed: {0}")]
    Sink(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransferError>;

/// Protocol violations seen by the receiver.
///
/// These never propagate out of the assembler as errors: the message is
/// discarded, the session resets to idle, and the violation is reported in
/// the returned outcome.
#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    /// A chunk arrived with no control message before it.
    #[error("chunk of {len} bytes outside a transfer")]
    UnexpectedChunk { len: usize },

    /// A terminator arrived with no control message before it.
    #[error("terminator outside a transfer")]
    UnexpectedTerminator,

    /// A control message arrived while a transfer was in progress.
    #[error("control message for {total_bytes} bytes during a transfer")]
    UnexpectedControl { total_bytes: u64 },

    /// A chunk would carry the session past its announced size.
    #[error("chunk of {len} bytes overflows transfer ({received} of {total_bytes} received)")]
    Overflow {
        received: u64,
        len: usize,
        total_bytes: u64,
    },

    /// The terminator arrived before or after the announced size was reached.
    #[error("transfer ended with {received} bytes, expected {total_bytes}")]
    LengthMismatch { received: u64, total_bytes: u64 },

    /// The message could not be decoded.
    #[error("undecodable message: {0}")]
    Decode(#[from] FrameError),
}
